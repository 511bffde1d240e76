use crate::assert_panic;
use crate::tensor::Tensor;

#[test]
fn test_reshape() {
    let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let r = t.reshape(&[3, 2]);
    assert_eq!(r.shape(), &[3, 2]);
    assert_eq!(r.to_vec(), t.to_vec());
}

#[test]
fn test_reshape_wrong_size_panics() {
    let t = Tensor::zeros(&[2, 3]);
    assert_panic!(t.reshape(&[4, 2]));
}

#[test]
fn test_flatten() {
    let t = Tensor::zeros(&[2, 3, 4]);
    assert_eq!(t.flatten().shape(), &[24]);
}

#[test]
fn test_permute_and_transpose() {
    // 视觉预处理的核心用法：[H, W, C] → [C, H, W]
    let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3]);
    let p = t.permute(&[2, 0, 1]);
    assert_eq!(p.shape(), &[3, 1, 2]);
    assert_eq!(p[[0, 0, 0]], 1.0);
    assert_eq!(p[[0, 0, 1]], 4.0);
    assert_eq!(p[[2, 0, 1]], 6.0);

    let m = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
    let mt = m.transpose();
    assert_eq!(mt.to_vec(), vec![1.0, 3.0, 2.0, 4.0]);
}

#[test]
fn test_permute_invalid_axes_panics() {
    let t = Tensor::zeros(&[2, 3]);
    assert_panic!(t.permute(&[0, 0]));
    assert_panic!(t.permute(&[0, 5]));
}
