use crate::assert_err;
use crate::nn::{HistLoss, LossMode, LossType, PipelineError, TraitLossNode};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn activation(seed: u64, shape: &[usize], lo: f32, hi: f32) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..shape.iter().product::<usize>())
        .map(|_| rng.gen_range(lo..hi))
        .collect::<Vec<_>>();
    Tensor::new(&data, shape)
}

#[test]
fn test_self_match_is_near_zero() {
    let mut node = HistLoss::new(1.0, LossType::L2);
    let x = activation(9, &[1, 3, 8, 8], 0.0, 2.0);

    node.set_mode(LossMode::Capture);
    node.forward(&x, None).unwrap();
    node.set_mode(LossMode::Loss);
    node.forward(&x, None).unwrap();

    // 候选与参考同分布时只剩桶量化残差（值域/256的量级，平方后远小于1e-4）
    let loss = node.loss().unwrap();
    assert!(loss >= 0.0);
    assert!(loss < 1e-4, "直方图自匹配损失过大: {loss}");
}

#[test]
fn test_distribution_mismatch_is_positive() {
    let mut node = HistLoss::new(1.0, LossType::L2);
    node.set_mode(LossMode::Capture);
    node.forward(&activation(1, &[1, 2, 8, 8], 0.0, 1.0), None).unwrap();
    node.set_mode(LossMode::Loss);
    // 候选分布整体偏移了+2，重映射目标拉不平
    node.forward(&activation(2, &[1, 2, 8, 8], 2.0, 3.0), None).unwrap();
    assert!(node.loss().unwrap() > 0.5);
}

#[test]
fn test_gradient_pulls_towards_reference() {
    let mut node = HistLoss::new(1.0, LossType::L2);
    node.set_mode(LossMode::Capture);
    node.forward(&Tensor::filled(0.0, &[1, 1, 2, 2]), None).unwrap();
    node.set_mode(LossMode::Loss);
    let x = Tensor::filled(1.0, &[1, 1, 2, 2]);
    node.forward(&x, None).unwrap();

    // 参考全为0、候选全为1：梯度应当为正（把候选往下拉）
    let grad = node.backward(&Tensor::zeros(&[1, 1, 2, 2])).unwrap();
    assert!(grad.to_vec().iter().all(|&g| g > 0.0));
}

#[test]
fn test_capture_missing_is_fatal() {
    let mut node = HistLoss::new(1.0, LossType::L2);
    node.set_mode(LossMode::Loss);
    assert_err!(
        node.forward(&Tensor::zeros(&[1, 1, 2, 2]), None),
        PipelineError::CaptureMissing { .. }
    );
}

#[test]
fn test_channel_count_change_is_fatal() {
    let mut node = HistLoss::new(1.0, LossType::L2);
    node.set_mode(LossMode::Capture);
    node.forward(&activation(3, &[1, 3, 4, 4], 0.0, 1.0), None).unwrap();
    node.set_mode(LossMode::Loss);
    assert_err!(
        node.forward(&activation(4, &[1, 2, 4, 4], 0.0, 1.0), None),
        PipelineError::ShapeMismatch { .. }
    );
}

#[test]
fn test_constant_channel_edge_case() {
    // 参考通道是常数（min==max）：所有候选值重映射到该常数，不产生NaN
    let mut node = HistLoss::new(1.0, LossType::L2);
    node.set_mode(LossMode::Capture);
    node.forward(&Tensor::filled(2.0, &[1, 1, 3, 3]), None).unwrap();
    node.set_mode(LossMode::Loss);
    node.forward(&activation(5, &[1, 1, 3, 3], 0.0, 1.0), None).unwrap();
    let loss = node.loss().unwrap();
    assert!(loss.is_finite());
    assert!(loss > 0.0);
}
