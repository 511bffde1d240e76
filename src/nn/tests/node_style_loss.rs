use crate::assert_err;
use crate::nn::{AggType, LossMode, LossType, PipelineError, StyleLoss, TraitLossNode};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn activation(seed: u64, shape: &[usize]) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..shape.iter().product::<usize>())
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect::<Vec<_>>();
    Tensor::new(&data, shape)
}

#[test]
fn test_gram_reference_is_symmetric() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    node.set_mode(LossMode::Capture);
    node.forward(&activation(3, &[1, 4, 5, 5]), None).unwrap();

    let gram = node.target().unwrap();
    assert_eq!(gram.shape(), &[4, 4]);
    for i in 0..4 {
        for j in 0..4 {
            assert_abs_diff_eq!(gram[[i, j]], gram[[j, i]], epsilon = 1e-6);
        }
    }
}

#[test]
fn test_self_match_is_zero() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    let x = activation(5, &[1, 3, 4, 4]);
    node.set_mode(LossMode::Capture);
    node.forward(&x, None).unwrap();
    node.set_mode(LossMode::Loss);
    node.forward(&x, None).unwrap();
    assert_abs_diff_eq!(node.loss().unwrap(), 0.0, epsilon = 1e-10);
}

#[test]
fn test_gram_vs_mean_aggregation_differ() {
    // 同样的两张激活：均值聚合丢掉跨通道相关性，与Gram聚合损失不同且都非零
    let target = activation(11, &[1, 3, 4, 4]);
    let candidate = activation(12, &[1, 3, 4, 4]);

    let mut gram_node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    gram_node.set_mode(LossMode::Capture);
    gram_node.forward(&target, None).unwrap();
    gram_node.set_mode(LossMode::Loss);
    gram_node.forward(&candidate, None).unwrap();
    let gram_loss = gram_node.loss().unwrap();

    let mut mean_node = StyleLoss::new(1.0, LossType::L2, AggType::Mean).unwrap();
    mean_node.set_mode(LossMode::Capture);
    mean_node.forward(&target, None).unwrap();
    mean_node.set_mode(LossMode::Loss);
    mean_node.forward(&candidate, None).unwrap();
    let mean_loss = mean_node.loss().unwrap();

    assert!(gram_loss > 0.0);
    assert!(mean_loss > 0.0);
    assert!((gram_loss - mean_loss).abs() > 1e-8);
}

#[test]
fn test_mean_reference_shape() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Mean).unwrap();
    node.set_mode(LossMode::Capture);
    node.forward(&activation(7, &[2, 5, 3, 3]), None).unwrap();
    assert_eq!(node.target().unwrap().shape(), &[5]);
}

#[test]
fn test_capture_missing_is_fatal() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    node.set_mode(LossMode::Loss);
    assert_err!(
        node.forward(&activation(1, &[1, 2, 2, 2]), None),
        PipelineError::CaptureMissing { .. }
    );
}

#[test]
fn test_channel_count_change_is_fatal() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    node.set_mode(LossMode::Capture);
    node.forward(&activation(1, &[1, 4, 3, 3]), None).unwrap();
    node.set_mode(LossMode::Loss);
    // 参考是4通道的Gram，候选只有3通道
    assert_err!(
        node.forward(&activation(2, &[1, 3, 3, 3]), None),
        PipelineError::ShapeMismatch { .. }
    );
}

#[test]
fn test_guided_agg_rejected() {
    assert_err!(
        StyleLoss::new(1.0, LossType::L2, AggType::GuidedGram),
        PipelineError::InvalidOperation { .. }
    );
}

#[test]
fn test_zero_strength_zeroes_loss() {
    let mut node = StyleLoss::new(1.0, LossType::L2, AggType::Gram).unwrap();
    node.set_mode(LossMode::Capture);
    node.forward(&activation(21, &[1, 3, 4, 4]), None).unwrap();
    node.set_strength(0.0);
    node.set_mode(LossMode::Loss);
    node.forward(&activation(22, &[1, 3, 4, 4]), None).unwrap();
    assert_eq!(node.loss().unwrap(), 0.0);
}
