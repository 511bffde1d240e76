//! 数值梯度校验：解析梯度与中心差分对照。
//! 骨干只用卷积/平均池化（处处光滑），避免ReLU/最大池化的不可导点干扰差分。

use super::test_image;
use crate::nn::{Backbone, CriterionConfig, EvalTargets, LossType, PerceptualCriterion};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn smooth_backbone(seed: u64) -> Backbone {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut random_tensor = |shape: &[usize]| {
        let len = shape.iter().product::<usize>();
        let data = (0..len)
            .map(|_| rng.gen_range(-0.5f32..0.5f32))
            .collect::<Vec<_>>();
        Tensor::new(&data, shape)
    };
    let mut backbone = Backbone::new();
    let (w1, b1) = (random_tensor(&[2, 3, 3, 3]), random_tensor(&[2]));
    backbone.add_conv2d("c1", w1, b1, (1, 1), (1, 1)).unwrap();
    backbone.add_avg_pool2d("ap", (2, 2), None);
    let (w2, b2) = (random_tensor(&[2, 2, 3, 3]), random_tensor(&[2]));
    backbone.add_conv2d("c2", w2, b2, (1, 1), (1, 1)).unwrap();
    backbone
}

fn numeric_grad(
    criterion: &mut PerceptualCriterion,
    input: &Tensor,
    idx: [usize; 4],
    eps: f32,
) -> f32 {
    let mut plus = input.clone();
    plus[idx] += eps;
    let loss_plus = criterion.evaluate(&plus, &EvalTargets::default()).unwrap();
    let mut minus = input.clone();
    minus[idx] -= eps;
    let loss_minus = criterion.evaluate(&minus, &EvalTargets::default()).unwrap();
    (loss_plus - loss_minus) / (2.0 * eps)
}

const PROBES: [[usize; 4]; 4] = [[0, 0, 0, 0], [0, 1, 2, 3], [0, 2, 3, 1], [0, 0, 5, 5]];

fn check_against_numeric(mut criterion: PerceptualCriterion, input: &Tensor, tol: f32) {
    criterion.evaluate(input, &EvalTargets::default()).unwrap();
    let analytic = criterion.gradient(input).unwrap();

    for idx in PROBES {
        let numeric = numeric_grad(&mut criterion, input, idx, 1e-2);
        let diff = (analytic[idx] - numeric).abs();
        assert!(
            diff <= tol + 1e-2 * numeric.abs(),
            "梯度不一致 @ {:?}: 解析={}, 数值={}",
            idx,
            analytic[idx],
            numeric
        );
    }
}

#[test]
fn test_content_gradient_matches_numeric() {
    let mut criterion = PerceptualCriterion::build(
        smooth_backbone(3),
        CriterionConfig {
            content_layers: vec![("c2".to_string(), 1.0)],
            loss_type: LossType::L2,
            ..Default::default()
        },
    )
    .unwrap();
    criterion.set_content_target(&test_image(50, 1, 6)).unwrap();
    // 线性骨干 + L2 → 损失对输入是二次型，中心差分应当精确
    check_against_numeric(criterion, &test_image(60, 1, 6), 1e-3);
}

#[test]
fn test_style_gradient_matches_numeric() {
    let mut criterion = PerceptualCriterion::build(
        smooth_backbone(4),
        CriterionConfig {
            style_layers: vec![("c1".to_string(), 1.0), ("c2".to_string(), 1.0)],
            loss_type: LossType::L2,
            ..Default::default()
        },
    )
    .unwrap();
    criterion.set_style_target(&test_image(70, 1, 6)).unwrap();
    check_against_numeric(criterion, &test_image(80, 1, 6), 5e-3);
}

#[test]
fn test_smooth_l1_content_gradient_matches_numeric() {
    let mut criterion = PerceptualCriterion::build(
        smooth_backbone(5),
        CriterionConfig {
            content_layers: vec![("c2".to_string(), 1.0)],
            loss_type: LossType::SmoothL1,
            ..Default::default()
        },
    )
    .unwrap();
    // 目标与候选拉开距离，让部分差值落在线性段、部分落在二次段
    criterion
        .set_content_target(&(test_image(90, 1, 6) * 3.0))
        .unwrap();
    check_against_numeric(criterion, &test_image(95, 1, 6), 5e-3);
}

#[test]
fn test_deepdream_gradient_matches_numeric() {
    let mut criterion = PerceptualCriterion::build(
        smooth_backbone(6),
        CriterionConfig {
            deepdream_layers: vec![("c2".to_string(), 1.0)],
            ..Default::default()
        },
    )
    .unwrap();
    check_against_numeric(criterion, &test_image(99, 1, 6), 1e-3);
}
