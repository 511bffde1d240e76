use super::{backbone_10, test_image};
use crate::assert_err;
use crate::nn::{
    AggType, CriterionConfig, EvalTargets, LossType, PerceptualCriterion, PipelineError,
};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

fn guided_config(style_guides: Tensor, input_guides: Tensor) -> CriterionConfig {
    CriterionConfig {
        content_layers: vec![("relu2_1".to_string(), 1.0)],
        style_layers: vec![("relu1_1".to_string(), 1.0), ("relu2_1".to_string(), 1.0)],
        agg_type: AggType::GuidedGram,
        loss_type: LossType::L2,
        style_guides: Some(style_guides),
        input_guides: Some(input_guides),
        ..Default::default()
    }
}

#[test]
fn test_build_requires_guides() {
    let config = CriterionConfig {
        style_layers: vec![("relu1_1".to_string(), 1.0)],
        agg_type: AggType::GuidedGram,
        ..Default::default()
    };
    assert_err!(
        PerceptualCriterion::build(backbone_10(1), config),
        PipelineError::InvalidOperation { .. }
    );
}

#[test]
fn test_build_guide_channel_mismatch_is_fatal() {
    let config = guided_config(Tensor::filled(1.0, &[2, 8, 8]), Tensor::filled(1.0, &[3, 8, 8]));
    assert_err!(
        PerceptualCriterion::build(backbone_10(1), config),
        PipelineError::GuideMismatch { .. }
    );
}

#[test]
fn test_guided_pipeline_topology() {
    let config = guided_config(Tensor::filled(1.0, &[1, 8, 8]), Tensor::filled(1.0, &[1, 8, 8]));
    let criterion = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    assert!(criterion.pipeline().is_guided());
    // 双分支拓扑到最后一个检查点为止，尾部层在改建时即被排除
    let len = criterion.pipeline().len();
    assert!(criterion.pipeline().stage_at(len - 1).is_observer());
}

#[test]
fn test_all_ones_guide_equals_unguided_gram() {
    // 全一掩码退化为全空间范围的普通Gram：两种判据的风格损失应一致
    let image_a = test_image(100, 1, 8);
    let image_b = test_image(200, 1, 8);

    let config = guided_config(Tensor::filled(1.0, &[1, 8, 8]), Tensor::filled(1.0, &[1, 8, 8]));
    let mut guided = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    guided.set_style_target(&image_b).unwrap();
    guided.set_content_target(&image_a).unwrap();
    guided.evaluate(&image_a, &EvalTargets::default()).unwrap();
    let guided_style: f32 = guided.style_losses().iter().sum();

    let plain_config = CriterionConfig {
        content_layers: vec![("relu2_1".to_string(), 1.0)],
        style_layers: vec![("relu1_1".to_string(), 1.0), ("relu2_1".to_string(), 1.0)],
        agg_type: AggType::Gram,
        loss_type: LossType::L2,
        ..Default::default()
    };
    let mut plain = PerceptualCriterion::build(backbone_10(1), plain_config).unwrap();
    plain.set_style_target(&image_b).unwrap();
    plain.set_content_target(&image_a).unwrap();
    plain.evaluate(&image_a, &EvalTargets::default()).unwrap();
    let plain_style: f32 = plain.style_losses().iter().sum();

    assert!(plain_style > 0.0);
    assert_abs_diff_eq!(guided_style, plain_style, epsilon = 1e-5 * plain_style.max(1.0));
}

#[test]
fn test_guided_content_nodes_preserved() {
    // 引导式改建保留图像分支上的内容节点：候选=内容目标 → 内容损失≈0
    let config = guided_config(Tensor::filled(1.0, &[1, 8, 8]), Tensor::filled(1.0, &[1, 8, 8]));
    let mut criterion = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    let image_a = test_image(100, 1, 8);
    criterion.set_style_target(&test_image(200, 1, 8)).unwrap();
    criterion.set_content_target(&image_a).unwrap();
    criterion.evaluate(&image_a, &EvalTargets::default()).unwrap();

    assert_eq!(criterion.content_losses().len(), 1);
    assert_abs_diff_eq!(criterion.content_losses()[0], 0.0, epsilon = 1e-8);
}

#[test]
fn test_guide_spatial_mismatch_is_fatal() {
    // 掩码与图像空间尺寸不对齐：前向时报错
    let config = guided_config(Tensor::filled(1.0, &[1, 6, 6]), Tensor::filled(1.0, &[1, 6, 6]));
    let mut criterion = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    assert_err!(
        criterion.set_style_target(&test_image(200, 1, 8)),
        PipelineError::ShapeMismatch { .. }
    );
}

#[test]
fn test_split_region_guides_differ_from_full() {
    // 两个互补半区掩码与单个全一掩码给出不同的风格损失（区域条件化生效）
    let image_a = test_image(100, 1, 8);
    let image_b = test_image(200, 1, 8);

    let mut split_mask = vec![0.0f32; 2 * 64];
    for y in 0..8 {
        for x in 0..8 {
            if x < 4 {
                split_mask[y * 8 + x] = 1.0;
            } else {
                split_mask[64 + y * 8 + x] = 1.0;
            }
        }
    }
    let split_guides = Tensor::new(&split_mask, &[2, 8, 8]);

    let config = guided_config(split_guides.clone(), split_guides);
    let mut split = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    split.set_style_target(&image_b).unwrap();
    split.set_content_target(&image_a).unwrap();
    split.evaluate(&image_a, &EvalTargets::default()).unwrap();
    let split_style: f32 = split.style_losses().iter().sum();

    let config = guided_config(Tensor::filled(1.0, &[1, 8, 8]), Tensor::filled(1.0, &[1, 8, 8]));
    let mut full = PerceptualCriterion::build(backbone_10(1), config).unwrap();
    full.set_style_target(&image_b).unwrap();
    full.set_content_target(&image_a).unwrap();
    full.evaluate(&image_a, &EvalTargets::default()).unwrap();
    let full_style: f32 = full.style_losses().iter().sum();

    assert!(split_style > 0.0);
    assert!((split_style - full_style).abs() > 1e-9);
}
