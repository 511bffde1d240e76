use super::backbone_10;
use crate::assert_err;
use crate::nn::{ContentLoss, LossNode, LossType, Pipeline, PipelineError};

fn test_pipeline() -> Pipeline {
    Pipeline::from_layers(backbone_10(1).into_layers())
}

fn content_node() -> LossNode {
    LossNode::ContentLoss(ContentLoss::new(1.0, LossType::L2))
}

#[test]
fn test_locate_by_name() {
    let pipeline = test_pipeline();
    assert_eq!(pipeline.locate("conv1_1").unwrap(), 0);
    assert_eq!(pipeline.locate("relu1_2").unwrap(), 3);
    assert_eq!(pipeline.locate("pool2").unwrap(), 9);
}

#[test]
fn test_locate_by_position() {
    let pipeline = test_pipeline();
    // 序号规格是1起始的十进制字符串
    assert_eq!(pipeline.locate("1").unwrap(), 0);
    assert_eq!(pipeline.locate("5").unwrap(), 4);
    assert_eq!(pipeline.locate("10").unwrap(), 9);
}

#[test]
fn test_locate_not_found() {
    let pipeline = test_pipeline();
    assert_err!(pipeline.locate("conv9_9"), PipelineError::LayerNotFound(s) if s == "conv9_9");
    assert_err!(pipeline.locate("0"), PipelineError::LayerNotFound { .. });
    assert_err!(pipeline.locate("11"), PipelineError::LayerNotFound { .. });
    assert_err!(pipeline.locate(""), PipelineError::LayerNotFound { .. });
}

#[test]
fn test_locate_ambiguous_type() {
    let pipeline = test_pipeline();
    // 类型名命中多个位置：只有序号规格能消歧
    assert_err!(
        pipeline.locate("ReLU"),
        PipelineError::AmbiguousLayer { count: 4, .. }
    );
    assert_err!(
        pipeline.locate("MaxPool2d"),
        PipelineError::AmbiguousLayer { count: 2, .. }
    );
}

#[test]
fn test_locate_unique_type() {
    let mut backbone = backbone_10(1);
    backbone.add_avg_pool2d("gap", (2, 2), None);
    let pipeline = Pipeline::from_layers(backbone.into_layers());
    // 类型名只命中一个位置时可作为规格
    assert_eq!(pipeline.locate("AvgPool2d").unwrap(), 10);
}

#[test]
fn test_insert_after_grows_by_one() {
    let mut pipeline = test_pipeline();
    let before = pipeline.len();
    pipeline.insert_after("relu1_1", content_node()).unwrap();
    assert_eq!(pipeline.len(), before + 1);
    // 新节点紧跟在锚点层之后
    assert!(pipeline.stage_at(2).is_observer());
    assert!(!pipeline.stage_at(1).is_observer());
}

#[test]
fn test_insert_shifts_subsequent_positions() {
    let mut pipeline = test_pipeline();
    pipeline.insert_after("2", content_node()).unwrap();
    // 插入后，序号规格针对“此刻”的流水线解析：原第3层现在是第4位
    assert_eq!(pipeline.locate("conv1_2").unwrap(), 3);
    pipeline.insert_after("4", content_node()).unwrap();
    assert!(pipeline.stage_at(2).is_observer());
    assert!(pipeline.stage_at(4).is_observer());
    assert_eq!(pipeline.len(), 12);
}

#[test]
fn test_observer_never_matches_spec() {
    let mut pipeline = test_pipeline();
    pipeline.insert_after("conv1_1", content_node()).unwrap();
    // 观察节点不会被名称/类型规格命中
    assert_err!(pipeline.locate("ContentLoss"), PipelineError::LayerNotFound { .. });
}

#[test]
fn test_trim_drops_trailing_layers() {
    let mut pipeline = test_pipeline();
    pipeline.insert_after("relu1_2", content_node()).unwrap();
    // 观察节点在索引4，其后的层全部裁掉
    pipeline.trim();
    assert_eq!(pipeline.len(), 5);
    assert!(pipeline.stage_at(4).is_observer());
}

#[test]
fn test_trim_is_idempotent() {
    let mut pipeline = test_pipeline();
    pipeline.insert_after("conv2_1", content_node()).unwrap();
    pipeline.trim();
    let len_once = pipeline.len();
    pipeline.trim();
    assert_eq!(pipeline.len(), len_once);
}

#[test]
fn test_trim_without_observers_clears_all() {
    let mut pipeline = test_pipeline();
    pipeline.trim();
    assert!(pipeline.is_empty());
}
