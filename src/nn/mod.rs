/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 感知损失训练核心：骨干层、流水线手术、损失观察节点与判据
 */

mod backbone;
mod checkpoint;
mod criterion;
pub mod layer;
mod loss_node;
mod pipeline;

pub use backbone::{Backbone, LayerDef};
pub use checkpoint::TrainState;
pub use criterion::{CriterionConfig, EvalTargets, PerceptualCriterion};
pub use layer::{AvgPool2d, Conv2d, Layer, MaxPool2d, ReLU, TraitLayer};
pub use loss_node::{
    total_variation, AggType, ContentLoss, DeepDreamLoss, GuidedStyleLoss, HistLoss, LossMode,
    LossNode, LossType, StyleLoss, TraitLossNode,
};
pub use pipeline::{GuideOp, GuidedStage, Pipeline, PipelineError, Stage};

#[cfg(test)]
mod tests;
