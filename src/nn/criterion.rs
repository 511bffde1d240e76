/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 感知判据（PerceptualCriterion）---复合感知损失的编排者
 *
 * 生命周期：构建骨干 → 插入损失观察节点 → Capture扫掠记录目标统计量 →
 * 每个训练步：Loss扫掠读出累计标量损失 → 以零种子反向扫掠取回对输入的梯度。
 *
 * 节点模式只由判据显式驱动（节点从不自行迁移）；
 * 捕获扫掠的穿透输出被丢弃，只为副作用而跑。
 */

use super::loss_node::{
    AggType, ContentLoss, DeepDreamLoss, GuidedStyleLoss, HistLoss, LossMode, LossNode, LossType,
    StyleLoss, TraitLossNode,
};
use super::pipeline::{Pipeline, PipelineError};
use crate::nn::backbone::Backbone;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// 判据构建配置：各损失种类的 (层规格, 权重) 列表按请求顺序给出，
/// 节点的插入顺序与此一致：集合长度等于规格数，插入序即请求序。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub content_layers: Vec<(String, f32)>,
    pub style_layers: Vec<(String, f32)>,
    pub hist_layers: Vec<(String, f32)>,
    pub deepdream_layers: Vec<(String, f32)>,
    pub agg_type: AggType,
    pub loss_type: LossType,
    /// 风格目标图像的引导掩码 [G, H, W]（仅GuidedGram聚合需要）
    pub style_guides: Option<Tensor>,
    /// 候选图像的引导掩码 [G, H, W]（仅GuidedGram聚合需要）
    pub input_guides: Option<Tensor>,
}

/// `evaluate`可携带的目标张量：非空字段会触发一次内联捕获扫掠
/// （内容目标逐batch变化时，这每步都会发生---捕获扫掠不便宜）。
#[derive(Default)]
pub struct EvalTargets<'a> {
    pub content_target: Option<&'a Tensor>,
    pub style_target: Option<&'a Tensor>,
    pub hist_target: Option<&'a Tensor>,
}

#[derive(Debug)]
pub struct PerceptualCriterion {
    pipeline: Pipeline,
    // 各损失种类的观察节点id，按插入（请求）顺序
    content_nodes: Vec<usize>,
    style_nodes: Vec<usize>,
    hist_nodes: Vec<usize>,
    deepdream_nodes: Vec<usize>,
    style_guides: Option<Tensor>,
    input_guides: Option<Tensor>,
    /// 反向扫掠的零梯度种子，按流水线输出形状就地复用；
    /// 复合损失本身不需要来自上方的梯度
    grad_seed: Tensor,
    /// gradient只能紧跟在同一输入的evaluate之后
    evaluated: bool,
}

impl PerceptualCriterion {
    /// 构建判据：骨干置为推理模式，依次插入内容、DeepDream、风格、直方图节点。
    /// 风格插入按聚合方式分叉：GuidedGram把整条流水线改建为双分支拓扑
    /// （改建时已裁掉尾部层），其余聚合直接插入骨干、最后统一裁剪。
    pub fn build(backbone: Backbone, config: CriterionConfig) -> Result<Self, PipelineError> {
        let guided = config.agg_type == AggType::GuidedGram;
        let (style_guides, input_guides) = if guided {
            let style_guides = config.style_guides.clone().ok_or_else(|| {
                PipelineError::InvalidOperation(
                    "GuidedGram聚合需要在配置中提供style_guides".to_string(),
                )
            })?;
            let input_guides = config.input_guides.clone().ok_or_else(|| {
                PipelineError::InvalidOperation(
                    "GuidedGram聚合需要在配置中提供input_guides".to_string(),
                )
            })?;
            if style_guides.dimension() != 3 || input_guides.dimension() != 3 {
                return Err(PipelineError::ShapeMismatch {
                    expected: vec![0, 0, 0],
                    got: if style_guides.dimension() == 3 {
                        input_guides.shape().to_vec()
                    } else {
                        style_guides.shape().to_vec()
                    },
                    message: "引导掩码必须是3D [G, H, W]".to_string(),
                });
            }
            if style_guides.shape()[0] != input_guides.shape()[0] {
                return Err(PipelineError::GuideMismatch {
                    expected: style_guides.shape()[0],
                    got: input_guides.shape()[0],
                    message: "style_guides与input_guides的引导通道数必须一致".to_string(),
                });
            }
            (Some(style_guides), Some(input_guides))
        } else {
            (None, None)
        };

        let mut pipeline = Pipeline::from_layers(backbone.into_layers());
        pipeline.set_eval_mode();

        let mut content_nodes = Vec::with_capacity(config.content_layers.len());
        for (spec, weight) in &config.content_layers {
            let node = LossNode::ContentLoss(ContentLoss::new(*weight, config.loss_type));
            content_nodes.push(pipeline.insert_after(spec, node)?);
        }

        let mut deepdream_nodes = Vec::with_capacity(config.deepdream_layers.len());
        for (spec, weight) in &config.deepdream_layers {
            let node = LossNode::DeepDreamLoss(DeepDreamLoss::new(*weight));
            deepdream_nodes.push(pipeline.insert_after(spec, node)?);
        }

        let mut style_nodes = Vec::with_capacity(config.style_layers.len());
        if guided {
            pipeline = pipeline.into_guided();
            for (spec, weight) in &config.style_layers {
                let node = LossNode::GuidedStyleLoss(GuidedStyleLoss::new(*weight, config.loss_type));
                style_nodes.push(pipeline.insert_after(spec, node)?);
            }
            // 双分支拓扑到最后一个检查点为止，尾部层在改建时即被排除
            pipeline.trim();
        } else {
            for (spec, weight) in &config.style_layers {
                let node =
                    LossNode::StyleLoss(StyleLoss::new(*weight, config.loss_type, config.agg_type)?);
                style_nodes.push(pipeline.insert_after(spec, node)?);
            }
        }

        let mut hist_nodes = Vec::with_capacity(config.hist_layers.len());
        for (spec, weight) in &config.hist_layers {
            let node = LossNode::HistLoss(HistLoss::new(*weight, config.loss_type));
            hist_nodes.push(pipeline.insert_after(spec, node)?);
        }

        if !guided {
            pipeline.trim();
        }

        Ok(Self {
            pipeline,
            content_nodes,
            style_nodes,
            hist_nodes,
            deepdream_nodes,
            style_guides,
            input_guides,
            grad_seed: Tensor::zeros(&[0]),
            evaluated: false,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    // ========== 模式驱动 ==========

    fn set_collection_mode(pipeline: &mut Pipeline, ids: &[usize], mode: LossMode) {
        for &id in ids {
            if let Some(node) = pipeline.observer_mut(id) {
                node.set_mode(mode);
            }
        }
    }

    fn set_modes(&mut self, content: LossMode, style: LossMode, hist: LossMode, deepdream: LossMode) {
        Self::set_collection_mode(&mut self.pipeline, &self.content_nodes, content);
        Self::set_collection_mode(&mut self.pipeline, &self.style_nodes, style);
        Self::set_collection_mode(&mut self.pipeline, &self.hist_nodes, hist);
        Self::set_collection_mode(&mut self.pipeline, &self.deepdream_nodes, deepdream);
    }

    // ========== 目标捕获扫掠（穿透输出被丢弃） ==========

    /// 捕获风格目标：风格节点Capture、其余None，目标图像跑一遍全流水线。
    /// 引导式拓扑下使用style_guides（掩码与风格图像空间对齐）。
    pub fn set_style_target(&mut self, img: &Tensor) -> Result<(), PipelineError> {
        self.set_modes(LossMode::None, LossMode::Capture, LossMode::None, LossMode::None);
        self.evaluated = false;
        self.pipeline.forward(img, self.style_guides.as_ref())?;
        Ok(())
    }

    /// 捕获直方图目标（通常同为风格图像，引导掩码取style_guides）
    pub fn set_hist_target(&mut self, img: &Tensor) -> Result<(), PipelineError> {
        self.set_modes(LossMode::None, LossMode::None, LossMode::Capture, LossMode::None);
        self.evaluated = false;
        self.pipeline.forward(img, self.style_guides.as_ref())?;
        Ok(())
    }

    /// 捕获内容目标（训练中逐batch变化，引导掩码取input_guides）
    pub fn set_content_target(&mut self, img: &Tensor) -> Result<(), PipelineError> {
        self.set_modes(LossMode::Capture, LossMode::None, LossMode::None, LossMode::None);
        self.evaluated = false;
        self.pipeline.forward(img, self.input_guides.as_ref())?;
        Ok(())
    }

    // ========== 权重设置 ==========
    // 统一设置会用同一个标量覆盖集合内每个节点的strength，构建期的逐层
    // 权重比例从此丢失；要保留逐层比例请用 *_weights 版本。

    pub fn set_content_weight(&mut self, weight: f32) {
        Self::set_collection_weight(&mut self.pipeline, &self.content_nodes, weight);
    }

    pub fn set_style_weight(&mut self, weight: f32) {
        Self::set_collection_weight(&mut self.pipeline, &self.style_nodes, weight);
    }

    pub fn set_hist_weight(&mut self, weight: f32) {
        Self::set_collection_weight(&mut self.pipeline, &self.hist_nodes, weight);
    }

    /// 逐节点设置内容权重，长度必须与节点数一致
    pub fn set_content_weights(&mut self, weights: &[f32]) -> Result<(), PipelineError> {
        Self::set_collection_weights(&mut self.pipeline, &self.content_nodes, weights, "内容")
    }

    pub fn set_style_weights(&mut self, weights: &[f32]) -> Result<(), PipelineError> {
        Self::set_collection_weights(&mut self.pipeline, &self.style_nodes, weights, "风格")
    }

    pub fn set_hist_weights(&mut self, weights: &[f32]) -> Result<(), PipelineError> {
        Self::set_collection_weights(&mut self.pipeline, &self.hist_nodes, weights, "直方图")
    }

    fn set_collection_weight(pipeline: &mut Pipeline, ids: &[usize], weight: f32) {
        for &id in ids {
            if let Some(node) = pipeline.observer_mut(id) {
                node.set_strength(weight);
            }
        }
    }

    fn set_collection_weights(
        pipeline: &mut Pipeline,
        ids: &[usize],
        weights: &[f32],
        kind: &str,
    ) -> Result<(), PipelineError> {
        if weights.len() != ids.len() {
            return Err(PipelineError::InvalidOperation(format!(
                "{}权重数量({})与节点数量({})不符",
                kind,
                weights.len(),
                ids.len()
            )));
        }
        for (&id, &weight) in ids.iter().zip(weights) {
            if let Some(node) = pipeline.observer_mut(id) {
                node.set_strength(weight);
            }
        }
        Ok(())
    }

    // ========== 损失评估与梯度 ==========

    /// 评估复合损失：先对非空目标字段做内联捕获扫掠，再把所有节点置为Loss模式
    /// 跑一次前向（单次扫掠按流水线顺序同时算出所有损失），
    /// 把各集合的标量损失求和返回，并把零梯度种子重置为输出形状。
    pub fn evaluate(
        &mut self,
        input: &Tensor,
        targets: &EvalTargets,
    ) -> Result<f32, PipelineError> {
        if let Some(img) = targets.style_target {
            self.set_style_target(img)?;
        }
        if let Some(img) = targets.hist_target {
            self.set_hist_target(img)?;
        }
        if let Some(img) = targets.content_target {
            self.set_content_target(img)?;
        }

        self.set_modes(LossMode::Loss, LossMode::Loss, LossMode::Loss, LossMode::Loss);
        let output = self.pipeline.forward(input, self.input_guides.as_ref())?;

        let total = self.content_losses().iter().sum::<f32>()
            + self.style_losses().iter().sum::<f32>()
            + self.hist_losses().iter().sum::<f32>()
            + self.deepdream_losses().iter().sum::<f32>();

        // 零种子缓冲就地复用：形状变了才重新分配，内容恒为零
        if self.grad_seed.shape() != output.shape() {
            self.grad_seed = Tensor::zeros(output.shape());
        }
        self.evaluated = true;
        Ok(total)
    }

    /// 对输入的梯度：以零种子从流水线尾部反向扫掠，各观察节点沿途注入贡献。
    /// 依赖evaluate刚刚在同一输入上跑过（各阶段的前向缓存仍然有效）。
    pub fn gradient(&self, input: &Tensor) -> Result<Tensor, PipelineError> {
        if !self.evaluated {
            return Err(PipelineError::InvalidOperation(
                "gradient必须紧跟在同一输入的evaluate之后调用".to_string(),
            ));
        }
        let grad = self.pipeline.backward(&self.grad_seed)?;
        if grad.shape() != input.shape() {
            return Err(PipelineError::ShapeMismatch {
                expected: grad.shape().to_vec(),
                got: input.shape().to_vec(),
                message: "gradient的输入与evaluate时的输入形状不符".to_string(),
            });
        }
        Ok(grad)
    }

    // ========== 逐节点权重/损失分解（只读，供训练循环打日志） ==========

    pub fn content_weights(&self) -> Vec<f32> {
        self.collection_weights(&self.content_nodes)
    }

    pub fn style_weights(&self) -> Vec<f32> {
        self.collection_weights(&self.style_nodes)
    }

    pub fn hist_weights(&self) -> Vec<f32> {
        self.collection_weights(&self.hist_nodes)
    }

    fn collection_weights(&self, ids: &[usize]) -> Vec<f32> {
        ids.iter()
            .filter_map(|&id| self.pipeline.observer(id).map(|node| node.strength()))
            .collect()
    }

    pub fn content_losses(&self) -> Vec<f32> {
        self.collection_losses(&self.content_nodes)
    }

    pub fn style_losses(&self) -> Vec<f32> {
        self.collection_losses(&self.style_nodes)
    }

    pub fn hist_losses(&self) -> Vec<f32> {
        self.collection_losses(&self.hist_nodes)
    }

    pub fn deepdream_losses(&self) -> Vec<f32> {
        self.collection_losses(&self.deepdream_nodes)
    }

    fn collection_losses(&self, ids: &[usize]) -> Vec<f32> {
        ids.iter()
            .map(|&id| {
                self.pipeline
                    .observer(id)
                    .and_then(|node| node.loss())
                    .unwrap_or(0.0)
            })
            .collect()
    }
}
