/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 层流水线与层手术（locate / insert_after / trim）
 *
 * 设计决策：
 * - 流水线是显式的有序阶段列表，每个阶段要么是骨干层、要么是损失观察节点；
 *   构建期一次成型，之后形状不再变化（避免迭代中原地修改共享结构）
 * - 引导式双分支拓扑是流水线类型自己的变体（Guided），与普通变体共享
 *   定位/插入/裁剪与前向/反向契约
 * - 层规格：层名（如"conv2_1"）、类型名（如"ReLU"）或1起始的十进制序号字符串；
 *   序号针对“此刻”的流水线解析，先前的插入会使后续序号后移
 */

mod error;
mod guided;

pub use error::PipelineError;
pub use guided::{GuideOp, GuidedStage};

use super::layer::{Layer, TraitLayer};
use super::loss_node::{LossNode, TraitLossNode};
use crate::tensor::Tensor;

/// 流水线阶段：骨干层 或 带id的损失观察节点
#[derive(Clone, Debug)]
pub enum Stage {
    Backbone(Layer),
    Observer { id: usize, node: LossNode },
}

impl Stage {
    /// 名称/类型规格只匹配骨干层；观察节点永远不被规格命中
    fn matches_spec(&self, spec: &str) -> bool {
        match self {
            Self::Backbone(layer) => layer.name() == spec || layer.type_name() == spec,
            Self::Observer { .. } => false,
        }
    }

    pub fn is_observer(&self) -> bool {
        matches!(self, Self::Observer { .. })
    }
}

/// 阶段序列：普通单分支 或 引导式双分支（引导掩码与骨干层同步行进）
#[derive(Clone, Debug)]
pub(crate) enum Stages {
    Plain(Vec<Stage>),
    Guided(Vec<GuidedStage>),
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    pub(crate) stages: Stages,
    eval_mode: bool,
    next_observer_id: usize,
}

impl Pipeline {
    /// 由骨干层序列构建普通流水线
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self {
            stages: Stages::Plain(layers.into_iter().map(Stage::Backbone).collect()),
            eval_mode: false,
            next_observer_id: 0,
        }
    }

    /// 推理模式：冻结骨干不再有训练期行为，此标志仅记录生命周期状态
    pub fn set_eval_mode(&mut self) {
        self.eval_mode = true;
    }

    pub const fn is_eval_mode(&self) -> bool {
        self.eval_mode
    }

    pub const fn is_guided(&self) -> bool {
        matches!(self.stages, Stages::Guided(_))
    }

    pub fn len(&self) -> usize {
        match &self.stages {
            Stages::Plain(stages) => stages.len(),
            Stages::Guided(stages) => stages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn stage_at(&self, idx: usize) -> &Stage {
        match &self.stages {
            Stages::Plain(stages) => &stages[idx],
            Stages::Guided(stages) => &stages[idx].stage,
        }
    }

    // ========== 层手术 ==========

    /// 解析层规格，返回0起始的阶段索引。
    /// 纯十进制规格按1起始序号解析（针对当前流水线，含已插入的观察节点）；
    /// 否则按层名、再按类型名匹配，零命中报`LayerNotFound`，多命中报`AmbiguousLayer`。
    pub fn locate(&self, spec: &str) -> Result<usize, PipelineError> {
        if !spec.is_empty() && spec.chars().all(|c| c.is_ascii_digit()) {
            let pos: usize = spec
                .parse()
                .map_err(|_| PipelineError::LayerNotFound(spec.to_string()))?;
            if pos == 0 || pos > self.len() {
                return Err(PipelineError::LayerNotFound(spec.to_string()));
            }
            return Ok(pos - 1);
        }

        let matches: Vec<usize> = (0..self.len())
            .filter(|&i| self.stage_at(i).matches_spec(spec))
            .collect();
        match matches.len() {
            0 => Err(PipelineError::LayerNotFound(spec.to_string())),
            1 => Ok(matches[0]),
            count => Err(PipelineError::AmbiguousLayer {
                spec: spec.to_string(),
                count,
            }),
        }
    }

    /// 把观察节点插到规格解析出的层的紧后方，返回分配的观察节点id。
    /// 后续阶段的索引整体后移一位。
    pub fn insert_after(&mut self, spec: &str, node: LossNode) -> Result<usize, PipelineError> {
        let anchor = self.locate(spec)?;
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        match &mut self.stages {
            Stages::Plain(stages) => {
                stages.insert(anchor + 1, Stage::Observer { id, node });
            }
            Stages::Guided(stages) => {
                stages.insert(
                    anchor + 1,
                    GuidedStage {
                        stage: Stage::Observer { id, node },
                        guide_op: GuideOp::Hold,
                    },
                );
            }
        }
        Ok(id)
    }

    /// 裁掉最后一个观察节点之后的所有阶段（它们对任何损失都没有贡献，只耗算力）。
    /// 没有观察节点时清空整个流水线。幂等：再次调用不改变结果。
    pub fn trim(&mut self) {
        let last_observer = (0..self.len())
            .rev()
            .find(|&i| self.stage_at(i).is_observer());
        let keep = last_observer.map_or(0, |i| i + 1);
        match &mut self.stages {
            Stages::Plain(stages) => stages.truncate(keep),
            Stages::Guided(stages) => stages.truncate(keep),
        }
    }

    // ========== 观察节点访问 ==========

    pub fn observer(&self, id: usize) -> Option<&LossNode> {
        for i in 0..self.len() {
            if let Stage::Observer { id: sid, node } = self.stage_at(i) {
                if *sid == id {
                    return Some(node);
                }
            }
        }
        None
    }

    pub fn observer_mut(&mut self, id: usize) -> Option<&mut LossNode> {
        match &mut self.stages {
            Stages::Plain(stages) => stages.iter_mut().find_map(|s| match s {
                Stage::Observer { id: sid, node } if *sid == id => Some(node),
                _ => None,
            }),
            Stages::Guided(stages) => stages.iter_mut().find_map(|s| match &mut s.stage {
                Stage::Observer { id: sid, node } if *sid == id => Some(node),
                _ => None,
            }),
        }
    }

    // ========== 前向/反向 ==========

    /// 单次前向扫掠：阶段按流水线顺序依次执行，观察节点穿透值恒等于输入。
    /// 引导式流水线必须提供引导掩码 [G, H, W]，普通流水线忽略该参数。
    pub fn forward(
        &mut self,
        input: &Tensor,
        guide: Option<&Tensor>,
    ) -> Result<Tensor, PipelineError> {
        match &mut self.stages {
            Stages::Plain(stages) => {
                let mut x = input.clone();
                for stage in stages.iter_mut() {
                    match stage {
                        Stage::Backbone(layer) => x = layer.forward(&x)?,
                        Stage::Observer { node, .. } => node.forward(&x, None)?,
                    }
                }
                Ok(x)
            }
            Stages::Guided(stages) => {
                let mut g = guide
                    .ok_or_else(|| {
                        PipelineError::InvalidOperation(
                            "引导式流水线的前向传播需要引导掩码".to_string(),
                        )
                    })?
                    .clone();
                let mut x = input.clone();
                for gs in stages.iter_mut() {
                    match &mut gs.stage {
                        Stage::Backbone(layer) => {
                            x = layer.forward(&x)?;
                            g = gs.guide_op.apply(&g)?;
                        }
                        Stage::Observer { node, .. } => node.forward(&x, Some(&g))?,
                    }
                }
                Ok(x)
            }
        }
    }

    /// 反向扫掠：以种子梯度（判据的零缓冲）起步逆序走过各阶段，
    /// Loss模式的观察节点沿途注入自己的梯度贡献，骨干层把梯度映射回各自输入。
    /// 依赖最近一次前向扫掠留下的各层缓存。
    pub fn backward(&self, seed_grad: &Tensor) -> Result<Tensor, PipelineError> {
        let mut grad = seed_grad.clone();
        for i in (0..self.len()).rev() {
            grad = match self.stage_at(i) {
                Stage::Backbone(layer) => layer.backward(&grad)?,
                Stage::Observer { node, .. } => node.backward(&grad)?,
            };
        }
        Ok(grad)
    }
}
