/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 损失观察节点---插入骨干流水线的有状态穿透节点
 *
 * 节点的穿透值恒等于输入（观察者），前向副作用由模式决定：
 * - None：无副作用，损失保持陈旧
 * - Capture：从输入计算并记录参考统计量
 * - Loss：从输入计算统计量、与参考比较，得到 `strength * distance` 并缓存梯度注入量
 *
 * 反向传播时，Loss模式节点返回 `上游梯度 + 缓存的梯度注入`，其它模式原样透传。
 * 模式只由判据（criterion）显式设置，节点从不自行迁移状态。
 */

mod content;
mod deep_dream;
mod distance;
mod hist;
mod style;
mod style_guided;
mod total_variation;

pub use content::ContentLoss;
pub use deep_dream::DeepDreamLoss;
pub use hist::HistLoss;
pub use style::StyleLoss;
pub use style_guided::GuidedStyleLoss;
pub use total_variation::total_variation;

pub(crate) use distance::{distance_grad, distance_loss};

use super::pipeline::PipelineError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// 节点模式的有限状态机：None → Capture → Loss，判据可在训练步之间循环回Capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossMode {
    #[default]
    None,
    Capture,
    Loss,
}

/// 统计量间的距离度量（Torch语义）
///
/// - `L2`: `mean(d²)`，梯度 `2d/n`
/// - `SmoothL1`: 逐元素Huber（|d|<1时二次、否则线性），梯度 `clamp(d,-1,1)/n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossType {
    #[default]
    L2,
    SmoothL1,
}

/// 风格统计量的聚合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggType {
    /// Gram矩阵（按元素总数归一化）
    #[default]
    Gram,
    /// 每通道空间均值（忽略跨通道相关性）
    Mean,
    /// 引导掩码加权的Gram矩阵（双分支流水线拓扑）
    GuidedGram,
}

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum LossNode {
    ContentLoss(ContentLoss),
    StyleLoss(StyleLoss),
    GuidedStyleLoss(GuidedStyleLoss),
    HistLoss(HistLoss),
    DeepDreamLoss(DeepDreamLoss),
}

#[enum_dispatch(LossNode)]
pub trait TraitLossNode {
    /// 变体名（用于错误消息与损失分解日志）
    fn variant_name(&self) -> &'static str;

    fn mode(&self) -> LossMode;

    /// 纯状态迁移，除记录模式外无副作用
    fn set_mode(&mut self, mode: LossMode);

    fn strength(&self) -> f32;

    fn set_strength(&mut self, strength: f32);

    /// Loss模式前向传播后的标量损失；其它模式下保持陈旧（None或上次的值）
    fn loss(&self) -> Option<f32>;

    /// 观察节点的前向副作用。穿透值恒等于输入，由流水线原样传递。
    /// `guide`只被引导式风格节点使用，其余变体忽略。
    fn forward(&mut self, input: &Tensor, guide: Option<&Tensor>) -> Result<(), PipelineError>;

    /// 反向传播：Loss模式返回 `upstream_grad + strength * d(distance)/dx`（前向已缓存），
    /// None/Capture模式原样返回上游梯度
    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError>;
}

/// Loss模式反向传播的公共部分：把前向缓存的梯度注入量叠加到上游梯度上
pub(crate) fn inject_grad(
    variant: &'static str,
    mode: LossMode,
    grad_cache: Option<&Tensor>,
    upstream_grad: &Tensor,
) -> Result<Tensor, PipelineError> {
    if mode != LossMode::Loss {
        return Ok(upstream_grad.clone());
    }
    let injection = grad_cache.ok_or_else(|| {
        PipelineError::ComputationError(format!(
            "{variant}节点缺少梯度缓存，需先在Loss模式下执行前向传播"
        ))
    })?;
    if !injection.is_same_shape(upstream_grad) {
        return Err(PipelineError::ShapeMismatch {
            expected: injection.shape().to_vec(),
            got: upstream_grad.shape().to_vec(),
            message: format!("{variant}节点的上游梯度形状与前向输入不符"),
        });
    }
    Ok(upstream_grad + injection)
}
