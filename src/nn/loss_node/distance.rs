use super::LossType;
use crate::tensor::Tensor;

/// 统计量差值的标量距离（按元素数取均值，Torch语义）
pub(crate) fn distance_loss(loss_type: LossType, diff: &Tensor) -> f32 {
    let n = diff.size() as f32;
    match loss_type {
        LossType::L2 => diff.map(|d| d * d).sum() / n,
        LossType::SmoothL1 => {
            diff.map(|d| {
                if d.abs() < 1.0 {
                    0.5 * d * d
                } else {
                    d.abs() - 0.5
                }
            })
            .sum()
                / n
        }
    }
}

/// 标量距离对差值的梯度
pub(crate) fn distance_grad(loss_type: LossType, diff: &Tensor) -> Tensor {
    let n = diff.size() as f32;
    match loss_type {
        LossType::L2 => diff * (2.0 / n),
        LossType::SmoothL1 => diff.map(move |d| d.clamp(-1.0, 1.0) / n),
    }
}
