/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 冻结骨干网络的层（Batch-First 设计）
 *
 * 设计决策：
 * - 输入/输出格式统一为 [batch_size, channels, H, W]
 * - 骨干网络冻结：反向传播只对输入求梯度，参数不需要梯度
 * - 每层在前向传播时缓存反向传播所需的中间量
 */

mod avg_pool2d;
mod conv2d;
mod max_pool2d;
mod relu;

pub use avg_pool2d::AvgPool2d;
pub(crate) use avg_pool2d::window_average;
pub use conv2d::Conv2d;
pub use max_pool2d::MaxPool2d;
pub use relu::ReLU;

use super::pipeline::PipelineError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    ReLU(ReLU),
    MaxPool2d(MaxPool2d),
    AvgPool2d(AvgPool2d),
}

#[enum_dispatch(Layer)]
pub trait TraitLayer {
    /// 层名（如"conv1_1"），在骨干内应唯一
    fn name(&self) -> &str;

    /// 类型名（如"Conv2d"），层定位时可作为规格匹配
    fn type_name(&self) -> &'static str;

    /// 前向传播：计算输出，并缓存反向传播所需的中间量
    fn forward(&mut self, input: &Tensor) -> Result<Tensor, PipelineError>;

    /// 反向传播：根据前向缓存，把上游梯度映射为对本层输入的梯度
    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError>;
}

/// 校验激活张量为4维 [batch, C, H, W]
pub(crate) fn check_activation_4d(
    layer_display: &str,
    input: &Tensor,
) -> Result<(usize, usize, usize, usize), PipelineError> {
    let shape = input.shape();
    if shape.len() != 4 {
        return Err(PipelineError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            got: shape.to_vec(),
            message: format!("{layer_display}的输入必须是4D [batch, C, H, W]，单样本请使用 [1, C, H, W]"),
        });
    }
    Ok((shape[0], shape[1], shape[2], shape[3]))
}
