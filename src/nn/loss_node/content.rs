use super::{distance_grad, distance_loss, inject_grad, LossMode, LossType, TraitLossNode};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

/// 内容损失节点
///
/// 捕获的统计量就是原始激活张量本身；Loss模式下对全张量逐元素计算距离。
#[derive(Clone, Debug)]
pub struct ContentLoss {
    mode: LossMode,
    strength: f32,
    loss_type: LossType,
    /// 捕获的参考激活 [B, C, H, W]，每次Capture前向都会覆盖
    target: Option<Tensor>,
    /// Loss模式前向缓存的梯度注入量
    grad_cache: Option<Tensor>,
    loss: Option<f32>,
}

impl ContentLoss {
    pub fn new(strength: f32, loss_type: LossType) -> Self {
        Self {
            mode: LossMode::None,
            strength,
            loss_type,
            target: None,
            grad_cache: None,
            loss: None,
        }
    }

    pub fn target(&self) -> Option<&Tensor> {
        self.target.as_ref()
    }
}

impl TraitLossNode for ContentLoss {
    fn variant_name(&self) -> &'static str {
        "ContentLoss"
    }

    fn mode(&self) -> LossMode {
        self.mode
    }

    fn set_mode(&mut self, mode: LossMode) {
        self.mode = mode;
    }

    fn strength(&self) -> f32 {
        self.strength
    }

    fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }

    fn loss(&self) -> Option<f32> {
        self.loss
    }

    fn forward(&mut self, input: &Tensor, _guide: Option<&Tensor>) -> Result<(), PipelineError> {
        match self.mode {
            LossMode::None => {}
            LossMode::Capture => {
                self.target = Some(input.clone());
            }
            LossMode::Loss => {
                let target = self.target.as_ref().ok_or_else(|| {
                    PipelineError::CaptureMissing(
                        "ContentLoss在捕获内容目标前进入了Loss模式".to_string(),
                    )
                })?;
                if !target.is_same_shape(input) {
                    return Err(PipelineError::ShapeMismatch {
                        expected: target.shape().to_vec(),
                        got: input.shape().to_vec(),
                        message: "ContentLoss的候选激活与参考激活形状不符".to_string(),
                    });
                }
                let diff = input - target;
                self.loss = Some(self.strength * distance_loss(self.loss_type, &diff));
                self.grad_cache = Some(distance_grad(self.loss_type, &diff) * self.strength);
            }
        }
        Ok(())
    }

    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError> {
        inject_grad(
            self.variant_name(),
            self.mode,
            self.grad_cache.as_ref(),
            upstream_grad,
        )
    }
}
