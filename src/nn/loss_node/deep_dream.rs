use super::{inject_grad, LossMode, TraitLossNode};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

/// DeepDream损失节点
///
/// 无参考统计量（Capture模式为空操作）：最大化激活幅度，
/// `loss = -strength * mean(x²)`，梯度 `-strength * 2x / N`。
#[derive(Clone, Debug)]
pub struct DeepDreamLoss {
    mode: LossMode,
    strength: f32,
    grad_cache: Option<Tensor>,
    loss: Option<f32>,
}

impl DeepDreamLoss {
    pub fn new(strength: f32) -> Self {
        Self {
            mode: LossMode::None,
            strength,
            grad_cache: None,
            loss: None,
        }
    }
}

impl TraitLossNode for DeepDreamLoss {
    fn variant_name(&self) -> &'static str {
        "DeepDreamLoss"
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
            LossMode::None | LossMode::Capture => {}
            LossMode::Loss => {
                let n = input.size() as f32;
                self.loss = Some(-self.strength * input.map(|x| x * x).mean());
                self.grad_cache = Some(input * (-2.0 * self.strength / n));
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
