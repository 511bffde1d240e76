/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 引导式风格损失节点（掩码加权Gram）
 *
 * 前向传播接收 (激活, 引导掩码) 对：掩码 [G, H, W] 由引导分支逐层面积平均下采样，
 * 与激活 [B, C, H, W] 空间对齐。对每个引导通道g：
 *     Fw = F ⊙ m_g（空间位置加权），G_g = Fw·Fwᵀ / (C·Σm_g)
 * 全一掩码时 Σm = H·W，退化为普通Gram（G = F·Fᵀ / (C·H·W)）。
 * 损失在引导通道与batch上取均值；掩码和为零的通道贡献零损失零梯度。
 */

use super::{distance_grad, distance_loss, inject_grad, LossMode, LossType, TraitLossNode};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

#[derive(Clone, Debug)]
pub struct GuidedStyleLoss {
    mode: LossMode,
    strength: f32,
    loss_type: LossType,
    /// 每个引导通道一个参考Gram [C, C]，每次Capture前向都会覆盖
    targets: Option<Vec<Tensor>>,
    grad_cache: Option<Tensor>,
    loss: Option<f32>,
}

impl GuidedStyleLoss {
    pub fn new(strength: f32, loss_type: LossType) -> Self {
        Self {
            mode: LossMode::None,
            strength,
            loss_type,
            targets: None,
            grad_cache: None,
            loss: None,
        }
    }

    pub fn guide_channels(&self) -> Option<usize> {
        self.targets.as_ref().map(|t| t.len())
    }

    /// 掩码加权Gram：返回 (gram [C,C], 掩码和)；掩码和为零时gram为全零
    fn masked_gram(sample: &[f32], mask: &[f32], channels: usize, plane: usize) -> (Tensor, f32) {
        let mask_sum: f32 = mask.iter().sum();
        if mask_sum == 0.0 {
            return (Tensor::zeros(&[channels, channels]), 0.0);
        }
        let mut weighted = Vec::with_capacity(sample.len());
        for c in 0..channels {
            for i in 0..plane {
                weighted.push(sample[c * plane + i] * mask[i]);
            }
        }
        let weighted = Tensor::new(&weighted, &[channels, plane]);
        let normalizer = channels as f32 * mask_sum;
        (weighted.mat_mul(&weighted.transpose()) / normalizer, mask_sum)
    }
}

impl TraitLossNode for GuidedStyleLoss {
    fn variant_name(&self) -> &'static str {
        "GuidedStyleLoss"
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

    fn forward(&mut self, input: &Tensor, guide: Option<&Tensor>) -> Result<(), PipelineError> {
        if self.mode == LossMode::None {
            return Ok(());
        }
        let guide = guide.ok_or_else(|| {
            PipelineError::InvalidOperation(
                "GuidedStyleLoss节点需要引导掩码（只能在引导式流水线中使用）".to_string(),
            )
        })?;

        let shape = input.shape();
        let guide_shape = guide.shape();
        if shape.len() != 4 || guide_shape.len() != 3 {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: shape.to_vec(),
                message: "GuidedStyleLoss需要4D激活 [B, C, H, W] 与3D掩码 [G, H, W]".to_string(),
            });
        }
        if guide_shape[1] != shape[2] || guide_shape[2] != shape[3] {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![guide_shape[0], shape[2], shape[3]],
                got: guide_shape.to_vec(),
                message: "引导掩码与激活的空间尺寸不对齐（引导分支下采样配置有误？）"
                    .to_string(),
            });
        }

        let (batch_size, channels, plane) = (shape[0], shape[1], shape[2] * shape[3]);
        let guide_count = guide_shape[0];
        let sample_size = channels * plane;
        let values = input.to_vec();
        let guide_values = guide.to_vec();

        match self.mode {
            LossMode::Capture => {
                // 每个引导通道：逐样本掩码Gram，batch维取均值
                let mut targets = Vec::with_capacity(guide_count);
                for g in 0..guide_count {
                    let mask = &guide_values[g * plane..(g + 1) * plane];
                    let mut acc = Tensor::zeros(&[channels, channels]);
                    for b in 0..batch_size {
                        let (gram, _) = Self::masked_gram(
                            &values[b * sample_size..(b + 1) * sample_size],
                            mask,
                            channels,
                            plane,
                        );
                        acc = acc + gram;
                    }
                    targets.push(acc / batch_size as f32);
                }
                self.targets = Some(targets);
            }
            LossMode::Loss => {
                let targets = self.targets.as_ref().ok_or_else(|| {
                    PipelineError::CaptureMissing(
                        "GuidedStyleLoss在捕获风格目标前进入了Loss模式".to_string(),
                    )
                })?;
                if targets.len() != guide_count {
                    return Err(PipelineError::GuideMismatch {
                        expected: targets.len(),
                        got: guide_count,
                        message: "候选引导掩码的通道数与捕获时不符".to_string(),
                    });
                }

                let mut total = 0.0;
                let mut grad = vec![0.0f32; values.len()];
                let pair_count = (batch_size * guide_count).max(1) as f32;
                let scale = self.strength / pair_count;
                for g in 0..guide_count {
                    let mask = &guide_values[g * plane..(g + 1) * plane];
                    for b in 0..batch_size {
                        let sample = &values[b * sample_size..(b + 1) * sample_size];
                        let (gram, mask_sum) =
                            Self::masked_gram(sample, mask, channels, plane);
                        if mask_sum == 0.0 {
                            continue;
                        }
                        if gram.shape() != targets[g].shape() {
                            return Err(PipelineError::ShapeMismatch {
                                expected: targets[g].shape().to_vec(),
                                got: gram.shape().to_vec(),
                                message: "GuidedStyleLoss的候选Gram与参考Gram形状不符"
                                    .to_string(),
                            });
                        }
                        let diff = &gram - &targets[g];
                        total += distance_loss(self.loss_type, &diff);

                        // dL/dFw = 2·D·Fw / (C·Σm)，再乘回掩码得到对F的梯度
                        let mut weighted = Vec::with_capacity(sample_size);
                        for c in 0..channels {
                            for i in 0..plane {
                                weighted.push(sample[c * plane + i] * mask[i]);
                            }
                        }
                        let weighted = Tensor::new(&weighted, &[channels, plane]);
                        let normalizer = channels as f32 * mask_sum;
                        let d_weighted = distance_grad(self.loss_type, &diff)
                            .mat_mul(&weighted)
                            * (2.0 / normalizer);
                        let d_weighted = d_weighted.to_vec();
                        for c in 0..channels {
                            for i in 0..plane {
                                grad[b * sample_size + c * plane + i] +=
                                    d_weighted[c * plane + i] * mask[i] * scale;
                            }
                        }
                    }
                }
                self.loss = Some(self.strength * total / pair_count);
                self.grad_cache = Some(Tensor::new(&grad, shape));
            }
            LossMode::None => unreachable!(),
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
