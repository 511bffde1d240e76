/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 风格损失节点（Gram / 每通道均值两种聚合）
 *
 * Gram矩阵：把每个样本的激活展平为 F = [C, H*W]，G = F·Fᵀ / (C·H·W)。
 * 捕获时统计量在batch维上取均值；Loss模式下逐样本与参考比较、距离在batch上取均值。
 *
 * 梯度：G对称、参考对称，故 dL/dF = 2·D·F / (C·H·W)，D为距离对G的梯度。
 */

use super::{distance_grad, distance_loss, inject_grad, AggType, LossMode, LossType, TraitLossNode};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

#[derive(Clone, Debug)]
pub struct StyleLoss {
    mode: LossMode,
    strength: f32,
    loss_type: LossType,
    agg: AggType,
    /// Gram聚合时为 [C, C]，Mean聚合时为 [C]；每次Capture前向都会覆盖
    target: Option<Tensor>,
    grad_cache: Option<Tensor>,
    loss: Option<f32>,
}

impl StyleLoss {
    /// 创建风格损失节点。引导式聚合（`GuidedGram`）属于独立的节点变体，这里会拒绝。
    pub fn new(strength: f32, loss_type: LossType, agg: AggType) -> Result<Self, PipelineError> {
        if agg == AggType::GuidedGram {
            return Err(PipelineError::InvalidOperation(
                "GuidedGram聚合请使用GuidedStyleLoss节点".to_string(),
            ));
        }
        Ok(Self {
            mode: LossMode::None,
            strength,
            loss_type,
            agg,
            target: None,
            grad_cache: None,
            loss: None,
        })
    }

    pub fn agg(&self) -> AggType {
        self.agg
    }

    pub fn target(&self) -> Option<&Tensor> {
        self.target.as_ref()
    }

    /// 单个样本的统计量：Gram为 [C, C]，Mean为 [C]
    fn sample_statistic(values: &[f32], channels: usize, plane: usize, agg: AggType) -> Tensor {
        match agg {
            AggType::Mean => {
                let means = (0..channels)
                    .map(|c| {
                        values[c * plane..(c + 1) * plane].iter().sum::<f32>() / plane as f32
                    })
                    .collect::<Vec<_>>();
                Tensor::new(&means, &[channels])
            }
            _ => {
                let features = Tensor::new(values, &[channels, plane]);
                let normalizer = (channels * plane) as f32;
                features.mat_mul(&features.transpose()) / normalizer
            }
        }
    }
}

impl TraitLossNode for StyleLoss {
    fn variant_name(&self) -> &'static str {
        "StyleLoss"
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
        if self.mode == LossMode::None {
            return Ok(());
        }
        let shape = input.shape();
        if shape.len() != 4 {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: shape.to_vec(),
                message: "StyleLoss的输入必须是4D [batch, C, H, W]".to_string(),
            });
        }
        let (batch_size, channels, plane) = (shape[0], shape[1], shape[2] * shape[3]);
        let sample_size = channels * plane;
        let values = input.to_vec();

        match self.mode {
            LossMode::Capture => {
                // 参考统计量：逐样本统计后在batch维上取均值
                let mut acc: Option<Tensor> = None;
                for b in 0..batch_size {
                    let stat = Self::sample_statistic(
                        &values[b * sample_size..(b + 1) * sample_size],
                        channels,
                        plane,
                        self.agg,
                    );
                    acc = Some(match acc {
                        Some(sum) => sum + stat,
                        None => stat,
                    });
                }
                self.target = acc.map(|sum| sum / batch_size as f32);
            }
            LossMode::Loss => {
                let target = self.target.as_ref().ok_or_else(|| {
                    PipelineError::CaptureMissing(
                        "StyleLoss在捕获风格目标前进入了Loss模式".to_string(),
                    )
                })?;
                let expected_stat_shape = match self.agg {
                    AggType::Mean => vec![channels],
                    _ => vec![channels, channels],
                };
                if target.shape() != expected_stat_shape.as_slice() {
                    return Err(PipelineError::ShapeMismatch {
                        expected: expected_stat_shape,
                        got: target.shape().to_vec(),
                        message: "StyleLoss的候选统计量与参考统计量形状不符（通道数变了？）"
                            .to_string(),
                    });
                }

                let mut total = 0.0;
                let mut grad = Vec::with_capacity(values.len());
                let sample_count = batch_size.max(1) as f32;
                let per_sample_scale = self.strength / sample_count;
                for b in 0..batch_size {
                    let sample = &values[b * sample_size..(b + 1) * sample_size];
                    let stat = Self::sample_statistic(sample, channels, plane, self.agg);
                    let diff = &stat - target;
                    total += distance_loss(self.loss_type, &diff);
                    let dist_grad = distance_grad(self.loss_type, &diff);
                    match self.agg {
                        AggType::Mean => {
                            // dstat_c/dx_{c,i} = 1/(H·W)
                            for c in 0..channels {
                                let g = dist_grad[[c]] / plane as f32 * per_sample_scale;
                                grad.extend(std::iter::repeat(g).take(plane));
                            }
                        }
                        _ => {
                            let features = Tensor::new(sample, &[channels, plane]);
                            let normalizer = (channels * plane) as f32;
                            let d_features = dist_grad.mat_mul(&features) * (2.0 / normalizer);
                            grad.extend(
                                d_features.to_vec().into_iter().map(|g| g * per_sample_scale),
                            );
                        }
                    }
                }
                self.loss = Some(self.strength * total / sample_count);
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
