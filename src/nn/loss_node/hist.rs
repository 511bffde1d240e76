/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 直方图损失节点（直方图匹配）
 *
 * 捕获的统计量：每通道固定桶数（256）的取值直方图（计数 + 值域min/max），
 * 在batch维上累积。Loss模式下做最近秩（nearest-rank）重映射：
 * 把候选激活按通道排序，第r小的值映射到参考直方图CDF上对应分位的桶中心，
 * 再对 (候选 - 重映射目标) 全张量计算距离；重映射目标视为常量，
 * 梯度即距离对候选的梯度。
 *
 * 候选与参考完全一致时，损失只残留桶量化误差（值域/256的量级）。
 */

use super::{distance_grad, distance_loss, inject_grad, LossMode, LossType, TraitLossNode};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

/// 固定的直方图桶数
pub const HIST_BINS: usize = 256;

/// 单通道的取值直方图
#[derive(Clone, Debug)]
struct ChannelHist {
    counts: Vec<f32>,
    min: f32,
    max: f32,
    total: f32,
}

impl ChannelHist {
    fn build(values: impl Iterator<Item = f32> + Clone, bins: usize) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut total = 0.0;
        for v in values.clone() {
            min = min.min(v);
            max = max.max(v);
            total += 1.0;
        }
        if total == 0.0 {
            return Self {
                counts: vec![0.0; bins],
                min: 0.0,
                max: 0.0,
                total: 0.0,
            };
        }
        let mut counts = vec![0.0f32; bins];
        let span = max - min;
        for v in values {
            let bin = if span > 0.0 {
                (((v - min) / span) * bins as f32).min(bins as f32 - 1.0) as usize
            } else {
                0
            };
            counts[bin] += 1.0;
        }
        Self {
            counts,
            min,
            max,
            total,
        }
    }

    /// 第j个桶的中心值
    fn bin_value(&self, bin: usize, bins: usize) -> f32 {
        if self.max > self.min {
            self.min + (bin as f32 + 0.5) * (self.max - self.min) / bins as f32
        } else {
            self.min
        }
    }
}

#[derive(Clone, Debug)]
pub struct HistLoss {
    mode: LossMode,
    strength: f32,
    loss_type: LossType,
    bins: usize,
    /// 每通道一个直方图，每次Capture前向都会覆盖
    target: Option<Vec<ChannelHist>>,
    grad_cache: Option<Tensor>,
    loss: Option<f32>,
}

impl HistLoss {
    pub fn new(strength: f32, loss_type: LossType) -> Self {
        Self {
            mode: LossMode::None,
            strength,
            loss_type,
            bins: HIST_BINS,
            target: None,
            grad_cache: None,
            loss: None,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }
}

impl TraitLossNode for HistLoss {
    fn variant_name(&self) -> &'static str {
        "HistLoss"
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
                message: "HistLoss的输入必须是4D [batch, C, H, W]".to_string(),
            });
        }
        let (batch_size, channels, plane) = (shape[0], shape[1], shape[2] * shape[3]);
        let sample_size = channels * plane;
        let values = input.to_vec();

        match self.mode {
            LossMode::Capture => {
                // 每通道在整个batch上累积直方图
                let mut hists = Vec::with_capacity(channels);
                for c in 0..channels {
                    let channel_values = (0..batch_size).flat_map(|b| {
                        let offset = b * sample_size + c * plane;
                        values[offset..offset + plane].iter().copied()
                    });
                    hists.push(ChannelHist::build(channel_values, self.bins));
                }
                self.target = Some(hists);
            }
            LossMode::Loss => {
                let target = self.target.as_ref().ok_or_else(|| {
                    PipelineError::CaptureMissing(
                        "HistLoss在捕获直方图目标前进入了Loss模式".to_string(),
                    )
                })?;
                if target.len() != channels {
                    return Err(PipelineError::ShapeMismatch {
                        expected: vec![target.len()],
                        got: vec![channels],
                        message: "HistLoss的参考直方图通道数与候选激活不符".to_string(),
                    });
                }

                // 最近秩重映射：候选第r小的值 → 参考CDF覆盖到该分位的桶中心
                let mut remapped = vec![0.0f32; values.len()];
                for c in 0..channels {
                    let hist = &target[c];
                    let cum: Vec<f32> = hist
                        .counts
                        .iter()
                        .scan(0.0, |acc, &x| {
                            *acc += x;
                            Some(*acc)
                        })
                        .collect();
                    for b in 0..batch_size {
                        let offset = b * sample_size + c * plane;
                        let mut order: Vec<usize> = (0..plane).collect();
                        order.sort_by(|&i, &j| {
                            values[offset + i]
                                .partial_cmp(&values[offset + j])
                                .unwrap()
                        });
                        let mut bin = 0usize;
                        for (rank, &i) in order.iter().enumerate() {
                            let pos = (rank as f32 + 0.5) / plane as f32 * hist.total;
                            while bin + 1 < self.bins && cum[bin] < pos {
                                bin += 1;
                            }
                            remapped[offset + i] = hist.bin_value(bin, self.bins);
                        }
                    }
                }

                let diff = input - &Tensor::new(&remapped, shape);
                self.loss = Some(self.strength * distance_loss(self.loss_type, &diff));
                self.grad_cache = Some(distance_grad(self.loss_type, &diff) * self.strength);
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
