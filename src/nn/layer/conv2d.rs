/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 2D卷积层（冻结权重）
 *
 * 设计决策：
 * - 权重形状 [out_c, in_c, kH, kW]，偏置形状 [out_c]，来自预训练分类网络，训练期间不更新
 * - Batch-First：输入 [batch, in_c, H, W]，输出 [batch, out_c, H', W']
 * - 反向传播只计算对输入的梯度（转置卷积的散射形式）
 * - 使用 Rayon 在 batch 维度并行加速
 */

use super::{check_activation_4d, TraitLayer};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;
use rayon::prelude::*;

#[derive(Clone, Debug)]
pub struct Conv2d {
    name: String,
    weight: Tensor, // [out_c, in_c, kH, kW]
    bias: Tensor,   // [out_c]
    stride: (usize, usize),
    padding: (usize, usize),
    // 前向缓存：反向散射时需要输入形状
    input_shape: Option<Vec<usize>>,
}

impl Conv2d {
    /// 创建冻结卷积层。`weight`必须为4维 [out_c, in_c, kH, kW]，`bias`为1维 [out_c]。
    pub fn new(
        name: &str,
        weight: Tensor,
        bias: Tensor,
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Result<Self, PipelineError> {
        if weight.dimension() != 4 {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: weight.shape().to_vec(),
                message: format!("卷积层{name}的权重必须是4D [out_c, in_c, kH, kW]"),
            });
        }
        let out_c = weight.shape()[0];
        if bias.shape() != [out_c] {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![out_c],
                got: bias.shape().to_vec(),
                message: format!("卷积层{name}的偏置必须是1D [out_c]"),
            });
        }
        if stride.0 == 0 || stride.1 == 0 {
            return Err(PipelineError::InvalidOperation(format!(
                "卷积层{name}的步长不能为0"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            weight,
            bias,
            stride,
            padding,
            input_shape: None,
        })
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    fn output_hw(&self, in_h: usize, in_w: usize) -> Result<(usize, usize), PipelineError> {
        let (k_h, k_w) = (self.weight.shape()[2], self.weight.shape()[3]);
        let (p_h, p_w) = self.padding;
        let (s_h, s_w) = self.stride;
        if in_h + 2 * p_h < k_h || in_w + 2 * p_w < k_w {
            return Err(PipelineError::InvalidOperation(format!(
                "卷积层{}的卷积核 {}x{} 超出（含填充的）输入尺寸 {}x{}",
                self.name,
                k_h,
                k_w,
                in_h + 2 * p_h,
                in_w + 2 * p_w
            )));
        }
        Ok((
            (in_h + 2 * p_h - k_h) / s_h + 1,
            (in_w + 2 * p_w - k_w) / s_w + 1,
        ))
    }
}

impl TraitLayer for Conv2d {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "Conv2d"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, PipelineError> {
        let (batch_size, in_c, in_h, in_w) =
            check_activation_4d(&format!("卷积层{}", self.name), input)?;
        if in_c != self.weight.shape()[1] {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![batch_size, self.weight.shape()[1], in_h, in_w],
                got: input.shape().to_vec(),
                message: format!("卷积层{}的输入通道数与权重不符", self.name),
            });
        }

        let out_c = self.weight.shape()[0];
        let (k_h, k_w) = (self.weight.shape()[2], self.weight.shape()[3]);
        let (p_h, p_w) = self.padding;
        let (s_h, s_w) = self.stride;
        let (out_h, out_w) = self.output_hw(in_h, in_w)?;
        let single_sample_size = out_c * out_h * out_w;

        // Rayon 并行处理每个 batch 样本
        let weight = &self.weight;
        let bias = &self.bias;
        let batch_results: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_output = vec![0.0f32; single_sample_size];
                for oc in 0..out_c {
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let mut acc = bias[[oc]];
                            for ic in 0..in_c {
                                for kh in 0..k_h {
                                    let ih = oh * s_h + kh;
                                    if ih < p_h || ih >= in_h + p_h {
                                        continue;
                                    }
                                    for kw in 0..k_w {
                                        let iw = ow * s_w + kw;
                                        if iw < p_w || iw >= in_w + p_w {
                                            continue;
                                        }
                                        acc += weight[[oc, ic, kh, kw]]
                                            * input[[b, ic, ih - p_h, iw - p_w]];
                                    }
                                }
                            }
                            sample_output[oc * out_h * out_w + oh * out_w + ow] = acc;
                        }
                    }
                }
                sample_output
            })
            .collect();

        let all_output: Vec<f32> = batch_results.into_iter().flatten().collect();
        self.input_shape = Some(input.shape().to_vec());
        Ok(Tensor::new(&all_output, &[batch_size, out_c, out_h, out_w]))
    }

    /// 对输入的梯度：把上游梯度按卷积核散射回输入位置（转置卷积）
    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError> {
        let input_shape = self.input_shape.as_ref().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "卷积层{}缺少前向缓存，需先执行前向传播",
                self.name
            ))
        })?;
        let (batch_size, in_c, in_h, in_w) = (
            input_shape[0],
            input_shape[1],
            input_shape[2],
            input_shape[3],
        );

        let out_c = self.weight.shape()[0];
        let (k_h, k_w) = (self.weight.shape()[2], self.weight.shape()[3]);
        let (p_h, p_w) = self.padding;
        let (s_h, s_w) = self.stride;
        let grad_shape = upstream_grad.shape();
        let (out_h, out_w) = (grad_shape[2], grad_shape[3]);
        if grad_shape[0] != batch_size || grad_shape[1] != out_c {
            return Err(PipelineError::ShapeMismatch {
                expected: vec![batch_size, out_c, out_h, out_w],
                got: grad_shape.to_vec(),
                message: format!("卷积层{}的上游梯度形状与前向输出不符", self.name),
            });
        }
        let single_sample_size = in_c * in_h * in_w;

        let weight = &self.weight;
        let batch_results: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_grad = vec![0.0f32; single_sample_size];
                for oc in 0..out_c {
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let g = upstream_grad[[b, oc, oh, ow]];
                            if g == 0.0 {
                                continue;
                            }
                            for ic in 0..in_c {
                                for kh in 0..k_h {
                                    let ih = oh * s_h + kh;
                                    if ih < p_h || ih >= in_h + p_h {
                                        continue;
                                    }
                                    for kw in 0..k_w {
                                        let iw = ow * s_w + kw;
                                        if iw < p_w || iw >= in_w + p_w {
                                            continue;
                                        }
                                        sample_grad[ic * in_h * in_w
                                            + (ih - p_h) * in_w
                                            + (iw - p_w)] += g * weight[[oc, ic, kh, kw]];
                                    }
                                }
                            }
                        }
                    }
                }
                sample_grad
            })
            .collect();

        let all_grad: Vec<f32> = batch_results.into_iter().flatten().collect();
        Ok(Tensor::new(&all_grad, &[batch_size, in_c, in_h, in_w]))
    }
}
