/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 2D最大池化层
 *
 * 设计决策：
 * - 记录最大值位置用于反向传播（稀疏梯度）
 * - Batch-First 格式：输入必须是 4D [batch, C, H, W]
 * - 使用 Rayon 在 batch 维度并行加速
 */

use super::{check_activation_4d, TraitLayer};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;
use rayon::prelude::*;

#[derive(Clone, Debug)]
pub struct MaxPool2d {
    name: String,
    kernel_size: (usize, usize), // (kH, kW)
    stride: (usize, usize),      // (sH, sW)

    // 缓存（用于反向传播）：每个输出位置对应的最大值在输入单样本内的展平索引
    max_indices: Option<Tensor>,
    input_shape: Option<Vec<usize>>,
}

impl MaxPool2d {
    /// 创建最大池化层，`stride`为None时默认等于`kernel_size`
    pub fn new(name: &str, kernel_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        Self {
            name: name.to_string(),
            kernel_size,
            stride: stride.unwrap_or(kernel_size),
            max_indices: None,
            input_shape: None,
        }
    }

    pub fn kernel_size(&self) -> (usize, usize) {
        self.kernel_size
    }

    pub fn stride(&self) -> (usize, usize) {
        self.stride
    }
}

impl TraitLayer for MaxPool2d {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "MaxPool2d"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, PipelineError> {
        let (batch_size, channels, in_h, in_w) =
            check_activation_4d(&format!("最大池化层{}", self.name), input)?;
        let (k_h, k_w) = self.kernel_size;
        let (s_h, s_w) = self.stride;
        if k_h > in_h || k_w > in_w {
            return Err(PipelineError::InvalidOperation(format!(
                "最大池化层{}的池化窗口 {}x{} 超出输入尺寸 {}x{}",
                self.name, k_h, k_w, in_h, in_w
            )));
        }
        let out_h = (in_h - k_h) / s_h + 1;
        let out_w = (in_w - k_w) / s_w + 1;
        let single_sample_size = channels * out_h * out_w;

        // Rayon 并行处理每个 batch 样本
        let batch_results: Vec<(Vec<f32>, Vec<f32>)> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_output = vec![0.0f32; single_sample_size];
                let mut sample_indices = vec![0.0f32; single_sample_size];
                for c in 0..channels {
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let mut max_val = f32::NEG_INFINITY;
                            let mut max_idx: usize = 0;
                            for kh in 0..k_h {
                                for kw in 0..k_w {
                                    let ih = oh * s_h + kh;
                                    let iw = ow * s_w + kw;
                                    let val = input[[b, c, ih, iw]];
                                    if val > max_val {
                                        max_val = val;
                                        max_idx = ih * in_w + iw;
                                    }
                                }
                            }
                            let idx = c * out_h * out_w + oh * out_w + ow;
                            sample_output[idx] = max_val;
                            sample_indices[idx] = max_idx as f32;
                        }
                    }
                }
                (sample_output, sample_indices)
            })
            .collect();

        let mut all_output = Vec::with_capacity(batch_size * single_sample_size);
        let mut all_indices = Vec::with_capacity(batch_size * single_sample_size);
        for (output, indices) in batch_results {
            all_output.extend(output);
            all_indices.extend(indices);
        }

        let output_shape = vec![batch_size, channels, out_h, out_w];
        self.max_indices = Some(Tensor::new(&all_indices, &output_shape));
        self.input_shape = Some(input.shape().to_vec());
        Ok(Tensor::new(&all_output, &output_shape))
    }

    /// 最大池化的梯度：最大值位置透传上游梯度，其余位置为0
    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError> {
        let max_indices = self.max_indices.as_ref().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "最大池化层{}缺少最大值索引缓存，需先执行前向传播",
                self.name
            ))
        })?;
        let input_shape = self.input_shape.as_ref().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "最大池化层{}缺少前向缓存，需先执行前向传播",
                self.name
            ))
        })?;
        if !max_indices.is_same_shape(upstream_grad) {
            return Err(PipelineError::ShapeMismatch {
                expected: max_indices.shape().to_vec(),
                got: upstream_grad.shape().to_vec(),
                message: format!("最大池化层{}的上游梯度形状与前向输出不符", self.name),
            });
        }

        let grad_shape = upstream_grad.shape();
        let (batch_size, channels, out_h, out_w) =
            (grad_shape[0], grad_shape[1], grad_shape[2], grad_shape[3]);
        let (in_h, in_w) = (input_shape[2], input_shape[3]);
        let single_sample_size = channels * in_h * in_w;

        let batch_results: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_grad = vec![0.0f32; single_sample_size];
                for c in 0..channels {
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let grad_val = upstream_grad[[b, c, oh, ow]];
                            let max_pos = max_indices[[b, c, oh, ow]] as usize;
                            let ih = max_pos / in_w;
                            let iw = max_pos % in_w;
                            sample_grad[c * in_h * in_w + ih * in_w + iw] += grad_val;
                        }
                    }
                }
                sample_grad
            })
            .collect();

        let all_grad: Vec<f32> = batch_results.into_iter().flatten().collect();
        Ok(Tensor::new(
            &all_grad,
            &[batch_size, channels, in_h, in_w],
        ))
    }
}
