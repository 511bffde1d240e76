use super::{check_activation_4d, TraitLayer};
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// 2D平均池化层
///
/// 引导式风格迁移中，引导分支用面积平均下采样保持掩码平滑对齐，
/// 因此这里的窗口平均核也被`GuideOp`复用。
#[derive(Clone, Debug)]
pub struct AvgPool2d {
    name: String,
    kernel_size: (usize, usize),
    stride: (usize, usize),
    input_shape: Option<Vec<usize>>,
}

impl AvgPool2d {
    /// 创建平均池化层，`stride`为None时默认等于`kernel_size`
    pub fn new(name: &str, kernel_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        Self {
            name: name.to_string(),
            kernel_size,
            stride: stride.unwrap_or(kernel_size),
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

/// 单通道窗口平均：[in_h, in_w]（按行主序切片） → [out_h, out_w]
/// 引导分支的掩码下采样（面积平均）也走这里。
pub(crate) fn window_average(
    plane: &[f32],
    in_h: usize,
    in_w: usize,
    kernel_size: (usize, usize),
    stride: (usize, usize),
) -> (Vec<f32>, usize, usize) {
    let (k_h, k_w) = kernel_size;
    let (s_h, s_w) = stride;
    let out_h = (in_h - k_h) / s_h + 1;
    let out_w = (in_w - k_w) / s_w + 1;
    let window = (k_h * k_w) as f32;

    let mut out = vec![0.0f32; out_h * out_w];
    for oh in 0..out_h {
        for ow in 0..out_w {
            let mut acc = 0.0;
            for kh in 0..k_h {
                for kw in 0..k_w {
                    acc += plane[(oh * s_h + kh) * in_w + (ow * s_w + kw)];
                }
            }
            out[oh * out_w + ow] = acc / window;
        }
    }
    (out, out_h, out_w)
}

impl TraitLayer for AvgPool2d {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "AvgPool2d"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, PipelineError> {
        let (batch_size, channels, in_h, in_w) =
            check_activation_4d(&format!("平均池化层{}", self.name), input)?;
        let (k_h, k_w) = self.kernel_size;
        if k_h > in_h || k_w > in_w {
            return Err(PipelineError::InvalidOperation(format!(
                "平均池化层{}的池化窗口 {}x{} 超出输入尺寸 {}x{}",
                self.name, k_h, k_w, in_h, in_w
            )));
        }

        let values = input.to_vec();
        let plane_size = in_h * in_w;
        let kernel_size = self.kernel_size;
        let stride = self.stride;
        let batch_results: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_output = Vec::new();
                for c in 0..channels {
                    let offset = (b * channels + c) * plane_size;
                    let (pooled, _, _) = window_average(
                        &values[offset..offset + plane_size],
                        in_h,
                        in_w,
                        kernel_size,
                        stride,
                    );
                    sample_output.extend(pooled);
                }
                sample_output
            })
            .collect();

        let (s_h, s_w) = self.stride;
        let out_h = (in_h - k_h) / s_h + 1;
        let out_w = (in_w - k_w) / s_w + 1;
        let all_output: Vec<f32> = batch_results.into_iter().flatten().collect();
        self.input_shape = Some(input.shape().to_vec());
        Ok(Tensor::new(
            &all_output,
            &[batch_size, channels, out_h, out_w],
        ))
    }

    /// 平均池化的梯度：上游梯度均匀摊回窗口内各位置
    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError> {
        let input_shape = self.input_shape.as_ref().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "平均池化层{}缺少前向缓存，需先执行前向传播",
                self.name
            ))
        })?;
        let grad_shape = upstream_grad.shape();
        let (batch_size, channels, out_h, out_w) =
            (grad_shape[0], grad_shape[1], grad_shape[2], grad_shape[3]);
        let (in_h, in_w) = (input_shape[2], input_shape[3]);
        let (k_h, k_w) = self.kernel_size;
        let (s_h, s_w) = self.stride;
        let window = (k_h * k_w) as f32;
        let single_sample_size = channels * in_h * in_w;

        let batch_results: Vec<Vec<f32>> = (0..batch_size)
            .into_par_iter()
            .map(|b| {
                let mut sample_grad = vec![0.0f32; single_sample_size];
                for c in 0..channels {
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let g = upstream_grad[[b, c, oh, ow]] / window;
                            for kh in 0..k_h {
                                for kw in 0..k_w {
                                    let ih = oh * s_h + kh;
                                    let iw = ow * s_w + kw;
                                    sample_grad[c * in_h * in_w + ih * in_w + iw] += g;
                                }
                            }
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
