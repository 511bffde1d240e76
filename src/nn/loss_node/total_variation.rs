use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

/// 全变差（total variation）正则项：直接作用于图像 [B, C, H, W]，不是流水线观察节点。
///
/// 各向异性平方形式：`loss = strength · Σ[(x[h+1]-x[h])² + (x[w+1]-x[w])²] / N`，
/// 返回 (标量损失, 对图像的梯度)。
pub fn total_variation(img: &Tensor, strength: f32) -> Result<(f32, Tensor), PipelineError> {
    let shape = img.shape();
    if shape.len() != 4 {
        return Err(PipelineError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            got: shape.to_vec(),
            message: "total_variation的输入必须是4D [batch, C, H, W]".to_string(),
        });
    }
    let (batch_size, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);
    let n = img.size() as f32;
    let scale = strength / n;

    let mut loss = 0.0f32;
    let mut grad = Tensor::zeros(shape);
    for b in 0..batch_size {
        for c in 0..channels {
            for y in 0..h {
                for x in 0..w {
                    if y + 1 < h {
                        let d = img[[b, c, y + 1, x]] - img[[b, c, y, x]];
                        loss += d * d;
                        grad[[b, c, y + 1, x]] += 2.0 * d * scale;
                        grad[[b, c, y, x]] -= 2.0 * d * scale;
                    }
                    if x + 1 < w {
                        let d = img[[b, c, y, x + 1]] - img[[b, c, y, x]];
                        loss += d * d;
                        grad[[b, c, y, x + 1]] += 2.0 * d * scale;
                        grad[[b, c, y, x]] -= 2.0 * d * scale;
                    }
                }
            }
        }
    }
    Ok((loss * scale, grad))
}
