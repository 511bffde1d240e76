use super::TraitLayer;
use crate::nn::pipeline::PipelineError;
use crate::tensor::Tensor;

/// ReLU激活层
///
/// 前向：`max(x, 0)`；反向：输入为正的位置透传上游梯度，其余位置梯度为0。
#[derive(Clone, Debug)]
pub struct ReLU {
    name: String,
    // 前向缓存：输入为正的掩码
    mask: Option<Tensor>,
}

impl ReLU {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mask: None,
        }
    }
}

impl TraitLayer for ReLU {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "ReLU"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, PipelineError> {
        self.mask = Some(input.map(|x| if x > 0.0 { 1.0 } else { 0.0 }));
        Ok(input.map(|x| x.max(0.0)))
    }

    fn backward(&self, upstream_grad: &Tensor) -> Result<Tensor, PipelineError> {
        let mask = self.mask.as_ref().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "ReLU层{}缺少前向缓存，需先执行前向传播",
                self.name
            ))
        })?;
        if !mask.is_same_shape(upstream_grad) {
            return Err(PipelineError::ShapeMismatch {
                expected: mask.shape().to_vec(),
                got: upstream_grad.shape().to_vec(),
                message: format!("ReLU层{}的上游梯度形状与前向输入不符", self.name),
            });
        }
        Ok(mask * upstream_grad)
    }
}
