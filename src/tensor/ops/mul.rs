/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量乘法：哈达玛积（逐元素）与数乘的结合。
 *                 1. 两个张量形状严格一致时逐元素相乘；
 *                 2. 其中一方为标量（或纯数）时广播到另一方的每个元素；
 *                 3. 否则panic。注意与线性代数的矩阵乘法不同，后者请用`mat_mul`。
 */

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::Mul;

fn check_shapes(a: &Tensor, b: &Tensor) {
    assert!(
        a.is_same_shape(b) || a.is_scalar() || b.is_scalar(),
        "{}",
        TensorError::OperatorError {
            operator: Operator::Mul,
            tensor1_shape: a.shape().to_vec(),
            tensor2_shape: b.shape().to_vec(),
        }
    );
}

impl Mul for &Tensor {
    type Output = Tensor;

    fn mul(self, other: Self) -> Tensor {
        check_shapes(self, other);
        if self.is_scalar() && !other.is_scalar() {
            Tensor::from_array(other.data() * self.number().unwrap())
        } else if other.is_scalar() && !self.is_scalar() {
            Tensor::from_array(self.data() * other.number().unwrap())
        } else {
            Tensor::from_array(self.data() * other.data())
        }
    }
}

impl Mul for Tensor {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        &self * &other
    }
}

impl Mul<f32> for &Tensor {
    type Output = Tensor;

    fn mul(self, scalar: f32) -> Tensor {
        Tensor::from_array(self.data() * scalar)
    }
}

impl Mul<f32> for Tensor {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        &self * scalar
    }
}

impl Mul<Tensor> for f32 {
    type Output = Tensor;

    fn mul(self, tensor: Tensor) -> Tensor {
        &tensor * self
    }
}

impl Mul<&Tensor> for f32 {
    type Output = Tensor;

    fn mul(self, tensor: &Tensor) -> Tensor {
        tensor * self
    }
}
