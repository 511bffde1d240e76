/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量减法：两个同形状张量逐元素相减，或张量与标量（纯数）相减。
 *                 形状不一致且无一方是标量时panic。
 */

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::Sub;

fn check_shapes(a: &Tensor, b: &Tensor) {
    assert!(
        a.is_same_shape(b) || a.is_scalar() || b.is_scalar(),
        "{}",
        TensorError::OperatorError {
            operator: Operator::Sub,
            tensor1_shape: a.shape().to_vec(),
            tensor2_shape: b.shape().to_vec(),
        }
    );
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, other: Self) -> Tensor {
        check_shapes(self, other);
        if self.is_scalar() && !other.is_scalar() {
            Tensor::from_array(self.number().unwrap() - other.data())
        } else if other.is_scalar() && !self.is_scalar() {
            Tensor::from_array(self.data() - other.number().unwrap())
        } else {
            Tensor::from_array(self.data() - other.data())
        }
    }
}

impl Sub for Tensor {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        &self - &other
    }
}

impl Sub<f32> for &Tensor {
    type Output = Tensor;

    fn sub(self, scalar: f32) -> Tensor {
        Tensor::from_array(self.data() - scalar)
    }
}

impl Sub<f32> for Tensor {
    type Output = Self;

    fn sub(self, scalar: f32) -> Self {
        &self - scalar
    }
}

impl Sub<Tensor> for f32 {
    type Output = Tensor;

    fn sub(self, tensor: Tensor) -> Tensor {
        Tensor::from_array(self - tensor.data())
    }
}
