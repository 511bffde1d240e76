/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量加法：两个同形状张量逐元素相加，或张量与标量（纯数）相加。
 *                 形状不一致且无一方是标量时panic。
 */

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::Add;

fn check_shapes(a: &Tensor, b: &Tensor) {
    assert!(
        a.is_same_shape(b) || a.is_scalar() || b.is_scalar(),
        "{}",
        TensorError::OperatorError {
            operator: Operator::Add,
            tensor1_shape: a.shape().to_vec(),
            tensor2_shape: b.shape().to_vec(),
        }
    );
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, other: Self) -> Tensor {
        check_shapes(self, other);
        if self.is_scalar() && !other.is_scalar() {
            Tensor::from_array(self.number().unwrap() + other.data())
        } else if other.is_scalar() && !self.is_scalar() {
            Tensor::from_array(other.number().unwrap() + self.data())
        } else {
            Tensor::from_array(self.data() + other.data())
        }
    }
}

impl Add for Tensor {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        &self + &other
    }
}

impl Add<f32> for &Tensor {
    type Output = Tensor;

    fn add(self, scalar: f32) -> Tensor {
        Tensor::from_array(self.data() + scalar)
    }
}

impl Add<f32> for Tensor {
    type Output = Self;

    fn add(self, scalar: f32) -> Self {
        &self + scalar
    }
}

impl Add<Tensor> for f32 {
    type Output = Tensor;

    fn add(self, tensor: Tensor) -> Tensor {
        &tensor + self
    }
}
