/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量除法：仅支持张量除以非零标量（纯数），除数为零时panic。
 */

use crate::errors::TensorError;
use crate::tensor::Tensor;
use std::ops::Div;

impl Div<f32> for &Tensor {
    type Output = Tensor;

    fn div(self, scalar: f32) -> Tensor {
        assert!(scalar != 0.0, "{}", TensorError::DivByZero);
        Tensor::from_array(self.data() / scalar)
    }
}

impl Div<f32> for Tensor {
    type Output = Self;

    fn div(self, scalar: f32) -> Self {
        &self / scalar
    }
}
