/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量的归约与逐元素变换
 */

use crate::tensor::Tensor;
use ndarray::Zip;

impl Tensor {
    /// 对张量中的所有元素求和，返回纯数
    pub fn sum(&self) -> f32 {
        let mut value = 0.0;
        Zip::from(self.data()).for_each(|a| value += a);
        value
    }

    /// 所有元素的算术平均值，空张量返回0
    pub fn mean(&self) -> f32 {
        if self.size() == 0 {
            0.0
        } else {
            self.sum() / self.size() as f32
        }
    }

    /// 逐元素映射，返回新张量
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32,
    {
        Tensor::from_array(self.data().mapv(f))
    }

    /// 逐元素映射（就地）
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(f32) -> f32,
    {
        self.data.mapv_inplace(f);
    }
}
