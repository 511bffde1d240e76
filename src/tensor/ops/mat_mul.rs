/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 矩阵乘法（线性代数意义）：仅支持2阶张量，内维不一致时panic。
 *                 Gram矩阵（F·Fᵀ）的计算依赖于此。
 */

use crate::errors::TensorError;
use crate::tensor::Tensor;
use ndarray::Ix2;

impl Tensor {
    /// 2阶张量的矩阵乘法：[m, k] × [k, n] → [m, n]
    pub fn mat_mul(&self, other: &Tensor) -> Tensor {
        assert!(
            self.dimension() == 2
                && other.dimension() == 2
                && self.shape()[1] == other.shape()[0],
            "{}",
            TensorError::MatMulShape {
                left: self.shape().to_vec(),
                right: other.shape().to_vec(),
            }
        );

        let lhs = self.data().clone().into_dimensionality::<Ix2>().unwrap();
        let rhs = other.data().clone().into_dimensionality::<Ix2>().unwrap();
        let product = lhs.dot(&rhs);
        Tensor::from_array(product.into_dyn())
    }
}
