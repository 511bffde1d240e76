use super::Tensor;
use crate::errors::TensorError;
use std::collections::HashSet;

impl Tensor {
    /// 改变张量的形状并返回新张量（元素总数必须不变，否则panic）
    pub fn reshape(&self, shape: &[usize]) -> Self {
        let new_total_elements: usize = shape.iter().product();
        assert!(
            self.size() == new_total_elements,
            "{}",
            TensorError::IncompatibleShape
        );
        Self {
            data: self.data.clone().into_shape(shape).unwrap(),
        }
    }

    /// 展平为1维张量
    pub fn flatten(&self) -> Self {
        self.reshape(&[self.size()])
    }

    /// 交换张量的两个（以上）维度，并将其返回（不影响原张量）
    pub fn permute(&self, axes: &[usize]) -> Self {
        assert!(axes.len() >= 2, "{}", TensorError::PermuteNeedAtLeast2Dims);
        let unique_axes = axes.iter().copied().collect::<HashSet<_>>();
        assert!(
            unique_axes.len() == axes.len() && unique_axes.iter().all(|&a| a < self.dimension()),
            "{}",
            TensorError::PermuteNeedUniqueAndInRange
        );

        // permuted_axes只改变步幅，这里立即实体化为行主序，保证后续to_vec/reshape语义一致
        let permuted = self.data.clone().permuted_axes(axes);
        let shape = permuted.shape().to_vec();
        let data = permuted.iter().copied().collect::<Vec<_>>();
        Self::new(&data, &shape)
    }

    /// 2阶张量的转置
    pub fn transpose(&self) -> Self {
        if self.dimension() <= 1 {
            self.clone()
        } else {
            let mut axes: Vec<usize> = (0..self.dimension()).collect();
            axes.swap(0, 1);
            self.permute(&axes)
        }
    }
}
