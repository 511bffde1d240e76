use super::Tensor;
use ndarray::NdIndex;
use ndarray::IxDyn;
use std::ops::{Index, IndexMut};

// 引用式索引：`t[[b, c, h, w]]`、`t[[r, c]]`等，维数由索引数组长度决定
impl<I> Index<I> for Tensor
where
    I: NdIndex<IxDyn>,
{
    type Output = f32;

    fn index(&self, index: I) -> &Self::Output {
        &self.data[index]
    }
}

impl<I> IndexMut<I> for Tensor
where
    I: NdIndex<IxDyn>,
{
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.data[index]
    }
}
