mod gradient_check;
mod guided;
mod node_hist_loss;
mod node_style_loss;
mod pipeline;

use crate::nn::Backbone;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 10层骨干：conv relu conv relu pool conv relu conv relu pool（3→4→4→6→6通道），
/// 卷积全部3x3/pad1，序号规格"5"/"10"等在此骨干上有效
pub(crate) fn backbone_10(seed: u64) -> Backbone {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut random_tensor = |shape: &[usize]| {
        let len = shape.iter().product::<usize>();
        let data = (0..len)
            .map(|_| rng.gen_range(-0.5f32..0.5f32))
            .collect::<Vec<_>>();
        Tensor::new(&data, shape)
    };

    let mut backbone = Backbone::new();
    let (w1, b1) = (random_tensor(&[4, 3, 3, 3]), random_tensor(&[4]));
    backbone.add_conv2d("conv1_1", w1, b1, (1, 1), (1, 1)).unwrap();
    backbone.add_relu("relu1_1");
    let (w2, b2) = (random_tensor(&[4, 4, 3, 3]), random_tensor(&[4]));
    backbone.add_conv2d("conv1_2", w2, b2, (1, 1), (1, 1)).unwrap();
    backbone.add_relu("relu1_2");
    backbone.add_max_pool2d("pool1", (2, 2), None);
    let (w3, b3) = (random_tensor(&[6, 4, 3, 3]), random_tensor(&[6]));
    backbone.add_conv2d("conv2_1", w3, b3, (1, 1), (1, 1)).unwrap();
    backbone.add_relu("relu2_1");
    let (w4, b4) = (random_tensor(&[6, 6, 3, 3]), random_tensor(&[6]));
    backbone.add_conv2d("conv2_2", w4, b4, (1, 1), (1, 1)).unwrap();
    backbone.add_relu("relu2_2");
    backbone.add_max_pool2d("pool2", (2, 2), None);
    backbone
}

/// 固定种子的测试图像 [batch, 3, size, size]，值域[0, 1)
pub(crate) fn test_image(seed: u64, batch: usize, size: usize) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..batch * 3 * size * size)
        .map(|_| rng.gen_range(0.0f32..1.0))
        .collect::<Vec<_>>();
    Tensor::new(&data, &[batch, 3, size, size])
}
