/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 骨干网络装配---冻结分类网络的命名层序列
 *
 * 预训练权重从npz档案加载：每个卷积层按 "<层名>.weight.npy" / "<层名>.bias.npy"
 * 两个条目取权重与偏置，缺失或形状不符在构建期即报错。
 */

use super::layer::{AvgPool2d, Conv2d, Layer, MaxPool2d, ReLU};
use super::pipeline::PipelineError;
use crate::tensor::Tensor;
use ndarray_npy::NpzReader;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::Path;

/// 骨干层的声明（权重在`from_npz`时按层名从档案读取）
#[derive(Debug, Clone)]
pub enum LayerDef {
    Conv2d {
        name: String,
        stride: (usize, usize),
        padding: (usize, usize),
    },
    ReLU {
        name: String,
    },
    MaxPool2d {
        name: String,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    },
    AvgPool2d {
        name: String,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    },
}

/// 骨干网络：有序命名层的构建器，构建完成后交给判据做层手术
#[derive(Default, Debug)]
pub struct Backbone {
    layers: Vec<Layer>,
}

impl Backbone {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn add_conv2d(
        &mut self,
        name: &str,
        weight: Tensor,
        bias: Tensor,
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Result<&mut Self, PipelineError> {
        self.layers
            .push(Layer::Conv2d(Conv2d::new(name, weight, bias, stride, padding)?));
        Ok(self)
    }

    pub fn add_relu(&mut self, name: &str) -> &mut Self {
        self.layers.push(Layer::ReLU(ReLU::new(name)));
        self
    }

    pub fn add_max_pool2d(
        &mut self,
        name: &str,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    ) -> &mut Self {
        self.layers
            .push(Layer::MaxPool2d(MaxPool2d::new(name, kernel_size, stride)));
        self
    }

    pub fn add_avg_pool2d(
        &mut self,
        name: &str,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    ) -> &mut Self {
        self.layers
            .push(Layer::AvgPool2d(AvgPool2d::new(name, kernel_size, stride)));
        self
    }

    pub(crate) fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    /// 按层声明从npz档案装配骨干，卷积权重缺失或形状不符即报错
    pub fn from_npz(path: impl AsRef<Path>, defs: &[LayerDef]) -> Result<Self, PipelineError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            PipelineError::ComputationError(format!(
                "无法打开权重档案{}: {e}",
                path.as_ref().display()
            ))
        })?;
        let mut npz = NpzReader::new(file).map_err(|e| {
            PipelineError::ComputationError(format!("无法解析npz档案: {e}"))
        })?;

        let mut backbone = Self::new();
        for def in defs {
            match def {
                LayerDef::Conv2d {
                    name,
                    stride,
                    padding,
                } => {
                    let weight: ndarray::ArrayD<f32> =
                        npz.by_name(&format!("{name}.weight.npy")).map_err(|e| {
                            PipelineError::ComputationError(format!(
                                "无法读取{name}.weight: {e}"
                            ))
                        })?;
                    let bias: ndarray::ArrayD<f32> =
                        npz.by_name(&format!("{name}.bias.npy")).map_err(|e| {
                            PipelineError::ComputationError(format!("无法读取{name}.bias: {e}"))
                        })?;
                    backbone.add_conv2d(
                        name,
                        Tensor::from_array(weight),
                        Tensor::from_array(bias),
                        *stride,
                        *padding,
                    )?;
                }
                LayerDef::ReLU { name } => {
                    backbone.add_relu(name);
                }
                LayerDef::MaxPool2d {
                    name,
                    kernel_size,
                    stride,
                } => {
                    backbone.add_max_pool2d(name, *kernel_size, *stride);
                }
                LayerDef::AvgPool2d {
                    name,
                    kernel_size,
                    stride,
                } => {
                    backbone.add_avg_pool2d(name, *kernel_size, *stride);
                }
            }
        }
        Ok(backbone)
    }

    /// 固定种子的小型VGG风格骨干（conv3x3/pad1 → relu → pool 两组），
    /// 供测试与演示使用；权重服从小幅均匀分布，可复现。
    pub fn slim(seed: u64) -> Result<Self, PipelineError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut random_tensor = |shape: &[usize]| {
            let len = shape.iter().product::<usize>();
            let data = (0..len)
                .map(|_| rng.gen_range(-0.5f32..0.5f32))
                .collect::<Vec<_>>();
            Tensor::new(&data, shape)
        };

        let mut backbone = Self::new();
        let conv1_w = random_tensor(&[4, 3, 3, 3]);
        let conv1_b = random_tensor(&[4]);
        backbone.add_conv2d("conv1_1", conv1_w, conv1_b, (1, 1), (1, 1))?;
        backbone.add_relu("relu1_1");
        backbone.add_max_pool2d("pool1", (2, 2), None);
        let conv2_w = random_tensor(&[4, 4, 3, 3]);
        let conv2_b = random_tensor(&[4]);
        backbone.add_conv2d("conv2_1", conv2_w, conv2_b, (1, 1), (1, 1))?;
        backbone.add_relu("relu2_1");
        backbone.add_max_pool2d("pool2", (2, 2), None);
        Ok(backbone)
    }
}
