//! # Only Style
//!
//! `only_style`项目旨在用纯rust复刻[texture_nets](https://github.com/DmitryUlyanov/texture_nets)
//! 与[fast-neural-style](https://github.com/jcjohnson/fast-neural-style)这类基于感知损失
//! （perceptual loss）的前馈风格迁移训练核心：在冻结的预训练分类网络中插入损失观察节点，
//! 先捕获目标统计量（内容激活、Gram矩阵、直方图），再对候选图像计算复合损失与梯度。
//!

pub mod data;
pub mod errors;
pub mod nn;
pub mod tensor;
pub mod utils;
pub mod vision;
