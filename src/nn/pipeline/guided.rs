/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 引导式双分支流水线：图像分支 + 引导掩码分支
 *
 * 引导分支与图像分支同步行进：骨干层中的池化层被镜像为掩码的面积平均下采样
 * （保持掩码平滑且空间对齐），其余层对掩码是保持操作（3x3/pad1卷积与ReLU
 * 不改变空间尺寸）。观察节点在检查点同时看到 (激活, 当前掩码)。
 */

use super::{Pipeline, PipelineError, Stage, Stages};
use crate::nn::layer::{window_average, Layer};
use crate::tensor::Tensor;

/// 引导分支在某个阶段对掩码做的操作
#[derive(Clone, Debug)]
pub enum GuideOp {
    /// 掩码原样保持（空间尺寸不变的层）
    Hold,
    /// 面积平均下采样（镜像图像分支的池化层）
    AvgDown {
        kernel_size: (usize, usize),
        stride: (usize, usize),
    },
}

impl GuideOp {
    /// 对掩码 [G, H, W] 施加本操作
    pub(crate) fn apply(&self, guide: &Tensor) -> Result<Tensor, PipelineError> {
        match self {
            Self::Hold => Ok(guide.clone()),
            Self::AvgDown {
                kernel_size,
                stride,
            } => {
                let shape = guide.shape();
                if shape.len() != 3 {
                    return Err(PipelineError::ShapeMismatch {
                        expected: vec![0, 0, 0],
                        got: shape.to_vec(),
                        message: "引导掩码必须是3D [G, H, W]".to_string(),
                    });
                }
                let (guide_count, in_h, in_w) = (shape[0], shape[1], shape[2]);
                if kernel_size.0 > in_h || kernel_size.1 > in_w {
                    return Err(PipelineError::InvalidOperation(format!(
                        "引导掩码下采样窗口 {}x{} 超出掩码尺寸 {}x{}",
                        kernel_size.0, kernel_size.1, in_h, in_w
                    )));
                }
                let values = guide.to_vec();
                let plane = in_h * in_w;
                let mut out = Vec::new();
                let mut out_hw = (0, 0);
                for g in 0..guide_count {
                    let (pooled, out_h, out_w) = window_average(
                        &values[g * plane..(g + 1) * plane],
                        in_h,
                        in_w,
                        *kernel_size,
                        *stride,
                    );
                    out.extend(pooled);
                    out_hw = (out_h, out_w);
                }
                Ok(Tensor::new(&out, &[guide_count, out_hw.0, out_hw.1]))
            }
        }
    }
}

/// 引导式流水线的阶段：图像分支阶段 + 同步的掩码操作
#[derive(Clone, Debug)]
pub struct GuidedStage {
    pub(crate) stage: Stage,
    pub(crate) guide_op: GuideOp,
}

impl Pipeline {
    /// 把普通流水线改建为引导式双分支拓扑（分支-汇合的显式组合，而非克隆网络）：
    /// 每个池化层镜像为掩码的面积平均下采样，其余阶段掩码保持。
    /// 已插入的观察节点（内容/DeepDream）原样保留在图像分支路径上。
    pub(crate) fn into_guided(self) -> Self {
        let Pipeline {
            stages,
            eval_mode,
            next_observer_id,
        } = self;
        let stages = match stages {
            Stages::Guided(stages) => Stages::Guided(stages),
            Stages::Plain(stages) => Stages::Guided(
                stages
                    .into_iter()
                    .map(|stage| {
                        let guide_op = match &stage {
                            Stage::Backbone(Layer::MaxPool2d(pool)) => GuideOp::AvgDown {
                                kernel_size: pool.kernel_size(),
                                stride: pool.stride(),
                            },
                            Stage::Backbone(Layer::AvgPool2d(pool)) => GuideOp::AvgDown {
                                kernel_size: pool.kernel_size(),
                                stride: pool.stride(),
                            },
                            _ => GuideOp::Hold,
                        };
                        GuidedStage { stage, guide_op }
                    })
                    .collect(),
            ),
        };
        Self {
            stages,
            eval_mode,
            next_observer_id,
        }
    }
}
