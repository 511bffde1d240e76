use crate::tensor::Tensor;
use image::{GrayImage, Rgb, RgbImage};

/// Caffe风格的BGR通道均值（VGG预训练网络的输入约定）
pub const BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

pub struct Vision;

impl Vision {
    /// 图像 → 激活张量 [1, 3, H, W]：RGB转BGR、保持0~255值域、减去通道均值。
    /// 逆操作见`deprocess`。
    pub fn preprocess(img: &RgbImage) -> Tensor {
        let (w, h) = img.dimensions();
        let (w, h) = (w as usize, h as usize);
        let mut data = vec![0.0f32; 3 * h * w];
        for y in 0..h {
            for x in 0..w {
                let Rgb([r, g, b]) = *img.get_pixel(x as u32, y as u32);
                // BGR通道顺序
                data[y * w + x] = b as f32 - BGR_MEAN[0];
                data[h * w + y * w + x] = g as f32 - BGR_MEAN[1];
                data[2 * h * w + y * w + x] = r as f32 - BGR_MEAN[2];
            }
        }
        Tensor::new(&data, &[1, 3, h, w])
    }

    /// 激活张量 [1, 3, H, W] → 图像：加回通道均值、BGR转RGB、截断到0~255。
    ///
    /// # Panics
    /// 张量形状不是 [1, 3, H, W] 时panic
    pub fn deprocess(tensor: &Tensor) -> RgbImage {
        let shape = tensor.shape();
        assert!(
            shape.len() == 4 && shape[0] == 1 && shape[1] == 3,
            "deprocess的输入必须是 [1, 3, H, W]，得到 {:?}",
            shape
        );
        let (h, w) = (shape[2], shape[3]);
        let mut img = RgbImage::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let b = (tensor[[0, 0, y, x]] + BGR_MEAN[0]).clamp(0.0, 255.0).round() as u8;
                let g = (tensor[[0, 1, y, x]] + BGR_MEAN[1]).clamp(0.0, 255.0).round() as u8;
                let r = (tensor[[0, 2, y, x]] + BGR_MEAN[2]).clamp(0.0, 255.0).round() as u8;
                img.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
            }
        }
        img
    }

    /// 剃边（shave）：候选与目标因填充导致输出尺寸不一致时，
    /// 由调用方裁掉四周`border`个像素对齐空间尺寸。
    ///
    /// # Panics
    /// 张量不是4D，或裁剪后尺寸为零时panic
    pub fn shave(tensor: &Tensor, border: usize) -> Tensor {
        let shape = tensor.shape();
        assert!(shape.len() == 4, "shave的输入必须是4D [B, C, H, W]");
        let (batch_size, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        assert!(
            h > 2 * border && w > 2 * border,
            "shave裁剪量{}过大：空间尺寸为{}x{}",
            border,
            h,
            w
        );
        let (out_h, out_w) = (h - 2 * border, w - 2 * border);
        let mut data = Vec::with_capacity(batch_size * channels * out_h * out_w);
        for b in 0..batch_size {
            for c in 0..channels {
                for y in 0..out_h {
                    for x in 0..out_w {
                        data.push(tensor[[b, c, y + border, x + border]]);
                    }
                }
            }
        }
        Tensor::new(&data, &[batch_size, channels, out_h, out_w])
    }

    /// 灰度图序列 → 引导掩码张量 [G, H, W]，像素归一化到0~1。
    ///
    /// # Panics
    /// 序列为空或各图尺寸不一致时panic
    pub fn guides_from_gray(imgs: &[GrayImage]) -> Tensor {
        assert!(!imgs.is_empty(), "引导掩码序列不能为空");
        let (w, h) = imgs[0].dimensions();
        let mut data = Vec::with_capacity(imgs.len() * (w * h) as usize);
        for img in imgs {
            assert_eq!(
                img.dimensions(),
                (w, h),
                "引导掩码的尺寸必须一致，得到 {:?} vs {:?}",
                img.dimensions(),
                (w, h)
            );
            for y in 0..h {
                for x in 0..w {
                    data.push(img.get_pixel(x, y).0[0] as f32 / 255.0);
                }
            }
        }
        Tensor::new(&data, &[imgs.len(), h as usize, w as usize])
    }
}
