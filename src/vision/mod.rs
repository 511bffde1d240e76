/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 视觉预处理---图像与激活张量之间的纯函数转换
 */

mod process;

pub use process::{Vision, BGR_MEAN};
