//! 媒体访问 - 时长探测、单帧抽取、低分辨率灰度采样

pub mod extractor;
pub mod ffmpeg;
pub mod mock;

use crate::core::error::VideoResult;
use crate::core::video::GrayFrame;
use std::path::Path;

pub use extractor::{ExtractedFrame, FrameExtractor};
pub use ffmpeg::FfmpegSource;
pub use mock::MockFrameSource;

/// 帧源：把 (视频, 时间戳) 变成一张 JPEG
pub trait FrameSource: Send + Sync {
    /// 可解码时长（秒），失败即视频不可读
    fn duration(&self, video: &Path) -> VideoResult<f64>;

    /// Write exactly one frame at `timestamp` to `output` as JPEG.
    fn extract_frame(&self, video: &Path, timestamp: f64, output: &Path) -> VideoResult<()>;

    /// 按 `fps` 采样 `size`×`size` 灰度帧，按时间排序
    fn sample_gray(&self, video: &Path, fps: f64, size: u32) -> VideoResult<Vec<GrayFrame>>;
}
