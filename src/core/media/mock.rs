use super::FrameSource;
use crate::core::error::{VideoError, VideoResult};
use crate::core::video::GrayFrame;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const MOCK_WIDTH: u32 = 320;
const MOCK_HEIGHT: u32 = 180;
const BAND_COUNT: u32 = 12;

/// 合成视频源（测试与降级场景）
///
/// 每个场景点亮一条横带：不同场景的帧明显不同，同一场景的帧完全相同
pub struct MockFrameSource {
    duration: f64,
    scene_length: f64,
    failing: Option<Box<dyn Fn(f64) -> bool + Send + Sync>>,
    unreadable: HashSet<PathBuf>,
}

impl MockFrameSource {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            scene_length: 3.0,
            failing: None,
            unreadable: HashSet::new(),
        }
    }

    pub fn with_scene_length(mut self, seconds: f64) -> Self {
        self.scene_length = seconds;
        self
    }

    /// `pattern` 返回 true 的时间戳抽帧失败
    pub fn with_failing<F>(mut self, pattern: F) -> Self
    where
        F: Fn(f64) -> bool + Send + Sync + 'static,
    {
        self.failing = Some(Box::new(pattern));
        self
    }

    pub fn with_unreadable(mut self, video: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(video.into());
        self
    }

    pub fn scene_at(&self, timestamp: f64) -> u32 {
        if self.scene_length <= 0.0 {
            return 0;
        }
        ((timestamp.max(0.0) / self.scene_length).floor() as u32) % BAND_COUNT
    }

    pub fn render(&self, timestamp: f64) -> DynamicImage {
        let band = self.scene_at(timestamp);
        let band_h = MOCK_HEIGHT / BAND_COUNT;
        let img = RgbImage::from_fn(MOCK_WIDTH, MOCK_HEIGHT, |_, y| {
            if y / band_h == band {
                Rgb([235, 235, 235])
            } else {
                Rgb([25, 25, 25])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn check_readable(&self, video: &Path) -> VideoResult<()> {
        if self.unreadable.contains(video) {
            return Err(VideoError::unreadable(video, "mock: unreadable"));
        }
        Ok(())
    }
}

impl FrameSource for MockFrameSource {
    fn duration(&self, video: &Path) -> VideoResult<f64> {
        self.check_readable(video)?;
        Ok(self.duration)
    }

    fn extract_frame(&self, video: &Path, timestamp: f64, output: &Path) -> VideoResult<()> {
        self.check_readable(video)?;
        if timestamp < 0.0 || timestamp >= self.duration {
            return Err(VideoError::decode(timestamp, "mock: outside video"));
        }
        if self.failing.as_ref().map(|f| f(timestamp)).unwrap_or(false) {
            return Err(VideoError::decode(timestamp, "mock: forced failure"));
        }

        let mut writer = BufWriter::new(File::create(output)?);
        self.render(timestamp)
            .write_to(&mut writer, ImageOutputFormat::Jpeg(90))?;
        Ok(())
    }

    fn sample_gray(&self, video: &Path, fps: f64, size: u32) -> VideoResult<Vec<GrayFrame>> {
        self.check_readable(video)?;
        let mut frames = Vec::new();
        let mut index = 0u32;
        loop {
            let t = index as f64 / fps;
            if t >= self.duration {
                break;
            }
            frames.push(GrayFrame::from_image(&self.render(t), size, t));
            index += 1;
        }
        Ok(frames)
    }
}
