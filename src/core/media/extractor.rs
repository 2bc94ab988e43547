use super::FrameSource;
use crate::core::error::VideoResult;
use log::{debug, warn};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrame {
    pub timestamp: f64,
    pub path: PathBuf,
}

/// 按时间戳抽帧，文件名序号单调递增，多次调用不会互相覆盖
pub struct FrameExtractor<'a> {
    source: &'a dyn FrameSource,
    output_dir: PathBuf,
    next_index: usize,
}

impl<'a> FrameExtractor<'a> {
    pub fn new(source: &'a dyn FrameSource, output_dir: impl Into<PathBuf>, start_index: usize) -> VideoResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            source,
            output_dir,
            next_index: start_index,
        })
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 每个时间戳抽一帧；解码失败的直接跳过，结果可能少于输入
    pub fn extract(&mut self, video: &Path, timestamps: &[f64]) -> Vec<ExtractedFrame> {
        let mut frames = Vec::with_capacity(timestamps.len());
        for &timestamp in timestamps {
            if let Some(frame) = self.extract_one(video, timestamp) {
                frames.push(frame);
            }
        }
        debug!(
            "🖼️ Extracted {}/{} frames into {:?}",
            frames.len(),
            timestamps.len(),
            self.output_dir
        );
        frames
    }

    pub fn extract_one(&mut self, video: &Path, timestamp: f64) -> Option<ExtractedFrame> {
        let path = self.output_dir.join(format!("frame_{:04}.jpg", self.next_index));
        self.next_index += 1;

        match self.source.extract_frame(video, timestamp, &path) {
            Ok(()) if path.exists() => Some(ExtractedFrame { timestamp, path }),
            Ok(()) => {
                warn!("⚠️ No frame written at {:.2}s", timestamp);
                None
            }
            Err(e) => {
                warn!("⚠️ {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::MockFrameSource;

    #[test]
    fn test_indices_continue_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(10.0);
        let video = Path::new("ad.mp4");
        let mut extractor = FrameExtractor::new(&source, dir.path(), 0).unwrap();

        let first = extractor.extract(video, &[1.0, 2.0]);
        let second = extractor.extract(video, &[3.0]);

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first[0].path.ends_with("frame_0000.jpg"));
        assert!(first[1].path.ends_with("frame_0001.jpg"));
        assert!(second[0].path.ends_with("frame_0002.jpg"));
        assert_eq!(extractor.next_index(), 3);
    }

    #[test]
    fn test_failed_timestamps_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(10.0).with_failing(|t| t > 5.0);
        let mut extractor = FrameExtractor::new(&source, dir.path(), 7).unwrap();

        let frames = extractor.extract(Path::new("ad.mp4"), &[1.0, 6.0, 4.0]);
        let stamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 4.0]);
        assert!(frames[0].path.ends_with("frame_0007.jpg"));
        assert!(frames[1].path.ends_with("frame_0009.jpg"));
    }
}
