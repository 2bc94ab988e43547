use super::anchors::{Anchor, AnchorSource};
use crate::core::error::{VideoError, VideoResult};
use crate::core::media::ExtractedFrame;
use crate::core::video::{FrameScore, FrameScorer, HashBundle, PerceptualHasher};
use image::DynamicImage;
use log::warn;
use std::path::{Path, PathBuf};

/// 已抽取并打分的候选帧
#[derive(Debug, Clone)]
pub struct Candidate {
    pub timestamp: f64,
    pub path: PathBuf,
    pub hashes: HashBundle,
    pub score: FrameScore,
    pub sources: Vec<AnchorSource>,
}

impl Candidate {
    /// 对抽出的帧计算哈希和分数；此时图片无法读取属于抽帧契约被破坏，返回 `InvalidFrame`
    pub fn build(frame: ExtractedFrame, anchor: &Anchor) -> VideoResult<Self> {
        let img = image::open(&frame.path).map_err(|e| VideoError::InvalidFrame {
            path: frame.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(
            frame.timestamp,
            frame.path,
            &img,
            anchor.sources.clone(),
            anchor.event_score,
        ))
    }

    pub fn from_image(
        timestamp: f64,
        path: PathBuf,
        img: &DynamicImage,
        sources: Vec<AnchorSource>,
        event_score: f64,
    ) -> Self {
        Self {
            timestamp,
            path,
            hashes: PerceptualHasher::hash(img),
            score: FrameScorer::score(img, event_score),
            sources,
        }
    }

    pub fn composite(&self) -> f64 {
        self.score.composite
    }

    pub fn is_similar(&self, other: &Candidate, threshold: u32) -> bool {
        PerceptualHasher::is_similar(&self.hashes, &other.hashes, threshold)
    }

    pub fn source_label(&self) -> String {
        self.sources
            .iter()
            .map(AnchorSource::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// 删除被淘汰的帧文件，文件已不存在时忽略
pub fn remove_frame_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("⚠️ Failed to delete {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_build_from_extracted_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0000.jpg");
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(160, 90, |x, _| {
            if x < 80 {
                Rgb([20, 20, 20])
            } else {
                Rgb([220, 220, 220])
            }
        }));
        img.save(&path).unwrap();

        let mut anchor = Anchor::event(2.0, 1.5);
        anchor.absorb(&Anchor::new(2.0, AnchorSource::Periodic));
        let candidate = Candidate::build(
            ExtractedFrame {
                timestamp: 2.0,
                path: path.clone(),
            },
            &anchor,
        )
        .unwrap();

        assert_eq!(candidate.timestamp, 2.0);
        assert_eq!(candidate.score.event_score, 1.5);
        assert!(candidate.score.sharpness > 0.0);
        assert_eq!(candidate.source_label(), "periodic+event");
        assert!(candidate.is_similar(&candidate, 5));
    }

    #[test]
    fn test_build_rejects_corrupt_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0001.jpg");
        std::fs::write(&path, b"garbage").unwrap();
        let result = Candidate::build(
            ExtractedFrame { timestamp: 1.0, path },
            &Anchor::new(1.0, AnchorSource::Speech),
        );
        assert!(matches!(result, Err(VideoError::InvalidFrame { .. })));
    }

    #[test]
    fn test_remove_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        remove_frame_file(&path);
        std::fs::write(&path, b"x").unwrap();
        remove_frame_file(&path);
        assert!(!path.exists());
    }
}
