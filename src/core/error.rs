use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// 无法获取时长，该视频直接放弃
    #[error("Video unreadable: {path:?} ({reason})")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Frame decode failed at {timestamp:.2}s: {reason}")]
    Decode { timestamp: f64, reason: String },
    /// 抽出的帧无法哈希/打分，属于抽帧契约被破坏
    #[error("Invalid frame {path:?}: {reason}")]
    InvalidFrame { path: PathBuf, reason: String },
    #[error("No usable frame for {path:?}")]
    NoFrames { path: PathBuf },
    #[error("Transcript error at line {line}: {reason}")]
    Transcript { line: usize, reason: String },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl VideoError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(timestamp: f64, reason: impl Into<String>) -> Self {
        Self::Decode {
            timestamp,
            reason: reason.into(),
        }
    }

    /// 批处理中应记录并跳过的单视频失败
    pub fn is_video_failure(&self) -> bool {
        matches!(
            self,
            VideoError::Unreadable { .. } | VideoError::NoFrames { .. }
        )
    }
}

pub type VideoResult<T> = Result<T, VideoError>;
