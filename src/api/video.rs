//! 视频分析器 - 单个视频：选帧 + 拼图 + 报告

use crate::core::config::AnalyzerConfig;
use crate::core::error::{VideoError, VideoResult};
use crate::core::media::{FfmpegSource, FrameSource};
use crate::core::transcript::{write_transcript, SpeechSegment};
use crate::frame_extractor::{ContactSheet, FrameSelector};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SHEET_FILE: &str = "final_sheet.jpg";
pub const REPORT_FILE: &str = "selection_report.txt";
pub const TRANSCRIPT_FILE: &str = "transcript_detailed.txt";
pub const CACHE_DIR: &str = "cache_images";

/// 单个视频任务：视频路径 + 转写句段 + 输出目录
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub video: PathBuf,
    pub segments: Vec<SpeechSegment>,
    pub output_dir: PathBuf,
}

impl VideoJob {
    pub fn new(video: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            segments: Vec::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_segments(mut self, segments: Vec<SpeechSegment>) -> Self {
        self.segments = segments;
        self
    }
}

#[derive(Debug, Clone)]
pub struct VideoOutcome {
    pub video: PathBuf,
    pub duration: f64,
    pub sheet: PathBuf,
    pub report: PathBuf,
    /// 九宫格顺序，9 项
    pub frames: Vec<(f64, PathBuf)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// 分析上下文 - 配置 + 帧源，显式传入而非全局单例
///
/// ```ignore
/// let analyzer = VideoAnalyzer::new(AnalyzerConfig::default().with_env_overrides())?;
/// let outcome = analyzer.analyze(&VideoJob::new("ad.mp4", "out/ad").with_segments(segments))?;
/// println!("{:?}", outcome.sheet);
/// ```
pub struct VideoAnalyzer {
    config: AnalyzerConfig,
    source: Arc<dyn FrameSource>,
    stats: Arc<Mutex<AnalyzerStats>>,
}

impl VideoAnalyzer {
    /// 使用 ffmpeg/ffprobe 作为帧源
    pub fn new(config: AnalyzerConfig) -> VideoResult<Self> {
        config.validate()?;
        let source = Arc::new(FfmpegSource::new(&config.media));
        Ok(Self::with_source(config, source))
    }

    pub fn with_source(config: AnalyzerConfig, source: Arc<dyn FrameSource>) -> Self {
        info!("🎬 VideoAnalyzer: created ({} workers)", config.batch.workers);
        Self {
            config,
            source,
            stats: Arc::new(Mutex::new(AnalyzerStats::default())),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn stats(&self) -> AnalyzerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = AnalyzerStats::default();
        }
    }

    /// 选 9 帧，在输出目录写出 `final_sheet.jpg` 和 `selection_report.txt`
    pub fn analyze(&self, job: &VideoJob) -> VideoResult<VideoOutcome> {
        let result = self.run(job);
        if let Ok(mut stats) = self.stats.lock() {
            stats.processed += 1;
            if result.is_ok() {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
        }
        if let Err(e) = &result {
            error!("❌ {:?}: {}", job.video, e);
        }
        result
    }

    fn run(&self, job: &VideoJob) -> VideoResult<VideoOutcome> {
        std::fs::create_dir_all(&job.output_dir)?;
        let cache_dir = job.output_dir.join(CACHE_DIR);

        let outcome = FrameSelector::new(self.source.as_ref(), &self.config).select_nine(
            &job.video,
            &job.segments,
            &cache_dir,
        )?;

        let report_path = job.output_dir.join(REPORT_FILE);
        outcome.report.write_to(&report_path)?;

        let transcript_path = job.output_dir.join(TRANSCRIPT_FILE);
        if !job.segments.is_empty() && !transcript_path.exists() {
            write_transcript(&transcript_path, &job.segments)?;
        }

        let frames = outcome.frame_list();
        let sheet_path = job.output_dir.join(SHEET_FILE);
        let written = ContactSheet::new(&self.config.sheet).assemble(&frames, &sheet_path)?;
        let sheet = written.into_iter().next().ok_or_else(|| VideoError::NoFrames {
            path: job.video.clone(),
        })?;

        info!("✅ {:?} -> {:?}", job.video, sheet);
        Ok(VideoOutcome {
            video: job.video.clone(),
            duration: outcome.duration,
            sheet,
            report: report_path,
            frames,
        })
    }
}

impl Drop for VideoAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ VideoAnalyzer: released");
    }
}

/// 视频的输出目录：以文件名（不含扩展名）命名
pub fn output_dir_for(video: &Path, output_root: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_root.join(stem)
}
