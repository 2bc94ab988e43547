//! 批处理 - 多个视频并行，单个失败不影响其他

use super::video::{output_dir_for, VideoAnalyzer, VideoJob, VideoOutcome, SHEET_FILE, TRANSCRIPT_FILE};
use crate::core::error::{VideoError, VideoResult};
use crate::core::transcript::{read_transcript, SpeechSegment};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 目录批处理结果（按视频）
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<VideoOutcome>,
    pub failed: Vec<(PathBuf, VideoError)>,
    /// 已有九宫格，跳过
    pub skipped: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

impl VideoAnalyzer {
    /// 在 `batch.workers` 个线程上并行处理，结果按任务顺序返回；
    /// 单个视频失败不影响其他视频
    pub fn process_batch(&self, jobs: &[VideoJob]) -> VideoResult<Vec<VideoResult<VideoOutcome>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config().batch.workers)
            .thread_name(|idx| format!("video-worker-{idx}"))
            .build()?;

        info!("🚀 Processing {} videos on {} workers", jobs.len(), self.config().batch.workers);
        let results: Vec<VideoResult<VideoOutcome>> = pool.install(|| jobs.par_iter().map(|job| self.analyze(job)).collect());

        let ok = results.iter().filter(|r| r.is_ok()).count();
        info!("📊 Batch done: {} ok, {} failed", ok, results.len() - ok);
        Ok(results)
    }

    /// 处理 `video_dir` 下所有视频，输出到 `output_root/<stem>/`
    ///
    /// 输出目录里已有的 `transcript_detailed.txt` 作为语音句段；没有则只用
    /// 网格锚点和事件锚点。已有九宫格的视频直接跳过。
    pub fn process_video_folder(&self, video_dir: &Path, output_root: &Path) -> VideoResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut jobs = Vec::new();

        for video in self.list_videos(video_dir)? {
            let output_dir = output_dir_for(&video, output_root);
            if output_dir.join(SHEET_FILE).exists() {
                info!("⏭️ Skipping {:?}: sheet exists", video);
                summary.skipped.push(video);
                continue;
            }
            let segments = Self::load_transcript(&output_dir.join(TRANSCRIPT_FILE));
            jobs.push(VideoJob::new(video, output_dir).with_segments(segments));
        }

        let results = self.process_batch(&jobs)?;
        for (job, result) in jobs.into_iter().zip(results) {
            match result {
                Ok(outcome) => {
                    if self.config().batch.delete_source_after {
                        match std::fs::remove_file(&job.video) {
                            Ok(()) => info!("🗑️ Deleted source {:?}", job.video),
                            Err(e) => warn!("⚠️ Failed to delete {:?}: {}", job.video, e),
                        }
                    }
                    summary.succeeded.push(outcome);
                }
                Err(e) => summary.failed.push((job.video, e)),
            }
        }

        info!(
            "✅ Folder done: {} ok, {} failed, {} skipped",
            summary.succeeded.len(),
            summary.failed.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// 目录下（不递归）的视频文件，按文件名排序
    fn list_videos(&self, dir: &Path) -> VideoResult<Vec<PathBuf>> {
        let extensions = &self.config().batch.video_extensions;
        let mut videos: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
                    })
                    .unwrap_or(false)
            })
            .collect();
        videos.sort();
        Ok(videos)
    }

    fn load_transcript(path: &Path) -> Vec<SpeechSegment> {
        if !path.exists() {
            return Vec::new();
        }
        match read_transcript(path) {
            Ok(segments) => segments,
            Err(e) => {
                warn!("⚠️ Ignoring transcript {:?}: {}", path, e);
                Vec::new()
            }
        }
    }
}
