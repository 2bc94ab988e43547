//! 对外接口 - 单视频分析与批处理

pub mod batch;
pub mod video;

pub use batch::BatchSummary;
pub use video::{
    output_dir_for, AnalyzerStats, VideoAnalyzer, VideoJob, VideoOutcome, CACHE_DIR, REPORT_FILE, SHEET_FILE,
    TRANSCRIPT_FILE,
};
