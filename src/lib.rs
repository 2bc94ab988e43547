pub mod api;
pub mod core;
pub mod frame_extractor;

pub use api::{BatchSummary, VideoAnalyzer, VideoJob, VideoOutcome};
pub use crate::core::config::AnalyzerConfig;
pub use crate::core::error::{VideoError, VideoResult};
pub use crate::core::transcript::SpeechSegment;

/// `RUST_LOG` 控制日志级别，默认 info。重复调用无副作用。
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
