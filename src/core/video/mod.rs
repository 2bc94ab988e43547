pub mod frame;
pub mod hasher;
pub mod motion;
pub mod scorer;

pub use frame::{GrayFrame, ANALYSIS_SIZE};
pub use hasher::{FrameDistance, HashBundle, PerceptualHasher};
pub use motion::{change_series, change_stats, ChangeStats};
pub use scorer::{FrameScore, FrameScorer};
