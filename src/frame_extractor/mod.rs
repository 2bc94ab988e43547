//! 视频选帧引擎 - 为短视频广告挑出最有代表性的 9 帧并拼成九宫格
//!
//! 核心策略：
//! 1. 三路锚点 - 语音句首/句尾、固定时间网格、画面突变事件
//! 2. 候选打分 - 清晰度 + 角落文字密度 + 事件强度
//! 3. 句内去重 - 同一句话里相似的帧只留最清晰的
//! 4. 槽位选择 - 时长均分 9 槽，逐级回退保证每槽有帧
//! 5. 拼图输出 - 3x3 缩略图 + 时间戳标签

pub mod anchors;
pub mod candidate;
pub mod contact_sheet;
pub mod dedup;
mod glyphs;
pub mod pipeline;
pub mod report;
pub mod slots;

pub use anchors::{Anchor, AnchorPlan, AnchorSource};
pub use candidate::Candidate;
pub use contact_sheet::ContactSheet;
pub use dedup::dedup_sentence;
pub use pipeline::{FrameSelector, SelectionOutcome};
pub use report::SelectionReport;
pub use slots::{SelectionReason, Slot, SlotSelection, SlotSelector, SLOT_COUNT};
