//! 九宫格槽位选择
//!
//! 视频时长均分 9 个槽位，每槽一帧。回退链严格按顺序：
//! 1. 槽内最高分且不与已选重复
//! 2. 离槽中心最近（先严格，再放宽相似度）
//! 3. 在槽中心直接抽帧
//! 4. 复制相邻槽位（左优先）
//! 5. 关键候选替换（角落文字密度高、分数明显更高且不重复）

use super::candidate::{remove_frame_file, Candidate};
use super::report::SelectionReport;
use crate::core::config::SelectionConfig;
use crate::core::error::{VideoError, VideoResult};
use crate::core::video::FrameScore;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SLOT_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl Slot {
    /// 把 `[0, duration)` 均分为 `SLOT_COUNT` 个槽位
    pub fn partition(duration: f64) -> Vec<Slot> {
        let width = duration / SLOT_COUNT as f64;
        (0..SLOT_COUNT)
            .map(|index| Slot {
                index,
                start: index as f64 * width,
                end: (index + 1) as f64 * width,
            })
            .collect()
    }

    /// 时间戳所属槽位，边界与 `contains` 完全一致；越界时落到首/尾槽
    pub fn locate(slots: &[Slot], timestamp: f64) -> usize {
        slots
            .iter()
            .position(|slot| slot.contains(timestamp))
            .unwrap_or(if timestamp < 0.0 { 0 } else { slots.len().saturating_sub(1) })
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {} [{:.2}s, {:.2}s)", self.index, self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    InSlot,
    Nearest,
    NearestRelaxed,
    DirectExtraction,
    NeighborCopy,
    Replacement,
    Padding,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionReason::InSlot => "in-slot",
            SelectionReason::Nearest => "nearest",
            SelectionReason::NearestRelaxed => "nearest-relaxed",
            SelectionReason::DirectExtraction => "direct",
            SelectionReason::NeighborCopy => "neighbor-copy",
            SelectionReason::Replacement => "replacement",
            SelectionReason::Padding => "padding",
        }
    }

    /// 该原因下入选帧是否允许不在槽位区间内
    pub fn allows_outside_slot(&self) -> bool {
        matches!(
            self,
            SelectionReason::Nearest
                | SelectionReason::NearestRelaxed
                | SelectionReason::NeighborCopy
                | SelectionReason::Padding
        )
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 最终 9 帧中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSelection {
    pub slot: Slot,
    pub timestamp: f64,
    pub path: PathBuf,
    pub reason: SelectionReason,
    pub score: FrameScore,
}

pub struct SlotSelector<'a> {
    config: &'a SelectionConfig,
    duration: f64,
    slots: Vec<Slot>,
    video: PathBuf,
}

/// 单次选择状态：候选池 + 槽位分配
struct SlotState {
    arena: Vec<Candidate>,
    used: Vec<bool>,
    assigned: Vec<Option<(usize, SelectionReason)>>,
}

impl SlotState {
    fn is_empty(&self, slot: usize) -> bool {
        self.assigned[slot].is_none()
    }

    fn assign(&mut self, slot: usize, idx: usize, reason: SelectionReason) {
        self.assigned[slot] = Some((idx, reason));
        self.used[idx] = true;
    }

    fn unused(&self) -> Vec<usize> {
        (0..self.arena.len()).filter(|&i| !self.used[i]).collect()
    }
}

impl<'a> SlotSelector<'a> {
    pub fn new(config: &'a SelectionConfig, duration: f64, video: impl AsRef<Path>) -> Self {
        Self {
            config,
            duration,
            slots: Slot::partition(duration),
            video: video.as_ref().to_path_buf(),
        }
    }

    /// 用 `candidates` 填满 9 个槽位
    ///
    /// `direct` 在槽中心直接抽一帧，`Ok(None)` 表示解码失败。返回前删除所有
    /// 未入选的候选文件；只有一个槽位都填不上时才返回 `NoFrames`
    pub fn select<F>(
        &self,
        candidates: Vec<Candidate>,
        mut direct: F,
        report: &mut SelectionReport,
    ) -> VideoResult<Vec<SlotSelection>>
    where
        F: FnMut(&Slot) -> VideoResult<Option<Candidate>>,
    {
        let used = vec![false; candidates.len()];
        let mut state = SlotState {
            arena: candidates,
            used,
            assigned: vec![None; SLOT_COUNT],
        };
        info!(
            "🎯 Selecting {} slots from {} candidates ({:.2}s)",
            SLOT_COUNT,
            state.arena.len(),
            self.duration
        );

        report.section("Pass 1: in-slot");
        self.pass_in_slot(&mut state, report);

        report.section("Pass 2: nearest");
        self.pass_nearest(&mut state, report);

        report.section("Pass 3: direct extraction");
        let direct_result = self.pass_direct(&mut state, &mut direct, report);
        if let Err(e) = direct_result {
            self.cleanup(&state, &HashSet::new());
            return Err(e);
        }

        report.section("Pass 4: neighbor copy");
        if state.assigned.iter().all(Option::is_none) {
            report.line("no slot could be filled");
            self.cleanup(&state, &HashSet::new());
            return Err(VideoError::NoFrames {
                path: self.video.clone(),
            });
        }
        self.pass_neighbor_copy(&mut state, report);

        report.section("Pass 5: key-candidate replacement");
        self.pass_replacement(&mut state, report);

        let selections = self.finalize(&state, report);
        let keep: HashSet<PathBuf> = selections.iter().map(|s| s.path.clone()).collect();
        self.cleanup(&state, &keep);
        Ok(selections)
    }

    /// 与任一已入选帧相似
    fn conflicts(&self, state: &SlotState, idx: usize) -> bool {
        let threshold = self.config.similarity_threshold;
        state.assigned.iter().flatten().any(|&(chosen, _)| {
            chosen != idx && state.arena[chosen].is_similar(&state.arena[idx], threshold)
        })
    }

    fn pass_in_slot(&self, state: &mut SlotState, report: &mut SelectionReport) {
        for slot in &self.slots {
            let mut pool: Vec<usize> = state
                .unused()
                .into_iter()
                .filter(|&i| slot.contains(state.arena[i].timestamp))
                .collect();
            pool.sort_by(|&a, &b| {
                let (ca, cb) = (&state.arena[a], &state.arena[b]);
                cb.composite()
                    .total_cmp(&ca.composite())
                    .then(ca.timestamp.total_cmp(&cb.timestamp))
            });

            match pool.iter().copied().find(|&i| !self.conflicts(state, i)) {
                Some(idx) => {
                    state.assign(slot.index, idx, SelectionReason::InSlot);
                    self.log_choice(report, slot, state, idx, SelectionReason::InSlot);
                }
                None if pool.is_empty() => report.line(format!("{} -> empty (no candidates)", slot)),
                None => report.line(format!(
                    "{} -> empty ({} candidates, all duplicates)",
                    slot,
                    pool.len()
                )),
            }
        }
    }

    fn pass_nearest(&self, state: &mut SlotState, report: &mut SelectionReport) {
        for slot in &self.slots {
            if !state.is_empty(slot.index) {
                continue;
            }
            let center = slot.center();
            let mut pool = state.unused();
            pool.sort_by(|&a, &b| {
                let (ca, cb) = (&state.arena[a], &state.arena[b]);
                (ca.timestamp - center)
                    .abs()
                    .total_cmp(&(cb.timestamp - center).abs())
                    .then(cb.composite().total_cmp(&ca.composite()))
                    .then(ca.timestamp.total_cmp(&cb.timestamp))
            });

            let strict = pool.iter().copied().find(|&i| !self.conflicts(state, i));
            let pick = match strict {
                Some(idx) => Some((idx, SelectionReason::Nearest)),
                None => pool.first().map(|&idx| (idx, SelectionReason::NearestRelaxed)),
            };
            match pick {
                Some((idx, reason)) => {
                    state.assign(slot.index, idx, reason);
                    self.log_choice(report, slot, state, idx, reason);
                }
                None => report.line(format!("{} -> empty (pool exhausted)", slot)),
            }
        }
    }

    fn pass_direct<F>(&self, state: &mut SlotState, direct: &mut F, report: &mut SelectionReport) -> VideoResult<()>
    where
        F: FnMut(&Slot) -> VideoResult<Option<Candidate>>,
    {
        for slot in &self.slots {
            if !state.is_empty(slot.index) {
                continue;
            }
            match direct(slot)? {
                Some(candidate) => {
                    state.arena.push(candidate);
                    state.used.push(false);
                    let idx = state.arena.len() - 1;
                    state.assign(slot.index, idx, SelectionReason::DirectExtraction);
                    self.log_choice(report, slot, state, idx, SelectionReason::DirectExtraction);
                }
                None => {
                    warn!("⚠️ Direct extraction failed at {:.2}s", slot.center());
                    report.line(format!("{} -> extraction at {:.2}s failed", slot, slot.center()));
                }
            }
        }
        Ok(())
    }

    /// 调用前至少有一个槽位已填
    fn pass_neighbor_copy(&self, state: &mut SlotState, report: &mut SelectionReport) {
        loop {
            let mut changed = false;
            for i in 0..SLOT_COUNT {
                if !state.is_empty(i) {
                    continue;
                }
                let left = i.checked_sub(1).and_then(|l| state.assigned[l]);
                let right = state.assigned.get(i + 1).copied().flatten();
                if let Some((idx, _)) = left.or(right) {
                    state.assigned[i] = Some((idx, SelectionReason::NeighborCopy));
                    self.log_choice(report, &self.slots[i], state, idx, SelectionReason::NeighborCopy);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn pass_replacement(&self, state: &mut SlotState, report: &mut SelectionReport) {
        let mut keys = state.unused();
        keys.sort_by(|&a, &b| {
            let (ca, cb) = (&state.arena[a].score, &state.arena[b].score);
            cb.corner_ratio
                .total_cmp(&ca.corner_ratio)
                .then(cb.composite.total_cmp(&ca.composite))
                .then(state.arena[a].timestamp.total_cmp(&state.arena[b].timestamp))
        });
        keys.truncate(self.config.replacement_candidates);

        let threshold = self.config.similarity_threshold;
        let mut replaced = 0;
        for idx in keys {
            let slot_index = Slot::locate(&self.slots, state.arena[idx].timestamp);
            let Some((incumbent, _)) = state.assigned[slot_index] else {
                continue;
            };
            let (candidate, current) = (&state.arena[idx], &state.arena[incumbent]);
            if candidate.composite() > current.composite() + self.config.replacement_margin
                && !candidate.is_similar(current, threshold)
            {
                report.line(format!(
                    "{} replaces {:.2}s ({:.3} -> {:.3})",
                    self.slots[slot_index],
                    current.timestamp,
                    current.composite(),
                    candidate.composite()
                ));
                state.assign(slot_index, idx, SelectionReason::Replacement);
                self.log_choice(report, &self.slots[slot_index], state, idx, SelectionReason::Replacement);
                replaced += 1;
            }
        }
        if replaced == 0 {
            report.line("no replacement");
        }
    }

    fn finalize(&self, state: &SlotState, report: &mut SelectionReport) -> Vec<SlotSelection> {
        let mut selections: Vec<SlotSelection> = self
            .slots
            .iter()
            .filter_map(|slot| {
                state.assigned[slot.index].map(|(idx, reason)| {
                    let c = &state.arena[idx];
                    SlotSelection {
                        slot: *slot,
                        timestamp: c.timestamp,
                        path: c.path.clone(),
                        reason,
                        score: c.score,
                    }
                })
            })
            .collect();

        // Pass 4 already fills every slot once one is filled
        while selections.len() < SLOT_COUNT {
            let Some(last) = selections.last().cloned() else {
                break;
            };
            let slot = self.slots[selections.len()];
            report.line(format!("{} -> padded with {:.2}s", slot, last.timestamp));
            selections.push(SlotSelection {
                slot,
                reason: SelectionReason::Padding,
                ..last
            });
        }
        selections.truncate(SLOT_COUNT);
        selections.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then(a.slot.index.cmp(&b.slot.index))
        });

        report.section("Final");
        for s in &selections {
            report.line(format!("{} {:.2}s {} {}", s.slot, s.timestamp, s.reason, s.score));
        }
        selections
    }

    fn cleanup(&self, state: &SlotState, keep: &HashSet<PathBuf>) {
        let mut removed = 0;
        for candidate in &state.arena {
            if !keep.contains(&candidate.path) {
                remove_frame_file(&candidate.path);
                removed += 1;
            }
        }
        debug!("🧹 Removed {} unselected frames", removed);
    }

    fn log_choice(
        &self,
        report: &mut SelectionReport,
        slot: &Slot,
        state: &SlotState,
        idx: usize,
        reason: SelectionReason,
    ) {
        let c = &state.arena[idx];
        report.line(format!(
            "{} -> {:.2}s {} [{}] {}",
            slot,
            c.timestamp,
            reason,
            c.source_label(),
            c.score
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_extractor::anchors::AnchorSource;
    use image::{DynamicImage, Rgb, RgbImage};

    /// 12 distinct patterns: one lit band out of 12
    fn pattern(band: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(240, 240, |_, y| {
            if y / 20 == band {
                Rgb([235, 235, 235])
            } else {
                Rgb([25, 25, 25])
            }
        }))
    }

    struct Fixture {
        dir: tempfile::TempDir,
        next: usize,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                next: 0,
            }
        }

        fn candidate(&mut self, ts: f64, band: u32, composite: f64) -> Candidate {
            let path = self.dir.path().join(format!("frame_{:04}.png", self.next));
            self.next += 1;
            let img = pattern(band);
            img.save(&path).unwrap();
            let mut c = Candidate::from_image(ts, path, &img, vec![AnchorSource::Periodic], 0.0);
            c.score.composite = composite;
            c
        }
    }

    fn no_direct(_: &Slot) -> VideoResult<Option<Candidate>> {
        Ok(None)
    }

    fn assert_slot_coverage(selections: &[SlotSelection]) {
        assert_eq!(selections.len(), SLOT_COUNT);
        for pair in selections.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        for s in selections {
            assert!(s.slot.contains(s.timestamp) || s.reason.allows_outside_slot());
        }
    }

    #[test]
    fn test_partition_and_natural_slot() {
        let slots = Slot::partition(9.0);
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[4].center(), 4.5);
        assert!(slots[8].contains(8.99));
        assert!(!slots[8].contains(9.0));
        assert_eq!(Slot::locate(&slots, 0.0), 0);
        assert_eq!(Slot::locate(&slots, 4.99), 4);
        assert_eq!(Slot::locate(&slots, 9.0), 8);
        assert_eq!(Slot::locate(&slots, -1.0), 0);
    }

    #[test]
    fn test_locate_agrees_with_contains_on_odd_durations() {
        for duration in [59.94, 29.97, 7.77] {
            let slots = Slot::partition(duration);
            let mut t = 0.0;
            while t < duration {
                let ts = (t * 100.0_f64).round() / 100.0;
                if ts < duration {
                    assert!(slots[Slot::locate(&slots, ts)].contains(ts), "{} in {}", ts, duration);
                }
                t += 0.01;
            }
        }
        // 46.62 / 59.94 * 9 floors to 7, but 7 * 6.66 lands above 46.62
        let slots = Slot::partition(59.94);
        assert_eq!(Slot::locate(&slots, 46.62), 6);
    }

    #[test]
    fn test_replacement_stays_inside_its_slot_at_boundary() {
        let duration = 59.94;
        let width = duration / SLOT_COUNT as f64;
        let mut fx = Fixture::new();
        let mut candidates: Vec<Candidate> = (0..9)
            .map(|i| fx.candidate((i as f64 + 0.5) * width, i, 1.0))
            .collect();
        // duplicates slot 0's picture, so only Pass 5 can place it
        let mut key = fx.candidate(46.62, 0, 2.0);
        key.score.corner_ratio = 0.4;
        candidates.push(key);

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, duration, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();

        assert_slot_coverage(&result);
        let placed = result.iter().find(|s| s.timestamp == 46.62).unwrap();
        assert_eq!(placed.slot.index, 6);
        assert_eq!(placed.reason, SelectionReason::Replacement);
    }

    #[test]
    fn test_one_distinct_candidate_per_slot() {
        let mut fx = Fixture::new();
        let candidates: Vec<Candidate> = (0..9).map(|i| fx.candidate(i as f64 + 0.5, i, 1.0)).collect();
        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();

        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();

        assert_slot_coverage(&result);
        assert!(result.iter().all(|s| s.reason == SelectionReason::InSlot));
        assert!(report.contains("no replacement"));
    }

    #[test]
    fn test_duplicate_in_slot_dropped_and_deleted() {
        let mut fx = Fixture::new();
        let mut candidates: Vec<Candidate> = (0..9)
            .filter(|&i| i != 1)
            .map(|i| fx.candidate(i as f64 + 0.5, i, 1.0))
            .collect();
        // identical pictures, same slot: the higher score survives
        let dup_low = fx.candidate(1.0, 11, 1.0);
        let dup_high = fx.candidate(1.05, 11, 2.0);
        let (low_path, high_path) = (dup_low.path.clone(), dup_high.path.clone());
        candidates.push(dup_low);
        candidates.push(dup_high);

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();

        assert_slot_coverage(&result);
        assert_eq!(result[1].timestamp, 1.05);
        assert!(high_path.exists());
        assert!(!low_path.exists());
        assert_eq!(std::fs::read_dir(fx.dir.path()).unwrap().count(), 9);
    }

    #[test]
    fn test_nearest_fills_empty_slot() {
        let mut fx = Fixture::new();
        // slot 4 has nothing; an extra distinct candidate sits in slot 5
        let mut candidates: Vec<Candidate> = (0..9)
            .filter(|&i| i != 4)
            .map(|i| fx.candidate(i as f64 + 0.5, i, 1.0))
            .collect();
        candidates.push(fx.candidate(5.1, 4, 0.8));

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();

        assert_slot_coverage(&result);
        let filled = result.iter().find(|s| s.slot.index == 4).unwrap();
        assert_eq!(filled.timestamp, 5.1);
        assert_eq!(filled.reason, SelectionReason::Nearest);
    }

    #[test]
    fn test_relaxed_accepts_near_duplicate() {
        let mut fx = Fixture::new();
        let mut candidates: Vec<Candidate> = (0..9)
            .filter(|&i| i != 4)
            .map(|i| fx.candidate(i as f64 + 0.5, i, 1.0))
            .collect();
        // only leftover is a copy of slot 3's picture
        candidates.push(fx.candidate(3.2, 3, 0.1));

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();

        let filled = result.iter().find(|s| s.slot.index == 4).unwrap();
        assert_eq!(filled.reason, SelectionReason::NearestRelaxed);
        assert_eq!(filled.timestamp, 3.2);
        assert_slot_coverage(&result);
    }

    #[test]
    fn test_direct_extraction_then_neighbor_copy() {
        let mut fx = Fixture::new();
        let candidates = vec![fx.candidate(0.5, 0, 1.0)];
        let direct_img = pattern(7);
        let direct_dir = tempfile::tempdir().unwrap();
        let mut calls = Vec::new();

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(
                candidates,
                |slot: &Slot| {
                    calls.push(slot.index);
                    if slot.index == 5 {
                        let path = direct_dir.path().join("direct.png");
                        direct_img.save(&path).unwrap();
                        let c = Candidate::from_image(slot.center(), path, &direct_img, vec![], 0.0);
                        Ok(Some(c))
                    } else {
                        Ok(None)
                    }
                },
                &mut report,
            )
            .unwrap();

        assert_eq!(calls, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_slot_coverage(&result);
        let by_slot = |i: usize| result.iter().find(|s| s.slot.index == i).unwrap();
        assert_eq!(by_slot(0).reason, SelectionReason::InSlot);
        assert_eq!(by_slot(5).reason, SelectionReason::DirectExtraction);
        assert_eq!(by_slot(5).timestamp, 5.5);
        // left neighbour preferred
        assert_eq!(by_slot(4).timestamp, 0.5);
        assert_eq!(by_slot(8).timestamp, 5.5);
        assert!(report.contains("neighbor-copy"));
    }

    #[test]
    fn test_neighbor_copy_from_the_right() {
        let direct_img = pattern(7);
        let direct_dir = tempfile::tempdir().unwrap();

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(
                Vec::new(),
                |slot: &Slot| {
                    if slot.index != 5 {
                        return Ok(None);
                    }
                    let path = direct_dir.path().join("direct.png");
                    direct_img.save(&path).unwrap();
                    Ok(Some(Candidate::from_image(slot.center(), path, &direct_img, vec![], 0.0)))
                },
                &mut report,
            )
            .unwrap();

        assert_slot_coverage(&result);
        assert!(result.iter().all(|s| s.timestamp == 5.5));
        for s in &result {
            let expected = if s.slot.index == 5 {
                SelectionReason::DirectExtraction
            } else {
                SelectionReason::NeighborCopy
            };
            assert_eq!(s.reason, expected);
        }
        // slots 0-4 only have a right neighbour to copy from
        for i in 0..5 {
            let prefix = format!("slot {} [", i);
            assert!(report
                .lines()
                .iter()
                .any(|l| l.starts_with(&prefix) && l.contains("5.50s neighbor-copy")));
        }
    }

    #[test]
    fn test_nothing_extractable_is_no_frames() {
        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4").select(Vec::new(), no_direct, &mut report);
        assert!(matches!(result, Err(VideoError::NoFrames { .. })));
        assert!(report.contains("no slot could be filled"));
    }

    /// Slot 3 holds a key frame that duplicates slot 0's picture, so it
    /// loses the in-slot pass and only Pass 5 can bring it back.
    fn run_with_key(key_score: f64) -> (Vec<SlotSelection>, SelectionReport, PathBuf, PathBuf, Fixture) {
        let mut fx = Fixture::new();
        let mut candidates: Vec<Candidate> = (0..9).map(|i| fx.candidate(i as f64 + 0.5, i, 1.0)).collect();
        let mut key = fx.candidate(3.9, 0, key_score);
        key.score.corner_ratio = 0.4;
        let key_path = key.path.clone();
        let incumbent_path = candidates[3].path.clone();
        candidates.push(key);

        let config = SelectionConfig::default();
        let mut report = SelectionReport::new();
        let result = SlotSelector::new(&config, 9.0, "v.mp4")
            .select(candidates, no_direct, &mut report)
            .unwrap();
        (result, report, key_path, incumbent_path, fx)
    }

    #[test]
    fn test_key_candidate_replaces_weaker_incumbent() {
        let (result, report, key_path, incumbent_path, _fx) = run_with_key(2.0);

        assert_slot_coverage(&result);
        let slot3 = result.iter().find(|s| s.slot.index == 3).unwrap();
        assert_eq!(slot3.timestamp, 3.9);
        assert_eq!(slot3.reason, SelectionReason::Replacement);
        assert!(report.contains("replaces 3.50s"));
        assert!(key_path.exists());
        assert!(!incumbent_path.exists());
    }

    #[test]
    fn test_replacement_needs_margin() {
        // 1.2 does not beat 1.0 by more than 0.25
        let (result, report, key_path, incumbent_path, _fx) = run_with_key(1.2);

        let slot3 = result.iter().find(|s| s.slot.index == 3).unwrap();
        assert_eq!(slot3.timestamp, 3.5);
        assert_eq!(slot3.reason, SelectionReason::InSlot);
        assert!(report.contains("no replacement"));
        assert!(!key_path.exists());
        assert!(incumbent_path.exists());
    }

    #[test]
    fn test_deterministic_selection() {
        let run = || {
            let mut fx = Fixture::new();
            let candidates: Vec<Candidate> = [0.3, 0.9, 2.1, 2.2, 4.0, 6.6, 7.7, 8.8]
                .iter()
                .enumerate()
                .map(|(i, &ts)| fx.candidate(ts, (i % 5) as u32, 1.0))
                .collect();
            let config = SelectionConfig::default();
            let mut report = SelectionReport::new();
            let result = SlotSelector::new(&config, 9.0, "v.mp4")
                .select(candidates, no_direct, &mut report)
                .unwrap();
            result.iter().map(|s| s.timestamp).collect::<Vec<f64>>()
        };
        assert_eq!(run(), run());
    }
}
