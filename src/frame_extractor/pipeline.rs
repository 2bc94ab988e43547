use crate::core::config::AnalyzerConfig;
use crate::core::error::{VideoError, VideoResult};
use crate::core::media::{FrameExtractor, FrameSource};
use crate::core::transcript::{split_pseudo_sentences, SpeechSegment};
use crate::core::video::change_series;
use crate::frame_extractor::anchors::{
    centis_key, event_probe_anchors, periodic_anchors, round_centis, select_events, speech_anchor_groups, Anchor,
    AnchorPlan, AnchorSource,
};
use crate::frame_extractor::candidate::{remove_frame_file, Candidate};
use crate::frame_extractor::dedup::dedup_sentence;
use crate::frame_extractor::report::SelectionReport;
use crate::frame_extractor::slots::{SlotSelection, SlotSelector};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 视觉事件检测的灰度采样边长
pub const EVENT_SAMPLE_SIZE: u32 = 96;

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub duration: f64,
    /// 恰好 9 帧，按时间排序
    pub frames: Vec<SlotSelection>,
    pub report: SelectionReport,
    pub anchor_count: usize,
    pub candidate_count: usize,
}

impl SelectionOutcome {
    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }

    /// 九宫格顺序的 `(时间戳, 路径)`
    pub fn frame_list(&self) -> Vec<(f64, PathBuf)> {
        self.frames.iter().map(|f| (f.timestamp, f.path.clone())).collect()
    }
}

/// 选帧流水线：锚点 -> 抽帧 -> 句内去重 -> 九宫格槽位
pub struct FrameSelector<'a> {
    source: &'a dyn FrameSource,
    config: &'a AnalyzerConfig,
}

impl<'a> FrameSelector<'a> {
    pub fn new(source: &'a dyn FrameSource, config: &'a AnalyzerConfig) -> Self {
        Self { source, config }
    }

    /// 为 `video` 选出 9 帧，帧文件写在 `work_dir` 下；
    ///
    /// 结束后 `work_dir` 只保留入选的帧
    pub fn select_nine(
        &self,
        video: &Path,
        segments: &[SpeechSegment],
        work_dir: &Path,
    ) -> VideoResult<SelectionOutcome> {
        let duration = self.source.duration(video)?;
        if !(duration > 0.0) {
            return Err(VideoError::unreadable(video, format!("invalid duration {}", duration)));
        }
        info!("🎬 Selecting frames for {:?} ({:.2}s, {} segments)", video, duration, segments.len());

        let mut report = SelectionReport::new();
        let plan = self.plan_anchors(video, segments, duration, &mut report);
        let anchor_count = plan.len();

        let mut extractor = FrameExtractor::new(self.source, work_dir, 0)?;
        let pool = match self.collect_candidates(video, &plan, &mut extractor, &mut report) {
            Ok(pool) => pool,
            Err(e) => {
                Self::discard_extracted(&extractor);
                return Err(e);
            }
        };
        let candidate_count = pool.len();

        let selector = SlotSelector::new(&self.config.selection, duration, video);
        let frames = selector.select(
            pool,
            |slot| {
                let center = round_centis(slot.center());
                let Some(frame) = extractor.extract_one(video, center) else {
                    return Ok(None);
                };
                let path = frame.path.clone();
                let anchor = Anchor {
                    timestamp: center,
                    sources: Vec::new(),
                    event_score: 0.0,
                };
                Candidate::build(frame, &anchor).map(Some).map_err(|e| {
                    remove_frame_file(&path);
                    e
                })
            },
            &mut report,
        )?;

        info!(
            "✅ Selected {} frames from {} candidates: {:?}",
            frames.len(),
            candidate_count,
            frames.iter().map(|f| format!("{:.2}", f.timestamp)).collect::<Vec<_>>()
        );
        Ok(SelectionOutcome {
            duration,
            frames,
            report,
            anchor_count,
            candidate_count,
        })
    }

    /// 运行三路锚点生成并合并
    pub fn plan_anchors(
        &self,
        video: &Path,
        segments: &[SpeechSegment],
        duration: f64,
        report: &mut SelectionReport,
    ) -> AnchorPlan {
        let anchors = &self.config.anchors;
        let sentences = if anchors.split_untimed_segments {
            Self::expand_segments(segments)
        } else {
            segments.to_vec()
        };
        let speech = speech_anchor_groups(&sentences, anchors, duration);
        let periodic = periodic_anchors(duration, anchors);
        let events = self.detect_events(video, duration);
        let probes = event_probe_anchors(&events, anchors, duration);

        report.section("Anchors");
        report.line(format!(
            "duration={:.2}s sentences={} speech={} periodic={} events={} probes={}",
            duration,
            sentences.len(),
            speech.iter().map(Vec::len).sum::<usize>(),
            periodic.len(),
            events.len(),
            probes.len()
        ));
        for (t, score) in &events {
            report.line(format!("event {:.2}s score={:.2}", t, score));
        }

        let plan = AnchorPlan::build(speech, periodic, probes);
        for anchor in plan.speech_groups.iter().flatten().chain(plan.others.iter()) {
            let sources: Vec<&str> = anchor.sources.iter().map(AnchorSource::as_str).collect();
            report.line(format!("{:.2}s {}", anchor.timestamp, sources.join("+")));
        }
        debug!(
            "📍 {} anchors (speech {}, periodic {}, event {})",
            plan.len(),
            plan.count_by_source(AnchorSource::Speech),
            plan.count_by_source(AnchorSource::Periodic),
            plan.count_by_source(AnchorSource::Event)
        );
        plan
    }

    /// 无词级时间戳的句段切成伪句子，仅在 `split_untimed_segments` 打开时使用
    fn expand_segments(segments: &[SpeechSegment]) -> Vec<SpeechSegment> {
        segments
            .iter()
            .flat_map(|segment| {
                if !segment.words.is_empty() {
                    return vec![segment.clone()];
                }
                let pieces = split_pseudo_sentences(segment.start_ms, segment.end_ms, &segment.text);
                if pieces.is_empty() {
                    vec![segment.clone()]
                } else {
                    pieces
                }
            })
            .collect()
    }

    /// 采样失败只影响事件锚点
    fn detect_events(&self, video: &Path, duration: f64) -> Vec<(f64, f64)> {
        let anchors = &self.config.anchors;
        if anchors.event_max == 0 {
            return Vec::new();
        }
        match self.source.sample_gray(video, anchors.event_sample_rate, EVENT_SAMPLE_SIZE) {
            Ok(samples) => {
                let series: Vec<(f64, f64)> = change_series(&samples)
                    .into_iter()
                    .filter(|&(t, _)| t < duration)
                    .collect();
                select_events(&series, anchors)
            }
            Err(e) => {
                warn!("⚠️ Visual event sampling failed: {}", e);
                Vec::new()
            }
        }
    }

    fn collect_candidates(
        &self,
        video: &Path,
        plan: &AnchorPlan,
        extractor: &mut FrameExtractor<'_>,
        report: &mut SelectionReport,
    ) -> VideoResult<Vec<Candidate>> {
        let threshold = self.config.selection.similarity_threshold;
        let mut pool = Vec::new();

        report.section("Within-sentence dedup");
        for group in &plan.speech_groups {
            let built = Self::extract_and_build(video, group, extractor)?;
            pool.extend(dedup_sentence(built, threshold, report));
        }
        pool.extend(Self::extract_and_build(video, &plan.others, extractor)?);

        debug!("🧮 {} candidates after dedup", pool.len());
        Ok(pool)
    }

    fn extract_and_build(
        video: &Path,
        anchors: &[Anchor],
        extractor: &mut FrameExtractor<'_>,
    ) -> VideoResult<Vec<Candidate>> {
        let by_key: HashMap<i64, &Anchor> = anchors.iter().map(|a| (a.key(), a)).collect();
        let timestamps: Vec<f64> = anchors.iter().map(|a| a.timestamp).collect();

        let mut built = Vec::with_capacity(timestamps.len());
        for frame in extractor.extract(video, &timestamps) {
            let Some(anchor) = by_key.get(&centis_key(frame.timestamp)) else {
                remove_frame_file(&frame.path);
                continue;
            };
            built.push(Candidate::build(frame, anchor)?);
        }
        Ok(built)
    }

    fn discard_extracted(extractor: &FrameExtractor<'_>) {
        for i in 0..extractor.next_index() {
            remove_frame_file(&extractor.output_dir().join(format!("frame_{:04}.jpg", i)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::MockFrameSource;
    use crate::frame_extractor::slots::{SelectionReason, SLOT_COUNT};

    fn jpg_count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().map(|x| x == "jpg").unwrap_or(false))
            .count()
    }

    fn assert_nine_sorted(outcome: &SelectionOutcome) {
        assert_eq!(outcome.frames.len(), SLOT_COUNT);
        let stamps = outcome.timestamps();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        for f in &outcome.frames {
            assert!(f.slot.contains(f.timestamp) || f.reason.allows_outside_slot());
        }
    }

    #[test]
    fn test_thirty_second_video_with_one_segment() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(30.0);
        let config = AnalyzerConfig::default();
        let segments = vec![SpeechSegment::new(1000.0, 4000.0, "hi")];

        let outcome = FrameSelector::new(&source, &config)
            .select_nine(Path::new("ad.mp4"), &segments, dir.path())
            .unwrap();

        assert_nine_sorted(&outcome);
        assert!(outcome.report.contains("1.30s speech"));
        assert!(outcome.report.contains("3.80s speech"));
        assert!(outcome.report.contains("periodic=12"));
        assert!(outcome.anchor_count > 14);

        let kept: std::collections::HashSet<&PathBuf> = outcome.frames.iter().map(|f| &f.path).collect();
        assert_eq!(jpg_count(dir.path()), kept.len());
        assert!(kept.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_one_second_video_fills_by_direct_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(1.0);
        let config = AnalyzerConfig::default();

        let outcome = FrameSelector::new(&source, &config)
            .select_nine(Path::new("short.mp4"), &[], dir.path())
            .unwrap();

        assert_nine_sorted(&outcome);
        assert!(outcome.report.contains("0.50s periodic"));
        assert_eq!(outcome.frames.iter().filter(|f| f.timestamp == 0.5).count(), 1);
        assert!(outcome.frames.iter().any(|f| f.reason == SelectionReason::DirectExtraction));
    }

    #[test]
    fn test_one_second_video_falls_back_to_neighbor_copies() {
        let dir = tempfile::tempdir().unwrap();
        // only the periodic midpoint decodes
        let source = MockFrameSource::new(1.0).with_failing(|t| (t - 0.5).abs() > 1e-6);
        let config = AnalyzerConfig::default();

        let outcome = FrameSelector::new(&source, &config)
            .select_nine(Path::new("short.mp4"), &[], dir.path())
            .unwrap();

        assert_nine_sorted(&outcome);
        assert!(outcome.frames.iter().all(|f| f.timestamp == 0.5));
        assert_eq!(
            outcome
                .frames
                .iter()
                .filter(|f| f.reason == SelectionReason::NeighborCopy)
                .count(),
            8
        );
        assert_eq!(jpg_count(dir.path()), 1);
    }

    #[test]
    fn test_nothing_decodes_is_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(5.0).with_failing(|_| true);
        let config = AnalyzerConfig::default();

        let result = FrameSelector::new(&source, &config).select_nine(Path::new("x.mp4"), &[], dir.path());
        assert!(matches!(result, Err(VideoError::NoFrames { .. })));
        assert_eq!(jpg_count(dir.path()), 0);
    }

    #[test]
    fn test_unreadable_video() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockFrameSource::new(5.0).with_unreadable("bad.mp4");
        let config = AnalyzerConfig::default();

        let result = FrameSelector::new(&source, &config).select_nine(Path::new("bad.mp4"), &[], dir.path());
        assert!(matches!(result, Err(VideoError::Unreadable { .. })));
    }

    #[test]
    fn test_scene_cuts_become_event_anchors() {
        let source = MockFrameSource::new(12.0).with_scene_length(4.0);
        let config = AnalyzerConfig::default();
        let mut report = SelectionReport::new();

        let plan = FrameSelector::new(&source, &config).plan_anchors(Path::new("cuts.mp4"), &[], 12.0, &mut report);

        // cuts at 4s and 8s, sampled at 3 fps
        assert_eq!(plan.count_by_source(AnchorSource::Event), 6);
        assert!(report.contains("event 4.00s"));
        assert!(report.contains("event 8.00s"));
    }

    #[test]
    fn test_segments_are_used_as_received() {
        let source = MockFrameSource::new(20.0);
        let config = AnalyzerConfig::default();
        let mut report = SelectionReport::new();
        let segments = vec![SpeechSegment::new(0.0, 6000.0, "Hello there, welcome in.")];

        let plan = FrameSelector::new(&source, &config).plan_anchors(Path::new("a.mp4"), &segments, 20.0, &mut report);

        assert_eq!(plan.speech_groups.len(), 1);
        let speech: Vec<f64> = plan.speech_groups[0].iter().map(|a| a.timestamp).collect();
        assert_eq!(speech, vec![0.3, 5.8]);
        assert!(report.contains("sentences=1"));
    }

    #[test]
    fn test_long_segment_without_words_is_split_when_enabled() {
        let source = MockFrameSource::new(20.0);
        let mut config = AnalyzerConfig::default();
        config.anchors.split_untimed_segments = true;
        let mut report = SelectionReport::new();
        let segments = vec![SpeechSegment::new(0.0, 12000.0, "第一句话在这里。第二句话在那里。")];

        let plan = FrameSelector::new(&source, &config).plan_anchors(Path::new("a.mp4"), &segments, 20.0, &mut report);

        assert_eq!(plan.speech_groups.len(), 2);
        assert!(report.contains("sentences=2"));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let source = MockFrameSource::new(24.0).with_scene_length(2.0);
        let config = AnalyzerConfig::default();
        let segments = vec![
            SpeechSegment::new(500.0, 3000.0, "a"),
            SpeechSegment::new(9000.0, 15000.0, "b"),
        ];
        let run = || {
            let dir = tempfile::tempdir().unwrap();
            FrameSelector::new(&source, &config)
                .select_nine(Path::new("ad.mp4"), &segments, dir.path())
                .unwrap()
                .timestamps()
        };
        assert_eq!(run(), run());
    }
}
