//! 锚点生成 - 语音 / 固定网格 / 视觉事件
//!
//! 三路锚点互不依赖，最后按 0.01s 精度合并成一个计划。

use crate::core::config::AnchorConfig;
use crate::core::transcript::SpeechSegment;
use std::collections::HashMap;

/// 帧间变化分数达到该值视为视觉事件
pub const EVENT_SCORE_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnchorSource {
    Speech,
    Periodic,
    Event,
}

impl AnchorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorSource::Speech => "speech",
            AnchorSource::Periodic => "periodic",
            AnchorSource::Event => "event",
        }
    }
}

impl std::fmt::Display for AnchorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 取整到 0.01s
pub fn round_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// 键相同的锚点视为同一时刻
pub fn centis_key(seconds: f64) -> i64 {
    (seconds * 100.0).round() as i64
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub timestamp: f64,
    /// 有序、无重复
    pub sources: Vec<AnchorSource>,
    pub event_score: f64,
}

impl Anchor {
    pub fn new(timestamp: f64, source: AnchorSource) -> Self {
        Self {
            timestamp: round_centis(timestamp),
            sources: vec![source],
            event_score: 0.0,
        }
    }

    pub fn event(timestamp: f64, event_score: f64) -> Self {
        Self {
            event_score,
            ..Self::new(timestamp, AnchorSource::Event)
        }
    }

    pub fn key(&self) -> i64 {
        centis_key(self.timestamp)
    }

    /// 合并碰撞的锚点：来源取并集，事件分取最大
    pub fn absorb(&mut self, other: &Anchor) {
        for source in &other.sources {
            if !self.sources.contains(source) {
                self.sources.push(*source);
            }
        }
        self.sources.sort();
        self.event_score = self.event_score.max(other.event_score);
    }

    pub fn has_source(&self, source: AnchorSource) -> bool {
        self.sources.contains(&source)
    }
}

/// 语音锚点：每句话起点后 0.3s、终点前 0.2s 各取一帧，区间塌缩时取中点。
///
/// 每句一组，按句子顺序；超出 `[0, duration)` 的锚点丢弃，没有锚点的句子跳过
pub fn speech_anchor_groups(
    segments: &[SpeechSegment],
    config: &AnchorConfig,
    duration: f64,
) -> Vec<Vec<Anchor>> {
    segments
        .iter()
        .filter_map(|segment| {
            let (start, end) = segment.speech_bounds_s();
            let start_anchor = round_centis(start + config.start_offset_s);
            let end_anchor = round_centis(end - config.end_offset_s);

            let stamps = if end_anchor > start_anchor {
                vec![start_anchor, end_anchor]
            } else {
                vec![round_centis((start + end) / 2.0)]
            };

            let group: Vec<Anchor> = stamps
                .into_iter()
                .filter(|&t| t >= 0.0 && t < duration)
                .map(|t| Anchor::new(t, AnchorSource::Speech))
                .collect();
            (!group.is_empty()).then_some(group)
        })
        .collect()
}

/// 固定网格：每 `periodic_step_s` 一个格子取中心，最多 `periodic_max_points` 个；
/// 不足一个步长的视频只取中点
pub fn periodic_anchors(duration: f64, config: &AnchorConfig) -> Vec<Anchor> {
    if duration <= 0.0 {
        return Vec::new();
    }
    let count = ((duration / config.periodic_step_s).floor() as usize).clamp(1, config.periodic_max_points.max(1));
    let cell = duration / count as f64;

    let mut anchors: Vec<Anchor> = Vec::with_capacity(count);
    for i in 0..count {
        let anchor = Anchor::new((i as f64 + 0.5) * cell, AnchorSource::Periodic);
        if anchor.timestamp < duration && anchors.last().map(|a| a.key()) != Some(anchor.key()) {
            anchors.push(anchor);
        }
    }
    anchors
}

/// Pick event peaks from a `(timestamp, change_score)` series: strongest
/// first, at least `event_min_gap_s` apart, at most `event_max`. Returned in
/// time order.
pub fn select_events(series: &[(f64, f64)], config: &AnchorConfig) -> Vec<(f64, f64)> {
    let mut peaks: Vec<(f64, f64)> = series
        .iter()
        .copied()
        .filter(|&(_, score)| score >= EVENT_SCORE_THRESHOLD)
        .collect();
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));

    let mut chosen: Vec<(f64, f64)> = Vec::new();
    for (t, score) in peaks {
        if chosen.len() >= config.event_max {
            break;
        }
        if chosen.iter().all(|&(c, _)| (c - t).abs() >= config.event_min_gap_s) {
            chosen.push((t, score));
        }
    }
    chosen.sort_by(|a, b| a.0.total_cmp(&b.0));
    chosen
}

/// 每个事件取 t-0.2 / t / t+0.2 三个探针，落在过渡后的干净帧上的概率更高
pub fn event_probe_anchors(events: &[(f64, f64)], config: &AnchorConfig, duration: f64) -> Vec<Anchor> {
    let last = (duration - 0.01).max(0.0);
    let offset = config.event_probe_offset_s;

    let mut anchors: Vec<Anchor> = Vec::with_capacity(events.len() * 3);
    let mut index: HashMap<i64, usize> = HashMap::new();
    for &(t, score) in events {
        for probe in [t - offset, t, t + offset] {
            let anchor = Anchor::event(probe.clamp(0.0, last), score);
            match index.get(&anchor.key()) {
                Some(&i) => anchors[i].absorb(&anchor),
                None => {
                    index.insert(anchor.key(), anchors.len());
                    anchors.push(anchor);
                }
            }
        }
    }
    anchors
}

/// 单个视频合并后的全部锚点
#[derive(Debug, Clone, Default)]
pub struct AnchorPlan {
    /// 按句分组，组内按时间排序
    pub speech_groups: Vec<Vec<Anchor>>,
    /// 未被语音锚点覆盖的网格/事件锚点，按时间排序
    pub others: Vec<Anchor>,
}

impl AnchorPlan {
    pub fn build(speech_groups: Vec<Vec<Anchor>>, periodic: Vec<Anchor>, events: Vec<Anchor>) -> Self {
        // key -> (group, position)
        let mut speech_index: HashMap<i64, (usize, usize)> = HashMap::new();
        let mut groups: Vec<Vec<Anchor>> = Vec::with_capacity(speech_groups.len());

        for group in speech_groups {
            let mut kept: Vec<Anchor> = Vec::with_capacity(group.len());
            for anchor in group {
                if let Some(&(g, p)) = speech_index.get(&anchor.key()) {
                    if g == groups.len() {
                        kept[p].absorb(&anchor);
                    } else {
                        groups[g][p].absorb(&anchor);
                    }
                    continue;
                }
                speech_index.insert(anchor.key(), (groups.len(), kept.len()));
                kept.push(anchor);
            }
            if !kept.is_empty() {
                groups.push(kept);
            }
        }

        let mut others: Vec<Anchor> = Vec::new();
        let mut other_index: HashMap<i64, usize> = HashMap::new();
        for anchor in periodic.into_iter().chain(events) {
            let key = anchor.key();
            if let Some(&(g, p)) = speech_index.get(&key) {
                groups[g][p].absorb(&anchor);
            } else if let Some(&i) = other_index.get(&key) {
                others[i].absorb(&anchor);
            } else {
                other_index.insert(key, others.len());
                others.push(anchor);
            }
        }

        for group in groups.iter_mut() {
            group.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }
        others.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Self {
            speech_groups: groups,
            others,
        }
    }

    pub fn len(&self) -> usize {
        self.speech_groups.iter().map(Vec::len).sum::<usize>() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_source(&self, source: AnchorSource) -> usize {
        self.speech_groups
            .iter()
            .flatten()
            .chain(self.others.iter())
            .filter(|a| a.has_source(source))
            .count()
    }
}
