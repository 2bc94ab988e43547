//! 语音转写结果 - 句段模型、转写文件读写、伪分句

use crate::core::error::{VideoError, VideoResult};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// 伪分句时短于该时长的片段会被合并
pub const MIN_PSEUDO_SENTENCE_MS: f64 = 1200.0;

// 常量正则
static TRANSCRIPT_LINE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^\[\s*(\d+(?:\.\d+)?)s\s*-\s*(\d+(?:\.\d+)?)s\]\s?(.*)$"));

// 中英文句读；针对中文广告口播
static SENTENCE_PIECE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[^，。！？；,.!?;]+[，。！？；,.!?;]?"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: f64,
    pub end_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub start_ms: f64,
    pub end_ms: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl SpeechSegment {
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }

    /// 说话区间（秒），有词级时间戳时以词为准
    pub fn speech_bounds_s(&self) -> (f64, f64) {
        match (self.words.first(), self.words.last()) {
            (Some(first), Some(last)) => (first.start_ms / 1000.0, last.end_ms / 1000.0),
            _ => (self.start_ms / 1000.0, self.end_ms / 1000.0),
        }
    }
}

/// 读取转写服务输出的 JSON 句段数组
pub fn load_segments_json(path: impl AsRef<Path>) -> VideoResult<Vec<SpeechSegment>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let segments: Vec<SpeechSegment> = serde_json::from_str(&text)?;
    info!("📖 Loaded {} speech segments from {:?}", segments.len(), path.as_ref());
    Ok(segments)
}

/// 输出为 `[0.00s - 1.20s] 文本` 行格式
pub fn format_transcript(segments: &[SpeechSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let _ = writeln!(
            out,
            "[{:.2}s - {:.2}s] {}",
            segment.start_ms / 1000.0,
            segment.end_ms / 1000.0,
            segment.text
        );
    }
    out
}

pub fn write_transcript(path: impl AsRef<Path>, segments: &[SpeechSegment]) -> VideoResult<()> {
    std::fs::write(path.as_ref(), format_transcript(segments))?;
    Ok(())
}

/// 解析 [`format_transcript`] 的行格式，空行忽略
pub fn parse_transcript(text: &str) -> VideoResult<Vec<SpeechSegment>> {
    let line_pattern = TRANSCRIPT_LINE
        .as_ref()
        .map_err(|e| VideoError::Config(format!("transcript pattern: {}", e)))?;
    let mut segments = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let caps = line_pattern.captures(line).ok_or_else(|| VideoError::Transcript {
            line: index + 1,
            reason: format!("unrecognised line: {}", line),
        })?;
        let start_s: f64 = caps[1].parse().map_err(|_| VideoError::Transcript {
            line: index + 1,
            reason: "bad start time".into(),
        })?;
        let end_s: f64 = caps[2].parse().map_err(|_| VideoError::Transcript {
            line: index + 1,
            reason: "bad end time".into(),
        })?;
        if end_s < start_s {
            return Err(VideoError::Transcript {
                line: index + 1,
                reason: format!("end {:.2}s before start {:.2}s", end_s, start_s),
            });
        }
        segments.push(SpeechSegment::new(
            (start_s * 1000.0).round(),
            (end_s * 1000.0).round(),
            caps[3].trim(),
        ));
    }
    Ok(segments)
}

pub fn read_transcript(path: impl AsRef<Path>) -> VideoResult<Vec<SpeechSegment>> {
    parse_transcript(&std::fs::read_to_string(path.as_ref())?)
}

/// 把一整段 ASR 文本按标点切成伪句子，并按字符数比例分配时间。
///
/// 仅用于缺少词级时间戳的转写
pub fn split_pseudo_sentences(start_ms: f64, end_ms: f64, text: &str) -> Vec<SpeechSegment> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let Ok(sentence_piece) = SENTENCE_PIECE.as_ref() else {
        return vec![SpeechSegment::new(start_ms, end_ms, text)];
    };
    let pieces: Vec<&str> = sentence_piece
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|piece| !piece.trim().is_empty())
        .collect();

    if pieces.len() <= 1 {
        return vec![SpeechSegment::new(start_ms, end_ms, text)];
    }

    let total_chars: usize = pieces.iter().map(|p| p.chars().count()).sum();
    let span = (end_ms - start_ms).max(0.0);

    let mut timed: Vec<(f64, f64, String)> = Vec::with_capacity(pieces.len());
    let mut cursor = start_ms;
    for piece in &pieces {
        let share = span * piece.chars().count() as f64 / total_chars as f64;
        timed.push((cursor, cursor + share, piece.trim().to_string()));
        cursor += share;
    }
    if let Some(last) = timed.last_mut() {
        last.1 = end_ms;
    }

    // 过短的片段并入下一句；最后一句过短则并入上一句
    let mut merged: Vec<(f64, f64, String)> = Vec::with_capacity(timed.len());
    let mut pending: Option<(f64, f64, String)> = None;
    for (s, e, t) in timed {
        let current = match pending.take() {
            Some((ps, _, pt)) => (ps, e, join_pieces(&pt, &t)),
            None => (s, e, t),
        };
        if current.1 - current.0 < MIN_PSEUDO_SENTENCE_MS {
            pending = Some(current);
        } else {
            merged.push(current);
        }
    }
    if let Some((ps, pe, pt)) = pending {
        match merged.last_mut() {
            Some(last) => {
                last.1 = pe;
                last.2 = join_pieces(&last.2, &pt);
            }
            None => merged.push((ps, pe, pt)),
        }
    }

    debug!("✂️ Split {:.0}-{:.0}ms into {} pseudo sentences", start_ms, end_ms, merged.len());
    merged
        .into_iter()
        .map(|(s, e, t)| SpeechSegment::new(s, e, t))
        .collect()
}

/// 拼接两个片段：英文之间补回切分时去掉的空格，中文直接相连
fn join_pieces(left: &str, right: &str) -> String {
    let needs_space = matches!(
        (left.chars().last(), right.chars().next()),
        (Some(a), Some(b)) if a.is_ascii() && b.is_ascii()
    );
    if needs_space {
        format!("{} {}", left, right)
    } else {
        format!("{}{}", left, right)
    }
}
