//! 分析配置 - 锚点、去重、媒体工具、拼图、批处理

use crate::core::error::{VideoError, VideoResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// 句首之后的偏移（秒）
    pub start_offset_s: f64,
    /// 句尾之前的偏移（秒）
    pub end_offset_s: f64,
    pub periodic_step_s: f64,
    pub periodic_max_points: usize,
    /// 视觉事件检测的采样帧率
    pub event_sample_rate: f64,
    pub event_max: usize,
    pub event_min_gap_s: f64,
    pub event_probe_offset_s: f64,
    /// 无词级时间戳的长句段先按标点切成伪句子（默认关闭，句段按原样使用）
    pub split_untimed_segments: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            start_offset_s: 0.3,
            end_offset_s: 0.2,
            periodic_step_s: 2.5,
            periodic_max_points: 12,
            event_sample_rate: 3.0,
            event_max: 10,
            event_min_gap_s: 0.6,
            event_probe_offset_s: 0.2,
            split_untimed_segments: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// `is_similar` 的单项汉明距离阈值
    pub similarity_threshold: u32,
    /// 关键候选替换时需要超出的分数差
    pub replacement_margin: f64,
    /// 替换阶段最多考察的关键候选数
    pub replacement_candidates: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 5,
            replacement_margin: 0.25,
            replacement_candidates: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// ffmpeg `-q:v` (2 = high quality)
    pub jpeg_qscale: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            jpeg_qscale: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub max_side: u32,
    pub jpeg_quality: u8,
    pub background: [u8; 3],
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            max_side: 400,
            jpeg_quality: 95,
            background: [30, 30, 30],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// 九宫格写出后删除源视频
    pub delete_source_after: bool,
    pub video_extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 5),
            delete_source_after: false,
            video_extensions: ["mp4", "avi", "mov", "mkv", "flv", "ts"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub anchors: AnchorConfig,
    pub selection: SelectionConfig,
    pub media: MediaConfig,
    pub sheet: SheetConfig,
    pub batch: BatchConfig,
}

impl AnalyzerConfig {
    /// 读取 JSON5 配置，缺省字段使用默认值
    pub fn load(path: impl AsRef<Path>) -> VideoResult<Self> {
        let path = path.as_ref();
        info!("📖 Loading analyzer config: {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    pub fn from_json5(text: &str) -> VideoResult<Self> {
        let config: Self = json5::from_str(text).map_err(|e| VideoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 环境变量 `FFMPEG_PATH` / `FFPROBE_PATH` 优先于配置文件
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("FFMPEG_PATH") {
            self.media.ffmpeg_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FFPROBE_PATH") {
            self.media.ffprobe_path = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> VideoResult<()> {
        if self.anchors.periodic_step_s <= 0.0 {
            return Err(VideoError::Config(
                "anchors.periodic_step_s must be positive".into(),
            ));
        }
        if self.anchors.event_sample_rate <= 0.0 {
            return Err(VideoError::Config(
                "anchors.event_sample_rate must be positive".into(),
            ));
        }
        if self.anchors.start_offset_s < 0.0 || self.anchors.end_offset_s < 0.0 {
            return Err(VideoError::Config("speech offsets must not be negative".into()));
        }
        if self.sheet.max_side == 0 || self.sheet.jpeg_quality == 0 || self.sheet.jpeg_quality > 100 {
            return Err(VideoError::Config("sheet size/quality out of range".into()));
        }
        if self.batch.workers == 0 {
            return Err(VideoError::Config("batch.workers must be at least 1".into()));
        }
        Ok(())
    }

    /// 快剪辑混剪：镜头多，网格更密、事件更多
    pub fn for_fast_cuts() -> Self {
        Self {
            anchors: AnchorConfig {
                periodic_step_s: 1.5,
                periodic_max_points: 16,
                event_sample_rate: 4.0,
                event_max: 14,
                event_min_gap_s: 0.4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 单人口播：镜头少，主要依赖语音锚点
    pub fn for_talking_head() -> Self {
        Self {
            anchors: AnchorConfig {
                periodic_step_s: 3.5,
                periodic_max_points: 10,
                event_sample_rate: 2.0,
                event_max: 6,
                event_min_gap_s: 1.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.anchors.start_offset_s, 0.3);
        assert_eq!(config.anchors.end_offset_s, 0.2);
        assert_eq!(config.anchors.periodic_step_s, 2.5);
        assert!(!config.anchors.split_untimed_segments);
        assert_eq!(config.selection.similarity_threshold, 5);
        assert_eq!(config.sheet.max_side, 400);
        assert!(config.batch.workers >= 1 && config.batch.workers <= 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json5_partial_override() {
        let text = r#"{
            // only tweak what we need
            anchors: { periodic_step_s: 3.0 },
            selection: { similarity_threshold: 7, },
        }"#;
        let config = AnalyzerConfig::from_json5(text).unwrap();
        assert_eq!(config.anchors.periodic_step_s, 3.0);
        assert_eq!(config.anchors.start_offset_s, 0.3);
        assert_eq!(config.selection.similarity_threshold, 7);
        assert_eq!(config.selection.replacement_candidates, 12);
    }

    #[test]
    fn test_invalid_step_rejected() {
        let result = AnalyzerConfig::from_json5("{ anchors: { periodic_step_s: 0 } }");
        assert!(matches!(result, Err(VideoError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.json5");
        std::fs::write(&path, "{ sheet: { jpeg_quality: 90 } }").unwrap();
        let config = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(config.sheet.jpeg_quality, 90);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(AnalyzerConfig::for_fast_cuts().validate().is_ok());
        assert!(AnalyzerConfig::for_talking_head().validate().is_ok());
        assert!(
            AnalyzerConfig::for_fast_cuts().anchors.periodic_step_s
                < AnalyzerConfig::for_talking_head().anchors.periodic_step_s
        );
    }
}
