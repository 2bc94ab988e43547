use super::FrameSource;
use crate::core::config::MediaConfig;
use crate::core::error::{VideoError, VideoResult};
use crate::core::video::GrayFrame;
use log::{debug, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// ffmpeg / ffprobe 子进程实现
pub struct FfmpegSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    jpeg_qscale: u8,
}

impl FfmpegSource {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            jpeg_qscale: config.jpeg_qscale,
        }
    }

    fn parse_duration(stdout: &str) -> Option<f64> {
        stdout
            .lines()
            .map(str::trim)
            .find_map(|line| line.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new(&MediaConfig::default())
    }
}

impl FrameSource for FfmpegSource {
    fn duration(&self, video: &Path) -> VideoResult<f64> {
        if !video.exists() {
            return Err(VideoError::unreadable(video, "file not found"));
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video)
            .output()
            .map_err(|e| VideoError::unreadable(video, format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::unreadable(video, stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_duration(&stdout)
            .ok_or_else(|| VideoError::unreadable(video, format!("no duration in {:?}", stdout.trim())))
    }

    fn extract_frame(&self, video: &Path, timestamp: f64, output: &Path) -> VideoResult<()> {
        let result = Command::new(&self.ffmpeg)
            .args(["-y", "-loglevel", "error", "-ss", &format!("{:.3}", timestamp), "-i"])
            .arg(video)
            .args(["-vframes", "1", "-q:v", &self.jpeg_qscale.to_string(), "-f", "image2"])
            .arg(output)
            .output()
            .map_err(|e| VideoError::decode(timestamp, format!("failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(VideoError::decode(timestamp, stderr.trim().to_string()));
        }

        // seeking past the last frame exits 0 with no output
        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            let _ = std::fs::remove_file(output);
            return Err(VideoError::decode(timestamp, "empty output"));
        }
        Ok(())
    }

    fn sample_gray(&self, video: &Path, fps: f64, size: u32) -> VideoResult<Vec<GrayFrame>> {
        let bytes_per_frame = (size * size) as usize;
        debug!("🎞️ Sampling {:?} at {} fps ({}x{} gray)", video, fps, size, size);

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video)
            .args([
                "-vf",
                &format!("fps={},scale={}:{},format=gray", fps, size, size),
                "-f",
                "rawvideo",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::unreadable(video, format!("failed to spawn ffmpeg: {}", e)))?;

        let mut buffer = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            if let Err(e) = stdout.read_to_end(&mut buffer) {
                // 读取失败也要回收子进程
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
        let status = child.wait()?;
        if !status.success() {
            warn!("⚠️ ffmpeg sampling exited with {:?}", status.code());
        }

        Ok(buffer
            .chunks_exact(bytes_per_frame)
            .enumerate()
            .map(|(i, chunk)| GrayFrame::new(size, size, chunk.to_vec(), i as f64 / fps))
            .collect())
    }
}
