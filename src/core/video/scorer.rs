//! 帧质量打分 - 清晰度 + 边缘/角落文字密度 + 视觉事件强度

use super::frame::{analysis_gray, ANALYSIS_SIZE};
use image::{DynamicImage, GrayImage};

/// 角落裁剪边长，用于估计文字/角标密度
pub const CORNER_SIZE: u32 = 64;

const CANNY_LOW: i32 = 100;
const CANNY_HIGH: i32 = 200;

const CORNER_WEIGHT: f64 = 6.0;
const EDGE_WEIGHT: f64 = 2.0;
const EVENT_WEIGHT: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    /// 拉普拉斯方差
    pub sharpness: f64,
    pub edge_ratio: f64,
    pub corner_ratio: f64,
    pub event_score: f64,
    pub composite: f64,
}

impl FrameScore {
    pub fn new(sharpness: f64, edge_ratio: f64, corner_ratio: f64, event_score: f64) -> Self {
        let composite = (1.0 + sharpness.max(0.0)).ln()
            + CORNER_WEIGHT * corner_ratio
            + EDGE_WEIGHT * edge_ratio
            + EVENT_WEIGHT * event_score.max(0.0);
        Self {
            sharpness,
            edge_ratio,
            corner_ratio,
            event_score,
            composite,
        }
    }
}

impl std::fmt::Display for FrameScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "score={:.3} (sharp={:.1} edge={:.3} corner={:.3} event={:.2})",
            self.composite, self.sharpness, self.edge_ratio, self.corner_ratio, self.event_score
        )
    }
}

pub struct FrameScorer;

impl FrameScorer {
    pub fn score(img: &DynamicImage, event_score: f64) -> FrameScore {
        let gray = analysis_gray(img);
        let sharpness = Self::laplacian_variance(&gray);
        let edges = Self::canny(&gray);
        let edge_ratio = Self::edge_fraction(&edges, ANALYSIS_SIZE, 0, 0, ANALYSIS_SIZE, ANALYSIS_SIZE);
        let corner_ratio = Self::corner_ratio(&edges, ANALYSIS_SIZE);
        FrameScore::new(sharpness, edge_ratio, corner_ratio, event_score)
    }

    /// 4 邻域拉普拉斯，只统计内部像素的方差
    pub fn laplacian_variance(gray: &GrayImage) -> f64 {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return 0.0;
        }
        let w = width as usize;
        let data = gray.as_raw();

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for y in 1..(height as usize - 1) {
            for x in 1..(w - 1) {
                let idx = y * w + x;
                let lap = data[idx - w] as i32 + data[idx + w] as i32 + data[idx - 1] as i32
                    + data[idx + 1] as i32
                    - 4 * data[idx] as i32;
                let v = lap as f64;
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }

        let mean = sum / count as f64;
        (sum_sq / count as f64 - mean * mean).max(0.0)
    }

    /// Canny edge map: Sobel L1 magnitude, non-maximum suppression, hysteresis.
    pub fn canny(gray: &GrayImage) -> Vec<bool> {
        let (width, height) = gray.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut edges = vec![false; w * h];
        if w < 3 || h < 3 {
            return edges;
        }
        let data = gray.as_raw();
        let px = |x: usize, y: usize| data[y * w + x] as i32;

        let mut magnitude = vec![0i32; w * h];
        let mut direction = vec![0u8; w * h];
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x - 1, y)
                    - px(x - 1, y + 1);
                let gy = px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x, y - 1)
                    - px(x + 1, y - 1);
                let idx = y * w + x;
                magnitude[idx] = gx.abs() + gy.abs();
                direction[idx] = Self::quantize_direction(gx, gy);
            }
        }

        // 0 = none, 1 = weak, 2 = strong
        let mut class = vec![0u8; w * h];
        let mut stack = Vec::new();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let idx = y * w + x;
                let m = magnitude[idx];
                if m <= CANNY_LOW {
                    continue;
                }
                let (a, b) = match direction[idx] {
                    0 => (idx - 1, idx + 1),
                    1 => (idx - w + 1, idx + w - 1),
                    2 => (idx - w, idx + w),
                    _ => (idx - w - 1, idx + w + 1),
                };
                if m < magnitude[a] || m <= magnitude[b] {
                    continue;
                }
                if m > CANNY_HIGH {
                    class[idx] = 2;
                    stack.push(idx);
                } else {
                    class[idx] = 1;
                }
            }
        }

        while let Some(idx) = stack.pop() {
            edges[idx] = true;
            let (x, y) = (idx % w, idx / w);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if class[n] == 1 {
                        class[n] = 2;
                        stack.push(n);
                    }
                }
            }
        }

        edges
    }

    /// 0: horizontal gradient, 1: 45°, 2: vertical, 3: 135°
    fn quantize_direction(gx: i32, gy: i32) -> u8 {
        let ax = gx.abs() as f64;
        let ay = gy.abs() as f64;
        // tan(22.5°) ≈ 0.4142
        if ay <= ax * 0.4142 {
            0
        } else if ax <= ay * 0.4142 {
            2
        } else if (gx > 0) == (gy > 0) {
            3
        } else {
            1
        }
    }

    fn edge_fraction(edges: &[bool], stride: u32, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let mut count = 0usize;
        for row in y..y + h {
            let start = (row * stride + x) as usize;
            count += edges[start..start + w as usize].iter().filter(|&&e| e).count();
        }
        count as f64 / (w * h) as f64
    }

    /// 四个角落中边缘最密的一个，广告字幕/角标多在角落
    fn corner_ratio(edges: &[bool], size: u32) -> f64 {
        let c = CORNER_SIZE.min(size);
        let far = size - c;
        [(0, 0), (far, 0), (0, far), (far, far)]
            .iter()
            .map(|&(x, y)| Self::edge_fraction(edges, size, x, y, c, c))
            .fold(0.0, f64::max)
    }
}
