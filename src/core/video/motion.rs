use super::frame::GrayFrame;

/// 归一化系数：任一项达到 1.0 即为视觉事件
const MEAN_DIFF_NORM: f64 = 28.0;
const P95_DIFF_NORM: f64 = 55.0;
const CHANGED_FRACTION_NORM: f64 = 0.08;
/// 单像素差超过该值计为“变化”
const CHANGED_PIXEL_DIFF: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeStats {
    pub mean_diff: f64,
    pub p95_diff: f64,
    pub changed_fraction: f64,
}

impl ChangeStats {
    pub fn score(&self) -> f64 {
        (self.mean_diff / MEAN_DIFF_NORM)
            .max(self.p95_diff / P95_DIFF_NORM)
            .max(self.changed_fraction / CHANGED_FRACTION_NORM)
    }
}

/// 帧间差异 - 均值 / 95 分位 / 变化像素占比
pub fn change_stats(prev: &[u8], curr: &[u8]) -> Option<ChangeStats> {
    if prev.is_empty() || prev.len() != curr.len() {
        return None;
    }

    let mut histogram = [0u32; 256];
    let mut sum = 0u64;
    let mut changed = 0usize;
    for (&a, &b) in prev.iter().zip(curr.iter()) {
        let diff = a.abs_diff(b);
        histogram[diff as usize] += 1;
        sum += diff as u64;
        if diff > CHANGED_PIXEL_DIFF {
            changed += 1;
        }
    }

    let total = prev.len();
    let rank = ((total as f64) * 0.95).ceil() as u32;
    let mut seen = 0u32;
    let mut p95 = 0usize;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= rank {
            p95 = value;
            break;
        }
    }

    Some(ChangeStats {
        mean_diff: sum as f64 / total as f64,
        p95_diff: p95 as f64,
        changed_fraction: changed as f64 / total as f64,
    })
}

/// 每个采样与前一帧比较打分，第一帧没有分数
pub fn change_series(samples: &[GrayFrame]) -> Vec<(f64, f64)> {
    samples
        .windows(2)
        .filter_map(|pair| {
            change_stats(&pair[0].data, &pair[1].data).map(|stats| (pair[1].timestamp, stats.score()))
        })
        .collect()
}
