//! 感知哈希 - aHash / dHash / pHash + 灰度缩略图
//!
//! 三种哈希加像素差共同决定"两帧是否重复"，整个流程只用这一套判定。

use super::frame::{analysis_gray, area_downsample, gaussian_blur_3x3, ANALYSIS_SIZE};
use image::{DynamicImage, GrayImage};
use rustdct::{Dct2, DctPlanner};

/// 三种汉明距离均值的固定上限
pub const AVG_DISTANCE_BOUND: f64 = 4.0;
/// 模糊缩略图平均像素差的固定上限
pub const PIXEL_DIFF_BOUND: f64 = 15.0;
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;

const PHASH_SIZE: usize = 32;

/// 单帧指纹
#[derive(Debug, Clone)]
pub struct HashBundle {
    pub ahash: u64,
    pub dhash: u64,
    pub phash: u64,
    /// 模糊后的 256×256 灰度图
    pub gray: GrayImage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDistance {
    pub ahash: u32,
    pub dhash: u32,
    pub phash: u32,
    pub avg: f64,
    pub pixel_diff: f64,
}

impl FrameDistance {
    /// 任一指标超限即判为不同
    pub fn is_different(&self, threshold: u32) -> bool {
        self.ahash > threshold
            || self.dhash > threshold
            || self.phash > threshold
            || self.avg > AVG_DISTANCE_BOUND
            || self.pixel_diff > PIXEL_DIFF_BOUND
    }
}

pub struct PerceptualHasher;

impl PerceptualHasher {
    pub fn hash(img: &DynamicImage) -> HashBundle {
        let gray = gaussian_blur_3x3(&analysis_gray(img));
        let data = gray.as_raw();

        HashBundle {
            ahash: Self::ahash(data),
            dhash: Self::dhash(data),
            phash: Self::phash(data),
            gray,
        }
    }

    fn ahash(data: &[u8]) -> u64 {
        let samples = area_downsample(data, ANALYSIS_SIZE, ANALYSIS_SIZE, 8, 8);
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        Self::threshold_bits(&samples, mean)
    }

    fn dhash(data: &[u8]) -> u64 {
        let samples = area_downsample(data, ANALYSIS_SIZE, ANALYSIS_SIZE, 9, 8);
        let mut hash = 0u64;
        for row in 0..8 {
            for col in 0..8 {
                let left = samples[row * 9 + col];
                let right = samples[row * 9 + col + 1];
                if left > right {
                    hash |= 1 << (row * 8 + col);
                }
            }
        }
        hash
    }

    fn phash(data: &[u8]) -> u64 {
        let mut block = area_downsample(
            data,
            ANALYSIS_SIZE,
            ANALYSIS_SIZE,
            PHASH_SIZE as u32,
            PHASH_SIZE as u32,
        );
        Self::dct_2d(&mut block, PHASH_SIZE);

        let mut low = [0f32; 64];
        for row in 0..8 {
            for col in 0..8 {
                low[row * 8 + col] = block[row * PHASH_SIZE + col];
            }
        }
        let mean = low.iter().sum::<f32>() / 64.0;
        Self::threshold_bits(&low, mean)
    }

    /// Orthonormal 2D DCT-II in place (rows, then columns).
    fn dct_2d(block: &mut [f32], n: usize) {
        let mut planner = DctPlanner::<f32>::new();
        let dct = planner.plan_dct2(n);

        for row in block.chunks_exact_mut(n) {
            dct.process_dct2(row);
        }

        let mut column = vec![0f32; n];
        for col in 0..n {
            for row in 0..n {
                column[row] = block[row * n + col];
            }
            dct.process_dct2(&mut column);
            for row in 0..n {
                block[row * n + col] = column[row];
            }
        }

        // rustdct is unnormalised; bring DC and AC terms onto the same scale
        let scale = (2.0 / n as f32).sqrt();
        let dc = std::f32::consts::FRAC_1_SQRT_2;
        for row in 0..n {
            for col in 0..n {
                let mut factor = scale * scale;
                if row == 0 {
                    factor *= dc;
                }
                if col == 0 {
                    factor *= dc;
                }
                block[row * n + col] *= factor;
            }
        }
    }

    fn threshold_bits(samples: &[f32], mean: f32) -> u64 {
        let mut hash = 0u64;
        for (i, &val) in samples.iter().enumerate().take(64) {
            if val > mean {
                hash |= 1 << i;
            }
        }
        hash
    }

    pub fn hamming_distance(a: u64, b: u64) -> u32 {
        (a ^ b).count_ones()
    }

    pub fn distance(h1: &HashBundle, h2: &HashBundle) -> FrameDistance {
        let ahash = Self::hamming_distance(h1.ahash, h2.ahash);
        let dhash = Self::hamming_distance(h1.dhash, h2.dhash);
        let phash = Self::hamming_distance(h1.phash, h2.phash);

        let a = h1.gray.as_raw();
        let b = h2.gray.as_raw();
        let pixel_diff = if a.is_empty() || a.len() != b.len() {
            255.0
        } else {
            a.iter()
                .zip(b.iter())
                .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
                .sum::<u64>() as f64
                / a.len() as f64
        };

        FrameDistance {
            ahash,
            dhash,
            phash,
            avg: (ahash + dhash + phash) as f64 / 3.0,
            pixel_diff,
        }
    }

    pub fn is_similar(h1: &HashBundle, h2: &HashBundle, threshold: u32) -> bool {
        !Self::distance(h1, h2).is_different(threshold)
    }
}
