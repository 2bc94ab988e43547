//! 九宫格拼图 - 缩略、打时间戳、拼接、保存 JPEG

use super::glyphs::{draw_text, text_size};
use crate::core::config::SheetConfig;
use crate::core::error::{VideoError, VideoResult};
use image::{imageops, DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const SHEET_CAPACITY: usize = 9;

const LABEL_MARGIN: u32 = 5;
const LABEL_PADDING: u32 = 4;
const LABEL_RADIUS: u32 = 4;
const LABEL_ALPHA: u32 = 160;

pub struct ContactSheet<'a> {
    config: &'a SheetConfig,
}

impl<'a> ContactSheet<'a> {
    pub fn new(config: &'a SheetConfig) -> Self {
        Self { config }
    }

    /// 把 `frames` 拼成一张 3x3 九宫格写到 `output`
    ///
    /// 超过 9 帧时每 9 帧一张，命名为 `output` 同目录下的 `<stem>_<n>.jpg`。
    /// 返回所有写出的文件
    pub fn assemble(&self, frames: &[(f64, PathBuf)], output: &Path) -> VideoResult<Vec<PathBuf>> {
        let Some((_, first)) = frames.first() else {
            return Ok(Vec::new());
        };
        let (w, h) = image::image_dimensions(first).map_err(|e| VideoError::InvalidFrame {
            path: first.clone(),
            reason: e.to_string(),
        })?;
        let portrait = h > w;

        let chunked = frames.len() > SHEET_CAPACITY;
        let mut written = Vec::new();
        for (n, chunk) in frames.chunks(SHEET_CAPACITY).enumerate() {
            let (cols, rows) = Self::layout(chunk.len(), portrait);
            let cells = chunk
                .iter()
                .map(|(ts, path)| self.render_cell(*ts, path))
                .collect::<VideoResult<Vec<RgbImage>>>()?;
            let canvas = self.compose(&cells, cols, rows);

            let path = if chunked {
                Self::chunk_path(output, n + 1)
            } else {
                output.to_path_buf()
            };
            let mut writer = BufWriter::new(File::create(&path)?);
            DynamicImage::ImageRgb8(canvas)
                .write_to(&mut writer, ImageOutputFormat::Jpeg(self.config.jpeg_quality))?;
            info!("✅ Contact sheet saved: {:?} ({}x{})", path, cols, rows);
            written.push(path);
        }
        Ok(written)
    }

    /// `count` 帧对应的 (列, 行)
    pub fn layout(count: usize, portrait: bool) -> (u32, u32) {
        let count = count as u32;
        match count {
            0..=3 if portrait => (count.max(1), 1),
            0..=3 => (1, count.max(1)),
            4 => (2, 2),
            5 | 6 if portrait => (3, 2),
            5 | 6 => (2, 3),
            _ => (3, 3),
        }
    }

    fn chunk_path(output: &Path, n: usize) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sheet".to_string());
        output.with_file_name(format!("{}_{}.jpg", stem, n))
    }

    fn render_cell(&self, timestamp: f64, path: &Path) -> VideoResult<RgbImage> {
        let img = image::open(path).map_err(|e| VideoError::InvalidFrame {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let max_side = self.config.max_side;
        // shrink only, never enlarge
        let img = if img.width() > max_side || img.height() > max_side {
            img.thumbnail(max_side, max_side)
        } else {
            img
        };
        let mut cell = img.to_rgb8();
        Self::draw_label(&mut cell, &format!("{:.2}s", timestamp));
        Ok(cell)
    }

    /// 左上角半透明圆角黑底 + 白色时间戳
    fn draw_label(cell: &mut RgbImage, text: &str) {
        let (cw, ch) = cell.dimensions();
        let scale = (cw.min(ch) / 100).clamp(1, 4);
        let (tw, th) = text_size(text, scale);

        let x0 = LABEL_MARGIN.saturating_sub(LABEL_PADDING);
        let y0 = x0;
        let x1 = (LABEL_MARGIN + tw + LABEL_PADDING).min(cw);
        let y1 = (LABEL_MARGIN + th + LABEL_PADDING).min(ch);

        for y in y0..y1 {
            for x in x0..x1 {
                if !Self::inside_rounded(x - x0, y - y0, x1 - x0, y1 - y0, LABEL_RADIUS) {
                    continue;
                }
                let px = cell.get_pixel_mut(x, y);
                for c in px.0.iter_mut() {
                    *c = (*c as u32 * (255 - LABEL_ALPHA) / 255) as u8;
                }
            }
        }
        draw_text(cell, LABEL_MARGIN, LABEL_MARGIN, text, scale, Rgb([255, 255, 255]));
    }

    fn inside_rounded(x: u32, y: u32, w: u32, h: u32, r: u32) -> bool {
        let r = r.min(w / 2).min(h / 2);
        let cx = if x < r {
            r
        } else if x >= w - r {
            w - r - 1
        } else {
            return true;
        };
        let cy = if y < r {
            r
        } else if y >= h - r {
            h - r - 1
        } else {
            return true;
        };
        let (dx, dy) = (x.abs_diff(cx), y.abs_diff(cy));
        dx * dx + dy * dy <= r * r
    }

    /// 格子大小以第一帧为准，其余帧裁剪对齐
    fn compose(&self, cells: &[RgbImage], cols: u32, rows: u32) -> RgbImage {
        let (cell_w, cell_h) = cells.first().map(|c| c.dimensions()).unwrap_or((1, 1));
        let mut canvas = RgbImage::from_pixel(cell_w * cols, cell_h * rows, Rgb(self.config.background));

        for (i, cell) in cells.iter().enumerate() {
            let i = i as u32;
            let (x, y) = ((i % cols) * cell_w, (i / cols) * cell_h);
            let w = cell.width().min(cell_w);
            let h = cell.height().min(cell_h);
            let fitted = imageops::crop_imm(cell, 0, 0, w, h).to_image();
            imageops::replace(&mut canvas, &fitted, x as i64, y as i64);
        }
        canvas
    }
}
