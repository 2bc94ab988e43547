use image::{imageops, DynamicImage, GrayImage};

/// 哈希和打分用的方形灰度缩略图边长
pub const ANALYSIS_SIZE: u32 = 256;

/// 采样帧（灰度，低分辨率），用于视觉事件检测
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp: f64,
}

impl GrayFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: f64) -> Self {
        Self {
            width,
            height,
            data,
            timestamp,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn from_image(img: &DynamicImage, size: u32, timestamp: f64) -> Self {
        let gray = imageops::resize(&img.to_luma8(), size, size, imageops::FilterType::Triangle);
        Self {
            width: size,
            height: size,
            data: gray.into_raw(),
            timestamp,
        }
    }
}

/// 缩放到 256×256 并转灰度
pub fn analysis_gray(img: &DynamicImage) -> GrayImage {
    let resized = img.resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, imageops::FilterType::Triangle);
    resized.to_luma8()
}

/// 3×3 高斯模糊（1-2-1），边界镜像
pub fn gaussian_blur_3x3(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let src = gray.as_raw();
    let reflect = |i: isize, n: usize| -> usize {
        if n == 1 {
            0
        } else if i < 0 {
            (-i) as usize
        } else if i as usize >= n {
            2 * n - 2 - i as usize
        } else {
            i as usize
        }
    };

    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let l = src[row + reflect(x as isize - 1, w)] as u32;
            let c = src[row + x] as u32;
            let r = src[row + reflect(x as isize + 1, w)] as u32;
            horizontal[row + x] = l + 2 * c + r;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let up = reflect(y as isize - 1, h) * w;
        let down = reflect(y as isize + 1, h) * w;
        for x in 0..w {
            let sum = horizontal[up + x] + 2 * horizontal[y * w + x] + horizontal[down + x];
            out[y * w + x] = ((sum + 8) / 16) as u8;
        }
    }

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| gray.clone())
}

/// 面积平均下采样，每个源像素按覆盖比例计入
///
/// Returns `out_w * out_h` row-major means.
pub fn area_downsample(data: &[u8], width: u32, height: u32, out_w: u32, out_h: u32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let (ow, oh) = (out_w as usize, out_h as usize);
    if w == 0 || h == 0 || ow == 0 || oh == 0 {
        return vec![0.0; ow * oh];
    }

    let sx = w as f64 / ow as f64;
    let sy = h as f64 / oh as f64;
    let mut out = Vec::with_capacity(ow * oh);

    for oy in 0..oh {
        let y0 = oy as f64 * sy;
        let y1 = y0 + sy;
        for ox in 0..ow {
            let x0 = ox as f64 * sx;
            let x1 = x0 + sx;

            let mut acc = 0.0f64;
            let mut weight = 0.0f64;
            let mut py = y0.floor() as usize;
            while (py as f64) < y1 && py < h {
                let wy = (y1.min(py as f64 + 1.0) - y0.max(py as f64)).max(0.0);
                let mut px = x0.floor() as usize;
                while (px as f64) < x1 && px < w {
                    let wx = (x1.min(px as f64 + 1.0) - x0.max(px as f64)).max(0.0);
                    let cover = wx * wy;
                    acc += data[py * w + px] as f64 * cover;
                    weight += cover;
                    px += 1;
                }
                py += 1;
            }

            out.push(if weight > 0.0 { (acc / weight) as f32 } else { 0.0 });
        }
    }

    out
}
