use super::candidate::{remove_frame_file, Candidate};
use super::report::SelectionReport;
use crate::core::video::PerceptualHasher;
use log::debug;

/// 句内去重：按时间顺序与上一张保留帧比较，相似则只留更清晰的一张
///
/// 淘汰的文件立即删除，每次比较都以 `[prev vs curr] ... Keep:` 记入报告
pub fn dedup_sentence(
    mut frames: Vec<Candidate>,
    threshold: u32,
    report: &mut SelectionReport,
) -> Vec<Candidate> {
    frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut kept: Vec<Candidate> = Vec::with_capacity(frames.len());
    for curr in frames {
        let Some(prev) = kept.last_mut() else {
            kept.push(curr);
            continue;
        };

        let dist = PerceptualHasher::distance(&prev.hashes, &curr.hashes);
        let different = dist.is_different(threshold);
        let verdict = if different {
            "both".to_string()
        } else if curr.score.sharpness > prev.score.sharpness {
            format!("{:.2}s", curr.timestamp)
        } else {
            format!("{:.2}s", prev.timestamp)
        };
        report.line(format!(
            "[{:.2}s vs {:.2}s] aHash:{} dHash:{} pHash:{} avg:{:.2} Diff:{:.2} Keep:{}",
            prev.timestamp,
            curr.timestamp,
            dist.ahash,
            dist.dhash,
            dist.phash,
            dist.avg,
            dist.pixel_diff,
            verdict
        ));

        if different {
            kept.push(curr);
        } else if curr.score.sharpness > prev.score.sharpness {
            let dropped = std::mem::replace(prev, curr);
            debug!("🗑️ {:.2}s duplicates a sharper frame", dropped.timestamp);
            remove_frame_file(&dropped.path);
        } else {
            debug!("🗑️ {:.2}s duplicates a sharper frame", curr.timestamp);
            remove_frame_file(&curr.path);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_extractor::anchors::AnchorSource;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::path::Path;

    fn banded(band: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(256, 256, |_, y| {
            if y / 32 == band {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        }))
    }

    fn candidate(dir: &Path, ts: f64, img: &DynamicImage) -> Candidate {
        let path = dir.join(format!("f_{}.png", (ts * 100.0) as u32));
        img.save(&path).unwrap();
        Candidate::from_image(ts, path, img, vec![AnchorSource::Speech], 0.0)
    }

    #[test]
    fn test_distinct_frames_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            candidate(dir.path(), 1.3, &banded(1)),
            candidate(dir.path(), 3.8, &banded(5)),
        ];
        let mut report = SelectionReport::new();
        let kept = dedup_sentence(frames, 5, &mut report);
        assert_eq!(kept.len(), 2);
        assert!(report.contains("Keep:both"));
    }

    #[test]
    fn test_duplicate_keeps_sharper_and_deletes_other() {
        let dir = tempfile::tempdir().unwrap();
        let img = banded(2);
        let first = candidate(dir.path(), 1.0, &img);
        let mut second = candidate(dir.path(), 1.05, &img);
        second.score.sharpness = first.score.sharpness + 1.0;
        let (first_path, second_path) = (first.path.clone(), second.path.clone());

        let mut report = SelectionReport::new();
        let kept = dedup_sentence(vec![second, first], 5, &mut report);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, 1.05);
        assert!(!first_path.exists());
        assert!(second_path.exists());
        assert!(report.contains("[1.00s vs 1.05s]"));
        assert!(report.contains("Keep:1.05s"));
    }

    #[test]
    fn test_tie_keeps_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let img = banded(3);
        let frames = vec![
            candidate(dir.path(), 2.0, &img),
            candidate(dir.path(), 2.2, &img),
            candidate(dir.path(), 2.4, &img),
        ];
        let mut report = SelectionReport::new();
        let kept = dedup_sentence(frames, 5, &mut report);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, 2.0);
        assert_eq!(report.lines().len(), 2);
    }
}
