//! Visual regression check: screenshot vs. accepted baseline.
//!
//! The diff itself is plain pixel comparison with a small per-channel
//! tolerance for anti-aliasing, a sha256 short-circuit for identical
//! files, and configured dynamic regions blanked on both sides before
//! comparing. Baselines live under the shared baseline directory and are
//! only rewritten in update mode (or created when missing).

use crate::scenario::{
    CheckCategory, CheckContext, CheckError, CheckOutcome, CheckScenario, gate_status,
    summary_attachments,
};
use async_trait::async_trait;
use base64::Engine as _;
use image::{Rgba, RgbaImage};
use presscheck_browser::BrowserDriver;
use presscheck_core::{
    A11yMode, Attachment, Issue, IssueBucket, MaskRect, PageAuditReport, Viewport, attachment_base_name,
    parse_viewports, slugify,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Per-channel tolerance absorbing anti-aliasing and encoder noise.
const PIXEL_TOLERANCE: i32 = 5;

/// Result of comparing one screenshot against its baseline.
#[derive(Debug, Clone)]
pub struct DiffStats {
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_percent: f64,
    /// Red-overlay diff image; present only when pixels differ.
    pub diff_image: Option<RgbaImage>,
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > PIXEL_TOLERANCE)
}

/// Blanks configured dynamic regions so they never count as differences.
pub fn apply_masks(img: &mut RgbaImage, masks: &[MaskRect]) {
    let blank = Rgba([0, 0, 0, 255]);
    for mask in masks {
        let x_end = mask.x.saturating_add(mask.width).min(img.width());
        let y_end = mask.y.saturating_add(mask.height).min(img.height());
        for y in mask.y..y_end {
            for x in mask.x..x_end {
                img.put_pixel(x, y, blank);
            }
        }
    }
}

/// Pixel-compares two images of (possibly) unequal size.
///
/// Pixels outside the overlapping region count as differences, so a layout
/// change that alters page height is reported rather than ignored.
#[must_use]
pub fn diff_images(actual: &RgbaImage, baseline: &RgbaImage) -> DiffStats {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let overlap_w = actual.width().min(baseline.width());
    let overlap_h = actual.height().min(baseline.height());

    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;
    let total_pixels = u64::from(width) * u64::from(height);

    for y in 0..height {
        for x in 0..width {
            let in_overlap = x < overlap_w && y < overlap_h;
            let differs = if in_overlap {
                pixels_differ(actual.get_pixel(x, y), baseline.get_pixel(x, y))
            } else {
                true
            };
            if differs {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let p = actual.get_pixel(x, y).0;
                diff_img.put_pixel(x, y, Rgba([p[0] / 2, p[1] / 2, p[2] / 2, 128]));
            }
        }
    }

    let diff_percent = if total_pixels == 0 {
        0.0
    } else {
        (diff_pixels as f64 / total_pixels as f64) * 100.0
    };
    DiffStats {
        diff_pixels,
        total_pixels,
        diff_percent,
        diff_image: (diff_pixels > 0).then_some(diff_img),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn decode_png(data: &[u8]) -> Result<RgbaImage, CheckError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| CheckError::Setup(format!("failed to decode screenshot: {}", e)))?;
    Ok(img.to_rgba8())
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, CheckError> {
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| CheckError::Setup(format!("failed to encode diff image: {}", e)))?;
    Ok(out)
}

fn png_attachment(name: String, png: &[u8]) -> Attachment {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    Attachment::png_data_uri(name, &encoded)
}

/// Screenshot-vs-baseline check over the configured viewports.
pub struct VisualCheck;

impl VisualCheck {
    fn baseline_path(dir: &Path, site: &str, viewport: &str, page: &str) -> PathBuf {
        dir.join(site)
            .join(format!("{}-{}.png", viewport, slugify(page)))
    }

    #[allow(clippy::too_many_arguments)]
    fn compare_page(
        report: &mut PageAuditReport,
        attachments: &mut Vec<Attachment>,
        ctx: &CheckContext,
        viewport: Viewport,
        page_path: &str,
        baseline_path: &Path,
        screenshot: &[u8],
    ) -> Result<(), CheckError> {
        if ctx.update_baselines || !baseline_path.exists() {
            if let Some(parent) = baseline_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(baseline_path, screenshot)?;
            let reason = if ctx.update_baselines {
                "baseline updated"
            } else {
                "baseline created (none existed)"
            };
            info!(page = %page_path, viewport = viewport.name, reason);
            report.push(Issue::check_failure("baseline", IssueBucket::Advisory, reason));
            return Ok(());
        }

        let baseline_bytes = std::fs::read(baseline_path)?;
        if sha256_hex(&baseline_bytes) == sha256_hex(screenshot) {
            report.set_extra("diff_percent", serde_json::Value::from(0.0));
            return Ok(());
        }

        let masks = ctx.site.masks_for(page_path);
        let mut actual = decode_png(screenshot)?;
        let mut baseline = decode_png(&baseline_bytes)?;
        apply_masks(&mut actual, masks);
        apply_masks(&mut baseline, masks);

        let stats = diff_images(&actual, &baseline);
        let threshold = ctx.site.threshold_for(page_path);
        report.set_extra("diff_percent", serde_json::Value::from(stats.diff_percent));

        if stats.diff_percent > threshold {
            warn!(
                page = %page_path,
                viewport = viewport.name,
                diff = format!("{:.2}%", stats.diff_percent),
                threshold = format!("{:.2}%", threshold),
                "visual regression detected"
            );
            report.push(Issue::check_failure(
                "visual-diff",
                IssueBucket::Gating,
                format!(
                    "{:.2}% of pixels differ from baseline (threshold {:.2}%)",
                    stats.diff_percent, threshold
                ),
            ));
            if let Some(diff_img) = &stats.diff_image {
                let png = encode_png(diff_img)?;
                let name = format!(
                    "{}.png",
                    attachment_base_name("visual", "diff", &format!("{}-{}", viewport.name, page_path))
                );
                attachments.push(png_attachment(name, &png));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CheckScenario for VisualCheck {
    fn id(&self) -> &str {
        "visual"
    }

    fn description(&self) -> &str {
        "Compares per-viewport screenshots against accepted baselines"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Visual
    }

    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let viewports = parse_viewports(ctx.env.visual_viewports.as_deref());
        let pages = ctx.sampled_pages(None);
        let mut outcomes = Vec::with_capacity(viewports.len());

        for viewport in viewports {
            let session = driver.new_session().await?;
            session.set_viewport(viewport).await?;

            let mut reports = Vec::with_capacity(pages.len());
            let mut attachments = Vec::new();
            let mut errors = Vec::new();

            for page_path in &pages {
                let mut report = PageAuditReport::new(page_path.clone());
                let url = ctx.site.page_url(page_path);

                if let Err(e) = session.navigate(&url).await {
                    report.push(Issue::check_failure(
                        "page-unreachable",
                        IssueBucket::Gating,
                        format!("could not open {}: {}", url, e),
                    ));
                    errors.push(e.to_string());
                    reports.push(report);
                    continue;
                }
                session.wait_for_stable(Duration::from_secs(10)).await;

                match session.screenshot_png().await {
                    Ok(screenshot) => {
                        let baseline_path = Self::baseline_path(
                            &ctx.baseline_dir,
                            &ctx.site.name,
                            viewport.name,
                            page_path,
                        );
                        if let Err(e) = Self::compare_page(
                            &mut report,
                            &mut attachments,
                            ctx,
                            viewport,
                            page_path,
                            &baseline_path,
                            &screenshot,
                        ) {
                            report.push(Issue::check_failure(
                                "compare-failed",
                                IssueBucket::Gating,
                                e.to_string(),
                            ));
                            errors.push(e.to_string());
                        }
                    }
                    Err(e) => {
                        report.push(Issue::check_failure(
                            "screenshot-failed",
                            IssueBucket::Gating,
                            e.to_string(),
                        ));
                        errors.push(e.to_string());
                    }
                }
                reports.push(report);
            }
            session.close().await.ok();

            let gating: usize = reports.iter().map(PageAuditReport::gating_count).sum();
            let status = gate_status(gating, 0, A11yMode::Gate);
            attachments.extend(summary_attachments("visual", viewport.name, &reports));

            outcomes.push(CheckOutcome {
                project: viewport.name.to_string(),
                pages: reports,
                attachments,
                status,
                errors,
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn identical_images_have_zero_diff() {
        let a = solid(10, 10, [10, 20, 30, 255]);
        let stats = diff_images(&a, &a.clone());
        assert_eq!(stats.diff_pixels, 0);
        assert_eq!(stats.diff_percent, 0.0);
        assert!(stats.diff_image.is_none());
    }

    #[test]
    fn tolerance_absorbs_antialiasing_noise() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [104, 97, 102, 255]);
        let stats = diff_images(&a, &b);
        assert_eq!(stats.diff_pixels, 0);
    }

    #[test]
    fn changed_region_is_counted_and_marked() {
        let a = solid(10, 10, [0, 0, 0, 255]);
        let mut b = a.clone();
        for y in 0..5 {
            for x in 0..10 {
                b.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let stats = diff_images(&a, &b);
        assert_eq!(stats.diff_pixels, 50);
        assert!((stats.diff_percent - 50.0).abs() < f64::EPSILON);
        let diff = stats.diff_image.unwrap();
        assert_eq!(*diff.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn size_mismatch_counts_outside_overlap() {
        let a = solid(10, 10, [0, 0, 0, 255]);
        let b = solid(10, 12, [0, 0, 0, 255]);
        let stats = diff_images(&a, &b);
        // two extra rows of 10 pixels
        assert_eq!(stats.diff_pixels, 20);
        assert_eq!(stats.total_pixels, 120);
    }

    #[test]
    fn masked_region_never_differs() {
        let a = solid(10, 10, [0, 0, 0, 255]);
        let mut b = a.clone();
        // a rotating banner in the top-left corner
        for y in 0..4 {
            for x in 0..4 {
                b.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        let mask = MaskRect {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let mut a2 = a.clone();
        let mut b2 = b.clone();
        apply_masks(&mut a2, &[mask]);
        apply_masks(&mut b2, &[mask]);
        assert_eq!(diff_images(&a2, &b2).diff_pixels, 0);
        // unmasked, the same images differ
        assert!(diff_images(&a, &b).diff_pixels > 0);
    }

    #[test]
    fn mask_clamped_to_image_bounds() {
        let mut img = solid(5, 5, [9, 9, 9, 255]);
        apply_masks(
            &mut img,
            &[MaskRect {
                x: 3,
                y: 3,
                width: 100,
                height: 100,
            }],
        );
        assert_eq!(*img.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn mask_near_u32_max_does_not_overflow() {
        let mut img = solid(5, 5, [9, 9, 9, 255]);
        apply_masks(
            &mut img,
            &[MaskRect {
                x: u32::MAX - 1,
                y: 0,
                width: u32::MAX,
                height: u32::MAX,
            }],
        );
        // fully off-image mask leaves every pixel alone
        assert_eq!(*img.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
        assert_eq!(*img.get_pixel(4, 4), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn baseline_paths_are_slugged_per_site_and_viewport() {
        let path = VisualCheck::baseline_path(Path::new("reports/baselines"), "blog", "mobile", "/about us");
        assert_eq!(
            path,
            Path::new("reports/baselines/blog/mobile-about-us.png")
        );
    }
}
