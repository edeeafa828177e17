//! Lossless PNG optimization.

use crate::build::step::{Asset, Diagnostics, Transform};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};

/// Re-encode a PNG with maximum compression.
///
/// Returns `None` when the input is not an 8-bit PNG, cannot be decoded, or
/// the re-encoded file would not be smaller.
pub fn optimize_png(data: &[u8]) -> Option<Vec<u8>> {
    if image::guess_format(data).ok()? != ImageFormat::Png {
        return None;
    }

    let img = image::load_from_memory_with_format(data, ImageFormat::Png).ok()?;
    let color = img.color();
    if !matches!(color, ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8) {
        return None;
    }

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_bytes(), img.width(), img.height(), color)
        .ok()?;

    (out.len() < data.len()).then_some(out)
}

/// Optimizes PNG images in the batch; every other asset passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeImages;

impl Transform for OptimizeImages {
    fn name(&self) -> &'static str {
        "optimize-images"
    }

    fn apply(&self, mut assets: Vec<Asset>, _diagnostics: &mut Diagnostics) -> Vec<Asset> {
        for asset in &mut assets {
            let is_png = asset
                .relative
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if !is_png {
                continue;
            }
            match optimize_png(&asset.contents) {
                Some(smaller) => {
                    log::debug!(
                        "Optimized {} ({} -> {} bytes)",
                        asset.relative.display(),
                        asset.contents.len(),
                        smaller.len()
                    );
                    asset.contents = smaller;
                }
                None => log::trace!("{} left as is", asset.relative.display()),
            }
        }
        assets
    }
}
