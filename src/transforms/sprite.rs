//! Sprite sheet generation.
//!
//! Packs every icon of a batch into one sheet with a shelf packer, writes an
//! optional high density (`@2x`) sheet, and emits a stylesheet fragment with
//! one class per icon.

use crate::build::step::{Asset, CompileError, Diagnostics, Transform};
use crate::config::SpriteConfig;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Stem suffix marking a high density icon.
pub const RETINA_SUFFIX: &str = "@2x";

/// Media query selecting high density screens.
const RETINA_MEDIA: &str = "(-webkit-min-device-pixel-ratio: 2), (min-resolution: 192dpi)";

/// Transparent color for sheet background
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An icon's position within the packed sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Result of packing: sheet size plus one placement per icon, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetLayout {
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
}

/// A shelf in the shelf packing algorithm
#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    width_used: u32,
}

/// Pack icons given as `(name, width, height)`.
///
/// Icons are sorted by height (tallest first) and placed left to right into
/// horizontal shelves no wider than a roughly square sheet. `padding` pixels
/// separate neighbours; sheet edges carry no padding.
pub fn pack(icons: &[(String, u32, u32)], padding: u32) -> SheetLayout {
    if icons.is_empty() {
        return SheetLayout::default();
    }

    let widest = icons.iter().map(|(_, w, _)| *w).max().unwrap_or(0);
    let area: u64 = icons
        .iter()
        .map(|(_, w, h)| u64::from(w + padding) * u64::from(h + padding))
        .sum();
    let row_limit = widest.max((area as f64).sqrt().ceil() as u32) + padding;

    let mut sorted: Vec<&(String, u32, u32)> = icons.iter().collect();
    sorted.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    let mut shelves: Vec<Shelf> = vec![];
    let mut placements = Vec::with_capacity(icons.len());

    for (name, w, h) in sorted {
        let (x, y) = place_in_shelves(&mut shelves, w + padding, h + padding, row_limit);
        placements.push(Placement { name: name.clone(), x, y, w: *w, h: *h });
    }

    let max_width = shelves.iter().map(|s| s.width_used).max().unwrap_or(0);
    let total_height = shelves.last().map(|s| s.y + s.height).unwrap_or(0);

    placements.sort_by(|a, b| a.name.cmp(&b.name));
    SheetLayout {
        width: max_width.saturating_sub(padding).max(1),
        height: total_height.saturating_sub(padding).max(1),
        placements,
    }
}

/// Place a padded box in an existing shelf, or open a new one below.
fn place_in_shelves(shelves: &mut Vec<Shelf>, padded_w: u32, padded_h: u32, row_limit: u32) -> (u32, u32) {
    for shelf in shelves.iter_mut() {
        if padded_h <= shelf.height && shelf.width_used + padded_w <= row_limit {
            let x = shelf.width_used;
            shelf.width_used += padded_w;
            return (x, shelf.y);
        }
    }

    let y = shelves.last().map(|s| s.y + s.height).unwrap_or(0);
    shelves.push(Shelf { y, height: padded_h, width_used: padded_w });
    (0, y)
}

/// Copy an icon into the sheet at the given position, clipping at the edges.
fn blit(sheet: &mut RgbaImage, icon: &RgbaImage, x: u32, y: u32) {
    for sy in 0..icon.height() {
        for sx in 0..icon.width() {
            if x + sx < sheet.width() && y + sy < sheet.height() {
                sheet.put_pixel(x + sx, y + sy, *icon.get_pixel(sx, sy));
            }
        }
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut png_data = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_data).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(png_data)
}

fn offset(v: u32) -> String {
    if v == 0 {
        "0".to_string()
    } else {
        format!("-{}px", v)
    }
}

/// Generates `sprite.png`, `sprite@2x.png` and the stylesheet fragment.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    config: SpriteConfig,
    /// Directory the stylesheet fragment is written to
    fragment_root: PathBuf,
}

impl SpriteSheet {
    pub fn new(config: SpriteConfig, fragment_root: impl Into<PathBuf>) -> Self {
        Self { config, fragment_root: fragment_root.into() }
    }

    /// Render the stylesheet fragment for a packed layout.
    pub fn stylesheet(&self, layout: &SheetLayout, retina: bool) -> String {
        let prefix = &self.config.class_prefix;
        let mut css = String::new();

        for p in &layout.placements {
            let _ = writeln!(css, ".{}{} {{", prefix, p.name);
            let _ = writeln!(css, "  background-image: url({});", self.config.img_path);
            let _ = writeln!(css, "  background-position: {} {};", offset(p.x), offset(p.y));
            let _ = writeln!(css, "  width: {}px;", p.w);
            let _ = writeln!(css, "  height: {}px;", p.h);
            css.push_str("}\n\n");
        }

        if retina && !layout.placements.is_empty() {
            let selectors: Vec<String> =
                layout.placements.iter().map(|p| format!(".{}{}", prefix, p.name)).collect();
            let _ = writeln!(css, "@media {} {{", RETINA_MEDIA);
            let _ = writeln!(css, "  {} {{", selectors.join(",\n  "));
            let _ = writeln!(css, "    background-image: url({});", self.config.retina_img_path);
            let _ = writeln!(css, "    background-size: {}px {}px;", layout.width, layout.height);
            css.push_str("  }\n}\n");
        }

        css
    }
}

impl Transform for SpriteSheet {
    fn name(&self) -> &'static str {
        "sprite-sheet"
    }

    fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset> {
        let mut base: BTreeMap<String, RgbaImage> = BTreeMap::new();
        let mut retina: BTreeMap<String, (RgbaImage, PathBuf)> = BTreeMap::new();

        for asset in &assets {
            let Some(stem) = asset.relative.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let icon = match image::load_from_memory(&asset.contents) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    diagnostics.error(CompileError::new(asset.display_path(), e.to_string()));
                    continue;
                }
            };
            match stem.strip_suffix(RETINA_SUFFIX) {
                Some(name) => {
                    retina.insert(name.to_string(), (icon, asset.display_path().to_path_buf()));
                }
                None => {
                    base.insert(stem.to_string(), icon);
                }
            }
        }

        // A high density icon needs a base icon to take its coordinates from
        retina.retain(|name, (_, path)| {
            let known = base.contains_key(name);
            if !known {
                diagnostics.error(CompileError::new(
                    path.clone(),
                    format!("no base icon '{}' for high density variant", name),
                ));
            }
            known
        });

        if base.is_empty() {
            log::debug!("No sprite icons, skipping sheet generation");
            return vec![];
        }

        let icons: Vec<(String, u32, u32)> =
            base.iter().map(|(name, img)| (name.clone(), img.width(), img.height())).collect();
        let layout = pack(&icons, self.config.padding);

        let mut sheet = RgbaImage::from_pixel(layout.width, layout.height, TRANSPARENT);
        for p in &layout.placements {
            if let Some(icon) = base.get(&p.name) {
                blit(&mut sheet, icon, p.x, p.y);
            }
        }

        let mut out = Vec::with_capacity(3);
        match encode_png(&sheet) {
            Ok(png) => out.push(Asset::generated(&self.config.img_name, png)),
            Err(e) => {
                diagnostics.error(CompileError::new(&self.config.img_name, e.to_string()));
                return vec![];
            }
        }

        let has_retina = !retina.is_empty();
        if has_retina {
            let mut sheet2x = RgbaImage::from_pixel(layout.width * 2, layout.height * 2, TRANSPARENT);
            for p in &layout.placements {
                match retina.get(&p.name) {
                    Some((icon, path)) => {
                        if icon.width() != p.w * 2 || icon.height() != p.h * 2 {
                            diagnostics.warn(format!(
                                "{}: expected {}x{} for high density icon, got {}x{}",
                                path.display(),
                                p.w * 2,
                                p.h * 2,
                                icon.width(),
                                icon.height()
                            ));
                        }
                        blit(&mut sheet2x, icon, p.x * 2, p.y * 2);
                    }
                    None => diagnostics.warn(format!("Icon '{}' has no {} variant", p.name, RETINA_SUFFIX)),
                }
            }
            match encode_png(&sheet2x) {
                Ok(png) => out.push(Asset::generated(&self.config.retina_img_name, png)),
                Err(e) => diagnostics.error(CompileError::new(&self.config.retina_img_name, e.to_string())),
            }
        }

        let css = self.stylesheet(&layout, has_retina);
        out.push(Asset::generated(&self.config.css_name, css.into_bytes()).with_root(&self.fragment_root));

        log::debug!(
            "Packed {} icons into {}x{}{}",
            layout.placements.len(),
            layout.width,
            layout.height,
            if has_retina { " (+@2x)" } else { "" }
        );
        out
    }
}
