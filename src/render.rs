//! Bounding-box overlay for vehicle labels.
//!
//! Boxes arrive as fractions of the image size and are scaled to pixels
//! without clamping. Anything that lands outside the canvas is clipped by the
//! drawing primitives, not by the geometry.

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use std::path::{Path, PathBuf};

use crate::config::RenderSettings;
use crate::labels::{BoundingBox, Label};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTPUT_PREFIX: &str = "output_";

/// DejaVu Sans, used when the configured font cannot be loaded.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// A bounding box in pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Closed outline, clockwise from the top-left corner back to it.
    pub fn outline(&self) -> [(f32, f32); 5] {
        [
            (self.left, self.top),
            (self.right(), self.top),
            (self.right(), self.bottom()),
            (self.left, self.bottom()),
            (self.left, self.top),
        ]
    }
}

impl BoundingBox {
    /// Scales the fractional box to an image of `width` x `height` pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelBox {
        let (w, h) = (width as f32, height as f32);
        PixelBox {
            left: w * self.left,
            top: h * self.top,
            width: w * self.width,
            height: h * self.height,
        }
    }
}

/// Caption drawn above each box, e.g. `Car (98.76%)`.
pub fn caption(name: &str, confidence: f64) -> String {
    format!("{} ({:.2}%)", name, confidence)
}

/// File name of the annotated copy of `photo`.
pub fn output_file_name(photo: &Path) -> String {
    let base = photo
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}", OUTPUT_PREFIX, base)
}

pub struct Renderer {
    font: FontVec,
    scale: PxScale,
}

impl Renderer {
    /// Loads the configured font, or the bundled one when it is missing or
    /// unreadable.
    pub fn new(settings: &RenderSettings) -> Result<Self> {
        let font = match load_font(&settings.font_path) {
            Ok(font) => font,
            Err(e) => {
                log::warn!(
                    "font {} not available ({:#}), using bundled DejaVu Sans",
                    settings.font_path.display(),
                    e
                );
                bundled_font()?
            }
        };
        Ok(Self {
            font,
            scale: PxScale::from(settings.font_size),
        })
    }

    /// Draws every vehicle instance onto `image`. Returns the number of
    /// boxes drawn.
    pub fn draw(&self, image: &mut RgbImage, labels: &[Label]) -> usize {
        let (width, height) = image.dimensions();
        let mut drawn = 0;
        for label in labels.iter().filter(|l| l.vehicle_type().is_some()) {
            let text = caption(&label.name, label.confidence);
            for instance in &label.instances {
                let pixel_box = instance.bounding_box.to_pixels(width, height);
                let outline = pixel_box.outline();
                for segment in outline.windows(2) {
                    draw_line_segment_mut(image, segment[0], segment[1], BOX_COLOR);
                }
                let x = pixel_box.left as i32;
                let y = (pixel_box.top - self.scale.y) as i32;
                draw_text_mut(image, BOX_COLOR, x, y, self.scale, &self.font, &text);
                drawn += 1;
            }
        }
        drawn
    }

    /// Writes an annotated copy of `photo` into `output_dir` and returns its
    /// path. The directory is created when missing.
    pub fn annotate_file(
        &self,
        photo: &Path,
        labels: &[Label],
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let mut image = image::open(photo)
            .with_context(|| format!("open image {}", photo.display()))?
            .into_rgb8();
        let drawn = self.draw(&mut image, labels);

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create output dir {}", output_dir.display()))?;
        let out_path = output_dir.join(output_file_name(photo));
        image
            .save(&out_path)
            .with_context(|| format!("save annotated image {}", out_path.display()))?;
        log::info!("Image saved: {} ({} boxes)", out_path.display(), drawn);
        Ok(out_path)
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read font file {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parse font {}", path.display()))
}

fn bundled_font() -> Result<FontVec> {
    FontVec::try_from_vec(BUNDLED_FONT.to_vec()).context("parse bundled font")
}
