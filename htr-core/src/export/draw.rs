use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use snafu::ResultExt;
use tracing::*;

use crate::{consts::*, error::*, layout::element::ReadLine};

const BOX_THICKNESS: i32 = 2;
const TEXT_GAP: f32 = 5.0;

/// Draws word boxes and their transcriptions over a page.
pub struct Visualizer {
    font: Option<FontVec>,
}

impl Visualizer {
    pub fn new(font: Option<FontVec>) -> Self {
        if font.is_none() {
            info!("no font configured, visualizations show boxes only");
        }
        Self { font }
    }

    pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self, HtrError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        let font = FontVec::try_from_vec(bytes).context(FontSnafu {})?;
        Ok(Self::new(Some(font)))
    }

    /// Uses the font named by `HTR_FONT_PATH`; without it only boxes are drawn.
    pub fn from_env() -> Result<Self, HtrError> {
        match std::env::var(FONT_PATH_ENV_NAME) {
            Ok(path) => Self::from_font_file(path),
            Err(_) => Ok(Self::new(None)),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&self, image: &DynamicImage, lines: &[ReadLine], text_scale: f32) -> RgbImage {
        let mut canvas = image.to_rgb8();
        let color = Rgb(BOX_COLOR);
        let px = BASE_FONT_PX * text_scale;

        for word in lines.iter().flat_map(|line| &line.words) {
            let (x, y, width, height) = word.bbox.to_pixel_rect();
            if width == 0 || height == 0 {
                continue;
            }

            for offset in 0..BOX_THICKNESS {
                let rect = Rect::at(x as i32 - offset, y as i32 - offset).of_size(
                    width + (offset * 2) as u32,
                    height + (offset * 2) as u32,
                );
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            if let Some(font) = &self.font {
                let text_y = (word.bbox.min.y - TEXT_GAP - px).max(0.0) as i32;
                draw_text_mut(
                    &mut canvas,
                    color,
                    x as i32,
                    text_y,
                    PxScale::from(px),
                    font,
                    &word.text,
                );
            }
        }

        canvas
    }

    pub fn save<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<(), HtrError> {
        let path = path.as_ref();
        image.save(path).context(ImageWriteSnafu {
            path: path.to_string_lossy(),
        })
    }
}

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, HtrError> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .context(ImageWriteSnafu { path: "<memory>" })?;
    Ok(bytes.into_inner())
}
