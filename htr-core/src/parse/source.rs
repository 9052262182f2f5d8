use std::path::Path;

use image::DynamicImage;
use snafu::{ResultExt, ensure};
use tracing::*;

use crate::{consts::*, error::*, parse::render::PdfRasterizer};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
}

impl InputKind {
    /// Classifies a path by its extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, HtrError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            ext if IMAGE_EXTENSIONS.contains(&ext) => Ok(Self::Image),
            _ => UnsupportedInputSnafu {
                path: path.to_string_lossy(),
                message: format!(
                    "expected a PDF or one of {}",
                    IMAGE_EXTENSIONS.join(", ")
                ),
            }
            .fail(),
        }
    }
}

/// Loads the grayscale pages of an image or PDF file.
///
/// PDFs are rendered with `rasterizer`, or with a rasterizer bound on demand
/// at the default resolution.
pub fn load_pages(
    path: &Path,
    rasterizer: Option<&PdfRasterizer>,
) -> Result<Vec<DynamicImage>, HtrError> {
    ensure!(
        path.exists(),
        FileNotFoundSnafu {
            path: path.to_string_lossy()
        }
    );

    match InputKind::from_path(path)? {
        InputKind::Image => {
            let image = image::open(path).context(ImageReadSnafu {
                path: path.to_string_lossy(),
            })?;
            debug!("loaded image {} ({}x{})", path.display(), image.width(), image.height());
            Ok(vec![DynamicImage::ImageLuma8(image.to_luma8())])
        }
        InputKind::Pdf => match rasterizer {
            Some(rasterizer) => rasterizer.rasterize_file(path, None),
            None => PdfRasterizer::new(DEFAULT_DPI)?.rasterize_file(path, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_input_kind_from_extension() {
        assert_eq!(InputKind::from_path(Path::new("a/b.pdf")).unwrap(), InputKind::Pdf);
        assert_eq!(InputKind::from_path(Path::new("scan.PNG")).unwrap(), InputKind::Image);
        assert_eq!(InputKind::from_path(Path::new("x.tiff")).unwrap(), InputKind::Image);
        assert!(matches!(
            InputKind::from_path(Path::new("notes.txt")),
            Err(HtrError::UnsupportedInput { .. })
        ));
        assert!(InputKind::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_load_pages_image_is_grayscale() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.png");
        RgbImage::from_pixel(8, 6, Rgb([255, 0, 0])).save(&path)?;

        let pages = load_pages(&path, None)?;
        assert_eq!(pages.len(), 1);
        assert!(matches!(pages[0], DynamicImage::ImageLuma8(_)));
        assert_eq!((pages[0].width(), pages[0].height()), (8, 6));
        Ok(())
    }

    #[test]
    fn test_load_pages_missing_file() {
        assert!(matches!(
            load_pages(Path::new("/no/such/page.png"), None),
            Err(HtrError::FileNotFound { .. })
        ));
    }
}
