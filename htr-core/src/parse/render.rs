use std::path::{Path, PathBuf};

use image::DynamicImage;
use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium};
use snafu::{ResultExt, ensure};
use tracing::*;

use crate::{consts::*, error::*};

/// Renders PDF pages to grayscale images through PDFium.
pub struct PdfRasterizer {
    pdfium: Pdfium,
    dpi: u16,
}

impl PdfRasterizer {
    /// Binds PDFium from `PDFIUM_DYNAMIC_LIB_PATH`, the usual library
    /// directories or the system library, in that order.
    #[tracing::instrument]
    pub fn new(dpi: u16) -> Result<Self, HtrError> {
        let env_dir = std::env::var(PDFIUM_LIB_PATH_ENV_NAME).ok();

        for dir in library_dirs(env_dir.as_deref()) {
            let library = Pdfium::pdfium_platform_library_name_at_path(&dir);
            if !library.exists() {
                trace!("no pdfium at {}", library.display());
                continue;
            }

            match Pdfium::bind_to_library(&library) {
                Ok(bindings) => {
                    info!("bound pdfium from {}", library.display());
                    return Ok(Self {
                        pdfium: Pdfium::new(bindings),
                        dpi,
                    });
                }
                Err(err) => warn!("failed to bind pdfium at {}: {err}", library.display()),
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|err| {
            debug!("system pdfium unavailable: {err}");
            HtrError::PdfiumNotFound {
                env_name: PDFIUM_LIB_PATH_ENV_NAME.to_string(),
                hint: PDFIUM_INSTALL_HINT.to_string(),
            }
        })?;
        info!("bound system pdfium");

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            dpi,
        })
    }

    pub fn dpi(&self) -> u16 {
        self.dpi
    }

    /// Renders every page of a PDF file, optionally saving them as
    /// `page_001.png`, `page_002.png`, ... in `output_dir`.
    pub fn rasterize_file<P: AsRef<Path>>(
        &self,
        path: P,
        output_dir: Option<&Path>,
    ) -> Result<Vec<DynamicImage>, HtrError> {
        let path = path.as_ref();
        ensure!(
            path.exists(),
            FileNotFoundSnafu {
                path: path.to_string_lossy()
            }
        );

        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .context(PdfiumSnafu {
                stage: "load-pdf-by-path",
            })?;
        let pages = self.render(&document)?;

        if let Some(dir) = output_dir {
            save_pages(&pages, dir)?;
        }

        Ok(pages)
    }

    /// Renders every page of an in-memory PDF.
    pub fn rasterize_bytes(&self, bytes: &[u8]) -> Result<Vec<DynamicImage>, HtrError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .context(PdfiumSnafu {
                stage: "load-pdf-by-bytes",
            })?;

        self.render(&document)
    }

    fn render(&self, document: &PdfDocument<'_>) -> Result<Vec<DynamicImage>, HtrError> {
        let scale = self.dpi as f32 / PDF_POINTS_PER_INCH;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let page_count = document.pages().len();
        info!("rendering {page_count} pages at {} dpi", self.dpi);

        document
            .pages()
            .iter()
            .enumerate()
            .map(|(idx, page)| {
                debug!("render page {}/{page_count}", idx + 1);
                page.render_with_config(&render_config)
                    .map(|bitmap| DynamicImage::ImageLuma8(bitmap.as_image().to_luma8()))
                    .context(PdfiumSnafu {
                        stage: "render-page",
                    })
            })
            .collect()
    }
}

/// Directories searched for the PDFium shared library.
pub fn library_dirs(env_dir: Option<&str>) -> Vec<PathBuf> {
    env_dir
        .into_iter()
        .chain(PDFIUM_CANDIDATE_DIRS.iter().copied())
        .map(PathBuf::from)
        .collect()
}

/// Writes pages as `page_{n:03}.png`, numbering from 1.
pub fn save_pages(pages: &[DynamicImage], dir: &Path) -> Result<Vec<PathBuf>, HtrError> {
    std::fs::create_dir_all(dir).context(IoWriteSnafu {
        path: dir.to_string_lossy(),
    })?;

    pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let path = dir.join(format!("page_{:03}.png", idx + 1));
            page.save(&path).context(ImageWriteSnafu {
                path: path.to_string_lossy(),
            })?;
            debug!("saved {}", path.display());
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_library_dirs_order() {
        let dirs = library_dirs(Some("/opt/pdfium"));
        assert_eq!(dirs[0], PathBuf::from("/opt/pdfium"));
        assert_eq!(dirs[1], PathBuf::from("lib"));
        assert_eq!(dirs.len(), PDFIUM_CANDIDATE_DIRS.len() + 1);

        assert_eq!(library_dirs(None).len(), PDFIUM_CANDIDATE_DIRS.len());
    }

    #[test]
    fn test_save_pages() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let pages = vec![
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0]))),
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255]))),
        ];

        let out = dir.path().join("pages");
        let paths = save_pages(&pages, &out)?;
        assert_eq!(paths.len(), 2);
        assert!(out.join("page_001.png").exists());
        assert!(out.join("page_002.png").exists());

        let reloaded = image::open(&paths[1])?.to_luma8();
        assert_eq!(reloaded.get_pixel(0, 0).0[0], 255);
        Ok(())
    }
}
