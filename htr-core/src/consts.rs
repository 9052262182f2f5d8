/// Environment variable naming the directory that holds `detector.onnx`,
/// `reader.onnx` and, optionally, `chars.txt`.
pub const MODEL_DIR_ENV_NAME: &str = "HTR_MODEL_DIR";

/// Model directory used when [`MODEL_DIR_ENV_NAME`] is unset.
pub const DEFAULT_MODEL_DIR: &str = "models";

pub const DETECTOR_MODEL_FILE: &str = "detector.onnx";
pub const READER_MODEL_FILE: &str = "reader.onnx";
pub const CHARS_FILE: &str = "chars.txt";

/// Metadata key the reader model may carry its character set under.
pub const CHARS_METADATA_KEY: &str = "chars";

/// Environment variable pointing at a TrueType font used for text overlays.
pub const FONT_PATH_ENV_NAME: &str = "HTR_FONT_PATH";

/// Environment variable pointing at the directory with the PDFium shared library.
pub const PDFIUM_LIB_PATH_ENV_NAME: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Directories probed for PDFium when the environment variable is not set.
pub const PDFIUM_CANDIDATE_DIRS: &[&str] = &["lib", "../lib", "/usr/local/lib", "/usr/lib"];

pub const PDFIUM_INSTALL_HINT: &str = "https://github.com/bblanchon/pdfium-binaries/releases";

/// Rendering resolution for PDF pages.
pub const DEFAULT_DPI: u16 = 200;

/// PDF user space unit, points per inch.
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Detector input dimensions must be a multiple of this value.
pub const DETECTOR_INPUT_ALIGN: u32 = 32;

/// Ratio between detector input size and its output map size.
pub const DETECTOR_MAP_DOWNSCALE: f32 = 2.0;

/// Output channels of the detector: three segmentation classes, four edge distances.
pub const DETECTOR_SEG_CHANNELS: usize = 3;
pub const DETECTOR_GEO_CHANNELS: usize = 4;

/// Pixel value used to pad model inputs (white paper).
pub const PAD_PIXEL: u8 = 255;

/// Word boxes are drawn with this color in visualizations.
pub const BOX_COLOR: [u8; 3] = [255, 0, 0];

/// Font pixel height at `text_scale == 1.0`.
pub const BASE_FONT_PX: f32 = 24.0;

/// Default sample configuration and dictionary locations.
pub const SAMPLE_CONFIG_FILE: &str = "config.json";
pub const WORD_LIST_FILE: &str = "words_alpha.txt";
