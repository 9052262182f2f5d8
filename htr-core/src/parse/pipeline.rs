use derive_builder::Builder;
use image::DynamicImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use tracing::*;

use crate::{
    analysis::lines::{LineClusteringConfig, sort_multiline},
    decode::{Decoder, PrefixTree},
    error::{HtrError, InvalidConfigSnafu},
    inference::{
        detector::{DetectorConfig, DetectorSession, WordDetector},
        model::{ModelPaths, session_builder},
        reader::{ReaderConfig, ReaderSession, WordReader, decode_text},
    },
    layout::{
        element::{ReadLine, ReadWord},
        page::PageResult,
    },
};

/// Every knob of one recognition run.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub line_clustering: LineClusteringConfig,
    pub reader: ReaderConfig,
    /// Size of the transcription drawn over visualizations.
    pub text_scale: f32,
    /// Log parameters and empty pages.
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            line_clustering: LineClusteringConfig::default(),
            reader: ReaderConfig::default(),
            text_scale: 1.0,
            debug: false,
        }
    }
}

impl PipelineConfig {
    pub const SCALE_RANGE: (f32, f32) = (0.01, 15.0);
    pub const MAX_MARGIN: u32 = 20;
    pub const MIN_WORDS_RANGE: (usize, usize) = (1, 10);
    pub const TEXT_SCALE_RANGE: (f32, f32) = (0.5, 2.0);

    /// Switches between dictionary constrained decoding and best path.
    pub fn use_dictionary(&mut self, enabled: bool) {
        self.reader.decoder = if enabled {
            Decoder::WordBeamSearch
        } else {
            Decoder::BestPath
        };
    }

    /// Falls back to best path when word beam search has no dictionary.
    /// Returns whether the decoder was changed.
    pub fn resolve_decoder(&mut self, dictionary_loaded: bool) -> bool {
        let fallback = self.reader.decoder == Decoder::WordBeamSearch && !dictionary_loaded;
        if fallback {
            self.reader.decoder = Decoder::BestPath;
        }
        fallback
    }

    /// One line with the parameters shown in debug mode.
    pub fn debug_summary(&self) -> String {
        format!(
            "scale: {}, margin: {}, dictionary: {}",
            self.detector.scale,
            self.detector.margin,
            self.reader.decoder == Decoder::WordBeamSearch
        )
    }

    /// Checks the user facing parameters against the ranges the demos offer.
    pub fn validate(&self) -> Result<(), HtrError> {
        let (lo, hi) = Self::SCALE_RANGE;
        let scale = self.detector.scale;
        ensure!(
            scale.is_finite() && (lo..=hi).contains(&scale),
            InvalidConfigSnafu {
                field: "scale",
                message: format!("{scale} is outside {lo}..={hi}"),
            }
        );

        let margin = self.detector.margin;
        ensure!(
            margin <= Self::MAX_MARGIN,
            InvalidConfigSnafu {
                field: "margin",
                message: format!("{margin} is larger than {}", Self::MAX_MARGIN),
            }
        );

        let (lo, hi) = Self::MIN_WORDS_RANGE;
        let min_words = self.line_clustering.min_words_per_line;
        ensure!(
            (lo..=hi).contains(&min_words),
            InvalidConfigSnafu {
                field: "min_words_per_line",
                message: format!("{min_words} is outside {lo}..={hi}"),
            }
        );

        let (lo, hi) = Self::TEXT_SCALE_RANGE;
        let text_scale = self.text_scale;
        ensure!(
            text_scale.is_finite() && (lo..=hi).contains(&text_scale),
            InvalidConfigSnafu {
                field: "text_scale",
                message: format!("{text_scale} is outside {lo}..={hi}"),
            }
        );

        Ok(())
    }
}

/// Detector, reader and dictionary, ready to read pages.
pub struct HtrPipeline {
    detector: DetectorSession<WordDetector>,
    reader: ReaderSession<WordReader>,
    prefix_tree: Option<PrefixTree>,
}

impl HtrPipeline {
    #[tracing::instrument(skip_all, fields(dir = %paths.dir.display()))]
    pub fn new(paths: &ModelPaths) -> Result<Self, HtrError> {
        info!("Initializing word detector and reader sessions.");
        let detector = DetectorSession::new(session_builder()?, WordDetector::new(paths.detector()))?;
        let reader = ReaderSession::new(
            session_builder()?,
            WordReader::new(paths.reader(), paths.chars()),
        )?;

        Ok(Self {
            detector,
            reader,
            prefix_tree: None,
        })
    }

    pub fn with_prefix_tree(mut self, tree: PrefixTree) -> Self {
        self.prefix_tree = Some(tree);
        self
    }

    pub fn set_prefix_tree(&mut self, tree: Option<PrefixTree>) {
        self.prefix_tree = tree;
    }

    pub fn prefix_tree(&self) -> Option<&PrefixTree> {
        self.prefix_tree.as_ref()
    }

    /// Detects, groups and reads the words of one page.
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn read_page(
        &mut self,
        image: &DynamicImage,
        config: &PipelineConfig,
    ) -> Result<Vec<ReadLine>, HtrError> {
        let mut config = *config;
        if config.resolve_decoder(self.prefix_tree.is_some()) {
            warn!("no dictionary loaded, decoding with best path");
        }
        if config.debug {
            info!("{}", config.debug_summary());
        }

        self.detector.set_config(config.detector);
        self.reader.set_config(config.reader);

        let detections = self.detector.detect(image)?;
        let lines = sort_multiline(detections, &config.line_clustering);

        // inference stays sequential, the session is not shared
        let mut matrices = Vec::with_capacity(lines.len());
        for line in &lines {
            let mut line_matrices = Vec::with_capacity(line.len());
            for word in line {
                line_matrices.push((self.reader.ctc_matrix(&word.crop)?, word.bbox));
            }
            matrices.push(line_matrices);
        }

        let chars = self.reader.chars();
        let tree = self.prefix_tree.as_ref();
        let reader_config = config.reader;

        let lines = matrices
            .par_iter()
            .map(|line| ReadLine {
                words: line
                    .par_iter()
                    .map(|(mat, bbox)| ReadWord {
                        text: decode_text(mat, chars, &reader_config, tree),
                        bbox: *bbox,
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        if lines.is_empty() && config.debug {
            warn!("no text detected");
        }
        debug!(
            "read {} lines, {} words",
            lines.len(),
            lines.iter().map(ReadLine::len).sum::<usize>()
        );

        Ok(lines)
    }

    /// Reads every page; page numbers start at 1.
    pub fn process_pages(
        &mut self,
        pages: &[DynamicImage],
        config: &PipelineConfig,
    ) -> Result<Vec<PageResult>, HtrError> {
        let mut results = Vec::with_capacity(pages.len());
        if config.debug {
            info!("Processing {} pages", pages.len());
        }
        for (idx, page) in pages.iter().enumerate() {
            info!("processing page {}/{}", idx + 1, pages.len());
            let lines = self.read_page(page, config)?;
            if config.debug {
                info!("Page {} completed", idx + 1);
            }
            results.push(PageResult::new(idx + 1, lines, (page.width(), page.height())));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reader.decoder, Decoder::BestPath);
        assert_eq!(config.text_scale, 1.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = PipelineConfig::default();
        config.detector.scale = 20.0;
        assert!(matches!(
            config.validate(),
            Err(HtrError::InvalidConfig { field, .. }) if field == "scale"
        ));

        let mut config = PipelineConfig::default();
        config.detector.margin = 21;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.line_clustering.min_words_per_line = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.text_scale = 2.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.detector.scale = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_use_dictionary_switches_decoder() {
        let mut config = PipelineConfigBuilder::default().debug(true).build().unwrap();
        config.use_dictionary(true);
        assert_eq!(config.reader.decoder, Decoder::WordBeamSearch);
        config.use_dictionary(false);
        assert_eq!(config.reader.decoder, Decoder::BestPath);
    }

    #[test]
    fn test_resolve_decoder_without_dictionary() {
        let mut config = PipelineConfig::default();
        config.use_dictionary(true);
        assert!(!config.resolve_decoder(true));
        assert_eq!(config.reader.decoder, Decoder::WordBeamSearch);

        assert!(config.resolve_decoder(false));
        assert_eq!(config.reader.decoder, Decoder::BestPath);
        // best path never changes
        assert!(!config.resolve_decoder(false));
    }

    #[test]
    fn test_debug_summary() {
        let mut config = PipelineConfig::default();
        config.detector.scale = 0.4;
        config.detector.margin = 5;
        assert_eq!(config.debug_summary(), "scale: 0.4, margin: 5, dictionary: false");

        config.use_dictionary(true);
        assert!(config.debug_summary().ends_with("dictionary: true"));
    }

    #[test]
    fn test_config_from_partial_json() -> Result<(), serde_json::Error> {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"detector": {"scale": 0.4, "margin": 5}, "debug": true}"#)?;
        assert_eq!(config.detector.scale, 0.4);
        assert_eq!(config.detector.margin, 5);
        assert_eq!(config.detector.cluster_min_samples, 3);
        assert_eq!(config.line_clustering.min_words_per_line, 2);
        assert!(config.debug);
        Ok(())
    }
}
