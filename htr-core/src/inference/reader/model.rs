use std::path::{Path, PathBuf};

use derive_builder::Builder;
use ndarray::{ArrayBase, Dim, OwnedRepr};
use serde::{Deserialize, Serialize};

use crate::{decode::Decoder, inference::model::Model};

pub type ReaderInput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>>;
pub type ReaderOutput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 3]>>;

/// Configuration of the word reader.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct ReaderConfig {
    /// How the CTC output is turned into text.
    pub decoder: Decoder,

    /// Beams kept per frame by word beam search.
    pub beam_width: usize,

    /// Height every word crop is resized to. The model was trained on 32.
    pub input_height: u32,

    /// Narrow crops are padded with white up to this width.
    pub min_input_width: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            decoder: Decoder::BestPath,
            beam_width: 25,
            input_height: 32,
            min_input_width: 16,
        }
    }
}

pub struct WordReader {
    path: PathBuf,
    chars_path: PathBuf,
    config: ReaderConfig,
}

impl WordReader {
    /// `chars_path` is only read when the model carries no character set
    /// in its metadata.
    pub fn new<P: Into<PathBuf>, C: Into<PathBuf>>(path: P, chars_path: C) -> Self {
        Self {
            path: path.into(),
            chars_path: chars_path.into(),
            config: ReaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_config(&mut self, config: ReaderConfig) {
        self.config = config;
    }

    pub fn chars_path(&self) -> &Path {
        &self.chars_path
    }
}

impl Model for WordReader {
    type Input = ReaderInput;

    type Output = ReaderOutput;

    type Config = ReaderConfig;

    const INPUT_NAME: &'static str = "input";

    const OUTPUT_NAME: &'static str = "output";

    const MODEL_NAME: &'static str = "word-reader";

    fn path(&self) -> &Path {
        &self.path
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
