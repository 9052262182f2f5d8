use std::path::{Path, PathBuf};

use derive_builder::Builder;
use ndarray::{ArrayBase, Dim, OwnedRepr};
use serde::{Deserialize, Serialize};

use crate::inference::model::Model;

pub type DetectorInput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>>;
pub type DetectorOutput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>>;

/// Configuration of the word detector.
///
/// `scale` and `margin` are the knobs exposed to users; the remaining
/// fields tune how the pixel-wise predictions are merged into word boxes.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct DetectorConfig {
    /// Resize factor applied to the page before detection.
    ///
    /// Small handwriting needs a larger factor, large and sparse handwriting a
    /// smaller one. The model was trained on text about 30 pixels high.
    pub scale: f32,

    /// Pixels added on every side of each detected word.
    pub margin: u32,

    /// Minimum word-class probability for a map pixel to vote for a box.
    pub seg_threshold: f32,

    /// DBSCAN radius on `1 - IoU` between box votes.
    pub cluster_eps: f32,

    /// Minimum number of votes forming a word.
    pub cluster_min_samples: usize,

    /// Upper bound on votes passed to clustering; denser maps are subsampled.
    pub max_votes: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            margin: 0,
            seg_threshold: 0.5,
            cluster_eps: 0.7,
            cluster_min_samples: 3,
            max_votes: 4096,
        }
    }
}

pub struct WordDetector {
    path: PathBuf,
    config: DetectorConfig,
}

impl WordDetector {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_config(path, DetectorConfig::default())
    }

    pub fn with_config<P: Into<PathBuf>>(path: P, config: DetectorConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn set_config(&mut self, config: DetectorConfig) {
        self.config = config;
    }
}

impl Model for WordDetector {
    type Input = DetectorInput;

    type Output = DetectorOutput;

    type Config = DetectorConfig;

    const INPUT_NAME: &'static str = "input";

    const OUTPUT_NAME: &'static str = "output";

    const MODEL_NAME: &'static str = "word-detector";

    fn path(&self) -> &Path {
        &self.path
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
