//! CTC decoding of recognizer output.

pub mod best_path;
pub mod prefix_tree;
pub mod word_beam_search;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

pub use best_path::best_path;
pub use prefix_tree::PrefixTree;
pub use word_beam_search::word_beam_search;

/// Which algorithm turns a CTC matrix into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoder {
    /// Most likely label per frame, repeats collapsed and blanks removed.
    #[default]
    BestPath,
    /// Beam search constrained by a dictionary prefix tree.
    WordBeamSearch,
}

/// Per-frame label probabilities `[T, C]`, the blank being label `C - 1`.
#[derive(Debug, Clone)]
pub struct CtcMatrix {
    probs: Array2<f32>,
}

impl CtcMatrix {
    /// Wraps a `[T, C]` matrix. Rows that are not a probability
    /// distribution (e.g. raw logits) are softmaxed.
    pub fn new(mut probs: Array2<f32>) -> Self {
        for mut row in probs.axis_iter_mut(Axis(0)) {
            let sum: f32 = row.iter().sum();
            let is_distribution =
                row.iter().all(|&p| (0.0..=1.0).contains(&p)) && (sum - 1.0).abs() < 1e-3;
            if !is_distribution {
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                row.mapv_inplace(|v| (v - max).exp());
                let total: f32 = row.iter().sum();
                if total > 0.0 {
                    row.mapv_inplace(|v| v / total);
                }
            }
        }
        Self { probs }
    }

    pub fn frames(&self) -> usize {
        self.probs.nrows()
    }

    /// Number of labels, blank included.
    pub fn labels(&self) -> usize {
        self.probs.ncols()
    }

    pub fn blank(&self) -> usize {
        self.labels().saturating_sub(1)
    }

    pub fn frame(&self, t: usize) -> ArrayView1<'_, f32> {
        self.probs.row(t)
    }

    pub fn prob(&self, t: usize, label: usize) -> f32 {
        self.probs[[t, label]]
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use ndarray::Array2;

    use super::CtcMatrix;

    /// Builds a matrix where each frame puts `peak` on one label and spreads
    /// the rest evenly; `None` means the blank.
    pub fn peaked_matrix(labels: usize, frames: &[Option<usize>], peak: f32) -> CtcMatrix {
        let blank = labels - 1;
        let rest = (1.0 - peak) / (labels - 1) as f32;
        let mut probs = Array2::from_elem((frames.len(), labels), rest);
        for (t, label) in frames.iter().enumerate() {
            probs[[t, label.unwrap_or(blank)]] = peak;
        }
        CtcMatrix::new(probs)
    }
}
