use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    analysis::cluster::{dbscan, group_labels},
    layout::element::WordDetection,
};

/// Controls how detected words are grouped into text lines.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct LineClusteringConfig {
    /// Words that do not share a line with at least this many words
    /// (themselves included) are dropped as noise.
    pub min_words_per_line: usize,
    /// Maximum `1 - vertical IoU` distance for two words to be neighbors.
    pub max_dist: f32,
}

impl Default for LineClusteringConfig {
    fn default() -> Self {
        Self {
            min_words_per_line: 2,
            max_dist: 0.7,
        }
    }
}

/// Groups words into lines, top to bottom, each line left to right.
pub fn sort_multiline(
    detections: Vec<WordDetection>,
    config: &LineClusteringConfig,
) -> Vec<Vec<WordDetection>> {
    if detections.is_empty() {
        return Vec::new();
    }

    let labels = dbscan(
        detections.len(),
        config.max_dist,
        config.min_words_per_line,
        |i, j| 1.0 - detections[i].bbox.vertical_iou(&detections[j].bbox),
    );

    let noise = labels.iter().filter(|label| label.is_none()).count();
    if noise > 0 {
        debug!("dropped {noise} words without enough neighbors on their line");
    }

    let groups = group_labels(&labels);
    let mut slots = detections.into_iter().map(Some).collect::<Vec<_>>();

    let mut lines = groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .filter_map(|idx| slots[idx].take())
                .collect::<Vec<_>>()
        })
        .filter(|line| !line.is_empty())
        .map(sort_line)
        .collect::<Vec<_>>();

    lines.sort_by(|a, b| mean_center_y(a).total_cmp(&mean_center_y(b)));
    lines
}

/// Sorts a single line of words left to right.
pub fn sort_line(mut line: Vec<WordDetection>) -> Vec<WordDetection> {
    line.sort_by(|a, b| a.bbox.min.x.total_cmp(&b.bbox.min.x));
    line
}

fn mean_center_y(line: &[WordDetection]) -> f32 {
    let sum: f32 = line.iter().map(|word| word.bbox.center().y).sum();
    sum / line.len().max(1) as f32
}
