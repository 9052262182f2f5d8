use glam::Vec2;
use image::{DynamicImage, GrayImage, Luma, imageops::FilterType};
use ndarray::prelude::*;
use ort::session::{Session, builder::SessionBuilder};
use ort::value::TensorRef;
use snafu::{OptionExt, ResultExt};
use tracing::*;

use crate::{
    analysis::{
        bbox::Bbox,
        cluster::{dbscan, group_labels},
    },
    consts::*,
    error::*,
    inference::model::{Model, OnnxSession, commit_model, io_names},
    layout::element::WordDetection,
};

use super::model::{DetectorConfig, WordDetector};

/// Geometry needed to map detector output back onto the page.
#[derive(Debug, Clone, Copy)]
pub struct DetExtra {
    pub original_size: Vec2,
    pub resized_size: Vec2,
}

impl DetExtra {
    pub fn new(width: u32, height: u32, scale: f32) -> Self {
        let (new_w, new_h) = resized_dims(width, height, scale);
        Self {
            original_size: Vec2::new(width as f32, height as f32),
            resized_size: Vec2::new(new_w as f32, new_h as f32),
        }
    }

    /// Per-axis factor from detector input pixels to page pixels.
    pub fn to_original(&self) -> Vec2 {
        self.original_size / self.resized_size
    }
}

pub struct DetectorSession<M: Model> {
    session: Session,
    model: M,
    input_name: String,
    output_name: String,
}

impl DetectorSession<WordDetector> {
    pub fn new(session: SessionBuilder, model: WordDetector) -> Result<Self, HtrError> {
        let session = commit_model(session, &model)?;
        let (input_name, output_name) = io_names::<WordDetector>(&session);
        debug!("word detector io: {input_name} -> {output_name}");

        Ok(Self {
            session,
            model,
            input_name,
            output_name,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        self.model.config()
    }

    pub fn set_config(&mut self, config: DetectorConfig) {
        self.model.set_config(config);
    }

    /// Finds word regions on a page and cuts them out of its grayscale version.
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<WordDetection>, HtrError> {
        let gray = image.to_luma8();
        let extra = DetExtra::new(gray.width(), gray.height(), self.config().scale);

        let boxes = self.run(image, extra)?;
        debug!("detected {} words", boxes.len());

        Ok(boxes
            .into_iter()
            .map(|bbox| WordDetection {
                crop: crop_region(&gray, &bbox),
                bbox,
            })
            .collect())
    }
}

impl OnnxSession<WordDetector> for DetectorSession<WordDetector> {
    type Output = Vec<Bbox>;
    type Extra = DetExtra;

    fn preprocess(
        &self,
        image: &DynamicImage,
    ) -> Result<<WordDetector as Model>::Input, HtrError> {
        Ok(prepare_input(&image.to_luma8(), self.config().scale))
    }

    fn postprocess(
        &self,
        output: <WordDetector as Model>::Output,
        extra: Self::Extra,
    ) -> Result<Self::Output, HtrError> {
        let config = self.config();
        let channels = output.shape()[1];
        if channels < DETECTOR_SEG_CHANNELS + DETECTOR_GEO_CHANNELS {
            return Err(HtrError::OutputShape {
                shape: output.shape().to_vec(),
                stage: "detector-postprocess".to_string(),
            });
        }

        let votes = decode_votes(output.slice(s![0, .., .., ..]), config.seg_threshold);
        let votes = subsample(votes, config.max_votes);
        let words = cluster_votes(&votes, config.cluster_eps, config.cluster_min_samples);
        trace!("{} votes clustered into {} words", votes.len(), words.len());

        Ok(map_to_page(words, &extra, config.margin))
    }

    fn infer(
        &mut self,
        input: <WordDetector as Model>::Input,
    ) -> Result<<WordDetector as Model>::Output, HtrError> {
        let output = self
            .session
            .run(ort::inputs![
                self.input_name.as_str() => TensorRef::from_array_view(&input).context(TensorSnafu{stage: "detector-input"})?
            ])
            .context(InferenceSnafu {})?;

        let tensor = output
            .get(self.output_name.as_str())
            .context(NotFoundOutputSnafu {
                output_name: self.output_name.as_str(),
            })?
            .try_extract_array::<f32>()
            .context(TensorSnafu {
                stage: "detector-extract",
            })?;

        let tensor = match tensor.ndim() {
            3 => tensor.insert_axis(Axis(0)),
            _ => tensor,
        };

        let output_array = tensor
            .into_dimensionality::<Ix4>()
            .context(ShapeSnafu { stage: "detector" })?
            .to_owned();

        Ok(output_array)
    }
}

/// Size of the page after applying the detector scale, at least 1x1.
pub fn resized_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    (new_w, new_h)
}

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Resizes by `scale`, pads with white to a multiple of 32 and normalizes
/// to `[-0.5, 0.5]`. Tensor layout is `[1, 1, H, W]`.
pub fn prepare_input(gray: &GrayImage, scale: f32) -> Array4<f32> {
    let (new_w, new_h) = resized_dims(gray.width(), gray.height(), scale);
    let resized = image::imageops::resize(gray, new_w, new_h, FilterType::Triangle);

    let padded_w = align_up(new_w, DETECTOR_INPUT_ALIGN) as usize;
    let padded_h = align_up(new_h, DETECTOR_INPUT_ALIGN) as usize;

    let mut input_tensor = Array4::from_elem(
        [1, 1, padded_h, padded_w],
        PAD_PIXEL as f32 / 255.0 - 0.5,
    );

    for (x, y, pixel) in resized.enumerate_pixels() {
        input_tensor[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32 / 255.0 - 0.5;
    }

    input_tensor
}

/// Turns the detector map `[C, H, W]` into box votes in detector input pixels.
///
/// Channels `0..3` hold segmentation logits (word, word surrounding,
/// background), channels `3..7` the distances to the top, bottom, left and
/// right word edge in map pixels.
pub fn decode_votes(map: ArrayView3<'_, f32>, seg_threshold: f32) -> Vec<Bbox> {
    let (_, height, width) = map.dim();
    let mut votes = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let logits = [map[[0, y, x]], map[[1, y, x]], map[[2, y, x]]];
            let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp = logits.map(|v| (v - max).exp());
            let word_prob = exp[0] / exp.iter().sum::<f32>();

            if word_prob <= seg_threshold {
                continue;
            }

            let top = map[[3, y, x]];
            let bottom = map[[4, y, x]];
            let left = map[[5, y, x]];
            let right = map[[6, y, x]];

            let (xf, yf) = (x as f32, y as f32);
            let vote = Bbox::from_xyxy(xf - left, yf - top, xf + right, yf + bottom)
                .scale(DETECTOR_MAP_DOWNSCALE);
            if !vote.is_empty() {
                votes.push(vote);
            }
        }
    }

    votes
}

fn subsample(votes: Vec<Bbox>, max_votes: usize) -> Vec<Bbox> {
    if max_votes == 0 || votes.len() <= max_votes {
        return votes;
    }
    let step = votes.len().div_ceil(max_votes);
    votes.into_iter().step_by(step).collect()
}

/// Merges overlapping votes into word boxes: DBSCAN on `1 - IoU`, then the
/// coordinate-wise median of each cluster. Isolated votes are dropped.
pub fn cluster_votes(votes: &[Bbox], eps: f32, min_samples: usize) -> Vec<Bbox> {
    let labels = dbscan(votes.len(), eps, min_samples, |i, j| {
        1.0 - votes[i].iou(&votes[j])
    });

    group_labels(&labels)
        .into_iter()
        .map(|members| {
            let coord = |f: fn(&Bbox) -> f32| median(members.iter().map(|&idx| f(&votes[idx])));
            Bbox::from_xyxy(
                coord(|b| b.min.x),
                coord(|b| b.min.y),
                coord(|b| b.max.x),
                coord(|b| b.max.y),
            )
        })
        .collect()
}

fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut values = values.collect::<Vec<_>>();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Maps word boxes from detector input pixels onto the page: undoes the
/// scale, adds `margin` on every side, clamps to the page and drops boxes
/// left without area.
pub fn map_to_page(words: Vec<Bbox>, extra: &DetExtra, margin: u32) -> Vec<Bbox> {
    let factor = extra.to_original();
    words
        .into_iter()
        .map(|bbox| {
            Bbox::new(bbox.min * factor, bbox.max * factor)
                .enlarge(margin as f32)
                .clamp(Vec2::ZERO, extra.original_size)
        })
        .filter(|bbox| !bbox.is_empty())
        .collect()
}

/// Cuts a box out of the page; boxes without pixels yield a 1x1 white image.
pub fn crop_region(gray: &GrayImage, bbox: &Bbox) -> GrayImage {
    let (x, y, width, height) = bbox.to_pixel_rect();
    let width = width.min(gray.width().saturating_sub(x));
    let height = height.min(gray.height().saturating_sub(y));

    if width == 0 || height == 0 {
        return GrayImage::from_pixel(1, 1, Luma([PAD_PIXEL]));
    }

    image::imageops::crop_imm(gray, x, y, width, height).to_image()
}
