use image::{DynamicImage, GrayImage, imageops::FilterType};
use ndarray::prelude::*;
use ort::session::{Session, builder::SessionBuilder};
use ort::value::TensorRef;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::*;

use crate::{
    consts::*,
    decode::{CtcMatrix, Decoder, PrefixTree, best_path, word_beam_search},
    error::*,
    inference::model::{Model, OnnxSession, commit_model, io_names},
};

use super::model::{ReaderConfig, WordReader};

pub struct ReaderSession<M: Model> {
    session: Session,
    model: M,
    input_name: String,
    output_name: String,
    chars: Vec<char>,
}

impl ReaderSession<WordReader> {
    pub fn new(session: SessionBuilder, model: WordReader) -> Result<Self, HtrError> {
        let session = commit_model(session, &model)?;
        let (input_name, output_name) = io_names::<WordReader>(&session);

        let from_metadata = session
            .metadata()
            .ok()
            .and_then(|m| m.custom(CHARS_METADATA_KEY).ok().flatten());

        let raw = match from_metadata {
            Some(chars) => chars,
            None => {
                let path = model.chars_path();
                debug!("no `{CHARS_METADATA_KEY}` metadata, reading {}", path.display());
                ensure!(
                    path.exists(),
                    CharsetSnafu {
                        model: WordReader::MODEL_NAME,
                        message: format!(
                            "no `{CHARS_METADATA_KEY}` metadata and {} is missing",
                            path.display()
                        ),
                    }
                );
                std::fs::read_to_string(path).context(IoReadSnafu {
                    path: path.to_string_lossy(),
                })?
            }
        };

        let chars = parse_charset(&raw);
        ensure!(
            !chars.is_empty(),
            CharsetSnafu {
                model: WordReader::MODEL_NAME,
                message: "character set is empty",
            }
        );
        info!("word reader loaded with {} characters", chars.len());

        Ok(Self {
            session,
            model,
            input_name,
            output_name,
            chars,
        })
    }

    /// Characters in label order; the blank is the label after the last one.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn config(&self) -> &ReaderConfig {
        self.model.config()
    }

    pub fn set_config(&mut self, config: ReaderConfig) {
        self.model.set_config(config);
    }

    /// Runs the model on a word crop and returns its CTC matrix.
    pub fn ctc_matrix(&mut self, crop: &GrayImage) -> Result<CtcMatrix, HtrError> {
        let input = prepare_input(crop, self.config());
        let output = self.infer(input)?;
        self.postprocess(output, ())
    }

    /// Reads a single word crop.
    pub fn read(
        &mut self,
        crop: &GrayImage,
        tree: Option<&PrefixTree>,
    ) -> Result<String, HtrError> {
        let mat = self.ctc_matrix(crop)?;
        Ok(decode_text(&mat, &self.chars, self.config(), tree))
    }
}

impl OnnxSession<WordReader> for ReaderSession<WordReader> {
    type Output = CtcMatrix;
    type Extra = ();

    fn preprocess(&self, image: &DynamicImage) -> Result<<WordReader as Model>::Input, HtrError> {
        Ok(prepare_input(&image.to_luma8(), self.config()))
    }

    fn postprocess(
        &self,
        output: <WordReader as Model>::Output,
        _extra: Self::Extra,
    ) -> Result<Self::Output, HtrError> {
        let mat = ctc_frames(output)?;
        ensure!(
            mat.ncols() == self.chars.len() + 1,
            CharsetSnafu {
                model: WordReader::MODEL_NAME,
                message: format!(
                    "model predicts {} labels but the character set has {} characters",
                    mat.ncols(),
                    self.chars.len()
                ),
            }
        );

        Ok(CtcMatrix::new(mat))
    }

    fn infer(
        &mut self,
        input: <WordReader as Model>::Input,
    ) -> Result<<WordReader as Model>::Output, HtrError> {
        let output = self
            .session
            .run(ort::inputs![
                self.input_name.as_str() => TensorRef::from_array_view(&input).context(TensorSnafu{stage: "reader-input"})?
            ])
            .context(InferenceSnafu {})?;

        let output_array = output
            .get(self.output_name.as_str())
            .context(NotFoundOutputSnafu {
                output_name: self.output_name.as_str(),
            })?
            .try_extract_array::<f32>()
            .context(TensorSnafu {
                stage: "reader-extract",
            })?
            .into_dimensionality::<Ix3>()
            .context(ShapeSnafu { stage: "reader" })?
            .to_owned();

        Ok(output_array)
    }
}

/// One label per Unicode scalar; a trailing line break is not a label.
pub fn parse_charset(raw: &str) -> Vec<char> {
    raw.trim_end_matches(['\n', '\r']).chars().collect()
}

/// Resizes a crop to the configured height keeping its aspect ratio, pads
/// narrow crops with white and normalizes to `[-0.5, 0.5]`.
pub fn prepare_input(crop: &GrayImage, config: &ReaderConfig) -> Array4<f32> {
    let height = config.input_height.max(1);
    let (w, h) = crop.dimensions();
    let width = ((w as f32 * height as f32 / h.max(1) as f32).round() as u32).max(1);
    let resized = image::imageops::resize(crop, width, height, FilterType::Triangle);

    let padded_w = width.max(config.min_input_width) as usize;
    let mut input_tensor =
        Array4::from_elem([1, 1, height as usize, padded_w], PAD_PIXEL as f32 / 255.0 - 0.5);

    for (x, y, pixel) in resized.enumerate_pixels() {
        input_tensor[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32 / 255.0 - 0.5;
    }

    input_tensor
}

/// Squeezes the batch axis of a `[T, 1, C]` or `[1, T, C]` output.
pub fn ctc_frames(output: Array3<f32>) -> Result<Array2<f32>, HtrError> {
    let shape = output.shape().to_vec();
    match shape.as_slice() {
        [_, 1, _] => Ok(output.index_axis_move(Axis(1), 0)),
        [1, _, _] => Ok(output.index_axis_move(Axis(0), 0)),
        _ => OutputShapeSnafu {
            shape,
            stage: "reader-postprocess",
        }
        .fail(),
    }
}

/// Decodes a CTC matrix with the configured decoder.
pub fn decode_text(
    mat: &CtcMatrix,
    chars: &[char],
    config: &ReaderConfig,
    tree: Option<&PrefixTree>,
) -> String {
    match (config.decoder, tree) {
        (Decoder::BestPath, _) => best_path(mat, chars),
        (Decoder::WordBeamSearch, Some(tree)) => {
            word_beam_search(mat, chars, tree, config.beam_width)
        }
        // callers resolve the decoder per page, see `PipelineConfig::resolve_decoder`
        (Decoder::WordBeamSearch, None) => best_path(mat, chars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_utils::peaked_matrix;
    use crate::inference::reader::ReaderConfigBuilder;
    use image::Luma;

    #[test]
    fn test_parse_charset() {
        assert_eq!(parse_charset("ab c\n"), vec!['a', 'b', ' ', 'c']);
        assert_eq!(parse_charset("äö\r\n"), vec!['ä', 'ö']);
        assert!(parse_charset("\n").is_empty());
    }

    #[test]
    fn test_prepare_input_keeps_aspect() {
        let crop = GrayImage::from_pixel(40, 16, Luma([0]));
        let input = prepare_input(&crop, &ReaderConfig::default());
        assert_eq!(input.shape(), &[1, 1, 32, 80]);
        assert_eq!(input[[0, 0, 10, 40]], -0.5);
    }

    #[test]
    fn test_prepare_input_pads_narrow_crops() {
        let crop = GrayImage::from_pixel(2, 32, Luma([0]));
        let input = prepare_input(&crop, &ReaderConfig::default());
        assert_eq!(input.shape(), &[1, 1, 32, 16]);
        assert_eq!(input[[0, 0, 0, 0]], -0.5);
        assert_eq!(input[[0, 0, 0, 15]], 0.5);
    }

    #[test]
    fn test_ctc_frames_layouts() {
        let time_major = Array3::<f32>::zeros((5, 1, 3));
        assert_eq!(ctc_frames(time_major).unwrap().dim(), (5, 3));

        let batch_major = Array3::<f32>::zeros((1, 7, 3));
        assert_eq!(ctc_frames(batch_major).unwrap().dim(), (7, 3));

        let batched = Array3::<f32>::zeros((2, 7, 3));
        assert!(matches!(
            ctc_frames(batched),
            Err(HtrError::OutputShape { .. })
        ));
    }

    #[test]
    fn test_decode_text_falls_back_without_tree() {
        let chars = ['C', 'A', 'T'];
        let mat = peaked_matrix(4, &[Some(0), Some(1), Some(2)], 0.9);

        let beam = ReaderConfigBuilder::default()
            .decoder(Decoder::WordBeamSearch)
            .build()
            .unwrap();
        assert_eq!(decode_text(&mat, &chars, &beam, None), "CAT");

        let tree = PrefixTree::new(["CAT"]);
        assert_eq!(decode_text(&mat, &chars, &beam, Some(&tree)), "CAT");
        assert_eq!(
            decode_text(&mat, &chars, &ReaderConfig::default(), Some(&tree)),
            "CAT"
        );
    }
}
