use std::path::{Path, PathBuf};

use image::DynamicImage;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{
        Session,
        builder::{GraphOptimizationLevel, SessionBuilder},
    },
};
use snafu::{ResultExt, ensure};

use crate::{
    consts::*,
    error::{FileNotFoundSnafu, HtrError, OrtInitSnafu},
};

pub trait Model {
    type Input;
    type Output;
    type Config;

    const INPUT_NAME: &'static str;
    const OUTPUT_NAME: &'static str;
    const MODEL_NAME: &'static str;

    /// Location of the `.onnx` file.
    fn path(&self) -> &Path;
    fn config(&self) -> &Self::Config;
}

pub trait OnnxSession<M: Model> {
    type Output;
    type Extra;

    fn preprocess(&self, image: &DynamicImage) -> Result<M::Input, HtrError>;

    fn postprocess(&self, output: M::Output, extra: Self::Extra) -> Result<Self::Output, HtrError>;

    fn infer(&mut self, input: M::Input) -> Result<M::Output, HtrError>;

    fn run(&mut self, image: &DynamicImage, extra: Self::Extra) -> Result<Self::Output, HtrError> {
        let input = self.preprocess(image)?;

        let output = self.infer(input)?;

        self.postprocess(output, extra)
    }
}

/// common session builder
pub fn session_builder() -> Result<SessionBuilder, HtrError> {
    let session_builder = Session::builder()
        .context(OrtInitSnafu { stage: "builder" })?
        .with_execution_providers(vec![
            #[cfg(all(feature = "coreml", target_os = "macos"))]
            {
                use ort::execution_providers::CoreMLExecutionProvider;
                use ort::execution_providers::coreml::*;
                CoreMLExecutionProvider::default()
                    .with_model_format(CoreMLModelFormat::MLProgram)
                    .build()
            },
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                CUDAExecutionProvider::default().build()
            },
            CPUExecutionProvider::default().build(),
        ])
        .context(OrtInitSnafu { stage: "provider" })?
        .with_optimization_level(GraphOptimizationLevel::Level1)
        .context(OrtInitSnafu {
            stage: "optimization",
        })?
        .with_intra_threads(4)
        .context(OrtInitSnafu {
            stage: "intra-threads",
        })?;

    Ok(session_builder)
}

/// Commits a session from a model file, failing early with a readable error
/// when the file is missing.
pub fn commit_model<M: Model>(builder: SessionBuilder, model: &M) -> Result<Session, HtrError> {
    let path = model.path();
    ensure!(
        path.exists(),
        FileNotFoundSnafu {
            path: path.to_string_lossy()
        }
    );

    builder
        .commit_from_file(path)
        .context(OrtInitSnafu { stage: "commit" })
}

/// Tensor names of a committed session: its first input and output, or the
/// model's defaults when the graph does not report any.
pub fn io_names<M: Model>(session: &Session) -> (String, String) {
    let input = session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| M::INPUT_NAME.to_string());
    let output = session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .unwrap_or_else(|| M::OUTPUT_NAME.to_string());

    (input, output)
}

/// Where the detector and reader models live.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub dir: PathBuf,
}

impl ModelPaths {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Reads the directory from `HTR_MODEL_DIR`, defaulting to `models/`.
    pub fn from_env() -> Self {
        let dir = std::env::var(MODEL_DIR_ENV_NAME).unwrap_or_else(|_| DEFAULT_MODEL_DIR.into());
        Self::new(dir)
    }

    pub fn detector(&self) -> PathBuf {
        self.dir.join(DETECTOR_MODEL_FILE)
    }

    pub fn reader(&self) -> PathBuf {
        self.dir.join(READER_MODEL_FILE)
    }

    pub fn chars(&self) -> PathBuf {
        self.dir.join(CHARS_FILE)
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_DIR)
    }
}
