use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::*;

use crate::{consts::*, decode::PrefixTree, error::*, parse::pipeline::PipelineConfig};

/// Recommended parameters for one sample image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    pub scale: f32,
    pub margin: u32,
    #[serde(default = "default_text_scale")]
    pub text_scale: f32,
}

fn default_text_scale() -> f32 {
    1.0
}

impl SampleParams {
    /// Copies the sample's parameters onto a pipeline configuration.
    pub fn apply(&self, config: &mut PipelineConfig) {
        config.detector.scale = self.scale;
        config.detector.margin = self.margin;
        config.text_scale = self.text_scale;
    }
}

/// A sample image shipped with the demos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub params: SampleParams,
}

/// `data/config.json`: sample file name to its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleConfig {
    pub samples: BTreeMap<String, SampleParams>,
}

impl SampleConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HtrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        let config: Self = serde_json::from_str(&content).context(JsonSnafu {
            stage: "sample-config",
        })?;

        debug!("loaded {} samples from {}", config.samples.len(), path.display());
        Ok(config)
    }

    /// Like [`SampleConfig::load`], but a missing file yields no samples.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, HtrError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("sample config {} not found", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Samples sorted by file name, resolved against `data_dir`.
    pub fn examples(&self, data_dir: &Path) -> Vec<Sample> {
        self.samples
            .iter()
            .map(|(name, params)| Sample {
                name: name.clone(),
                path: data_dir.join(name),
                params: *params,
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SampleParams> {
        self.samples.get(name)
    }
}

/// Loads `words_alpha.txt` from the data directory, upper-cased.
///
/// A missing or unreadable word list is logged and yields `None`, so
/// callers fall back to best path decoding.
pub fn load_dictionary(data_dir: &Path) -> Option<PrefixTree> {
    let path = data_dir.join(WORD_LIST_FILE);
    if !path.exists() {
        warn!("dictionary {} not found, word beam search unavailable", path.display());
        return None;
    }

    PrefixTree::load_word_list(&path, true)
        .inspect_err(|err| warn!("failed to load dictionary: {err}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "page.png": {"scale": 0.4, "margin": 5, "text_scale": 1.2},
        "line.png": {"scale": 1.0, "margin": 0}
    }"#;

    #[test]
    fn test_sample_config_examples_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(CONFIG.as_bytes())?;

        let config = SampleConfig::load(file.path())?;
        let examples = config.examples(Path::new("data"));

        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].name, "line.png");
        assert_eq!(examples[0].params.text_scale, 1.0);
        assert_eq!(examples[1].path, PathBuf::from("data/page.png"));
        assert_eq!(examples[1].params.margin, 5);
        Ok(())
    }

    #[test]
    fn test_sample_params_apply() {
        let params = SampleParams {
            scale: 0.4,
            margin: 5,
            text_scale: 1.2,
        };
        let mut config = PipelineConfig::default();
        params.apply(&mut config);

        assert_eq!(config.detector.scale, 0.4);
        assert_eq!(config.detector.margin, 5);
        assert_eq!(config.text_scale, 1.2);
    }

    #[test]
    fn test_load_dictionary() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(load_dictionary(dir.path()).is_none());

        std::fs::write(dir.path().join(WORD_LIST_FILE), "hello\nworld\n")?;
        let tree = load_dictionary(dir.path()).ok_or("dictionary not loaded")?;
        assert!(tree.is_word("HELLO"));
        assert_eq!(tree.len(), 2);
        Ok(())
    }

    #[test]
    fn test_sample_config_missing_and_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let config = SampleConfig::load_or_default("/no/such/config.json")?;
        assert!(config.samples.is_empty());

        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"not json")?;
        assert!(matches!(
            SampleConfig::load(file.path()),
            Err(HtrError::Json { .. })
        ));
        Ok(())
    }
}
