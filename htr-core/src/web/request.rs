use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Serialize;

use crate::parse::pipeline::PipelineConfig;

/// Upload size limit for pages and PDFs.
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

pub type ApiError = (StatusCode, String);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

/// A recognition request sent as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct ProcessForm {
    pub file: Option<Bytes>,
    pub file_name: Option<String>,
    /// Name of a bundled sample, used when no file is uploaded.
    pub example: Option<String>,
    pub config: PipelineConfig,
}

impl ProcessForm {
    /// Reads the form. Parameters missing from the form keep the defaults
    /// the demos start with.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self {
            file: None,
            file_name: None,
            example: None,
            config: default_web_config(),
        };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| bad_request(format!("invalid multipart body: {err}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| bad_request(format!("invalid upload: {err}")))?;
                    if bytes.len() > MAX_UPLOAD_SIZE {
                        return Err(bad_request(format!(
                            "upload exceeds maximum size of {MAX_UPLOAD_SIZE} bytes"
                        )));
                    }
                    if !bytes.is_empty() {
                        form.file = Some(bytes);
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(|err| bad_request(format!("invalid field `{name}`: {err}")))?;
                    form.set_param(&name, value.trim())?;
                }
            }
        }

        form.config
            .validate()
            .map_err(|err| bad_request(err.to_string()))?;

        Ok(form)
    }

    /// Applies one text field; unknown fields are ignored.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<(), ApiError> {
        let config = &mut self.config;
        match name {
            "scale" => config.detector.scale = parse_field(name, value)?,
            "margin" => config.detector.margin = parse_field(name, value)?,
            "min_words_per_line" => {
                config.line_clustering.min_words_per_line = parse_field(name, value)?
            }
            "text_scale" => config.text_scale = parse_field(name, value)?,
            "use_dictionary" => config.use_dictionary(parse_bool(name, value)?),
            "debug" => config.debug = parse_bool(name, value)?,
            "example" if !value.is_empty() => self.example = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }
}

/// Starting values of the web form sliders.
pub fn default_web_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.detector.scale = 0.4;
    config.detector.margin = 5;
    config
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| bad_request(format!("invalid value `{value}` for `{name}`")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" | "" => Ok(false),
        _ => Err(bad_request(format!("invalid value `{value}` for `{name}`"))),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    pub text: String,
    /// Annotated page as a base64 PNG.
    pub visualization: String,
    pub line_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfResponse {
    pub text: String,
    /// First page only.
    pub visualization: Option<String>,
    pub page_count: usize,
    pub line_count: usize,
    pub word_count: usize,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;

    fn form() -> ProcessForm {
        ProcessForm {
            file: None,
            file_name: None,
            example: None,
            config: default_web_config(),
        }
    }

    #[test]
    fn test_set_param() {
        let mut form = form();
        form.set_param("scale", "1.5").unwrap();
        form.set_param("margin", "7").unwrap();
        form.set_param("min_words_per_line", "3").unwrap();
        form.set_param("text_scale", "0.8").unwrap();
        form.set_param("use_dictionary", "true").unwrap();
        form.set_param("debug", "on").unwrap();
        form.set_param("unknown", "whatever").unwrap();

        assert_eq!(form.config.detector.scale, 1.5);
        assert_eq!(form.config.detector.margin, 7);
        assert_eq!(form.config.line_clustering.min_words_per_line, 3);
        assert_eq!(form.config.text_scale, 0.8);
        assert_eq!(form.config.reader.decoder, Decoder::WordBeamSearch);
        assert!(form.config.debug);
        assert!(form.config.validate().is_ok());
    }

    #[test]
    fn test_set_param_rejects_garbage() {
        let mut form = form();
        let (status, message) = form.set_param("margin", "-3").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("margin"));
        assert!(form.set_param("debug", "maybe").is_err());
    }
}
