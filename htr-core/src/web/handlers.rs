use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use axum_extra::extract::Multipart;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;
use serde_json::json;
use tracing::*;

use crate::{
    config::Sample,
    consts::*,
    error::HtrError,
    export::{combined_text, encode_png, summary},
    layout::page::PageResult,
};

use super::{
    request::{ApiError, ImageResponse, PdfResponse, ProcessForm},
    server::AppState,
};

const INDEX_HTML: &str = include_str!("index.html");

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn pdf_error(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("{err}. PDF support needs the PDFium library: {PDFIUM_INSTALL_HINT}"),
    )
}

/// Like [`pdf_error`], with the error's debug representation appended in
/// debug mode.
fn pdf_failure(err: impl std::fmt::Display + std::fmt::Debug, debug: bool) -> ApiError {
    let (status, message) = pdf_error(&err);
    if debug {
        (status, format!("{message}\nDetailed error: {err:?}"))
    } else {
        (status, message)
    }
}

/// GET / - the demo page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(INDEX_HTML.replace("{{BASE_PATH}}", &state.base_path))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "pipeline_loaded": state.pipeline.is_some(),
        "pdf_support": state.rasterizer.is_some(),
    }))
}

/// GET /api/examples - bundled samples with their recommended parameters.
pub async fn examples(State(state): State<AppState>) -> Json<Vec<Sample>> {
    Json(state.samples.examples(&state.data_dir))
}

/// POST /api/image - reads one page image.
///
/// # Errors
/// - 400 Bad Request: invalid parameters, no or undecodable image
/// - 503 Service Unavailable: models not loaded
/// - 500 Internal Server Error: recognition failed
pub async fn process_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let form = ProcessForm::from_multipart(multipart).await?;
    let image = form_image(&state, &form)?;
    if form.config.debug {
        info!("image request {}x{}", image.width(), image.height());
    }

    let pipeline = state.pipeline.clone().ok_or_else(|| {
        warn!("HTR pipeline not loaded");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "HTR models not loaded".to_string(),
        )
    })?;
    let visualizer = state.visualizer.clone();
    let mut config = form.config;

    let (page, png) = tokio::task::spawn_blocking(move || -> Result<_, HtrError> {
        let mut pipeline = pipeline.blocking_lock();
        config.resolve_decoder(pipeline.prefix_tree().is_some());
        let lines = pipeline.read_page(&image, &config)?;
        let page = PageResult::new(1, lines, (image.width(), image.height()));
        let canvas = visualizer.draw(&image, &page.lines, config.text_scale);
        Ok((page, encode_png(&canvas)?))
    })
    .await
    .map_err(internal_error)?
    .map_err(|err| {
        warn!("image processing failed: {err}");
        internal_error(err)
    })?;

    info!("image read: {} lines, {} words", page.line_count, page.word_count);

    Ok(Json(ImageResponse {
        text: page.text,
        visualization: STANDARD.encode(png),
        line_count: page.line_count,
        word_count: page.word_count,
    }))
}

/// POST /api/pdf - reads every page of a PDF.
///
/// The response holds the text of all pages and the visualization of the
/// first page.
pub async fn process_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PdfResponse>, ApiError> {
    let form = ProcessForm::from_multipart(multipart).await?;
    let bytes = form
        .file
        .clone()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "a PDF file is required".to_string()))?;

    let pipeline = state.pipeline.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "HTR models not loaded".to_string(),
        )
    })?;
    let rasterizer = state.rasterizer.clone().ok_or_else(|| {
        pdf_error(HtrError::PdfiumNotFound {
            env_name: PDFIUM_LIB_PATH_ENV_NAME.to_string(),
            hint: PDFIUM_INSTALL_HINT.to_string(),
        })
    })?;
    let visualizer = state.visualizer.clone();
    let mut config = form.config;
    let debug = config.debug;

    let (results, png) = tokio::task::spawn_blocking(move || -> Result<_, HtrError> {
        let pages = rasterizer.rasterize_bytes(&bytes)?;
        let mut pipeline = pipeline.blocking_lock();
        config.resolve_decoder(pipeline.prefix_tree().is_some());
        let results = pipeline.process_pages(&pages, &config)?;

        let png = match (pages.first(), results.first()) {
            (Some(image), Some(page)) => Some(encode_png(&visualizer.draw(
                image,
                &page.lines,
                config.text_scale,
            ))?),
            _ => None,
        };
        Ok((results, png))
    })
    .await
    .map_err(|err| pdf_failure(err, debug))?
    .map_err(|err| {
        warn!("pdf processing failed: {err}");
        pdf_failure(err, debug)
    })?;

    info!("pdf read: {} pages", results.len());

    Ok(Json(PdfResponse {
        text: combined_text(&results),
        visualization: png.map(|png| STANDARD.encode(png)),
        page_count: results.len(),
        line_count: results.iter().map(|page| page.line_count).sum(),
        word_count: results.iter().map(|page| page.word_count).sum(),
        summary: summary(&results),
    }))
}

/// The uploaded page, or the named sample from the data directory.
fn form_image(state: &AppState, form: &ProcessForm) -> Result<DynamicImage, ApiError> {
    let image = match (&form.file, &form.example) {
        (Some(bytes), _) => image::load_from_memory(bytes).map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                format!(
                    "cannot decode `{}`: {err}",
                    form.file_name.as_deref().unwrap_or("upload")
                ),
            )
        })?,
        (None, Some(name)) => {
            if state.samples.get(name).is_none() {
                return Err((StatusCode::BAD_REQUEST, format!("unknown example `{name}`")));
            }
            let path = state.data_dir.join(name);
            image::open(&path).map_err(|err| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("cannot open {}: {err}", path.display()),
                )
            })?
        }
        (None, None) => {
            return Err((StatusCode::BAD_REQUEST, "an image is required".to_string()));
        }
    };

    Ok(DynamicImage::ImageLuma8(image.to_luma8()))
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, path::Path};

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use image::{GrayImage, ImageFormat, Luma};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::{SampleConfig, SampleParams},
        web::server::router,
    };

    const BOUNDARY: &str = "htr-test-boundary";

    fn app(base_path: &str) -> Router {
        let mut samples = SampleConfig::default();
        samples.samples.insert(
            "page.png".to_string(),
            SampleParams {
                scale: 0.4,
                margin: 5,
                text_scale: 1.0,
            },
        );
        router(AppState::new(Path::new("data"), base_path.to_string()).with_samples(samples))
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        GrayImage::from_pixel(8, 8, Luma([255]))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn multipart(fields: &[(&str, &str)], file: Option<&[u8]>) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(file) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"page.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(file);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let app = app("/run123");

        let response = app
            .clone()
            .oneshot(Request::get("/run123/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["pipeline_loaded"], false);

        let response = app
            .clone()
            .oneshot(Request::get("/run123").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"const BASE = "/run123";"#));
        assert!(!html.contains("{{BASE_PATH}}"));

        // nothing is served outside the per-run path
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_examples() {
        let response = app("")
            .oneshot(Request::get("/api/examples").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let examples: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(examples[0]["name"], "page.png");
        assert_eq!(examples[0]["margin"], 5);
    }

    #[tokio::test]
    async fn test_image_invalid_parameters() {
        let png = png_bytes();
        let response = app("")
            .oneshot(post(
                "/api/image",
                multipart(&[("scale", "99")], Some(&png)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app("")
            .oneshot(post("/api/image", multipart(&[("margin", "5")], None)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app("")
            .oneshot(post("/api/image", multipart(&[], Some(b"not an image"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_image_without_models() {
        let png = png_bytes();
        let response = app("")
            .oneshot(post(
                "/api/image",
                multipart(
                    &[("scale", "1.0"), ("margin", "0"), ("use_dictionary", "false")],
                    Some(&png),
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_pdf_requires_file() {
        let response = app("")
            .oneshot(post("/api/pdf", multipart(&[("scale", "0.4")], None)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app("")
            .oneshot(post("/api/pdf", multipart(&[], Some(b"%PDF-1.4"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_pdf_failure_details_in_debug_mode() {
        let err = HtrError::FileNotFound {
            path: "upload.pdf".to_string(),
        };

        let (status, message) = pdf_failure(&err, false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message.contains(PDFIUM_INSTALL_HINT));
        assert!(!message.contains("Detailed error"));

        let (_, message) = pdf_failure(&err, true);
        assert!(message.contains("Detailed error: FileNotFound"));
        assert!(message.contains("upload.pdf"));
    }
}
