use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::*;
use uuid::Uuid;

use crate::{
    config::SampleConfig, consts::*, export::Visualizer, parse::pipeline::HtrPipeline,
    parse::render::PdfRasterizer,
};

use super::{handlers, request::MAX_UPLOAD_SIZE};

/// Where and how the web demo listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Port 0 picks a free port on every start.
    pub bind: SocketAddr,
    /// Holds `config.json`, the sample images and the dictionary.
    pub data_dir: PathBuf,
    /// Serve under a random path segment, new on every start.
    pub per_run_path: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: PathBuf::from("data"),
            per_run_path: true,
        }
    }
}

impl WebConfig {
    /// Path prefix of every route, `""` when serving at the root.
    pub fn base_path(&self) -> String {
        if self.per_run_path {
            format!("/{}", Uuid::new_v4().simple())
        } else {
            String::new()
        }
    }
}

/// Shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the models could not be loaded.
    pub pipeline: Option<Arc<Mutex<HtrPipeline>>>,
    /// `None` when PDFium is unavailable.
    pub rasterizer: Option<Arc<PdfRasterizer>>,
    pub visualizer: Arc<Visualizer>,
    pub samples: Arc<SampleConfig>,
    pub data_dir: PathBuf,
    pub base_path: String,
}

impl AppState {
    pub fn new(data_dir: &Path, base_path: String) -> Self {
        Self {
            pipeline: None,
            rasterizer: None,
            visualizer: Arc::new(Visualizer::new(None)),
            samples: Arc::new(SampleConfig::default()),
            data_dir: data_dir.to_path_buf(),
            base_path,
        }
    }

    pub fn with_pipeline(mut self, pipeline: HtrPipeline) -> Self {
        self.pipeline = Some(Arc::new(Mutex::new(pipeline)));
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: PdfRasterizer) -> Self {
        self.rasterizer = Some(Arc::new(rasterizer));
        self
    }

    pub fn with_visualizer(mut self, visualizer: Visualizer) -> Self {
        self.visualizer = Arc::new(visualizer);
        self
    }

    pub fn with_samples(mut self, samples: SampleConfig) -> Self {
        self.samples = Arc::new(samples);
        self
    }

    /// Sample config path inside the data directory.
    pub fn sample_config_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SAMPLE_CONFIG_FILE)
    }
}

pub fn router(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let api = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/examples", get(handlers::examples))
        .route("/api/image", post(handlers::process_image))
        .route("/api/pdf", post(handlers::process_pdf))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .with_state(state);

    let app = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(&base_path, api)
    };

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
}

/// Binds the listener, prints the access URL and serves until the process ends.
pub async fn serve(config: &WebConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;
    let url = if state.base_path.is_empty() {
        format!("http://{addr}/")
    } else {
        format!("http://{addr}{}", state.base_path)
    };

    info!("web demo listening on {addr}");
    println!("Running on local URL:  {url}");

    axum::serve(listener, router(state)).await
}
