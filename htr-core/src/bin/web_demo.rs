use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use htr_core::{
    config::{SampleConfig, load_dictionary},
    consts::DEFAULT_DPI,
    export::Visualizer,
    web::{AppState, WebConfig, serve},
    HtrPipeline, ModelPaths, PdfRasterizer,
};

#[derive(Parser)]
#[command(name = "htr-web")]
#[command(about = "Web demo for handwritten text recognition")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:0", help = "Listen address, port 0 picks a free one")]
    bind: SocketAddr,

    #[arg(long, default_value = "data", help = "Directory with samples and dictionary")]
    data_dir: PathBuf,

    #[arg(long, help = "Serve at the root instead of a per-run path")]
    fixed_path: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = WebConfig {
        bind: args.bind,
        data_dir: args.data_dir,
        per_run_path: !args.fixed_path,
    };

    let samples = SampleConfig::load_or_default(AppState::sample_config_path(&config.data_dir))?;
    let mut state = AppState::new(&config.data_dir, config.base_path())
        .with_samples(samples)
        .with_visualizer(Visualizer::from_env()?);

    match HtrPipeline::new(&ModelPaths::from_env()) {
        Ok(mut pipeline) => {
            pipeline.set_prefix_tree(load_dictionary(&config.data_dir));
            state = state.with_pipeline(pipeline);
        }
        Err(err) => warn!("HTR models unavailable, recognition disabled: {err}"),
    }

    match PdfRasterizer::new(DEFAULT_DPI) {
        Ok(rasterizer) => state = state.with_rasterizer(rasterizer),
        Err(err) => warn!("PDF upload disabled: {err}"),
    }

    info!("starting web demo");
    serve(&config, state).await?;
    Ok(())
}
