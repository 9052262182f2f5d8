use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use htr_core::{
    config::{SampleConfig, SampleParams, load_dictionary},
    export::Visualizer,
    layout::element::page_text,
    parse::source::load_pages,
    HtrPipeline, ModelPaths, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "htr-plot")]
#[command(about = "Read handwritten pages and plot the detected words")]
#[command(
    long_about = "Read handwritten pages and plot the detected words.\n\n\
    Sample paths default to `data/` relative to the working directory. \
    Use --config and --data-dir when running from another directory."
)]
struct Args {
    #[arg(help = "Image to read; all configured samples when omitted")]
    image: Option<PathBuf>,

    #[arg(long, default_value = "data/config.json", help = "Sample configuration")]
    config: PathBuf,

    #[arg(long, default_value = "data", help = "Directory with samples and dictionary")]
    data_dir: PathBuf,

    #[arg(short, long, default_value = "plots", help = "Output directory")]
    output: PathBuf,

    #[arg(long, help = "Constrain words to the dictionary")]
    use_dictionary: bool,

    #[arg(long, default_value = "1.0", help = "Detector scale for a single image")]
    scale: f32,

    #[arg(long, default_value = "0", help = "Word margin for a single image")]
    margin: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let inputs = match &args.image {
        Some(image) => vec![(
            image.clone(),
            SampleParams {
                scale: args.scale,
                margin: args.margin,
                text_scale: 1.0,
            },
        )],
        None => SampleConfig::load(&args.config)?
            .examples(&args.data_dir)
            .into_iter()
            .map(|sample| (sample.path, sample.params))
            .collect(),
    };
    if inputs.is_empty() {
        bail!("no images given and no samples in {}", args.config.display());
    }

    let mut pipeline = HtrPipeline::new(&ModelPaths::from_env())
        .context("failed to load the HTR models")?;
    if args.use_dictionary {
        pipeline.set_prefix_tree(load_dictionary(&args.data_dir));
    }
    let visualizer = Visualizer::from_env()?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("cannot create {}", args.output.display()))?;

    for (path, params) in inputs {
        let mut config = PipelineConfig::default();
        params.apply(&mut config);
        config.use_dictionary(args.use_dictionary && pipeline.prefix_tree().is_some());
        config.validate()?;

        if let Err(err) = plot(&mut pipeline, &visualizer, &path, &config, &args.output) {
            warn!("skipping {}: {err:#}", path.display());
        }
    }

    Ok(())
}

fn plot(
    pipeline: &mut HtrPipeline,
    visualizer: &Visualizer,
    path: &Path,
    config: &PipelineConfig,
    output: &Path,
) -> Result<()> {
    info!("reading {}", path.display());
    let pages = load_pages(path, None)?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());

    for (idx, page) in pages.iter().enumerate() {
        let lines = pipeline.read_page(page, config)?;
        println!("{}:\n{}", path.display(), page_text(&lines));

        let plot_path = if pages.len() == 1 {
            output.join(format!("{stem}.png"))
        } else {
            output.join(format!("{stem}_{:03}.png", idx + 1))
        };
        let canvas = visualizer.draw(page, &lines, config.text_scale);
        Visualizer::save(&canvas, &plot_path)?;
        info!("plot saved to {}", plot_path.display());
    }

    Ok(())
}
