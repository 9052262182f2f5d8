use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use htr_core::{
    config::load_dictionary,
    export::{Visualizer, combined_text, save_results, summary, write_json},
    HtrPipeline, ModelPaths, PdfRasterizer, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "htr-pdf")]
#[command(about = "Extract handwritten text from every page of a PDF")]
struct Args {
    #[arg(help = "Input PDF file path")]
    input: PathBuf,

    #[arg(short, long, default_value = "extracted_results", help = "Output directory")]
    output: PathBuf,

    #[arg(long, default_value = "200", help = "Rendering resolution")]
    dpi: u16,

    #[arg(long, default_value = "0.4", help = "Detector scale")]
    scale: f32,

    #[arg(long, default_value = "5", help = "Pixels added around each word")]
    margin: u32,

    #[arg(long, default_value = "2", help = "Words needed to form a line")]
    min_words_per_line: usize,

    #[arg(long, help = "Constrain words to the dictionary")]
    use_dictionary: bool,

    #[arg(long, default_value = "data", help = "Directory with the dictionary")]
    data_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Input PDF: {}", args.input.display());
    info!("Output directory: {}", args.output.display());

    let mut config = PipelineConfig::default();
    config.detector.scale = args.scale;
    config.detector.margin = args.margin;
    config.line_clustering.min_words_per_line = args.min_words_per_line;
    config.use_dictionary(args.use_dictionary);
    config.validate()?;

    let rasterizer = PdfRasterizer::new(args.dpi)?;
    let pages = rasterizer
        .rasterize_file(&args.input, Some(&args.output.join("pages")))
        .with_context(|| format!("failed to render {}", args.input.display()))?;
    info!("rendered {} pages", pages.len());

    let mut pipeline = HtrPipeline::new(&ModelPaths::from_env())
        .context("failed to load the HTR models")?;
    if args.use_dictionary {
        pipeline.set_prefix_tree(load_dictionary(&args.data_dir));
    }
    if config.resolve_decoder(pipeline.prefix_tree().is_some()) {
        warn!("no dictionary loaded, decoding with best path");
    }

    let results = pipeline.process_pages(&pages, &config)?;

    save_results(&results, &args.output)?;
    write_json(&results, &args.output.join("results.json"))?;

    let visualizer = Visualizer::from_env()?;
    let plots = args.output.join("plots");
    std::fs::create_dir_all(&plots)?;
    for (page, result) in pages.iter().zip(&results) {
        let canvas = visualizer.draw(page, &result.lines, config.text_scale);
        Visualizer::save(&canvas, plots.join(format!("page_{:03}.png", result.page_number)))?;
    }

    println!("{}", combined_text(&results));
    println!("{}", summary(&results));
    info!("results saved to {}", args.output.display());

    Ok(())
}
