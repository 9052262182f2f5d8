pub mod analysis;
pub mod config;
pub mod consts;
pub mod decode;
pub mod error;
pub mod export;
pub mod inference;
pub mod layout;
pub mod parse;
pub mod web;

// Re-export commonly used types
pub use error::HtrError;
pub use inference::model::ModelPaths;
pub use layout::{element::ReadLine, page::PageResult};
pub use parse::{
    pipeline::{HtrPipeline, PipelineConfig},
    render::PdfRasterizer,
};
