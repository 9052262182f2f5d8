pub mod pipeline;
pub mod render;
pub mod source;

pub use pipeline::{HtrPipeline, PipelineConfig, PipelineConfigBuilder};
pub use render::PdfRasterizer;
pub use source::{InputKind, load_pages};
