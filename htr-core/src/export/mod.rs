//! Result files and visualizations.

pub mod draw;
pub mod json;
pub mod text;

pub use draw::{Visualizer, encode_png};
pub use json::write_json;
pub use text::{combined_text, save_results, summary};
