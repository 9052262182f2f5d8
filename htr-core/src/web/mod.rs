//! Web demo: an HTML page and a small JSON API around [`HtrPipeline`].
//!
//! [`HtrPipeline`]: crate::parse::pipeline::HtrPipeline

pub mod handlers;
pub mod request;
pub mod server;

pub use server::{AppState, WebConfig, router, serve};
