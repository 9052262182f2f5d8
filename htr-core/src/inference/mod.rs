pub mod detector;
pub mod model;
pub mod reader;
