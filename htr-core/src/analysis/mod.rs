pub mod bbox;
pub mod cluster;
pub mod lines;
