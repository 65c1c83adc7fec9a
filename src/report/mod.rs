pub mod generator;
pub mod stats;

pub use generator::{format_timestamp, generate_report};
