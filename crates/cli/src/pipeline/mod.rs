//! Bridge run orchestration.

mod runner;
mod stats;

pub use runner::{Pipeline, PipelineConfig};
pub use stats::RunStats;
