pub mod backend;
pub mod cli;
pub mod config;
pub mod model;
pub mod telemetry;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
pub mod workflow;
