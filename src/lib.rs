//! Lead Scribe
//!
//! Structured fact extraction from sales-meeting transcripts: deterministic
//! hints, model providers with retry and fallback, batch runs and cached
//! insights over the aggregated results.
pub mod adapters;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod utils;

pub use app::AppState;
pub use config::PipelineConfig;
pub use error::{AppError, Result};
