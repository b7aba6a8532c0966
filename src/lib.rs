pub mod cache;
pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod object_store;
pub mod pipeline;

pub use config::AppConfig;
pub use pipeline::{Coordinator, PipelineError};
