pub mod config;
pub mod errors;

pub use config::{AgentConfig, AppConfig, DatabaseConfig, PipelineConfig};
pub use errors::{CascadeError, CascadeResult, ExtractionError};
