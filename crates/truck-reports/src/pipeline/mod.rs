pub mod config;
pub mod report;
pub mod runner;

pub use config::PipelineConfig;
pub use report::{RunReport, StoredAttachment};
pub use runner::IngestPipeline;
