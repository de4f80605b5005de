pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, parse_since_date, validate_config};
pub use schema::{
    FailurePolicy, ImapConfig, IngestConfig, LogFormat, LoggingConfig, PipelineSettings,
    StorageConfig,
};
