pub mod schema;

pub use schema::{
    default_config_path, AgentConfig, Config, EmbeddingConfig, LlmConfig, LoggingConfig,
    NostrConfig, SchedulerConfig, ThresholdsConfig, WalletConfig, APP_DIR_NAME,
};
