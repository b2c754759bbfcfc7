// Configuration management module
// TOML settings for Ollama, chunking, retrieval and the front-ends

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestConfig, LlmConfig, OllamaConfig, RetrievalConfig, StoreConfig,
    WebConfig,
};

/// Get the default data directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
