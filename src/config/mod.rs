//! Configuration: TOML file, `APP__` environment overrides, validation

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_str};
pub use types::{AppConfig, AppSettings, EngineSettings, PaperConfig, PolicyConfig, StrategyConfig};
