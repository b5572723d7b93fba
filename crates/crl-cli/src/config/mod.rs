//! Application configuration module.
//!
//! Manages the TOML config file holding the API root, endpoints,
//! default headers and cache settings.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{API_ROOT_ENV, AppConfig};
pub use paths::resolve_config_path;
