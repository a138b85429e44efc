// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub site: SiteConfig,
    pub packager: PackagerConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Static site configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// File served for `GET /`, relative to the working directory
    pub index_file: String,
}

/// Module packager configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PackagerConfig {
    /// Interpreter used to compile sources and to discover `sys.path`
    pub interpreter: String,
    pub source_suffix: String,
    pub artifact_suffix: String,
    /// Directories searched for modules, in order
    pub search_paths: Vec<String>,
    /// Append the interpreter's own `sys.path` to `search_paths` at startup
    pub use_interpreter_path: bool,
    /// Modules that resolve but have no location on disk
    pub builtin_modules: Vec<String>,
    /// Explicit module name to path mappings, checked before the search paths
    #[serde(default)]
    pub modules: HashMap<String, String>,
}
