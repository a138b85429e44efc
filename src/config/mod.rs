// Configuration module entry point
// Layered configuration (defaults, config file, environment) and shared runtime state

mod state;
mod types;

use config::builder::DefaultState;
use config::ConfigBuilder;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, LoggingConfig, PackagerConfig, PerformanceConfig, ServerConfig, SiteConfig,
};

/// Modules compiled into the interpreter itself; they import fine but have no file
const DEFAULT_BUILTIN_MODULES: &[&str] = &[
    "sys",
    "builtins",
    "marshal",
    "_imp",
    "_thread",
    "_io",
    "_warnings",
    "_weakref",
    "gc",
    "time",
];

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::with_defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("PYC_SERVER").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only, ignoring config files and the environment
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::with_defaults()?.build()?.try_deserialize()
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("site.index_file", "index.html")?
            .set_default("packager.interpreter", "python3")?
            .set_default("packager.source_suffix", ".py")?
            .set_default("packager.artifact_suffix", ".pyc")?
            .set_default("packager.search_paths", vec!["."])?
            .set_default("packager.use_interpreter_path", true)?
            .set_default("packager.builtin_modules", DEFAULT_BUILTIN_MODULES.to_vec())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
