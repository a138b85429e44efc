// Application state module
// Shared, read-only state handed to every request

use std::path::PathBuf;
use std::sync::Arc;

use super::types::Config;
use crate::logger;
use crate::packager::{Compiler, ModuleResolver, PythonCompiler, SearchPathResolver};

/// Application state
pub struct AppState {
    pub config: Config,
    pub resolver: Arc<dyn ModuleResolver>,
    pub compiler: Arc<dyn Compiler>,
}

impl AppState {
    /// Create `AppState` with the interpreter-backed compiler and resolver.
    /// When enabled, the interpreter's `sys.path` is appended to the search paths.
    pub fn new(config: &Config) -> Self {
        let compiler = PythonCompiler::new(config.packager.interpreter.clone());
        let extra_paths = if config.packager.use_interpreter_path {
            discover_paths(&compiler)
        } else {
            Vec::new()
        };

        let resolver = SearchPathResolver::from_config(&config.packager, extra_paths);
        logger::log_search_paths(resolver.search_paths());

        Self::with_components(config.clone(), Arc::new(resolver), Arc::new(compiler))
    }

    /// Create `AppState` from explicit components
    pub fn with_components(
        config: Config,
        resolver: Arc<dyn ModuleResolver>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Self {
            config,
            resolver,
            compiler,
        }
    }
}

fn discover_paths(compiler: &PythonCompiler) -> Vec<PathBuf> {
    match compiler.discover_search_paths() {
        Ok(paths) => paths,
        Err(e) => {
            logger::log_warning(&format!(
                "Could not read sys.path from '{}': {e}. Using configured search paths only",
                compiler.interpreter()
            ));
            Vec::new()
        }
    }
}
