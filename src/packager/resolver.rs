//! Module resolution.
//!
//! Maps a dotted module name to a package directory or a single source file.
//! [`SearchPathResolver`] follows the interpreter's path-finder order: for every
//! search path a regular package wins over a module file, and a bare directory is
//! only used as a namespace package once no search path produced either.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::error::ResolveError;
use crate::config::PackagerConfig;

/// Where a module lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    /// A directory of source files
    Package { dir: PathBuf },
    /// A single source file
    Module { file: PathBuf },
}

impl ResolvedModule {
    /// Directory that is walked and names the top-level folder of the archive.
    /// For a single-file module this is the directory containing the file.
    pub fn module_dir(&self) -> &Path {
        match self {
            Self::Package { dir } => dir,
            Self::Module { file } => file.parent().unwrap_or(file),
        }
    }

    /// Archive entry names are relative to this directory, so they keep
    /// `module_dir`'s own name as their first component.
    pub fn base_dir(&self) -> &Path {
        let module_dir = self.module_dir();
        module_dir.parent().unwrap_or(module_dir)
    }
}

/// Name to location lookup used by the packager
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<ResolvedModule, ResolveError>;
}

/// Resolver backed by explicit mappings, a builtin list and ordered search paths
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    search_paths: Vec<PathBuf>,
    mappings: HashMap<String, PathBuf>,
    builtins: HashSet<String>,
    source_suffix: String,
}

enum Lookup {
    Found(ResolvedModule),
    Namespace(PathBuf),
    Missing,
}

impl SearchPathResolver {
    pub fn new(search_paths: Vec<PathBuf>, source_suffix: impl Into<String>) -> Self {
        Self {
            search_paths,
            mappings: HashMap::new(),
            builtins: HashSet::new(),
            source_suffix: source_suffix.into(),
        }
    }

    /// Build from configuration; `extra_paths` are appended after the configured ones
    pub fn from_config(cfg: &PackagerConfig, extra_paths: Vec<PathBuf>) -> Self {
        let mut search_paths: Vec<PathBuf> = cfg.search_paths.iter().map(PathBuf::from).collect();
        for path in extra_paths {
            if !search_paths.contains(&path) {
                search_paths.push(path);
            }
        }

        let mut resolver = Self::new(search_paths, cfg.source_suffix.clone())
            .with_builtins(cfg.builtin_modules.iter().cloned());
        for (name, path) in &cfg.modules {
            resolver = resolver.with_mapping(name.clone(), path);
        }
        resolver
    }

    #[must_use]
    pub fn with_mapping(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.mappings.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn with_builtins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtins.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn resolve_mapping(name: &str, path: &Path) -> Result<ResolvedModule, ResolveError> {
        let undeterminable = || ResolveError::Undeterminable(name.to_string());
        let path = path.canonicalize().map_err(|_| undeterminable())?;
        if path.is_dir() {
            Ok(ResolvedModule::Package { dir: path })
        } else if path.is_file() {
            Ok(ResolvedModule::Module { file: path })
        } else {
            Err(undeterminable())
        }
    }

    fn lookup_in(&self, search_path: &Path, parts: &[&str]) -> Lookup {
        let candidate: PathBuf = parts.iter().fold(search_path.to_path_buf(), |p, c| p.join(c));

        let init_file = candidate.join(format!("__init__{}", self.source_suffix));
        if init_file.is_file() {
            return Lookup::Found(ResolvedModule::Package { dir: candidate });
        }

        let mut module_file = candidate.clone().into_os_string();
        module_file.push(&self.source_suffix);
        let module_file = PathBuf::from(module_file);
        if module_file.is_file() {
            return Lookup::Found(ResolvedModule::Module { file: module_file });
        }

        if candidate.is_dir() {
            Lookup::Namespace(candidate)
        } else {
            Lookup::Missing
        }
    }
}

impl ModuleResolver for SearchPathResolver {
    fn resolve(&self, name: &str) -> Result<ResolvedModule, ResolveError> {
        let parts = split_module_name(name)
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))?;

        if let Some(path) = self.mappings.get(name) {
            return Self::resolve_mapping(name, path);
        }

        if self.builtins.contains(name) {
            return Err(ResolveError::Undeterminable(name.to_string()));
        }

        let mut namespace = None;
        for search_path in &self.search_paths {
            match self.lookup_in(search_path, &parts) {
                Lookup::Found(found) => return Ok(canonical(found)),
                Lookup::Namespace(dir) => {
                    namespace.get_or_insert(dir);
                }
                Lookup::Missing => {}
            }
        }

        namespace
            .map(|dir| canonical(ResolvedModule::Package { dir }))
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}

/// Absolute paths keep `base_dir` meaningful for relative search paths like "."
fn canonical(module: ResolvedModule) -> ResolvedModule {
    match module {
        ResolvedModule::Package { dir } => ResolvedModule::Package {
            dir: dir.canonicalize().unwrap_or(dir),
        },
        ResolvedModule::Module { file } => ResolvedModule::Module {
            file: file.canonicalize().unwrap_or(file),
        },
    }
}

/// Split a dotted name into identifier components, rejecting anything else
fn split_module_name(name: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = name.split('.').collect();
    parts.iter().all(|p| is_identifier(p)).then_some(parts)
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
