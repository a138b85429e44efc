//! Module packager
//!
//! Resolves a module name to a location on disk, compiles its sources and
//! bundles the compiled artifacts into a zip archive held in memory.

pub mod archive;
pub mod compiler;
pub mod error;
pub mod resolver;

// Re-export main types
pub use archive::{build_archive, PackageReport, Suffixes};
pub use compiler::{Compiler, PythonCompiler};
pub use error::{CompileError, PackageError, ResolveError};
pub use resolver::{ModuleResolver, ResolvedModule, SearchPathResolver};
