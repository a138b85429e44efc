//! Archive building.
//!
//! Walks a resolved module's directory (the containing directory for a single-file
//! module), compiles every source file in one batch and writes the compiled bytes
//! into an in-memory zip. Entry names are relative to the module's base directory,
//! so the module's own directory name is always the first component.
//!
//! Per-file compile failures are logged and skipped; the archive is still produced.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::compiler::Compiler;
use super::error::PackageError;
use super::resolver::ResolvedModule;
use crate::config::PackagerConfig;
use crate::logger;

/// Source and compiled-artifact file name suffixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suffixes {
    pub source: String,
    pub artifact: String,
}

impl Suffixes {
    pub fn from_config(cfg: &PackagerConfig) -> Self {
        Self {
            source: cfg.source_suffix.clone(),
            artifact: cfg.artifact_suffix.clone(),
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            source: ".py".to_string(),
            artifact: ".pyc".to_string(),
        }
    }
}

/// Finished archive plus the counts reported to the server log
#[derive(Debug)]
pub struct PackageReport {
    pub archive: Vec<u8>,
    pub compiled: usize,
    pub skipped: usize,
}

/// Build the zip archive for `module`
pub fn build_archive(
    module: &ResolvedModule,
    compiler: &dyn Compiler,
    suffixes: &Suffixes,
) -> Result<PackageReport, PackageError> {
    let base_dir = module.base_dir();

    // Fixed timestamp keeps repeated builds byte-identical
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut skipped = 0;
    let mut sources = Vec::new();
    let mut entry_names = Vec::new();
    for source in collect_sources(module, &suffixes.source) {
        if let Some(name) = entry_name(&source, base_dir, suffixes) {
            sources.push(source);
            entry_names.push(name);
        } else {
            logger::log_warning(&format!(
                "Skipping {}: outside of {}",
                source.display(),
                base_dir.display()
            ));
            skipped += 1;
        }
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut compiled = 0;

    let results = compiler.compile_batch(&sources);
    for ((source, entry_name), result) in sources.iter().zip(&entry_names).zip(results) {
        match result {
            Ok(bytes) => {
                zip.start_file(entry_name.as_str(), options)?;
                zip.write_all(&bytes)?;
                logger::log_debug(&format!("Compiled {} -> {entry_name}", source.display()));
                compiled += 1;
            }
            Err(e) => {
                logger::log_compile_failure(source, &e);
                skipped += 1;
            }
        }
    }

    let archive = zip.finish()?.into_inner();
    Ok(PackageReport {
        archive,
        compiled,
        skipped,
    })
}

/// Every source file under the module directory, in sorted walk order
fn collect_sources(module: &ResolvedModule, source_suffix: &str) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    walk_dir(module.module_dir(), source_suffix, &mut sources);
    sources
}

/// Top-down walk: a directory's files come before its subdirectories.
/// Symlinked directories are listed but not descended into.
fn walk_dir(dir: &Path, source_suffix: &str, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warning(&format!("Cannot read directory {}: {e}", dir.display()));
            return;
        }
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(path);
        } else if path.is_file() && has_suffix(&path, source_suffix) {
            out.push(path);
        }
    }

    for subdir in subdirs {
        walk_dir(&subdir, source_suffix, out);
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

/// Relative `/`-separated entry name with the source suffix swapped for the artifact one
fn entry_name(source: &Path, base_dir: &Path, suffixes: &Suffixes) -> Option<String> {
    let relative = source.strip_prefix(base_dir).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return None,
        }
    }

    let joined = parts.join("/");
    let stem = joined.strip_suffix(suffixes.source.as_str())?;
    Some(format!("{stem}{}", suffixes.artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::error::CompileError;
    use std::io::Read;

    /// Prefixes the source with a marker; fails on sources containing "SYNTAX ERROR"
    struct MarkerCompiler;

    impl Compiler for MarkerCompiler {
        fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError> {
            let text = fs::read_to_string(source)?;
            if text.contains("SYNTAX ERROR") {
                return Err(CompileError::Failed {
                    status: "exit status: 1".to_string(),
                    message: "SyntaxError: invalid syntax".to_string(),
                });
            }
            Ok(format!("compiled:{text}").into_bytes())
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    fn package(root: &Path) -> ResolvedModule {
        ResolvedModule::Package {
            dir: root.canonicalize().unwrap(),
        }
    }

    #[test]
    fn test_package_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("mypkg");
        write(&pkg.join("__init__.py"), "");
        write(&pkg.join("core.py"), "x = 1");
        write(&pkg.join("sub/__init__.py"), "");
        write(&pkg.join("sub/deep/leaf.py"), "y = 2");
        write(&pkg.join("README.md"), "not source");
        write(&pkg.join("data.pyx"), "not source either");

        let report = build_archive(&package(&pkg), &MarkerCompiler, &Suffixes::default()).unwrap();
        assert_eq!(report.compiled, 4);
        assert_eq!(report.skipped, 0);

        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "mypkg/__init__.pyc",
                "mypkg/core.pyc",
                "mypkg/sub/__init__.pyc",
                "mypkg/sub/deep/leaf.pyc",
            ]
        );
    }

    #[test]
    fn test_entry_contents_are_compiled_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("mypkg");
        write(&pkg.join("core.py"), "x = 1");

        let report = build_archive(&package(&pkg), &MarkerCompiler, &Suffixes::default()).unwrap();
        let files = entries(&report.archive);
        assert_eq!(files[0].1, b"compiled:x = 1");
    }

    #[test]
    fn test_failed_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("mixed");
        write(&pkg.join("a.py"), "a = 1");
        write(&pkg.join("broken.py"), "SYNTAX ERROR");
        write(&pkg.join("c.py"), "c = 3");

        let report = build_archive(&package(&pkg), &MarkerCompiler, &Suffixes::default()).unwrap();
        assert_eq!(report.compiled, 2);
        assert_eq!(report.skipped, 1);

        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["mixed/a.pyc", "mixed/c.pyc"]);
        assert!(!names.iter().any(|n| n.contains("broken")));
    }

    #[test]
    fn test_single_module_uses_parent_dir_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = tmp.path().join("site");
        write(&lib.join("single.py"), "z = 1");

        let module = ResolvedModule::Module {
            file: lib.join("single.py").canonicalize().unwrap(),
        };
        let report = build_archive(&module, &MarkerCompiler, &Suffixes::default()).unwrap();
        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["site/single.pyc"]);
    }

    #[test]
    fn test_single_module_walks_containing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = tmp.path().join("site");
        write(&lib.join("single.py"), "z = 1");
        write(&lib.join("neighbour.py"), "n = 1");
        write(&lib.join("sub/inner.py"), "i = 1");

        let module = ResolvedModule::Module {
            file: lib.join("single.py").canonicalize().unwrap(),
        };
        let report = build_archive(&module, &MarkerCompiler, &Suffixes::default()).unwrap();
        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["site/neighbour.pyc", "site/single.pyc", "site/sub/inner.pyc"]
        );
    }

    /// Records how the build called it; only batch calls are allowed
    struct BatchOnlyCompiler {
        batches: std::sync::Mutex<Vec<usize>>,
    }

    impl Compiler for BatchOnlyCompiler {
        fn compile(&self, _source: &Path) -> Result<Vec<u8>, CompileError> {
            panic!("per-file compile should not be used by the archive builder");
        }

        fn compile_batch(&self, sources: &[PathBuf]) -> Vec<Result<Vec<u8>, CompileError>> {
            self.batches.lock().unwrap().push(sources.len());
            sources
                .iter()
                .map(|s| {
                    if s.ends_with("bad.py") {
                        Err(CompileError::Rejected("SyntaxError: invalid syntax".to_string()))
                    } else {
                        Ok(b"pyc".to_vec())
                    }
                })
                .collect()
        }
    }

    #[test]
    fn test_sources_compiled_in_one_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("many");
        write(&pkg.join("a.py"), "");
        write(&pkg.join("bad.py"), "");
        write(&pkg.join("sub/c.py"), "");

        let compiler = BatchOnlyCompiler {
            batches: std::sync::Mutex::new(Vec::new()),
        };
        let report = build_archive(&package(&pkg), &compiler, &Suffixes::default()).unwrap();
        assert_eq!(*compiler.batches.lock().unwrap(), vec![3]);
        assert_eq!(report.compiled, 2);
        assert_eq!(report.skipped, 1);

        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["many/a.pyc", "many/sub/c.pyc"]);
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("stable");
        write(&pkg.join("__init__.py"), "");
        write(&pkg.join("m.py"), "value = 'same'");

        let module = package(&pkg);
        let first = build_archive(&module, &MarkerCompiler, &Suffixes::default()).unwrap();
        let second = build_archive(&module, &MarkerCompiler, &Suffixes::default()).unwrap();
        assert_eq!(first.archive, second.archive);
    }

    #[test]
    fn test_empty_package_gives_empty_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("empty");
        fs::create_dir_all(&pkg).unwrap();

        let report = build_archive(&package(&pkg), &MarkerCompiler, &Suffixes::default()).unwrap();
        assert_eq!(report.compiled, 0);
        assert!(entries(&report.archive).is_empty());
    }

    #[test]
    fn test_custom_suffixes() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("alt");
        write(&pkg.join("main.src"), "x");
        write(&pkg.join("ignored.py"), "y");

        let suffixes = Suffixes {
            source: ".src".to_string(),
            artifact: ".bin".to_string(),
        };
        let report = build_archive(&package(&pkg), &MarkerCompiler, &suffixes).unwrap();
        let names: Vec<String> = entries(&report.archive).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alt/main.bin"]);
    }

    #[test]
    fn test_entry_name() {
        let suffixes = Suffixes::default();
        assert_eq!(
            entry_name(Path::new("/x/pkg/a/b.py"), Path::new("/x"), &suffixes).as_deref(),
            Some("pkg/a/b.pyc")
        );
        assert_eq!(
            entry_name(Path::new("/y/pkg/b.py"), Path::new("/x"), &suffixes),
            None
        );
    }
}
