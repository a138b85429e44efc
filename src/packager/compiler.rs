//! Source to bytecode compilation.
//!
//! [`PythonCompiler`] asks an external interpreter to compile a batch of files and
//! write the resulting pyc bytes to stdout, so nothing is cached beside the sources.
//! Each file comes back as one record: a status byte, a big-endian `u32` length and
//! the payload (pyc bytes on success, the exception text on failure).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::error::CompileError;

/// Turns source files into their compiled artifact bytes
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError>;

    /// One result per source, in order
    fn compile_batch(&self, sources: &[PathBuf]) -> Vec<Result<Vec<u8>, CompileError>> {
        sources.iter().map(|source| self.compile(source)).collect()
    }
}

/// Files per interpreter run, keeps the argument list well below the OS limit
const BATCH_SIZE: usize = 256;

const RECORD_OK: u8 = 0;
const RECORD_HEADER_LEN: usize = 5;

// Header layout matches what the interpreter writes into __pycache__ (timestamp based)
const COMPILE_SCRIPT: &str = r"
import os, struct, sys
from importlib._bootstrap_external import _code_to_timestamp_pyc
out = sys.stdout.buffer
for path in sys.argv[1:]:
    try:
        with open(path, 'rb') as f:
            source = f.read()
        code = compile(source, path, 'exec', dont_inherit=True)
        st = os.stat(path)
        status, data = 0, _code_to_timestamp_pyc(code, st.st_mtime, st.st_size)
    except Exception as e:
        status, data = 1, f'{type(e).__name__}: {e}'.encode('utf-8', 'replace')
    out.write(struct.pack('>BI', status, len(data)))
    out.write(data)
out.flush()
";

const SYS_PATH_SCRIPT: &str = "import json, sys; print(json.dumps(sys.path))";

/// Compiler that shells out to a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonCompiler {
    interpreter: String,
}

impl PythonCompiler {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Base invocation: no bytecode cache writes, and the working directory is not
    /// prepended to `sys.path` so served modules cannot shadow the stdlib.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-B").arg("-P").stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&OsStr]) -> Result<Vec<u8>, CompileError> {
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|source| CompileError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                status: output.status.to_string(),
                message: last_line(&output.stderr),
            });
        }
        Ok(output.stdout)
    }

    /// The interpreter's `sys.path`, restricted to existing directories
    pub fn discover_search_paths(&self) -> Result<Vec<PathBuf>, CompileError> {
        let stdout = self.run(&[OsStr::new("-c"), OsStr::new(SYS_PATH_SCRIPT)])?;
        let entries: Vec<String> = serde_json::from_slice(&stdout).map_err(|e| {
            CompileError::Failed {
                status: "invalid sys.path output".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_dir())
            .collect())
    }
}

impl Compiler for PythonCompiler {
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError> {
        self.compile_batch(&[source.to_path_buf()])
            .pop()
            .unwrap_or(Err(CompileError::EmptyOutput))
    }

    fn compile_batch(&self, sources: &[PathBuf]) -> Vec<Result<Vec<u8>, CompileError>> {
        let mut results = Vec::with_capacity(sources.len());
        for chunk in sources.chunks(BATCH_SIZE) {
            let mut args = vec![OsStr::new("-c"), OsStr::new(COMPILE_SCRIPT)];
            args.extend(chunk.iter().map(|source| source.as_os_str()));

            match self.run(&args) {
                Ok(stdout) => results.extend(parse_records(&stdout, chunk.len())),
                Err(e) => {
                    let message = e.to_string();
                    results.extend(chunk.iter().map(|_| Err(CompileError::Batch(message.clone()))));
                }
            }
        }
        results
    }
}

/// Split batch output into `expected` results. Records missing from a
/// truncated stream become errors.
fn parse_records(mut stdout: &[u8], expected: usize) -> Vec<Result<Vec<u8>, CompileError>> {
    let mut results = Vec::with_capacity(expected);
    while results.len() < expected {
        let Some((record, rest)) = next_record(stdout) else {
            break;
        };
        results.push(record);
        stdout = rest;
    }
    while results.len() < expected {
        results.push(Err(CompileError::Batch("missing output record".to_string())));
    }
    results
}

fn next_record(buf: &[u8]) -> Option<(Result<Vec<u8>, CompileError>, &[u8])> {
    if buf.len() < RECORD_HEADER_LEN {
        return None;
    }
    let (header, rest) = buf.split_at(RECORD_HEADER_LEN);
    let len = usize::try_from(u32::from_be_bytes([header[1], header[2], header[3], header[4]])).ok()?;
    if rest.len() < len {
        return None;
    }
    let (payload, rest) = rest.split_at(len);

    let record = match header[0] {
        RECORD_OK if payload.is_empty() => Err(CompileError::EmptyOutput),
        RECORD_OK => Ok(payload.to_vec()),
        _ => Err(CompileError::Rejected(
            String::from_utf8_lossy(payload).into_owned(),
        )),
    };
    Some((record, rest))
}

/// Last non-empty stderr line, which carries the exception for a failed run
fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        Command::new("python3")
            .args(["-P", "-c", "pass"])
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn record(status: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![status];
        out.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_last_line() {
        let stderr = b"Traceback (most recent call last):\n  File \"x.py\"\nSyntaxError: invalid syntax\n\n";
        assert_eq!(last_line(stderr), "SyntaxError: invalid syntax");
        assert_eq!(last_line(b""), "no diagnostic output");
    }

    #[test]
    fn test_parse_records() {
        let mut stdout = record(0, b"pyc-a");
        stdout.extend(record(1, b"SyntaxError: invalid syntax (b.py, line 1)"));
        stdout.extend(record(0, b""));

        let results = parse_records(&stdout, 3);
        assert_eq!(results[0].as_deref().unwrap(), b"pyc-a");
        assert_eq!(
            results[1].as_ref().unwrap_err().to_string(),
            "SyntaxError: invalid syntax (b.py, line 1)"
        );
        assert!(matches!(results[2], Err(CompileError::EmptyOutput)));
    }

    #[test]
    fn test_parse_truncated_records() {
        let mut stdout = record(0, b"pyc-a");
        stdout.extend(&record(0, b"pyc-b")[..7]);

        let results = parse_records(&stdout, 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CompileError::Batch(_))));
        assert!(matches!(results[2], Err(CompileError::Batch(_))));
    }

    #[test]
    fn test_missing_interpreter() {
        let compiler = PythonCompiler::new("definitely-not-a-python-binary");
        let err = compiler.compile(Path::new("whatever.py")).unwrap_err();
        assert!(matches!(err, CompileError::Batch(_)));
        assert!(err.to_string().contains("definitely-not-a-python-binary"));
    }

    #[test]
    fn test_command_does_not_prepend_working_dir() {
        let cmd = PythonCompiler::new("python3").command();
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, vec![OsStr::new("-B"), OsStr::new("-P")]);
    }

    #[test]
    fn test_python_compile_in_memory() {
        if !python_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.py");
        let bad = tmp.path().join("bad.py");
        std::fs::write(&good, "def f():\n    return 42\n").unwrap();
        std::fs::write(&bad, "def broken(:\n").unwrap();

        let compiler = PythonCompiler::new("python3");
        let first = compiler.compile(&good).unwrap();
        let second = compiler.compile(&good).unwrap();
        // 16-byte header: magic, flags, mtime, size
        assert!(first.len() > 16);
        assert_eq!(&first[2..4], b"\r\n");
        assert_eq!(first, second);
        assert!(!tmp.path().join("__pycache__").exists());

        let err = compiler.compile(&bad).unwrap_err();
        assert!(matches!(err, CompileError::Rejected(_)));
        assert!(err.to_string().starts_with("SyntaxError"));
    }

    #[test]
    fn test_python_batch_keeps_order_and_skips_failures() {
        if !python_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.py");
        let bad = tmp.path().join("bad.py");
        let c = tmp.path().join("c.py");
        std::fs::write(&a, "A = 1\n").unwrap();
        std::fs::write(&bad, "def broken(:\n").unwrap();
        std::fs::write(&c, "C = 3\n").unwrap();

        let compiler = PythonCompiler::new("python3");
        let batch = compiler.compile_batch(&[a.clone(), bad, c.clone()]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].as_ref().unwrap(), &compiler.compile(&a).unwrap());
        assert!(batch[1].is_err());
        assert_eq!(batch[2].as_ref().unwrap(), &compiler.compile(&c).unwrap());
    }

    #[test]
    fn test_working_dir_module_does_not_shadow_stdlib() {
        if !python_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("json.py"), "raise ImportError('shadowed')\n").unwrap();
        std::fs::write(tmp.path().join("struct.py"), "raise ImportError('shadowed')\n").unwrap();
        let source = tmp.path().join("mod.py");
        std::fs::write(&source, "X = 1\n").unwrap();

        let compiler = PythonCompiler::new("python3");
        let discovered = compiler
            .command()
            .current_dir(tmp.path())
            .args([OsStr::new("-c"), OsStr::new(SYS_PATH_SCRIPT)])
            .output()
            .unwrap();
        assert!(discovered.status.success());

        let compiled = compiler
            .command()
            .current_dir(tmp.path())
            .args([OsStr::new("-c"), OsStr::new(COMPILE_SCRIPT), source.as_os_str()])
            .output()
            .unwrap();
        assert!(compiled.status.success());
        assert!(parse_records(&compiled.stdout, 1)[0].is_ok());
    }

    #[test]
    fn test_discover_search_paths() {
        if !python_available() {
            return;
        }
        let paths = PythonCompiler::new("python3").discover_search_paths().unwrap();
        assert!(paths.iter().all(|p| p.is_dir()));
    }
}
