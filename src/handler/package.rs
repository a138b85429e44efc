//! Module packaging handler
//!
//! Resolves the requested module and streams back its compiled archive.
//! This is the only place packager errors become HTTP statuses.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http;
use crate::logger;
use crate::packager::{build_archive, PackageError, PackageReport, Suffixes};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// Module name from a `/<name>.zip` path, if the path has that shape
pub fn module_name_from_path(path: &str) -> Option<&str> {
    let segment = path.strip_prefix('/')?;
    if segment.contains('/') {
        return None;
    }
    segment.strip_suffix(".zip").filter(|name| !name.is_empty())
}

/// Serve `/<name>.zip`
pub async fn serve_package(
    ctx: &RequestContext<'_>,
    name: &str,
    state: &Arc<AppState>,
) -> Response<Full<Bytes>> {
    let module = match state.resolver.resolve(name) {
        Ok(module) => module,
        Err(e) => {
            logger::log_module_rejected(name, &e);
            return http::build_detail_response(StatusCode::NOT_FOUND, &e.to_string());
        }
    };

    let compiler = Arc::clone(&state.compiler);
    let suffixes = Suffixes::from_config(&state.config.packager);

    // Walking and compiling block on the filesystem and child processes
    let build = tokio::task::spawn_blocking(move || {
        build_archive(&module, compiler.as_ref(), &suffixes)
    })
    .await
    .map_err(|e| PackageError::Task(e.to_string()))
    .and_then(|result| result);

    match build {
        Ok(PackageReport {
            archive,
            compiled,
            skipped,
        }) => {
            logger::log_package_built(name, compiled, skipped, archive.len());
            http::build_zip_response(name, archive, ctx.is_head)
        }
        Err(e) => {
            logger::log_error(&format!("Failed to build archive for '{name}': {e}"));
            http::build_detail_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to build archive for module '{name}'"),
            )
        }
    }
}
