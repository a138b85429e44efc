//! Static file serving module
//!
//! Serves the configured index file for the site root.

use crate::handler::router::RequestContext;
use crate::http::{self, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Serve the index file, or a JSON error naming it when it is missing.
///
/// A missing file answers 404 so it matches the other JSON error responses.
pub async fn serve_index(ctx: &RequestContext<'_>, index_file: &str) -> Response<Full<Bytes>> {
    let path = Path::new(index_file);
    let display_name = path
        .file_name()
        .map_or_else(|| index_file.to_string(), |n| n.to_string_lossy().into_owned());

    match fs::read(path).await {
        Ok(content) => {
            let content_type = mime::content_type_for(path);
            http::build_file_response(content, content_type, ctx.is_head)
        }
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
            http::build_error_response(StatusCode::NOT_FOUND, &format!("{display_name} not found"))
        }
        Err(e) => {
            logger::log_error(&format!("Failed to read '{index_file}': {e}"));
            http::build_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("{display_name} could not be read"),
            )
        }
    }
}
