//! HTTP response building module
//!
//! Builders for every response the server sends. None of them panic: a builder
//! failure is logged and an empty response is returned instead.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};
use serde_json::json;

/// Finish a builder, falling back to an empty response on failure
fn finish(builder: Builder, body: Bytes, label: &str) -> Response<Full<Bytes>> {
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(label, &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// HEAD requests get headers only
fn body_for(data: Bytes, is_head: bool) -> Bytes {
    if is_head {
        Bytes::new()
    } else {
        data
    }
}

/// Build JSON response
pub fn build_json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    let body = value.to_string();
    let builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", body.len());
    finish(builder, Bytes::from(body), status.as_str())
}

/// Build `{"detail": ...}` error response
pub fn build_detail_response(status: StatusCode, detail: &str) -> Response<Full<Bytes>> {
    build_json_response(status, &json!({ "detail": detail }))
}

/// Build `{"error": ...}` error response
pub fn build_error_response(status: StatusCode, error: &str) -> Response<Full<Bytes>> {
    build_json_response(status, &json!({ "error": error }))
}

/// Build 404 Not Found response for unknown paths
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_detail_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .header("Allow", "GET, HEAD, OPTIONS");
    finish(
        builder,
        Bytes::from(json!({ "detail": "Method Not Allowed" }).to_string()),
        "405",
    )
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, HEAD, OPTIONS");
    finish(builder, Bytes::new(), "OPTIONS")
}

/// Build 200 response carrying a file's exact bytes
pub fn build_file_response(data: Vec<u8>, content_type: &str, is_head: bool) -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", data.len());
    finish(builder, body_for(Bytes::from(data), is_head), "200")
}

/// Build 200 zip download response with `Content-Disposition: attachment`
pub fn build_zip_response(module: &str, archive: Vec<u8>, is_head: bool) -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/zip")
        .header(
            "Content-Disposition",
            format!("attachment; filename={module}.zip"),
        )
        .header("Content-Length", archive.len());
    finish(builder, body_for(Bytes::from(archive), is_head), "zip")
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
