//! HTTP protocol layer module
//!
//! Content-type detection and response builders, decoupled from the handlers.

pub mod mime;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_404_response, build_405_response, build_detail_response, build_error_response,
    build_file_response, build_json_response, build_options_response, build_zip_response,
};
