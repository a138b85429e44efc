//! Request handler module
//!
//! Responsible for request routing dispatch and the two endpoints:
//! the static index page and the compiled module archive.

pub mod package;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
