//! HTTP server that hands out compiled Python modules.
//!
//! `GET /` serves the local index page; `GET /<module>.zip` resolves the module,
//! compiles its sources to bytecode and returns the compiled files as a zip.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod packager;
pub mod server;
