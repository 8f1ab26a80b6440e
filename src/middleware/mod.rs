//! HTTP middleware for the vault API.

pub mod logging;

pub use logging::request_logging;
