//! Collaborator implementations: an in-process backend for demos and tests, and an HTTP client
//! for the remote drawback service.

pub mod http;
pub mod ledger;
pub mod offline;
pub mod scanner;

pub use http::HttpBackend;
pub use offline::OfflineBackend;
