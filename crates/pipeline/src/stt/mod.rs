//! Speech-to-text backends

pub mod http_backend;

pub use http_backend::{HttpSttBackend, HttpSttConfig};
