//! I/O layer - HTTP API and metrics exposition
//!
//! - `api` - JSON response envelope
//! - `http` - hyper server and request routing
//! - `prometheus` - Prometheus text format

pub mod api;
pub mod http;
pub mod prometheus;

pub use http::{handle_request, start_http_server, AppState};
