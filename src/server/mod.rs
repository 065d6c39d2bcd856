//! Loopback HTTP server wrapping the completion service.

mod http;

pub use http::{router, serve};
