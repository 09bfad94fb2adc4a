//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, request IDs, tracing)
//!     → middleware/validation.rs (blocked IPs, maintenance, validator)
//!     → ServeDir over <root>/wwwroot
//! ```

pub mod middleware;
pub mod server;

pub use server::HttpServer;
