//! Hot-reloading site configuration and request gate.
//!
//! # Architecture Overview
//!
//! ```text
//!   appdata/.cfg/.all ──▶ config::watcher ──▶ config::store (ArcSwap snapshot)
//!          ▲                                        │
//!          │                                        ▼
//!   config::writer ◀── config::banner      security::validator ◀── http middleware
//! ```
//!
//! The store owns the published snapshot. The watcher polls the file and
//! reparses only when its digest changes. The validator answers requests from
//! whatever snapshot is current.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::{ConfigError, ConfigSnapshot, ConfigStore, ConfigWatcher, EngineSettings};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{RecordedRedirect, RequestView, Verdict};
