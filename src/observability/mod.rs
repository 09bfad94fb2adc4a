//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config store, watcher, validator produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//! ```

pub mod logging;
pub mod metrics;
