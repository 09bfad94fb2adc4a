//! Request gate.
//!
//! # Data Flow
//! ```text
//! RequestView (method, host, path, query, peer, headers)
//!     → validator.rs (host, method, restrict, exclude, forward)
//!     → conditional.rs (per-path criteria)
//!     → Verdict, plus a redirect through the RedirectSink
//! ```

pub mod conditional;
pub mod validator;

pub use validator::{validate_request, RecordedRedirect, RedirectSink, RequestView, Verdict};
