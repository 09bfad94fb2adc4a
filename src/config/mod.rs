//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! appdata/.cfg/.all (plain text, hand edited)
//!     → lines.rs (tabs, trimming, backslash continuation)
//!     → parser.rs (sections, keys, typed values)
//!     → ConfigSnapshot (immutable once published)
//!     → store.rs (ArcSwap, shared with the request path)
//!
//! On each watch cycle:
//!     watcher.rs reads the file
//!     → loader.rs digests it (SHA-256, twice)
//!     → unchanged digest: nothing happens
//!     → changed digest: reparse, swap snapshot, arm banner.rs if timed
//!
//! Writes:
//!     writer.rs edits one value, swaps the file, store reloads
//! ```
//!
//! # Design Decisions
//! - Unrecognized lines are ignored; bad values degrade instead of failing
//! - The snapshot is replaced whole, never patched while readers hold it

pub mod banner;
pub mod jsonc;
pub mod lines;
pub mod loader;
pub mod parser;
pub mod schema;
pub mod store;
pub mod template;
pub mod watcher;
pub mod writer;

pub use loader::ConfigError;
pub use schema::{ConditionalHttpService, ConfigSnapshot, EngineSettings, ForwardPath, RuleType};
pub use store::{ConfigStore, ReloadOutcome};
pub use watcher::ConfigWatcher;
