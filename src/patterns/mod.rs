//! Detection pattern storage, caching, and matching.
//!
//! Layering, leaves first:
//!
//! 1. [`store`] — the read-side port over the persistence layer's raw
//!    pattern rows.
//! 2. [`cache`] — TTL-cached [`DetectionPatternSet`] snapshots with
//!    built-in default fallback.
//! 3. [`matcher`] — pure substring/regex matching over a snapshot.
//!
//! The built-in tables in [`defaults`] guarantee a scan never runs against
//! an empty pattern set, no matter what the store returns.

pub mod cache;
pub mod defaults;
pub mod matcher;
pub mod store;

pub use cache::{DetectionPatternCache, DetectionPatternSet};
pub use store::{NullPatternStore, PatternRow, PatternStore, StaticPatternStore};
