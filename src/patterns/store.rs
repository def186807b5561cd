//! Pattern store port.
//!
//! The dashboard's relational layer owns the pattern rows; this module only
//! defines the narrow surface the cache reads through, plus two in-process
//! adapters used by tests and the CLI.

use futures::future::BoxFuture;

use crate::error::Result;

/// Row tag for blocking phrases.
pub const DANGEROUS_TEXT: &str = "dangerous_text";
/// Row tag for record-only phrases.
pub const QUICK_TEXT: &str = "quick_text";
/// Row tag for sensitive-filename regexes.
pub const SENSITIVE_FILE_REGEX: &str = "sensitive_file_regex";
/// Row tag for malicious file extensions.
pub const MALICIOUS_EXTENSION: &str = "malicious_extension";

/// A raw pattern row as stored by the persistence layer.
///
/// `pattern_data` is a JSON-encoded payload; for every current row type it
/// is a JSON string (e.g. `"ignore previous instructions"`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatternRow {
    /// Row classification tag (`dangerous_text`, `quick_text`,
    /// `sensitive_file_regex`, `malicious_extension`).
    pub pattern_type: String,
    /// JSON-encoded pattern payload.
    pub pattern_data: String,
    /// Inactive rows are ignored by consumers.
    pub is_active: bool,
}

impl PatternRow {
    /// Convenience constructor for an active row with a string payload.
    pub fn active(pattern_type: &str, pattern: &str) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            pattern_data: serde_json::to_string(pattern).unwrap_or_default(),
            is_active: true,
        }
    }
}

/// Read-side port over the pattern persistence layer.
pub trait PatternStore: Send + Sync {
    /// Load all active pattern rows.
    fn load_active(&self) -> BoxFuture<'_, Result<Vec<PatternRow>>>;
}

/// In-memory pattern store backed by a fixed row list.
#[derive(Debug, Clone, Default)]
pub struct StaticPatternStore {
    rows: Vec<PatternRow>,
}

impl StaticPatternStore {
    /// Create a store serving the given rows.
    pub fn new(rows: Vec<PatternRow>) -> Self {
        Self { rows }
    }
}

impl PatternStore for StaticPatternStore {
    fn load_active(&self) -> BoxFuture<'_, Result<Vec<PatternRow>>> {
        Box::pin(async move {
            Ok(self
                .rows
                .iter()
                .filter(|row| row.is_active)
                .cloned()
                .collect())
        })
    }
}

/// Pattern store that always reports zero rows.
///
/// Used when no persistence layer is wired in; the cache falls back to the
/// built-in defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPatternStore;

impl PatternStore for NullPatternStore {
    fn load_active(&self) -> BoxFuture<'_, Result<Vec<PatternRow>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}
