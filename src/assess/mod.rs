//! Risk assessment: verdict types and the orchestrating engine.
//!
//! Two pipelines share [`RiskEngine`]:
//!
//! - the **prompt pipeline** merges static phrase hits, semantic analysis,
//!   and PII extraction;
//! - the **file pipeline** runs upload validation first (a rejection is
//!   terminal), then filename heuristics, content scanning, and the
//!   malware-scan fallback chain.
//!
//! One invariant holds across both: a verdict with any finding at or above
//! high severity always carries `should_block == true`, regardless of what
//! the individual detectors concluded.

mod engine;
mod types;

pub use engine::RiskEngine;
pub use types::{
    summarize_pii, AnalysisLog, FileAssessment, LogEntry, LogLevel, PiiSummary, PromptAssessment,
    RiskLevel, Severity, ThreatFinding, ThreatSource,
};
