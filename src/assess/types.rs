//! Verdict and finding types shared by both analysis pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pii::{PiiKind, PiiMatch};

/// Overall risk classification, totally ordered `safe < low < medium < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No risk indicators.
    Safe,
    /// Minor indicators.
    Low,
    /// Material indicators.
    Medium,
    /// Strong indicators.
    High,
}

impl RiskLevel {
    /// Wire form of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Parse a wire label, defaulting to `Safe` on anything unrecognized.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" | "moderate" => RiskLevel::Medium,
            "high" | "critical" => RiskLevel::High,
            _ => RiskLevel::Safe,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finding severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Low,
    /// Worth recording.
    Medium,
    /// Blocks on its own.
    High,
    /// Unambiguously hostile.
    Critical,
}

/// Which detector produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatSource {
    /// Static phrase table hit.
    StaticPattern,
    /// PII regex or semantic extraction.
    Pii,
    /// Sensitive filename heuristic.
    SensitiveFilename,
    /// Malicious extension table.
    MaliciousExtension,
    /// LLM-backed semantic analysis.
    LlmSemantic,
    /// Malware-scan API.
    MalwareScan,
}

/// One detector finding feeding the merged verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatFinding {
    /// Producing detector.
    pub source: ThreatSource,
    /// Human-readable description.
    pub description: String,
    /// Severity of this finding alone.
    pub severity: Severity,
}

impl ThreatFinding {
    /// Create a finding.
    pub fn new(source: ThreatSource, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            source,
            description: description.into(),
            severity,
        }
    }
}

/// Aggregated PII verdict attached to every assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiSummary {
    /// Whether any PII was found.
    #[serde(rename = "hasPII")]
    pub has_pii: bool,
    /// Distinct kinds found, in first-seen order.
    pub types: Vec<String>,
    /// Total distinct detections.
    pub count: usize,
    /// Risk implied by the most sensitive kind found.
    pub risk_level: RiskLevel,
}

impl PiiSummary {
    /// Summary for a clean scan.
    pub fn empty() -> Self {
        Self {
            has_pii: false,
            types: Vec::new(),
            count: 0,
            risk_level: RiskLevel::Safe,
        }
    }
}

/// Risk implied by one PII kind.
fn kind_risk(kind: PiiKind) -> RiskLevel {
    match kind {
        PiiKind::Ssn | PiiKind::CreditCard | PiiKind::Jwt | PiiKind::ApiKey => RiskLevel::High,
        PiiKind::Email | PiiKind::Phone => RiskLevel::Medium,
        PiiKind::Ip | PiiKind::Mac | PiiKind::Base64Blob => RiskLevel::Low,
    }
}

/// Fold deduplicated matches into a [`PiiSummary`].
pub fn summarize_pii(matches: &[PiiMatch]) -> PiiSummary {
    if matches.is_empty() {
        return PiiSummary::empty();
    }

    let mut types = Vec::new();
    let mut risk = RiskLevel::Safe;
    for m in matches {
        let label = m.kind.label().to_string();
        if !types.contains(&label) {
            types.push(label);
        }
        risk = risk.max(kind_risk(m.kind));
    }

    PiiSummary {
        has_pii: true,
        types,
        count: matches.len(),
        risk_level: risk,
    }
}

/// Log line severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Degraded behavior.
    Warn,
    /// Failure.
    Error,
}

/// One structured log record returned with an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Record severity.
    pub level: LogLevel,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// Message text.
    pub message: String,
    /// Optional structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Per-assessment log accumulator.
#[derive(Debug, Default)]
pub struct AnalysisLog {
    entries: Vec<LogEntry>,
}

impl AnalysisLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        context: Option<serde_json::Value>,
    ) {
        self.entries.push(LogEntry {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            context,
        });
    }

    /// Append an info record.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message, None);
    }

    /// Append a warn record.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message, None);
    }

    /// Consume the accumulator.
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

/// Merged verdict for a submitted prompt.
#[derive(Debug, Clone)]
pub struct PromptAssessment {
    /// Whether any detector flagged a threat.
    pub is_threats: bool,
    /// Threat descriptions from every detector.
    pub threats: Vec<String>,
    /// Combined risk.
    pub risk_level: RiskLevel,
    /// One-line summary.
    pub summary: String,
    /// First record-only phrase hit, if any.
    pub quick_pattern: Option<String>,
    /// First blocking phrase hit, if any.
    pub dangerous_pattern: Option<String>,
    /// Whether the prompt must be blocked.
    pub should_block: bool,
    /// Triggering reasons, in evaluation order.
    pub block_reason: Option<String>,
    /// Aggregated PII verdict.
    pub pii: PiiSummary,
    /// Structured log records for this assessment.
    pub logs: Vec<LogEntry>,
}

/// Merged verdict for an uploaded file.
#[derive(Debug, Clone)]
pub struct FileAssessment {
    /// Malware-scan or sensitive-content verdict.
    pub is_malicious: bool,
    /// Engines reporting detections.
    pub detection_count: u32,
    /// Engines that reported at all.
    pub total_engines: u32,
    /// Threat descriptions from every detector.
    pub threats: Vec<String>,
    /// Combined risk.
    pub risk_level: RiskLevel,
    /// One-line summary.
    pub summary: String,
    /// Whether the upload must be blocked.
    pub should_block: bool,
    /// Triggering reasons, in evaluation order.
    pub block_reason: Option<String>,
    /// Filename matched the sensitive-name heuristics.
    pub is_sensitive_file: bool,
    /// Filename carries a malicious extension.
    pub is_malicious_file: bool,
    /// Aggregated PII verdict over extracted text.
    pub pii: PiiSummary,
    /// Upload size in bytes.
    pub file_size: usize,
    /// Full sha-256, lower-case hex.
    pub file_hash: String,
    /// Short hash-prefix identifier.
    pub file_id: String,
    /// Structured log records for this assessment.
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Safe < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::Medium.max(RiskLevel::Low), RiskLevel::Medium);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!(RiskLevel::parse("HIGH"), RiskLevel::High);
        assert_eq!(RiskLevel::parse("critical"), RiskLevel::High);
        assert_eq!(RiskLevel::parse("moderate"), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse("garbage"), RiskLevel::Safe);
    }

    #[test]
    fn test_risk_level_wire_form() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), r#""medium""#);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High >= Severity::High);
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_summarize_pii_takes_max_kind_risk() {
        let matches = vec![
            PiiMatch {
                kind: PiiKind::Email,
                value: "a@b.io".into(),
                span: None,
                confidence: 0.8,
            },
            PiiMatch {
                kind: PiiKind::CreditCard,
                value: "4111111111111111".into(),
                span: None,
                confidence: 0.8,
            },
        ];

        let summary = summarize_pii(&matches);
        assert!(summary.has_pii);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.types, vec!["email", "credit_card"]);
        assert_eq!(summary.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_summarize_pii_empty() {
        let summary = summarize_pii(&[]);
        assert!(!summary.has_pii);
        assert_eq!(summary.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_pii_summary_wire_shape() {
        let summary = summarize_pii(&[PiiMatch {
            kind: PiiKind::Ssn,
            value: "078-05-1120".into(),
            span: None,
            confidence: 0.8,
        }]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["hasPII"], true);
        assert_eq!(json["riskLevel"], "high");
        assert_eq!(json["count"], 1);
    }

    #[test]
    fn test_analysis_log_accumulates() {
        let mut log = AnalysisLog::new();
        log.info("started");
        log.warn("degraded");
        let entries = log.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Warn);
    }
}
