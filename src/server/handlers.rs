//! HTTP request handlers.
//!
//! The caller is a browser extension that must always receive parseable
//! JSON, so scan endpoints never answer with an unstructured 5xx: an
//! unexpected fault inside the pipeline is converted into a conservative
//! fail-closed payload on HTTP 200. The one contractual non-200 is the 422
//! for an invalid `/analyze/prompt` body.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::state::AppState;
use crate::assess::{FileAssessment, LogEntry, PiiSummary, PromptAssessment, RiskLevel};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/analyze/prompt", post(analyze_prompt))
        .route("/scan/file", post(scan_file))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Fixed "ok".
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Seconds since startup.
    pub uptime_secs: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
    })
}

/// Prompt analysis request body
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    /// Prompt text to analyze; must be non-empty.
    pub text: String,
    /// Originating client, for audit logging.
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,
    /// Originating MSP, for audit logging.
    #[serde(default, rename = "mspId")]
    pub msp_id: Option<String>,
}

/// Prompt analysis response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// Whether any detector flagged a threat.
    pub is_threats: bool,
    /// Threat descriptions.
    pub threats: Vec<String>,
    /// Combined risk.
    pub risk_level: RiskLevel,
    /// One-line summary.
    pub summary: String,
    /// First record-only phrase hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_pattern: Option<String>,
    /// First blocking phrase hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangerous_pattern: Option<String>,
    /// Whether the prompt must be blocked.
    pub should_block: bool,
    /// Triggering reasons, in evaluation order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    /// Aggregated PII verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pii_detection: Option<PiiSummary>,
    /// Structured log records for this analysis.
    pub logs: Vec<LogEntry>,
}

impl From<PromptAssessment> for PromptResponse {
    fn from(a: PromptAssessment) -> Self {
        Self {
            is_threats: a.is_threats,
            threats: a.threats,
            risk_level: a.risk_level,
            summary: a.summary,
            quick_pattern: a.quick_pattern,
            dangerous_pattern: a.dangerous_pattern,
            should_block: a.should_block,
            block_reason: a.block_reason,
            pii_detection: Some(a.pii),
            logs: a.logs,
        }
    }
}

/// Defensive payload for a prompt analysis that faulted internally.
fn prompt_fail_closed() -> PromptResponse {
    PromptResponse {
        is_threats: true,
        threats: vec!["internal error during analysis".to_string()],
        risk_level: RiskLevel::Safe,
        summary: "analysis failed internally; prompt blocked defensively".to_string(),
        quick_pattern: None,
        dangerous_pattern: None,
        should_block: true,
        block_reason: Some("internal error".to_string()),
        pii_detection: None,
        logs: Vec::new(),
    }
}

/// Analyze a prompt for injection, PII, and policy threats
async fn analyze_prompt(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Response {
    if request.text.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "errors": [{"field": "text", "message": "text must be at least 1 character"}]
            })),
        )
            .into_response();
    }

    if request.client_id.is_some() || request.msp_id.is_some() {
        tracing::debug!(
            client_id = request.client_id.as_deref().unwrap_or("-"),
            msp_id = request.msp_id.as_deref().unwrap_or("-"),
            "prompt analysis requested"
        );
    }

    // Run the pipeline on its own task so a panic anywhere inside it still
    // produces a structured fail-closed response
    let engine_state = state.clone();
    let text = request.text;
    let joined = tokio::spawn(async move { engine_state.engine.assess_prompt(&text).await }).await;

    match joined {
        Ok(assessment) => (StatusCode::OK, Json(PromptResponse::from(assessment))).into_response(),
        Err(e) => {
            tracing::error!("prompt analysis task failed: {e}");
            (StatusCode::OK, Json(prompt_fail_closed())).into_response()
        }
    }
}

/// File scan response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScanResponse {
    /// Whether the scan itself completed.
    pub success: bool,
    /// Malware or embedded-secret verdict.
    pub is_malicious: bool,
    /// Engines reporting detections.
    pub detection_count: u32,
    /// Engines that reported at all.
    pub total_engines: u32,
    /// Threat descriptions.
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
    /// Aggregated PII verdict.
    pub pii_detection: PiiSummary,
    /// Upload size in bytes.
    pub file_size: usize,
    /// Full sha-256, lower-case hex.
    pub file_hash: String,
    /// Short hash-prefix identifier.
    pub file_id: String,
    /// Structured log records for this scan.
    pub logs: Vec<LogEntry>,
}

impl From<FileAssessment> for FileScanResponse {
    fn from(a: FileAssessment) -> Self {
        Self {
            success: true,
            is_malicious: a.is_malicious,
            detection_count: a.detection_count,
            total_engines: a.total_engines,
            threats: a.threats,
            risk_level: a.risk_level,
            summary: a.summary,
            should_block: a.should_block,
            block_reason: a.block_reason,
            is_sensitive_file: a.is_sensitive_file,
            is_malicious_file: a.is_malicious_file,
            pii_detection: a.pii,
            file_size: a.file_size,
            file_hash: a.file_hash,
            file_id: a.file_id,
            logs: a.logs,
        }
    }
}

/// Defensive payload for a file scan that could not complete.
fn file_fail_closed(summary: &str) -> FileScanResponse {
    FileScanResponse {
        success: false,
        is_malicious: false,
        detection_count: 0,
        total_engines: 0,
        threats: Vec::new(),
        risk_level: RiskLevel::Safe,
        summary: summary.to_string(),
        should_block: true,
        block_reason: Some(summary.to_string()),
        is_sensitive_file: false,
        is_malicious_file: false,
        pii_detection: PiiSummary::empty(),
        file_size: 0,
        file_hash: String::new(),
        file_id: String::new(),
        logs: Vec::new(),
    }
}

/// Scan an uploaded file
async fn scan_file(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<bytes::Bytes> = None;
    let mut filename = String::from("upload.bin");
    let mut media_type: Option<String> = None;
    let mut extracted_text: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("malformed multipart body: {e}");
                return (
                    StatusCode::OK,
                    Json(file_fail_closed("malformed multipart body")),
                )
                    .into_response();
            }
        };

        let part_name = field.name().map(str::to_string);
        match part_name.as_deref() {
            Some("file") => {
                if let Some(name) = field.file_name() {
                    filename = name.to_string();
                }
                media_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes),
                    Err(e) => {
                        tracing::warn!("failed reading file part: {e}");
                        return (
                            StatusCode::OK,
                            Json(file_fail_closed("failed to read file part")),
                        )
                            .into_response();
                    }
                }
            }
            Some("text") => match field.text().await {
                Ok(text) => extracted_text = Some(text),
                Err(e) => {
                    tracing::warn!("failed reading text part: {e}");
                }
            },
            _ => {}
        }
    }

    let Some(bytes) = file_bytes else {
        return (
            StatusCode::OK,
            Json(file_fail_closed("missing required \"file\" part")),
        )
            .into_response();
    };

    // Same panic isolation as the prompt path
    let engine_state = state.clone();
    let joined = tokio::spawn(async move {
        engine_state
            .engine
            .assess_file(
                &bytes,
                &filename,
                media_type.as_deref(),
                extracted_text.as_deref(),
            )
            .await
    })
    .await;

    match joined {
        Ok(assessment) => (StatusCode::OK, Json(FileScanResponse::from(assessment))).into_response(),
        Err(e) => {
            tracing::error!("file scan task failed: {e}");
            (
                StatusCode::OK,
                Json(file_fail_closed("internal error during scan")),
            )
                .into_response()
        }
    }
}
