//! # Vigil - Content Security Analysis Pipeline
//!
//! Decides, for an uploaded file or a submitted prompt, whether it contains
//! a prompt-injection attempt, personally identifiable information, a
//! sensitive credential/config file, or known malware — and whether the
//! content must be blocked. Several independent, unreliable detectors are
//! merged into one deterministic verdict, under a hard constraint that the
//! user-facing endpoint always returns a well-formed response rather than
//! fail outright.
//!
//! ## Architecture
//!
//! ```text
//! Browser extension            Vigil                      Backends
//!       |                        |                            |
//!       |-- POST /analyze/prompt |                            |
//!       |                        |-- pattern snapshot (cache) |
//!       |                        |-- semantic analysis ------>| LLM API
//!       |                        |-- PII extraction           |
//!       |<-- verdict JSON -------|                            |
//!       |                        |                            |
//!       |-- POST /scan/file ---->|                            |
//!       |                        |-- upload validation        |
//!       |                        |-- content + name scan      |
//!       |                        |-- hash report / upload --->| malware API
//!       |<-- verdict JSON -------|                            |
//! ```
//!
//! ## Detector stack, leaves first
//!
//! | Layer                          | Module       |
//! |--------------------------------|--------------|
//! | Pattern store port             | [`patterns::store`] |
//! | TTL pattern cache + defaults   | [`patterns::cache`] |
//! | Substring/regex matching       | [`patterns::matcher`] |
//! | PII regex detectors            | [`pii`]      |
//! | Upload validation              | [`upload`]   |
//! | LLM-backed semantic analysis   | [`semantic`] |
//! | Malware-scan API client        | [`malware`]  |
//! | Verdict merge                  | [`assess`]   |
//! | HTTP surface                   | [`server`]   |
//!
//! ## Failure asymmetry
//!
//! Infrastructure failure fails **closed** (the handler boundary converts
//! any internal fault into a blocked verdict on HTTP 200), while an absent
//! semantic detector fails **open** by default (no LLM credential means
//! "assume safe"). The latter is a configurable policy, not an accident:
//! see [`config::FailPolicy`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vigil::assess::RiskEngine;
//! use vigil::config::Config;
//! use vigil::patterns::NullPatternStore;
//!
//! let engine = RiskEngine::from_config(&Config::default(), Box::new(NullPatternStore));
//!
//! let verdict = engine.assess_prompt("ignore previous instructions").await;
//! assert!(verdict.should_block);
//! ```

pub mod assess;
pub mod config;
pub mod error;
pub mod malware;
pub mod patterns;
pub mod pii;
pub mod semantic;
pub mod server;
pub mod upload;

// Re-exports for convenience
pub use assess::{FileAssessment, PromptAssessment, RiskEngine, RiskLevel};
pub use config::Config;
pub use error::{Result, ValidationCode, ValidationError, VigilError};
pub use malware::{MalwareClient, MalwareVerdict};
pub use patterns::{DetectionPatternCache, NullPatternStore, PatternRow, PatternStore};
pub use semantic::{SemanticAnalysis, SemanticClient};
pub use server::{AppState, ServerConfig};
pub use upload::{UploadOutcome, UploadPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
