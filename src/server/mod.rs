//! Vigil HTTP server.
//!
//! Exposes the analysis pipeline over two endpoints:
//! - `POST /analyze/prompt` — prompt-injection and PII analysis
//! - `POST /scan/file` — multipart upload scanning
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vigil::assess::RiskEngine;
//! use vigil::config::Config;
//! use vigil::patterns::NullPatternStore;
//! use vigil::server::{create_router, AppState, ServerConfig};
//!
//! let engine = RiskEngine::from_config(&Config::default(), Box::new(NullPatternStore));
//! let state = Arc::new(AppState::new(ServerConfig::default(), engine));
//! let app = create_router(state);
//! ```

mod config;
mod handlers;
mod state;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check, FileScanResponse, PromptRequest, PromptResponse};
pub use state::AppState;
