//! Application state shared across handlers.

use std::time::{Duration, Instant};

use super::config::ServerConfig;
use crate::assess::RiskEngine;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Risk assessment engine
    pub engine: RiskEngine,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig, engine: RiskEngine) -> Self {
        Self {
            config,
            engine,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
