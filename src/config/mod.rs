//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`VIGIL_*`)
//! - CLI arguments (for the server binary)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listen address configuration
    #[serde(default)]
    pub listen: ListenConfig,

    /// Upload and content-scan policy
    #[serde(default)]
    pub scan: ScanConfig,

    /// Semantic (LLM-backed) analysis backend
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Malware-scan backend
    #[serde(default)]
    pub malware: MalwareConfig,

    /// Detection pattern cache
    #[serde(default)]
    pub patterns: PatternConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| VigilError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| VigilError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("VIGIL_LISTEN_HOST") {
            config.listen.host = host;
        }
        if let Ok(port) = std::env::var("VIGIL_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen.port = port;
            }
        }

        if let Ok(val) = std::env::var("VIGIL_MAX_UPLOAD_BYTES") {
            if let Ok(val) = val.parse() {
                config.scan.max_upload_bytes = val;
            }
        }

        if let Ok(url) = std::env::var("VIGIL_SEMANTIC_API_URL") {
            config.semantic.api_url = url;
        }
        if let Ok(key) = std::env::var("VIGIL_SEMANTIC_API_KEY") {
            config.semantic.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("VIGIL_SEMANTIC_MODEL") {
            config.semantic.model = model;
        }

        if let Ok(url) = std::env::var("VIGIL_MALWARE_API_URL") {
            config.malware.api_url = url;
        }
        if let Ok(key) = std::env::var("VIGIL_MALWARE_API_KEY") {
            config.malware.api_key = Some(key);
        }

        if let Ok(ttl) = std::env::var("VIGIL_PATTERN_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                config.patterns.ttl_secs = ttl;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence for values that
    /// differ from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let listen_defaults = ListenConfig::default();
        Self {
            listen: ListenConfig {
                host: if other.listen.host != listen_defaults.host {
                    other.listen.host
                } else {
                    self.listen.host
                },
                port: if other.listen.port != listen_defaults.port {
                    other.listen.port
                } else {
                    self.listen.port
                },
            },
            scan: other.scan,
            semantic: SemanticConfig {
                api_key: other.semantic.api_key.or(self.semantic.api_key),
                ..other.semantic
            },
            malware: MalwareConfig {
                api_key: other.malware.api_key.or(self.malware.api_key),
                ..other.malware
            },
            patterns: other.patterns,
        }
    }
}

/// Listen address configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ListenConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upload and content-scan policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,

    /// Allowed declared media types; entries may use a `prefix/*` wildcard
    pub allowed_mime_types: Vec<String>,

    /// Extension allow-list. `None` disables the extension check entirely.
    pub allowed_extensions: Option<Vec<String>>,

    /// Regex patterns that mark file content as sensitive (credentials,
    /// key material, password assignments)
    pub sensitive_content_patterns: Vec<String>,

    /// How many leading bytes of text content to scan for sensitive data
    pub text_scan_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024, // 10 MB
            allowed_mime_types: vec![
                "text/*".to_string(),
                "image/*".to_string(),
                "application/pdf".to_string(),
                "application/json".to_string(),
                "application/zip".to_string(),
                "application/octet-stream".to_string(),
            ],
            allowed_extensions: None,
            sensitive_content_patterns: vec![
                r"(?i)api[_-]?key\s*[:=]\s*\S+".to_string(),
                r"(?i)secret[_-]?(key|token)?\s*[:=]\s*\S+".to_string(),
                r"(?i)password\s*[:=]\s*\S+".to_string(),
                r"-----BEGIN [A-Z ]*PRIVATE KEY-----".to_string(),
                r"(?i)aws_secret_access_key".to_string(),
                r"\bsk-[A-Za-z0-9]{16,}\b".to_string(),
                r"\bghp_[A-Za-z0-9]{36}\b".to_string(),
            ],
            text_scan_limit: 100 * 1024, // ~100 KB
        }
    }
}

/// What the pipeline assumes when the semantic detector cannot run
/// (no credential configured, backend unreachable, unparseable response).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailPolicy {
    /// Treat the content as safe (reference behavior).
    #[default]
    AssumeSafe,
    /// Treat the content as a threat and block.
    AssumeUnsafe,
}

/// Semantic (LLM-backed) analysis backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Chat-completions API base URL
    pub api_url: String,

    /// API key; `None` disables the semantic detector
    pub api_key: Option<String>,

    /// Model identifier sent to the backend
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Policy when the detector is unavailable
    #[serde(default)]
    pub on_unavailable: FailPolicy,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            on_unavailable: FailPolicy::AssumeSafe,
        }
    }
}

/// Malware-scan backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalwareConfig {
    /// Malware-scan API base URL
    pub api_url: String,

    /// API key; `None` disables malware scanning
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MalwareConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.virustotal.com/api/v3".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Detection pattern cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Snapshot time-to-live in seconds
    pub ttl_secs: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.scan.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.patterns.ttl_secs, 300);
        assert!(config.semantic.api_key.is_none());
        assert_eq!(config.semantic.on_unavailable, FailPolicy::AssumeSafe);
    }

    #[test]
    fn test_listen_addr() {
        let config = ListenConfig::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [listen]
            host = "0.0.0.0"
            port = 9090

            [scan]
            max_upload_bytes = 1048576
            allowed_mime_types = ["application/pdf"]
            sensitive_content_patterns = ["(?i)password"]
            text_scan_limit = 4096

            [semantic]
            api_url = "https://llm.internal/v1"
            model = "scanner-large"
            timeout_secs = 15
            on_unavailable = "assume-unsafe"

            [malware]
            api_url = "https://scan.internal/api/v3"
            timeout_secs = 45

            [patterns]
            ttl_secs = 60
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listen.port, 9090);
        assert_eq!(config.scan.max_upload_bytes, 1_048_576);
        assert_eq!(config.semantic.on_unavailable, FailPolicy::AssumeUnsafe);
        assert_eq!(config.malware.timeout_secs, 45);
        assert_eq!(config.patterns.ttl_secs, 60);
    }

    #[test]
    fn test_merge_keeps_existing_api_key() {
        let mut base = Config::default();
        base.semantic.api_key = Some("key-from-env".to_string());

        let merged = base.merge(Config::default());
        assert_eq!(merged.semantic.api_key.as_deref(), Some("key-from-env"));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "[listen]\nhost = \"10.0.0.5\"\nport = 3000\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.listen.listen_addr(), "10.0.0.5:3000");
    }
}
