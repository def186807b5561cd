//! Malware-scan API client.
//!
//! Wraps a VirusTotal-shaped HTTP API: report lookup by hash
//! (`files/{hash}`), file submission (`files`), and analysis fetch
//! (`analyses/{id}`). Every failure mode — missing credential, network
//! error, unexpected response shape — degrades to "scan unavailable"
//! (`None`); nothing here ever errors toward the caller.

use serde::Serialize;

use crate::config::MalwareConfig;
use crate::error::{Result, VigilError};

/// Summary of engine statistics for one scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MalwareVerdict {
    /// Engines reporting malicious or suspicious.
    pub detection_count: u32,
    /// Engines that reported at all.
    pub total_engines: u32,
    /// Derived: any detection at all.
    pub is_malicious: bool,
}

impl MalwareVerdict {
    /// Summarize an engine-statistics object (`malicious`, `suspicious`,
    /// `harmless`, `undetected`, ...). Missing counters read as zero, so an
    /// analysis with no stats yet yields a clean verdict.
    fn from_stats(stats: &serde_json::Value) -> Self {
        let count = |key: &str| stats.get(key).and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;

        let malicious = count("malicious");
        let suspicious = count("suspicious");
        let detection_count = malicious + suspicious;
        let total_engines = detection_count
            + count("harmless")
            + count("undetected")
            + count("timeout")
            + count("failure")
            + count("type-unsupported");

        Self {
            detection_count,
            total_engines,
            is_malicious: detection_count > 0,
        }
    }
}

/// Client over the malware-scan API.
pub struct MalwareClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl MalwareClient {
    /// Build a client from configuration.
    pub fn new(config: &MalwareConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Whether a credential is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Look up an existing report by sha-256 hash.
    ///
    /// `None` when no credential is configured, the file is unknown, or the
    /// API is unavailable.
    pub async fn report_by_hash(&self, hash: &str) -> Option<MalwareVerdict> {
        let key = self.api_key.clone()?;

        match self.try_report(&key, hash).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("malware report lookup unavailable: {e}");
                None
            }
        }
    }

    /// Submit the file and fetch one analysis snapshot.
    ///
    /// This is a single fetch after submission, not a poll loop: a freshly
    /// submitted file frequently has no engine stats yet and then reads as
    /// not-malicious. Known under-reporting, kept deliberately.
    pub async fn upload_and_analyze(&self, bytes: &[u8], filename: &str) -> Option<MalwareVerdict> {
        let key = self.api_key.clone()?;

        match self.try_upload(&key, bytes, filename).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("malware scan unavailable: {e}");
                None
            }
        }
    }

    async fn try_report(&self, key: &str, hash: &str) -> Result<Option<MalwareVerdict>> {
        let response = self
            .http
            .get(format!("{}/files/{hash}", self.api_url))
            .header("x-apikey", key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;

        let value: serde_json::Value = response.json().await?;
        let stats = &value["data"]["attributes"]["last_analysis_stats"];
        Ok(Some(MalwareVerdict::from_stats(stats)))
    }

    async fn try_upload(
        &self,
        key: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Option<MalwareVerdict>> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/files", self.api_url))
            .header("x-apikey", key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let value: serde_json::Value = response.json().await?;
        let analysis_id = value["data"]["id"].as_str().ok_or_else(|| {
            VigilError::ExternalService("file submission returned no analysis id".to_string())
        })?;

        let response = self
            .http
            .get(format!("{}/analyses/{analysis_id}", self.api_url))
            .header("x-apikey", key)
            .send()
            .await?
            .error_for_status()?;

        let value: serde_json::Value = response.json().await?;
        let stats = &value["data"]["attributes"]["stats"];
        Ok(Some(MalwareVerdict::from_stats(stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_from_full_stats() {
        let stats = json!({
            "malicious": 3,
            "suspicious": 1,
            "harmless": 60,
            "undetected": 6,
            "timeout": 1
        });
        let verdict = MalwareVerdict::from_stats(&stats);
        assert_eq!(verdict.detection_count, 4);
        assert_eq!(verdict.total_engines, 71);
        assert!(verdict.is_malicious);
    }

    #[test]
    fn test_verdict_with_no_stats_yet_is_clean() {
        let verdict = MalwareVerdict::from_stats(&serde_json::Value::Null);
        assert_eq!(verdict.detection_count, 0);
        assert_eq!(verdict.total_engines, 0);
        assert!(!verdict.is_malicious);
    }

    #[test]
    fn test_verdict_clean_engines() {
        let stats = json!({"malicious": 0, "suspicious": 0, "harmless": 70, "undetected": 2});
        let verdict = MalwareVerdict::from_stats(&stats);
        assert!(!verdict.is_malicious);
        assert_eq!(verdict.total_engines, 72);
    }

    #[tokio::test]
    async fn test_unconfigured_client_is_a_noop() {
        let client = MalwareClient::new(&MalwareConfig::default());
        assert!(!client.is_configured());
        assert!(client.report_by_hash("deadbeef").await.is_none());
        assert!(client.upload_and_analyze(b"bytes", "a.bin").await.is_none());
    }
}
