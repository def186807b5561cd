//! Upload validation.
//!
//! Checks run in a fixed order, each short-circuiting with a typed
//! [`ValidationError`]: size, extension allow-list (policy toggle), declared
//! MIME, magic-byte signature, then a sensitive-content scan. The last step
//! detects but never rejects: it reports `has_sensitive_data` for the
//! assessment engine to fold into the overall verdict, keeping "reject the
//! upload outright" distinct from "flag as a threat".
//!
//! The sha-256 hash and short file id are computed before any check so a
//! rejected upload can still be reported idempotently.

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::ScanConfig;
use crate::error::{ValidationCode, ValidationError};

/// Hex length of the short file id (a hash prefix).
const FILE_ID_LEN: usize = 16;

/// Leading byte signatures: `(magic, media type, extensions it legitimizes)`.
const MAGIC_SIGNATURES: &[(&[u8], &str, &[&str])] = &[
    (b"%PDF", "application/pdf", &["pdf"]),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg", &["jpg", "jpeg"]),
    (
        &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        "image/png",
        &["png"],
    ),
    // Office and Java archives are ZIP containers
    (
        &[0x50, 0x4B, 0x03, 0x04],
        "application/zip",
        &["zip", "docx", "xlsx", "pptx", "odt", "jar", "apk"],
    ),
    (b"GIF8", "image/gif", &["gif"]),
];

/// Extensions with no reliable byte signature; exempt from magic-mismatch.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "tsv", "json", "xml", "yaml", "yml", "log", "toml", "ini", "cfg", "conf",
    "env", "html", "htm",
];

/// Key/cert material by extension; any hit marks the upload sensitive.
const SENSITIVE_EXTENSIONS: &[&str] = &[
    ".pem", ".key", ".p12", ".pfx", ".jks", ".keystore", ".ppk", ".asc",
];

/// Immutable result of a successful validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Short stable identifier (hash prefix).
    pub file_id: String,
    /// Effective media type (magic-detected when available, else declared).
    pub media_type: String,
    /// Upload size in bytes.
    pub file_size: usize,
    /// Full sha-256 hash, lower-case hex.
    pub file_hash: String,
    /// Whether the content scan found credential-shaped data.
    pub has_sensitive_data: bool,
    /// Why the content was marked sensitive.
    pub sensitive_reason: Option<String>,
}

/// Compiled upload policy.
pub struct UploadPolicy {
    /// Maximum accepted size in bytes.
    pub max_upload_bytes: usize,
    /// Allowed declared media types (`image/*` wildcards supported).
    pub allowed_mime_types: Vec<String>,
    /// Extension allow-list; `None` disables the check.
    pub allowed_extensions: Option<Vec<String>>,
    /// How many leading bytes of text content to scan.
    pub text_scan_limit: usize,
    sensitive_patterns: Vec<Regex>,
}

impl UploadPolicy {
    /// Compile a policy from configuration. Malformed sensitive-content
    /// regexes are skipped with a warning.
    pub fn from_config(config: &ScanConfig) -> Self {
        let sensitive_patterns = config
            .sensitive_content_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, "skipping malformed sensitive-content regex: {e}");
                    None
                }
            })
            .collect();

        Self {
            max_upload_bytes: config.max_upload_bytes,
            allowed_mime_types: config.allowed_mime_types.clone(),
            allowed_extensions: config
                .allowed_extensions
                .as_ref()
                .map(|exts| exts.iter().map(|e| e.to_lowercase()).collect()),
            text_scan_limit: config.text_scan_limit,
            sensitive_patterns,
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

/// Full sha-256 of the upload, lower-case hex.
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Short stable identifier derived from the hash.
pub fn file_id(hash: &str) -> String {
    hash.chars().take(FILE_ID_LEN).collect()
}

/// Run the ordered validation checks.
pub fn validate(
    policy: &UploadPolicy,
    bytes: &[u8],
    filename: &str,
    declared_mime: Option<&str>,
) -> Result<UploadOutcome, ValidationError> {
    let hash = file_hash(bytes);
    let declared = declared_mime.unwrap_or("application/octet-stream");

    // 1. Size
    if bytes.len() > policy.max_upload_bytes {
        return Err(ValidationError::new(
            ValidationCode::TooLarge,
            format!(
                "file is {} bytes, cap is {} bytes",
                bytes.len(),
                policy.max_upload_bytes
            ),
        ));
    }

    let ext = extension(filename);

    // 2. Extension allow-list (disabled unless configured)
    if let Some(allowed) = &policy.allowed_extensions {
        match &ext {
            Some(e) if allowed.iter().any(|a| a == e) => {}
            _ => {
                return Err(ValidationError::new(
                    ValidationCode::DisallowedType,
                    format!("extension {:?} is not allowed", ext.as_deref().unwrap_or("")),
                ));
            }
        }
    }

    // 3. Declared MIME
    if !mime_allowed(declared, &policy.allowed_mime_types) {
        return Err(ValidationError::new(
            ValidationCode::DisallowedType,
            format!("media type {declared} is not allowed"),
        ));
    }

    // 4. Magic bytes vs. declared extension
    let detected = detect_signature(bytes);
    if let (Some((magic_mime, legit_exts)), Some(ext)) = (detected, ext.as_deref()) {
        let text_like = TEXT_EXTENSIONS.contains(&ext);
        if !text_like && !legit_exts.contains(&ext) {
            return Err(ValidationError::new(
                ValidationCode::MagicMismatch,
                format!("content is {magic_mime} but filename says .{ext}"),
            ));
        }
    }

    // 5. Sensitive-content scan: detect, never reject
    let (has_sensitive_data, sensitive_reason) = scan_sensitive(policy, bytes, filename, declared);

    let media_type = detected
        .map(|(mime, _)| mime.to_string())
        .unwrap_or_else(|| declared.to_string());

    Ok(UploadOutcome {
        file_id: file_id(&hash),
        media_type,
        file_size: bytes.len(),
        file_hash: hash,
        has_sensitive_data,
        sensitive_reason,
    })
}

/// Last-dot extension, lower-cased. `.env` yields `env`.
pub fn extension(filename: &str) -> Option<String> {
    let basename = filename.rsplit('/').next()?;
    let idx = basename.rfind('.')?;
    let ext = &basename[idx + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// Lossy-decode a text-like upload's leading bytes for content scanning.
///
/// Returns `None` for binary content so pattern scans are not run over raw
/// image or archive bytes.
pub fn extract_text(bytes: &[u8], filename: &str, limit: usize) -> Option<String> {
    let text_like = extension(filename)
        .map(|e| TEXT_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false);

    let prefix = &bytes[..bytes.len().min(limit)];
    if text_like || std::str::from_utf8(prefix).is_ok() {
        Some(String::from_utf8_lossy(prefix).into_owned())
    } else {
        None
    }
}

fn mime_allowed(declared: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let declared = declared.to_lowercase();
    allowed.iter().any(|entry| {
        if let Some(prefix) = entry.strip_suffix("/*") {
            declared.starts_with(&format!("{prefix}/"))
        } else {
            declared == *entry
        }
    })
}

fn detect_signature(bytes: &[u8]) -> Option<(&'static str, &'static [&'static str])> {
    let head = &bytes[..bytes.len().min(16)];
    MAGIC_SIGNATURES
        .iter()
        .find(|(magic, _, _)| head.starts_with(magic))
        .map(|(_, mime, exts)| (*mime, *exts))
}

fn scan_sensitive(
    policy: &UploadPolicy,
    bytes: &[u8],
    filename: &str,
    declared: &str,
) -> (bool, Option<String>) {
    let lowered = filename.to_lowercase();
    if let Some(ext) = SENSITIVE_EXTENSIONS.iter().find(|e| lowered.ends_with(**e)) {
        return (
            true,
            Some(format!("key or certificate material ({ext} file)")),
        );
    }

    let text_like_mime = declared.starts_with("text/");
    let text = if text_like_mime {
        let prefix = &bytes[..bytes.len().min(policy.text_scan_limit)];
        Some(String::from_utf8_lossy(prefix).into_owned())
    } else {
        extract_text(bytes, filename, policy.text_scan_limit)
    };

    if let Some(text) = text {
        for re in &policy.sensitive_patterns {
            if re.is_match(&text) {
                return (
                    true,
                    Some(format!("content matches sensitive pattern {}", re.as_str())),
                );
            }
        }
    }

    (false, None)
}
