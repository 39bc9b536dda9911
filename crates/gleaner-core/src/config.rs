use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Effective configuration for one invocation.
///
/// Loaded from `<state_dir>/config.toml` when present; every field has a
/// default matching the original deployment, so a missing file is fine.
/// Filter thresholds and discovery exclusions are configuration rather
/// than module constants because the right values are deployment
/// specific, not part of the correctness contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GleanConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Read ceilings for one extraction pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum bytes read from a single file per pass. A record larger
    /// than this stalls its file (no progress, retried next pass).
    #[serde(default = "default_max_bytes_per_file")]
    pub max_bytes_per_file: u64,
    /// Maximum records kept per source in one batch; older records are
    /// tail-truncated out of the batch.
    #[serde(default = "default_max_records_per_source")]
    pub max_records_per_source: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_file: default_max_bytes_per_file(),
            max_records_per_source: default_max_records_per_source(),
        }
    }
}

/// What counts as a usable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Roles accepted from decoded messages.
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    /// A cleaned record starting with any of these prefixes is dropped.
    #[serde(default = "default_noise_prefixes")]
    pub noise_prefixes: Vec<String>,
    /// Records longer than this (bytes) are dropped; large dumps are
    /// left for a later, coarser summarization pass.
    #[serde(default = "default_max_record_len")]
    pub max_record_len: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            roles: default_roles(),
            noise_prefixes: default_noise_prefixes(),
            max_record_len: default_max_record_len(),
        }
    }
}

/// Exclusion rules applied when enumerating source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Source ids skipped entirely. The downstream consumer's own
    /// session must never become an input, or it would ingest itself.
    #[serde(default = "default_excluded_sources")]
    pub excluded_sources: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            excluded_sources: default_excluded_sources(),
        }
    }
}

/// Load configuration from `<state_dir>/config.toml`, falling back to
/// defaults when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(state_dir: &Path) -> Result<GleanConfig> {
    let path = state_dir.join("config.toml");
    if !path.exists() {
        return Ok(GleanConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<GleanConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_max_bytes_per_file() -> u64 {
    256_000
}

const fn default_max_records_per_source() -> usize {
    30
}

const fn default_max_record_len() -> usize {
    2000
}

fn default_roles() -> Vec<String> {
    vec!["user".to_string(), "assistant".to_string()]
}

fn default_noise_prefixes() -> Vec<String> {
    vec![
        "✅ New session started".to_string(),
        "NO_REPLY".to_string(),
    ]
}

fn default_excluded_sources() -> Vec<String> {
    vec!["memory-distiller".to_string()]
}
