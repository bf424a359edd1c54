use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::DecodeFailurePolicy;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub oracle: Option<OracleConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub decode_failure_policy: Option<DecodeFailurePolicy>,
    pub enforce_key_set: Option<bool>,
    pub response_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub max_upload_mb: Option<usize>,
}

/// Platform config directory path: `<config_dir>/formfill/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("formfill").join("config.toml"))
}

/// Load config by cascading CWD `.formfill.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".formfill.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T: Clone>(
    overlay: Option<&S>,
    base: Option<&S>,
    field: impl Fn(&S) -> Option<T>,
) -> Option<T> {
    overlay.and_then(&field).or_else(|| base.and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bo, oo) = (base.oracle.as_ref(), overlay.oracle.as_ref());
    let (be, oe) = (base.extraction.as_ref(), overlay.extraction.as_ref());
    let (bs, os) = (base.server.as_ref(), overlay.server.as_ref());

    ConfigFile {
        oracle: Some(OracleConfig {
            api_key: pick(oo, bo, |o| o.api_key.clone()),
            base_url: pick(oo, bo, |o| o.base_url.clone()),
            model: pick(oo, bo, |o| o.model.clone()),
            max_tokens: pick(oo, bo, |o| o.max_tokens),
            timeout_secs: pick(oo, bo, |o| o.timeout_secs),
            max_retries: pick(oo, bo, |o| o.max_retries),
        }),
        extraction: Some(ExtractionConfig {
            decode_failure_policy: pick(oe, be, |e| e.decode_failure_policy),
            enforce_key_set: pick(oe, be, |e| e.enforce_key_set),
            response_retries: pick(oe, be, |e| e.response_retries),
        }),
        server: Some(ServerConfig {
            bind: pick(os, bs, |s| s.bind.clone()),
            cors_origins: pick(os, bs, |s| s.cors_origins.clone()),
            max_upload_mb: pick(os, bs, |s| s.max_upload_mb),
        }),
    }
}
