//! Client configuration: TOML file, then environment, then command-line
//! overrides applied by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "reelfeed.toml";

pub const ENV_BASE_URL: &str = "REELFEED_BASE_URL";
pub const ENV_TOKEN_PATH: &str = "REELFEED_TOKEN_PATH";

/// What to do with an optimistic like/unlike the server refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeFailurePolicy {
    /// Undo the optimistic change.
    #[default]
    Rollback,
    /// Leave the optimistic change on screen; only report the error.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Root of the REST API, e.g. `http://127.0.0.1:5000/api`.
    pub base_url: String,
    /// Videos requested per feed page.
    pub page_size: u32,
    /// How close to the tail the cursor gets before the next page is fetched.
    /// Defaults to half a page.
    pub prefetch_distance: Option<usize>,
    pub token_path: PathBuf,
    pub connect_timeout_secs: u64,
    /// Off unless set; a slow request simply delays state updates.
    pub request_timeout_secs: Option<u64>,
    pub like_failure: LikeFailurePolicy,
    /// The backend refuses bodies above 16 MiB.
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            page_size: 5,
            prefetch_distance: None,
            token_path: default_token_path(),
            connect_timeout_secs: 3,
            request_timeout_secs: None,
            like_failure: LikeFailurePolicy::Rollback,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

fn default_token_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".reelfeed").join("token"),
        _ => PathBuf::from(".reelfeed_token"),
    }
}

impl ClientConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or fall
    /// back to defaults. Environment overrides are applied on top.
    ///
    /// # Errors
    /// An explicit `path` that cannot be read, any file that is not valid
    /// TOML for this struct, or values that fail [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Apply `REELFEED_*` overrides, reading variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(path) = lookup(ENV_TOKEN_PATH).filter(|v| !v.trim().is_empty()) {
            self.token_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.page_size == 0 {
            return Err(ClientError::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }

    /// `base_url` without a trailing slash, ready for path concatenation.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn effective_prefetch_distance(&self) -> usize {
        self.prefetch_distance
            .unwrap_or(self.page_size as usize / 2)
            .max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
