//! Viewer configuration.
//!
//! Values come from an optional JSON file, then `VIEWER_*` environment
//! variables, then command line flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ViewerError};

pub const DEFAULT_API_ENDPOINT: &str = "https://pixeldrain.com/api";
pub const DEFAULT_CAPTCHA_SCRIPT_URL: &str =
    "https://www.google.com/recaptcha/api.js?onload=loadCaptcha&render=explicit";
const STATS_RETRY_DELAY_MS: u64 = 5_000;
const COPY_RESET_DELAY_MS: u64 = 60_000;

/// Site key of the challenge provider. `"none"` and `""` switch challenges off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaKey {
    Disabled,
    SiteKey(String),
}

impl CaptchaKey {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "none" => CaptchaKey::Disabled,
            key => CaptchaKey::SiteKey(key.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub api_endpoint: String,
    pub captcha_site_key: String,
    pub captcha_script_url: String,
    pub stats_retry_delay_ms: u64,
    pub copy_reset_delay_ms: u64,
    pub show_toolbar: bool,
    pub download_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            captcha_site_key: "none".to_string(),
            captcha_script_url: DEFAULT_CAPTCHA_SCRIPT_URL.to_string(),
            stats_retry_delay_ms: STATS_RETRY_DELAY_MS,
            copy_reset_delay_ms: COPY_RESET_DELAY_MS,
            show_toolbar: true,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ViewerConfig {
    /// Read the config file if one is given and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|err| {
                    ViewerError::Config(format!("failed to read '{}': {err}", path.display()))
                })?;
                serde_json::from_str::<ViewerConfig>(&content)?
            }
            None => ViewerConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("VIEWER_API_ENDPOINT") {
            self.api_endpoint = endpoint;
        }
        if let Some(key) = lookup("VIEWER_CAPTCHA_SITE_KEY") {
            self.captcha_site_key = key;
        }
        if let Some(dir) = lookup("VIEWER_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.api_endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ViewerError::Config(format!(
                "api endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        if self.stats_retry_delay_ms == 0 {
            return Err(ViewerError::Config("stats retry delay must be positive".into()));
        }
        Ok(())
    }

    pub fn captcha_key(&self) -> CaptchaKey {
        CaptchaKey::parse(&self.captcha_site_key)
    }

    /// API endpoint without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_endpoint.trim_end_matches('/')
    }

    pub fn stats_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stats_retry_delay_ms)
    }

    pub fn copy_reset_delay(&self) -> Duration {
        Duration::from_millis(self.copy_reset_delay_ms)
    }
}
