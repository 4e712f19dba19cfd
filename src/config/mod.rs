#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use crate::domain::model::RefreshPolicy;

use crate::domain::model::JSON_CONTENT_TYPE;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_api_path, validate_non_empty_string, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub user_agent: Option<String>,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            timeout_seconds: None,
            refresh_policy: RefreshPolicy::default(),
            headers: HashMap::new(),
            user_agent: None,
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// 預設標頭：JSON content-type，設定檔中的同名標頭優先
    pub fn default_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.sort();

        if !headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        {
            headers.insert(
                0,
                ("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()),
            );
        }
        headers
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validate_url("client.base_url", &self.base_url)?;
        validate_api_path("client.refresh_path", &self.refresh_path)?;

        if let Some(timeout) = self.timeout_seconds {
            validate_range("client.timeout_seconds", timeout, 1, 300)?;
        }

        for name in self.headers.keys() {
            validate_non_empty_string("client.headers", name)?;
        }

        if let Some(agent) = &self.user_agent {
            validate_non_empty_string("client.user_agent", agent)?;
        }

        Ok(())
    }
}
