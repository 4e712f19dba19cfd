use crate::config::toml_config::TomlConfig;
use crate::config::{ClientConfig, RefreshPolicy};
use crate::domain::model::ApiRequest;
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{validate_api_path, validate_required_field};
use clap::Parser;
use reqwest::Method;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "charter-client")]
#[command(about = "Authenticated client for the yacht charter admin API")]
pub struct CliConfig {
    #[arg(long, help = "TOML config file with a [client] table")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CHARTER_API_URL")]
    pub base_url: Option<String>,

    #[arg(long)]
    pub refresh_path: Option<String>,

    #[arg(long, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Share one session refresh between concurrent 401s")]
    pub coalesce_refresh: bool,

    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    #[arg(long, help = "Path relative to the base URL, e.g. /yachts?page=1")]
    pub path: String,

    #[arg(long, short = 'd', help = "Request body (sent as JSON by default)")]
    pub data: Option<String>,

    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 合併設定檔與命令列參數；命令列優先
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.into_client_config(),
            None => {
                let base_url = validate_required_field("base_url", &self.base_url)?;
                ClientConfig::new(base_url.clone())
            }
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(refresh_path) = &self.refresh_path {
            config.refresh_path = refresh_path.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = Some(timeout);
        }
        if self.coalesce_refresh {
            config.refresh_policy = RefreshPolicy::Coalesced;
        }

        Ok(config)
    }

    pub fn request(&self) -> Result<ApiRequest> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes()).map_err(|_| {
            ClientError::InvalidConfigValueError {
                field: "method".to_string(),
                value: self.method.clone(),
                reason: "Not a valid HTTP method".to_string(),
            }
        })?;

        validate_api_path("path", &self.path)?;

        let mut request = ApiRequest::new(method, self.path.clone());
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            request = request.with_header(name, value);
        }
        if let Some(data) = &self.data {
            request = request.with_body(data.clone().into_bytes());
        }

        Ok(request)
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ClientError::InvalidConfigValueError {
            field: "header".to_string(),
            value: raw.to_string(),
            reason: "Expected NAME:VALUE".to_string(),
        }),
    }
}
