use crate::config::ClientConfig;
use crate::domain::model::{ApiRequest, ApiResponse};
use crate::domain::ports::Transport;
use crate::utils::error::Result;
use crate::utils::validation::validate_api_path;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// 以 reqwest 實作的傳輸層。
///
/// Session 只存在於共用的 cookie jar；refresh 回應的 `Set-Cookie`
/// 會自動帶到後續（包含重送的）請求上。
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    default_headers: Vec<(String, String)>,
    cookie_jar: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_cookie_jar(config, Arc::new(Jar::default()))
    }

    pub fn with_cookie_jar(config: &ClientConfig, cookie_jar: Arc<Jar>) -> Result<Self> {
        // 提前檢查 base URL，避免每次請求才失敗
        Url::parse(&config.base_url)?;

        let mut builder = Client::builder().cookie_provider(Arc::clone(&cookie_jar));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_headers: config.default_headers(),
            cookie_jar,
        })
    }

    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookie_jar
    }

    /// base URL 加上請求路徑；保留 base URL 的路徑前綴（例如 `/api/v1`）
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        validate_api_path("path", &request.path)?;

        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(request)?;
        tracing::debug!("➡️ {} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);

        for (name, value) in &self.default_headers {
            if !request.has_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!("⬅️ {} ({} bytes)", status, body.len());

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
