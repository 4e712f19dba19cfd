use crate::config::{ClientConfig, RefreshPolicy};
use crate::core::retry::{decide, Decision};
use crate::domain::model::{ApiRequest, ApiResponse, Attempt};
use crate::domain::ports::Transport;
use crate::utils::error::{ClientError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// 帶 session 的 API client。
///
/// 第一次收到 401 時呼叫 refresh 端點（`POST`、空 body、同一個 cookie jar），
/// 成功後以完全相同的請求重送一次；refresh 失敗則回傳 refresh 的錯誤。
pub struct AuthClient<T: Transport> {
    transport: T,
    refresh_path: String,
    policy: RefreshPolicy,
    refresh_lock: Mutex<()>,
    // 每次 refresh 成功加一
    refresh_generation: AtomicU64,
}

impl<T: Transport> AuthClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            refresh_path: config.refresh_path.clone(),
            policy: config.refresh_policy,
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let is_refresh_call = self.is_refresh_call(&request);
        let mut attempt = Attempt::FIRST;

        loop {
            let observed_generation = self.refresh_generation.load(Ordering::Acquire);

            tracing::debug!(
                "📡 {} {} (attempt {})",
                request.method,
                request.path,
                attempt.count() + 1
            );
            let response = self.transport.send(&request).await?;
            tracing::debug!("📡 {} {} -> {}", request.method, request.path, response.status);

            match decide(attempt, response.status, is_refresh_call) {
                Decision::Accept => return Ok(response),
                Decision::Reject => return Err(status_error(&request, response)),
                Decision::RefreshAndRetry => {
                    tracing::info!(
                        "🔄 {} {} returned 401, refreshing session",
                        request.method,
                        request.path
                    );
                    if let Err(e) = self.refresh_session(observed_generation).await {
                        tracing::warn!("⚠️ Session refresh failed: {}", e);
                        return Err(ClientError::RefreshFailed {
                            source: Box::new(e),
                        });
                    }
                    attempt = attempt.next();
                }
            }
        }
    }

    async fn refresh_session(&self, observed_generation: u64) -> Result<()> {
        match self.policy {
            RefreshPolicy::Independent => self.call_refresh_endpoint().await,
            RefreshPolicy::Coalesced => {
                let _guard = self.refresh_lock.lock().await;

                if self.refresh_generation.load(Ordering::Acquire) != observed_generation {
                    tracing::debug!("🔄 Session already refreshed by a concurrent request");
                    return Ok(());
                }

                self.call_refresh_endpoint().await
            }
        }
    }

    async fn call_refresh_endpoint(&self) -> Result<()> {
        let request = ApiRequest::post(self.refresh_path.clone());
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            return Err(status_error(&request, response));
        }

        self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        tracing::info!("🔄 Session refreshed");
        Ok(())
    }

    // 比對時忽略結尾的 `/`
    fn is_refresh_call(&self, request: &ApiRequest) -> bool {
        let refresh_route = self.refresh_path.split(['?', '#']).next().unwrap_or_default();
        request.route().trim_end_matches('/') == refresh_route.trim_end_matches('/')
    }
}

fn status_error(request: &ApiRequest, response: ApiResponse) -> ClientError {
    ClientError::Status {
        method: request.method.to_string(),
        path: request.path.clone(),
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    const REFRESH_PATH: &str = "/auth/refresh";

    struct FakeState {
        session_valid: bool,
        refresh_status: StatusCode,
        // 不論 session 狀態都固定回傳的狀態
        fixed_status: HashMap<String, StatusCode>,
        // session 有效時回傳的狀態（預設 200）
        valid_status: HashMap<String, StatusCode>,
        yield_before_reply: bool,
        calls: Vec<ApiRequest>,
    }

    /// 模擬以 cookie 維持 session 的後端
    #[derive(Clone)]
    struct FakeBackend {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeBackend {
        fn new(session_valid: bool) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    session_valid,
                    refresh_status: StatusCode::OK,
                    fixed_status: HashMap::new(),
                    valid_status: HashMap::new(),
                    yield_before_reply: false,
                    calls: Vec::new(),
                })),
            }
        }

        async fn refresh_fails_with(self, status: StatusCode) -> Self {
            self.state.lock().await.refresh_status = status;
            self
        }

        async fn always(self, route: &str, status: StatusCode) -> Self {
            self.state
                .lock()
                .await
                .fixed_status
                .insert(route.to_string(), status);
            self
        }

        async fn when_valid(self, route: &str, status: StatusCode) -> Self {
            self.state
                .lock()
                .await
                .valid_status
                .insert(route.to_string(), status);
            self
        }

        async fn interleaved(self) -> Self {
            self.state.lock().await.yield_before_reply = true;
            self
        }

        async fn calls(&self) -> Vec<ApiRequest> {
            self.state.lock().await.calls.clone()
        }

        async fn count(&self, method: Method, route: &str) -> usize {
            self.calls()
                .await
                .iter()
                .filter(|c| c.method == method && c.route() == route)
                .count()
        }
    }

    #[async_trait]
    impl Transport for FakeBackend {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            let should_yield = {
                let mut state = self.state.lock().await;
                state.calls.push(request.clone());
                state.yield_before_reply
            };
            if should_yield {
                tokio::task::yield_now().await;
            }

            let mut state = self.state.lock().await;
            let route = request.route().to_string();

            if route == REFRESH_PATH {
                if state.refresh_status.is_success() {
                    state.session_valid = true;
                }
                return Ok(ApiResponse::new(state.refresh_status, Vec::new()));
            }

            if let Some(status) = state.fixed_status.get(&route) {
                return Ok(ApiResponse::new(*status, b"{\"error\":\"fixed\"}".to_vec()));
            }

            if !state.session_valid {
                return Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new()));
            }

            let status = state
                .valid_status
                .get(&route)
                .copied()
                .unwrap_or(StatusCode::OK);
            let body = json!({ "path": request.path }).to_string();
            Ok(ApiResponse::new(status, body.into_bytes()))
        }
    }

    struct BrokenTransport;

    #[async_trait]
    impl Transport for BrokenTransport {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse> {
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    /// 原請求一律 401；refresh 呼叫在傳輸層就失敗
    #[derive(Default)]
    struct RefreshOutageTransport {
        calls: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl Transport for RefreshOutageTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.calls.lock().await.push(request.clone());

            if request.route() == REFRESH_PATH {
                return Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset during refresh",
                )));
            }
            Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new()))
        }
    }

    fn client(backend: &FakeBackend, policy: RefreshPolicy) -> AuthClient<FakeBackend> {
        let config = ClientConfig::new("http://backend.test").with_refresh_policy(policy);
        AuthClient::new(backend.clone(), &config)
    }

    #[tokio::test]
    async fn test_success_passthrough_without_refresh() {
        let backend = FakeBackend::new(true);
        let client = client(&backend, RefreshPolicy::Independent);

        let response = client.execute(ApiRequest::get("/yachts?page=1")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), r#"{"path":"/yachts?page=1"}"#);
        assert_eq!(backend.calls().await.len(), 1);
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 0);
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_and_replayed() {
        let backend = FakeBackend::new(false);
        let client = client(&backend, RefreshPolicy::Independent);

        let response = client.execute(ApiRequest::get("/yachts?page=1")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let calls = backend.calls().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].path, "/yachts?page=1");
        assert_eq!(calls[1].method, Method::POST);
        assert_eq!(calls[1].path, REFRESH_PATH);
        assert!(calls[1].body.is_none());
        assert_eq!(calls[2], calls[0]);
    }

    #[tokio::test]
    async fn test_replay_is_identical_to_original() {
        let backend = FakeBackend::new(false);
        let client = client(&backend, RefreshPolicy::Independent);

        let request = ApiRequest::post("/bookings")
            .with_header("X-Region", "caribbean")
            .with_query("notify", "true")
            .with_json(&json!({"yacht_id": 12, "days": 7}))
            .unwrap();
        client.execute(request.clone()).await.unwrap();

        let calls = backend.calls().await;
        assert_eq!(calls[0], request);
        assert_eq!(calls[2], request);
        assert_eq!(backend.count(Method::POST, "/bookings").await, 2);
    }

    #[tokio::test]
    async fn test_unauthorized_after_retry_propagates() {
        let backend = FakeBackend::new(false)
            .always("/bookings/123", StatusCode::UNAUTHORIZED)
            .await;
        let client = client(&backend, RefreshPolicy::Independent);

        let err = client
            .execute(ApiRequest::get("/bookings/123"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Status { status, .. } if status == StatusCode::UNAUTHORIZED
        ));
        assert_eq!(backend.count(Method::GET, "/bookings/123").await, 2);
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_short_circuits() {
        let backend = FakeBackend::new(false)
            .refresh_fails_with(StatusCode::UNAUTHORIZED)
            .await;
        let client = client(&backend, RefreshPolicy::Independent);

        let err = client
            .execute(ApiRequest::get("/bookings/123"))
            .await
            .unwrap_err();

        match err {
            ClientError::RefreshFailed { source } => match *source {
                ClientError::Status { ref path, status, .. } => {
                    assert_eq!(path, REFRESH_PATH);
                    assert_eq!(status, StatusCode::UNAUTHORIZED);
                }
                other => panic!("unexpected refresh error: {:?}", other),
            },
            other => panic!("expected RefreshFailed, got {:?}", other),
        }
        assert_eq!(backend.count(Method::GET, "/bookings/123").await, 1);
        assert_eq!(backend.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_non_unauthorized_errors_do_not_refresh() {
        for status in [
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let backend = FakeBackend::new(true).always("/regions/9", status).await;
            let client = client(&backend, RefreshPolicy::Independent);

            let err = client.execute(ApiRequest::get("/regions/9")).await.unwrap_err();

            assert_eq!(err.status(), Some(status));
            assert_eq!(backend.calls().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_replay_result_is_returned_even_when_it_fails() {
        let backend = FakeBackend::new(false)
            .when_valid("/packages", StatusCode::INTERNAL_SERVER_ERROR)
            .await;
        let client = client(&backend, RefreshPolicy::Independent);

        let err = client.execute(ApiRequest::get("/packages")).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!err.is_auth_failure());
        assert_eq!(backend.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_direct_refresh_call_is_not_retried() {
        let backend = FakeBackend::new(false)
            .refresh_fails_with(StatusCode::UNAUTHORIZED)
            .await;
        let client = client(&backend, RefreshPolicy::Independent);

        let err = client
            .execute(ApiRequest::post(REFRESH_PATH))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Status { .. }));
        assert_eq!(backend.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_direct_refresh_call_with_trailing_slash_is_not_retried() {
        let backend = FakeBackend::new(false);
        let client = client(&backend, RefreshPolicy::Independent);

        let err = client
            .execute(ApiRequest::post("/auth/refresh/"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(backend.calls().await.len(), 1);
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 0);
    }

    #[tokio::test]
    async fn test_refresh_transport_error_short_circuits() {
        let config = ClientConfig::new("http://backend.test");
        let client = AuthClient::new(RefreshOutageTransport::default(), &config);

        let err = client
            .execute(ApiRequest::get("/bookings/123"))
            .await
            .unwrap_err();

        match err {
            ClientError::RefreshFailed { source } => {
                assert!(matches!(*source, ClientError::Io(_)));
            }
            other => panic!("expected RefreshFailed, got {:?}", other),
        }

        let calls = client.transport().calls.lock().await.clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].path, "/bookings/123");
        assert_eq!(calls[1].method, Method::POST);
        assert_eq!(calls[1].path, REFRESH_PATH);
        assert_eq!(calls.iter().filter(|c| c.path == "/bookings/123").count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_immediately() {
        let config = ClientConfig::new("http://backend.test");
        let client = AuthClient::new(BrokenTransport, &config);

        let result = client.execute(ApiRequest::get("/customers")).await;
        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(ClientError::Io(_))));
    }

    #[tokio::test]
    async fn test_concurrent_requests_retry_independently() {
        let backend = FakeBackend::new(false).interleaved().await;
        let client = client(&backend, RefreshPolicy::Independent);

        let (yachts, bookings) = tokio::join!(
            client.execute(ApiRequest::get("/yachts")),
            client.execute(ApiRequest::get("/bookings"))
        );

        tokio_test::assert_ok!(&yachts);
        tokio_test::assert_ok!(&bookings);
        assert_eq!(backend.count(Method::GET, "/yachts").await, 2);
        assert_eq!(backend.count(Method::GET, "/bookings").await, 2);
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 2);
    }

    #[tokio::test]
    async fn test_coalesced_policy_shares_one_refresh() {
        let backend = FakeBackend::new(false).interleaved().await;
        let client = client(&backend, RefreshPolicy::Coalesced);

        let (yachts, bookings) = tokio::join!(
            client.execute(ApiRequest::get("/yachts")),
            client.execute(ApiRequest::get("/bookings"))
        );

        tokio_test::assert_ok!(&yachts);
        tokio_test::assert_ok!(&bookings);
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 1);
        assert_eq!(backend.count(Method::GET, "/yachts").await, 2);
        assert_eq!(backend.count(Method::GET, "/bookings").await, 2);
    }

    #[tokio::test]
    async fn test_coalesced_failed_refresh_is_attempted_again() {
        let backend = FakeBackend::new(false)
            .refresh_fails_with(StatusCode::UNAUTHORIZED)
            .await
            .interleaved()
            .await;
        let client = client(&backend, RefreshPolicy::Coalesced);

        let (yachts, bookings) = tokio::join!(
            client.execute(ApiRequest::get("/yachts")),
            client.execute(ApiRequest::get("/bookings"))
        );

        assert!(matches!(yachts, Err(ClientError::RefreshFailed { .. })));
        assert!(matches!(bookings, Err(ClientError::RefreshFailed { .. })));
        assert_eq!(backend.count(Method::POST, REFRESH_PATH).await, 2);
        assert_eq!(backend.count(Method::GET, "/yachts").await, 1);
        assert_eq!(backend.count(Method::GET, "/bookings").await, 1);
    }
}
