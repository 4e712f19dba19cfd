use crate::domain::model::{ApiRequest, ApiResponse};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 實際送出 HTTP 請求的傳輸層。
///
/// 任何 HTTP 狀態都以 `ApiResponse` 回傳；只有連線、逾時等傳輸失敗才是錯誤。
/// 憑證（session cookie）完全由實作自行管理。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

