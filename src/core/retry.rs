use crate::domain::model::Attempt;
use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 2xx：原樣回傳
    Accept,
    /// 第一次收到 401：refresh session 後重送一次
    RefreshAndRetry,
    /// 其他狀態，或重送後仍為 401：直接回報給呼叫端
    Reject,
}

/// 依嘗試次數與回應狀態決定下一步。
///
/// 只有在第一次嘗試收到 401，且請求本身不是 refresh 端點時才會重試，
/// 因此每個請求最多 refresh 一次、重送一次。
pub fn decide(attempt: Attempt, status: StatusCode, is_refresh_call: bool) -> Decision {
    if status.is_success() {
        return Decision::Accept;
    }

    if status == StatusCode::UNAUTHORIZED && attempt.is_first() && !is_refresh_call {
        return Decision::RefreshAndRetry;
    }

    Decision::Reject
}
