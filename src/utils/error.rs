use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} {path} failed with status {status}")]
    Status {
        method: String,
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("Session refresh failed: {source}")]
    RefreshFailed { source: Box<ClientError> },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Http,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Transport(_) => ErrorCategory::Network,
            ClientError::RefreshFailed { .. } => ErrorCategory::Authentication,
            ClientError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                ErrorCategory::Authentication
            }
            ClientError::Status { .. } => ErrorCategory::Http,
            ClientError::Serialization(_) => ErrorCategory::Data,
            ClientError::Io(_)
            | ClientError::InvalidUrl(_)
            | ClientError::ConfigError { .. }
            | ClientError::InvalidConfigValueError { .. }
            | ClientError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Http | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 需要重新登入（refresh 失敗或重試後仍為 401）
    pub fn is_auth_failure(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// 最終回應的 HTTP 狀態；refresh 失敗時回傳 refresh 呼叫本身的狀態
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::RefreshFailed { source } => source.status(),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ClientError::Transport(e) if e.is_timeout() => {
                "The API did not respond in time".to_string()
            }
            ClientError::Transport(_) => "Could not reach the API".to_string(),
            ClientError::RefreshFailed { .. } => {
                "Your session has expired and could not be renewed".to_string()
            }
            ClientError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "You are not signed in".to_string()
            }
            ClientError::Status {
                method,
                path,
                status,
                ..
            } => format!("{} {} was rejected ({})", method, path, status),
            ClientError::Serialization(_) => "The API returned unexpected data".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the base URL and your network connection",
            ErrorCategory::Authentication => "Sign in again to obtain a new session",
            ErrorCategory::Http => "Check the request path, method and payload",
            ErrorCategory::Data => "Check that the request body is valid JSON",
            ErrorCategory::Configuration => "Fix the configuration file or CLI flags",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
