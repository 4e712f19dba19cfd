pub mod client;
pub mod resources;
pub mod retry;

pub use crate::domain::model::{ApiRequest, ApiResponse, Attempt};
pub use crate::domain::ports::Transport;
pub use crate::utils::error::Result;
