pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::http::ReqwestTransport;
pub use config::{toml_config::TomlConfig, ClientConfig, RefreshPolicy};
pub use core::{
    client::AuthClient,
    resources::{Resource, ResourceClient},
};
pub use domain::model::{ApiRequest, ApiResponse};
pub use utils::error::{ClientError, Result};
