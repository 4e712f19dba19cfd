use charter_client::utils::error::ErrorCategory;
use charter_client::utils::{logger, validation::Validate};
use charter_client::{AuthClient, CliConfig, ClientError, ReqwestTransport};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI arguments: {:?}", cli);

    let config = match cli.client_config().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    let request = match cli.request() {
        Ok(request) => request,
        Err(e) => exit_with(e),
    };

    tracing::info!(
        "Using {} (refresh: {}, policy: {:?})",
        config.base_url,
        config.refresh_path,
        config.refresh_policy
    );

    let transport = match ReqwestTransport::new(&config) {
        Ok(transport) => transport,
        Err(e) => exit_with(e),
    };
    let client = AuthClient::new(transport, &config);

    match client.execute(request).await {
        Ok(response) => {
            tracing::info!("✅ {}", response.status);
            println!("{}", response.text());
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: ClientError) -> ! {
    tracing::error!(
        "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.category() {
        ErrorCategory::Configuration => 3,
        ErrorCategory::Authentication => 2,
        ErrorCategory::Network | ErrorCategory::Http | ErrorCategory::Data => 1,
    };
    std::process::exit(exit_code);
}
