use std::process::ExitCode;

use anyhow::Context;
use strongbox::{
    config::{LoggingConfig, SecretsConfig},
    observability::{describe_metrics, init_logging},
    secrets::{SecretRegistry, SecretsManager},
    SecretsError, APP_NAME, VERSION,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    match LoggingConfig::from_env() {
        Ok(logging) => init_logging(&logging),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }
    describe_metrics();

    info!(app_name = APP_NAME, version = VERSION, "Starting secret loading");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SecretsError>() {
                Some(load @ SecretsError::LoadFailed { .. }) => {
                    error!(violations = load.violations().len(), "Refusing to start");
                    eprintln!("{}", load);
                }
                _ => {
                    error!(error = %e, "Secret loading aborted");
                    eprintln!("Error: {:#}", e);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = SecretsConfig::from_env().context("invalid secrets configuration")?;
    let registry = SecretRegistry::standard()?;
    let manager = SecretsManager::from_config(&config, registry)?;

    let health = manager.health_check().await;
    if !health.is_healthy() {
        error!(
            provider = %manager.provider_kind(),
            error = health.error.as_deref().unwrap_or("unknown"),
            "Secrets provider is unhealthy"
        );
    }

    let loaded = manager.load_all(config.environment).await?;

    println!(
        "Loaded {} of {} secrets from {} ({}):",
        loaded.len(),
        manager.registry().len(),
        manager.provider_kind(),
        config.environment
    );
    for name in loaded.keys() {
        println!("  - {}", name);
    }
    Ok(())
}
