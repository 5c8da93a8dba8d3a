use std::time::Duration;

use stakeroom::prelude::*;
use tracing_subscriber::EnvFilter;

/// Process settings, read from the environment.
#[derive(Debug, Clone)]
struct Settings {
    host: String,
    port: u16,
    http_port: u16,
    ledger: LedgerConfig,
}

#[derive(Debug, thiserror::Error)]
enum SettingsError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Settings {
    fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let defaults = LedgerConfig::default();
        let contract = lookup("LEDGER_CONTRACT")
            .filter(|c| !c.trim().is_empty())
            .ok_or(SettingsError::Missing("LEDGER_CONTRACT"))?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&lookup, "PORT")?.unwrap_or(8080),
            http_port: parse(&lookup, "HTTP_PORT")?.unwrap_or(8081),
            ledger: LedgerConfig {
                endpoint: lookup("LEDGER_RPC_URL").unwrap_or(defaults.endpoint),
                contract,
                request_timeout: parse(&lookup, "LEDGER_TIMEOUT_SECS")?
                    .map_or(defaults.request_timeout, Duration::from_secs),
            },
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, SettingsError> {
    lookup(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| SettingsError::Invalid { name, value })
        })
        .transpose()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from_env()?;

    let ledger = HttpLedgerClient::new(settings.ledger.clone())?;
    if let Err(e) = ledger.initialize().await {
        tracing::error!(
            endpoint = %settings.ledger.endpoint,
            error = %e,
            "ledger unavailable, starting degraded"
        );
    }

    let server = StakeroomServerBuilder::new()
        .bind(&format!("{}:{}", settings.host, settings.port))
        .http_bind(&format!("{}:{}", settings.host, settings.http_port))
        .build(ledger)
        .await?;

    tracing::info!(
        ws = %server.local_addr()?,
        http = %server.http_local_addr()?,
        "listening"
    );
    server.run().await?;
    Ok(())
}
