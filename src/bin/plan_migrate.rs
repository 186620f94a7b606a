//! Bring a Plan database up to the latest schema
//!
//! ```text
//! plan-migrate [CONFIG.toml]
//! ```
//!
//! Settings come from the TOML file (default `database.toml`, optional) and `PLAN_DB_`
//! environment variables. Log verbosity follows `RUST_LOG`.

use plan_storage::{Database, DatabaseConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "database.toml";

async fn run(config_path: PathBuf) -> plan_storage::Result<()> {
    let config = DatabaseConfig::load(Some(&config_path))?;
    info!(
        config = %config_path.display(),
        dialect = %config.dialect,
        "migrating database"
    );

    let db = Database::open(&config).await?;
    let report = db.migrate().await?;
    print!("{report}");
    db.close().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    match run(config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "migration failed");
            ExitCode::FAILURE
        }
    }
}
