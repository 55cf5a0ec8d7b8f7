use clap::Parser;
use tracing::{error, info};

use vault_migrator::cli::{run_cli, Cli};
use vault_migrator::{APP_NAME, VERSION};

#[tokio::main]
async fn main() {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(summary) => {
            info!(app_name = APP_NAME, version = VERSION, abandoned = summary.abandoned(), "completed");
        }
        Err(err) => {
            error!(app_name = APP_NAME, version = VERSION, error = %err, "failed");
            eprintln!("Failed: {:#}", err);
            std::process::exit(1);
        }
    }
}
