use std::path::Path;

use cadence::{bot, config::Settings, db};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    if let Err(e) = bot::logging::init(Path::new("logs")) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Cadence v{}", env!("CARGO_PKG_VERSION"));

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::pool::create_pool(&settings.database_path()).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to open database {}: {}", settings.database_path().display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::pool::run_migrations(&pool).await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    info!("Database initialized successfully");

    if let Err(e) = bot::framework::run(settings, pool).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }

    info!("Shut down cleanly");
}
