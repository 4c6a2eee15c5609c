use anyhow::Context;
use biolock::{utils::config::Config, Application};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::new().context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let file_appender = tracing_appender::rolling::daily(&config.server.log_dir, "biolock.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    info!("Starting Biolock v{}", env!("CARGO_PKG_VERSION"));

    let app = Application::new(config).map_err(|e| {
        error!("Failed to initialize application: {}", e);
        e
    })?;

    // Runs until the server receives a shutdown signal.
    app.start().await?;

    info!("Application shutdown complete");
    Ok(())
}
