//! Long-lived ingest daemon: watch the input directory and load every new
//! archive into the remote database until stopped.

use anyhow::Result;
use tabload::remote::PostgrestClient;
use tabload::watch::Watcher;
use tabload::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    log::info!("Starting Tabload v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Watching: {}", config.input_dir().display());
    log::info!(
        "Batch size: {}, retries: {}, poll every {}s",
        config.loader.max_batch_size,
        config.loader.retry_attempts,
        config.watcher.poll_interval_secs
    );

    // Client lives for the whole process; the watcher only borrows it
    let client = PostgrestClient::from_env(&config)?;
    let poll_interval = config.poll_interval();

    let watcher = Watcher::new(config, &client)?;
    watcher.run(poll_interval).await?;

    log::info!("Stopped");
    Ok(())
}
