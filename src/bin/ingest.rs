//! One-shot ingest driver: run a single poll cycle (or a single named
//! archive) and print the per-archive summary.

use anyhow::Result;
use clap::Parser;
use tabload::remote::PostgrestClient;
use tabload::watch::{JobState, Watcher};
use tabload::Config;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Process pending archives from the input directory once and exit")]
struct Args {
    /// Only process this archive (file name inside input_dir)
    #[arg(long)]
    archive: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Input directory: {}", config.input_dir().display());

    let client = PostgrestClient::from_env(&config)?;
    let watcher = Watcher::new(config, &client)?;

    let jobs = match &args.archive {
        Some(name) => match watcher.process_one(name).await? {
            Some(job) => vec![job],
            None => anyhow::bail!("Archive '{}' not found in input directory", name),
        },
        None => watcher.poll_once().await?,
    };

    if jobs.is_empty() {
        log::info!("No new archives to process");
        return Ok(());
    }

    let mut failed = 0;
    for job in &jobs {
        match job.state {
            JobState::Done => {
                log::info!(
                    "{}: done, {} records inserted, {} tables, {} file errors",
                    job.archive,
                    job.inserted(),
                    job.tables.len(),
                    job.errors.len()
                );
                for table in &job.tables {
                    let status = if table.skipped_existing {
                        "skipped (already populated)".to_string()
                    } else if let Some(load) = &table.load {
                        format!(
                            "{}/{} inserted, {} failed batches",
                            load.inserted,
                            load.attempted,
                            load.failed.len()
                        )
                    } else {
                        "not loaded".to_string()
                    };
                    log::info!(
                        "  {} → {}: {} rows parsed ({} skipped), {}",
                        table.source_file,
                        table.table,
                        table.parsed,
                        table.skipped_rows,
                        status
                    );
                }
            }
            _ => {
                failed += 1;
                log::error!("{}: failed: {}", job.archive, job.errors.join("; "));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} archives failed", failed, jobs.len());
    }
    Ok(())
}
