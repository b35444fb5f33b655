//! Ingest watcher: poll the input directory, drive extract → parse → load
//! per archive, and move finished archives out of the way.
//!
//! Archives are claimed by renaming them into the work directory before any
//! processing starts; the rename is the only mutual-exclusion mechanism, so
//! a concurrently running poll can never double-process an archive.

use crate::config::Config;
use crate::error::{Result, TabloadError};
use crate::extract::{extract_archive, ScratchDir};
use crate::load::{BatchLoader, LoadResult};
use crate::parse::parse_file;
use crate::record::{table_target, Period};
use crate::remote::RemoteApi;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Per-archive lifecycle. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Discovered,
    Extracting,
    Parsing,
    Loading,
    /// Terminal: archive moved to the processed directory.
    Done,
    /// Terminal: archive moved to quarantine for manual inspection.
    Failed,
}

/// Load outcome for one (file, table) pair inside an archive.
#[derive(Debug, Clone)]
pub struct TableReport {
    pub source_file: String,
    pub table: String,
    pub parsed: usize,
    pub skipped_rows: usize,
    /// True when the remote table already held rows and inserts were skipped.
    pub skipped_existing: bool,
    pub load: Option<LoadResult>,
}

/// Result of processing one discovered archive.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub archive: String,
    pub state: JobState,
    pub period: Option<Period>,
    pub tables: Vec<TableReport>,
    /// Per-file errors; populated for Failed jobs and partial file failures.
    pub errors: Vec<String>,
}

impl ArchiveJob {
    /// Total records confirmed inserted across all tables.
    pub fn inserted(&self) -> usize {
        self.tables
            .iter()
            .filter_map(|t| t.load.as_ref())
            .map(|l| l.inserted)
            .sum()
    }
}

/// Polls the input directory and processes archives one at a time.
pub struct Watcher<'a, B: RemoteApi> {
    api: &'a B,
    config: Config,
}

impl<'a, B: RemoteApi> Watcher<'a, B> {
    /// Create a watcher, ensuring the private directories exist.
    pub fn new(config: Config, api: &'a B) -> Result<Self> {
        fs::create_dir_all(&config.watcher.work_dir)?;
        fs::create_dir_all(&config.watcher.processed_dir)?;
        fs::create_dir_all(&config.watcher.quarantine_dir)?;
        Ok(Self { api, config })
    }

    /// Run one poll cycle: discover unclaimed archives and process each to a
    /// terminal state. Archives are handled sequentially; the returned jobs
    /// are in processing order (newest archive name first).
    pub async fn poll_once(&self) -> Result<Vec<ArchiveJob>> {
        let archives = self.discover()?;
        let mut jobs = Vec::new();

        for archive_name in archives {
            let claimed = match self.claim(&archive_name)? {
                Some(path) => path,
                // Another cycle renamed it first; not ours to process
                None => continue,
            };

            log::info!("Processing archive: {}", archive_name);
            let job = self.process_archive(&claimed, &archive_name).await;

            match job.state {
                JobState::Done => {
                    self.move_to_processed(&claimed, &archive_name)?;
                    log::info!(
                        "{}: done, {} records inserted across {} tables",
                        archive_name,
                        job.inserted(),
                        job.tables.len()
                    );
                }
                JobState::Failed => {
                    self.move_to_quarantine(&claimed, &archive_name)?;
                    log::error!(
                        "{}: failed ({}), moved to quarantine",
                        archive_name,
                        job.errors.join("; ")
                    );
                }
                // process_archive only returns terminal states
                _ => unreachable!("archive left in non-terminal state"),
            }

            jobs.push(job);
        }

        Ok(jobs)
    }

    /// Process a single named archive from the input directory, skipping
    /// discovery. Returns None when the archive is absent or already claimed.
    pub async fn process_one(&self, archive_name: &str) -> Result<Option<ArchiveJob>> {
        if !archive_name.to_lowercase().ends_with(".zip") {
            return Err(TabloadError::UnsupportedFormat(archive_name.to_string()));
        }

        let claimed = match self.claim(archive_name)? {
            Some(path) => path,
            None => return Ok(None),
        };

        log::info!("Processing archive: {}", archive_name);
        let job = self.process_archive(&claimed, archive_name).await;
        match job.state {
            JobState::Done => self.move_to_processed(&claimed, archive_name)?,
            _ => self.move_to_quarantine(&claimed, archive_name)?,
        }
        Ok(Some(job))
    }

    /// Poll on a fixed interval until ctrl-c. An in-flight cycle always
    /// finishes before the loop stops, so no archive is left mid-state.
    pub async fn run(&self, poll_interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(jobs) if jobs.is_empty() => {
                            log::debug!("No new archives in {}", self.config.input_dir().display());
                        }
                        Ok(jobs) => {
                            log::info!("Poll cycle processed {} archives", jobs.len());
                        }
                        Err(e) => {
                            log::error!("Poll cycle error: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// List unprocessed archives in the input directory, newest name first.
    fn discover(&self) -> Result<Vec<String>> {
        let mut archives = Vec::new();

        for entry in WalkDir::new(self.config.input_dir())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            if name.starts_with('.') || name.starts_with('~') {
                continue;
            }
            if !name.to_lowercase().ends_with(".zip") {
                continue;
            }
            archives.push(name);
        }

        // Archive names carry dates, so reverse lexicographic puts the
        // newest reporting period first
        archives.sort_by(|a, b| b.cmp(a));
        Ok(archives)
    }

    /// Claim an archive by renaming it into the work directory. Returns None
    /// when the rename loses the race (file already claimed or removed).
    fn claim(&self, archive_name: &str) -> Result<Option<PathBuf>> {
        let source = self.config.input_dir().join(archive_name);
        let claimed = self.config.watcher.work_dir.join(archive_name);

        match fs::rename(&source, &claimed) {
            Ok(()) => Ok(Some(claimed)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{}: already claimed elsewhere", archive_name);
                Ok(None)
            }
            Err(e) => Err(TabloadError::Io(e)),
        }
    }

    /// Drive one claimed archive to a terminal state. Never returns an
    /// error: every failure is captured in the job so the rest of the poll
    /// cycle continues.
    async fn process_archive(&self, claimed: &Path, archive_name: &str) -> ArchiveJob {
        let period = Period::from_file_name(archive_name);
        let mut job = ArchiveJob {
            archive: archive_name.to_string(),
            state: JobState::Discovered,
            period,
            tables: Vec::new(),
            errors: Vec::new(),
        };

        let stem = archive_name.trim_end_matches(".zip");

        job.state = JobState::Extracting;
        let scratch = match ScratchDir::create(&self.config.watcher.work_dir, stem) {
            Ok(s) => s,
            Err(e) => {
                job.errors.push(format!("scratch dir: {}", e));
                job.state = JobState::Failed;
                return job;
            }
        };

        let files = match extract_archive(claimed, &scratch) {
            Ok(files) => files,
            Err(e) => {
                job.errors.push(e.to_string());
                job.state = JobState::Failed;
                return job;
            }
        };

        if files.is_empty() {
            job.errors.push("archive contains no data files".to_string());
            job.state = JobState::Failed;
            return job;
        }

        let mut succeeded_files = 0;
        for file in &files {
            job.state = JobState::Parsing;
            let tables = match parse_file(file) {
                Ok(tables) => tables,
                Err(e) => {
                    log::warn!("{}: {}", archive_name, e);
                    job.errors.push(e.to_string());
                    continue;
                }
            };

            job.state = JobState::Loading;
            for parsed in tables {
                let report = self.load_table(file, parsed, period).await;
                job.tables.push(report);
            }
            succeeded_files += 1;
        }

        // The archive as a whole fails only when nothing in it was usable;
        // per-file and per-batch failures are recorded, not fatal.
        job.state = if succeeded_files > 0 {
            JobState::Done
        } else {
            JobState::Failed
        };
        job
    }

    /// Load one parsed table, honoring the populated-table skip.
    async fn load_table(
        &self,
        file: &Path,
        parsed: crate::parse::ParsedTable,
        period: Option<Period>,
    ) -> TableReport {
        let table = table_target(file, parsed.sheet.as_deref(), period, &self.config.tables);
        let source_file = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut report = TableReport {
            source_file,
            table: table.clone(),
            parsed: parsed.records.len(),
            skipped_rows: parsed.skipped_rows,
            skipped_existing: false,
            load: None,
        };

        if self.config.loader.skip_populated {
            match self.api.count_rows(&table).await {
                Ok(existing) if existing > 0 => {
                    log::info!(
                        "{}: table already has {} records, skipping insertion",
                        table,
                        existing
                    );
                    report.skipped_existing = true;
                    return report;
                }
                Ok(_) => {}
                Err(e) => {
                    // Count is an optimization; fall through to the insert
                    log::warn!("{}: count check failed: {}", table, e);
                }
            }
        }

        let loader = BatchLoader::new(
            self.api,
            self.config.loader.max_batch_size,
            self.config.loader.retry_attempts,
            Duration::from_millis(self.config.loader.retry_delay_ms),
        );

        match loader.load(&table, &parsed.records).await {
            Ok(result) => report.load = Some(result),
            Err(e) => {
                // load() only fails on non-remote errors; record and move on
                log::error!("{}: {}", table, e);
                report.load = Some(LoadResult {
                    attempted: report.parsed,
                    inserted: 0,
                    failed: Vec::new(),
                });
            }
        }

        report
    }

    fn move_to_processed(&self, claimed: &Path, archive_name: &str) -> Result<()> {
        let stem = archive_name.trim_end_matches(".zip");
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let dest = self
            .config
            .watcher
            .processed_dir
            .join(format!("{}_{}.zip", stem, timestamp));
        fs::rename(claimed, dest)?;
        Ok(())
    }

    fn move_to_quarantine(&self, claimed: &Path, archive_name: &str) -> Result<()> {
        let dest = self.config.watcher.quarantine_dir.join(archive_name);
        fs::rename(claimed, dest)?;
        Ok(())
    }
}
