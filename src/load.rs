//! Batch partitioning and remote insert with bounded retry.

use crate::error::Result;
use crate::record::Record;
use crate::remote::RemoteApi;
use std::time::Duration;

/// A batch that exhausted its retries.
#[derive(Debug, Clone)]
pub struct FailedBatch {
    /// Zero-based batch index within the load call.
    pub index: usize,
    /// Number of records the batch carried.
    pub rows: usize,
    /// Last error reported by the remote API.
    pub error: String,
}

/// Summary of one `load` call.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Total records handed to the loader.
    pub attempted: usize,
    /// Records confirmed inserted.
    pub inserted: usize,
    pub failed: Vec<FailedBatch>,
}

impl LoadResult {
    /// True when every batch landed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Submits record sequences to the remote insert API in bounded batches.
///
/// One bad batch never aborts the rest: after `retry_attempts` retries the
/// failure is recorded in the summary and the next batch proceeds.
pub struct BatchLoader<'a, B: RemoteApi> {
    api: &'a B,
    max_batch_size: usize,
    retry_attempts: usize,
    retry_delay: Duration,
}

impl<'a, B: RemoteApi> BatchLoader<'a, B> {
    pub fn new(
        api: &'a B,
        max_batch_size: usize,
        retry_attempts: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            api,
            // A zero batch size would loop forever in chunks()
            max_batch_size: max_batch_size.max(1),
            retry_attempts,
            retry_delay,
        }
    }

    /// Partition `records` into batches of at most `max_batch_size`,
    /// preserving order, and insert each batch independently.
    pub async fn load(&self, table: &str, records: &[Record]) -> Result<LoadResult> {
        let mut result = LoadResult {
            attempted: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            return Ok(result);
        }

        let batch_count = records.len().div_ceil(self.max_batch_size);
        log::info!(
            "Loading {} records into {} ({} batches)",
            records.len(),
            table,
            batch_count
        );

        for (index, batch) in records.chunks(self.max_batch_size).enumerate() {
            match self.insert_with_retry(table, batch).await {
                Ok(()) => {
                    result.inserted += batch.len();
                    log::debug!("{}: batch {}/{} inserted", table, index + 1, batch_count);
                }
                Err(error) => {
                    log::error!(
                        "{}: batch {}/{} failed after {} retries: {}",
                        table,
                        index + 1,
                        batch_count,
                        self.retry_attempts,
                        error
                    );
                    result.failed.push(FailedBatch {
                        index,
                        rows: batch.len(),
                        error,
                    });
                }
            }
        }

        Ok(result)
    }

    /// One initial attempt plus up to `retry_attempts` retries, sleeping
    /// `retry_delay` between attempts. Returns the last error message on
    /// exhaustion.
    async fn insert_with_retry(&self, table: &str, batch: &[Record]) -> std::result::Result<(), String> {
        let mut last_error = String::new();

        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
                log::debug!("{}: retry {}/{}", table, attempt, self.retry_attempts);
            }
            match self.api.insert_batch(table, batch).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e.to_string(),
            }
        }

        Err(last_error)
    }
}
