//! Batch execution over a bounded worker pool.
//!
//! Workers pull `(index, job)` pairs from a shared queue and push
//! `(index, result)` pairs back; results are placed by index, so the batch
//! reports in submission order whatever order the jobs finished in.

use std::any::Any;
use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crossbeam_channel::unbounded;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::ports::fetcher::SourceKind;

use super::coordinator::{SyncCoordinator, SyncOptions, SyncResult};

/// One source to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    /// Source type.
    pub source_type: SourceKind,
    /// Source id.
    pub source_id: String,
    /// Per-job switches.
    pub options: SyncOptions,
}

impl SyncJob {
    /// A job with default options.
    #[must_use]
    pub fn new(source_type: SourceKind, source_id: &str) -> Self {
        Self {
            source_type,
            source_id: source_id.to_string(),
            options: SyncOptions::default(),
        }
    }

    /// Replaces the job's options.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses `type:id`, e.g. `confluence:12345`.
    ///
    /// # Errors
    ///
    /// Returns an error if the separator is missing, the id is empty, or the
    /// type is unknown.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let (kind, id) = spec
            .split_once(':')
            .ok_or_else(|| format!("Invalid source '{spec}': expected <type>:<id>"))?;
        if id.trim().is_empty() {
            return Err(format!("Invalid source '{spec}': empty id"));
        }
        Ok(Self::new(kind.parse()?, id.trim()))
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSyncResult {
    /// Jobs submitted.
    pub total_sources: usize,
    /// Jobs whose result has `success = true`.
    pub successful: usize,
    /// Jobs whose result has `success = false`.
    pub failed: usize,
    /// Per-job results in submission order.
    pub results: Vec<SyncResult>,
    /// Wall-clock duration of the whole batch.
    pub duration_seconds: f64,
}

impl BatchSyncResult {
    fn from_results(results: Vec<SyncResult>, duration_seconds: f64) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_sources: results.len(),
            successful,
            failed: results.len() - successful,
            results,
            duration_seconds,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl SyncCoordinator<'_> {
    /// Runs one job, converting a panic into a failed result.
    fn run_job(&self, job: &SyncJob) -> SyncResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sync_one(job.source_type, &job.source_id, &job.options)
        }));
        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(
                source_type = %job.source_type,
                source_id = %job.source_id,
                panic = %message,
                "Sync job panicked"
            );
            SyncResult::failed(
                job.source_type,
                &job.source_id,
                self.now(),
                format!("Sync job panicked: {message}"),
            )
        })
    }

    /// Runs `jobs` and aggregates their results.
    ///
    /// With `parallel`, up to `max_workers` threads (at least one, at most one
    /// per job) share the queue; otherwise jobs run one after another on the
    /// calling thread. Either way results come back in submission order and
    /// no job's failure or panic affects another.
    pub fn batch_sync(
        &self,
        jobs: &[SyncJob],
        parallel: bool,
        max_workers: usize,
    ) -> BatchSyncResult {
        let timer = Instant::now();
        info!(
            jobs = jobs.len(),
            parallel,
            max_workers,
            "Starting batch sync"
        );

        let results = if parallel && jobs.len() > 1 {
            self.run_parallel(jobs, max_workers.clamp(1, jobs.len()))
        } else {
            jobs.iter().map(|job| self.run_job(job)).collect()
        };

        let batch = BatchSyncResult::from_results(results, timer.elapsed().as_secs_f64());
        info!(
            total = batch.total_sources,
            successful = batch.successful,
            failed = batch.failed,
            "Batch sync finished"
        );
        batch
    }

    fn run_parallel(&self, jobs: &[SyncJob], workers: usize) -> Vec<SyncResult> {
        let (job_tx, job_rx) = unbounded::<(usize, &SyncJob)>();
        let (result_tx, result_rx) = unbounded::<(usize, SyncResult)>();
        for entry in jobs.iter().enumerate() {
            // The receiver is alive in this scope, so the send cannot fail.
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, job) in job_rx {
                        debug!(worker, index, source_id = %job.source_id, "Worker picked up job");
                        if result_tx.send((index, self.run_job(job))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<SyncResult>> = jobs.iter().map(|_| None).collect();
        for (index, result) in result_rx.try_iter() {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    SyncResult::failed(
                        job.source_type,
                        &job.source_id,
                        self.now(),
                        "Worker exited without reporting a result",
                    )
                })
            })
            .collect()
    }
}

/// Renders a batch summary followed by one line per job.
#[must_use]
pub fn format_batch_result(batch: &BatchSyncResult) -> String {
    let mut out = format!(
        "Batch: {} sources, {} successful, {} failed ({:.2}s)\n",
        batch.total_sources, batch.successful, batch.failed, batch.duration_seconds
    );
    for result in &batch.results {
        let status = if result.success { "OK" } else { "FAILED" };
        let _ = write!(
            out,
            "  [{status}] {}:{} tables={} updated={}",
            result.source_type, result.source_id, result.tables_found, result.tables_updated
        );
        if let Some(first) = result.errors.first() {
            let _ = write!(out, " error: {first}");
        }
        out.push('\n');
    }
    out
}
