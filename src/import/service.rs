use super::config::ImportConfig;
use super::creator::EntityCreator;
use super::dispatcher::Dispatcher;
use super::error::{ImportError, ImportResult};
use super::events::{EventSink, ImportEvent};
use super::parser::parse_records;
use super::record::{ImportSummary, format_duration};
use std::io::Read;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-side cancellation and deadline for a run.
///
/// The run's own `config.timeout` is applied on top; whichever deadline
/// comes first wins.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    fn effective_deadline(&self, start: Instant, timeout: std::time::Duration) -> Instant {
        let own = start + timeout;
        match self.deadline {
            Some(caller) if caller < own => caller,
            _ => own,
        }
    }
}

/// Entry point for CSV user imports.
#[derive(Clone)]
pub struct ImportService {
    creator: Arc<dyn EntityCreator>,
    events: EventSink,
}

impl ImportService {
    pub fn new(creator: Arc<dyn EntityCreator>) -> Self {
        Self {
            creator,
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, tx: broadcast::Sender<ImportEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Parse `reader` and create one user per accepted row.
    ///
    /// Record-level failures are reported in the summary, never as errors;
    /// check `failure_count`. Errors are reserved for a bad header, a failed
    /// read, invalid configuration, or a run cut short by its deadline or by
    /// the caller, in which case any partial summary rides on the error.
    ///
    /// `reader` is consumed synchronously on the calling task before any
    /// worker starts, so it should be in memory (a request body or a file
    /// already loaded with `tokio::fs::read`).
    pub async fn import_users<R: Read>(
        &self,
        reader: R,
        config: &ImportConfig,
        ctx: &RunContext,
    ) -> ImportResult<ImportSummary> {
        let start = Instant::now();
        config.validate()?;

        log::info!(
            "starting CSV user import (workers={}, batch_size={}, max_records={})",
            config.worker_count,
            config.batch_size,
            config.max_records
        );

        let records = parse_records(reader, config.max_records, config.skip_duplicates)?;

        if records.is_empty() {
            log::info!("CSV import contained no records");
            return Ok(ImportSummary::empty(start.elapsed()));
        }

        let total = records.len();
        log::info!("parsed {} CSV records", total);
        self.events.emit(ImportEvent::RunStarted { total });

        let run_cancel = ctx.cancel.child_token();
        let deadline = ctx.effective_deadline(start, config.timeout);
        let timer = {
            let run_cancel = run_cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        log::warn!("import deadline reached, cancelling workers");
                        run_cancel.cancel();
                    }
                    _ = run_cancel.cancelled() => {}
                }
            })
        };

        let dispatcher = Dispatcher::new(self.creator.clone(), run_cancel.clone(), self.events.clone());
        let collected = dispatcher
            .run(records, config.worker_count, config.batch_size)
            .await;
        timer.abort();

        let elapsed = start.elapsed();
        let completed = collected.outcomes.len();
        let summary = ImportSummary {
            total_records: total,
            success_count: collected.success_count,
            failure_count: collected.failure_count,
            processing_time: format_duration(elapsed),
            elapsed,
            results: collected.outcomes,
        };

        self.events.emit(ImportEvent::RunFinished {
            success: summary.success_count,
            failure: summary.failure_count,
        });
        log::info!(
            "CSV import completed: total={}, success={}, failed={}, duration={}",
            total,
            summary.success_count,
            summary.failure_count,
            summary.processing_time
        );

        if summary.is_complete() {
            return Ok(summary);
        }

        log::warn!("CSV import interrupted after {} of {} records", completed, total);
        if completed > 0 {
            Err(ImportError::Interrupted {
                completed,
                total,
                summary: Box::new(summary),
            })
        } else if ctx.cancel.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Err(ImportError::TimedOut)
        }
    }
}
