//! Producer and collector around the worker pool.
//!
//! The producer feeds records into a bounded queue (a full queue stalls it
//! until a worker drains a slot). Each worker holds a clone of the results
//! sender, so the results queue closes only once every worker has exited;
//! the collector therefore sees every delivered outcome and always terminates.

use super::creator::EntityCreator;
use super::events::{EventSink, ImportEvent};
use super::record::{ImportOutcome, ImportRecord};
use super::worker::{ImportWorker, RecordQueue};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Outcomes gathered by the collector, in completion order.
#[derive(Debug, Default)]
pub struct Collected {
    pub outcomes: Vec<ImportOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
}

pub struct Dispatcher {
    creator: Arc<dyn EntityCreator>,
    cancel: CancellationToken,
    events: EventSink,
}

impl Dispatcher {
    pub fn new(creator: Arc<dyn EntityCreator>, cancel: CancellationToken, events: EventSink) -> Self {
        Self {
            creator,
            cancel,
            events,
        }
    }

    /// Push `records` through `worker_count` workers and collect the outcomes.
    pub async fn run(&self, records: Vec<ImportRecord>, worker_count: usize, batch_size: usize) -> Collected {
        let total = records.len();
        let (record_tx, record_rx) = mpsc::channel(batch_size.max(1));
        let (result_tx, result_rx) = mpsc::channel(total.max(1));
        let queue: RecordQueue = Arc::new(Mutex::new(record_rx));

        let mut pool = JoinSet::new();
        for id in 1..=worker_count.max(1) {
            let worker = ImportWorker::new(id, self.creator.clone(), self.cancel.clone());
            pool.spawn(worker.run(queue.clone(), result_tx.clone()));
        }
        drop(result_tx);

        let producer = self.spawn_producer(records, record_tx);
        let barrier = tokio::spawn(wait_for_workers(pool));

        let collected = self.collect(result_rx, total).await;

        match producer.await {
            Ok(sent) if sent < total => {
                log::warn!("producer stopped after dispatching {} of {} records", sent, total)
            }
            Ok(_) => {}
            Err(e) => log::error!("producer task failed: {}", e),
        }
        if let Err(e) = barrier.await {
            log::error!("worker barrier task failed: {}", e);
        }

        collected
    }

    /// Send records in input order, stopping early on cancellation. The queue
    /// is closed when the task ends either way.
    fn spawn_producer(&self, records: Vec<ImportRecord>, tx: mpsc::Sender<ImportRecord>) -> JoinHandle<usize> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut sent = 0;
            for record in records {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        log::warn!("cancelled while sending records to workers");
                        break;
                    }
                    result = tx.send(record) => {
                        if result.is_err() {
                            log::warn!("record queue closed before all records were sent");
                            break;
                        }
                        sent += 1;
                    }
                }
            }
            sent
        })
    }

    async fn collect(&self, mut rx: mpsc::Receiver<ImportOutcome>, expected: usize) -> Collected {
        let mut collected = Collected {
            outcomes: Vec::with_capacity(expected),
            ..Collected::default()
        };

        while let Some(outcome) = rx.recv().await {
            if outcome.success {
                collected.success_count += 1;
            } else {
                collected.failure_count += 1;
            }
            self.events.emit(ImportEvent::RecordCompleted {
                line_num: outcome.record.line_num,
                success: outcome.success,
            });
            collected.outcomes.push(outcome);
        }

        collected
    }
}

async fn wait_for_workers(mut pool: JoinSet<usize>) -> usize {
    let mut delivered = 0;
    while let Some(result) = pool.join_next().await {
        match result {
            Ok(count) => delivered += count,
            Err(e) => log::error!("import worker panicked: {}", e),
        }
    }
    log::debug!("all workers finished, {} outcomes delivered", delivered);
    delivered
}
