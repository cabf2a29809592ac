use super::creator::{EntityCreator, NewUser};
use super::record::{ImportOutcome, ImportRecord};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Record queue shared by every worker of a run.
pub type RecordQueue = Arc<Mutex<mpsc::Receiver<ImportRecord>>>;

async fn next_record(queue: &RecordQueue) -> Option<ImportRecord> {
    queue.lock().await.recv().await
}

/// One member of the import worker pool.
///
/// Pulls records until the queue is closed and drained, emitting exactly one
/// outcome per processed record. Every wait also watches the run's
/// cancellation token.
pub struct ImportWorker {
    id: usize,
    creator: Arc<dyn EntityCreator>,
    cancel: CancellationToken,
}

impl ImportWorker {
    pub fn new(id: usize, creator: Arc<dyn EntityCreator>, cancel: CancellationToken) -> Self {
        Self { id, creator, cancel }
    }

    /// Run until the queue closes or the run is cancelled. Returns the number
    /// of outcomes delivered.
    pub async fn run(self, records: RecordQueue, results: mpsc::Sender<ImportOutcome>) -> usize {
        log::debug!("worker {}: started", self.id);
        let mut delivered = 0;

        loop {
            let record = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    log::warn!("worker {}: cancelled while waiting for records", self.id);
                    break;
                }
                next = next_record(&records) => match next {
                    Some(record) => record,
                    None => {
                        log::debug!("worker {}: finished - queue closed", self.id);
                        break;
                    }
                },
            };

            let Some(outcome) = self.process_record(record).await else {
                break;
            };

            // Send is polled first so a computed outcome still goes out when the
            // results queue has room at the moment of cancellation.
            tokio::select! {
                biased;
                sent = results.send(outcome) => {
                    if sent.is_err() {
                        log::warn!("worker {}: results queue closed, stopping", self.id);
                        break;
                    }
                    delivered += 1;
                }
                _ = self.cancel.cancelled() => {
                    log::warn!("worker {}: cancelled while sending result", self.id);
                    break;
                }
            }
        }

        delivered
    }

    /// Validate the role, then create the user.
    ///
    /// Returns `None` only when the run is cancelled while the creator call is
    /// still in flight.
    pub async fn process_record(&self, record: ImportRecord) -> Option<ImportOutcome> {
        log::debug!(
            "worker {}: processing line {} ({} <{}>)",
            self.id,
            record.line_num,
            record.username,
            record.email
        );

        let role = match record.parse_role() {
            Ok(role) => role,
            Err(message) => return Some(ImportOutcome::failed(record, message)),
        };

        let input = NewUser {
            username: record.username.clone(),
            email: record.email.clone(),
            password: record.password.clone(),
            role,
        };

        let created = tokio::select! {
            biased;
            result = self.creator.create_user(input) => result,
            _ = self.cancel.cancelled() => {
                log::warn!(
                    "worker {}: cancelled while creating user from line {}",
                    self.id,
                    record.line_num
                );
                return None;
            }
        };

        match created {
            Ok(user_id) => {
                log::debug!(
                    "worker {}: line {} created user {}",
                    self.id,
                    record.line_num,
                    user_id
                );
                Some(ImportOutcome::created(record, user_id))
            }
            Err(err) => {
                log::error!(
                    "worker {}: failed to create user from line {} <{}>: {}",
                    self.id,
                    record.line_num,
                    record.email,
                    err
                );
                Some(ImportOutcome::failed(record, err.to_string()))
            }
        }
    }
}
