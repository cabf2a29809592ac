//! Progress hooks emitted during an import run.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    RunStarted { total: usize },
    RecordCompleted { line_num: usize, success: bool },
    RunFinished { success: usize, failure: usize },
}

/// Optional broadcast sender. Events are dropped when nobody listens.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<broadcast::Sender<ImportEvent>>,
}

impl EventSink {
    pub fn new(tx: broadcast::Sender<ImportEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ImportEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
