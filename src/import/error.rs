use super::record::ImportSummary;
use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

/// Run-level failures. Row- and record-level problems never surface here:
/// rows are skipped by the parser and records become failed outcomes.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read CSV header: input is empty")]
    MissingHeader,
    #[error("invalid CSV header. Expected: {expected:?}, Got: {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("failed to read CSV input: {0}")]
    Read(#[source] csv::Error),
    #[error("invalid import configuration: {0}")]
    InvalidConfig(String),
    #[error("processing timed out before any record completed")]
    TimedOut,
    #[error("import cancelled by caller before any record completed")]
    Cancelled,
    #[error("import interrupted after {completed} of {total} records")]
    Interrupted {
        completed: usize,
        total: usize,
        summary: Box<ImportSummary>,
    },
}

impl ImportError {
    /// Partial summary assembled before the run was cancelled, if any.
    pub fn partial_summary(&self) -> Option<&ImportSummary> {
        match self {
            ImportError::Interrupted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
