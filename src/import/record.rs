//! Records, per-record outcomes and the run summary.

use crate::models::UserRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One accepted CSV row awaiting user creation.
///
/// The password is never serialized and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRecord {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: String,
    /// 1-based source line (header is line 1).
    pub line_num: usize,
}

impl ImportRecord {
    /// Map the raw role column onto a supported role, case-insensitively.
    pub fn parse_role(&self) -> Result<UserRole, String> {
        UserRole::parse(&self.role).ok_or_else(|| {
            format!(
                "invalid role '{}'. Must be '{}' or '{}'",
                self.role,
                UserRole::Manager,
                UserRole::Member
            )
        })
    }
}

impl fmt::Debug for ImportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRecord")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("line_num", &self.line_num)
            .finish()
    }
}

/// Result of attempting to create one user from one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub record: ImportRecord,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ImportOutcome {
    pub fn created(record: ImportRecord, user_id: String) -> Self {
        Self {
            record,
            success: true,
            error: None,
            user_id: Some(user_id),
        }
    }

    pub fn failed(record: ImportRecord, error: impl Into<String>) -> Self {
        Self {
            record,
            success: false,
            error: Some(error.into()),
            user_id: None,
        }
    }
}

/// Aggregate view of one import run. Outcomes are in completion order;
/// match on `record.line_num` to recover input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub processing_time: String,
    #[serde(skip)]
    pub elapsed: Duration,
    pub results: Vec<ImportOutcome>,
}

impl ImportSummary {
    /// Zero-valued summary for inputs that produced no records.
    pub fn empty(elapsed: Duration) -> Self {
        Self::from_outcomes(0, Vec::new(), elapsed)
    }

    pub fn from_outcomes(total_records: usize, results: Vec<ImportOutcome>, elapsed: Duration) -> Self {
        let success_count = results.iter().filter(|outcome| outcome.success).count();
        let failure_count = results.len() - success_count;

        Self {
            total_records,
            success_count,
            failure_count,
            processing_time: format_duration(elapsed),
            elapsed,
            results,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.success_count + self.failure_count == self.total_records
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

/// Human-readable duration such as `1.5s` or `250ms`.
pub fn format_duration(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}
