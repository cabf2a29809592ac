use super::error::{ImportError, ImportResult};
use crate::models::UserRole;
use serde::{Deserialize, Serialize};
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

pub const WORKER_COUNT_RANGE: RangeInclusive<usize> = 1..=20;
pub const BATCH_SIZE_RANGE: RangeInclusive<usize> = 1..=1000;
pub const MAX_RECORDS_RANGE: RangeInclusive<usize> = 1..=10_000;
pub const TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=300;
pub const MAX_UPLOAD_BYTES: u64 = 5 << 20;

/// Column names the header must start with, in order.
pub const REQUIRED_COLUMNS: [&str; 4] = ["username", "email", "password", "role"];

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize, range: &RangeInclusive<usize>) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| range.contains(value))
        .unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| TIMEOUT_SECS_RANGE.contains(secs))
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Settings for one import run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub worker_count: usize,
    /// Capacity of the record queue between the producer and the workers.
    pub batch_size: usize,
    pub timeout: Duration,
    /// `0` means unbounded.
    pub max_records: usize,
    pub skip_duplicates: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            batch_size: 100,
            timeout: Duration::from_secs(30),
            max_records: 1000,
            skip_duplicates: true,
        }
    }
}

impl ImportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_usize("IMPORT_WORKER_COUNT", defaults.worker_count, &WORKER_COUNT_RANGE),
            batch_size: env_usize("IMPORT_BATCH_SIZE", defaults.batch_size, &BATCH_SIZE_RANGE),
            timeout: env_duration_secs("IMPORT_TIMEOUT_SECS", defaults.timeout),
            max_records: env_usize("IMPORT_MAX_RECORDS", defaults.max_records, &MAX_RECORDS_RANGE),
            skip_duplicates: env_bool("IMPORT_SKIP_DUPLICATES", defaults.skip_duplicates),
        }
    }

    pub fn validate(&self) -> ImportResult<()> {
        if self.worker_count == 0 {
            return Err(ImportError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ImportError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ImportError::InvalidConfig("timeout must be positive".into()));
        }
        Ok(())
    }

    /// Cap from `max_records`, `None` when unbounded.
    pub fn record_cap(&self) -> Option<usize> {
        (self.max_records > 0).then_some(self.max_records)
    }

    /// Apply caller overrides; values outside the allowed ranges are ignored.
    pub fn with_overrides(mut self, overrides: &ImportOverrides) -> Self {
        if let Some(workers) = overrides.worker_count.filter(|v| WORKER_COUNT_RANGE.contains(v)) {
            self.worker_count = workers;
        }
        if let Some(batch) = overrides.batch_size.filter(|v| BATCH_SIZE_RANGE.contains(v)) {
            self.batch_size = batch;
        }
        if let Some(max) = overrides.max_records.filter(|v| MAX_RECORDS_RANGE.contains(v)) {
            self.max_records = max;
        }
        if let Some(secs) = overrides.timeout_seconds.filter(|v| TIMEOUT_SECS_RANGE.contains(v)) {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(skip) = overrides.skip_duplicates {
            self.skip_duplicates = skip;
        }
        self
    }
}

/// Caller-supplied tuning, typically parsed from a request query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, rocket::FromForm)]
pub struct ImportOverrides {
    pub worker_count: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_records: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub skip_duplicates: Option<bool>,
}

/// Static description of what an import accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLimits {
    pub max_file_size_mb: u64,
    pub max_records: usize,
    pub max_workers: usize,
    pub max_batch_size: usize,
    pub max_timeout_seconds: u64,
    pub supported_formats: Vec<String>,
    pub required_columns: Vec<String>,
    pub supported_roles: Vec<String>,
}

impl ImportLimits {
    pub fn current() -> Self {
        Self {
            max_file_size_mb: MAX_UPLOAD_BYTES >> 20,
            max_records: *MAX_RECORDS_RANGE.end(),
            max_workers: *WORKER_COUNT_RANGE.end(),
            max_batch_size: *BATCH_SIZE_RANGE.end(),
            max_timeout_seconds: *TIMEOUT_SECS_RANGE.end(),
            supported_formats: vec!["CSV".to_string()],
            required_columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            supported_roles: UserRole::ALL.iter().map(|r| r.to_string()).collect(),
        }
    }
}
