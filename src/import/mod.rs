//! Concurrent CSV user import.
//!
//! This module turns an uploaded CSV file into user accounts using a bounded
//! pool of workers:
//!
//! 1. **Parsing** (`parser`) - Validates the header and converts rows into
//!    [`ImportRecord`]s, skipping malformed rows
//! 2. **Dispatch** (`dispatcher`) - Feeds records into a bounded queue and
//!    collects outcomes until every worker has exited
//! 3. **Workers** (`worker`) - Validate the role and call the [`EntityCreator`]
//! 4. **Orchestration** (`service`) - Wires configuration, the run deadline
//!    and the pieces above into a single [`ImportSummary`]
//!
//! # Failure model
//!
//! Rows that cannot be parsed are logged and skipped. Records that fail
//! validation or creation become failed outcomes and never stop the batch.
//! Only header/read problems and cancellation surface as [`ImportError`].
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use import_server::import::{ImportConfig, ImportService, RunContext};
//! use import_server::users::UserDirectory;
//! use std::sync::Arc;
//!
//! let service = ImportService::new(Arc::new(UserDirectory::new()?));
//! let summary = service
//!     .import_users(csv_bytes.as_slice(), &ImportConfig::default(), &RunContext::background())
//!     .await?;
//!
//! println!("{} created, {} failed", summary.success_count, summary.failure_count);
//! ```

pub mod config;
pub mod creator;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod parser;
pub mod record;
pub mod service;
pub mod worker;

pub use config::{ImportConfig, ImportLimits, ImportOverrides};
pub use creator::{CreateError, EntityCreator, NewUser};
pub use error::{ImportError, ImportResult};
pub use events::ImportEvent;
pub use parser::parse_records;
pub use record::{ImportOutcome, ImportRecord, ImportSummary};
pub use service::{ImportService, RunContext};
