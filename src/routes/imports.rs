//! CSV user import endpoints.

use crate::error::ApiError;
use crate::import::config::MAX_UPLOAD_BYTES;
use crate::import::{ImportConfig, ImportLimits, ImportOverrides, ImportService, ImportSummary, RunContext};
use crate::models::ApiResponse;
use chrono::{DateTime, Utc};
use rocket::data::{Data, ToByteUnit};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{Responder, State, get, post};
use serde::{Deserialize, Serialize};

pub const IMPORT_TEMPLATE: &str = "username,email,password,role
john.doe,john.doe@example.com,password123,manager
jane.smith,jane.smith@example.com,password456,member
bob.wilson,bob.wilson@example.com,password789,member
";

/// Shared import service plus the server-wide base configuration.
pub struct ImportState {
    pub service: ImportService,
    pub base_config: ImportConfig,
}

impl ImportState {
    pub fn new(service: ImportService, base_config: ImportConfig) -> Self {
        Self {
            service,
            base_config,
        }
    }
}

/// Effective configuration echoed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub worker_count: usize,
    pub batch_size: usize,
    pub max_records: usize,
    pub timeout_seconds: u64,
    pub skip_duplicates: bool,
}

impl From<&ImportConfig> for ConfigEcho {
    fn from(config: &ImportConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            batch_size: config.batch_size,
            max_records: config.max_records,
            timeout_seconds: config.timeout.as_secs(),
            skip_duplicates: config.skip_duplicates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub summary: ImportSummary,
    pub config: ConfigEcho,
    pub size_bytes: usize,
    pub processed_at: DateTime<Utc>,
}

/// 200 when every record succeeded, 206 on partial failure, 400 when all failed.
fn status_for(summary: &ImportSummary) -> Status {
    if summary.has_failures() && summary.success_count == 0 {
        Status::BadRequest
    } else if summary.has_failures() {
        Status::PartialContent
    } else {
        Status::Ok
    }
}

/// Import users from a raw CSV request body.
#[post("/import-users?<overrides..>", data = "<body>")]
pub async fn import_users(
    body: Data<'_>,
    overrides: ImportOverrides,
    state: &State<ImportState>,
) -> Result<(Status, Json<ApiResponse<ImportResponse>>), ApiError> {
    let upload = body
        .open(MAX_UPLOAD_BYTES.bytes())
        .into_bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {e}")))?;

    if !upload.is_complete() {
        return Err(ApiError::PayloadTooLarge(format!(
            "File size too large. Maximum allowed: {} MB",
            MAX_UPLOAD_BYTES >> 20
        )));
    }
    let bytes = upload.into_inner();

    let config = state.base_config.clone().with_overrides(&overrides);
    log::info!(
        "CSV import request received ({} bytes, workers={}, timeout={:?})",
        bytes.len(),
        config.worker_count,
        config.timeout
    );

    let summary = state
        .service
        .import_users(bytes.as_slice(), &config, &RunContext::background())
        .await?;

    let status = status_for(&summary);
    let response = ImportResponse {
        message: "CSV import completed".to_string(),
        summary,
        config: ConfigEcho::from(&config),
        size_bytes: bytes.len(),
        processed_at: Utc::now(),
    };

    Ok((status, Json(ApiResponse::new(response))))
}

#[derive(Responder)]
#[response(status = 200, content_type = "text/csv")]
pub struct CsvTemplate {
    body: &'static str,
    disposition: Header<'static>,
}

/// Downloadable CSV template with the expected columns.
#[get("/import-users/template")]
pub fn import_template() -> CsvTemplate {
    CsvTemplate {
        body: IMPORT_TEMPLATE,
        disposition: Header::new(
            "Content-Disposition",
            "attachment; filename=user_import_template.csv",
        ),
    }
}

/// Limits and accepted values for imports.
#[get("/import-users/capabilities")]
pub fn import_capabilities() -> Json<ApiResponse<ImportLimits>> {
    Json(ApiResponse::new(ImportLimits::current()))
}
