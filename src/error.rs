use crate::import::{ImportError, ImportSummary};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(String),
    Timeout {
        message: String,
        partial: Option<Box<ImportSummary>>,
    },
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial_summary: Option<Box<ImportSummary>>,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message, partial_summary) = match self {
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg, None)
            }
            ApiError::PayloadTooLarge(msg) => {
                log::debug!("payload too large: {}", msg);
                (Status::PayloadTooLarge, "PayloadTooLarge", msg, None)
            }
            ApiError::Timeout { message, partial } => {
                log::warn!("import timed out: {}", message);
                (Status::GatewayTimeout, "Timeout", message, partial)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (Status::InternalServerError, "InternalError", msg, None)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            partial_summary,
        };

        let json = serde_json::to_string(&error_response)
            .unwrap_or_else(|_| r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = format!("Failed to process CSV import: {err}");
        match err {
            ImportError::MissingHeader
            | ImportError::HeaderMismatch { .. }
            | ImportError::Read(_)
            | ImportError::InvalidConfig(_) => ApiError::BadRequest(message),
            ImportError::TimedOut | ImportError::Cancelled => ApiError::Timeout {
                message,
                partial: None,
            },
            ImportError::Interrupted { summary, .. } => ApiError::Timeout {
                message,
                partial: Some(summary),
            },
        }
    }
}
