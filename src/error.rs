//! # Error Handling
//!
//! This module defines the error type returned by the HTTP handlers and how each
//! variant is turned into an HTTP response.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Result<T, E> Type
//! - **T**: The success type (what you get when everything works)
//! - **E**: The error type (what you get when something goes wrong)
//! - **?**: Returns early with the error, converting it through `From` on the way
//!
//! ### Traits for Error Conversion
//! - **From trait**: Automatically converts library errors into `AppError`
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines the message the client sees
//!
//! ## Response format:
//! Every error is rendered as a flat JSON object so the front-end can show it as-is:
//! ```json
//! { "error": "Could not decode WAV file: no RIFF tag found" }
//! ```
//!
//! Per-combination encode failures are NOT represented here. They live inside
//! `CombinationOutcome` (see `audio::matrix`) and never abort a request.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **InputTooSmall**: Upload missing, empty, or shorter than a WAV header (400)
/// - **UploadTooLarge**: Upload exceeded the configured size cap (400)
/// - **DecodeFailure**: The codec could not parse the declared WAV (400)
/// - **BadRequest**: Malformed multipart body or form fields (400)
/// - **Internal**: Anything unexpected (500)
/// - **ConfigError**: Configuration problems (500)
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::DecodeFailure("no RIFF tag found".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Number of bytes actually received
    InputTooSmall(usize),

    /// Upload was cut off once it passed `limit` bytes
    UploadTooLarge { size: usize, limit: usize },

    /// The codec library's own error text
    DecodeFailure(String),

    BadRequest(String),

    Internal(String),

    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputTooSmall(size) => write!(
                f,
                "Uploaded file is empty or too small to be a WAV file ({} bytes, minimum {})",
                size,
                crate::handlers::convert::MIN_WAV_HEADER_BYTES
            ),
            AppError::UploadTooLarge { size, limit } => write!(
                f,
                "Uploaded file is too large ({} bytes, maximum {})",
                size, limit
            ),
            AppError::DecodeFailure(msg) => write!(f, "Could not decode WAV file: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - InputTooSmall/UploadTooLarge/DecodeFailure/BadRequest → 400 (Bad Request)
/// - Internal/ConfigError → 500 (Internal Server Error)
///
/// The message of a 500 is the raw error text. The front-end shows it directly,
/// so nothing is redacted here.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InputTooSmall(_)
            | AppError::UploadTooLarge { .. }
            | AppError::DecodeFailure(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error inside a handler, it becomes an
/// `AppError::Internal` (a 500).
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Multipart errors are almost always caused by the client sending a broken
/// body (wrong boundary, truncated stream), so they map to 400.
impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Multipart error: {}", err))
    }
}

/// `hound` only runs on the decode path of a request, so its errors are
/// always a malformed upload.
impl From<hound::Error> for AppError {
    fn from(err: hound::Error) -> Self {
        AppError::DecodeFailure(err.to_string())
    }
}

/// The blocking thread pool refused or lost the job. Never the client's fault.
impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Conversion task failed: {}", err))
    }
}

/// Type alias for Results that use our custom error type.
///
/// ## Usage Example:
/// ```rust
/// async fn convert(...) -> AppResult<HttpResponse> {
///     // equivalent to: Result<HttpResponse, AppError>
/// }
/// ```
pub type AppResult<T> = Result<T, AppError>;
