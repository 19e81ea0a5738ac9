use rocket::Request;
use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;

/// Error kinds carried by every fallible operation. The wire envelope is
/// built once, in the `Responder` impl, from whichever kind reaches the
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    fn status(self) -> Status {
        match self {
            ErrorKind::Validation => Status::BadRequest,
            ErrorKind::Unauthorized => Status::Unauthorized,
            ErrorKind::Forbidden => Status::Forbidden,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::Conflict => Status::Conflict,
            ErrorKind::RateLimited => Status::TooManyRequests,
            ErrorKind::UpstreamUnavailable => Status::ServiceUnavailable,
            ErrorKind::Internal => Status::InternalServerError,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Structured detail list, surfaced verbatim for validation errors.
    pub errors: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
        }
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: "Validation failed".to_string(),
            errors: Some(errors),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        // UNIQUE violations are domain conflicts everywhere this crate
        // uses them (duplicate unlock, duplicate ban mirror, ...).
        if e.to_string().contains("UNIQUE") {
            ApiError::conflict("Already exists")
        } else {
            ApiError::internal(e.to_string())
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let mut body = serde_json::json!({
            "success": false,
            "message": self.message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(errors) = self.errors {
            body["errors"] = serde_json::json!(errors);
        }
        Response::build_from(Json(body).respond_to(req)?)
            .status(self.kind.status())
            .ok()
    }
}

/// The uniform success envelope: `{success, message, data, timestamp}`.
pub fn ok(data: serde_json::Value) -> Json<serde_json::Value> {
    ok_with_message("OK", data)
}

pub fn ok_with_message(message: &str, data: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": message,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub type ApiResult = Result<Json<serde_json::Value>, ApiError>;
