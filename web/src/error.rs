use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use relay::error::{Error as RelayError, ErrorKind};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(RelayError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

fn failure(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            ErrorKind::MissingField(field) => {
                failure(StatusCode::BAD_REQUEST, &format!("{field} is required"))
            }
            ErrorKind::Malformed => {
                let detail = self
                    .0
                    .source
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "Malformed request".to_string());
                failure(StatusCode::BAD_REQUEST, &detail)
            }
            ErrorKind::Unavailable => {
                failure(StatusCode::SERVICE_UNAVAILABLE, "Router not attached")
            }
            ErrorKind::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "No message found for this entity" })),
            )
                .into_response(),
            ErrorKind::Internal(detail) => {
                error!("Internal error while handling request: {detail}");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<RelayError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
