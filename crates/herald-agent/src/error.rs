//! Intake errors and their HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  UnknownKind(#[from] herald_core::event::UnknownEventKind),
  /// The event must not be retried.
  #[error("rejected: {0}")]
  Rejected(String),
  #[error("processing failed: {0}")]
  Processing(String),
  /// The consumer stopped accepting jobs.
  #[error("intake unavailable")]
  Unavailable,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::UnknownKind(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
      Error::Rejected(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg).into_response(),
      Error::Processing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
      Error::Unavailable => {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
