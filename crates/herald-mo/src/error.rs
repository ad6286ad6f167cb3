//! Error type for `herald-mo`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} returned {status}: {body}")]
  Status {
    url:    String,
    status: reqwest::StatusCode,
    body:   String,
  },

  /// The response carried a GraphQL `errors` array.
  #[error("graphql error: {0}")]
  GraphQl(String),

  #[error("graphql response has no data")]
  MissingData,

  #[error("invalid entity data: {0}")]
  Core(#[from] herald_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
