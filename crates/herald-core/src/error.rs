//! Error types for `herald-core`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The Validity Resolver was handed no candidates.
  #[error("no candidates to resolve validity from")]
  EmptyInput,

  #[error("data integrity error: {0}")]
  DataIntegrity(String),

  #[error("data source error: {0}")]
  DataSource(#[source] BoxError),

  #[error("notification store error: {0}")]
  Store(#[source] BoxError),

  #[error("mail transport error: {0}")]
  Transport(#[source] BoxError),

  #[error("template error: {0}")]
  Template(#[from] minijinja::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn data_source<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::DataSource(Box::new(e))
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn transport<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Transport(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
