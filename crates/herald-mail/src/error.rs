//! Error type for `herald-mail`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid address: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("message has no valid recipient")]
  NoRecipients,

  #[error("failed to build message: {0}")]
  Message(#[from] lettre::error::Error),

  #[error("smtp error: {0}")]
  Smtp(#[from] lettre::transport::smtp::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
