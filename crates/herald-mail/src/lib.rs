//! SMTP mail transport for Herald, built on `lettre`.

mod smtp;

pub mod error;

pub use error::{Error, Result};
pub use smtp::{SmtpMailer, SmtpSecurity, SmtpSettings, build_message};
