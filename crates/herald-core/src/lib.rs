//! Core types and decision logic for the Herald notification agents.
//!
//! This crate has no HTTP, SMTP or database dependency.
//! The data source, mail transport and notification store are traits
//! implemented by sibling crates.

pub mod cache;
pub mod compose;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod event;
pub mod fetch;
pub mod intent;
pub mod record;
pub mod rules;
pub mod source;
pub mod store;
pub mod sweep;
pub mod template;
pub mod validity;

pub use error::{Error, Result};

#[cfg(test)]
mod fixtures;
