//! GraphQL data source for Herald.
//!
//! [`MoClient`] talks to the master-data GraphQL API with an OAuth2
//! client-credentials token and implements [`herald_core::source::DataSource`].
//! Each query has its own response type in [`queries`]; responses are turned
//! into `herald-core` snapshots once, at this boundary.

mod client;
mod source;

pub mod error;
pub mod queries;

pub use client::{MoClient, MoSettings};
pub use error::{Error, Result};
