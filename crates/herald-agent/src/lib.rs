//! The Herald service: configuration, event intake and the sweep loop,
//! wired around [`herald_core`].

pub mod agent;
pub mod config;
pub mod error;
pub mod intake;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{Error, Result};
