//! Core module - configuration, state and startup errors
//!
//! - [`Config`] - server configuration
//! - [`ServerState`] - wired services
//! - [`ServerError`] - startup errors

pub mod config;
pub mod error;
pub mod state;

pub use config::Config;
pub use error::{Result, ServerError};
pub use state::ServerState;
