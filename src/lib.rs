//! elapi: eLabFTW REST API client (library crate).
//!
//! Re-exports public modules for the binary, integration tests and
//! external use.

pub mod api;
pub mod config;
pub mod constants;
pub mod env;
pub mod error;
pub mod logging;
pub mod output;
pub mod path_validator;
pub mod plugins;
pub mod retry;
