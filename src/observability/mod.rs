//! # Observability
//!
//! Structured logging for the CLI and library consumers.

pub mod logging;

pub use logging::{env_filter, init_logging, log_config_info};
