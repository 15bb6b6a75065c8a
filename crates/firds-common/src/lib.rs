//! FIRDS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the FIRDS ingest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Custom error type and result alias
//! - **Logging**: Console + size-rotated file logging built on `tracing`
//!
//! # Example
//!
//! ```no_run
//! use firds_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> firds_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod rotating;

// Re-export commonly used types
pub use error::{FirdsError, Result};
