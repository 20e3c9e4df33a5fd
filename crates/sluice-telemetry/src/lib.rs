#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Logging setup shared by the sluice binaries.
//! Layout: init.rs (subscriber install, format selection), context.rs (process span), error.rs.

/// Process-wide span helpers.
pub mod context;
/// Error types.
pub mod error;
/// Subscriber installation.
pub mod init;

pub use context::CommandSpan;
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
