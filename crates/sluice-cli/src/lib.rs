#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::redundant_pub_crate)]

//! Terminal front end that keeps a filtered torrent list in sync with a qBittorrent WebUI.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: one handler per subcommand (`ls`, `watch`, `open`)
//! - `client.rs`: shared context, errors, and argument parsers
//! - `engine/`: WebUI transport behind the sync collaborator traits
//! - `output.rs`: renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod engine;
pub(crate) mod output;

pub use cli::run;
