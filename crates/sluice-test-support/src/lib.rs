#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (snapshot and torrent builders), fakes.rs (scripted collaborators).

pub mod fakes;
pub mod fixtures;
