//! Process-level span carrying the running command and build.

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Keeps the top-level `sluice` span entered for as long as it lives.
#[derive(Debug)]
pub struct CommandSpan {
    _entered: EnteredSpan,
}

impl CommandSpan {
    /// Enter a span tagged with `command` and the recorded build SHA.
    #[must_use]
    pub fn enter(command: &str) -> Self {
        let span = tracing::info_span!("sluice", command = %command, build_sha = %build_sha());
        Self {
            _entered: span.entered(),
        }
    }
}
