//! Command handlers, one module per subcommand.

mod ls;
mod open;
mod watch;

pub(crate) use ls::handle_ls;
pub(crate) use open::handle_open;
pub(crate) use watch::handle_watch;

use sluice_sync::{AuthCheck, ControllerError, TransportError};

use crate::client::{AppContext, CliError, CliResult};

const NOT_AUTHENTICATED: &str =
    "not authenticated; pass --username and --password (or SLUICE_USERNAME / SLUICE_PASSWORD)";

async fn ensure_authenticated(ctx: &AppContext) -> CliResult<()> {
    if ctx.engine.is_authenticated().await.map_err(transport_failure)? {
        Ok(())
    } else {
        Err(CliError::validation(NOT_AUTHENTICATED))
    }
}

fn transport_failure(err: TransportError) -> CliError {
    let detail = match err.status {
        Some(status) => format!("{} failed with status {status}", err.operation),
        None => format!("{} failed", err.operation),
    };
    CliError::failure(anyhow::Error::new(err).context(detail))
}

fn controller_failure(err: ControllerError) -> CliError {
    match err {
        ControllerError::NotAuthenticated => CliError::validation(NOT_AUTHENTICATED),
        ControllerError::Auth(source) => transport_failure(source),
        other => CliError::failure(anyhow::Error::new(other)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use httpmock::prelude::*;
    use sluice_sync::SyncConfig;

    use crate::client::{AppContext, parse_url};
    use crate::engine::QbitClient;

    pub(crate) fn context(server: &MockServer, state_dir: &Path) -> AppContext {
        let url = parse_url(&server.base_url()).expect("valid URL");
        AppContext {
            engine: Arc::new(
                QbitClient::new(url, None, Duration::from_secs(5)).expect("client builds"),
            ),
            state_file: state_dir.join("state.json"),
            sync: SyncConfig {
                refresh_interval_ms: 50,
                min_refresh_interval_ms: 10,
                ..SyncConfig::default()
            },
        }
    }

    pub(crate) fn allow_auth(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/app/version");
            then.status(200).body("v5.0.0");
        });
    }
}
