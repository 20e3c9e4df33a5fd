use sluice_sync::{CaptureOutcome, DeepLinkError, DeepLinks, JsonFileStore, Navigator, ReplayOutcome};
use tracing::info;

use crate::cli::OpenArgs;
use crate::client::{AppContext, CliError, CliResult};

use super::transport_failure;

/// Navigation is a no-op for a terminal; record it in the log instead.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn reset_to_home(&self) {
        info!("navigation reset to the torrent list");
    }

    fn reload(&self) {
        info!("current view reloaded");
    }
}

pub(crate) async fn handle_open(ctx: &AppContext, args: OpenArgs) -> CliResult<()> {
    let mut links = DeepLinks::new(JsonFileStore::new(ctx.state_file.clone()));

    match links
        .capture(&args.address)
        .map_err(|err| CliError::failure(anyhow::Error::new(err)))?
    {
        CaptureOutcome::Absent => println!("no download link in the address"),
        CaptureOutcome::Invalid(reason) => println!("ignored download link: {reason}"),
        CaptureOutcome::AlreadyHandled => println!("link was already added"),
        CaptureOutcome::Captured(_) => println!("link captured"),
    }

    // Also replays a link captured on an earlier run that never got added.
    let engine = ctx.engine.as_ref();
    let outcome = links
        .replay(engine, engine, &TerminalNavigator)
        .await
        .map_err(replay_failure)?;
    match outcome {
        ReplayOutcome::Nothing => {}
        ReplayOutcome::AwaitingAuth => {
            println!("link kept until the session is authenticated");
        }
        ReplayOutcome::Stale => println!("stored link was already added; cleared"),
        ReplayOutcome::Discarded(reason) => println!("stored link discarded: {reason}"),
        ReplayOutcome::Replayed(value) => println!("added {value}"),
    }
    Ok(())
}

fn replay_failure(err: DeepLinkError) -> CliError {
    match err {
        DeepLinkError::Auth(source) => transport_failure(source),
        other => CliError::failure(anyhow::Error::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{allow_auth, context};
    use httpmock::prelude::*;
    use sluice_sync::{KeyValueStore, LAST_PROCESSED_KEY, PENDING_KEY};

    const ADDRESS: &str = "https://ui.local/#download=magnet%3A%3Fxt%3Durn%3Abtih%3Aabc";
    const MAGNET: &str = "magnet:?xt=urn:btih:abc";

    fn open_args() -> OpenArgs {
        OpenArgs {
            address: ADDRESS.to_string(),
        }
    }

    #[tokio::test]
    async fn open_adds_the_link_once() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir()?;
        allow_auth(&server);
        let add = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/torrents/add")
                .form_urlencoded_tuple("urls", MAGNET);
            then.status(200).body("Ok.");
        });
        let ctx = context(&server, dir.path());

        handle_open(&ctx, open_args())
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        handle_open(&ctx, open_args())
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        add.assert_hits(1);
        let store = JsonFileStore::new(ctx.state_file.clone());
        assert!(store.get(PENDING_KEY)?.is_none());
        assert_eq!(store.get(LAST_PROCESSED_KEY)?.as_deref(), Some(MAGNET));
        Ok(())
    }

    #[tokio::test]
    async fn open_keeps_the_link_when_not_authenticated() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir()?;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/app/version");
            then.status(403);
        });
        let ctx = context(&server, dir.path());

        handle_open(&ctx, open_args())
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        let store = JsonFileStore::new(ctx.state_file.clone());
        assert_eq!(store.get(PENDING_KEY)?.as_deref(), Some(MAGNET));
        Ok(())
    }

    #[tokio::test]
    async fn open_reports_engine_refusal_and_keeps_the_link() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir()?;
        allow_auth(&server);
        server.mock(|when, then| {
            when.method(POST).path("/api/v2/torrents/add");
            then.status(200).body("Fails.");
        });
        let ctx = context(&server, dir.path());

        let result = handle_open(&ctx, open_args()).await;
        assert!(matches!(&result, Err(err) if err.exit_code() == 3));

        let store = JsonFileStore::new(ctx.state_file.clone());
        assert_eq!(store.get(PENDING_KEY)?.as_deref(), Some(MAGNET));
        Ok(())
    }
}
