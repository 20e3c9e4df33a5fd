use sluice_core::{SidebarCounts, SyncSession, Torrent};
use sluice_sync::SnapshotSource;
use tracing::debug;

use crate::cli::ListArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{OutputFormat, render_counts, render_view};

use super::{ensure_authenticated, transport_failure};

pub(crate) async fn handle_ls(
    ctx: &AppContext,
    args: ListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let view = list(ctx, &args).await?;
    render_view(&view.torrents, format)?;
    if args.counts {
        render_counts(&view.counts);
    }
    Ok(())
}

struct Listing {
    torrents: Vec<Torrent>,
    counts: SidebarCounts,
}

async fn list(ctx: &AppContext, args: &ListArgs) -> CliResult<Listing> {
    let mut session = SyncSession::new(args.view.criteria()?, args.view.sort()?);
    ensure_authenticated(ctx).await?;

    let snapshot = ctx.engine.fetch(0).await.map_err(transport_failure)?;
    let outcome = session
        .apply_snapshot(snapshot)
        .map_err(|err| CliError::failure(anyhow::Error::new(err)))?;
    debug!(cursor = outcome.report.cursor, "snapshot loaded");

    let torrents = session.view().into_iter().cloned().collect();
    Ok(Listing {
        torrents,
        counts: session.counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ViewArgs;
    use crate::commands::test_support::{allow_auth, context};
    use httpmock::prelude::*;
    use serde_json::json;

    fn maindata() -> serde_json::Value {
        json!({
            "rid": 1,
            "full_update": true,
            "torrents": {
                "aaa": { "name": "Alpha", "category": "movies", "state": "downloading", "added_on": 1 },
                "bbb": { "name": "Beta", "category": "tv", "state": "stalledUP", "added_on": 2 },
                "ccc": { "name": "Gamma", "category": "movies", "state": "uploading", "added_on": 3 }
            },
            "categories": {
                "movies": { "name": "movies", "savePath": "/m" },
                "tv": { "name": "tv", "savePath": "/t" }
            },
            "server_state": { "dl_info_speed": 10 }
        })
    }

    #[tokio::test]
    async fn ls_filters_and_sorts_one_full_snapshot() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir()?;
        allow_auth(&server);
        let fetch = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/sync/maindata")
                .query_param("rid", "0");
            then.status(200).json_body(maindata());
        });

        let args = ListArgs {
            view: ViewArgs {
                category: Some("movies".to_string()),
                ..ViewArgs::default()
            },
            counts: true,
        };
        let listing = list(&context(&server, dir.path()), &args)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        fetch.assert();
        let names: Vec<&str> = listing.torrents.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Alpha"]);
        assert_eq!(listing.counts.categories.get("tv"), Some(&1));
        Ok(())
    }

    #[tokio::test]
    async fn ls_requires_authentication() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir()?;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/app/version");
            then.status(403);
        });

        let result = handle_ls(
            &context(&server, dir.path()),
            ListArgs::default(),
            OutputFormat::Table,
        )
        .await;
        assert!(matches!(result, Err(CliError::Validation(_))));
        Ok(())
    }
}
