use std::sync::Arc;

use anyhow::anyhow;
use sluice_core::{ChangeKind, SyncSession};
use sluice_sync::{LoopState, PollController, SpeedHistory, SyncHandle};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{OutputFormat, render_status_line, render_view};

use super::controller_failure;

pub(crate) async fn handle_watch(
    ctx: &AppContext,
    args: WatchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let session = SyncSession::new(args.view.criteria()?, args.view.sort()?);
    let mut config = ctx.sync;
    if let Some(interval_ms) = args.interval_ms {
        config.refresh_interval_ms = interval_ms;
    }

    let history = SpeedHistory::new(config.speed_history_capacity);
    let mut controller = PollController::new(config, ctx.engine.clone(), Arc::new(history.clone()))
        .map_err(|err| CliError::validation(format!("invalid poll settings: {err:#}")))?
        .with_session(session);
    let handle = controller
        .start(ctx.engine.as_ref())
        .await
        .map_err(controller_failure)?;
    let mut events = handle.subscribe();
    let mut renders = 0_u64;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping");
                handle.shutdown();
                break handle.wait_stopped().await;
            }
            event = events.recv() => match event {
                Ok(event) if event.kind == ChangeKind::ConnectionLost => {
                    break handle.wait_stopped().await;
                }
                Ok(_) => {
                    render(&handle, &history, format).await?;
                    renders += 1;
                    if args.cycles.is_some_and(|limit| renders >= limit) {
                        handle.shutdown();
                        break handle.wait_stopped().await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "renderer fell behind; showing the latest view");
                }
                Err(RecvError::Closed) => break handle.wait_stopped().await,
            }
        }
    };

    match outcome {
        LoopState::LostConnection => Err(CliError::failure(anyhow!(
            "lost connection to the engine; restart to resume"
        ))),
        _ => Ok(()),
    }
}

async fn render(handle: &SyncHandle, history: &SpeedHistory, format: OutputFormat) -> CliResult<()> {
    let view = handle.view().await.map_err(controller_failure)?;
    render_view(&view, format)?;
    if format == OutputFormat::Table {
        let server = handle.server_state().await.map_err(controller_failure)?;
        let peak = history.samples().iter().map(|s| s.download_bps).max();
        render_status_line(handle.version(), view.len(), server.as_ref(), peak);
    }
    Ok(())
}
