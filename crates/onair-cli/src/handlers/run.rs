//! `onair run`: compose the show, go on air, and tear down on Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use onair_axum::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bootstrap::{self, OutputOptions, ShowRuntime};
use crate::config::ShowFile;
use crate::events::log_events;
use crate::parser::RunArgs;

/// How long to wait for the last events after the show ends.
const EVENT_DRAIN: Duration = Duration::from_secs(2);

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut file = ShowFile::load(&args.config)?;
    file.apply_provider_overrides(args.provider);
    file.apply_encoder_override(args.encoder);

    let options = OutputOptions {
        preview: args.preview,
        seed: args.seed,
    };
    let runtime = bootstrap::compose_with_openai(&file, options)?;
    let publisher = runtime.publisher();
    let ShowRuntime {
        orchestrator,
        bus,
        bridge,
        interrupts,
        events,
        outputs,
    } = runtime;

    let shutdown = CancellationToken::new();
    let show_stop = orchestrator.shutdown_token();
    let event_task = tokio::spawn(log_events(events, args.events));

    let server = match args.listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("could not listen on {addr}"))?;
            let state = AppState::new(Arc::clone(&bridge), Arc::clone(&bus), publisher);
            Some(tokio::spawn(onair_axum::serve(
                listener,
                state,
                shutdown.clone(),
            )))
        }
        None => None,
    };

    let signal_task = tokio::spawn(wait_for_ctrl_c(shutdown.clone(), show_stop));

    info!(
        hosts = file.show.personas.len(),
        sinks = ?bus.sink_names(),
        "On air"
    );
    let session = orchestrator.run().await;
    shutdown.cancel();
    let _ = signal_task.await;

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "HTTP server failed"),
            Err(e) => warn!(error = %e, "HTTP server task panicked"),
        }
    }

    outputs.close().await;
    drop((bridge, interrupts, bus));
    if tokio::time::timeout(EVENT_DRAIN, event_task).await.is_err() {
        warn!("Event log still busy at exit");
    }

    info!(turns = session.turns().len(), "Show ended");
    Ok(())
}

/// Cancel the show on Ctrl-C, or as soon as `shutdown` fires for another
/// reason.
async fn wait_for_ctrl_c(shutdown: CancellationToken, show_stop: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Ctrl-C received, ending the show"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                shutdown.cancelled().await;
            }
        },
        () = shutdown.cancelled() => {}
    }
    show_stop.cancel();
    shutdown.cancel();
}
