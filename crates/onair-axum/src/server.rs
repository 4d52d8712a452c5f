//! Serving the router.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::create_router;
use crate::state::AppState;

/// Serve on `listener` until `shutdown` fires.
///
/// Open carrier sockets are closed through the same token so graceful
/// shutdown does not wait on live calls.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let state = state.with_shutdown(shutdown.clone());
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!("onair listening on http://{addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
