mod http;
mod ws;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use recorder_engine::Recorder;

#[derive(Clone)]
pub(crate) struct AppState {
    recorder: Arc<Recorder>,
}

/// Маршруты HTTP + WebSocket поверх `Recorder`.
pub fn router(recorder: Arc<Recorder>) -> Router {
    let state = AppState { recorder };

    Router::new()
        .route("/api/series", get(http::handle_series))
        .route("/api/info", get(http::handle_info))
        .route(
            "/api/sources",
            get(http::handle_list_sources)
                .put(http::handle_upsert_source)
                .delete(http::handle_delete_source),
        )
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
}

/// HTTP + WebSocket API сервер рекордера.
pub async fn run(
    port: u16,
    recorder: Arc<Recorder>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(recorder);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
