use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{json, Value};

use recorder_api::Limit;
use recorder_engine::parse_timestamp;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

// ═══════════════════════════════════════════════════════════════
//  Protocol types
// ═══════════════════════════════════════════════════════════════

/// Запрос клиента. `after` — число или строка (разбирается нестрого).
#[derive(Deserialize)]
struct WsAction {
    action: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    after: Option<Value>,
    #[serde(default)]
    limit: Limit,
    #[serde(default)]
    page_size: usize,
    #[serde(default)]
    page_index: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Connection handler
// ═══════════════════════════════════════════════════════════════

async fn ws_connection(mut socket: WebSocket, state: AppState) {
    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let reply = match serde_json::from_str::<WsAction>(text.as_str()) {
            Ok(action) => dispatch(&state, action).await,
            Err(e) => json!({ "error": format!("parse: {e}") }),
        };

        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            break;
        }
    }
}

async fn dispatch(state: &AppState, action: WsAction) -> Value {
    let recorder = &state.recorder;
    let result = match action.action.as_str() {
        "series" => {
            let after = match &action.after {
                None | Some(Value::Null) => Some(i64::MIN),
                Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                Some(Value::String(s)) => parse_timestamp(s),
                Some(_) => None,
            };
            let records = match after {
                Some(after) => recorder.series_after(&action.topic, after).await,
                None => recorder.info_for_topic(&action.topic).await.map(|_| Vec::new()),
            };
            records.map(|records| json!({ "type": "series", "topic": action.topic, "records": records }))
        }
        "info" => recorder
            .info_for_topic(&action.topic)
            .await
            .map(|info| json!({ "type": "info", "info": info })),
        "sources" => {
            let infos = recorder.info_for_all(action.page_size, action.page_index).await;
            Ok(json!({ "type": "sources", "sources": infos }))
        }
        "upsert" => recorder
            .upsert_by_topic(&action.topic, action.limit.clone())
            .await
            .map(|source| json!({ "type": "upserted", "source": source })),
        "delete" => recorder
            .delete_by_topic(&action.topic)
            .await
            .map(|source| json!({ "type": "deleted", "source": source })),
        _ => return json!({ "error": "unknown action" }),
    };

    result.unwrap_or_else(|e| json!({ "error": e.to_string(), "not_found": e.is_not_found() }))
}
