use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use recorder_api::Limit;
use recorder_engine::{parse_timestamp, RecorderError};

use super::AppState;

pub(crate) fn error_response(e: RecorderError) -> Response {
    let status = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        tracing::error!(error = %e, "api request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, axum::Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/series?topic=X&after=T
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct SeriesParams {
    topic: String,
    after: Option<String>,
}

/// `after` без числового префикса не совпадает ни с одной записью.
pub(crate) async fn handle_series(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Response {
    let after = match params.after.as_deref() {
        None => Some(i64::MIN),
        Some(raw) => parse_timestamp(raw),
    };

    match after {
        Some(after) => match state.recorder.series_after(&params.topic, after).await {
            Ok(series) => axum::Json(series).into_response(),
            Err(e) => error_response(e),
        },
        None => match state.recorder.info_for_topic(&params.topic).await {
            Ok(_) => axum::Json(Vec::<String>::new()).into_response(),
            Err(e) => error_response(e),
        },
    }
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/info?topic=X
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TopicParams {
    topic: String,
}

pub(crate) async fn handle_info(
    State(state): State<AppState>,
    Query(params): Query<TopicParams>,
) -> Response {
    match state.recorder.info_for_topic(&params.topic).await {
        Ok(info) => axum::Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  REST: /api/sources
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct PageParams {
    page_size: Option<usize>,
    page_index: Option<usize>,
}

pub(crate) async fn handle_list_sources(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Response {
    let infos = state
        .recorder
        .info_for_all(params.page_size.unwrap_or(0), params.page_index.unwrap_or(0))
        .await;
    axum::Json(infos).into_response()
}

#[derive(Deserialize)]
pub(crate) struct UpsertBody {
    pub(crate) topic: String,
    #[serde(default)]
    pub(crate) limit: Limit,
}

pub(crate) async fn handle_upsert_source(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<UpsertBody>,
) -> Response {
    match state.recorder.upsert_by_topic(&body.topic, body.limit).await {
        Ok(source) => axum::Json(source).into_response(),
        Err(e) => error_response(e),
    }
}

pub(crate) async fn handle_delete_source(
    State(state): State<AppState>,
    Query(params): Query<TopicParams>,
) -> Response {
    match state.recorder.delete_by_topic(&params.topic).await {
        Ok(source) => axum::Json(source).into_response(),
        Err(e) => error_response(e),
    }
}
