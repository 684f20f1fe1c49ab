use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{BuySignal, Error, Interval};

use crate::error::ApiResult;
use crate::AppState;

pub fn signals_router() -> Router<AppState> {
    Router::new().route("/api/v1/signals", post(create_signals).get(list_signals))
}

#[derive(Deserialize)]
struct CreateSignalsInput {
    signals: Vec<BuySignal>,
}

/// Bulk-create signals; natural-key duplicates are skipped.
async fn create_signals(
    State(state): State<AppState>,
    Json(input): Json<CreateSignalsInput>,
) -> ApiResult<Json<Value>> {
    if input.signals.is_empty() {
        return Err(Error::InvalidInput("empty signals".into()).into());
    }

    let created = state.signals.insert_many(&input.signals).await?;
    Ok(Json(json!({ "signals": created })))
}

#[derive(Deserialize)]
struct ListSignalsQuery {
    pair: String,
    interval: Interval,
    name: String,
    from: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

async fn list_signals(
    State(state): State<AppState>,
    Query(q): Query<ListSignalsQuery>,
) -> ApiResult<Json<Value>> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let page = state
        .signals
        .query(&q.pair, q.interval, &q.name, q.from, limit)
        .await?;

    Ok(Json(json!({
        "signals": page.signals,
        "has_more": page.has_more,
        "next_cursor": page.next_cursor,
    })))
}
