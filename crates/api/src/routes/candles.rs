use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{Candle, Error, Interval};

use crate::error::ApiResult;
use crate::AppState;

pub fn candles_router() -> Router<AppState> {
    Router::new().route("/api/v1/candles", post(create_candles).get(list_candles))
}

#[derive(Deserialize)]
struct CreateCandlesInput {
    candles: Vec<Candle>,
}

/// Bulk-create candles; (date, interval, pair) duplicates are skipped.
async fn create_candles(
    State(state): State<AppState>,
    Json(input): Json<CreateCandlesInput>,
) -> ApiResult<Json<Value>> {
    if input.candles.is_empty() {
        return Err(Error::InvalidInput("empty candles".into()).into());
    }

    let inserted = state.candles.insert_many(&input.candles).await?;
    Ok(Json(json!({ "inserted": inserted })))
}

#[derive(Deserialize)]
struct ListCandlesQuery {
    pair: String,
    interval: Interval,
    from: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

async fn list_candles(
    State(state): State<AppState>,
    Query(q): Query<ListCandlesQuery>,
) -> ApiResult<Json<Value>> {
    let limit = q.limit.unwrap_or(500).clamp(1, 5000);
    let page = state
        .candles
        .query(&q.pair, q.interval, q.from, limit)
        .await?;

    Ok(Json(json!({
        "candles": page.candles,
        "has_more": page.has_more,
        "next_cursor": page.next_cursor,
    })))
}
