use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{Error, NewPosition, Position};

use crate::error::ApiResult;
use crate::AppState;

pub fn positions_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/positions", post(create_positions))
        .route("/api/v1/positions/ingest", post(ingest_positions))
        .route("/api/v1/positions/backfill", post(run_backfill))
        .route("/api/v1/positions/:id/compute", post(compute_position))
}

#[derive(Deserialize)]
struct CreatePositionsInput {
    positions: Vec<PositionInput>,
}

#[derive(Deserialize)]
struct PositionInput {
    name: String,
    fullname: String,
    buy_signal_id: Uuid,
    tp: f64,
    sl: f64,
    #[serde(default)]
    metadata: Value,
}

/// Bulk-create positions referencing already-stored signals. Natural-key
/// duplicates are skipped.
async fn create_positions(
    State(state): State<AppState>,
    Json(input): Json<CreatePositionsInput>,
) -> ApiResult<Json<Value>> {
    if input.positions.is_empty() {
        return Err(Error::InvalidInput("empty positions".into()).into());
    }

    let positions: Vec<Position> = input
        .positions
        .into_iter()
        .map(|p| Position {
            id: None,
            serial_id: 0,
            buy_signal_id: p.buy_signal_id,
            buy_signal: None,
            name: p.name,
            fullname: p.fullname,
            tp: p.tp,
            sl: p.sl,
            metadata: p.metadata,
            ratio: None,
        })
        .collect();

    let created = state.positions.insert_many(&positions).await?;
    Ok(Json(json!({ "positions": created })))
}

#[derive(Deserialize)]
struct IngestInput {
    positions: Vec<NewPosition>,
}

/// Upsert each candidate's signal and position by natural key and evaluate
/// the result at write time.
async fn ingest_positions(
    State(state): State<AppState>,
    Json(input): Json<IngestInput>,
) -> ApiResult<Json<Value>> {
    if input.positions.is_empty() {
        return Err(Error::InvalidInput("empty positions".into()).into());
    }

    let ingested = state.ingestor.ingest_all(input.positions).await?;
    Ok(Json(json!({ "positions": ingested })))
}

/// Run the backfill over the whole backlog of unresolved positions.
async fn run_backfill(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let outcome = state.backfill.run().await?;
    Ok(Json(json!({
        "resolved": outcome.resolved,
        "skipped": outcome.skipped,
    })))
}

/// Evaluate a single position on demand. The computed ratio is returned,
/// not persisted; the backfill owns ratio persistence.
async fn compute_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut position = state
        .positions
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("position {id}")))?;

    let signal = position
        .buy_signal
        .clone()
        .ok_or_else(|| Error::Other(format!("position {id} has no buy signal")))?;

    position.ratio = state.evaluator.compute_ratio(&position, &signal).await?;
    Ok(Json(json!({ "position": position })))
}
