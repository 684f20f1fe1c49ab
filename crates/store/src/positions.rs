use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use common::{
    BuySignal, Error, Position, PositionStore, Ratio, Result, UnresolvedPage,
};

const POSITION_COLUMNS: &str =
    "id, serial_id, buy_signal_id, name, fullname, tp, sl, metadata, ratio_value, ratio_date";

/// Position columns plus the LEFT JOINed signal, aliased so one row maps to
/// a position with its optional embedded signal.
const JOINED_SELECT: &str = "SELECT p.id, p.serial_id, p.buy_signal_id, p.name, p.fullname, \
     p.tp, p.sl, p.metadata, p.ratio_value, p.ratio_date, \
     s.name AS signal_name, s.fullname AS signal_fullname, \
     s.business_id AS signal_business_id, s.pair AS signal_pair, \
     s.interval AS signal_interval, s.date AS signal_date, \
     s.price AS signal_price, s.metadata AS signal_metadata \
     FROM positions p LEFT JOIN buy_signals s ON s.id = p.buy_signal_id";

pub struct PgPositionStore {
    pool: PgPool,
}

impl PgPositionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PositionRow {
    id: Uuid,
    serial_id: i64,
    buy_signal_id: Uuid,
    name: String,
    fullname: String,
    tp: f64,
    sl: f64,
    metadata: serde_json::Value,
    ratio_value: Option<f64>,
    ratio_date: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct JoinedPositionRow {
    id: Uuid,
    serial_id: i64,
    buy_signal_id: Uuid,
    name: String,
    fullname: String,
    tp: f64,
    sl: f64,
    metadata: serde_json::Value,
    ratio_value: Option<f64>,
    ratio_date: Option<DateTime<Utc>>,
    signal_name: Option<String>,
    signal_fullname: Option<String>,
    signal_business_id: Option<String>,
    signal_pair: Option<String>,
    signal_interval: Option<String>,
    signal_date: Option<DateTime<Utc>>,
    signal_price: Option<f64>,
    signal_metadata: Option<serde_json::Value>,
}

fn ratio_from(value: Option<f64>, date: Option<DateTime<Utc>>) -> Option<Ratio> {
    match (value, date) {
        (Some(value), Some(date)) => Some(Ratio { value, date }),
        _ => None,
    }
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Position {
            id: Some(row.id),
            serial_id: row.serial_id,
            buy_signal_id: row.buy_signal_id,
            buy_signal: None,
            name: row.name,
            fullname: row.fullname,
            tp: row.tp,
            sl: row.sl,
            metadata: row.metadata,
            ratio: ratio_from(row.ratio_value, row.ratio_date),
        }
    }
}

impl TryFrom<JoinedPositionRow> for Position {
    type Error = Error;

    fn try_from(row: JoinedPositionRow) -> Result<Self> {
        let buy_signal = match (row.signal_pair, row.signal_interval, row.signal_date) {
            (Some(pair), Some(interval), Some(date)) => Some(BuySignal {
                id: Some(row.buy_signal_id),
                interval: interval.parse()?,
                name: row.signal_name.unwrap_or_default(),
                fullname: row.signal_fullname.unwrap_or_default(),
                business_id: row.signal_business_id.unwrap_or_default(),
                pair,
                date,
                price: row.signal_price.unwrap_or_default(),
                metadata: row.signal_metadata.unwrap_or(serde_json::Value::Null),
            }),
            _ => None,
        };

        Ok(Position {
            id: Some(row.id),
            serial_id: row.serial_id,
            buy_signal_id: row.buy_signal_id,
            buy_signal,
            name: row.name,
            fullname: row.fullname,
            tp: row.tp,
            sl: row.sl,
            metadata: row.metadata,
            ratio: ratio_from(row.ratio_value, row.ratio_date),
        })
    }
}

#[async_trait]
impl PositionStore for PgPositionStore {
    async fn upsert(&self, position: &Position) -> Result<Position> {
        let sql = format!(
            "INSERT INTO positions (id, buy_signal_id, name, fullname, tp, sl, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (buy_signal_id, fullname) \
             DO UPDATE SET tp = EXCLUDED.tp, sl = EXCLUDED.sl \
             RETURNING {POSITION_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PositionRow>(&sql)
            .bind(position.id.unwrap_or_else(Uuid::new_v4))
            .bind(position.buy_signal_id)
            .bind(&position.name)
            .bind(&position.fullname)
            .bind(position.tp)
            .bind(position.sl)
            .bind(&position.metadata)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn insert_many(&self, positions: &[Position]) -> Result<Vec<Position>> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "INSERT INTO positions (id, buy_signal_id, name, fullname, tp, sl, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (buy_signal_id, fullname) DO NOTHING \
             RETURNING {POSITION_COLUMNS}"
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::new();
        for position in positions {
            let row = sqlx::query_as::<_, PositionRow>(&sql)
                .bind(position.id.unwrap_or_else(Uuid::new_v4))
                .bind(position.buy_signal_id)
                .bind(&position.name)
                .bind(&position.fullname)
                .bind(position.tp)
                .bind(position.sl)
                .bind(&position.metadata)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                inserted.push(row.into());
            }
        }
        tx.commit().await?;

        debug!(inserted = inserted.len(), total = positions.len(), "positions inserted");
        Ok(inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Position>> {
        let sql = format!("{JOINED_SELECT} WHERE p.id = $1");

        let row = sqlx::query_as::<_, JoinedPositionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Position::try_from).transpose()
    }

    async fn fetch_unresolved(&self, cursor: Option<i64>, limit: i64) -> Result<UnresolvedPage> {
        let sql = format!(
            "{JOINED_SELECT} \
             WHERE p.ratio_value IS NULL AND p.tp > 0 AND p.sl > 0 \
             AND ($1::bigint IS NULL OR p.serial_id >= $1) \
             ORDER BY p.serial_id ASC LIMIT $2"
        );

        let mut rows = sqlx::query_as::<_, JoinedPositionRow>(&sql)
            .bind(cursor)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() as i64 > limit;
        let mut next_cursor = None;
        if has_more {
            // The extra row is not part of this page; its serial number is
            // where the next page starts (inclusive).
            next_cursor = Some(rows[limit as usize].serial_id);
            rows.truncate(limit as usize);
        }

        let positions = rows
            .into_iter()
            .map(Position::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(UnresolvedPage {
            positions,
            has_more,
            next_cursor,
        })
    }

    async fn write_ratios(&self, resolved: &[(Uuid, Ratio)]) -> Result<u64> {
        if resolved.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;
        for (id, ratio) in resolved {
            let result =
                sqlx::query("UPDATE positions SET ratio_value = $2, ratio_date = $3 WHERE id = $1")
                    .bind(id)
                    .bind(ratio.value)
                    .bind(ratio.date)
                    .execute(&mut *tx)
                    .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        debug!(updated, "ratios written");
        Ok(updated)
    }
}
