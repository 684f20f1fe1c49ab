use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use common::{Candle, CandlePage, CandleStore, Error, Interval, PriceCondition, Result};

/// Granularity every backtest scan runs at, regardless of the signal's own
/// interval.
const BACKTEST_INTERVAL: Interval = Interval::M1;

const CANDLE_COLUMNS: &str = "pair, interval, date, open, high, low, close";

pub struct PgCandleStore {
    pool: PgPool,
}

impl PgCandleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    pair: String,
    interval: String,
    date: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl TryFrom<CandleRow> for Candle {
    type Error = Error;

    fn try_from(row: CandleRow) -> Result<Self> {
        Ok(Candle {
            interval: row.interval.parse()?,
            pair: row.pair,
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        })
    }
}

#[async_trait]
impl CandleStore for PgCandleStore {
    async fn earliest_hit(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        condition: PriceCondition,
    ) -> Result<Option<Candle>> {
        let (fragment, price) = match condition {
            PriceCondition::HighAtLeast(p) => ("high >= $4", p),
            PriceCondition::LowAtMost(p) => ("low <= $4", p),
        };

        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM candles \
             WHERE pair = $1 AND interval = $2 AND date >= $3 AND {fragment} \
             ORDER BY date ASC LIMIT 1"
        );

        let row = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(pair)
            .bind(BACKTEST_INTERVAL.to_string())
            .bind(from)
            .bind(price)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Candle::try_from).transpose()
    }

    async fn has_minute_candles(&self, pair: &str, from: DateTime<Utc>) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM candles WHERE pair = $1 AND interval = $2 AND date >= $3)",
        )
        .bind(pair)
        .bind(BACKTEST_INTERVAL.to_string())
        .bind(from)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_many(&self, candles: &[Candle]) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for candle in candles {
            let result = sqlx::query(
                "INSERT INTO candles (id, pair, interval, date, open, high, low, close) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (date, interval, pair) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(&candle.pair)
            .bind(candle.interval.to_string())
            .bind(candle.date)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        debug!(inserted, total = candles.len(), "candles inserted");
        Ok(inserted)
    }

    async fn query(
        &self,
        pair: &str,
        interval: Interval,
        from: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<CandlePage> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM candles \
             WHERE pair = $1 AND interval = $2 AND ($3::timestamptz IS NULL OR date >= $3) \
             ORDER BY date ASC LIMIT $4"
        );

        let mut rows = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(pair)
            .bind(interval.to_string())
            .bind(from)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() as i64 > limit;
        let mut next_cursor = None;
        if has_more {
            next_cursor = Some(rows[limit as usize].date);
            rows.truncate(limit as usize);
        }

        let candles = rows
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(CandlePage {
            candles,
            has_more,
            next_cursor,
        })
    }
}
