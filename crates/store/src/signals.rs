use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use common::{BuySignal, Error, Interval, Result, SignalPage, SignalStore};

const SIGNAL_COLUMNS: &str = "id, name, fullname, business_id, pair, interval, date, price, metadata";

pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: Uuid,
    name: String,
    fullname: String,
    business_id: String,
    pair: String,
    interval: String,
    date: DateTime<Utc>,
    price: f64,
    metadata: serde_json::Value,
}

impl TryFrom<SignalRow> for BuySignal {
    type Error = Error;

    fn try_from(row: SignalRow) -> Result<Self> {
        Ok(BuySignal {
            id: Some(row.id),
            interval: row.interval.parse()?,
            name: row.name,
            fullname: row.fullname,
            business_id: row.business_id,
            pair: row.pair,
            date: row.date,
            price: row.price,
            metadata: row.metadata,
        })
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn upsert(&self, signal: &BuySignal) -> Result<BuySignal> {
        let sql = format!(
            "INSERT INTO buy_signals ({SIGNAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (pair, interval, fullname, business_id) \
             DO UPDATE SET price = EXCLUDED.price, metadata = EXCLUDED.metadata \
             RETURNING {SIGNAL_COLUMNS}"
        );

        let row = sqlx::query_as::<_, SignalRow>(&sql)
            .bind(signal.id.unwrap_or_else(Uuid::new_v4))
            .bind(&signal.name)
            .bind(&signal.fullname)
            .bind(&signal.business_id)
            .bind(&signal.pair)
            .bind(signal.interval.to_string())
            .bind(signal.date)
            .bind(signal.price)
            .bind(&signal.metadata)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn insert_many(&self, signals: &[BuySignal]) -> Result<Vec<BuySignal>> {
        if signals.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "INSERT INTO buy_signals ({SIGNAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (pair, interval, fullname, business_id) DO NOTHING \
             RETURNING {SIGNAL_COLUMNS}"
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::new();
        for signal in signals {
            let row = sqlx::query_as::<_, SignalRow>(&sql)
                .bind(signal.id.unwrap_or_else(Uuid::new_v4))
                .bind(&signal.name)
                .bind(&signal.fullname)
                .bind(&signal.business_id)
                .bind(&signal.pair)
                .bind(signal.interval.to_string())
                .bind(signal.date)
                .bind(signal.price)
                .bind(&signal.metadata)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                inserted.push(row.try_into()?);
            }
        }
        tx.commit().await?;

        debug!(inserted = inserted.len(), total = signals.len(), "buy signals inserted");
        Ok(inserted)
    }

    async fn query(
        &self,
        pair: &str,
        interval: Interval,
        name: &str,
        from: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<SignalPage> {
        let sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM buy_signals \
             WHERE pair = $1 AND interval = $2 AND name = $3 \
             AND ($4::timestamptz IS NULL OR date >= $4) \
             ORDER BY date ASC LIMIT $5"
        );

        let mut rows = sqlx::query_as::<_, SignalRow>(&sql)
            .bind(pair)
            .bind(interval.to_string())
            .bind(name)
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

        let signals = rows
            .into_iter()
            .map(BuySignal::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(SignalPage {
            signals,
            has_more,
            next_cursor,
        })
    }
}
