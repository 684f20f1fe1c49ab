use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{BuySignal, Candle, Interval, Position, Ratio, Result};

/// Price threshold tested by an earliest-match candle scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceCondition {
    /// Matches candles whose high reached at least the given price.
    HighAtLeast(f64),
    /// Matches candles whose low reached at most the given price.
    LowAtMost(f64),
}

/// Read/write access to the candle history.
///
/// `PgCandleStore` implements this over PostgreSQL; engine tests use an
/// in-memory implementation. The two scan methods are the only queries the
/// outcome evaluator needs, and both operate on the 1-minute series.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Earliest 1-minute candle with open time at or after `from` matching
    /// `condition`. `None` means no candle matched, which by itself is not
    /// an error.
    async fn earliest_hit(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        condition: PriceCondition,
    ) -> Result<Option<Candle>>;

    /// Whether any 1-minute candle exists at or after `from` for this pair.
    /// Availability probe used to tell "not yet resolved" from "no data".
    async fn has_minute_candles(&self, pair: &str, from: DateTime<Utc>) -> Result<bool>;

    /// Insert candles, ignoring ones already present for their
    /// (date, interval, pair). Returns the number actually inserted.
    async fn insert_many(&self, candles: &[Candle]) -> Result<u64>;

    /// Candles for a pair/interval ordered by date ascending, starting at
    /// `from` (inclusive) when given, paged by the limit+1 protocol.
    async fn query(
        &self,
        pair: &str,
        interval: Interval,
        from: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<CandlePage>;
}

/// Persistence for buy signals.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Insert or refresh a signal by its natural key
    /// (pair, interval, fullname, business_id). On conflict only price and
    /// metadata are updated. Returns the canonical row, id assigned.
    async fn upsert(&self, signal: &BuySignal) -> Result<BuySignal>;

    /// Insert signals, silently skipping natural-key duplicates. Returns
    /// the rows actually inserted.
    async fn insert_many(&self, signals: &[BuySignal]) -> Result<Vec<BuySignal>>;

    /// Signals for a pair/interval/strategy ordered by date ascending,
    /// paged by the limit+1 protocol.
    async fn query(
        &self,
        pair: &str,
        interval: Interval,
        name: &str,
        from: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<SignalPage>;
}

/// Persistence for positions and their resolved ratios.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Insert or refresh a position by (buy_signal_id, fullname). On
    /// conflict only tp and sl are updated. Returns the canonical row.
    async fn upsert(&self, position: &Position) -> Result<Position>;

    /// Insert positions, silently skipping natural-key duplicates. Returns
    /// the rows actually inserted.
    async fn insert_many(&self, positions: &[Position]) -> Result<Vec<Position>>;

    /// One position with its signal embedded, or `None`.
    async fn get(&self, id: Uuid) -> Result<Option<Position>>;

    /// Page of positions with no ratio yet (and sane thresholds), ordered
    /// by ascending serial number starting at `cursor` (inclusive).
    ///
    /// Implementations fetch `limit + 1` rows: the extra row signals
    /// `has_more` and its serial number becomes `next_cursor`; it is not
    /// part of `positions` and re-appears on the next page.
    async fn fetch_unresolved(&self, cursor: Option<i64>, limit: i64) -> Result<UnresolvedPage>;

    /// Bulk-write computed ratios keyed by position id. Returns the number
    /// of rows actually updated.
    async fn write_ratios(&self, resolved: &[(Uuid, Ratio)]) -> Result<u64>;
}

#[derive(Debug, Default)]
pub struct UnresolvedPage {
    pub positions: Vec<Position>,
    pub has_more: bool,
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Default)]
pub struct SignalPage {
    pub signals: Vec<BuySignal>,
    pub has_more: bool,
    pub next_cursor: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct CandlePage {
    pub candles: Vec<Candle>,
    pub has_more: bool,
    pub next_cursor: Option<DateTime<Utc>>,
}
