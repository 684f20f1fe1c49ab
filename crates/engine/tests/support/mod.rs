#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use common::{
    BuySignal, Candle, CandlePage, CandleStore, Interval, NewPosition, Position, PositionStore,
    PriceCondition, Ratio, Result, SignalPage, SignalStore, UnresolvedPage,
};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// A 1-minute candle for threshold tests; open/close sit between the extremes.
pub fn minute_candle(pair: &str, date: DateTime<Utc>, high: f64, low: f64) -> Candle {
    Candle {
        pair: pair.to_string(),
        interval: Interval::M1,
        date,
        open: (high + low) / 2.0,
        high,
        low,
        close: (high + low) / 2.0,
    }
}

pub fn signal(pair: &str, interval: Interval, date: DateTime<Utc>, price: f64) -> BuySignal {
    BuySignal {
        id: None,
        name: "morningStar".to_string(),
        fullname: "morningStar-3".to_string(),
        business_id: format!("{pair}-{}", date.timestamp()),
        pair: pair.to_string(),
        interval,
        date,
        price,
        metadata: serde_json::Value::Null,
    }
}

pub fn candidate(buy_signal: BuySignal, tp: f64, sl: f64) -> NewPosition {
    NewPosition {
        id: None,
        name: "fibonacci".to_string(),
        fullname: "fibonacci-0.618".to_string(),
        tp,
        sl,
        metadata: serde_json::Value::Null,
        buy_signal,
    }
}

/// A persisted-looking position with its signal embedded, for seeding the
/// in-memory position store.
pub fn stored_position(serial_id: i64, buy_signal: BuySignal, tp: f64, sl: f64) -> Position {
    let mut buy_signal = buy_signal;
    if buy_signal.id.is_none() {
        buy_signal.id = Some(Uuid::new_v4());
    }
    Position {
        id: Some(Uuid::new_v4()),
        serial_id,
        buy_signal_id: buy_signal.id.unwrap(),
        buy_signal: Some(buy_signal),
        name: "fibonacci".to_string(),
        fullname: "fibonacci-0.618".to_string(),
        tp,
        sl,
        metadata: serde_json::Value::Null,
        ratio: None,
    }
}

/// In-memory candle store backed by a plain vector.
pub struct MemCandles {
    candles: RwLock<Vec<Candle>>,
}

impl MemCandles {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: RwLock::new(candles),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl CandleStore for MemCandles {
    async fn earliest_hit(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        condition: PriceCondition,
    ) -> Result<Option<Candle>> {
        let candles = self.candles.read().await;
        let mut hits: Vec<&Candle> = candles
            .iter()
            .filter(|c| c.pair == pair && c.interval == Interval::M1 && c.date >= from)
            .filter(|c| match condition {
                PriceCondition::HighAtLeast(p) => c.high >= p,
                PriceCondition::LowAtMost(p) => c.low <= p,
            })
            .collect();
        hits.sort_by_key(|c| c.date);
        Ok(hits.first().map(|c| (*c).clone()))
    }

    async fn has_minute_candles(&self, pair: &str, from: DateTime<Utc>) -> Result<bool> {
        let candles = self.candles.read().await;
        Ok(candles
            .iter()
            .any(|c| c.pair == pair && c.interval == Interval::M1 && c.date >= from))
    }

    async fn insert_many(&self, new: &[Candle]) -> Result<u64> {
        let mut candles = self.candles.write().await;
        let mut inserted = 0u64;
        for candle in new {
            let exists = candles.iter().any(|c| {
                c.pair == candle.pair && c.interval == candle.interval && c.date == candle.date
            });
            if !exists {
                candles.push(candle.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn query(
        &self,
        pair: &str,
        interval: Interval,
        from: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<CandlePage> {
        let candles = self.candles.read().await;
        let mut rows: Vec<Candle> = candles
            .iter()
            .filter(|c| {
                c.pair == pair && c.interval == interval && from.map_or(true, |f| c.date >= f)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.date);
        rows.truncate((limit + 1) as usize);

        let has_more = rows.len() as i64 > limit;
        let mut next_cursor = None;
        if has_more {
            next_cursor = Some(rows[limit as usize].date);
            rows.truncate(limit as usize);
        }
        Ok(CandlePage {
            candles: rows,
            has_more,
            next_cursor,
        })
    }
}

/// In-memory signal store honoring the natural-key upsert contract.
pub struct MemSignals {
    rows: RwLock<Vec<BuySignal>>,
}

impl MemSignals {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

fn same_signal_key(a: &BuySignal, b: &BuySignal) -> bool {
    a.pair == b.pair
        && a.interval == b.interval
        && a.fullname == b.fullname
        && a.business_id == b.business_id
}

#[async_trait]
impl SignalStore for MemSignals {
    async fn upsert(&self, signal: &BuySignal) -> Result<BuySignal> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.iter_mut().find(|s| same_signal_key(s, signal)) {
            existing.price = signal.price;
            existing.metadata = signal.metadata.clone();
            return Ok(existing.clone());
        }

        let mut stored = signal.clone();
        stored.id = Some(Uuid::new_v4());
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn insert_many(&self, signals: &[BuySignal]) -> Result<Vec<BuySignal>> {
        let mut rows = self.rows.write().await;
        let mut inserted = Vec::new();
        for signal in signals {
            if rows.iter().any(|s| same_signal_key(s, signal)) {
                continue;
            }
            let mut stored = signal.clone();
            stored.id = Some(Uuid::new_v4());
            rows.push(stored.clone());
            inserted.push(stored);
        }
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
        let rows = self.rows.read().await;
        let mut matched: Vec<BuySignal> = rows
            .iter()
            .filter(|s| {
                s.pair == pair
                    && s.interval == interval
                    && s.name == name
                    && from.map_or(true, |f| s.date >= f)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|s| s.date);
        matched.truncate((limit + 1) as usize);

        let has_more = matched.len() as i64 > limit;
        let mut next_cursor = None;
        if has_more {
            next_cursor = Some(matched[limit as usize].date);
            matched.truncate(limit as usize);
        }
        Ok(SignalPage {
            signals: matched,
            has_more,
            next_cursor,
        })
    }
}

/// In-memory position store honoring the natural-key upsert and the
/// limit+1 cursor protocol.
pub struct MemPositions {
    rows: RwLock<Vec<Position>>,
    next_serial: AtomicI64,
}

impl MemPositions {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_serial: AtomicI64::new(1),
        }
    }

    /// Seed already-persisted rows (ids, serials and embedded signals as
    /// given).
    pub async fn seed(&self, positions: Vec<Position>) {
        let mut rows = self.rows.write().await;
        for position in &positions {
            self.next_serial
                .fetch_max(position.serial_id + 1, Ordering::SeqCst);
        }
        rows.extend(positions);
    }

    pub async fn all(&self) -> Vec<Position> {
        self.rows.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl PositionStore for MemPositions {
    async fn upsert(&self, position: &Position) -> Result<Position> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows
            .iter_mut()
            .find(|p| p.buy_signal_id == position.buy_signal_id && p.fullname == position.fullname)
        {
            existing.tp = position.tp;
            existing.sl = position.sl;
            return Ok(existing.clone());
        }

        let mut stored = position.clone();
        stored.id = Some(Uuid::new_v4());
        stored.serial_id = self.next_serial.fetch_add(1, Ordering::SeqCst);
        stored.buy_signal = None;
        stored.ratio = None;
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn insert_many(&self, positions: &[Position]) -> Result<Vec<Position>> {
        let mut inserted = Vec::new();
        for position in positions {
            let exists = {
                let rows = self.rows.read().await;
                rows.iter().any(|p| {
                    p.buy_signal_id == position.buy_signal_id && p.fullname == position.fullname
                })
            };
            if !exists {
                inserted.push(self.upsert(position).await?);
            }
        }
        Ok(inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Position>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|p| p.id == Some(id)).cloned())
    }

    async fn fetch_unresolved(&self, cursor: Option<i64>, limit: i64) -> Result<UnresolvedPage> {
        let rows = self.rows.read().await;
        let mut unresolved: Vec<Position> = rows
            .iter()
            .filter(|p| p.ratio.is_none() && p.tp > 0.0 && p.sl > 0.0)
            .filter(|p| cursor.map_or(true, |c| p.serial_id >= c))
            .cloned()
            .collect();
        unresolved.sort_by_key(|p| p.serial_id);
        unresolved.truncate((limit + 1) as usize);

        let has_more = unresolved.len() as i64 > limit;
        let mut next_cursor = None;
        if has_more {
            next_cursor = Some(unresolved[limit as usize].serial_id);
            unresolved.truncate(limit as usize);
        }
        Ok(UnresolvedPage {
            positions: unresolved,
            has_more,
            next_cursor,
        })
    }

    async fn write_ratios(&self, resolved: &[(Uuid, Ratio)]) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let mut updated = 0u64;
        for (id, ratio) in resolved {
            if let Some(position) = rows.iter_mut().find(|p| p.id == Some(*id)) {
                position.ratio = Some(*ratio);
                updated += 1;
            }
        }
        Ok(updated)
    }
}
