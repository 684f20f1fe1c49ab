use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Interval;

/// A detected trading event: the price and moment at which a detector fired
/// for a pair/interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuySignal {
    /// Storage-assigned identifier. `None` until the signal has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Detector strategy name, e.g. `rsiDivergence`.
    pub name: String,
    /// Strategy name plus its parameters, e.g. `rsiDivergence-14-2`.
    pub fullname: String,
    /// Detector-supplied key making re-ingestion of the same event idempotent.
    /// (pair, interval, fullname, business_id) is unique in storage.
    pub business_id: String,
    pub pair: String,
    pub interval: Interval,
    /// Open time of the candle the signal was detected on.
    pub date: DateTime<Utc>,
    pub price: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A hypothetical trade derived from a signal: entry is implied by the
/// signal, and the TP/SL thresholds are what gets evaluated against the
/// 1-minute series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Storage-assigned identifier. `None` until the position has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Monotonic row number; the backfill pagination cursor.
    #[serde(default)]
    pub serial_id: i64,
    pub buy_signal_id: Uuid,
    /// Embedded on reads that join the signal; required by the evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_signal: Option<BuySignal>,
    pub name: String,
    /// (buy_signal_id, fullname) is unique in storage.
    pub fullname: String,
    pub tp: f64,
    pub sl: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// `None` until resolved; unresolved positions are the backfill's unit
    /// of work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<Ratio>,
}

/// Realized outcome of a position: hit price over signal price, and the
/// open time of the candle that crossed the threshold. Immutable once
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub value: f64,
    pub date: DateTime<Utc>,
}

/// One OHLC price point. The 1-minute series is the ground truth used for
/// threshold detection regardless of a signal's own interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub pair: String,
    pub interval: Interval,
    /// Open time.
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Inbound position candidate carrying its detected signal.
///
/// Identifiers are assigned by storage only; candidates arriving with one
/// already set are rejected as invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub fullname: String,
    pub tp: f64,
    pub sl: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub buy_signal: BuySignal,
}
