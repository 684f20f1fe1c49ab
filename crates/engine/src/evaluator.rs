use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use common::{BuySignal, CandleStore, Error, Position, PriceCondition, Ratio, Result};

/// Decides a position's outcome from the 1-minute price history following
/// its entry.
///
/// Holds no storage of its own and never persists; callers decide what to
/// do with the computed ratio.
#[derive(Clone)]
pub struct Evaluator {
    candles: Arc<dyn CandleStore>,
}

impl Evaluator {
    pub fn new(candles: Arc<dyn CandleStore>) -> Self {
        Self { candles }
    }

    /// First threshold crossed after entry, as a realized ratio.
    ///
    /// `Ok(None)` means the outcome is not decided yet: neither threshold
    /// has been crossed, or the 1-minute series is still trailing
    /// publication. `Err(DataMissing)` means the window has passed with no
    /// data at all.
    pub async fn compute_ratio(
        &self,
        position: &Position,
        signal: &BuySignal,
    ) -> Result<Option<Ratio>> {
        // Earliest moment the position could have been entered: one full
        // interval after the candle the signal was detected on.
        let entry = signal.interval.add_one(signal.date);

        let tp_hit = self
            .candles
            .earliest_hit(&signal.pair, entry, PriceCondition::HighAtLeast(position.tp))
            .await?;
        let sl_hit = self
            .candles
            .earliest_hit(&signal.pair, entry, PriceCondition::LowAtMost(position.sl))
            .await?;

        let (hit_price, hit_date) = match (tp_hit, sl_hit) {
            (None, None) => return self.unresolved(signal, entry).await,
            (Some(tp), None) => (position.tp, tp.date),
            (None, Some(sl)) => (position.sl, sl.date),
            // TP wins only on a strictly earlier candle; an exact-timestamp
            // tie resolves to SL.
            (Some(tp), Some(sl)) => {
                if tp.date < sl.date {
                    (position.tp, tp.date)
                } else {
                    (position.sl, sl.date)
                }
            }
        };

        Ok(Some(Ratio {
            value: hit_price / signal.price,
            date: hit_date,
        }))
    }

    /// Neither threshold was crossed. Absence only means "not yet decided"
    /// when 1-minute data exists past the entry; otherwise a publication
    /// lag (the series trails by up to a day) must be told apart from a
    /// window that can never be resolved.
    async fn unresolved(&self, signal: &BuySignal, entry: DateTime<Utc>) -> Result<Option<Ratio>> {
        if self.candles.has_minute_candles(&signal.pair, entry).await? {
            return Ok(None);
        }

        let entry_age_days = (Utc::now().date_naive() - entry.date_naive()).num_days();
        if entry_age_days <= 1 {
            debug!(pair = %signal.pair, entry = %entry, "minute candles not yet published");
            return Ok(None);
        }

        Err(Error::DataMissing(format!(
            "no 1m candles for {} at or after {}",
            signal.pair, entry
        )))
    }
}
