use std::sync::Arc;

use tracing::info;

use common::{Error, NewPosition, Position, PositionStore, Result, SignalStore};

use crate::Evaluator;

/// Creates a signal and its position exactly once, then evaluates the
/// position at write time.
///
/// Write-time evaluation trades throughput for immediate consistency:
/// clients get a resolved position back whenever the data allows it, and
/// slow resolvers fall through to the backfill.
pub struct Ingestor {
    signals: Arc<dyn SignalStore>,
    positions: Arc<dyn PositionStore>,
    evaluator: Evaluator,
}

impl Ingestor {
    pub fn new(
        signals: Arc<dyn SignalStore>,
        positions: Arc<dyn PositionStore>,
        evaluator: Evaluator,
    ) -> Self {
        Self {
            signals,
            positions,
            evaluator,
        }
    }

    /// Upsert the candidate's signal and position by their natural keys and
    /// evaluate the result. Any evaluator failure fails the whole call; a
    /// position is never reported ingested-but-unevaluated silently.
    pub async fn ingest(&self, candidate: NewPosition) -> Result<Position> {
        if candidate.id.is_some() {
            return Err(Error::InvalidInput(
                "position id is assigned by storage and must not be set".into(),
            ));
        }
        if candidate.buy_signal.id.is_some() {
            return Err(Error::InvalidInput(
                "buy signal id is assigned by storage and must not be set".into(),
            ));
        }
        if !(candidate.sl > 0.0 && candidate.tp > candidate.sl) {
            return Err(Error::InvalidInput(format!(
                "thresholds must satisfy tp > sl > 0, got tp={} sl={}",
                candidate.tp, candidate.sl
            )));
        }

        let signal = self.signals.upsert(&candidate.buy_signal).await?;
        let signal_id = signal
            .id
            .ok_or_else(|| Error::Other("signal store returned a row without an id".into()))?;

        let mut position = self
            .positions
            .upsert(&Position {
                id: None,
                serial_id: 0,
                buy_signal_id: signal_id,
                buy_signal: None,
                name: candidate.name,
                fullname: candidate.fullname,
                tp: candidate.tp,
                sl: candidate.sl,
                metadata: candidate.metadata,
                ratio: None,
            })
            .await?;

        position.ratio = self.evaluator.compute_ratio(&position, &signal).await?;
        position.buy_signal = Some(signal);

        Ok(position)
    }

    /// Ingest a batch, failing fast on the first bad candidate.
    pub async fn ingest_all(&self, candidates: Vec<NewPosition>) -> Result<Vec<Position>> {
        let mut ingested = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            ingested.push(self.ingest(candidate).await?);
        }
        info!(count = ingested.len(), "positions ingested");
        Ok(ingested)
    }
}
