use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use common::{PositionStore, Ratio, Result};

use crate::Evaluator;

/// Result of one page of the backfill scan.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageOutcome {
    pub resolved: u64,
    pub skipped: u64,
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

/// Result of a full backfill run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BackfillOutcome {
    pub resolved: u64,
    pub skipped: u64,
}

/// Cursor-paginated scan resolving the backlog of positions without a
/// ratio.
///
/// A single logical pass with no internal concurrency; safe to re-invoke
/// because only unresolved positions are re-selected. There is no
/// per-position lock, so run one invocation at a time if duplicate
/// evaluation work matters.
pub struct Backfill {
    positions: Arc<dyn PositionStore>,
    evaluator: Evaluator,
    page_size: i64,
}

impl Backfill {
    pub fn new(positions: Arc<dyn PositionStore>, evaluator: Evaluator, page_size: i64) -> Self {
        Self {
            positions,
            evaluator,
            page_size,
        }
    }

    /// Scan the whole backlog, one page at a time, resuming with the cursor
    /// each page hands back.
    pub async fn run(&self) -> Result<BackfillOutcome> {
        let mut outcome = BackfillOutcome::default();
        let mut cursor = None;

        loop {
            let page = self.run_page(cursor, self.page_size).await?;
            outcome.resolved += page.resolved;
            outcome.skipped += page.skipped;
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        info!(
            resolved = outcome.resolved,
            skipped = outcome.skipped,
            "backfill finished"
        );
        Ok(outcome)
    }

    /// Evaluate one page of unresolved positions and persist what resolved.
    ///
    /// A single row never aborts the page: positions without an embedded
    /// signal and rows whose evaluation fails are logged, counted and
    /// skipped; they stay unresolved and are re-selected by a later run.
    pub async fn run_page(&self, cursor: Option<i64>, limit: i64) -> Result<PageOutcome> {
        let page = self.positions.fetch_unresolved(cursor, limit).await?;
        if page.positions.is_empty() {
            return Ok(PageOutcome {
                resolved: 0,
                skipped: 0,
                next_cursor: None,
                has_more: false,
            });
        }

        info!(count = page.positions.len(), "evaluating unresolved positions");

        let mut resolved: Vec<(Uuid, Ratio)> = Vec::new();
        let mut skipped = 0u64;

        for position in &page.positions {
            let Some(id) = position.id else {
                warn!(serial_id = position.serial_id, "unresolved position has no id");
                skipped += 1;
                continue;
            };

            let Some(signal) = position.buy_signal.as_ref() else {
                warn!(position_id = %id, "no buy signal attached to position");
                skipped += 1;
                continue;
            };

            match self.evaluator.compute_ratio(position, signal).await {
                Ok(Some(ratio)) if ratio.value != 0.0 => resolved.push((id, ratio)),
                Ok(_) => {} // not decided yet; picked up again by a later run
                Err(e) => {
                    warn!(position_id = %id, error = %e, "evaluation failed, skipping");
                    skipped += 1;
                }
            }
        }

        let updated = if resolved.is_empty() {
            0
        } else {
            self.positions.write_ratios(&resolved).await?
        };

        Ok(PageOutcome {
            resolved: updated,
            skipped,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }
}
