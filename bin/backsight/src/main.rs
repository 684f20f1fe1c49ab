use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::AppState;
use common::{CandleStore, Config, PositionStore, SignalStore};
use engine::{Backfill, Evaluator, Ingestor};
use store::{PgCandleStore, PgPositionStore, PgSignalStore};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(port = cfg.api_port, "Backsight starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Stores ────────────────────────────────────────────────────────────────
    let candles: Arc<dyn CandleStore> = Arc::new(PgCandleStore::new(db.clone()));
    let signals: Arc<dyn SignalStore> = Arc::new(PgSignalStore::new(db.clone()));
    let positions: Arc<dyn PositionStore> = Arc::new(PgPositionStore::new(db.clone()));

    // ── Engine services ───────────────────────────────────────────────────────
    let evaluator = Evaluator::new(candles.clone());
    let ingestor = Arc::new(Ingestor::new(
        signals.clone(),
        positions.clone(),
        evaluator.clone(),
    ));
    let backfill = Arc::new(Backfill::new(
        positions.clone(),
        evaluator.clone(),
        cfg.backfill_page_size,
    ));

    // ── Periodic backfill (optional) ──────────────────────────────────────────
    // A single task, so driver runs never overlap.
    if let Some(secs) = cfg.backfill_interval_secs {
        let backfill = backfill.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match backfill.run().await {
                    Ok(outcome) => info!(
                        resolved = outcome.resolved,
                        skipped = outcome.skipped,
                        "periodic backfill done"
                    ),
                    Err(e) => error!(error = %e, "periodic backfill failed"),
                }
            }
        });
        info!(interval_secs = secs, "Periodic backfill enabled");
    }

    // ── API server ────────────────────────────────────────────────────────────
    let state = AppState {
        ingestor,
        backfill,
        evaluator,
        candles,
        signals,
        positions,
    };

    api::serve(state, cfg.api_port).await;
}
