pub mod backfill;
pub mod evaluator;
pub mod ingest;

pub use backfill::{Backfill, BackfillOutcome, PageOutcome};
pub use evaluator::Evaluator;
pub use ingest::Ingestor;
