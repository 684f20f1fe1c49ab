pub mod config;
pub mod error;
pub mod interval;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use interval::Interval;
pub use store::{
    CandlePage, CandleStore, PositionStore, PriceCondition, SignalPage, SignalStore,
    UnresolvedPage,
};
pub use types::*;
