//! Market-regime gate: classify the broad market at a date.

mod cache;
mod classify;
mod gate;

pub use cache::RegimeCache;
pub use classify::{
    decide, describe, sma, RegimeSettings, RegimeSnapshot, RegimeWeights, Trend, VolatilityBand,
};
pub use gate::RegimeGate;

use crate::data::DataError;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegimeError {
    #[error("regime input {symbol} unavailable: {source}")]
    Data {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("{symbol}: need {needed} bars on or before {date}, have {available}")]
    InsufficientHistory {
        symbol: String,
        date: NaiveDate,
        needed: usize,
        available: usize,
    },

    #[error("no {symbol} close shortly before {date}")]
    NoVolatilityReading { symbol: String, date: NaiveDate },

    #[error("regime cache I/O: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("regime cache format: {0}")]
    CacheFormat(#[from] serde_json::Error),
}
