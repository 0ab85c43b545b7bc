//! Domain types for ScoreLab

pub mod bar;
pub mod candidate;
pub mod regime;
pub mod trade;

pub use bar::PriceBar;
pub use candidate::{Candidate, InvalidCandidate, Score, ScoreScale, Tier};
pub use regime::MarketRegime;
pub use trade::{ExitReason, Trade, TradeLegs};
