//! MarketRegime: broad-market classification label.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Bull,
    Bear,
    CautiousBull,
    Choppy,
    Unknown,
}

impl MarketRegime {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketRegime::Bull => "BULL",
            MarketRegime::Bear => "BEAR",
            MarketRegime::CautiousBull => "CAUTIOUS_BULL",
            MarketRegime::Choppy => "CHOPPY",
            MarketRegime::Unknown => "UNKNOWN",
        }
    }

    /// Regimes in which new positions are not opened when gating is on.
    pub fn blocks_entries(self) -> bool {
        matches!(self, MarketRegime::Bear | MarketRegime::Choppy)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BULL" => Some(MarketRegime::Bull),
            "BEAR" => Some(MarketRegime::Bear),
            "CAUTIOUS_BULL" => Some(MarketRegime::CautiousBull),
            "CHOPPY" => Some(MarketRegime::Choppy),
            "UNKNOWN" => Some(MarketRegime::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
