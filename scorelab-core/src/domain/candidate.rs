//! Candidate: a scored entry opportunity handed over by upstream scorers.
//!
//! Only `{ticker, score, tier, timing_convergence}` crosses the boundary.
//! The tier label is resolved into a [`Tier`] once, at construction, so the
//! exit engine never has to look at display strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hold period used when the tier label carries no recognized marker.
pub const DEFAULT_HOLD_DAYS: u32 = 20;

/// Extra days granted when upstream timing signals converge.
pub const TIMING_BONUS_DAYS: u32 = 5;

/// Upper bound on any hold period, bonus included.
pub const MAX_HOLD_DAYS: u32 = 30;

/// Hold-period bucket derived from the upstream tier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Elite,
    Strong,
    Good,
    Moderate,
    Weak,
    /// No marker matched.
    Unrated,
}

impl Tier {
    /// Resolve an upstream display label such as `"🔥 ELITE"` or `"Strong Buy"`.
    ///
    /// Markers are matched case-insensitively in priority order, so a label
    /// naming two tiers resolves to the higher one.
    pub fn from_label(label: &str) -> Self {
        let upper = label.to_ascii_uppercase();
        const MARKERS: &[(&[&str], Tier)] = &[
            (&["ELITE", "TOP"], Tier::Elite),
            (&["STRONG"], Tier::Strong),
            (&["GOOD"], Tier::Good),
            (&["MODERATE"], Tier::Moderate),
            (&["WEAK", "LOW"], Tier::Weak),
        ];
        MARKERS
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| upper.contains(n)))
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Unrated)
    }

    /// Base hold period in bars, before any timing bonus.
    pub fn base_hold_days(self) -> u32 {
        match self {
            Tier::Elite => 30,
            Tier::Strong => 25,
            Tier::Good => 20,
            Tier::Moderate => 15,
            Tier::Weak => 10,
            Tier::Unrated => DEFAULT_HOLD_DAYS,
        }
    }

    /// Hold period in bars, with the timing-convergence bonus applied and capped.
    pub fn hold_period(self, timing_convergence: bool) -> u32 {
        let base = self.base_hold_days();
        if timing_convergence {
            (base + TIMING_BONUS_DAYS).min(MAX_HOLD_DAYS)
        } else {
            base
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Elite => "elite",
            Tier::Strong => "strong",
            Tier::Good => "good",
            Tier::Moderate => "moderate",
            Tier::Weak => "weak",
            Tier::Unrated => "unrated",
        };
        f.write_str(s)
    }
}

/// Which of the two upstream score columns a value came from.
///
/// The scales differ, so each has its own default qualifying threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// `composite_score` column, sector/institutional enhancements applied.
    Composite,
    /// `score` column, raw scorer output.
    Raw,
}

impl ScoreScale {
    pub fn default_threshold(self) -> f64 {
        match self {
            ScoreScale::Composite => 55.0,
            ScoreScale::Raw => 40.0,
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            ScoreScale::Composite => "composite_score",
            ScoreScale::Raw => "score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub scale: ScoreScale,
}

impl Score {
    pub fn composite(value: f64) -> Self {
        Self {
            value,
            scale: ScoreScale::Composite,
        }
    }

    pub fn raw(value: f64) -> Self {
        Self {
            value,
            scale: ScoreScale::Raw,
        }
    }

    /// True if the score clears `override_min`, or the scale's default threshold.
    pub fn qualifies(&self, override_min: Option<f64>) -> bool {
        self.value >= override_min.unwrap_or_else(|| self.scale.default_threshold())
    }
}

/// Why a candidate could not be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCandidate {
    #[error("missing ticker")]
    MissingTicker,

    #[error("score for '{ticker}' is not a finite number")]
    NonFiniteScore { ticker: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    pub score: Score,
    pub tier: Tier,
    pub timing_convergence: bool,
}

impl Candidate {
    /// Validate and build a candidate. The tier label is resolved here, once.
    pub fn new(
        ticker: impl Into<String>,
        score: Score,
        tier_label: &str,
        timing_convergence: bool,
    ) -> Result<Self, InvalidCandidate> {
        let ticker = ticker.into().trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(InvalidCandidate::MissingTicker);
        }
        if !score.value.is_finite() {
            return Err(InvalidCandidate::NonFiniteScore { ticker });
        }
        Ok(Self {
            ticker,
            score,
            tier: Tier::from_label(tier_label),
            timing_convergence,
        })
    }

    pub fn hold_period(&self) -> u32 {
        self.tier.hold_period(self.timing_convergence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_markers_resolve() {
        assert_eq!(Tier::from_label("🔥 ELITE"), Tier::Elite);
        assert_eq!(Tier::from_label("top pick"), Tier::Elite);
        assert_eq!(Tier::from_label("Strong Buy"), Tier::Strong);
        assert_eq!(Tier::from_label("✓ good"), Tier::Good);
        assert_eq!(Tier::from_label("MODERATE"), Tier::Moderate);
        assert_eq!(Tier::from_label("weak"), Tier::Weak);
        assert_eq!(Tier::from_label("watchlist"), Tier::Unrated);
        assert_eq!(Tier::from_label(""), Tier::Unrated);
    }

    #[test]
    fn hold_period_table() {
        assert_eq!(Tier::Elite.hold_period(false), 30);
        assert_eq!(Tier::Strong.hold_period(false), 25);
        assert_eq!(Tier::Good.hold_period(false), 20);
        assert_eq!(Tier::Moderate.hold_period(false), 15);
        assert_eq!(Tier::Weak.hold_period(false), 10);
        assert_eq!(Tier::Unrated.hold_period(false), 20);
    }

    #[test]
    fn timing_bonus_is_capped() {
        assert_eq!(Tier::Elite.hold_period(true), 30);
        assert_eq!(Tier::Strong.hold_period(true), 30);
        assert_eq!(Tier::Good.hold_period(true), 25);
        assert_eq!(Tier::Weak.hold_period(true), 15);
    }

    #[test]
    fn score_thresholds_per_scale() {
        assert!(Score::composite(55.0).qualifies(None));
        assert!(!Score::composite(54.9).qualifies(None));
        assert!(Score::raw(40.0).qualifies(None));
        assert!(!Score::raw(39.0).qualifies(None));
        assert!(Score::raw(39.0).qualifies(Some(30.0)));
        assert!(!Score::composite(70.0).qualifies(Some(80.0)));
    }

    #[test]
    fn candidate_validation() {
        let c = Candidate::new(" nvda ", Score::raw(50.0), "Strong", true).unwrap();
        assert_eq!(c.ticker, "NVDA");
        assert_eq!(c.tier, Tier::Strong);
        assert_eq!(c.hold_period(), 30);

        assert_eq!(
            Candidate::new("  ", Score::raw(50.0), "Strong", false),
            Err(InvalidCandidate::MissingTicker)
        );
        assert!(matches!(
            Candidate::new("AAPL", Score::raw(f64::NAN), "Strong", false),
            Err(InvalidCandidate::NonFiniteScore { .. })
        ));
    }
}
