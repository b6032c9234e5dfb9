//! Recency Scorer.
//!
//! `m = 1 + (ceiling - 1) * exp(-age / half_life)` with age in days,
//! clamped at zero so future-dated documents get the ceiling.

use chrono::{DateTime, Utc};

use lexrank_core::config::RecencySettings;
use lexrank_core::error::Result;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyScorer {
    half_life_days: f64,
    boost_ceiling: f64,
}

impl RecencyScorer {
    pub fn new(settings: &RecencySettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            half_life_days: settings.half_life_days,
            boost_ceiling: settings.boost_ceiling,
        })
    }

    pub fn half_life_days(&self) -> f64 {
        self.half_life_days
    }

    pub fn boost_ceiling(&self) -> f64 {
        self.boost_ceiling
    }

    /// Non-negative age in fractional days.
    pub fn age_days(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let millis = (now - published_at).num_milliseconds() as f64;
        (millis / MILLIS_PER_DAY).max(0.0)
    }

    /// Multiplier in `[1.0, boost_ceiling]`.
    pub fn multiplier(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age = Self::age_days(published_at, now);
        1.0 + (self.boost_ceiling - 1.0) * (-age / self.half_life_days).exp()
    }

    /// `1 + weight * (m - 1)` with `weight` clamped to `[0, 1]`, so the result
    /// stays in `[1.0, boost_ceiling]`. A zero weight is exactly 1.0.
    pub fn weighted_multiplier(&self, published_at: DateTime<Utc>, now: DateTime<Utc>, weight: f64) -> f64 {
        let weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
        if weight == 0.0 {
            return 1.0;
        }
        1.0 + weight * (self.multiplier(published_at, now) - 1.0)
    }
}
