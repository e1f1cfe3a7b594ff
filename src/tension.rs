//! The tension bar the player keeps inside a comfort band.
//!
//! Time is accounted in whole microseconds so the per-zone accumulators always
//! sum to the total exactly. Each elapsed slice is classified by the tension
//! held *during* the slice, i.e. the value before that slice's decay.

use crate::character::Character;
use crate::effects::Temperament;
use serde::{Deserialize, Serialize};

pub const MIN_TENSION: f64 = 0.0;
pub const MAX_TENSION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Zone {
    Good,
    Over,
    Under,
}

/// Closed-interval classification: the band's edges count as `Good`.
pub fn classify(tension: f64, comfort_min: f64, comfort_max: f64) -> Zone {
    if tension > comfort_max {
        Zone::Over
    } else if tension < comfort_min {
        Zone::Under
    } else {
        Zone::Good
    }
}

/// Converts a millisecond delta into whole microseconds, rejecting bad input.
pub fn delta_to_micros(delta_ms: f64) -> u64 {
    if !delta_ms.is_finite() || delta_ms < 0.0 {
        log::warn!("invalid tick delta {delta_ms}ms, treating as 0");
        return 0;
    }
    (delta_ms * 1000.0).round() as u64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMetrics {
    good_us: u64,
    over_us: u64,
    under_us: u64,
    total_us: u64,
}

impl ZoneMetrics {
    pub fn from_millis(good_ms: u64, over_ms: u64, under_ms: u64) -> Self {
        let good_us = good_ms.saturating_mul(1000);
        let over_us = over_ms.saturating_mul(1000);
        let under_us = under_ms.saturating_mul(1000);
        Self {
            good_us,
            over_us,
            under_us,
            total_us: good_us.saturating_add(over_us).saturating_add(under_us),
        }
    }

    pub fn record(&mut self, zone: Zone, micros: u64) {
        match zone {
            Zone::Good => self.good_us += micros,
            Zone::Over => self.over_us += micros,
            Zone::Under => self.under_us += micros,
        }
        self.total_us += micros;
    }

    pub fn good_ms(&self) -> f64 {
        self.good_us as f64 / 1000.0
    }

    pub fn over_ms(&self) -> f64 {
        self.over_us as f64 / 1000.0
    }

    pub fn under_ms(&self) -> f64 {
        self.under_us as f64 / 1000.0
    }

    pub fn total_ms(&self) -> f64 {
        self.total_us as f64 / 1000.0
    }

    pub fn total_micros(&self) -> u64 {
        self.total_us
    }

    pub fn is_balanced(&self) -> bool {
        self.good_us + self.over_us + self.under_us == self.total_us
    }

    /// `(good, over, under)` as unrounded percentages, or `None` when nothing
    /// was recorded.
    pub fn percentages(&self) -> Option<(f64, f64, f64)> {
        if self.total_us == 0 {
            return None;
        }
        let total = self.total_us as f64;
        Some((
            100.0 * self.good_us as f64 / total,
            100.0 * self.over_us as f64 / total,
            100.0 * self.under_us as f64 / total,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct TensionSimulator {
    tension: f64,
    comfort_min: f64,
    comfort_max: f64,
    decay_per_sec: f64,
    decay_multiplier: f64,
    metrics: ZoneMetrics,
}

impl TensionSimulator {
    pub fn new(starting_tension: f64, decay_per_sec: f64, character: &Character) -> Self {
        Self {
            tension: starting_tension.clamp(MIN_TENSION, MAX_TENSION),
            comfort_min: character.comfort_min,
            comfort_max: character.comfort_max,
            decay_per_sec,
            decay_multiplier: character.trait_.decay_multiplier(),
            metrics: ZoneMetrics::default(),
        }
    }

    pub fn tension(&self) -> f64 {
        self.tension
    }

    pub fn metrics(&self) -> &ZoneMetrics {
        &self.metrics
    }

    pub fn zone(&self) -> Zone {
        classify(self.tension, self.comfort_min, self.comfort_max)
    }

    /// Accounts one elapsed slice and decays. Returns the zone the slice was
    /// credited to.
    pub fn tick(&mut self, delta_ms: f64) -> Zone {
        self.tick_micros(delta_to_micros(delta_ms))
    }

    pub fn tick_micros(&mut self, micros: u64) -> Zone {
        let zone = self.zone();
        self.metrics.record(zone, micros);

        let dt_secs = micros as f64 / 1_000_000.0;
        let decay = self.decay_per_sec * self.decay_multiplier * dt_secs;
        self.tension = (self.tension - decay).max(MIN_TENSION);
        zone
    }

    pub fn apply_impulse(&mut self, base_impulse: f64, temperament: Temperament) -> f64 {
        let gain = base_impulse * temperament.impulse_multiplier();
        self.tension = (self.tension + gain).clamp(MIN_TENSION, MAX_TENSION);
        self.tension
    }
}
