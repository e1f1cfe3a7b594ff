//! Fixed catalog of character modifiers.
//!
//! Every trait is a pure function of `(phase, context, base) -> adjusted`. The
//! tension simulator asks for [`EffectPhase::Decay`], the scorer asks for
//! [`EffectPhase::Score`] and one [`EffectPhase::StatGain`] per stat, so no
//! caller ever branches on a trait name.

use crate::character::Stat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Temperament {
    Calm,
    Normal,
    Fiery,
}

impl Temperament {
    pub fn impulse_multiplier(self) -> f64 {
        match self {
            Temperament::Calm => 0.8,
            Temperament::Normal => 1.0,
            Temperament::Fiery => 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Trait {
    None,
    /// Decays 20% slower.
    Steady,
    /// Score x1.1 when the session ran longer than nine seconds.
    #[strum(serialize = "Late Burst")]
    LateBurst,
    /// +1 speed whenever any overstrain was recorded.
    Powerhouse,
    /// +1 technique above 60% good stride.
    Prodigy,
    /// +1 stamina above 10% underpace.
    #[strum(serialize = "Heart of Gold")]
    HeartOfGold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    Decay,
    Score,
    StatGain(Stat),
}

/// Session metrics as seen by effects, already turned into percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectContext {
    pub good_pct: f64,
    pub over_pct: f64,
    pub under_pct: f64,
    pub total_ms: f64,
}

const STEADY_DECAY: f64 = 0.8;
const LATE_BURST_SCORE: f64 = 1.1;
const LATE_BURST_MIN_SECS: f64 = 9.0;
const PRODIGY_GOOD_PCT: f64 = 60.0;
const HEART_OF_GOLD_UNDER_PCT: f64 = 10.0;

impl Trait {
    pub fn adjust(self, phase: EffectPhase, ctx: &EffectContext, base: f64) -> f64 {
        match (self, phase) {
            (Trait::Steady, EffectPhase::Decay) => base * STEADY_DECAY,
            (Trait::LateBurst, EffectPhase::Score) if ctx.total_ms / 1000.0 > LATE_BURST_MIN_SECS => {
                base * LATE_BURST_SCORE
            }
            (Trait::Powerhouse, EffectPhase::StatGain(Stat::Speed)) if ctx.over_pct > 0.0 => {
                base + 1.0
            }
            (Trait::Prodigy, EffectPhase::StatGain(Stat::Technique))
                if ctx.good_pct > PRODIGY_GOOD_PCT =>
            {
                base + 1.0
            }
            (Trait::HeartOfGold, EffectPhase::StatGain(Stat::Stamina))
                if ctx.under_pct > HEART_OF_GOLD_UNDER_PCT =>
            {
                base + 1.0
            }
            _ => base,
        }
    }

    /// Shorthand for the decay phase, which never looks at metrics.
    pub fn decay_multiplier(self) -> f64 {
        self.adjust(EffectPhase::Decay, &EffectContext::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(good: f64, over: f64, under: f64, total_ms: f64) -> EffectContext {
        EffectContext {
            good_pct: good,
            over_pct: over,
            under_pct: under,
            total_ms,
        }
    }

    #[test]
    fn temperament_multipliers() {
        assert_eq!(Temperament::Calm.impulse_multiplier(), 0.8);
        assert_eq!(Temperament::Normal.impulse_multiplier(), 1.0);
        assert_eq!(Temperament::Fiery.impulse_multiplier(), 1.2);
    }

    #[test]
    fn steady_slows_decay_only() {
        assert_eq!(Trait::Steady.decay_multiplier(), 0.8);
        assert_eq!(Trait::None.decay_multiplier(), 1.0);
        let c = ctx(50.0, 25.0, 25.0, 12_000.0);
        assert_eq!(Trait::Steady.adjust(EffectPhase::Score, &c, 31.25), 31.25);
    }

    #[test]
    fn late_burst_needs_a_long_session() {
        let long = ctx(50.0, 25.0, 25.0, 12_000.0);
        let short = ctx(50.0, 25.0, 25.0, 9_000.0);
        let boosted = Trait::LateBurst.adjust(EffectPhase::Score, &long, 40.0);
        assert!((boosted - 44.0).abs() < 1e-9);
        assert_eq!(Trait::LateBurst.adjust(EffectPhase::Score, &short, 40.0), 40.0);
    }

    #[test]
    fn powerhouse_adds_speed_on_any_overstrain() {
        let strained = ctx(90.0, 0.5, 9.5, 12_000.0);
        let clean = ctx(100.0, 0.0, 0.0, 12_000.0);
        let speed = EffectPhase::StatGain(Stat::Speed);
        assert_eq!(Trait::Powerhouse.adjust(speed, &strained, 3.0), 4.0);
        assert_eq!(Trait::Powerhouse.adjust(speed, &clean, 3.0), 3.0);
        assert_eq!(
            Trait::Powerhouse.adjust(EffectPhase::StatGain(Stat::Stamina), &strained, 0.0),
            0.0
        );
    }

    #[test]
    fn prodigy_and_heart_of_gold_thresholds_are_strict() {
        let tech = EffectPhase::StatGain(Stat::Technique);
        let stamina = EffectPhase::StatGain(Stat::Stamina);
        assert_eq!(Trait::Prodigy.adjust(tech, &ctx(60.0, 0.0, 40.0, 1.0), 0.0), 0.0);
        assert_eq!(Trait::Prodigy.adjust(tech, &ctx(61.0, 0.0, 39.0, 1.0), 0.0), 1.0);
        assert_eq!(Trait::HeartOfGold.adjust(stamina, &ctx(90.0, 0.0, 10.0, 1.0), 2.0), 2.0);
        assert_eq!(Trait::HeartOfGold.adjust(stamina, &ctx(89.0, 0.0, 11.0, 1.0), 2.0), 3.0);
    }

    #[test]
    fn display_names_match_catalog() {
        assert_eq!(Trait::LateBurst.to_string(), "Late Burst");
        assert_eq!(Trait::HeartOfGold.to_string(), "Heart of Gold");
    }
}
