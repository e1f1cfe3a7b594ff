//! Boundary to the external opponent/strategy service.
//!
//! The engine never depends on a real service being reachable: every call
//! goes through [`opponents_or_fallback`] or [`hints_or_unavailable`], which
//! log the failure and carry on.

use crate::character::{RaceDistance, Stat, StatLine, Style};
use crate::race::OpponentProfile;
use crate::scoring::stat_rating;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RIVAL_NAMES: [&str; 8] = [
    "El Condor Pasa",
    "Grass Wonder",
    "Mejiro McQueen",
    "Oguri Cap",
    "Taiki Shuttle",
    "Symboli Rudolf",
    "Seiun Sky",
    "King Halo",
];
const STAT_RANGE: std::ops::RangeInclusive<i32> = 50..=100;
const FOCUS_BONUS: i32 = 10;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor unavailable: {0}")]
    Unavailable(String),
    #[error("advisor returned unusable data: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpponentRequest {
    pub count: u32,
    pub distance: RaceDistance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyHints {
    pub best_distance: RaceDistance,
    pub preferred_style: Style,
    pub opponent_analysis: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Hints {
    Ready(StrategyHints),
    Unavailable,
}

pub trait Advisor {
    fn opponents(&self, request: &OpponentRequest) -> Result<Vec<OpponentProfile>, AdvisorError>;
    fn strategy_hints(&self, stats: &StatLine) -> Result<StrategyHints, AdvisorError>;
    fn counter_hint(&self, opponent: &StatLine) -> Result<String, AdvisorError>;
}

/// Offline advisor; the same seed always yields the same field.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAdvisor {
    seed: u64,
}

impl RuleBasedAdvisor {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn suited_style(distance: RaceDistance) -> Style {
        match distance {
            RaceDistance::Short => Style::Front,
            RaceDistance::Mid => Style::Mid,
            RaceDistance::Long => Style::Back,
        }
    }

    fn field(&self, request: &OpponentRequest) -> Vec<OpponentProfile> {
        let salt = match request.distance {
            RaceDistance::Short => 1,
            RaceDistance::Mid => 2,
            RaceDistance::Long => 3,
        };
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_mul(31).wrapping_add(salt));
        let suited = Self::suited_style(request.distance);
        (0..request.count)
            .map(|i| {
                let mut stats = StatLine::new(
                    rng.gen_range(STAT_RANGE),
                    rng.gen_range(STAT_RANGE),
                    rng.gen_range(STAT_RANGE),
                    rng.gen_range(STAT_RANGE),
                );
                match request.distance {
                    RaceDistance::Short => stats.speed += FOCUS_BONUS,
                    RaceDistance::Mid => stats.power += FOCUS_BONUS,
                    RaceDistance::Long => stats.stamina += FOCUS_BONUS,
                }
                let style = if rng.gen_bool(0.5) {
                    suited
                } else {
                    [Style::Front, Style::Mid, Style::Back][rng.gen_range(0..3)]
                };
                OpponentProfile {
                    name: RIVAL_NAMES[i as usize % RIVAL_NAMES.len()].to_string(),
                    stats: stats.clamped(),
                    style,
                }
            })
            .collect()
    }
}

fn best_fit(stats: &StatLine) -> (RaceDistance, Style) {
    let distances = [RaceDistance::Short, RaceDistance::Mid, RaceDistance::Long];
    let styles = [Style::Front, Style::Mid, Style::Back];
    distances
        .iter()
        .cartesian_product(styles.iter())
        .map(|(&d, &s)| (d, s, stat_rating(stats, s, d)))
        .fold(None, |best: Option<(RaceDistance, Style, f64)>, cur| match best {
            Some(b) if b.2 >= cur.2 => Some(b),
            _ => Some(cur),
        })
        .map_or((RaceDistance::Mid, Style::Mid), |(d, s, _)| (d, s))
}

impl Advisor for RuleBasedAdvisor {
    fn opponents(&self, request: &OpponentRequest) -> Result<Vec<OpponentProfile>, AdvisorError> {
        Ok(self.field(request))
    }

    fn strategy_hints(&self, stats: &StatLine) -> Result<StrategyHints, AdvisorError> {
        let (best_distance, preferred_style) = best_fit(stats);
        let opponent_analysis = match best_distance {
            RaceDistance::Short => "Short fields are won at the gate; watch for Front runners and hit your first beats.",
            RaceDistance::Mid => "Mid races reward steady timing; save your burst for the second half.",
            RaceDistance::Long => "Long races punish early bursts; stay calm and let stamina do the work.",
        };
        Ok(StrategyHints {
            best_distance,
            preferred_style,
            opponent_analysis: opponent_analysis.to_string(),
        })
    }

    fn counter_hint(&self, opponent: &StatLine) -> Result<String, AdvisorError> {
        let hint = match opponent.strongest() {
            Stat::Speed => "Fast starter: stay on the beat early and pass when they fade.",
            Stat::Stamina => "Stayer: they will not tire, so build charge early and burst first.",
            Stat::Power => "Power runner: avoid their lane and keep your line clean.",
            Stat::Technique => "Technician: they rarely miss, so every mistimed tap costs you.",
        };
        Ok(hint.to_string())
    }
}

/// Asks `advisor` for opponents, falling back to `fallback` when the call
/// fails or returns the wrong number of runners.
pub fn opponents_or_fallback(
    advisor: &dyn Advisor,
    fallback: &RuleBasedAdvisor,
    request: &OpponentRequest,
) -> Vec<OpponentProfile> {
    match advisor.opponents(request) {
        Ok(field) if field.len() == request.count as usize => field
            .into_iter()
            .map(|mut op| {
                op.stats = op.stats.clamped();
                op
            })
            .collect(),
        Ok(field) => {
            log::warn!(
                "advisor returned {} opponents, wanted {}; using fallback",
                field.len(),
                request.count
            );
            fallback.field(request)
        }
        Err(e) => {
            log::warn!("{e}; using fallback opponents");
            fallback.field(request)
        }
    }
}

pub fn hints_or_unavailable(advisor: &dyn Advisor, stats: &StatLine) -> Hints {
    match advisor.strategy_hints(stats) {
        Ok(hints) => Hints::Ready(hints),
        Err(e) => {
            log::warn!("{e}; hints unavailable");
            Hints::Unavailable
        }
    }
}
