//! Turning a finished session's metrics into a score, stat deltas and a
//! placement.
//!
//! Everything here is a pure function of its inputs. All arithmetic stays in
//! `f64` and is rounded exactly once, when a value leaves this module, so a
//! trait multiplier never compounds a rounding error.

use crate::character::{Character, RaceDistance, Stat, StatChanges, StatLine, Style};
use crate::effects::{EffectContext, EffectPhase};
use crate::race::{OpponentProfile, Standing};
use crate::tension::ZoneMetrics;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const OVER_PENALTY: f64 = 0.5;
pub const UNDER_PENALTY: f64 = 0.25;
/// Underpace share above which a sprint counts as stamina work.
pub const UNDERPACE_STAMINA_PCT: f64 = 20.0;

pub const RACE_BASE_SCORE: f64 = 5000.0;
pub const RACE_PLACEMENT_PENALTY: f64 = 250.0;
const STAT_RACE_JITTER: f64 = 0.05;
const STYLE_BONUS: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentages {
    pub good: i32,
    pub over: i32,
    pub under: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: i64,
    pub percentages: Percentages,
    pub stat_changes: StatChanges,
    pub placement: Option<u32>,
    pub standings: Vec<Standing>,
}

impl ScoreCard {
    /// What a session that never accumulated time is worth.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Everything a finished beat race hands to its scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceReport {
    pub elapsed_ms: f64,
    pub max_time_ms: f64,
    pub standings: Vec<Standing>,
    pub hits: u32,
    pub misses: u32,
}

impl RaceReport {
    pub fn player_placement(&self) -> u32 {
        self.standings
            .iter()
            .find(|s| s.is_player)
            .map_or(1, |s| s.placement)
    }
}

/// Input to the stat-weighted race, which has no real-time phase at all.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRaceEntry {
    pub distance: RaceDistance,
    pub opponents: Vec<OpponentProfile>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionReport {
    Sprint(ZoneMetrics),
    BeatRace(RaceReport),
    StatRace(StatRaceEntry),
}

/// Pluggable calculator; each session kind has a default implementation.
pub trait Scorer {
    fn score(&self, report: &SessionReport, character: &Character) -> ScoreCard;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SprintScorer;

#[derive(Debug, Clone, Copy, Default)]
pub struct BeatRaceScorer;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatRaceScorer;

impl Scorer for SprintScorer {
    fn score(&self, report: &SessionReport, character: &Character) -> ScoreCard {
        match report {
            SessionReport::Sprint(metrics) => score_sprint(metrics, character),
            other => {
                log::warn!("sprint scorer handed a non-sprint report: {other:?}");
                ScoreCard::zero()
            }
        }
    }
}

impl Scorer for BeatRaceScorer {
    fn score(&self, report: &SessionReport, character: &Character) -> ScoreCard {
        match report {
            SessionReport::BeatRace(race) => score_beat_race(race, character),
            other => {
                log::warn!("beat race scorer handed a non-race report: {other:?}");
                ScoreCard::zero()
            }
        }
    }
}

impl Scorer for StatRaceScorer {
    fn score(&self, report: &SessionReport, character: &Character) -> ScoreCard {
        match report {
            SessionReport::StatRace(entry) => stat_race(character, entry),
            other => {
                log::warn!("stat race scorer handed a real-time report: {other:?}");
                ScoreCard::zero()
            }
        }
    }
}

fn round_i32(v: f64) -> i32 {
    v.round() as i32
}

fn round_i64(v: f64) -> i64 {
    v.round() as i64
}

/// Runs every stat's base delta through the character's trait and keeps the
/// non-zero results.
fn stat_changes(character: &Character, ctx: &EffectContext, base: impl Fn(Stat) -> f64) -> StatChanges {
    Stat::ALL
        .iter()
        .filter_map(|&stat| {
            let adjusted = character
                .trait_
                .adjust(EffectPhase::StatGain(stat), ctx, base(stat));
            let delta = round_i32(adjusted);
            (delta != 0).then_some((stat, delta))
        })
        .collect()
}

pub fn score_sprint(metrics: &ZoneMetrics, character: &Character) -> ScoreCard {
    let Some((good, over, under)) = metrics.percentages() else {
        return ScoreCard::zero();
    };
    let ctx = EffectContext {
        good_pct: good,
        over_pct: over,
        under_pct: under,
        total_ms: metrics.total_ms(),
    };

    let raw = good - OVER_PENALTY * over - UNDER_PENALTY * under;
    let score = character.trait_.adjust(EffectPhase::Score, &ctx, raw);

    let changes = stat_changes(character, &ctx, |stat| match stat {
        Stat::Speed => (good / 10.0).floor(),
        Stat::Stamina => {
            let strain = if over > 0.0 { -1.0 } else { 0.0 };
            let endurance = if under > UNDERPACE_STAMINA_PCT { 2.0 } else { 0.0 };
            strain + endurance
        }
        Stat::Power | Stat::Technique => 0.0,
    });

    ScoreCard {
        score: round_i64(score),
        percentages: Percentages {
            good: round_i32(good),
            over: round_i32(over),
            under: round_i32(under),
        },
        stat_changes: changes,
        placement: None,
        standings: Vec::new(),
    }
}

/// Beat race: a flat base, a bonus for time left on the clock, a penalty per
/// place behind first. Percentages report on-beat (good) vs off-beat (under).
pub fn score_beat_race(report: &RaceReport, character: &Character) -> ScoreCard {
    if report.elapsed_ms <= 0.0 {
        return ScoreCard::zero();
    }
    let inputs = report.hits + report.misses;
    let (hit_pct, miss_pct) = if inputs == 0 {
        (0.0, 0.0)
    } else {
        let hit = 100.0 * report.hits as f64 / inputs as f64;
        (hit, 100.0 - hit)
    };
    let ctx = EffectContext {
        good_pct: hit_pct,
        over_pct: 0.0,
        under_pct: miss_pct,
        total_ms: report.elapsed_ms,
    };

    let placement = report.player_placement();
    let time_bonus = ((report.max_time_ms - report.elapsed_ms) / 100.0).max(0.0);
    let raw = RACE_BASE_SCORE + time_bonus - (placement as f64 - 1.0) * RACE_PLACEMENT_PENALTY;
    let score = character.trait_.adjust(EffectPhase::Score, &ctx, raw);

    let changes = stat_changes(character, &ctx, |stat| match stat {
        Stat::Technique => (hit_pct / 10.0).floor(),
        _ => 0.0,
    });

    ScoreCard {
        score: round_i64(score),
        percentages: Percentages {
            good: round_i32(hit_pct),
            over: 0,
            under: round_i32(miss_pct),
        },
        stat_changes: changes,
        placement: Some(placement),
        standings: report.standings.clone(),
    }
}

/// `(speed, stamina, power, technique)` weights by distance.
fn distance_weights(distance: RaceDistance) -> [f64; 4] {
    match distance {
        RaceDistance::Short => [0.4, 0.1, 0.3, 0.2],
        RaceDistance::Mid => [0.3, 0.25, 0.25, 0.2],
        RaceDistance::Long => [0.2, 0.45, 0.15, 0.2],
    }
}

fn style_suits(style: Style, distance: RaceDistance) -> bool {
    matches!(
        (style, distance),
        (Style::Front, RaceDistance::Short) | (Style::Mid, RaceDistance::Mid) | (Style::Back, RaceDistance::Long)
    )
}

/// Unjittered stat-weighted rating of one runner over a distance.
pub fn stat_rating(stats: &StatLine, style: Style, distance: RaceDistance) -> f64 {
    let [speed, stamina, power, technique] = distance_weights(distance);
    let weighted = stats.speed as f64 * speed
        + stats.stamina as f64 * stamina
        + stats.power as f64 * power
        + stats.technique as f64 * technique;
    if style_suits(style, distance) {
        weighted + STYLE_BONUS
    } else {
        weighted
    }
}

/// The no-input race: every runner's rating gets a small seeded jitter and
/// the field is ranked on it.
pub fn stat_race(character: &Character, entry: &StatRaceEntry) -> ScoreCard {
    let mut rng = StdRng::seed_from_u64(entry.seed);
    let mut jitter = || 1.0 + rng.gen_range(-STAT_RACE_JITTER..=STAT_RACE_JITTER);

    let mut field = vec![(
        character.name.clone(),
        true,
        stat_rating(&character.base_stats, character.style, entry.distance) * jitter(),
    )];
    for op in &entry.opponents {
        field.push((
            op.name.clone(),
            false,
            stat_rating(&op.stats, op.style, entry.distance) * jitter(),
        ));
    }

    let standings: Vec<Standing> = rank_descending(field.iter(), |(_, _, rating)| *rating)
        .into_iter()
        .map(|(placement, (name, is_player, rating))| Standing {
            placement,
            name: name.clone(),
            is_player: *is_player,
            position: *rating,
        })
        .collect();
    let player = standings.iter().find(|s| s.is_player);

    ScoreCard {
        score: player.map_or(0, |s| round_i64(s.position * 10.0)),
        percentages: Percentages::default(),
        stat_changes: StatChanges::new(),
        placement: player.map(|s| s.placement),
        standings,
    }
}

/// Stable descending ranking: 1-based placements, equal keys keep input order.
pub fn rank_descending<I, T, F>(items: I, key: F) -> Vec<(u32, T)>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f64,
{
    items
        .into_iter()
        .sorted_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal))
        .enumerate()
        .map(|(i, item)| (i as u32 + 1, item))
        .collect()
}
