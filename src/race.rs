//! Track state for the beat race: who is where, in which lane, how fast.

use crate::character::{Character, StatLine, Style};
use crate::config::RaceConfig;
use crate::scoring::rank_descending;
use rand::Rng;
use serde::{Deserialize, Serialize};

const OPPONENT_JITTER: std::ops::RangeInclusive<f64> = 0.8..=1.2;

/// An AI runner as produced by the advisor (or its fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub name: String,
    pub stats: StatLine,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entrant {
    pub name: String,
    pub character_id: Option<String>,
    pub is_player: bool,
    pub lane: u32,
    pub position: f64,
    /// Track units per second before burst.
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub placement: u32,
    pub name: String,
    pub is_player: bool,
    pub position: f64,
}

pub fn cruising_speed(stats: &StatLine) -> f64 {
    stats.speed as f64 / 10.0 * (1.0 + stats.technique as f64 / 100.0)
}

#[derive(Debug, Clone)]
pub struct RaceField {
    length: f64,
    lanes: u32,
    burst_multiplier: f64,
    /// Player is always entry 0.
    entrants: Vec<Entrant>,
}

impl RaceField {
    pub fn new<R: Rng>(
        cfg: &RaceConfig,
        player: &Character,
        opponents: &[OpponentProfile],
        rng: &mut R,
    ) -> Self {
        let lanes = cfg.lanes.max(1);
        let mut entrants = Vec::with_capacity(opponents.len() + 1);
        entrants.push(Entrant {
            name: player.name.clone(),
            character_id: Some(player.id.clone()),
            is_player: true,
            lane: lanes / 2,
            position: 0.0,
            speed: cruising_speed(&player.base_stats),
        });
        for (i, op) in opponents.iter().enumerate() {
            entrants.push(Entrant {
                name: op.name.clone(),
                character_id: None,
                is_player: false,
                lane: (i as u32 + 1) % lanes,
                position: 0.0,
                speed: cruising_speed(&op.stats) * rng.gen_range(OPPONENT_JITTER),
            });
        }
        Self {
            length: cfg.length,
            lanes,
            burst_multiplier: cfg.burst_multiplier,
            entrants,
        }
    }

    pub fn entrants(&self) -> &[Entrant] {
        &self.entrants
    }

    pub fn player(&self) -> &Entrant {
        &self.entrants[0]
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Moves everyone forward by `delta_ms`; positions stop at the finish.
    pub fn advance(&mut self, delta_ms: f64, player_bursting: bool) {
        let dt = delta_ms.max(0.0) / 1000.0;
        for e in &mut self.entrants {
            let boost = if e.is_player && player_bursting {
                self.burst_multiplier
            } else {
                1.0
            };
            e.position = (e.position + e.speed * boost * dt).min(self.length);
        }
    }

    /// Lane change after a mistimed input; wraps around the outside lanes.
    pub fn deflect(&mut self, direction: i32) -> u32 {
        let lanes = self.lanes as i64;
        let player = &mut self.entrants[0];
        let lane = (player.lane as i64 + direction as i64).rem_euclid(lanes);
        player.lane = lane as u32;
        player.lane
    }

    pub fn player_finished(&self) -> bool {
        self.player().position >= self.length
    }

    /// Ordered by distance covered; ties go to the earlier entrant.
    pub fn standings(&self) -> Vec<Standing> {
        rank_descending(self.entrants.iter(), |e| e.position)
            .into_iter()
            .map(|(placement, e)| Standing {
                placement,
                name: e.name.clone(),
                is_player: e.is_player,
                position: e.position,
            })
            .collect()
    }

    pub fn player_placement(&self) -> u32 {
        self.standings()
            .iter()
            .find(|s| s.is_player)
            .map_or(1, |s| s.placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::presets;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn opponent(name: &str, speed: i32) -> OpponentProfile {
        OpponentProfile {
            name: name.to_string(),
            stats: StatLine::new(speed, 70, 70, 50),
            style: Style::Mid,
        }
    }

    fn field(opponents: &[OpponentProfile]) -> RaceField {
        let player = presets().into_iter().find(|c| c.id == "haru-urara").unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        RaceField::new(&RaceConfig::default(), &player, opponents, &mut rng)
    }

    #[test]
    fn player_starts_in_middle_lane() {
        let f = field(&[opponent("A", 70)]);
        assert_eq!(f.player().lane, 1);
        assert_eq!(f.entrants()[1].lane, 1);
        assert!(f.player().is_player);
    }

    #[test]
    fn cruising_speed_uses_speed_and_technique() {
        // Haru Urara: 60 speed, 60 technique
        assert!((cruising_speed(&StatLine::new(60, 60, 60, 60)) - 9.6).abs() < 1e-9);
    }

    #[test]
    fn opponent_speed_is_jittered_within_bounds() {
        let op = opponent("A", 80);
        let base = cruising_speed(&op.stats);
        let f = field(&[op]);
        let s = f.entrants()[1].speed;
        assert!(s >= base * 0.8 && s <= base * 1.2);
    }

    #[test]
    fn burst_doubles_player_progress() {
        let mut calm = field(&[]);
        let mut burst = field(&[]);
        calm.advance(1000.0, false);
        burst.advance(1000.0, true);
        assert!((burst.player().position - 2.0 * calm.player().position).abs() < 1e-9);
    }

    #[test]
    fn positions_cap_at_finish() {
        let mut f = field(&[]);
        for _ in 0..200 {
            f.advance(1000.0, true);
        }
        assert_eq!(f.player().position, f.length());
        assert!(f.player_finished());
    }

    #[test]
    fn deflect_wraps_lanes() {
        let mut f = field(&[]);
        assert_eq!(f.deflect(1), 2);
        assert_eq!(f.deflect(1), 0);
        assert_eq!(f.deflect(-1), 2);
    }

    #[test]
    fn ties_go_to_the_player() {
        let f = field(&[opponent("A", 70), opponent("B", 70)]);
        let standings = f.standings();
        assert_eq!(standings[0].placement, 1);
        assert!(standings[0].is_player);
        assert_eq!(standings[1].name, "A");
        assert_eq!(f.player_placement(), 1);
    }

    #[test]
    fn faster_opponent_overtakes() {
        let mut f = field(&[opponent("Rocket", 200)]);
        f.advance(5_000.0, false);
        assert_eq!(f.player_placement(), 2);
        assert_eq!(f.standings()[0].name, "Rocket");
    }
}
