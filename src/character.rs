use crate::effects::{Temperament, Trait};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_STAT: i32 = 0;
/// Ceiling for generated rivals; trained runners may go past it.
pub const MAX_STAT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stat {
    Speed,
    Stamina,
    Power,
    Technique,
}

impl Stat {
    pub const ALL: [Stat; 4] = [Stat::Speed, Stat::Stamina, Stat::Power, Stat::Technique];
}

/// Per-stat deltas produced at session end. Ordered so results serialize stably.
pub type StatChanges = BTreeMap<Stat, i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLine {
    pub speed: i32,
    pub stamina: i32,
    pub power: i32,
    pub technique: i32,
}

impl StatLine {
    pub const fn new(speed: i32, stamina: i32, power: i32, technique: i32) -> Self {
        Self {
            speed,
            stamina,
            power,
            technique,
        }
    }

    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Speed => self.speed,
            Stat::Stamina => self.stamina,
            Stat::Power => self.power,
            Stat::Technique => self.technique,
        }
    }

    fn get_mut(&mut self, stat: Stat) -> &mut i32 {
        match stat {
            Stat::Speed => &mut self.speed,
            Stat::Stamina => &mut self.stamina,
            Stat::Power => &mut self.power,
            Stat::Technique => &mut self.technique,
        }
    }

    /// Applies deltas, flooring every stat at [`MIN_STAT`].
    pub fn apply(&mut self, changes: &StatChanges) {
        for (&stat, &delta) in changes {
            let value = self.get_mut(stat);
            *value = (*value + delta).max(MIN_STAT);
        }
    }

    /// Highest stat; ties go to the one listed first in [`Stat::ALL`].
    pub fn strongest(&self) -> Stat {
        Stat::ALL
            .into_iter()
            .rev()
            .max_by_key(|s| self.get(*s))
            .unwrap_or(Stat::Speed)
    }

    /// Every stat pulled into `MIN_STAT..=MAX_STAT`.
    pub fn clamped(mut self) -> Self {
        for stat in Stat::ALL {
            let value = self.get_mut(stat);
            *value = (*value).clamp(MIN_STAT, MAX_STAT);
        }
        self
    }

    pub fn total(&self) -> i32 {
        Stat::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Style {
    Front,
    Mid,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display, clap::ValueEnum)]
pub enum RaceDistance {
    Short,
    Mid,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_stats: StatLine,
    pub comfort_min: f64,
    pub comfort_max: f64,
    pub temperament: Temperament,
    #[serde(rename = "trait")]
    pub trait_: Trait,
    pub style: Style,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default = "default_xp_threshold")]
    pub xp_to_next_level: u32,
}

fn default_level() -> u32 {
    1
}

fn default_xp_threshold() -> u32 {
    crate::progress::BASE_XP_THRESHOLD
}

impl Character {
    /// Rejects characters whose comfort band cannot classify tension sensibly.
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.comfort_min)
            || !in_range(self.comfort_max)
            || self.comfort_min > self.comfort_max
        {
            return Err(Error::InvalidComfortBand {
                min: self.comfort_min,
                max: self.comfort_max,
            });
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn preset(
    id: &str,
    name: &str,
    description: &str,
    stats: StatLine,
    comfort: (f64, f64),
    temperament: Temperament,
    trait_: Trait,
    style: Style,
) -> Character {
    Character {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        base_stats: stats,
        comfort_min: comfort.0,
        comfort_max: comfort.1,
        temperament,
        trait_,
        style,
        level: 1,
        xp: 0,
        xp_to_next_level: crate::progress::BASE_XP_THRESHOLD,
    }
}

/// The stable's starting roster.
pub fn presets() -> Vec<Character> {
    vec![
        preset(
            "special-week",
            "Special Week",
            "A hard-working all-rounder from the countryside.",
            StatLine::new(80, 75, 70, 65),
            (40.0, 65.0),
            Temperament::Normal,
            Trait::HeartOfGold,
            Style::Mid,
        ),
        preset(
            "silence-suzuka",
            "Silence Suzuka",
            "Leads from the gate and never looks back.",
            StatLine::new(100, 60, 60, 70),
            (55.0, 75.0),
            Temperament::Calm,
            Trait::LateBurst,
            Style::Front,
        ),
        preset(
            "tokai-teio",
            "Tokai Teio",
            "Light on her feet with a famous step.",
            StatLine::new(85, 70, 65, 80),
            (45.0, 65.0),
            Temperament::Fiery,
            Trait::Prodigy,
            Style::Mid,
        ),
        preset(
            "vodka",
            "Vodka",
            "All power, all the time.",
            StatLine::new(75, 70, 85, 60),
            (50.0, 70.0),
            Temperament::Fiery,
            Trait::Powerhouse,
            Style::Back,
        ),
        preset(
            "gold-ship",
            "Gold Ship",
            "Unpredictable, with stamina to spare.",
            StatLine::new(65, 85, 80, 60),
            (30.0, 60.0),
            Temperament::Fiery,
            Trait::Steady,
            Style::Back,
        ),
        preset(
            "daiwa-scarlet",
            "Daiwa Scarlet",
            "Insists on being first at everything.",
            StatLine::new(80, 70, 75, 75),
            (50.0, 70.0),
            Temperament::Normal,
            Trait::Powerhouse,
            Style::Front,
        ),
        preset(
            "rice-shower",
            "Rice Shower",
            "A quiet stayer who thrives over distance.",
            StatLine::new(70, 90, 65, 75),
            (35.0, 55.0),
            Temperament::Calm,
            Trait::Steady,
            Style::Back,
        ),
        preset(
            "haru-urara",
            "Haru Urara",
            "Never wins, never stops smiling.",
            StatLine::new(60, 60, 60, 60),
            (40.0, 60.0),
            Temperament::Normal,
            Trait::None,
            Style::Front,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urara() -> Character {
        presets().into_iter().find(|c| c.id == "haru-urara").unwrap()
    }

    #[test]
    fn presets_are_valid() {
        let roster = presets();
        assert_eq!(roster.len(), 8);
        for c in &roster {
            assert!(c.validate().is_ok(), "{} has a bad comfort band", c.id);
        }
    }

    #[test]
    fn inverted_comfort_band_is_rejected() {
        let mut c = urara();
        c.comfort_min = 70.0;
        c.comfort_max = 30.0;
        assert!(matches!(
            c.validate(),
            Err(Error::InvalidComfortBand { .. })
        ));
    }

    #[test]
    fn band_outside_scale_is_rejected() {
        let mut c = urara();
        c.comfort_max = 120.0;
        assert!(c.validate().is_err());
        c.comfort_max = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn apply_floors_stats_at_zero() {
        let mut stats = StatLine::new(5, 1, 10, 10);
        let mut changes = StatChanges::new();
        changes.insert(Stat::Stamina, -3);
        changes.insert(Stat::Speed, 2);
        stats.apply(&changes);
        assert_eq!(stats.stamina, 0);
        assert_eq!(stats.speed, 7);
        assert_eq!(stats.power, 10);
    }

    #[test]
    fn stat_names_are_lowercase() {
        assert_eq!(Stat::Technique.to_string(), "technique");
        assert_eq!(serde_json::to_string(&Stat::Speed).unwrap(), "\"speed\"");
    }

    #[test]
    fn character_json_uses_trait_key() {
        let json = serde_json::to_value(urara()).unwrap();
        assert_eq!(json["trait"], "None");
        let back: Character = serde_json::from_value(json).unwrap();
        assert_eq!(back, urara());
    }

    #[test]
    fn clamped_pulls_stats_into_range() {
        let s = StatLine::new(-3, 110, 100, 0).clamped();
        assert_eq!(s, StatLine::new(0, 100, 100, 0));
    }
}
