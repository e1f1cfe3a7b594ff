use serde::{Deserialize, Serialize};

pub const BASE_XP_THRESHOLD: u32 = 100;
pub const MIN_XP_GAIN: u32 = 10;
const THRESHOLD_GROWTH: f64 = 1.5;

/// XP for a finished session: a fifth of the score, never less than the floor.
pub fn xp_for_score(score: i64) -> u32 {
    let share = (score as f64 / 5.0).round();
    if share <= MIN_XP_GAIN as f64 {
        MIN_XP_GAIN
    } else {
        share.min(u32::MAX as f64) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
}

impl Progress {
    /// Adds XP and returns how many levels were gained. Leftover XP carries
    /// over and each level raises the threshold by half.
    pub fn gain(&mut self, xp: u32) -> u32 {
        self.xp = self.xp.saturating_add(xp);
        let mut levels = 0;
        while self.xp_to_next_level > 0 && self.xp >= self.xp_to_next_level {
            self.xp -= self.xp_to_next_level;
            self.level += 1;
            self.xp_to_next_level = (self.xp_to_next_level as f64 * THRESHOLD_GROWTH).floor() as u32;
            levels += 1;
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Progress {
        Progress {
            level: 1,
            xp: 0,
            xp_to_next_level: BASE_XP_THRESHOLD,
        }
    }

    #[test]
    fn xp_floor_applies_to_low_and_negative_scores() {
        assert_eq!(xp_for_score(-50), 10);
        assert_eq!(xp_for_score(0), 10);
        assert_eq!(xp_for_score(31), 10);
        assert_eq!(xp_for_score(80), 16);
        assert_eq!(xp_for_score(5000), 1000);
    }

    #[test]
    fn level_up_carries_remainder() {
        let mut p = fresh();
        assert_eq!(p.gain(90), 0);
        assert_eq!(p.gain(20), 1);
        assert_eq!(p, Progress { level: 2, xp: 10, xp_to_next_level: 150 });
    }

    #[test]
    fn big_gain_levels_several_times() {
        let mut p = fresh();
        // 100 + 150 + 225 = 475
        assert_eq!(p.gain(500), 3);
        assert_eq!(p.level, 4);
        assert_eq!(p.xp, 25);
        assert_eq!(p.xp_to_next_level, 337);
    }
}
