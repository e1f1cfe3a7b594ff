//! Scripted player for headless runs and demos.

use crate::runtime::FrameHost;
use crate::session::{Phase, SessionController};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MIN_TAP_GAP_MS: f64 = 100.0;

#[derive(Debug)]
pub struct Autopilot {
    rng: StdRng,
    accuracy: f64,
    last_tap: Option<f64>,
    /// Cycle already handled, and whether we aim to hit it.
    cycle: Option<(f64, bool)>,
}

impl Autopilot {
    /// `accuracy` is the chance of aiming a beat-race tap inside the window.
    pub fn new(seed: u64, accuracy: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            accuracy: accuracy.clamp(0.0, 1.0),
            last_tap: None,
            cycle: None,
        }
    }

    /// Whether to send a player action at `now_ms`.
    pub fn decide<H: FrameHost>(&mut self, session: &SessionController<H>, now_ms: f64) -> bool {
        if session.phase() != Phase::Active {
            return false;
        }
        let tap = if let Some(tension) = session.tension() {
            self.sprint(session, tension, now_ms)
        } else {
            self.race(session, now_ms)
        };
        if tap {
            self.last_tap = Some(now_ms);
        }
        tap
    }

    /// Keep tension just above the middle of the comfort band.
    fn sprint<H: FrameHost>(&mut self, session: &SessionController<H>, tension: f64, now_ms: f64) -> bool {
        let Some(character) = session.character() else {
            return false;
        };
        let target = (character.comfort_min + character.comfort_max) / 2.0;
        let rested = self
            .last_tap
            .map_or(true, |last| now_ms - last >= MIN_TAP_GAP_MS);
        tension < target && rested
    }

    /// One tap per beat cycle, inside or outside the window.
    fn race<H: FrameHost>(&mut self, session: &SessionController<H>, now_ms: f64) -> bool {
        let Some(beat) = session.beat() else {
            return false;
        };
        let Some(progress) = beat.peek_progress(now_ms) else {
            return false;
        };
        let cycle = beat.cycle_start();
        let current = self.cycle;
        let aim_hit = match current {
            Some((start, _)) if start == cycle && self.tapped_since(cycle) => return false,
            Some((start, aim)) if start == cycle => aim,
            _ => {
                let aim = self.rng.gen_bool(self.accuracy);
                self.cycle = Some((cycle, aim));
                aim
            }
        };
        beat.effective_window().contains(progress) == aim_hit
    }

    fn tapped_since(&self, t: f64) -> bool {
        self.last_tap.is_some_and(|last| last >= t)
    }
}
