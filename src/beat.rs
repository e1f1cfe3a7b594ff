//! Repeating beat bar for the race variant.
//!
//! A cycle sweeps from 0 to 1 over `period_ms`; somewhere on it sits an
//! on-beat window. Inputs inside the window are hits and charge the burst
//! meter; inputs outside it are misses and deflect the runner sideways.

use crate::config::BeatConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MIN_PERIOD_MS: f64 = 1.0;
/// Cycles walked one by one before the scheduler jumps ahead.
const MAX_CATCH_UP_CYCLES: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Judgement {
    Hit,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatEvent {
    Hit { charge: u32 },
    /// Miss side effect; `direction` is -1 or +1 lanes.
    Deflect { direction: i32 },
    BurstStarted { until_ms: f64 },
    BurstEnded,
}

/// Half-open on-beat window `[start, end)` on the cycle's 0..1 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatWindow {
    pub start: f64,
    pub end: f64,
}

impl BeatWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, progress: f64) -> bool {
        progress >= self.start && progress < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeatOutcome {
    pub judgement: Judgement,
    pub progress: f64,
    pub events: Vec<BeatEvent>,
}

#[derive(Debug)]
pub struct BeatScheduler {
    cfg: BeatConfig,
    widening: f64,
    rng: StdRng,
    cycle_start: f64,
    period: f64,
    window: BeatWindow,
    charge: u32,
    burst_until: Option<f64>,
    hits: u32,
    misses: u32,
}

impl BeatScheduler {
    pub fn new(cfg: &BeatConfig, technique: i32, seed: u64, now_ms: f64) -> Self {
        let base = cfg.window.clamp(0.0, 1.0);
        let divisor = if cfg.technique_divisor > 0.0 {
            cfg.technique_divisor
        } else {
            f64::INFINITY
        };
        let widening = (technique.max(0) as f64 / divisor).min((cfg.max_window - base).max(0.0));

        let mut scheduler = Self {
            cfg: cfg.clone(),
            widening,
            rng: StdRng::seed_from_u64(seed),
            cycle_start: now_ms,
            period: cfg.period_ms.max(MIN_PERIOD_MS),
            window: BeatWindow::new(0.0, base),
            charge: 0,
            burst_until: None,
            hits: 0,
            misses: 0,
        };
        scheduler.period = scheduler.next_period();
        scheduler.randomize_window();
        scheduler
    }

    fn next_period(&mut self) -> f64 {
        let jitter = self.cfg.jitter_ms.abs();
        let base = self.cfg.period_ms;
        let period = if jitter > 0.0 {
            base + self.rng.gen_range(-jitter..=jitter)
        } else {
            base
        };
        period.max(MIN_PERIOD_MS)
    }

    fn randomize_window(&mut self) {
        let width = self.cfg.window.clamp(0.0, 1.0);
        let start = if width < 1.0 {
            self.rng.gen_range(0.0..=(1.0 - width))
        } else {
            0.0
        };
        self.window = BeatWindow::new(start, start + width);
    }

    /// Pins the current cycle's window, e.g. for a tutorial bar.
    pub fn set_window(&mut self, window: BeatWindow) {
        self.window = window;
    }

    /// The base window of the current cycle, before technique widening.
    pub fn window(&self) -> BeatWindow {
        self.window
    }

    pub fn effective_window(&self) -> BeatWindow {
        BeatWindow::new(self.window.start, (self.window.end + self.widening).min(1.0))
    }

    pub fn period_ms(&self) -> f64 {
        self.period
    }

    pub fn charge(&self) -> u32 {
        self.charge
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn cycle_start(&self) -> f64 {
        self.cycle_start
    }

    /// Progress within the current cycle without advancing it; `None` once
    /// `now_ms` falls outside the cycle.
    pub fn peek_progress(&self, now_ms: f64) -> Option<f64> {
        let p = (now_ms - self.cycle_start) / self.period;
        (p.is_finite() && (0.0..1.0).contains(&p)).then_some(p)
    }

    pub fn is_bursting(&self, now_ms: f64) -> bool {
        self.burst_until.is_some_and(|until| now_ms < until)
    }

    /// Fraction of the current cycle elapsed, in `[0, 1)`. Crossing a cycle
    /// boundary re-rolls the period and the window.
    pub fn progress(&mut self, now_ms: f64) -> f64 {
        if !now_ms.is_finite() {
            log::warn!("invalid beat timestamp {now_ms}, holding the current cycle");
            return 0.0;
        }
        let behind = ((now_ms - self.cycle_start) / self.period).floor();
        if behind > MAX_CATCH_UP_CYCLES {
            // skip the stale cycles in one go, keeping the current period
            self.cycle_start += (behind - 1.0) * self.period;
            log::debug!("skipped {} beat cycles", behind - 1.0);
        }
        while now_ms - self.cycle_start >= self.period {
            self.cycle_start += self.period;
            self.period = self.next_period();
            self.randomize_window();
        }
        let p = (now_ms - self.cycle_start) / self.period;
        if p.is_finite() {
            p.clamp(0.0, 1.0 - f64::EPSILON)
        } else {
            0.0
        }
    }

    pub fn classify_input(&mut self, now_ms: f64) -> Judgement {
        let progress = self.progress(now_ms);
        if self.effective_window().contains(progress) {
            Judgement::Hit
        } else {
            Judgement::Miss
        }
    }

    /// Per-frame housekeeping: advance the cycle and expire a finished burst.
    pub fn update(&mut self, now_ms: f64) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        self.progress(now_ms);
        self.expire_burst(now_ms, &mut events);
        events
    }

    fn expire_burst(&mut self, now_ms: f64, events: &mut Vec<BeatEvent>) {
        if let Some(until) = self.burst_until {
            if now_ms >= until {
                self.burst_until = None;
                // the window moves once the burst is spent
                self.randomize_window();
                log::debug!("burst ended at {now_ms:.1}ms");
                events.push(BeatEvent::BurstEnded);
            }
        }
    }

    /// Judges one player input and applies its charge / burst / deflect
    /// consequences. Hits landed while a burst is running do not charge.
    pub fn register_input(&mut self, now_ms: f64) -> BeatOutcome {
        let mut events = Vec::new();
        self.expire_burst(now_ms, &mut events);

        let progress = self.progress(now_ms);
        let judgement = if self.effective_window().contains(progress) {
            Judgement::Hit
        } else {
            Judgement::Miss
        };

        match judgement {
            Judgement::Hit => {
                self.hits += 1;
                if !self.is_bursting(now_ms) {
                    self.charge = (self.charge + 1).min(self.cfg.max_charge);
                    events.push(BeatEvent::Hit {
                        charge: self.charge,
                    });
                    if self.charge >= self.cfg.max_charge {
                        let until_ms = now_ms + self.cfg.burst_ms;
                        self.charge = 0;
                        self.burst_until = Some(until_ms);
                        log::debug!("burst started at {now_ms:.1}ms until {until_ms:.1}ms");
                        events.push(BeatEvent::BurstStarted { until_ms });
                    }
                } else {
                    events.push(BeatEvent::Hit {
                        charge: self.charge,
                    });
                }
            }
            Judgement::Miss => {
                self.misses += 1;
                let direction = if self.rng.gen_bool(0.5) { 1 } else { -1 };
                events.push(BeatEvent::Deflect { direction });
            }
        }

        BeatOutcome {
            judgement,
            progress,
            events,
        }
    }

    /// Share of inputs that landed on the beat, 0 when there were none.
    pub fn hit_pct(&self) -> f64 {
        let inputs = self.hits + self.misses;
        if inputs == 0 {
            0.0
        } else {
            100.0 * self.hits as f64 / inputs as f64
        }
    }
}
