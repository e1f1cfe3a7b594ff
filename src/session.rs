//! Session controller: `Idle -> Countdown -> Active -> Finished -> Idle`.
//!
//! The host drives it with frame timestamps ([`SessionController::on_tick`])
//! and player actions ([`SessionController::on_player_action`]). The session
//! ends on a tick, never on an action, and produces exactly one
//! [`SessionResult`].

use crate::beat::{BeatEvent, BeatOutcome, BeatScheduler};
use crate::character::{Character, RaceDistance, StatChanges};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::xp_for_score;
use crate::race::{OpponentProfile, RaceField, Standing};
use crate::runtime::{FrameClock, FrameHost, TickGate};
use crate::scoring::{
    BeatRaceScorer, Percentages, RaceReport, ScoreCard, Scorer, SessionReport, SprintScorer,
    StatRaceScorer,
};
use crate::tension::{delta_to_micros, TensionSimulator, Zone};
use crate::trace::{TensionSample, TensionTrace};
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const TRACE_RESOLUTION_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Phase {
    Idle,
    Countdown,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum SessionKind {
    Sprint,
    BeatRace,
    StatRace,
}

impl SessionKind {
    pub fn default_scorer(self) -> Box<dyn Scorer> {
        match self {
            SessionKind::Sprint => Box::new(SprintScorer),
            SessionKind::BeatRace => Box::new(BeatRaceScorer),
            SessionKind::StatRace => Box::new(StatRaceScorer),
        }
    }
}

/// What to run when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPlan {
    Sprint,
    BeatRace {
        distance: RaceDistance,
        opponents: Vec<OpponentProfile>,
    },
}

impl SessionPlan {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionPlan::Sprint => SessionKind::Sprint,
            SessionPlan::BeatRace { .. } => SessionKind::BeatRace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: String,
    pub character_id: String,
    pub character_name: String,
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<RaceDistance>,
    pub score: i64,
    pub percentages: Percentages,
    pub stat_changes: StatChanges,
    pub xp_gained: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub standings: Vec<Standing>,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TensionSample>,
    pub date: DateTime<Local>,
}

impl SessionResult {
    pub fn from_card(
        card: ScoreCard,
        kind: SessionKind,
        character: &Character,
        distance: Option<RaceDistance>,
        duration_ms: f64,
    ) -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            character_id: character.id.clone(),
            character_name: character.name.clone(),
            kind,
            distance,
            xp_gained: xp_for_score(card.score),
            score: card.score,
            percentages: card.percentages,
            stat_changes: card.stat_changes,
            placement: card.placement,
            standings: card.standings,
            duration_ms,
            trace: Vec::new(),
            date: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Countdown(u32),
    Started,
    ZoneChanged(Zone),
    Beat(BeatEvent),
    Finished(Box<SessionResult>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// New tension after the impulse.
    Tension(f64),
    Beat {
        outcome: BeatOutcome,
        lane: Option<u32>,
    },
}

#[derive(Debug)]
enum Engine {
    Sprint {
        sim: TensionSimulator,
        trace: TensionTrace,
        last_zone: Zone,
    },
    Race {
        beat: BeatScheduler,
        field: RaceField,
        distance: RaceDistance,
    },
}

/// State owned for the lifetime of one countdown + active run.
#[derive(Debug)]
struct Running {
    plan: SessionPlan,
    character: Character,
    clock: FrameClock,
    started_at: f64,
    active_from: f64,
    duration_us: u64,
    elapsed_us: u64,
    countdown_shown: u32,
    seed: u64,
    engine: Option<Engine>,
}

impl Running {
    fn active_now(&self) -> f64 {
        self.active_from + self.elapsed_us as f64 / 1000.0
    }
}

pub struct SessionController<H: FrameHost = TickGate> {
    config: Config,
    host: H,
    subscribed: bool,
    phase: Phase,
    running: Option<Running>,
    result: Option<SessionResult>,
    scorer: Option<Box<dyn Scorer>>,
    seed: u64,
}

impl SessionController<TickGate> {
    pub fn new(config: Config) -> Self {
        Self::with_host(config, TickGate::default())
    }
}

impl<H: FrameHost> SessionController<H> {
    pub fn with_host(config: Config, host: H) -> Self {
        Self {
            config,
            host,
            subscribed: false,
            phase: Phase::Idle,
            running: None,
            result: None,
            scorer: None,
            seed: rand::random(),
        }
    }

    /// Fixes the RNG seed used for beat windows and opponent jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the per-kind default scorer for every session.
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// The character the running session was started with.
    pub fn character(&self) -> Option<&Character> {
        self.running.as_ref().map(|r| &r.character)
    }

    pub fn countdown(&self) -> Option<u32> {
        match (&self.running, self.phase) {
            (Some(r), Phase::Countdown) => Some(r.countdown_shown),
            _ => None,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.running
            .as_ref()
            .map_or(0.0, |r| r.elapsed_us as f64 / 1000.0)
    }

    pub fn tension(&self) -> Option<f64> {
        match self.running.as_ref()?.engine.as_ref()? {
            Engine::Sprint { sim, .. } => Some(sim.tension()),
            Engine::Race { .. } => None,
        }
    }

    pub fn metrics(&self) -> Option<&crate::tension::ZoneMetrics> {
        match self.running.as_ref()?.engine.as_ref()? {
            Engine::Sprint { sim, .. } => Some(sim.metrics()),
            Engine::Race { .. } => None,
        }
    }

    pub fn race_field(&self) -> Option<&RaceField> {
        match self.running.as_ref()?.engine.as_ref()? {
            Engine::Race { field, .. } => Some(field),
            Engine::Sprint { .. } => None,
        }
    }

    pub fn beat(&self) -> Option<&BeatScheduler> {
        match self.running.as_ref()?.engine.as_ref()? {
            Engine::Race { beat, .. } => Some(beat),
            Engine::Sprint { .. } => None,
        }
    }

    fn subscribe(&mut self) {
        if !self.subscribed {
            self.host.subscribe();
            self.subscribed = true;
        }
    }

    fn unsubscribe(&mut self) {
        if self.subscribed {
            self.host.unsubscribe();
            self.subscribed = false;
        }
    }

    fn transition(&mut self, to: Phase) {
        log::info!("session {} -> {}", self.phase, to);
        self.phase = to;
    }

    /// Begins a session at `now_ms`. Only valid from `Idle`; the character is
    /// read once here and never again.
    pub fn start(&mut self, plan: SessionPlan, character: Character, now_ms: f64) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(Error::InvalidPhase {
                expected: Phase::Idle,
                actual: self.phase,
            });
        }
        character.validate()?;

        let duration_ms = match plan.kind() {
            SessionKind::Sprint => self.config.sprint.duration_ms,
            _ => self.config.race.duration_ms,
        };
        let countdown_ms = self.config.countdown_secs as f64 * 1000.0;
        let mut clock = FrameClock::new();
        clock.rebase(now_ms);

        let seed = self.seed;
        self.seed = self.seed.wrapping_add(1);

        self.result = None;
        self.running = Some(Running {
            plan,
            character,
            clock,
            started_at: now_ms,
            active_from: now_ms + countdown_ms,
            duration_us: duration_ms.saturating_mul(1000),
            elapsed_us: 0,
            countdown_shown: self.config.countdown_secs,
            seed,
            engine: None,
        });
        self.subscribe();

        if self.config.countdown_secs == 0 {
            self.activate();
        } else {
            self.transition(Phase::Countdown);
        }
        Ok(())
    }

    fn activate(&mut self) {
        let config = &self.config;
        let Some(run) = self.running.as_mut() else {
            debug_assert!(false, "activate without a running session");
            return;
        };
        let engine = match &run.plan {
            SessionPlan::Sprint => {
                let sim = TensionSimulator::new(
                    config.sprint.starting_tension,
                    config.sprint.decay_per_sec,
                    &run.character,
                );
                let last_zone = sim.zone();
                Engine::Sprint {
                    sim,
                    trace: TensionTrace::new(TRACE_RESOLUTION_MS),
                    last_zone,
                }
            }
            SessionPlan::BeatRace {
                distance,
                opponents,
            } => {
                let mut rng = StdRng::seed_from_u64(run.seed);
                let field = RaceField::new(&config.race, &run.character, opponents, &mut rng);
                let beat = BeatScheduler::new(
                    &config.beat,
                    run.character.base_stats.technique,
                    run.seed ^ 0x9e37_79b9_7f4a_7c15,
                    run.active_from,
                );
                Engine::Race {
                    beat,
                    field,
                    distance: *distance,
                }
            }
        };
        run.engine = Some(engine);
        self.transition(Phase::Active);
    }

    /// Advances the session to `timestamp_ms`.
    pub fn on_tick(&mut self, timestamp_ms: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.phase {
            Phase::Idle | Phase::Finished => {
                log::trace!("tick while {}", self.phase);
                return events;
            }
            Phase::Countdown | Phase::Active => {}
        }
        let Some(run) = self.running.as_mut() else {
            debug_assert!(false, "{} without a running session", self.phase);
            return events;
        };
        let delta_ms = run.clock.advance(timestamp_ms);
        let now = run.clock.last().unwrap_or(timestamp_ms);
        let mut active_ms = delta_ms;

        if self.phase == Phase::Countdown {
            let countdown_secs = self.config.countdown_secs;
            let since_start = (now - run.started_at).max(0.0);
            let shown = countdown_secs.saturating_sub((since_start / 1000.0).floor() as u32);
            if shown == 0 {
                active_ms = (now - run.active_from).max(0.0);
                self.activate();
                events.push(SessionEvent::Started);
            } else {
                if shown != run.countdown_shown {
                    run.countdown_shown = shown;
                    events.push(SessionEvent::Countdown(shown));
                }
                return events;
            }
        }

        self.simulate(active_ms, &mut events);
        events
    }

    fn simulate(&mut self, delta_ms: f64, events: &mut Vec<SessionEvent>) {
        let max_step_us = delta_to_micros(self.config.max_step_ms).max(1);
        let Some(run) = self.running.as_mut() else {
            return;
        };
        let mut remaining_us = delta_to_micros(delta_ms);
        let mut done = run.elapsed_us >= run.duration_us;

        while remaining_us > 0 && !done {
            let step_us = remaining_us
                .min(max_step_us)
                .min(run.duration_us - run.elapsed_us);
            remaining_us -= step_us;
            run.elapsed_us += step_us;
            let now = run.active_now();

            match run.engine.as_mut() {
                Some(Engine::Sprint {
                    sim,
                    trace,
                    last_zone,
                }) => {
                    sim.tick_micros(step_us);
                    let zone = sim.zone();
                    if zone != *last_zone {
                        *last_zone = zone;
                        events.push(SessionEvent::ZoneChanged(zone));
                    }
                    let sample = TensionSample::new(now - run.active_from, sim.tension(), zone);
                    if run.elapsed_us >= run.duration_us {
                        trace.close(sample);
                    } else {
                        trace.record(sample);
                    }
                }
                Some(Engine::Race { beat, field, .. }) => {
                    let bursting = beat.is_bursting(now - step_us as f64 / 1000.0);
                    field.advance(step_us as f64 / 1000.0, bursting);
                    events.extend(beat.update(now).into_iter().map(SessionEvent::Beat));
                    if field.player_finished() {
                        done = true;
                    }
                }
                None => debug_assert!(false, "active session without an engine"),
            }
            if run.elapsed_us >= run.duration_us {
                done = true;
            }
        }

        if done {
            if let Some(run) = self.running.take() {
                let result = self.finish(run);
                events.push(SessionEvent::Finished(Box::new(result)));
            }
        }
    }

    fn finish(&mut self, run: Running) -> SessionResult {
        debug_assert!(self.result.is_none(), "session finished twice");
        debug_assert_eq!(self.phase, Phase::Active);
        self.unsubscribe();

        let result = self.score(run);
        log::info!(
            "{} finished for {}: score {}",
            result.kind,
            result.character_id,
            result.score
        );
        self.result = Some(result.clone());
        self.transition(Phase::Finished);
        result
    }

    fn score(&self, run: Running) -> SessionResult {
        let kind = run.plan.kind();
        let elapsed_ms = run.elapsed_us as f64 / 1000.0;
        let (report, distance, trace) = match run.engine {
            Some(Engine::Sprint { sim, trace, .. }) => (
                SessionReport::Sprint(*sim.metrics()),
                None,
                trace.samples().to_vec(),
            ),
            Some(Engine::Race {
                beat,
                field,
                distance,
            }) => (
                SessionReport::BeatRace(RaceReport {
                    elapsed_ms,
                    max_time_ms: self.config.race.duration_ms as f64,
                    standings: field.standings(),
                    hits: beat.hits(),
                    misses: beat.misses(),
                }),
                Some(distance),
                Vec::new(),
            ),
            None => (
                SessionReport::Sprint(Default::default()),
                None,
                Vec::new(),
            ),
        };
        let card = match &self.scorer {
            Some(scorer) => scorer.score(&report, &run.character),
            None => kind.default_scorer().score(&report, &run.character),
        };
        let mut result = SessionResult::from_card(card, kind, &run.character, distance, elapsed_ms);
        result.trace = trace;
        result
    }

    /// Applies one player action. Ignored outside `Active`.
    pub fn on_player_action(&mut self, timestamp_ms: f64) -> Option<ActionOutcome> {
        if self.phase != Phase::Active {
            log::debug!("ignoring player action while {}", self.phase);
            return None;
        }
        let tension_per_tap = self.config.sprint.tension_per_tap;
        let run = self.running.as_mut()?;
        let temperament = run.character.temperament;
        let tick_now = run.active_now();
        match run.engine.as_mut()? {
            Engine::Sprint { sim, .. } => {
                Some(ActionOutcome::Tension(sim.apply_impulse(tension_per_tap, temperament)))
            }
            Engine::Race { beat, field, .. } => {
                // judged on session time, never past the last simulated tick
                let now = if timestamp_ms.is_finite() {
                    timestamp_ms.min(tick_now)
                } else {
                    log::warn!("invalid action timestamp {timestamp_ms}, judging at the last tick");
                    tick_now
                };
                let outcome = beat.register_input(now);
                let lane = outcome.events.iter().find_map(|ev| match ev {
                    BeatEvent::Deflect { direction } => Some(field.deflect(*direction)),
                    _ => None,
                });
                Some(ActionOutcome::Beat { outcome, lane })
            }
        }
    }

    /// Aborts a countdown or active session without producing a result.
    /// Returns whether anything was running.
    pub fn cancel(&mut self) -> bool {
        let was_running = matches!(self.phase, Phase::Countdown | Phase::Active);
        self.unsubscribe();
        self.running = None;
        if self.phase != Phase::Idle {
            if was_running {
                log::info!("session cancelled while {}", self.phase);
            }
            self.result = None;
            self.transition(Phase::Idle);
        }
        was_running
    }

    /// `Finished -> Idle`, clearing the last result.
    pub fn reset(&mut self) -> Result<()> {
        match self.phase {
            Phase::Finished => {
                self.result = None;
                self.transition(Phase::Idle);
                Ok(())
            }
            Phase::Idle => Ok(()),
            actual => Err(Error::InvalidPhase {
                expected: Phase::Finished,
                actual,
            }),
        }
    }
}

impl<H: FrameHost> Drop for SessionController<H> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::presets;
    use crate::effects::{Temperament, Trait};
    use assert_matches::assert_matches;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct CountingHost {
        subscribes: u32,
        unsubscribes: u32,
    }

    impl FrameHost for CountingHost {
        fn subscribe(&mut self) {
            self.subscribes += 1;
        }
        fn unsubscribe(&mut self) {
            self.unsubscribes += 1;
        }
    }

    fn character() -> Character {
        let mut c = presets().into_iter().find(|c| c.id == "haru-urara").unwrap();
        c.comfort_min = 40.0;
        c.comfort_max = 60.0;
        c.trait_ = Trait::None;
        c.temperament = Temperament::Normal;
        c
    }

    fn config(countdown: u32, duration_ms: u64) -> Config {
        let mut cfg = Config {
            countdown_secs: countdown,
            ..Config::default()
        };
        cfg.sprint.duration_ms = duration_ms;
        cfg.race.duration_ms = duration_ms;
        cfg
    }

    fn run_ticks<H: FrameHost>(c: &mut SessionController<H>, from: f64, to: f64, step: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let mut t = from;
        while t <= to {
            events.extend(c.on_tick(t));
            t += step;
        }
        events
    }

    #[test]
    fn countdown_counts_down_then_activates() {
        let mut c = SessionController::new(config(3, 2_000)).with_seed(1);
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        assert_eq!(c.phase(), Phase::Countdown);
        assert_eq!(c.countdown(), Some(3));

        let events = run_ticks(&mut c, 0.0, 2_990.0, 10.0);
        assert_eq!(events, vec![SessionEvent::Countdown(2), SessionEvent::Countdown(1)]);
        assert_eq!(c.phase(), Phase::Countdown);

        let events = c.on_tick(3_010.0);
        assert_eq!(events, vec![SessionEvent::Started]);
        assert_eq!(c.phase(), Phase::Active);
        // the 10ms past the countdown already count as active time
        assert_eq!(c.elapsed_ms(), 10.0);
    }

    #[test]
    fn start_only_from_idle() {
        let mut c = SessionController::new(config(0, 1_000));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        let err = c.start(SessionPlan::Sprint, character(), 0.0).unwrap_err();
        assert_matches!(
            err,
            Error::InvalidPhase {
                expected: Phase::Idle,
                actual: Phase::Active
            }
        );
    }

    #[test]
    fn start_rejects_bad_character() {
        let mut c = SessionController::new(config(0, 1_000));
        let mut bad = character();
        bad.comfort_min = 90.0;
        bad.comfort_max = 10.0;
        assert_matches!(
            c.start(SessionPlan::Sprint, bad, 0.0),
            Err(Error::InvalidComfortBand { .. })
        );
        assert_eq!(c.phase(), Phase::Idle);
        assert!(!c.host().is_open());
    }

    #[test]
    fn scenario_a_decay_without_input() {
        let mut c = SessionController::new(config(0, 2_000));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        let mut finished = None;
        let mut t = 0.0;
        while finished.is_none() {
            for ev in c.on_tick(t) {
                if let SessionEvent::Finished(r) = ev {
                    finished = Some(r);
                }
            }
            if let Some(m) = c.metrics() {
                assert!(m.is_balanced());
            }
            t += 10.0;
        }
        let result = finished.unwrap();
        assert_eq!(result.duration_ms, 2_000.0);
        // Good until tension crosses 40 at 400ms, Under afterwards
        assert_eq!(result.percentages.good, 20);
        assert_eq!(result.percentages.under, 80);
        assert_eq!(result.percentages.over, 0);
        let transitions: Vec<_> = result
            .trace
            .iter()
            .filter(|s| s.zone == Zone::Under)
            .take(1)
            .collect();
        assert!(transitions[0].t_ms >= 400.0 && transitions[0].t_ms <= 450.0);
        let last = result.trace.last().unwrap();
        assert!(last.tension.abs() < 1e-9);
    }

    #[test]
    fn finishes_exactly_once_and_releases_host() {
        let mut c = SessionController::with_host(config(0, 500), CountingHost::default());
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        assert_eq!(c.host().subscribes, 1);
        let events = run_ticks(&mut c, 0.0, 2_000.0, 16.0);
        let finishes = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Finished(_)))
            .count();
        assert_eq!(finishes, 1);
        assert_eq!(c.phase(), Phase::Finished);
        assert_eq!(c.host().unsubscribes, 1);
        assert_eq!(c.result().unwrap().duration_ms, 500.0);
    }

    #[test]
    fn long_frame_is_subdivided_and_truncated() {
        let mut c = SessionController::new(config(0, 1_000));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        c.on_tick(0.0);
        let events = c.on_tick(5_000.0);
        assert_matches!(events.last(), Some(SessionEvent::Finished(r)) if r.duration_ms == 1_000.0);
        // 40 -> Under at 400ms even though it all happened in one frame
        assert_eq!(c.result().unwrap().percentages.good, 40);
    }

    #[test]
    fn player_action_only_while_active() {
        let mut c = SessionController::new(config(1, 1_000));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        assert_eq!(c.on_player_action(10.0), None);
        c.on_tick(1_000.0);
        assert_eq!(c.phase(), Phase::Active);
        assert_eq!(c.on_player_action(1_000.0), Some(ActionOutcome::Tension(58.0)));
        assert_eq!(c.tension(), Some(58.0));
    }

    #[test]
    fn actions_never_finish_a_session() {
        let mut c = SessionController::new(config(0, 100));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        for i in 0..50 {
            c.on_player_action(i as f64 * 100.0);
        }
        assert_eq!(c.phase(), Phase::Active);
        assert!(c.result().is_none());
    }

    #[test]
    fn cancel_mid_session_emits_nothing_and_unsubscribes() {
        let mut c = SessionController::with_host(config(0, 10_000), CountingHost::default());
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        run_ticks(&mut c, 0.0, 500.0, 16.0);
        assert!(c.cancel());
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.result().is_none());
        assert_eq!(c.host().unsubscribes, 1);
        assert!(c.on_tick(600.0).is_empty());
        assert!(!c.cancel());
        assert_eq!(c.host().unsubscribes, 1);
    }

    #[test]
    fn cancel_during_countdown() {
        let mut c = SessionController::with_host(config(3, 10_000), CountingHost::default());
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        c.on_tick(1_500.0);
        assert!(c.cancel());
        assert_eq!(c.host().subscribes, c.host().unsubscribes);
    }

    #[derive(Debug, Clone, Default)]
    struct SharedHost(Rc<Cell<i32>>);

    impl FrameHost for SharedHost {
        fn subscribe(&mut self) {
            self.0.set(self.0.get() + 1);
        }
        fn unsubscribe(&mut self) {
            self.0.set(self.0.get() - 1);
        }
    }

    #[test]
    fn drop_releases_subscription() {
        let host = SharedHost::default();
        {
            let mut c = SessionController::with_host(config(0, 10_000), host.clone());
            c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
            assert!(c.host().0.get() == 1);
            c.on_tick(100.0);
        }
        assert_eq!(host.0.get(), 0);
    }

    #[test]
    fn zero_length_session_scores_zero() {
        let mut c = SessionController::new(config(0, 0));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        let events = c.on_tick(16.0);
        assert_matches!(events.as_slice(), [SessionEvent::Finished(r)] if r.score == 0 && r.stat_changes.is_empty());
        assert_eq!(c.result().unwrap().percentages, Percentages::default());
    }

    #[test]
    fn reset_only_after_finish() {
        let mut c = SessionController::new(config(0, 100));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        assert!(c.reset().is_err());
        run_ticks(&mut c, 0.0, 200.0, 16.0);
        assert_eq!(c.phase(), Phase::Finished);
        c.reset().unwrap();
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.result().is_none());
        c.start(SessionPlan::Sprint, character(), 300.0).unwrap();
        assert_eq!(c.phase(), Phase::Active);
    }

    #[test]
    fn custom_scorer_is_used() {
        struct Flat;
        impl Scorer for Flat {
            fn score(&self, _: &SessionReport, _: &Character) -> ScoreCard {
                ScoreCard {
                    score: 7,
                    ..ScoreCard::zero()
                }
            }
        }
        let mut c = SessionController::new(config(0, 100)).with_scorer(Box::new(Flat));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        run_ticks(&mut c, 0.0, 200.0, 16.0);
        assert_eq!(c.result().unwrap().score, 7);
    }

    #[test]
    fn beat_race_runs_to_time_limit() {
        let plan = SessionPlan::BeatRace {
            distance: RaceDistance::Mid,
            opponents: vec![],
        };
        let mut c = SessionController::new(config(0, 3_000)).with_seed(5);
        c.start(plan, character(), 0.0).unwrap();
        assert!(c.beat().is_some());
        let mut lanes = Vec::new();
        let mut t = 0.0;
        while c.phase() == Phase::Active {
            c.on_tick(t);
            if (t as u64) % 200 == 0 {
                if let Some(ActionOutcome::Beat { lane: Some(l), .. }) = c.on_player_action(t + 1.0) {
                    lanes.push(l);
                }
            }
            t += 10.0;
        }
        let r = c.result().unwrap();
        assert_eq!(r.kind, SessionKind::BeatRace);
        assert_eq!(r.placement, Some(1));
        assert_eq!(r.distance, Some(RaceDistance::Mid));
        assert_eq!(r.standings.len(), 1);
        assert!(lanes.iter().all(|l| *l < 3));
        // the whole time limit was used, so no time bonus
        assert_eq!(r.score, 5000);
    }

    fn race_plan() -> SessionPlan {
        SessionPlan::BeatRace {
            distance: RaceDistance::Mid,
            opponents: vec![],
        }
    }

    #[test]
    fn actions_with_bad_timestamps_are_judged_at_the_last_tick() {
        let mut c = SessionController::new(config(0, 3_000)).with_seed(4);
        c.start(race_plan(), character(), 0.0).unwrap();
        c.on_tick(10.0);
        let cycle_start = c.beat().unwrap().cycle_start();

        for ts in [f64::INFINITY, f64::NAN, f64::NEG_INFINITY, 1.7e12] {
            assert_matches!(c.on_player_action(ts), Some(ActionOutcome::Beat { .. }));
        }
        assert_eq!(c.beat().unwrap().cycle_start(), cycle_start);
        assert_eq!(c.beat().unwrap().hits() + c.beat().unwrap().misses(), 4);
        assert_eq!(c.phase(), Phase::Active);

        run_ticks(&mut c, 20.0, 3_100.0, 16.0);
        assert_eq!(c.result().unwrap().duration_ms, 3_000.0);
    }

    #[test]
    fn huge_duration_does_not_overflow() {
        let mut c = SessionController::new(config(0, u64::MAX / 100));
        c.start(SessionPlan::Sprint, character(), 0.0).unwrap();
        run_ticks(&mut c, 0.0, 1_000.0, 16.0);
        assert_eq!(c.phase(), Phase::Active);
        assert!(c.metrics().unwrap().is_balanced());
    }
}
