use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    Action,
    Quit,
    Tick,
}

/// Source of player events (keypresses, taps, scripted input)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError>;
}

/// Line-based event source: every Enter is a player action, `q` quits.
pub struct StdinEventSource {
    rx: Receiver<HostEvent>,
}

impl StdinEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let ev = match line {
                    Ok(l) if l.trim().eq_ignore_ascii_case("q") => HostEvent::Quit,
                    Ok(_) => HostEvent::Action,
                    Err(_) => break,
                };
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for StdinEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for StdinEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-backed event source for tests and scripted drivers
pub struct ChannelEventSource {
    rx: Receiver<HostEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<HostEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> HostEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => HostEvent::Tick,
        }
    }
}

/// Wall-clock timestamps in milliseconds since the host started.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns successive frame timestamps into per-frame deltas.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta since the previous timestamp. The first call only sets the
    /// baseline. Non-finite or backwards deltas are clamped to zero.
    pub fn advance(&mut self, timestamp_ms: f64) -> f64 {
        if !timestamp_ms.is_finite() {
            log::warn!("ignoring non-finite frame timestamp {timestamp_ms}");
            return 0.0;
        }
        let delta = match self.last {
            None => 0.0,
            Some(prev) => timestamp_ms - prev,
        };
        if delta < 0.0 {
            log::warn!("frame timestamp went backwards by {:.3}ms, clamping", -delta);
            // keep the later baseline so the next delta is not inflated
            return 0.0;
        }
        self.last = Some(timestamp_ms);
        delta
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Rebase on `timestamp_ms` without producing a delta.
    pub fn rebase(&mut self, timestamp_ms: f64) {
        if timestamp_ms.is_finite() {
            self.last = Some(timestamp_ms);
        }
    }
}

/// The host's per-frame callback registration.
///
/// A session subscribes when it leaves `Idle` and must unsubscribe on every
/// way out of the running phases.
pub trait FrameHost {
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
}

/// Default host: a flag the frame loop polls.
#[derive(Debug, Default, Clone)]
pub struct TickGate {
    open: bool,
}

impl TickGate {
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameHost for TickGate {
    fn subscribe(&mut self) {
        self.open = true;
    }

    fn unsubscribe(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        assert_eq!(runner.step(), HostEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(HostEvent::Action).unwrap();
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        assert_eq!(runner.step(), HostEvent::Action);
    }

    #[test]
    fn step_ticks_when_sender_is_gone() {
        let (tx, rx) = mpsc::channel::<HostEvent>();
        drop(tx);
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_eq!(runner.step(), HostEvent::Tick);
    }

    #[test]
    fn frame_clock_first_advance_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(1_000.0), 0.0);
        assert_eq!(clock.advance(1_016.0), 16.0);
        assert_eq!(clock.advance(1_050.0), 34.0);
    }

    #[test]
    fn frame_clock_clamps_backwards_and_nan() {
        let mut clock = FrameClock::new();
        clock.advance(100.0);
        assert_eq!(clock.advance(90.0), 0.0);
        assert_eq!(clock.last(), Some(100.0));
        assert_eq!(clock.advance(f64::NAN), 0.0);
        assert_eq!(clock.advance(f64::INFINITY), 0.0);
        assert_eq!(clock.advance(120.0), 20.0);
    }

    #[test]
    fn tick_gate_tracks_subscription() {
        let mut gate = TickGate::default();
        assert!(!gate.is_open());
        gate.subscribe();
        assert!(gate.is_open());
        gate.unsubscribe();
        assert!(!gate.is_open());
    }
}
