use crate::tension::Zone;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensionSample {
    pub t_ms: f64,
    pub tension: f64,
    pub zone: Zone,
}

impl TensionSample {
    pub fn new(t_ms: f64, tension: f64, zone: Zone) -> Self {
        Self { t_ms, tension, zone }
    }
}

impl From<TensionSample> for (f64, f64) {
    fn from(s: TensionSample) -> Self {
        (s.t_ms, s.tension)
    }
}

/// Keeps at most one sample per `resolution_ms` so long sessions stay small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensionTrace {
    resolution_ms: f64,
    samples: Vec<TensionSample>,
}

impl TensionTrace {
    pub fn new(resolution_ms: f64) -> Self {
        Self {
            resolution_ms: resolution_ms.max(0.0),
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, sample: TensionSample) {
        match self.samples.last() {
            Some(last) if sample.t_ms - last.t_ms < self.resolution_ms => {}
            _ => self.samples.push(sample),
        }
    }

    /// Records the closing sample regardless of resolution.
    pub fn close(&mut self, sample: TensionSample) {
        if self.samples.last().map_or(true, |last| last.t_ms < sample.t_ms) {
            self.samples.push(sample);
        }
    }

    pub fn samples(&self) -> &[TensionSample] {
        &self.samples
    }

    /// Zone changes as `(t_ms, zone)`, starting with the first sample's zone.
    pub fn transitions(&self) -> Vec<(f64, Zone)> {
        let mut out: Vec<(f64, Zone)> = Vec::new();
        for s in &self.samples {
            if out.last().map_or(true, |(_, z)| *z != s.zone) {
                out.push((s.t_ms, s.zone));
            }
        }
        out
    }
}
