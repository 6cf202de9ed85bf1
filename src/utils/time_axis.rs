//! Tick/millisecond conversion for a single-tempo project

use serde::{Deserialize, Serialize};

/// Cached tempo and meter used to convert between ticks, beats and milliseconds
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeAxis {
    pub bpm: f64,
    pub beat_per_bar: i32,
    pub beat_unit: i32,
    pub resolution: i32,
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self::new(120.0, 4, 4, 480)
    }
}

impl TimeAxis {
    pub fn new(bpm: f64, beat_per_bar: i32, beat_unit: i32, resolution: i32) -> Self {
        Self {
            bpm,
            beat_per_bar,
            beat_unit,
            resolution,
        }
    }

    /// Milliseconds covered by one tick
    pub fn ms_per_tick(&self) -> f64 {
        60_000.0 / (self.bpm * self.resolution as f64)
    }

    pub fn tick_to_ms(&self, tick: f64) -> f64 {
        tick * self.ms_per_tick()
    }

    pub fn ms_to_tick(&self, ms: f64) -> i32 {
        (ms / self.ms_per_tick()).round() as i32
    }

    /// Signed milliseconds from `from_tick` to `to_tick`
    pub fn ms_between(&self, from_tick: i32, to_tick: i32) -> f64 {
        self.tick_to_ms((to_tick - from_tick) as f64)
    }

    /// Ticks in one beat of the current meter
    pub fn beat_ticks(&self) -> i32 {
        self.resolution * 4 / self.beat_unit.max(1)
    }

    pub fn bar_ticks(&self) -> i32 {
        self.beat_ticks() * self.beat_per_bar
    }

    /// Round a tick up to the start of the following beat
    pub fn next_beat_after(&self, tick: i32) -> i32 {
        let beat = self.beat_ticks().max(1);
        (tick.max(0) / beat + 1) * beat
    }
}
