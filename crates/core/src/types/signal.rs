//! Normalised content-time signal and buffered ranges

use serde::{Deserialize, Serialize};

/// Renderer-agnostic playback position and speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTimeSignal {
    /// Position in seconds, NaN when unknown
    pub content_time: f64,
    /// 0 when paused or ended, otherwise the playback rate
    pub speed_multiplier: f64,
}

impl ContentTimeSignal {
    /// Creates a signal from explicit values
    pub fn new(content_time: f64, speed_multiplier: f64) -> Self {
        Self {
            content_time,
            speed_multiplier,
        }
    }

    /// Derives the signal from a renderer's playback state
    pub fn from_playback(current_time: f64, playback_rate: f64, paused: bool, ended: bool) -> Self {
        let speed_multiplier = if paused || ended { 0.0 } else { playback_rate };
        Self::new(current_time, speed_multiplier)
    }

    /// Signal with unknown position
    pub fn unknown() -> Self {
        Self::new(f64::NAN, 0.0)
    }

    /// Returns true if the content time is a number
    pub fn has_time(&self) -> bool {
        !self.content_time.is_nan()
    }

    /// Returns true if the timeline is stationary
    pub fn is_stopped(&self) -> bool {
        self.speed_multiplier == 0.0
    }
}

/// Buffered time ranges of a renderer, in seconds
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRanges(Vec<(f64, f64)>);

impl TimeRanges {
    /// Creates an empty range set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding one range
    pub fn single(start: f64, end: f64) -> Self {
        Self(vec![(start, end)])
    }

    /// Appends a range
    pub fn push(&mut self, start: f64, end: f64) {
        self.0.push((start, end));
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Start of the range at `index`
    pub fn start(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|(start, _)| *start)
    }

    /// End of the range at `index`
    pub fn end(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|(_, end)| *end)
    }

    /// Returns true if `time` lies inside any range (bounds inclusive)
    pub fn contains(&self, time: f64) -> bool {
        self.0
            .iter()
            .any(|(start, end)| time >= *start && time <= *end)
    }

    /// Iterates over `(start, end)` pairs
    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.0.iter()
    }
}

impl From<Vec<(f64, f64)>> for TimeRanges {
    fn from(ranges: Vec<(f64, f64)>) -> Self {
        Self(ranges)
    }
}
