//! Detector events and the time-ordered event stream.

use crate::error::{InputError, Result};
use serde::{Deserialize, Serialize};

/// A single detection: arrival time in nanoseconds and the detector channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub detector: u32,
}

impl Event {
    pub fn new(time: f64, detector: u32) -> Self {
        Self { time, detector }
    }
}

impl From<(f64, u32)> for Event {
    fn from((time, detector): (f64, u32)) -> Self {
        Self { time, detector }
    }
}

/// Events sorted by non-decreasing time.
///
/// Construction sorts stably, so events with equal times keep their input
/// order. Times must be finite and non-negative; gate 0 starts at `t = 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    /// Validate and sort `events`.
    pub fn new(mut events: Vec<Event>) -> Result<Self> {
        if let Some((index, e)) = events
            .iter()
            .enumerate()
            .find(|(_, e)| !e.time.is_finite() || e.time < 0.0)
        {
            return Err(InputError::InvalidTime {
                index,
                time: e.time,
            }
            .into());
        }
        // Finite times are totally ordered.
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { events })
    }

    /// Build from `(time, detector)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, u32)>,
    {
        Self::new(pairs.into_iter().map(Event::from).collect())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().map(|e| e.time)
    }

    pub fn first_time(&self) -> Option<f64> {
        self.events.first().map(|e| e.time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Span between the first and last event (0 for fewer than two events).
    pub fn duration(&self) -> f64 {
        match (self.first_time(), self.last_time()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Events with `time < cutoff`.
    pub fn truncated(&self, cutoff: f64) -> Self {
        let end = self.events.partition_point(|e| e.time < cutoff);
        Self {
            events: self.events[..end].to_vec(),
        }
    }

    /// Events recorded on any of `channels`, order preserved.
    pub fn for_channels(&self, channels: &[u32]) -> Self {
        Self {
            events: self
                .events
                .iter()
                .filter(|e| channels.contains(&e.detector))
                .copied()
                .collect(),
        }
    }

    /// Distinct detector channels, ascending.
    pub fn channels(&self) -> Vec<u32> {
        let mut channels: Vec<u32> = self.events.iter().map(|e| e.detector).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

impl<'de> Deserialize<'de> for EventStream {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            events: Vec<Event>,
        }
        let raw = Raw::deserialize(deserializer)?;
        EventStream::new(raw.events).map_err(serde::de::Error::custom)
    }
}
