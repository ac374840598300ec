//! Histogram construction over one or many window parameters.

use nc_common::{Event, EventStream, Result};
use nc_config::StreamConfig;
use rayon::prelude::*;
use tracing::debug;

use crate::binning::BinningStrategy;

/// Owns a sorted, read-only event stream and runs binning strategies on it.
///
/// Each window is binned independently, so multi-window requests run in
/// parallel over the shared stream.
#[derive(Debug, Clone, Default)]
pub struct HistogramCalculator {
    events: EventStream,
}

impl HistogramCalculator {
    /// Sort `events` by time and wrap them.
    pub fn new(events: Vec<Event>) -> Result<Self> {
        Ok(Self {
            events: EventStream::new(events)?,
        })
    }

    pub fn from_stream(events: EventStream) -> Self {
        Self { events }
    }

    /// Apply the stream section of an analysis config (channel filter,
    /// then time cutoff).
    pub fn from_config(events: EventStream, config: &StreamConfig) -> Self {
        let mut calc = Self::from_stream(events);
        if let Some(channels) = &config.channels {
            calc = calc.with_channels(channels);
        }
        if let Some(cutoff) = config.time_cutoff {
            calc = calc.with_time_cutoff(cutoff);
        }
        calc
    }

    /// Drop events at or after `cutoff`.
    pub fn with_time_cutoff(self, cutoff: f64) -> Self {
        let before = self.events.len();
        let events = self.events.truncated(cutoff);
        debug!(cutoff, before, after = events.len(), "time cutoff applied");
        Self { events }
    }

    /// Keep only events from `channels`.
    pub fn with_channels(self, channels: &[u32]) -> Self {
        let before = self.events.len();
        let events = self.events.for_channels(channels);
        debug!(?channels, before, after = events.len(), "channel filter applied");
        Self { events }
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    /// Bin the stream for a single window.
    pub fn histogram<B>(&self, strategy: &B, window: &B::Window) -> Result<B::Output>
    where
        B: BinningStrategy,
    {
        strategy.bin(&self.events, window)
    }

    /// Bin the stream for every window, in input order.
    ///
    /// Fails on the first window that fails.
    pub fn histograms<B>(&self, strategy: &B, windows: &[B::Window]) -> Result<Vec<B::Output>>
    where
        B: BinningStrategy + Sync,
        B::Window: Sync,
        B::Output: Send,
    {
        debug!(windows = windows.len(), events = self.events.len(), "binning windows");
        windows
            .par_iter()
            .map(|window| strategy.bin(&self.events, window))
            .collect()
    }
}
