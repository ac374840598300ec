//! Binning strategies: event stream + window parameter → histogram.
//!
//! `Sequential` produces Feynman gate-count histograms. The three Rossi
//! variants produce time-difference histograms and differ only in which
//! event pairs they count:
//!
//! | Variant    | Triggers                          | Partners counted            |
//! |------------|-----------------------------------|-----------------------------|
//! | Type I     | every event                       | all later events in window  |
//! | Type II    | first event after previous window | all later events in window  |
//! | Type III   | every event                       | first later event in window |
//!
//! Windows are half-open: a difference equal to `reset_time` is excluded.
//! A [`PairingPolicy`] additionally filters pairs by detector channel.

use nc_common::{
    EmptyGates, Error, EventStream, FeynmanHistogram, InputError, PairingPolicy, Result,
    RossiHistogram, RossiVariant,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Converts an event stream and a window parameter into a histogram.
pub trait BinningStrategy {
    /// The window parameter (gate width, reset time + bins).
    type Window;
    /// The histogram produced.
    type Output;

    fn bin(&self, events: &EventStream, window: &Self::Window) -> Result<Self::Output>;
}

fn require_events(events: &EventStream) -> Result<()> {
    if events.is_empty() {
        Err(InputError::EmptyEvents.into())
    } else {
        Ok(())
    }
}

fn require_window(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InputError::NonPositiveWindow { name, value }.into())
    }
}

// ============================================================================
// Feynman
// ============================================================================

/// Gate indices stay exact in `f64` below `2^53`.
const MAX_GATE_INDEX: f64 = 9_007_199_254_740_992.0;

/// Reject gate widths that would split the stream into more gates than can
/// be indexed exactly.
fn require_gate_count(events: &EventStream, gatewidth: f64) -> Result<()> {
    let last = events.last_time().unwrap_or(0.0);
    let gates = (last / gatewidth).floor();
    if gates < MAX_GATE_INDEX {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "gate width {gatewidth:e} splits a stream ending at {last:e} into {gates:e} gates"
        )))
    }
}

/// Consecutive gates of equal width starting at `t = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequential {
    pub empty_gates: EmptyGates,
}

impl Sequential {
    pub fn new(empty_gates: EmptyGates) -> Self {
        Self { empty_gates }
    }
}

fn bump(frequency: &mut Vec<u64>, count: usize, by: u64) {
    if frequency.len() <= count {
        frequency.resize(count + 1, 0);
    }
    frequency[count] += by;
}

impl BinningStrategy for Sequential {
    /// Gate width in nanoseconds.
    type Window = f64;
    type Output = FeynmanHistogram;

    fn bin(&self, events: &EventStream, gatewidth: &f64) -> Result<FeynmanHistogram> {
        let gatewidth = *gatewidth;
        require_window("gatewidth", gatewidth)?;
        require_events(events)?;
        require_gate_count(events, gatewidth)?;

        let tally = self.empty_gates == EmptyGates::Tally;
        let mut frequency = vec![0u64; 1];
        let mut current_gate = 0u64;
        let mut count = 0usize;

        for time in events.times() {
            let gate = (time / gatewidth).floor() as u64;
            if gate != current_gate {
                if count > 0 || tally {
                    bump(&mut frequency, count, 1);
                }
                if tally {
                    frequency[0] += gate - current_gate - 1;
                }
                current_gate = gate;
                count = 0;
            }
            count += 1;
        }
        // the last gate is still open
        bump(&mut frequency, count, 1);

        trace!(
            gatewidth,
            gates = frequency.iter().sum::<u64>(),
            max_count = frequency.len() - 1,
            "sequential binning done"
        );
        FeynmanHistogram::new(gatewidth, frequency)
    }
}

// ============================================================================
// Rossi
// ============================================================================

/// Rossi window: differences in `[0, reset_time)` split into `number_bins`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RossiWindow {
    pub reset_time: f64,
    pub number_bins: usize,
}

impl RossiWindow {
    pub fn new(reset_time: f64, number_bins: usize) -> Self {
        Self {
            reset_time,
            number_bins,
        }
    }

    fn empty_histogram(&self, events: &EventStream) -> Result<RossiHistogram> {
        require_window("reset_time", self.reset_time)?;
        if self.number_bins == 0 {
            return Err(InputError::ZeroCount {
                name: "number_bins",
            }
            .into());
        }
        require_events(events)?;
        RossiHistogram::empty(self.reset_time, self.number_bins)
    }
}

/// Every event triggers; all later events inside the window are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RossiTypeI {
    pub pairing: PairingPolicy,
}

impl BinningStrategy for RossiTypeI {
    type Window = RossiWindow;
    type Output = RossiHistogram;

    fn bin(&self, events: &EventStream, window: &RossiWindow) -> Result<RossiHistogram> {
        let mut hist = window.empty_histogram(events)?;
        let events = events.events();
        for (i, trigger) in events.iter().enumerate() {
            for partner in &events[i + 1..] {
                let dt = partner.time - trigger.time;
                if dt >= window.reset_time {
                    break;
                }
                if self.pairing.accepts(trigger.detector, partner.detector) {
                    hist.record(dt);
                }
            }
        }
        Ok(hist)
    }
}

/// Non-overlapping windows: after a trigger, the next trigger is the first
/// event at or after the end of its window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RossiTypeII {
    pub pairing: PairingPolicy,
}

impl BinningStrategy for RossiTypeII {
    type Window = RossiWindow;
    type Output = RossiHistogram;

    fn bin(&self, events: &EventStream, window: &RossiWindow) -> Result<RossiHistogram> {
        let mut hist = window.empty_histogram(events)?;
        let events = events.events();
        let mut i = 0;
        while i < events.len() {
            let trigger = events[i];
            let mut next = i + 1;
            while next < events.len() {
                let partner = events[next];
                let dt = partner.time - trigger.time;
                if dt >= window.reset_time {
                    break;
                }
                if self.pairing.accepts(trigger.detector, partner.detector) {
                    hist.record(dt);
                }
                next += 1;
            }
            i = next;
        }
        Ok(hist)
    }
}

/// Every event triggers; only the first eligible later event is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RossiTypeIII {
    pub pairing: PairingPolicy,
}

impl BinningStrategy for RossiTypeIII {
    type Window = RossiWindow;
    type Output = RossiHistogram;

    fn bin(&self, events: &EventStream, window: &RossiWindow) -> Result<RossiHistogram> {
        let mut hist = window.empty_histogram(events)?;
        let events = events.events();
        for (i, trigger) in events.iter().enumerate() {
            let first = events[i + 1..]
                .iter()
                .take_while(|p| p.time - trigger.time < window.reset_time)
                .find(|p| self.pairing.accepts(trigger.detector, p.detector));
            if let Some(partner) = first {
                hist.record(partner.time - trigger.time);
            }
        }
        Ok(hist)
    }
}

/// A Rossi strategy chosen at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RossiBinning {
    pub variant: RossiVariant,
    pub pairing: PairingPolicy,
}

impl RossiBinning {
    pub fn new(variant: RossiVariant, pairing: PairingPolicy) -> Self {
        Self { variant, pairing }
    }
}

impl BinningStrategy for RossiBinning {
    type Window = RossiWindow;
    type Output = RossiHistogram;

    fn bin(&self, events: &EventStream, window: &RossiWindow) -> Result<RossiHistogram> {
        let pairing = self.pairing;
        let hist = match self.variant {
            RossiVariant::TypeI => RossiTypeI { pairing }.bin(events, window),
            RossiVariant::TypeII => RossiTypeII { pairing }.bin(events, window),
            RossiVariant::TypeIII => RossiTypeIII { pairing }.bin(events, window),
        }?;
        trace!(
            variant = %self.variant,
            reset_time = window.reset_time,
            pairs = hist.total(),
            "rossi binning done"
        );
        Ok(hist)
    }
}
