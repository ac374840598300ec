//! Feynman and Rossi histograms.
//!
//! Both types validate their invariants at construction and on
//! deserialization, so downstream analysis can index without re-checking.

use crate::error::{InputError, Result};
use serde::{Deserialize, Serialize};

fn check_window(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InputError::NonPositiveWindow { name, value }.into())
    }
}

fn same_width(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

/// Distribution of per-gate event counts: `frequency[k]` is the number of
/// gates of width `gatewidth` that contained exactly `k` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeynmanHistogram {
    gatewidth: f64,
    frequency: Vec<u64>,
}

impl FeynmanHistogram {
    pub fn new(gatewidth: f64, frequency: Vec<u64>) -> Result<Self> {
        check_window("gatewidth", gatewidth)?;
        if frequency.is_empty() {
            return Err(InputError::MalformedHistogram("frequency is empty".into()).into());
        }
        Ok(Self {
            gatewidth,
            frequency,
        })
    }

    pub fn gatewidth(&self) -> f64 {
        self.gatewidth
    }

    pub fn frequency(&self) -> &[u64] {
        &self.frequency
    }

    pub fn into_frequency(self) -> Vec<u64> {
        self.frequency
    }

    /// Number of gates recorded (`sum_k frequency[k]`).
    pub fn total_gates(&self) -> u64 {
        self.frequency.iter().sum()
    }

    /// Number of events recorded (`sum_k k * frequency[k]`).
    pub fn total_counts(&self) -> u64 {
        self.frequency
            .iter()
            .enumerate()
            .map(|(k, &f)| k as u64 * f)
            .sum()
    }

    /// Largest occupied count, `None` when every bin is zero.
    pub fn max_count(&self) -> Option<usize> {
        self.frequency.iter().rposition(|&f| f > 0)
    }

    /// Copy without trailing zero bins (at least one bin is kept).
    pub fn trimmed(&self) -> Self {
        let keep = self.max_count().map_or(1, |k| k + 1);
        Self {
            gatewidth: self.gatewidth,
            frequency: self.frequency[..keep].to_vec(),
        }
    }

    /// Bin-wise sum with another histogram of the same gate width.
    pub fn merged(&self, other: &Self) -> Result<Self> {
        if !same_width(self.gatewidth, other.gatewidth) {
            return Err(InputError::MalformedHistogram(format!(
                "cannot merge gate widths {} and {}",
                self.gatewidth, other.gatewidth
            ))
            .into());
        }
        let len = self.frequency.len().max(other.frequency.len());
        let frequency = (0..len)
            .map(|k| {
                self.frequency.get(k).copied().unwrap_or(0)
                    + other.frequency.get(k).copied().unwrap_or(0)
            })
            .collect();
        Ok(Self {
            gatewidth: self.gatewidth,
            frequency,
        })
    }
}

impl<'de> Deserialize<'de> for FeynmanHistogram {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            gatewidth: f64,
            frequency: Vec<u64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        FeynmanHistogram::new(raw.gatewidth, raw.frequency).map_err(serde::de::Error::custom)
    }
}

/// Counts of inter-event time differences in `number_bins` equal bins over
/// `[0, reset_time)`. Counts are real-valued so a baseline can be removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RossiHistogram {
    reset_time: f64,
    bin_centers: Vec<f64>,
    frequency: Vec<f64>,
}

impl RossiHistogram {
    pub fn new(reset_time: f64, frequency: Vec<f64>) -> Result<Self> {
        check_window("reset_time", reset_time)?;
        if frequency.is_empty() {
            return Err(InputError::ZeroCount {
                name: "number_bins",
            }
            .into());
        }
        if frequency.iter().any(|f| !f.is_finite()) {
            return Err(
                InputError::MalformedHistogram("non-finite bin count".into()).into(),
            );
        }
        let width = reset_time / frequency.len() as f64;
        let bin_centers = (0..frequency.len())
            .map(|i| (i as f64 + 0.5) * width)
            .collect();
        Ok(Self {
            reset_time,
            bin_centers,
            frequency,
        })
    }

    /// All-zero histogram with `number_bins` bins.
    pub fn empty(reset_time: f64, number_bins: usize) -> Result<Self> {
        Self::new(reset_time, vec![0.0; number_bins])
    }

    pub fn reset_time(&self) -> f64 {
        self.reset_time
    }

    pub fn number_bins(&self) -> usize {
        self.frequency.len()
    }

    pub fn bin_width(&self) -> f64 {
        self.reset_time / self.frequency.len() as f64
    }

    pub fn bin_centers(&self) -> &[f64] {
        &self.bin_centers
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    /// Bin for a time difference, `None` outside `[0, reset_time)`.
    pub fn bin_index(&self, dt: f64) -> Option<usize> {
        if !(0.0..self.reset_time).contains(&dt) {
            return None;
        }
        let idx = (dt / self.bin_width()) as usize;
        // dt just below reset_time can round up to number_bins
        Some(idx.min(self.frequency.len() - 1))
    }

    /// Add one count for `dt`. Returns whether it fell inside the window.
    pub fn record(&mut self, dt: f64) -> bool {
        match self.bin_index(dt) {
            Some(idx) => {
                self.frequency[idx] += 1.0;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> f64 {
        self.frequency.iter().sum()
    }

    /// Mean count of the last `fraction` of bins, an estimate of the
    /// uncorrelated (accidental) floor.
    pub fn tail_baseline(&self, fraction: f64) -> f64 {
        let n = self.frequency.len();
        let take = ((n as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize).clamp(1, n);
        self.frequency[n - take..].iter().sum::<f64>() / take as f64
    }

    /// Copy with `baseline` removed from every bin.
    pub fn baseline_subtracted(&self, baseline: f64) -> Self {
        Self {
            reset_time: self.reset_time,
            bin_centers: self.bin_centers.clone(),
            frequency: self.frequency.iter().map(|f| f - baseline).collect(),
        }
    }

    /// `(bin_centers, frequency)` restricted to centers in `[min, max]`.
    pub fn windowed(&self, min: f64, max: f64) -> (Vec<f64>, Vec<f64>) {
        self.bin_centers
            .iter()
            .zip(&self.frequency)
            .filter(|(c, _)| (min..=max).contains(*c))
            .map(|(c, f)| (*c, *f))
            .unzip()
    }

    /// Bin-wise sum with a histogram of identical binning.
    pub fn merged(&self, other: &Self) -> Result<Self> {
        if !same_width(self.reset_time, other.reset_time)
            || self.frequency.len() != other.frequency.len()
        {
            return Err(InputError::MalformedHistogram(format!(
                "cannot merge {} bins over {} ns with {} bins over {} ns",
                self.frequency.len(),
                self.reset_time,
                other.frequency.len(),
                other.reset_time
            ))
            .into());
        }
        Ok(Self {
            reset_time: self.reset_time,
            bin_centers: self.bin_centers.clone(),
            frequency: self
                .frequency
                .iter()
                .zip(&other.frequency)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }
}

impl<'de> Deserialize<'de> for RossiHistogram {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // bin_centers are derived; a serialized copy is ignored
        #[derive(Deserialize)]
        struct Raw {
            reset_time: f64,
            frequency: Vec<f64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        RossiHistogram::new(raw.reset_time, raw.frequency).map_err(serde::de::Error::custom)
    }
}
