//! Feynman-Y gate-width sweeps.

use nc_common::{FeynmanHistogram, InputError, Result};
use nc_config::FeynmanStatistic;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binning::Sequential;
use crate::calculator::HistogramCalculator;
use crate::moments::{Estimate, FeynmanStatistics, MomentAnalyzer};

/// Histogram and statistics at one gate width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeynmanPoint {
    pub gatewidth: f64,
    pub histogram: FeynmanHistogram,
    pub statistics: FeynmanStatistics,
}

/// A statistic against gate width, ready for fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Per-point uncertainties, if all are usable as fit weights.
    pub fn weights(&self) -> Option<&[f64]> {
        self.sigma
            .iter()
            .all(|s| s.is_finite() && *s > 0.0)
            .then_some(self.sigma.as_slice())
    }
}

/// Ordered Feynman points over a set of gate widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeynmanSweep {
    points: Vec<FeynmanPoint>,
}

impl FeynmanSweep {
    /// Bin and analyze every gate width.
    pub fn run(
        calculator: &HistogramCalculator,
        binning: &Sequential,
        gate_widths: &[f64],
    ) -> Result<Self> {
        let histograms = calculator.histograms(binning, gate_widths)?;
        Self::from_histograms(histograms)
    }

    /// Analyze prepared histograms; points are ordered by gate width.
    pub fn from_histograms(histograms: Vec<FeynmanHistogram>) -> Result<Self> {
        if histograms.is_empty() {
            return Err(InputError::ZeroCount { name: "gate_widths" }.into());
        }
        let mut points = histograms
            .into_par_iter()
            .map(|histogram| {
                let statistics = MomentAnalyzer.analyze(&histogram)?;
                Ok(FeynmanPoint {
                    gatewidth: histogram.gatewidth(),
                    histogram,
                    statistics,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        points.sort_by(|a, b| a.gatewidth.total_cmp(&b.gatewidth));
        debug!(points = points.len(), "feynman sweep analyzed");
        Ok(Self { points })
    }

    pub fn points(&self) -> &[FeynmanPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn gate_widths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.gatewidth).collect()
    }

    /// Extract `statistic` against gate width.
    ///
    /// Gate widths where the statistic is undefined (no counts) are left out.
    pub fn curve(&self, statistic: FeynmanStatistic) -> Curve {
        let mut curve = Curve::default();
        for point in &self.points {
            let value: Option<Estimate> = match statistic {
                FeynmanStatistic::Y => point.statistics.y,
                FeynmanStatistic::Y2 => Some(point.statistics.y2),
            };
            if let Some(e) = value {
                curve.x.push(point.gatewidth);
                curve.y.push(e.value);
                curve.sigma.push(e.uncertainty);
            }
        }
        curve
    }

    /// Sum histograms gate width by gate width and re-analyze.
    ///
    /// Both sweeps must cover the same gate widths.
    pub fn merged(&self, other: &Self) -> Result<Self> {
        if self.points.len() != other.points.len() {
            return Err(InputError::LengthMismatch {
                left: "sweep",
                left_len: self.points.len(),
                right: "other sweep",
                right_len: other.points.len(),
            }
            .into());
        }
        let histograms = self
            .points
            .iter()
            .zip(&other.points)
            .map(|(a, b)| a.histogram.merged(&b.histogram))
            .collect::<Result<Vec<_>>>()?;
        Self::from_histograms(histograms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_common::Event;

    fn calculator() -> HistogramCalculator {
        let events = (0..400)
            .map(|i| {
                // bursts of 1-3 events every 10 ns
                let base = 10.0 * (i / 3) as f64;
                Event::new(base + 0.5 * (i % 3) as f64, 1)
            })
            .filter(|e| (e.time as u64 / 10) % 4 != 3)
            .collect();
        HistogramCalculator::new(events).unwrap()
    }

    #[test]
    fn points_are_sorted_by_gate_width() {
        let sweep = FeynmanSweep::run(&calculator(), &Sequential::default(), &[40.0, 5.0, 20.0])
            .unwrap();
        assert_eq!(sweep.gate_widths(), vec![5.0, 20.0, 40.0]);
        for point in sweep.points() {
            assert_eq!(point.histogram.gatewidth(), point.gatewidth);
            assert_eq!(point.statistics.gatewidth, point.gatewidth);
        }
    }

    #[test]
    fn curve_matches_statistics() {
        let sweep = FeynmanSweep::run(&calculator(), &Sequential::default(), &[5.0, 20.0]).unwrap();
        let curve = sweep.curve(FeynmanStatistic::Y);
        assert_eq!(curve.len(), 2);
        let y0 = sweep.points()[0].statistics.y.unwrap();
        assert_eq!(curve.y[0], y0.value);
        assert_eq!(curve.sigma[0], y0.uncertainty);

        let y2 = sweep.curve(FeynmanStatistic::Y2);
        assert_eq!(y2.y[1], sweep.points()[1].statistics.y2.value);
    }

    #[test]
    fn merging_doubles_gate_counts() {
        let sweep = FeynmanSweep::run(&calculator(), &Sequential::default(), &[5.0, 20.0]).unwrap();
        let merged = sweep.merged(&sweep).unwrap();
        for (a, m) in sweep.points().iter().zip(merged.points()) {
            assert_eq!(2 * a.histogram.total_gates(), m.histogram.total_gates());
            // identical copies leave the moments unchanged
            assert!((a.statistics.mean - m.statistics.mean).abs() < 1e-12);
        }
        let short = FeynmanSweep::run(&calculator(), &Sequential::default(), &[5.0]).unwrap();
        assert!(sweep.merged(&short).is_err());
    }

    #[test]
    fn empty_sweep_is_rejected() {
        assert!(FeynmanSweep::from_histograms(Vec::new()).is_err());
    }
}
