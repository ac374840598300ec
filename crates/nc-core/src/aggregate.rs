//! Cross-measurement aggregation of Feynman sweeps.
//!
//! The three R2 strategies deliberately reduce different aggregates and are
//! not expected to agree exactly:
//!
//! - `PerMeasurement`: R2 per measurement, then inverse-variance combined.
//! - `HistogramSum`: histograms summed per gate width, R2 recomputed once.
//! - `WeightedComponents`: Y1 and Y2 combined separately, R2 taken from
//!   the combined pair.
//!
//! A measurement whose value at a gate width has a zero or clamped
//! uncertainty cannot carry an inverse-variance weight. It is left out of
//! the weighting at that gate width only, and the combined value there is
//! marked degraded. When no measurement at a gate width can be weighted,
//! the values are averaged with equal weights instead.

use nc_common::{Error, InputError, Result};
use nc_math::relative_difference;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::moments::{Estimate, FeynmanStatistics};
use crate::rates::{average_rates, combine_rates, CombinedRate};
use crate::sweep::FeynmanSweep;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum R2Strategy {
    #[default]
    PerMeasurement,
    HistogramSum,
    WeightedComponents,
}

/// Aggregated R2 at one gate width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct R2Point {
    pub gatewidth: f64,
    /// `r2.degraded` is set when any measurement was left unweighted.
    pub r2: Estimate,
    /// Sample standard deviation of the per-measurement values, where the
    /// strategy has one.
    pub spread: Option<f64>,
    /// Measurements left out of the inverse-variance weighting.
    pub excluded: usize,
}

/// One statistic combined across measurements at one gate width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatistic {
    pub gatewidth: f64,
    pub combined: CombinedRate,
    /// Measurements left out of the inverse-variance weighting.
    pub excluded: usize,
}

impl AggregatedStatistic {
    pub fn degraded(&self) -> bool {
        self.excluded > 0
    }

    /// The combined value, flagged when inputs were left out.
    pub fn estimate(&self) -> Estimate {
        Estimate {
            degraded: self.degraded(),
            ..self.combined.estimate()
        }
    }
}

/// Gate widths shared by every sweep.
fn shared_gate_widths(sweeps: &[FeynmanSweep]) -> Result<Vec<f64>> {
    let Some(first) = sweeps.first() else {
        return Err(Error::invalid_input("no measurements to aggregate"));
    };
    let widths = first.gate_widths();
    for (i, sweep) in sweeps.iter().enumerate().skip(1) {
        let other = sweep.gate_widths();
        if other.len() != widths.len() {
            return Err(InputError::LengthMismatch {
                left: "first measurement",
                left_len: widths.len(),
                right: "measurement",
                right_len: other.len(),
            }
            .into());
        }
        if let Some((a, b)) = widths
            .iter()
            .zip(&other)
            .find(|(a, b)| relative_difference(**a, **b) > 1e-12)
        {
            return Err(Error::invalid_input(format!(
                "measurement {i} has gate width {b} where the first has {a}"
            )));
        }
    }
    Ok(widths)
}

fn finite(e: &Estimate) -> bool {
    e.value.is_finite() && e.uncertainty.is_finite() && e.uncertainty >= 0.0
}

fn weightable(e: &Estimate) -> bool {
    finite(e) && !e.degraded && e.uncertainty > 0.0
}

/// Combine the values measured at one gate width.
///
/// `None` when no value is finite.
fn combine_at(gatewidth: f64, values: &[Estimate]) -> Result<Option<AggregatedStatistic>> {
    let usable: Vec<Estimate> = values.iter().copied().filter(weightable).collect();
    let combined = if !usable.is_empty() {
        combine_rates(&usable)?
    } else {
        let measured: Vec<Estimate> = values.iter().copied().filter(finite).collect();
        if measured.is_empty() {
            return Ok(None);
        }
        average_rates(&measured)?
    };
    let excluded = values.len() - usable.len();
    if excluded > 0 {
        debug!(gatewidth, excluded, "measurements left out of the weighting");
    }
    Ok(Some(AggregatedStatistic {
        gatewidth,
        combined,
        excluded,
    }))
}

/// Combine one statistic across sweeps, gate width by gate width.
///
/// Gate widths where no measurement defines the statistic are left out.
pub fn aggregate_statistic<F>(
    sweeps: &[FeynmanSweep],
    select: F,
) -> Result<Vec<AggregatedStatistic>>
where
    F: Fn(&FeynmanStatistics) -> Option<Estimate>,
{
    let widths = shared_gate_widths(sweeps)?;
    let mut out = Vec::with_capacity(widths.len());
    for (i, gatewidth) in widths.into_iter().enumerate() {
        let values: Vec<Estimate> = sweeps
            .iter()
            .filter_map(|s| select(&s.points()[i].statistics))
            .collect();
        if let Some(point) = combine_at(gatewidth, &values)? {
            out.push(point);
        }
    }
    Ok(out)
}

/// `Y2 / Y1` from the combined components.
fn component_ratio(y1: &AggregatedStatistic, y2: &AggregatedStatistic) -> Option<R2Point> {
    let (a, b) = (y2.combined.weighted_mean, y1.combined.weighted_mean);
    if b == 0.0 {
        return None;
    }
    let (sa, sb) = (y2.combined.propagated_uncertainty, y1.combined.propagated_uncertainty);
    let variance = (sa / b).powi(2) + (a * sb / (b * b)).powi(2);
    let mut r2 = Estimate::from_variance(a / b, variance);
    r2.degraded |= y1.degraded() || y2.degraded();
    Some(R2Point {
        gatewidth: y1.gatewidth,
        r2,
        spread: None,
        excluded: y1.excluded.max(y2.excluded),
    })
}

/// Aggregate R2 across measurements with `strategy`.
pub fn aggregate_r2(sweeps: &[FeynmanSweep], strategy: R2Strategy) -> Result<Vec<R2Point>> {
    let points = match strategy {
        R2Strategy::PerMeasurement => aggregate_statistic(sweeps, |s| s.r2)?
            .into_iter()
            .map(|a| R2Point {
                gatewidth: a.gatewidth,
                r2: a.estimate(),
                spread: a.combined.sample_std_dev,
                excluded: a.excluded,
            })
            .collect(),
        R2Strategy::HistogramSum => {
            shared_gate_widths(sweeps)?;
            let (first, rest) = sweeps
                .split_first()
                .ok_or_else(|| Error::invalid_input("no measurements to aggregate"))?;
            let summed = rest
                .iter()
                .try_fold(first.clone(), |acc, sweep| acc.merged(sweep))?;
            summed
                .points()
                .iter()
                .filter_map(|p| {
                    p.statistics.r2.map(|r2| R2Point {
                        gatewidth: p.gatewidth,
                        r2,
                        spread: None,
                        excluded: 0,
                    })
                })
                .collect()
        }
        R2Strategy::WeightedComponents => {
            let widths = shared_gate_widths(sweeps)?;
            let mut points = Vec::with_capacity(widths.len());
            for (i, gatewidth) in widths.into_iter().enumerate() {
                let (y1, y2): (Vec<Estimate>, Vec<Estimate>) = sweeps
                    .iter()
                    .map(|s| {
                        let stats = &s.points()[i].statistics;
                        (stats.y1, stats.y2)
                    })
                    .unzip();
                if let (Some(c1), Some(c2)) =
                    (combine_at(gatewidth, &y1)?, combine_at(gatewidth, &y2)?)
                {
                    points.extend(component_ratio(&c1, &c2));
                }
            }
            points
        }
    };
    debug!(?strategy, measurements = sweeps.len(), "r2 aggregated");
    Ok(points)
}
