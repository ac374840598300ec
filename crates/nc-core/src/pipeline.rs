//! End-to-end Feynman and Rossi analyses driven by an [`AnalysisConfig`].
//!
//! Reports are plain serializable records. Fit and physics failures become
//! explicit `rejected` entries carrying the structured error, so a report
//! never contains numbers derived from a rejected fit. Input errors still
//! abort the run.

use nc_common::{DecayModel, ErrorCategory, EventStream, Result, RossiHistogram, StructuredError};
use nc_config::{AnalysisConfig, FeynmanStatistic};
use serde::Serialize;
use tracing::debug;

use crate::alpha::{combine_fit, CombinedAlpha};
use crate::binning::{RossiBinning, RossiWindow, Sequential};
use crate::calculator::HistogramCalculator;
use crate::fit::{DecayFitEngine, FitResult};
use crate::sweep::{Curve, FeynmanSweep};

/// Either a usable value or the reason there is none.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(StructuredError),
}

impl<T> Outcome<T> {
    /// Keep fit and physics failures as `Rejected`; propagate the rest.
    pub fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(value) => Ok(Outcome::Accepted(value)),
            Err(err) if matches!(err.category(), ErrorCategory::Fit | ErrorCategory::Physics) => {
                debug!(code = err.code(), error = %err, "outcome rejected");
                Ok(Outcome::Rejected(StructuredError::from(&err)))
            }
            Err(err) => Err(err),
        }
    }

    pub fn accepted(&self) -> Option<&T> {
        match self {
            Outcome::Accepted(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// Feynman-Y analysis of one event stream.
#[derive(Debug, Clone, Serialize)]
pub struct FeynmanReport {
    pub events: usize,
    pub duration: f64,
    pub statistic: FeynmanStatistic,
    pub model: DecayModel,
    pub sweep: FeynmanSweep,
    pub curve: Curve,
    /// Whether the fit used `curve.sigma` as weights.
    pub weighted: bool,
    pub fit: Outcome<FitResult>,
}

/// Rossi-alpha analysis of one event stream.
#[derive(Debug, Clone, Serialize)]
pub struct RossiReport {
    pub events: usize,
    pub duration: f64,
    pub model: DecayModel,
    pub histogram: RossiHistogram,
    pub fit: Outcome<FitResult>,
    /// Present for accepted `exp_two` fits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<Outcome<CombinedAlpha>>,
}

/// Bin every gate width, analyze, and fit the configured statistic.
///
/// The fit is weighted by the propagated uncertainties of the statistic.
/// It falls back to an unweighted fit when any gate width has a zero or
/// non-finite uncertainty.
pub fn run_feynman(events: EventStream, config: &AnalysisConfig) -> Result<FeynmanReport> {
    let calculator = HistogramCalculator::from_config(events, &config.stream);
    let feynman = &config.feynman;
    let widths = feynman.resolved_gate_widths();
    debug!(
        events = calculator.events().len(),
        gate_widths = widths.len(),
        model = %feynman.model,
        "feynman analysis started"
    );

    let sweep = FeynmanSweep::run(&calculator, &Sequential::new(feynman.empty_gates), &widths)?;
    let curve = sweep.curve(feynman.statistic);
    let engine = DecayFitEngine::from_config(&config.fit)?;
    let weights = curve.weights();
    if weights.is_none() {
        debug!("some gate widths lack a usable uncertainty, fitting unweighted");
    }
    let fit = Outcome::from_result(engine.fit_weighted(
        feynman.model,
        &curve.x,
        &curve.y,
        weights,
        feynman.guess.as_deref(),
    ))?;
    let weighted = weights.is_some();

    debug!(accepted = fit.is_accepted(), weighted, "feynman analysis finished");
    Ok(FeynmanReport {
        events: calculator.events().len(),
        duration: calculator.events().duration(),
        statistic: feynman.statistic,
        model: feynman.model,
        sweep,
        curve,
        weighted,
        fit,
    })
}

/// Build the Rossi histogram, fit it, and combine two-term rates.
pub fn run_rossi(events: EventStream, config: &AnalysisConfig) -> Result<RossiReport> {
    let calculator = HistogramCalculator::from_config(events, &config.stream);
    let rossi = &config.rossi;
    debug!(
        events = calculator.events().len(),
        reset_time = rossi.reset_time,
        binning = %rossi.binning,
        model = %rossi.model,
        "rossi analysis started"
    );

    let binning = RossiBinning::new(rossi.binning, rossi.pairing);
    let histogram = calculator.histogram(
        &binning,
        &RossiWindow::new(rossi.reset_time, rossi.number_bins),
    )?;
    let (x, y) = match rossi.fit_range {
        Some([min, max]) => histogram.windowed(min, max),
        None => (
            histogram.bin_centers().to_vec(),
            histogram.frequency().to_vec(),
        ),
    };

    let engine = DecayFitEngine::from_config(&config.fit)?;
    let fit = Outcome::from_result(engine.fit(rossi.model, &x, &y, rossi.guess.as_deref()))?;
    let alpha = match fit.accepted() {
        Some(result) if result.model == DecayModel::ExpTwo => {
            Some(Outcome::from_result(combine_fit(result))?)
        }
        _ => None,
    };

    debug!(accepted = fit.is_accepted(), "rossi analysis finished");
    Ok(RossiReport {
        events: calculator.events().len(),
        duration: calculator.events().duration(),
        model: rossi.model,
        histogram,
        fit,
        alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_common::{Error, Event, RejectReason};

    #[test]
    fn fit_errors_become_rejections() {
        let err: Result<()> = Err(Error::FitRejected {
            model: "exp_two",
            reason: RejectReason::SingularCovariance,
        });
        let outcome = Outcome::from_result(err).unwrap();
        assert!(!outcome.is_accepted());
        match outcome {
            Outcome::Rejected(e) => assert_eq!(e.code, 21),
            Outcome::Accepted(_) => panic!("expected rejection"),
        }

        let physics: Result<()> = Err(Error::PhysicallyInvalidRoot {
            detail: "none".into(),
        });
        assert!(Outcome::from_result(physics).is_ok());
    }

    #[test]
    fn input_errors_propagate() {
        let err: Result<()> = Err(Error::invalid_input("bad"));
        assert!(Outcome::from_result(err).is_err());
    }

    #[test]
    fn rejected_outcome_serializes_with_status() {
        let outcome: Outcome<FitResult> = Outcome::from_result(Err(Error::FitNotConverged {
            model: "log_one",
            iterations: 3,
        }))
        .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["code"], 20);
    }

    #[test]
    fn sparse_stream_reports_rejected_fit() {
        // Five events give too few usable points for any fit.
        let events = EventStream::new(vec![
            Event::new(0.0, 1),
            Event::new(1.0, 1),
            Event::new(2.0, 1),
            Event::new(10.0, 1),
            Event::new(11.0, 1),
        ])
        .unwrap();
        let mut config = AnalysisConfig::default();
        config.feynman.gate_widths = Some(vec![1.0, 5.0]);
        let report = run_feynman(events, &config).unwrap();
        assert_eq!(report.events, 5);
        assert_eq!(report.sweep.len(), 2);
        assert!(!report.fit.is_accepted());
    }

    #[test]
    fn zero_sigma_curve_is_fitted_unweighted() {
        // every 10 ns gate holds exactly two events, so Y has no spread
        let events = EventStream::from_pairs((0..200).map(|i| (5.0 * i as f64, 1))).unwrap();
        let mut config = AnalysisConfig::default();
        config.feynman.gate_widths = Some(vec![10.0, 20.0, 40.0]);
        let report = run_feynman(events, &config).unwrap();
        assert!(report.curve.sigma.iter().any(|s| *s == 0.0));
        assert!(!report.weighted);
    }
}
