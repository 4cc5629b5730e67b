//! Built-in baseline forecasters.
//!
//! These run in-process with no external dependencies. They ignore
//! covariates and give every run a reference point next to the auto-models.

use tracing::debug;

use super::{Forecaster, OracleError, OracleSpec};
use crate::frame::{FutureFrame, TrainingFrame};

/// Repeats the last observed target.
#[derive(Debug, Clone, Default)]
pub struct Naive {
    last: Option<f64>,
}

impl Naive {
    pub const NAME: &'static str = "Naive";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Forecaster for Naive {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fit(&mut self, train: &TrainingFrame, _spec: &OracleSpec) -> Result<(), OracleError> {
        self.last = Some(*train.y.last().ok_or(OracleError::EmptyTraining)?);
        Ok(())
    }

    fn predict(&self, _futr: &FutureFrame, horizon: usize) -> Result<Vec<f64>, OracleError> {
        let last = self.last.ok_or(OracleError::NotFitted)?;
        Ok(vec![last; horizon])
    }
}

/// Mean of the last `k` targets, with `k` tuned over the search space's
/// `input_size` candidates.
///
/// Each candidate is scored by one-step-ahead mean absolute error over the
/// validation tail; candidates too long to cover every validation point are
/// skipped. Ties go to the shorter window.
#[derive(Debug, Clone, Default)]
pub struct WindowAverage {
    window: Option<usize>,
    forecast: Option<f64>,
}

impl WindowAverage {
    pub const NAME: &'static str = "WindowAverage";

    pub fn new() -> Self {
        Self::default()
    }

    /// Window chosen by the last fit.
    pub fn window(&self) -> Option<usize> {
        self.window
    }
}

/// One-step-ahead MAE of a `k`-window mean over the last `val_size` points.
fn validation_mae(y: &[f64], k: usize, val_size: usize) -> f64 {
    let n = y.len();
    let errors: f64 = (n - val_size..n)
        .map(|t| (mean(&y[t - k..t]) - y[t]).abs())
        .sum();
    errors / val_size as f64
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pick a window length. Falls back to the shortest candidate, capped at the
/// series length, when nothing can be validated.
pub fn select_window(y: &[f64], candidates: &[usize], val_size: usize) -> usize {
    let n = y.len();
    let mut best: Option<(usize, f64)> = None;
    if val_size > 0 && val_size < n {
        for &k in candidates {
            if k == 0 || k > n - val_size {
                continue;
            }
            let mae = validation_mae(y, k, val_size);
            let better = match best {
                None => true,
                Some((bk, bm)) => mae < bm || (mae == bm && k < bk),
            };
            if better {
                best = Some((k, mae));
            }
        }
    }
    match best {
        Some((k, _)) => k,
        None => candidates
            .iter()
            .copied()
            .filter(|&k| k > 0)
            .min()
            .unwrap_or(1)
            .min(n)
            .max(1),
    }
}

impl Forecaster for WindowAverage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fit(&mut self, train: &TrainingFrame, spec: &OracleSpec) -> Result<(), OracleError> {
        if train.y.is_empty() {
            return Err(OracleError::EmptyTraining);
        }
        let k = select_window(&train.y, &spec.search.input_size, spec.val_size);
        debug!(model = Self::NAME, window = k, "selected input window");
        self.window = Some(k);
        self.forecast = Some(mean(&train.y[train.y.len() - k..]));
        Ok(())
    }

    fn predict(&self, _futr: &FutureFrame, horizon: usize) -> Result<Vec<f64>, OracleError> {
        let forecast = self.forecast.ok_or(OracleError::NotFitted)?;
        Ok(vec![forecast; horizon])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::oracle::{Frequency, SearchSpace};
    use chrono::NaiveDate;

    fn train(y: &[f64]) -> TrainingFrame {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        TrainingFrame {
            unique_id: "1".into(),
            ds: (0..y.len())
                .map(|i| start + chrono::Months::new(3 * i as u32))
                .collect(),
            y: y.to_vec(),
            exog: Frame::empty(y.len()),
        }
    }

    fn futr() -> FutureFrame {
        FutureFrame {
            unique_id: "1".into(),
            ds: vec![NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()],
            exog: Frame::empty(1),
        }
    }

    fn spec(candidates: Vec<usize>, val_size: usize) -> OracleSpec {
        OracleSpec {
            horizon: 1,
            frequency: Frequency::Quarterly,
            hist_exog: vec![],
            futr_exog: vec![],
            search: SearchSpace {
                input_size: candidates,
                ..SearchSpace::default()
            },
            num_samples: 1,
            val_size,
        }
    }

    #[test]
    fn naive_repeats_last_value() {
        let mut m = Naive::new();
        m.fit(&train(&[1.0, 2.0, 5.0]), &spec(vec![4], 0)).unwrap();
        assert_eq!(m.predict(&futr(), 2).unwrap(), vec![5.0, 5.0]);
    }

    #[test]
    fn unfitted_models_refuse_to_predict() {
        assert!(matches!(Naive::new().predict(&futr(), 1), Err(OracleError::NotFitted)));
        assert!(matches!(
            WindowAverage::new().predict(&futr(), 1),
            Err(OracleError::NotFitted)
        ));
    }

    #[test]
    fn short_window_wins_on_trending_series() {
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(select_window(&y, &[8, 4, 2], 4), 2);
    }

    #[test]
    fn long_window_wins_on_noisy_flat_series() {
        let y: Vec<f64> = (0..24).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        // Even windows average to zero; a window of 1 chases the noise.
        assert_eq!(select_window(&y, &[1, 2], 4), 2);
    }

    #[test]
    fn ties_prefer_shorter_window() {
        let y = vec![3.0; 12];
        assert_eq!(select_window(&y, &[8, 4], 2), 4);
    }

    #[test]
    fn falls_back_when_nothing_validates() {
        assert_eq!(select_window(&[1.0, 2.0, 3.0], &[8, 4], 0), 3);
        assert_eq!(select_window(&[1.0, 2.0, 3.0], &[8, 2], 2), 2);
        assert_eq!(select_window(&[1.0], &[], 0), 1);
    }

    #[test]
    fn window_average_forecasts_trailing_mean() {
        let mut m = WindowAverage::new();
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        m.fit(&train(&y), &spec(vec![4], 4)).unwrap();
        assert_eq!(m.window(), Some(4));
        assert_eq!(m.predict(&futr(), 1).unwrap(), vec![17.5]);
    }
}
