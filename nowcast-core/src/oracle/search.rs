//! Hyperparameter search space passed to the oracle.

use serde::{Deserialize, Serialize};

/// Candidate values for each tuned hyperparameter.
///
/// The external bridge forwards this verbatim to the auto-model search. The
/// built-in `WindowAverage` model tunes only over `input_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    /// Candidate input window lengths, in periods.
    pub input_size: Vec<usize>,
    /// Candidate training step budgets.
    pub max_steps: Vec<usize>,
    /// Candidate scaling methods.
    pub scaler_type: Vec<String>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            input_size: vec![4, 8, 12, 16, 20],
            max_steps: vec![1000],
            scaler_type: vec!["robust".to_string()],
        }
    }
}

impl SearchSpace {
    /// Name of the first empty candidate list, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        if self.input_size.is_empty() {
            Some("input_size")
        } else if self.max_steps.is_empty() {
            Some("max_steps")
        } else if self.scaler_type.is_empty() {
            Some("scaler_type")
        } else {
            None
        }
    }
}
