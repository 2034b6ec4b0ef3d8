//! Per-call training hyperparameters.

use comembed_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hyperparameters for one [`train_walk`](crate::SkipGramUpdater::train_walk) call.
///
/// Nothing here is persistent state: a driver typically decays
/// `learning_rate` between calls and rebuilds the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// SGD step size (alpha).
    pub learning_rate: f32,
    /// Negative samples per (target, context) pair.
    pub negative_samples: usize,
    /// Window radius on each side of a position.
    pub window_size: usize,
    /// Weight of the negative-sampling term.
    pub lambda1: f32,
    /// Weight of the community term. `0.0` disables it.
    pub lambda2: f32,
    /// Table draws allowed per pair before giving up with `SamplingExhausted`.
    pub max_draws_per_pair: usize,
    /// Probabilities are clamped to `[prob_floor, 1 - prob_floor]` before `ln`.
    pub prob_floor: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.025,
            negative_samples: 5,
            window_size: 5,
            lambda1: 1.0,
            lambda2: 0.0,
            max_draws_per_pair: 10_000,
            prob_floor: 1e-7,
        }
    }
}

impl TrainConfig {
    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_negative_samples(mut self, n: usize) -> Self {
        self.negative_samples = n;
        self
    }

    pub fn with_window_size(mut self, window: usize) -> Self {
        self.window_size = window;
        self
    }

    pub fn with_lambda1(mut self, lambda1: f32) -> Self {
        self.lambda1 = lambda1;
        self
    }

    pub fn with_lambda2(mut self, lambda2: f32) -> Self {
        self.lambda2 = lambda2;
        self
    }

    pub fn with_max_draws_per_pair(mut self, draws: usize) -> Self {
        self.max_draws_per_pair = draws;
        self
    }

    pub fn with_prob_floor(mut self, floor: f32) -> Self {
        self.prob_floor = floor;
        self
    }

    /// Whether the community term participates.
    pub fn community_enabled(&self) -> bool {
        self.lambda2 > 0.0
    }

    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.negative_samples == 0 {
            return Err(Error::InvalidConfig(
                "negative_samples must be at least 1".into(),
            ));
        }
        if !self.lambda1.is_finite() {
            return Err(Error::InvalidConfig("lambda1 must be finite".into()));
        }
        if !(self.lambda2.is_finite() && self.lambda2 >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "lambda2 must be non-negative, got {}",
                self.lambda2
            )));
        }
        if self.max_draws_per_pair < self.negative_samples {
            return Err(Error::InvalidConfig(format!(
                "max_draws_per_pair ({}) is below negative_samples ({})",
                self.max_draws_per_pair, self.negative_samples
            )));
        }
        if !(self.prob_floor > 0.0 && self.prob_floor < 0.5) {
            return Err(Error::InvalidConfig(format!(
                "prob_floor must lie in (0, 0.5), got {}",
                self.prob_floor
            )));
        }
        Ok(())
    }
}
