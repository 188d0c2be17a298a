//! Configuration options for the trainer.
//!
//! This module provides the configuration struct that controls rounds,
//! worker pool size, infoset bucketing and persistence, plus the statistics
//! the trainer reports.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cfr::infoset::KeyBucketing;

/// What the average policy falls back to at an infoset with no strategy weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AverageFallback {
    /// Uniform over the available actions.
    #[default]
    Uniform,
    /// The game's fixed baseline policy.
    Baseline,
}

/// Configuration for the self-play trainer.
///
/// # Example
/// ```
/// use gin_solver::cfr::TrainerConfig;
///
/// let config = TrainerConfig::default().with_seed(7).with_threads(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Training episodes per round.
    pub iterations_per_round: u64,

    /// Number of rounds `Trainer::run` executes.
    pub rounds: u32,

    /// Evaluation episodes against the baseline at each round boundary.
    ///
    /// Zero skips evaluation.
    pub eval_iterations: u64,

    /// Number of worker threads.
    ///
    /// `None` uses all available cores.
    pub num_threads: Option<usize>,

    /// Random seed for reproducibility.
    ///
    /// With a seed, episode `i` of round `r` always sees the same deal.
    pub seed: Option<u64>,

    /// Number of regret table shards. Must be a power of two.
    pub shards: usize,

    /// Fallback for the average policy at unweighted infosets.
    pub average_fallback: AverageFallback,

    /// Infoset bucketing granularity.
    pub bucketing: KeyBucketing,

    /// Strategy weight given to each imported probability.
    pub import_weight: f64,

    /// Where to write the human-readable average policy after each round.
    pub policy_path: Option<PathBuf>,

    /// Where to write the full regret table checkpoint after each round.
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            iterations_per_round: 10_000,
            rounds: 10,
            eval_iterations: 2_000,
            num_threads: None,
            seed: None,
            shards: 64,
            average_fallback: AverageFallback::Uniform,
            bucketing: KeyBucketing::default(),
            import_weight: 1.0,
            policy_path: None,
            checkpoint_path: None,
        }
    }
}

impl TrainerConfig {
    /// Create a new TrainerConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set episodes per round.
    pub fn with_iterations_per_round(mut self, iterations: u64) -> Self {
        self.iterations_per_round = iterations;
        self
    }

    /// Builder method: set number of rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Builder method: set evaluation episodes per round.
    pub fn with_eval_iterations(mut self, iterations: u64) -> Self {
        self.eval_iterations = iterations;
        self
    }

    /// Builder method: set number of threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method: set the shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Builder method: set the average-policy fallback.
    pub fn with_average_fallback(mut self, fallback: AverageFallback) -> Self {
        self.average_fallback = fallback;
        self
    }

    /// Builder method: set the infoset bucketing.
    pub fn with_bucketing(mut self, bucketing: KeyBucketing) -> Self {
        self.bucketing = bucketing;
        self
    }

    /// Builder method: set persistence paths.
    pub fn with_persistence(
        mut self,
        policy_path: impl Into<PathBuf>,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Self {
        self.policy_path = Some(policy_path.into());
        self.checkpoint_path = Some(checkpoint_path.into());
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 || !self.shards.is_power_of_two() {
            return Err(ConfigError::InvalidShards(self.shards));
        }

        if self.num_threads == Some(0) {
            return Err(ConfigError::InvalidThreads);
        }

        if !(self.import_weight.is_finite() && self.import_weight > 0.0) {
            return Err(ConfigError::InvalidImportWeight(self.import_weight));
        }

        Ok(())
    }
}

/// Errors that can occur when validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Shard count is zero or not a power of two.
    #[error("shard count {0} must be a non-zero power of two")]
    InvalidShards(usize),
    /// Thread count of zero.
    #[error("thread count must be at least 1")]
    InvalidThreads,
    /// Import weight is not a positive finite number.
    #[error("import weight {0} must be positive and finite")]
    InvalidImportWeight(f64),
    /// A game rule parameter is out of range.
    #[error("{0} is out of range: {1}")]
    InvalidRule(&'static str, i64),
}

/// Statistics tracked during training.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainStats {
    /// Training episodes run, aborted ones included.
    pub iterations: u64,

    /// Rounds completed.
    pub rounds: u32,

    /// Episodes aborted by an engine error.
    pub aborted_episodes: u64,

    /// Number of information sets discovered.
    pub info_sets: usize,

    /// Total time spent training (in seconds).
    pub elapsed_seconds: f64,

    /// Episodes per second.
    pub iterations_per_second: f64,

    /// Sum of sampled terminal utilities for the traversing seat.
    pub utility_sum: f64,

    /// Sum of root estimates (`utility * tail`).
    pub estimate_sum: f64,

    /// One entry per evaluation at a round boundary.
    pub evaluation_history: Vec<EvaluationPoint>,
}

/// A single evaluation against the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationPoint {
    /// Round that just finished.
    pub round: u32,
    /// Training episodes completed so far.
    pub iteration: u64,
    /// Average payoff of the learned policy against the baseline.
    ///
    /// `None` when evaluation is disabled.
    pub average_utility: Option<f64>,
    /// Change of the average policy since the previous round.
    ///
    /// `None` until there is a non-empty policy to compare.
    pub convergence: Option<f64>,
}

impl TrainStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update episodes per second based on elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.iterations_per_second = self.iterations as f64 / self.elapsed_seconds;
        }
    }

    /// Episodes that ran to completion.
    pub fn completed(&self) -> u64 {
        self.iterations.saturating_sub(self.aborted_episodes)
    }

    /// Mean sampled utility of the traversing seat.
    pub fn mean_utility(&self) -> f64 {
        match self.completed() {
            0 => 0.0,
            n => self.utility_sum / n as f64,
        }
    }

    /// Mean root estimate.
    pub fn mean_estimate(&self) -> f64 {
        match self.completed() {
            0 => 0.0,
            n => self.estimate_sum / n as f64,
        }
    }

    /// Most recent evaluation, if any.
    pub fn last_evaluation(&self) -> Option<&EvaluationPoint> {
        self.evaluation_history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TrainerConfig::default().with_shards(12);
        assert_eq!(config.validate(), Err(ConfigError::InvalidShards(12)));

        let config = TrainerConfig::default().with_threads(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidThreads));

        let mut config = TrainerConfig::default();
        config.import_weight = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidImportWeight(_))));
    }

    #[test]
    fn test_config_json_fills_defaults() {
        let config: TrainerConfig =
            serde_json::from_str(r#"{ "rounds": 3, "seed": 11 }"#).unwrap();
        assert_eq!(config.rounds, 3);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.shards, 64);
        assert_eq!(config.bucketing, KeyBucketing::default());
    }

    #[test]
    fn test_stats_means() {
        let mut stats = TrainStats::new();
        assert_eq!(stats.mean_utility(), 0.0);
        stats.iterations = 4;
        stats.utility_sum = 10.0;
        stats.estimate_sum = 2.0;
        assert_eq!(stats.mean_utility(), 2.5);
        assert_eq!(stats.mean_estimate(), 0.5);

        stats.aborted_episodes = 2;
        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.mean_utility(), 5.0);
    }
}
