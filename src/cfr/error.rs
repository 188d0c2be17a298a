//! Error types for the self-play engine.
//!
//! Episode-level errors abort only the episode that raised them. Persistence
//! errors are reported by the trainer and training continues in memory.

use thiserror::Error;

use crate::cfr::config::ConfigError;

/// Errors raised by the regret table, the tree walk and persistence.
#[derive(Debug, Error)]
pub enum SolverError {
    /// An infoset key was queried or updated with an action count that does
    /// not match the count it was first recorded with.
    #[error("infoset {key} has {expected} actions but {found} were offered")]
    MalformedInfosetKey {
        /// Textual form of the offending key.
        key: String,
        /// Action count stored for the key.
        expected: usize,
        /// Action count offered by the caller.
        found: usize,
    },

    /// A line of a persisted policy table could not be parsed.
    #[error("corrupt policy table at line {line}: {reason}")]
    CorruptPersistedTable {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A non-terminal decision node offered no legal actions.
    #[error("no legal actions for player {player} at a non-terminal decision")]
    EmptyLegalActionSet {
        /// The player who was supposed to act.
        player: usize,
    },

    /// Filesystem failure while persisting or loading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint (de)serialization failure.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] serde_json::Error),

    /// A checkpoint entry whose accumulators are empty or of unequal length.
    #[error("corrupt checkpoint entry {key}: {regrets} regrets, {weights} weights")]
    CorruptCheckpoint {
        /// Textual form of the offending key.
        key: String,
        /// Length of the regret vector.
        regrets: usize,
        /// Length of the strategy-weight vector.
        weights: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SolverError>;
