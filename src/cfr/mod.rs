//! Outcome-sampling regret minimization engine.
//!
//! The engine learns approximate equilibrium policies for two-player
//! zero-sum games from self-play. It knows nothing about any particular game:
//! the rules come in through the [`Game`] trait and every decision point is
//! reduced to an [`InfosetKey`].
//!
//! # Overview
//!
//! Each training episode walks one sampled path from the root:
//! 1. At every decision, the acting seat's regret-matched policy picks one action
//! 2. At the terminal, the traverser's payoff travels back up with the product
//!    of the sampled probabilities below each node
//! 3. At the traverser's decisions, importance-weighted regrets are queued and
//!    committed once the episode succeeds
//!
//! The reported strategy is the reach-weighted average of the played policies.
//!
//! # Theory
//!
//! **Regret Matching**: play actions in proportion to their positive regret.
//! ```text
//! σ(a) = max(0, R(a)) / Σ max(0, R(a'))
//! ```
//!
//! **Sampled regret**: with a single sampled action `a*` and utility `u`,
//! ```text
//! r(a) = π · (1[a = a*] · u / σ(a*) - u)
//! ```
//! is an unbiased estimate of the counterfactual regret, where `π` is the
//! traverser's reach weight.
//!
//! # References
//!
//! - Zinkevich, M., et al. "Regret Minimization in Games with Incomplete Information" (2007)
//! - Lanctot, M., et al. "Monte Carlo Sampling for Regret Minimization in Extensive Games" (2009)

pub mod config;
pub mod error;
pub mod game;
pub mod infoset;
pub mod policy;
pub mod storage;
pub mod trainer;
pub mod walker;

pub use config::{AverageFallback, ConfigError, EvaluationPoint, TrainStats, TrainerConfig};
pub use error::{Result, SolverError};
pub use game::{Action, Game, GameState, Observation};
pub use infoset::{DecisionKind, InfosetKey, KeyBucketing};
pub use policy::{PolicyTable, Strategy};
pub use storage::{RegretEntry, RegretTable, RegretUpdate, TableSnapshot};
pub use trainer::{Checkpoint, Trainer};
pub use walker::{ActionCandidate, EpisodeResult, TreeWalker};
