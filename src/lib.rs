//! # Gin Solver
//!
//! Approximate-equilibrium policies for gin rummy's draw, discard and knock
//! decisions, learned by outcome-sampling regret minimization over
//! self-play.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gin_solver::cfr::{Trainer, TrainerConfig};
//! use gin_solver::games::gin::GinRummy;
//!
//! let mut trainer = Trainer::new(GinRummy::new(), TrainerConfig::default())?;
//! trainer.run();
//! trainer.export_policy().save("policy.txt")?;
//! ```
//!
//! ## Modules
//!
//! - [`cfr`]: game-agnostic engine (infoset keys, regret table, tree walk, trainer)
//! - [`games`]: rules engines (gin rummy)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Trainer: rayon pool, rounds, evaluation, persistence      │
//! └───────────────────────────────────────────────────────────┘
//!          │ many independent episodes
//!          ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │ TreeWalker: sample one path, queue regrets, commit        │
//! └───────────────────────────────────────────────────────────┘
//!          │ reads policies / commits updates
//!          ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │ RegretTable: sharded RwLock<FxHashMap<InfosetKey, ..>>    │
//! └───────────────────────────────────────────────────────────┘
//!          ▲
//!          │ implements Game trait
//! ┌───────────────────────────────────────────────────────────┐
//! │ GinRummy: deal, melds, deadwood, knock scoring            │
//! └───────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

/// Self-play regret minimization engine.
///
/// Generic over any two-player game implementing [`cfr::Game`].
pub mod cfr;

/// Game implementations.
pub mod games;

pub use cfr::{Action, Game, GameState, InfosetKey, PolicyTable, Trainer, TrainerConfig};
