//! Parallel self-play trainer.
//!
//! The trainer owns the shared [`RegretTable`] and a fixed rayon pool. Each
//! round runs a batch of independent episodes, then freezes training to
//! evaluate the average policy against the baseline and persist it:
//!
//! ```text
//! round r:
//!   train      episodes run in parallel, each committing its own updates
//!   evaluate   average policy vs baseline, seats alternating, read-only
//!   persist    policy text + JSON checkpoint (failures are logged)
//! ```
//!
//! Episode `i` uses its own `StdRng` derived from the seed and `i`, so a
//! seeded single-threaded run is fully reproducible.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::cfr::config::{EvaluationPoint, TrainStats, TrainerConfig};
use crate::cfr::error::Result;
use crate::cfr::game::Game;
use crate::cfr::policy::{PolicyTable, Strategy};
use crate::cfr::storage::{RegretTable, TableSnapshot};
use crate::cfr::walker::TreeWalker;

/// RNG stream for training episodes; evaluation uses `EVAL_STREAM + round`.
const TRAIN_STREAM: u64 = 0;
const EVAL_STREAM: u64 = 1;

fn episode_rng(seed: u64, stream: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.rotate_left(40) ^ index)
}

/// Sums over a batch of episodes.
#[derive(Debug, Clone, Copy, Default)]
struct BatchTotals {
    completed: u64,
    aborted: u64,
    utility: f64,
    estimate: f64,
}

impl BatchTotals {
    fn merge(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            aborted: self.aborted + other.aborted,
            utility: self.utility + other.utility,
            estimate: self.estimate + other.estimate,
        }
    }
}

/// Everything needed to resume training.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Statistics at the time of the checkpoint.
    pub stats: TrainStats,
    /// Raw accumulators.
    pub table: TableSnapshot,
}

impl Checkpoint {
    /// Write the checkpoint as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a checkpoint written by [`Checkpoint::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Self-play trainer for a two-player game.
///
/// # Example
/// ```ignore
/// use gin_solver::cfr::{Trainer, TrainerConfig};
/// use gin_solver::games::gin::GinRummy;
///
/// let config = TrainerConfig::default().with_rounds(5).with_seed(1);
/// let mut trainer = Trainer::new(GinRummy::new(), config)?;
/// let stats = trainer.run();
/// println!("{} infosets after {} episodes", stats.info_sets, stats.iterations);
/// ```
pub struct Trainer<G: Game> {
    game: G,
    config: TrainerConfig,
    table: Arc<RegretTable>,
    pool: ThreadPool,
    stats: TrainStats,
    seed: u64,
    previous_policy: PolicyTable,
}

impl<G: Game> Trainer<G> {
    /// Create a trainer with an empty regret table.
    pub fn new(game: G, config: TrainerConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = config.num_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        log::debug!(
            "trainer ready: {} threads, {} shards, seed {}",
            pool.current_num_threads(),
            config.shards,
            seed
        );

        Ok(Self {
            table: Arc::new(RegretTable::with_shards(config.shards)),
            game,
            config,
            pool,
            stats: TrainStats::new(),
            seed,
            previous_policy: PolicyTable::new(),
        })
    }

    /// The game being trained.
    pub fn game(&self) -> &G {
        &self.game
    }

    /// Trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The shared regret table.
    pub fn table(&self) -> &Arc<RegretTable> {
        &self.table
    }

    /// Statistics so far.
    pub fn stats(&self) -> &TrainStats {
        &self.stats
    }

    /// Worker threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// The learning strategy over the shared table.
    pub fn learner(&self) -> Strategy {
        Strategy::RegretMatching {
            table: Arc::clone(&self.table),
            fallback: self.config.average_fallback,
        }
    }

    /// Run `iterations` self-play episodes on the worker pool.
    ///
    /// The traversing seat alternates with the episode index. An episode that
    /// fails is logged, counted and leaves the table untouched.
    pub fn train(&mut self, iterations: u64) -> &TrainStats {
        let start = Instant::now();
        let first = self.stats.iterations;
        let learner = self.learner();
        let game = &self.game;
        let bucketing = &self.config.bucketing;
        let seed = self.seed;

        let totals = self.pool.install(|| {
            (first..first + iterations)
                .into_par_iter()
                .map(|index| {
                    let mut rng = episode_rng(seed, TRAIN_STREAM, index);
                    let traverser = (index % 2) as usize;
                    let mut walker = TreeWalker::new(game, bucketing, [&learner, &learner], traverser);

                    match walker.run_episode(&game.initial_state(), &mut rng) {
                        Ok(result) => BatchTotals {
                            completed: 1,
                            utility: result.scaled_utility,
                            estimate: result.estimate(),
                            ..Default::default()
                        },
                        Err(e) => {
                            log::error!("episode {} aborted: {}", index, e);
                            BatchTotals {
                                aborted: 1,
                                ..Default::default()
                            }
                        }
                    }
                })
                .reduce(BatchTotals::default, BatchTotals::merge)
        });

        self.stats.iterations += iterations;
        self.stats.aborted_episodes += totals.aborted;
        self.stats.utility_sum += totals.utility;
        self.stats.estimate_sum += totals.estimate;
        self.stats.info_sets = self.table.num_infosets();
        self.stats.elapsed_seconds += start.elapsed().as_secs_f64();
        self.stats.update_rate();

        log::debug!(
            "trained {} episodes ({} aborted), {} infosets",
            iterations,
            totals.aborted,
            self.stats.info_sets
        );

        &self.stats
    }

    /// Mean payoff of the average policy against `baseline`.
    ///
    /// The learner takes seat 0 on even episodes and seat 1 on odd ones.
    /// Nothing is written to the regret table.
    pub fn evaluate(&self, iterations: u64, baseline: &Strategy) -> f64 {
        let learner = self.learner();
        let game = &self.game;
        let bucketing = &self.config.bucketing;
        let seed = self.seed;
        let stream = EVAL_STREAM + self.stats.rounds as u64;

        let totals = self.pool.install(|| {
            (0..iterations)
                .into_par_iter()
                .map(|index| {
                    let mut rng = episode_rng(seed, stream, index);
                    let seat = (index % 2) as usize;
                    let players = if seat == 0 { [&learner, baseline] } else { [baseline, &learner] };
                    let mut walker = TreeWalker::new(game, bucketing, players, seat).evaluating();

                    match walker.run_episode(&game.initial_state(), &mut rng) {
                        Ok(result) => BatchTotals {
                            completed: 1,
                            utility: result.scaled_utility,
                            ..Default::default()
                        },
                        Err(e) => {
                            log::error!("evaluation episode {} aborted: {}", index, e);
                            BatchTotals {
                                aborted: 1,
                                ..Default::default()
                            }
                        }
                    }
                })
                .reduce(BatchTotals::default, BatchTotals::merge)
        });

        if totals.completed == 0 {
            0.0
        } else {
            totals.utility / totals.completed as f64
        }
    }

    /// The learned average policy.
    pub fn export_policy(&self) -> PolicyTable {
        self.table.export_policy()
    }

    /// Seed the table's strategy weights from a persisted policy.
    ///
    /// Each probability adds `import_weight * p` to its action's weight.
    /// Entries whose length disagrees with [`Game::action_count`] for their
    /// decision kind are skipped with a warning. Returns the number of
    /// infosets seeded.
    pub fn import_policy(&mut self, policy: PolicyTable) -> usize {
        let mut accepted = PolicyTable::new();
        for (key, probabilities) in policy.iter() {
            match self.game.action_count(key.kind()) {
                Some(n) if n != probabilities.len() => {
                    log::warn!("not importing {}: {} actions, the game offers {}", key, probabilities.len(), n);
                }
                _ => accepted.insert(*key, probabilities.to_vec()),
            }
        }

        let seeded = self.table.seed_from_policy(&accepted, self.config.import_weight);
        self.stats.info_sets = self.table.num_infosets();
        log::info!("imported {} of {} infosets", seeded, policy.len());
        seeded
    }

    /// Current state as a checkpoint.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            stats: self.stats.clone(),
            table: self.table.snapshot(),
        }
    }

    /// Replace the table and statistics with a checkpoint.
    ///
    /// A corrupt checkpoint is rejected and the trainer keeps its state.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.table.restore(checkpoint.table)?;
        self.stats = checkpoint.stats;
        self.stats.info_sets = self.table.num_infosets();
        self.previous_policy = self.table.export_policy();
        Ok(())
    }

    /// Load a checkpoint file and resume from it.
    pub fn resume(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::load(path)?;
        self.restore(checkpoint)?;
        log::info!(
            "resumed from {} at round {} ({} infosets)",
            path.display(),
            self.stats.rounds,
            self.stats.info_sets
        );
        Ok(())
    }

    fn persist(&self, policy: &PolicyTable) -> Result<()> {
        if let Some(path) = &self.config.policy_path {
            policy.save(path)?;
            log::debug!("wrote policy to {}", path.display());
        }
        if let Some(path) = &self.config.checkpoint_path {
            self.checkpoint().save(path)?;
            log::debug!("wrote checkpoint to {}", path.display());
        }
        Ok(())
    }

    /// Train one round, evaluate against the baseline and persist.
    ///
    /// A persistence failure is logged and training state is kept in memory.
    pub fn run_round(&mut self) -> EvaluationPoint {
        let round = self.stats.rounds + 1;
        self.train(self.config.iterations_per_round);

        let average_utility = if self.config.eval_iterations > 0 {
            Some(self.evaluate(self.config.eval_iterations, &Strategy::Fixed))
        } else {
            None
        };

        let policy = self.export_policy();
        let convergence = Some(policy.convergence_from(&self.previous_policy)).filter(|c| c.is_finite());

        let point = EvaluationPoint {
            round,
            iteration: self.stats.iterations,
            average_utility,
            convergence,
        };
        self.stats.rounds = round;
        self.stats.evaluation_history.push(point.clone());

        log::info!(
            "round {}: {} episodes, {} infosets, vs baseline {}, convergence {}",
            round,
            self.stats.iterations,
            self.stats.info_sets,
            average_utility.map_or("-".to_string(), |u| format!("{:+.4}", u)),
            convergence.map_or("-".to_string(), |c| format!("{:.3}", c)),
        );

        if let Err(e) = self.persist(&policy) {
            log::warn!("round {} not persisted: {}", round, e);
        }
        self.previous_policy = policy;

        point
    }

    /// Run every configured round with a progress bar.
    pub fn run(&mut self) -> &TrainStats {
        let progress = ProgressBar::new(self.config.rounds as u64);
        if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} rounds {msg}") {
            progress.set_style(style);
        }

        for _ in 0..self.config.rounds {
            let point = self.run_round();
            if let Some(u) = point.average_utility {
                progress.set_message(format!("vs baseline {:+.4}", u));
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        &self.stats
    }
}
