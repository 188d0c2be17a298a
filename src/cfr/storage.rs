//! Storage for cumulative regrets and strategy weights.
//!
//! The table is split into independently locked shards keyed by the infoset
//! hash, so workers touching different infosets almost never contend and two
//! workers touching the same infoset are serialized by its shard lock.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use crate::cfr::error::{Result, SolverError};
use crate::cfr::infoset::InfosetKey;
use crate::cfr::policy::PolicyTable;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 64;

/// Accumulators for one information set, one slot per action index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegretEntry {
    /// Cumulative counterfactual regret per action.
    pub cumulative_regret: Vec<f64>,
    /// Cumulative reach-weighted strategy per action.
    pub cumulative_strategy_weight: Vec<f64>,
}

impl RegretEntry {
    fn zeros(num_actions: usize) -> Self {
        Self {
            cumulative_regret: vec![0.0; num_actions],
            cumulative_strategy_weight: vec![0.0; num_actions],
        }
    }

    fn num_actions(&self) -> usize {
        self.cumulative_regret.len()
    }

    fn is_well_formed(&self) -> bool {
        !self.cumulative_regret.is_empty() && self.cumulative_regret.len() == self.cumulative_strategy_weight.len()
    }

    fn regret_matched(&self) -> Vec<f64> {
        let positive: Vec<f64> = self.cumulative_regret.iter().map(|&r| r.max(0.0)).collect();
        let sum: f64 = positive.iter().sum();

        if sum > 0.0 {
            positive.iter().map(|&r| r / sum).collect()
        } else {
            uniform(self.num_actions())
        }
    }

    fn average(&self) -> Option<Vec<f64>> {
        let total: f64 = self.cumulative_strategy_weight.iter().sum();
        if total > 0.0 {
            Some(self.cumulative_strategy_weight.iter().map(|&w| w / total).collect())
        } else {
            None
        }
    }
}

/// One queued accumulation, as passed to [`RegretTable::update_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegretUpdate {
    /// Infoset being updated.
    pub key: InfosetKey,
    /// Action count at the infoset.
    pub num_actions: usize,
    /// Action index.
    pub action: usize,
    /// Regret to add.
    pub regret: f64,
    /// Probability the acting strategy gave the action.
    pub probability: f64,
    /// Reach weight of the decision.
    pub reach: f64,
}

/// Uniform distribution over `n` actions.
pub fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

type Shard = RwLock<FxHashMap<InfosetKey, RegretEntry>>;

/// Thread-safe, sharded regret table.
///
/// This is the only state shared between training workers. Every public
/// method takes `&self`; share it behind an `Arc`.
#[derive(Debug)]
pub struct RegretTable {
    shards: Box<[Shard]>,
    mask: usize,
}

impl Default for RegretTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RegretTable {
    /// Create an empty table with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create an empty table with `shards` shards, rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count)
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            mask: count - 1,
        }
    }

    fn shard_index(&self, key: &InfosetKey) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        hasher.finish() as usize & self.mask
    }

    fn shard(&self, key: &InfosetKey) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn check_actions(key: &InfosetKey, entry: &RegretEntry, num_actions: usize) -> Result<()> {
        if entry.num_actions() == num_actions {
            Ok(())
        } else {
            Err(SolverError::MalformedInfosetKey {
                key: key.to_string(),
                expected: entry.num_actions(),
                found: num_actions,
            })
        }
    }

    /// Current strategy for an infoset by regret matching.
    ///
    /// Each action gets a share proportional to its positive cumulative
    /// regret; uniform when no action has positive regret or the infoset
    /// has never been seen.
    pub fn regret_matched_policy(&self, key: &InfosetKey, num_actions: usize) -> Result<Vec<f64>> {
        let shard = self.shard(key).read();

        match shard.get(key) {
            Some(entry) => {
                Self::check_actions(key, entry, num_actions)?;
                Ok(entry.regret_matched())
            }
            None => Ok(uniform(num_actions)),
        }
    }

    /// Time-averaged strategy for an infoset, uniform when unweighted.
    pub fn average_policy(&self, key: &InfosetKey, num_actions: usize) -> Result<Vec<f64>> {
        self.average_policy_or(key, num_actions, || uniform(num_actions))
    }

    /// Time-averaged strategy for an infoset, `prior()` when unweighted.
    pub fn average_policy_or<F>(&self, key: &InfosetKey, num_actions: usize, prior: F) -> Result<Vec<f64>>
    where
        F: FnOnce() -> Vec<f64>,
    {
        let average = {
            let shard = self.shard(key).read();
            match shard.get(key) {
                Some(entry) => {
                    Self::check_actions(key, entry, num_actions)?;
                    entry.average()
                }
                None => None,
            }
        };

        Ok(average.unwrap_or_else(prior))
    }

    /// Accumulate one action's regret and strategy weight.
    ///
    /// Adds `regret` to the action's cumulative regret and
    /// `probability * reach_weight` to its cumulative strategy weight.
    /// The entry is created with zeros on first use.
    pub fn update(
        &self,
        key: &InfosetKey,
        num_actions: usize,
        action: usize,
        regret: f64,
        probability: f64,
        reach_weight: f64,
    ) -> Result<()> {
        if action >= num_actions {
            return Err(SolverError::MalformedInfosetKey {
                key: key.to_string(),
                expected: num_actions,
                found: action + 1,
            });
        }

        let mut shard = self.shard(key).write();
        let entry = shard
            .entry(*key)
            .or_insert_with(|| RegretEntry::zeros(num_actions));
        Self::check_actions(key, entry, num_actions)?;

        entry.cumulative_regret[action] += regret;
        entry.cumulative_strategy_weight[action] += probability * reach_weight;
        Ok(())
    }

    /// Apply a batch of updates all-or-nothing.
    ///
    /// Every shard the batch touches is write-locked, in index order, while
    /// the batch is checked: each key must carry one action count throughout
    /// the batch and match its stored entry, and each action index must be in
    /// range. On any failure the table is left unchanged.
    pub fn update_batch(&self, updates: &[RegretUpdate]) -> Result<()> {
        let mut counts: FxHashMap<InfosetKey, usize> = FxHashMap::default();
        for update in updates {
            if update.action >= update.num_actions {
                return Err(SolverError::MalformedInfosetKey {
                    key: update.key.to_string(),
                    expected: update.num_actions,
                    found: update.action + 1,
                });
            }
            let expected = *counts.entry(update.key).or_insert(update.num_actions);
            if expected != update.num_actions {
                return Err(SolverError::MalformedInfosetKey {
                    key: update.key.to_string(),
                    expected,
                    found: update.num_actions,
                });
            }
        }

        let mut touched = vec![false; self.shards.len()];
        for key in counts.keys() {
            touched[self.shard_index(key)] = true;
        }
        let mut guards: Vec<Option<RwLockWriteGuard<'_, FxHashMap<InfosetKey, RegretEntry>>>> = self
            .shards
            .iter()
            .zip(&touched)
            .map(|(shard, &t)| if t { Some(shard.write()) } else { None })
            .collect();

        for (key, &num_actions) in &counts {
            if let Some(shard) = &guards[self.shard_index(key)] {
                if let Some(entry) = shard.get(key) {
                    Self::check_actions(key, entry, num_actions)?;
                }
            }
        }

        for update in updates {
            if let Some(shard) = guards[self.shard_index(&update.key)].as_mut() {
                let entry = shard
                    .entry(update.key)
                    .or_insert_with(|| RegretEntry::zeros(update.num_actions));
                entry.cumulative_regret[update.action] += update.regret;
                entry.cumulative_strategy_weight[update.action] += update.probability * update.reach;
            }
        }
        Ok(())
    }

    /// Raw accumulators for one infoset.
    pub fn entry(&self, key: &InfosetKey) -> Option<RegretEntry> {
        self.shard(key).read().get(key).cloned()
    }

    /// Get the number of information sets stored.
    pub fn num_infosets(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Check if an infoset exists in the table.
    pub fn contains(&self, key: &InfosetKey) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Number of shards.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Estimated memory used by the accumulators, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .map(|e| std::mem::size_of::<InfosetKey>() + 2 * e.num_actions() * std::mem::size_of::<f64>())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    /// Average policy of every infoset, collapsed to a point estimate.
    pub fn export_policy(&self) -> PolicyTable {
        let mut table = PolicyTable::new();

        for shard in self.shards.iter() {
            for (key, entry) in shard.read().iter() {
                let probabilities = entry.average().unwrap_or_else(|| uniform(entry.num_actions()));
                table.insert(*key, probabilities);
            }
        }

        table
    }

    /// Add `weight * p` strategy weight for every probability in `policy`.
    ///
    /// Infosets already present with a different action count are skipped
    /// with a warning. Returns the number of infosets seeded.
    pub fn seed_from_policy(&self, policy: &PolicyTable, weight: f64) -> usize {
        let mut seeded = 0;

        for (key, probabilities) in policy.iter() {
            let mut shard = self.shard(key).write();
            let entry = shard
                .entry(*key)
                .or_insert_with(|| RegretEntry::zeros(probabilities.len()));

            if let Err(e) = Self::check_actions(key, entry, probabilities.len()) {
                log::warn!("not seeding {}: {}", key, e);
                continue;
            }

            for (w, &p) in entry.cumulative_strategy_weight.iter_mut().zip(probabilities) {
                *w += weight * p;
            }
            seeded += 1;
        }

        seeded
    }

    /// Copy of every accumulator, for checkpointing.
    pub fn snapshot(&self) -> TableSnapshot {
        let mut entries = BTreeMap::new();
        for shard in self.shards.iter() {
            for (key, entry) in shard.read().iter() {
                entries.insert(*key, entry.clone());
            }
        }
        TableSnapshot { entries }
    }

    /// Replace the table contents with a snapshot.
    ///
    /// A snapshot holding an empty entry, or one whose regret and weight
    /// vectors differ in length, is rejected and the table is left as it was.
    pub fn restore(&self, snapshot: TableSnapshot) -> Result<()> {
        if let Some((key, entry)) = snapshot.entries.iter().find(|(_, e)| !e.is_well_formed()) {
            return Err(SolverError::CorruptCheckpoint {
                key: key.to_string(),
                regrets: entry.cumulative_regret.len(),
                weights: entry.cumulative_strategy_weight.len(),
            });
        }

        self.clear();
        for (key, entry) in snapshot.entries {
            self.shard(&key).write().insert(key, entry);
        }
        Ok(())
    }
}

/// Serializable copy of a regret table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Accumulators keyed by infoset, in key order.
    pub entries: BTreeMap<InfosetKey, RegretEntry>,
}
