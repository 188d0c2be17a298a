//! Frozen policies and the per-seat strategy capability.
//!
//! A [`PolicyTable`] is the learned average policy collapsed to one
//! probability vector per infoset. It is what gets written to disk after
//! every round, one infoset per line:
//!
//! ```text
//! # gin-solver average policy
//! discard:2/1/0	0.812500 0.125000 0.062500
//! draw:4/11/0/1	0.930000 0.070000
//! ```
//!
//! A [`Strategy`] is what sits in a seat during a tree walk: the fixed
//! baseline heuristic, the learning regret table, or a frozen table.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::cfr::config::AverageFallback;
use crate::cfr::error::{Result, SolverError};
use crate::cfr::game::Game;
use crate::cfr::infoset::InfosetKey;
use crate::cfr::storage::RegretTable;

/// Allowed deviation from 1.0 for a persisted probability vector.
const SUM_TOLERANCE: f64 = 1e-3;

/// Point-estimate policy: infoset key to per-action probability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    entries: BTreeMap<InfosetKey, Vec<f64>>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the distribution for an infoset.
    pub fn insert(&mut self, key: InfosetKey, probabilities: Vec<f64>) {
        self.entries.insert(key, probabilities);
    }

    /// Distribution stored for an infoset.
    pub fn get(&self, key: &InfosetKey) -> Option<&[f64]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of infosets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&InfosetKey, &[f64])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Render the persisted text form.
    pub fn to_text(&self) -> String {
        let mut out = String::from("# gin-solver average policy\n");
        for (key, probabilities) in &self.entries {
            out.push_str(&key.to_string());
            out.push('\t');
            let probs: Vec<String> = probabilities.iter().map(|p| format!("{:.6}", p)).collect();
            out.push_str(&probs.join(" "));
            out.push('\n');
        }
        out
    }

    /// Parse the persisted text form.
    ///
    /// Malformed lines are skipped and logged; the returned errors list
    /// every skipped line.
    pub fn parse(text: &str) -> (Self, Vec<SolverError>) {
        let mut table = Self::new();
        let mut skipped = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line) {
                Ok((key, _)) if table.entries.contains_key(&key) => {
                    skipped.push(corrupt(index, format!("duplicate key {}", key)));
                }
                Ok((key, probabilities)) => {
                    table.entries.insert(key, probabilities);
                }
                Err(reason) => skipped.push(corrupt(index, reason)),
            }
        }

        for err in &skipped {
            log::warn!("skipping policy line: {}", err);
        }

        (table, skipped)
    }

    fn parse_line(line: &str) -> std::result::Result<(InfosetKey, Vec<f64>), String> {
        let (key, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| "missing probabilities".to_string())?;
        let key: InfosetKey = key.parse().map_err(|e| format!("{}", e))?;

        let probabilities: Vec<f64> = rest
            .split_whitespace()
            .map(|p| p.parse::<f64>().map_err(|_| format!("bad probability `{}`", p)))
            .collect::<std::result::Result<_, _>>()?;

        if probabilities.is_empty() {
            return Err("missing probabilities".to_string());
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err("probabilities must be finite and non-negative".to_string());
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("probabilities sum to {}", sum));
        }

        Ok((key, probabilities))
    }

    /// Write the text form to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Read a text policy from `path`, skipping malformed lines.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text).0)
    }

    /// How far this policy moved from `previous`.
    ///
    /// 100 times the mean L1 distance per infoset. Infosets missing from
    /// `previous` are compared against uniform. Lower means more settled;
    /// infinite when the table is empty.
    pub fn convergence_from(&self, previous: &PolicyTable) -> f64 {
        if self.entries.is_empty() {
            return f64::INFINITY;
        }

        let total: f64 = self
            .entries
            .iter()
            .map(|(key, new)| match previous.get(key) {
                Some(old) if old.len() == new.len() => {
                    new.iter().zip(old).map(|(a, b)| (a - b).abs()).sum::<f64>()
                }
                _ => {
                    let u = 1.0 / new.len() as f64;
                    new.iter().map(|p| (p - u).abs()).sum::<f64>()
                }
            })
            .sum();

        100.0 * total / self.entries.len() as f64
    }
}

fn corrupt(index: usize, reason: String) -> SolverError {
    SolverError::CorruptPersistedTable {
        line: index + 1,
        reason,
    }
}

/// The strategy occupying one seat.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// The game's fixed baseline heuristic.
    Fixed,
    /// Learning from a shared regret table.
    ///
    /// Plays the regret-matched policy while training and the average
    /// policy while evaluating.
    RegretMatching {
        /// Shared accumulators.
        table: Arc<RegretTable>,
        /// Average-policy fallback at unweighted infosets.
        fallback: AverageFallback,
    },
    /// A loaded, non-learning policy. Unknown infosets use the baseline.
    Frozen(Arc<PolicyTable>),
}

impl Strategy {
    /// Learning strategy over `table` with a uniform fallback.
    pub fn learning(table: Arc<RegretTable>) -> Self {
        Strategy::RegretMatching {
            table,
            fallback: AverageFallback::Uniform,
        }
    }

    /// The regret table updated when this seat is traversed in training.
    pub fn regret_table(&self) -> Option<&Arc<RegretTable>> {
        match self {
            Strategy::RegretMatching { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Action distribution at a decision.
    pub fn policy<G: Game>(
        &self,
        game: &G,
        state: &G::State,
        key: &InfosetKey,
        actions: &[G::Action],
        evaluation: bool,
    ) -> Result<Vec<f64>> {
        let n = actions.len();

        match self {
            Strategy::Fixed => Ok(game.baseline_policy(state, actions)),
            Strategy::RegretMatching { table, fallback } => {
                if !evaluation {
                    return table.regret_matched_policy(key, n);
                }
                match fallback {
                    AverageFallback::Uniform => table.average_policy(key, n),
                    AverageFallback::Baseline => {
                        table.average_policy_or(key, n, || game.baseline_policy(state, actions))
                    }
                }
            }
            Strategy::Frozen(policy) => match policy.get(key) {
                Some(p) if p.len() == n => Ok(p.to_vec()),
                Some(p) => Err(SolverError::MalformedInfosetKey {
                    key: key.to_string(),
                    expected: p.len(),
                    found: n,
                }),
                None => Ok(game.baseline_policy(state, actions)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::infoset::DecisionKind;

    fn sample() -> PolicyTable {
        let mut table = PolicyTable::new();
        table.insert(InfosetKey::new(DecisionKind::Draw, &[4, 11, 0, 1]), vec![0.93, 0.07]);
        table.insert(InfosetKey::new(DecisionKind::Discard, &[2, 1, 0]), vec![0.8125, 0.125, 0.0625]);
        table.insert(InfosetKey::new(DecisionKind::Knock, &[3]), vec![1.0 / 3.0, 2.0 / 3.0]);
        table.insert(InfosetKey::new(DecisionKind::Knock, &[0]), vec![1.0]);
        table
    }

    #[test]
    fn test_text_is_sorted_and_readable() {
        let text = sample().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# gin-solver average policy");
        assert_eq!(lines[1], "draw:4/11/0/1\t0.930000 0.070000");
        assert_eq!(lines[2], "discard:2/1/0\t0.812500 0.125000 0.062500");
        assert_eq!(lines[3], "knock:0\t1.000000");
        assert_eq!(lines[4], "knock:3\t0.333333 0.666667");
    }

    #[test]
    fn test_serialize_parse_serialize_is_stable() {
        let first = sample().to_text();
        let (parsed, skipped) = PolicyTable::parse(&first);
        assert!(skipped.is_empty());
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed.to_text(), first);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "\
# header
draw:1/2\t0.5 0.5
draw:1/x\t0.5 0.5
knock:1\t0.5 abc
knock:2\t0.9 0.3
knock:3\t-0.5 1.5
discard:0
bogus line
draw:1/2\t0.25 0.75

knock:4\t0.2 0.8
";
        let (table, skipped) = PolicyTable::parse(text);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(&InfosetKey::new(DecisionKind::Draw, &[1, 2])),
            Some(&[0.5, 0.5][..])
        );
        assert!(table.get(&InfosetKey::new(DecisionKind::Knock, &[4])).is_some());

        let lines: Vec<usize> = skipped
            .iter()
            .map(|e| match e {
                SolverError::CorruptPersistedTable { line, .. } => *line,
                other => panic!("unexpected error {:?}", other),
            })
            .collect();
        assert_eq!(lines, vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("gin-policy-{}.txt", std::process::id()));
        let table = sample();
        table.save(&path).unwrap();
        let loaded = PolicyTable::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.to_text(), table.to_text());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("gin-policy-does-not-exist.txt");
        assert!(matches!(PolicyTable::load(&path), Err(SolverError::Io(_))));
    }

    #[test]
    fn test_convergence_indicator() {
        let table = sample();
        assert_eq!(table.convergence_from(&table), 0.0);
        assert_eq!(PolicyTable::new().convergence_from(&table), f64::INFINITY);

        let mut moved = PolicyTable::new();
        moved.insert(InfosetKey::new(DecisionKind::Knock, &[9]), vec![1.0, 0.0]);
        // unseen before: compared against uniform, |1 - .5| + |0 - .5|
        assert!((moved.convergence_from(&table) - 100.0).abs() < 1e-12);
    }
}
