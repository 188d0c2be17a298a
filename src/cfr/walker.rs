//! Outcome-sampling tree walk.
//!
//! One call to [`TreeWalker::run_episode`] plays a single hand from the root,
//! sampling exactly one action at every decision and one outcome at every
//! chance node. On the way back up it returns a `(utility, tail)` pair and,
//! for the traversing seat during training, queues importance-weighted
//! regret updates that are written to the regret table only once the whole
//! episode has succeeded.
//!
//! The pair is never collapsed inside the recursion. The consumer at the
//! root multiplies once via [`EpisodeResult::estimate`].

use rand::Rng;

use crate::cfr::error::{Result, SolverError};
use crate::cfr::game::{Action, Game};
use crate::cfr::infoset::{InfosetKey, KeyBucketing};
use crate::cfr::policy::Strategy;
use crate::cfr::storage::RegretUpdate;

/// One choice offered at a decision point.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCandidate<A> {
    /// The action.
    pub action: A,
    /// Infoset of the decision that produced it.
    pub key: InfosetKey,
    /// Probability the acting strategy assigns to it.
    pub probability: f64,
}

/// Result of one tree walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    /// Terminal utility from the traversing seat's point of view.
    pub scaled_utility: f64,
    /// Product of the probabilities of every sampled action below the caller.
    pub tail_reach_probability: f64,
}

impl EpisodeResult {
    /// Result at a terminal node.
    pub fn terminal(payoff: f64) -> Self {
        Self {
            scaled_utility: payoff,
            tail_reach_probability: 1.0,
        }
    }

    /// Single-episode estimate consumed at the root.
    ///
    /// A zero tail contributes nothing rather than propagating NaN.
    pub fn estimate(&self) -> f64 {
        if self.tail_reach_probability > 0.0 {
            self.scaled_utility * self.tail_reach_probability
        } else {
            0.0
        }
    }
}

/// Recursive evaluator for one episode.
///
/// The walker borrows the game and both seats' strategies. It is cheap to
/// build; workers create one per episode.
pub struct TreeWalker<'a, G: Game> {
    game: &'a G,
    bucketing: &'a KeyBucketing,
    players: [&'a Strategy; 2],
    traverser: usize,
    evaluation: bool,
    pending: Vec<RegretUpdate>,
}

impl<'a, G: Game> TreeWalker<'a, G> {
    /// Create a training walker for `traverser`.
    pub fn new(game: &'a G, bucketing: &'a KeyBucketing, players: [&'a Strategy; 2], traverser: usize) -> Self {
        debug_assert!(traverser < 2, "two-player games only");
        Self {
            game,
            bucketing,
            players,
            traverser,
            evaluation: false,
            pending: Vec::new(),
        }
    }

    /// Switch to evaluation: average policies, no regret updates.
    pub fn evaluating(mut self) -> Self {
        self.evaluation = true;
        self
    }

    /// Seat whose payoff is measured and whose infosets are updated.
    pub fn traverser(&self) -> usize {
        self.traverser
    }

    /// Play one episode from `root` and commit its regret updates.
    ///
    /// If the walk fails, nothing is written to the regret table.
    pub fn run_episode<R: Rng>(&mut self, root: &G::State, rng: &mut R) -> Result<EpisodeResult> {
        self.pending.clear();
        let result = self.play_from(root, 1.0, rng);

        match result {
            Ok(result) => {
                self.commit()?;
                Ok(result)
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    /// Recursive walk from `state` with the traverser's reach weight.
    ///
    /// Regret updates are queued, not applied; call
    /// [`TreeWalker::run_episode`] to walk and commit together.
    pub fn play_from<R: Rng>(&mut self, state: &G::State, reach: f64, rng: &mut R) -> Result<EpisodeResult> {
        if self.game.is_terminal(state) {
            return Ok(EpisodeResult::terminal(self.game.payoff(state, self.traverser)));
        }

        // Chance outcomes do not change the reach weight.
        if self.game.is_chance(state) {
            let next = self.game.sample_chance(state, rng);
            return self.play_from(&next, reach, rng);
        }

        let player = match self.game.current_player(state) {
            Some(p) => p,
            None => return Ok(EpisodeResult::terminal(self.game.payoff(state, self.traverser))),
        };

        let candidates = self.candidates(state, player)?;
        let chosen = sample_index(candidates.iter().map(|c| c.probability), rng);
        let sampled = &candidates[chosen];
        log::trace!("seat {} plays {} at {}", player, sampled.action.name(), sampled.key);

        let next = self.game.apply(state, &sampled.action);
        let child = self.play_from(&next, reach, rng)?;

        if player == self.traverser && !self.evaluation && self.players[player].regret_table().is_some() {
            self.queue_regrets(&candidates, chosen, child.scaled_utility, reach);
        }

        Ok(EpisodeResult {
            scaled_utility: child.scaled_utility,
            tail_reach_probability: child.tail_reach_probability * sampled.probability,
        })
    }

    /// Legal actions at a decision, tagged with the infoset key and the
    /// acting strategy's probabilities.
    pub fn candidates(&self, state: &G::State, player: usize) -> Result<Vec<ActionCandidate<G::Action>>> {
        let actions = self.game.legal_actions(state);
        if actions.is_empty() {
            return Err(SolverError::EmptyLegalActionSet { player });
        }

        let view = self.game.observe(state, player);
        let key = InfosetKey::encode(&view, self.bucketing);
        let policy = self.players[player].policy(self.game, state, &key, &actions, self.evaluation)?;

        if policy.len() != actions.len() {
            return Err(SolverError::MalformedInfosetKey {
                key: key.to_string(),
                expected: actions.len(),
                found: policy.len(),
            });
        }

        Ok(actions
            .into_iter()
            .zip(policy)
            .map(|(action, probability)| ActionCandidate {
                action,
                key,
                probability,
            })
            .collect())
    }

    /// Importance-weighted regrets from the single sampled trajectory.
    ///
    /// The sampled action's value is estimated as `u / σ(a*)`, every other
    /// action's as zero, and the node's as `u`; each action's regret is its
    /// estimate minus the node's, scaled by `reach`.
    fn queue_regrets(&mut self, candidates: &[ActionCandidate<G::Action>], chosen: usize, utility: f64, reach: f64) {
        let sampled_probability = candidates[chosen].probability;
        let num_actions = candidates.len();

        for (i, candidate) in candidates.iter().enumerate() {
            let action_value = if i == chosen { utility / sampled_probability } else { 0.0 };
            self.pending.push(RegretUpdate {
                key: candidate.key,
                num_actions,
                action: i,
                regret: reach * (action_value - utility),
                probability: candidate.probability,
                reach,
            });
        }
    }

    /// Write the queued updates as one all-or-nothing batch.
    fn commit(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        match self.players[self.traverser].regret_table() {
            Some(table) => table.update_batch(&pending),
            None => Ok(()),
        }
    }
}

/// Sample an index according to a probability distribution.
///
/// Never returns an index whose probability is zero, even when rounding
/// leaves the cumulative sum short of the draw.
pub fn sample_index<R: Rng>(probabilities: impl Iterator<Item = f64>, rng: &mut R) -> usize {
    let r: f64 = rng.gen();
    let mut cumsum = 0.0;
    let mut last_positive = 0;

    for (i, prob) in probabilities.enumerate() {
        if prob > 0.0 {
            last_positive = i;
        }
        cumsum += prob;
        if r < cumsum && prob > 0.0 {
            return i;
        }
    }

    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::game::{Action, Observation};
    use crate::cfr::infoset::DecisionKind;
    use crate::cfr::policy::PolicyTable;
    use crate::cfr::storage::RegretTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pick(usize);

    impl Action for Pick {}

    #[derive(Debug, Clone, PartialEq)]
    struct ToyState {
        stage: u8,
        picked: usize,
        coin: f64,
    }

    crate::impl_game_state!(ToyState);

    struct ToyView([u16; 1]);

    impl Observation for ToyView {
        fn kind(&self) -> DecisionKind {
            DecisionKind::Knock
        }

        fn raw_features(&self) -> &[u16] {
            &self.0
        }
    }

    /// Player 0 picks one of `payoffs.len()` actions, optionally after a
    /// coin flip that scales the payoff by ±1.
    #[derive(Debug, Clone)]
    struct ToyGame {
        payoffs: Vec<f64>,
        baseline: Vec<f64>,
        chance: bool,
        broken: bool,
    }

    impl ToyGame {
        fn new(payoffs: Vec<f64>) -> Self {
            let n = payoffs.len();
            Self {
                payoffs,
                baseline: vec![1.0 / n as f64; n],
                chance: false,
                broken: false,
            }
        }
    }

    // stage 0 chance, 1 decision, 2 dead end, 3 terminal
    impl Game for ToyGame {
        type State = ToyState;
        type Action = Pick;
        type View = ToyView;

        fn initial_state(&self) -> ToyState {
            ToyState {
                stage: if self.chance { 0 } else { 1 },
                picked: 0,
                coin: 1.0,
            }
        }

        fn is_terminal(&self, state: &ToyState) -> bool {
            state.stage == 3
        }

        fn payoff(&self, state: &ToyState, player: usize) -> f64 {
            let p0 = self.payoffs[state.picked] * state.coin;
            if player == 0 {
                p0
            } else {
                -p0
            }
        }

        fn current_player(&self, state: &ToyState) -> Option<usize> {
            match state.stage {
                1 => Some(0),
                2 => Some(1),
                _ => None,
            }
        }

        fn legal_actions(&self, state: &ToyState) -> Vec<Pick> {
            match state.stage {
                1 => (0..self.payoffs.len()).map(Pick).collect(),
                _ => Vec::new(),
            }
        }

        fn apply(&self, state: &ToyState, action: &Pick) -> ToyState {
            ToyState {
                stage: if self.broken { 2 } else { 3 },
                picked: action.0,
                coin: state.coin,
            }
        }

        fn observe(&self, state: &ToyState, _player: usize) -> ToyView {
            ToyView([if state.coin > 0.0 { 1 } else { 0 }])
        }

        fn is_chance(&self, state: &ToyState) -> bool {
            state.stage == 0
        }

        fn sample_chance<R: Rng>(&self, _state: &ToyState, rng: &mut R) -> ToyState {
            ToyState {
                stage: 1,
                picked: 0,
                coin: if rng.gen::<bool>() { 1.0 } else { -1.0 },
            }
        }

        fn baseline_policy(&self, _state: &ToyState, _actions: &[Pick]) -> Vec<f64> {
            self.baseline.clone()
        }
    }

    fn bucketing() -> KeyBucketing {
        KeyBucketing::exact()
    }

    #[test]
    fn test_estimate_multiplies_once() {
        let result = EpisodeResult {
            scaled_utility: 10.0,
            tail_reach_probability: 0.4,
        };
        assert!((result.estimate() - 4.0).abs() < 1e-12);

        let unreachable = EpisodeResult {
            scaled_utility: 10.0,
            tail_reach_probability: 0.0,
        };
        assert_eq!(unreachable.estimate(), 0.0);
    }

    #[test]
    fn test_tail_carries_sampled_probability() {
        let mut game = ToyGame::new(vec![10.0, 10.0]);
        game.baseline = vec![0.4, 0.6];
        let fixed = Strategy::Fixed;
        let b = bucketing();
        let mut seen_first = false;

        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut walker = TreeWalker::new(&game, &b, [&fixed, &fixed], 0);
            let result = walker.run_episode(&game.initial_state(), &mut rng).unwrap();
            assert_eq!(result.scaled_utility, 10.0);

            let tail = result.tail_reach_probability;
            assert!(tail == 0.4 || tail == 0.6, "tail {}", tail);
            if tail == 0.4 {
                seen_first = true;
                assert!((result.estimate() - 4.0).abs() < 1e-12);
            }
        }
        assert!(seen_first);
    }

    #[test]
    fn test_training_learns_dominant_action() {
        let game = ToyGame::new(vec![1.0, 0.0]);
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 0);
            walker.run_episode(&game.initial_state(), &mut rng).unwrap();
        }

        let key = InfosetKey::new(DecisionKind::Knock, &[1]);
        let current = table.regret_matched_policy(&key, 2).unwrap();
        let average = table.average_policy(&key, 2).unwrap();
        assert_eq!(current, vec![1.0, 0.0]);
        assert!(average[0] > 0.9, "average {:?}", average);
    }

    #[test]
    fn test_first_update_matches_importance_weights() {
        let game = ToyGame::new(vec![1.0, 0.0]);
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let key = InfosetKey::new(DecisionKind::Knock, &[1]);

        let mut rng = StdRng::seed_from_u64(11);
        let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 0);
        let result = walker.run_episode(&game.initial_state(), &mut rng).unwrap();
        let entry = table.entry(&key).unwrap();

        if result.scaled_utility == 1.0 {
            // picked action 0 at 0.5: value 1 / 0.5 = 2, node value 1
            assert_eq!(entry.cumulative_regret, vec![1.0, -1.0]);
        } else {
            assert_eq!(entry.cumulative_regret, vec![0.0, 0.0]);
        }
        assert_eq!(entry.cumulative_strategy_weight, vec![0.5, 0.5]);
        assert_eq!(result.tail_reach_probability, 0.5);
    }

    #[test]
    fn test_single_action_has_no_regret() {
        let game = ToyGame::new(vec![7.0]);
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..10 {
            let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 0);
            let result = walker.run_episode(&game.initial_state(), &mut rng).unwrap();
            assert_eq!(result.tail_reach_probability, 1.0);
            assert_eq!(result.estimate(), 7.0);
        }

        let key = InfosetKey::new(DecisionKind::Knock, &[1]);
        let entry = table.entry(&key).unwrap();
        assert_eq!(entry.cumulative_regret, vec![0.0]);
        assert_eq!(entry.cumulative_strategy_weight, vec![10.0]);
        assert_eq!(table.regret_matched_policy(&key, 1).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_opponent_seat_is_not_updated() {
        let game = ToyGame::new(vec![1.0, 0.0]);
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(9);

        // only player 0 ever acts, so traversing seat 1 writes nothing
        let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 1);
        let result = walker.run_episode(&game.initial_state(), &mut rng).unwrap();
        assert!(result.scaled_utility <= 0.0);
        assert_eq!(table.num_infosets(), 0);
    }

    #[test]
    fn test_evaluation_writes_nothing() {
        let game = ToyGame::new(vec![1.0, 0.0]);
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let fixed = Strategy::Fixed;
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let mut walker = TreeWalker::new(&game, &b, [&learner, &fixed], 0).evaluating();
            walker.run_episode(&game.initial_state(), &mut rng).unwrap();
        }
        assert_eq!(table.num_infosets(), 0);
    }

    #[test]
    fn test_chance_node_keeps_tail() {
        let mut game = ToyGame::new(vec![3.0]);
        game.chance = true;
        let fixed = Strategy::Fixed;
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(21);
        let mut outcomes = Vec::new();

        for _ in 0..32 {
            let mut walker = TreeWalker::new(&game, &b, [&fixed, &fixed], 0);
            let result = walker.run_episode(&game.initial_state(), &mut rng).unwrap();
            assert_eq!(result.tail_reach_probability, 1.0);
            outcomes.push(result.scaled_utility);
        }
        assert!(outcomes.contains(&3.0) && outcomes.contains(&-3.0));
    }

    #[test]
    fn test_empty_action_set_aborts_without_writing() {
        let mut game = ToyGame::new(vec![1.0, 2.0]);
        game.broken = true;
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(2);

        let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 0);
        let err = walker.run_episode(&game.initial_state(), &mut rng).unwrap_err();
        assert!(matches!(err, SolverError::EmptyLegalActionSet { player: 1 }));
        assert_eq!(table.num_infosets(), 0);
    }

    /// Player 0 decides twice under the same key, first from two actions and
    /// then from three.
    #[derive(Debug, Clone)]
    struct RepeatGame;

    impl Game for RepeatGame {
        type State = ToyState;
        type Action = Pick;
        type View = ToyView;

        fn initial_state(&self) -> ToyState {
            ToyState {
                stage: 0,
                picked: 0,
                coin: 1.0,
            }
        }

        fn is_terminal(&self, state: &ToyState) -> bool {
            state.stage == 2
        }

        fn payoff(&self, state: &ToyState, player: usize) -> f64 {
            let p0 = state.picked as f64;
            if player == 0 {
                p0
            } else {
                -p0
            }
        }

        fn current_player(&self, state: &ToyState) -> Option<usize> {
            if state.stage < 2 {
                Some(0)
            } else {
                None
            }
        }

        fn legal_actions(&self, state: &ToyState) -> Vec<Pick> {
            match state.stage {
                0 => (0..2).map(Pick).collect(),
                1 => (0..3).map(Pick).collect(),
                _ => Vec::new(),
            }
        }

        fn apply(&self, state: &ToyState, action: &Pick) -> ToyState {
            ToyState {
                stage: state.stage + 1,
                picked: action.0,
                coin: state.coin,
            }
        }

        fn observe(&self, _state: &ToyState, _player: usize) -> ToyView {
            ToyView([0])
        }
    }

    #[test]
    fn test_inconsistent_action_counts_write_nothing() {
        let game = RepeatGame;
        let table = Arc::new(RegretTable::new());
        let learner = Strategy::learning(Arc::clone(&table));
        let b = bucketing();

        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut walker = TreeWalker::new(&game, &b, [&learner, &learner], 0);
            let err = walker.run_episode(&game.initial_state(), &mut rng).unwrap_err();
            assert!(matches!(err, SolverError::MalformedInfosetKey { .. }), "{:?}", err);
            assert_eq!(table.num_infosets(), 0);
        }
    }

    #[test]
    fn test_frozen_policy_mismatch_is_malformed() {
        let game = ToyGame::new(vec![1.0, 2.0]);
        let mut policy = PolicyTable::new();
        policy.insert(InfosetKey::new(DecisionKind::Knock, &[1]), vec![0.2, 0.3, 0.5]);
        let frozen = Strategy::Frozen(Arc::new(policy));
        let b = bucketing();
        let mut rng = StdRng::seed_from_u64(4);

        let mut walker = TreeWalker::new(&game, &b, [&frozen, &frozen], 0);
        let err = walker.run_episode(&game.initial_state(), &mut rng).unwrap_err();
        assert!(matches!(err, SolverError::MalformedInfosetKey { expected: 3, found: 2, .. }));
    }

    #[test]
    fn test_candidates_carry_key_and_probability() {
        let mut game = ToyGame::new(vec![1.0, 2.0, 3.0]);
        game.baseline = vec![0.2, 0.3, 0.5];
        let fixed = Strategy::Fixed;
        let b = bucketing();
        let walker = TreeWalker::new(&game, &b, [&fixed, &fixed], 0);

        let candidates = walker.candidates(&game.initial_state(), 0).unwrap();
        assert_eq!(candidates.len(), 3);
        let key = InfosetKey::new(DecisionKind::Knock, &[1]);
        assert!(candidates.iter().all(|c| c.key == key));
        assert_eq!(candidates[2].action, Pick(2));
        assert_eq!(candidates[2].probability, 0.5);
    }

    #[test]
    fn test_sample_index_skips_zero_probabilities() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..1000 {
            let i = sample_index([0.0, 0.3, 0.0, 0.7, 0.0].into_iter(), &mut rng);
            assert!(i == 1 || i == 3);
        }
        // rounding shortfall falls back to the last positive entry
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..1000 {
            let i = sample_index([0.2, 0.1, 0.0].into_iter(), &mut rng);
            assert!(i == 0 || i == 1);
        }
    }
}
