//! Game trait definition for the self-play engine.
//!
//! The engine never looks inside cards, hands or scores. Everything it needs
//! from the rules engine goes through the `Game` trait below.

use std::fmt::Debug;

use rand::Rng;

use crate::cfr::infoset::DecisionKind;

/// Trait for actions that can be taken in a game.
pub trait Action: Clone + PartialEq + Debug + Send + Sync {
    /// Short display name used in logs.
    fn name(&self) -> String {
        format!("{:?}", self)
    }
}

/// Trait for game states.
///
/// A game state contains all information about the current state of the game,
/// including private information that players may not see.
pub trait GameState: Clone + Debug + Send + Sync {}

/// What the acting player sees at a decision point.
///
/// The engine turns an observation into an [`InfosetKey`] under a
/// [`KeyBucketing`]; the observation itself stays unbucketed.
///
/// [`InfosetKey`]: crate::cfr::infoset::InfosetKey
/// [`KeyBucketing`]: crate::cfr::infoset::KeyBucketing
pub trait Observation {
    /// Kind of the decision being made.
    fn kind(&self) -> DecisionKind;

    /// Raw, unbucketed feature values, at most `MAX_FEATURES` of them.
    fn raw_features(&self) -> &[u16];
}

/// The rules engine consumed by the tree walk.
///
/// # Example
/// ```ignore
/// struct MyGame;
///
/// impl Game for MyGame {
///     type State = MyState;
///     type Action = MyAction;
///     type View = MyView;
///
///     // ... implement required methods
/// }
/// ```
pub trait Game: Clone + Send + Sync {
    /// The type representing a complete game state.
    type State: GameState;

    /// The type representing an action a player can take.
    type Action: Action;

    /// The type representing what the acting player observes.
    type View: Observation;

    /// Create the root state of a fresh hand.
    ///
    /// The root is usually a chance node (the deal).
    fn initial_state(&self) -> Self::State;

    /// Check if the given state is terminal (hand over).
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Payoff for `player` at a terminal state. Zero-sum across the two seats.
    fn payoff(&self, state: &Self::State, player: usize) -> f64;

    /// Index of the player to act, `None` at terminal and chance nodes.
    fn current_player(&self, state: &Self::State) -> Option<usize>;

    /// Ordered legal actions for the player to act.
    ///
    /// Never empty at a non-terminal decision node. The order is part of the
    /// contract: action index `i` must mean the same thing every time the
    /// same infoset is reached.
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Apply an action and return the resulting state.
    fn apply(&self, state: &Self::State, action: &Self::Action) -> Self::State;

    /// What `player` can observe at the current decision.
    fn observe(&self, state: &Self::State, player: usize) -> Self::View;

    /// Check if the current state is a chance node.
    fn is_chance(&self, _state: &Self::State) -> bool {
        false
    }

    /// Sample an outcome from a chance node.
    fn sample_chance<R: Rng>(&self, state: &Self::State, _rng: &mut R) -> Self::State {
        state.clone()
    }

    /// Action count every decision of `kind` offers, if the rules fix one.
    ///
    /// Imported policy entries of another length are skipped. `None` leaves
    /// the kind unchecked.
    fn action_count(&self, _kind: DecisionKind) -> Option<usize> {
        None
    }

    /// Fixed heuristic policy over `actions` at the current decision.
    ///
    /// Used for baseline opponents and as the average-policy prior. Uniform
    /// unless overridden.
    fn baseline_policy(&self, _state: &Self::State, actions: &[Self::Action]) -> Vec<f64> {
        vec![1.0 / actions.len() as f64; actions.len()]
    }
}

/// Macro to simplify implementing the GameState trait.
#[macro_export]
macro_rules! impl_game_state {
    ($type:ty) => {
        impl $crate::cfr::game::GameState for $type {}
    };
}
