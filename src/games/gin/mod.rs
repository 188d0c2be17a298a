//! Two-player gin rummy.
//!
//! ## Game Rules
//!
//! - 52 cards, ten dealt to each player, one turned face up
//! - A turn: draw (stock or face-up card), discard, then optionally knock
//!   if deadwood is at most the knock limit
//! - A card just taken from the discard pile may not be thrown back
//! - Knocking with zero deadwood is gin: bonus plus the defender's deadwood,
//!   no layoffs
//! - Otherwise the defender lays off onto the knocker's melds; the knocker
//!   scores the difference if strictly lower, else the defender scores the
//!   undercut bonus plus the difference
//! - The hand is drawn once the stock is down to its floor
//!
//! ## Decision Abstraction
//!
//! ```text
//! Draw     [stock, upcard]          deadwood, upcard rank, improvement, turn
//! Discard  [best k discards]        best deadwood, gap to 2nd, turn
//! Knock    [play on, knock]         deadwood, turn, opponent pickups
//! ```
//!
//! Discard actions are the `discard_options` throws leaving the least
//! deadwood, in ascending order, so action `i` always means "the i-th best
//! throw" at every discard infoset.

pub mod baseline;
pub mod card;
pub mod config;
pub mod melds;
pub mod state;

use rand::Rng;

use crate::cfr::game::Game;
use crate::cfr::infoset::DecisionKind;

pub use card::{shuffled_deck, Card, Hand};
pub use config::GinConfig;
pub use melds::{best_melds, deadwood, defender_deadwood, lay_off, MeldSolution};
pub use state::{GinAction, GinState, GinView, Outcome, OutcomeKind, Phase};

/// Rank feature used when the discard pile is empty.
const NO_UPCARD: u16 = 13;

/// Gin rummy rules engine.
#[derive(Debug, Clone, Default)]
pub struct GinRummy {
    config: GinConfig,
}

impl GinRummy {
    /// Create a game with the standard rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a game with custom rules.
    pub fn with_config(config: GinConfig) -> Self {
        Self { config }
    }

    /// Rule parameters.
    pub fn config(&self) -> &GinConfig {
        &self.config
    }

    /// Offered discards with their resulting deadwood, best first.
    pub fn discard_options(&self, state: &GinState) -> Vec<(Card, u16)> {
        let hand = state.acting_hand();
        let mut options: Vec<(Card, u16)> = hand
            .iter()
            .filter(|&c| Some(c) != state.taken_upcard)
            .map(|c| (c, deadwood(hand.without(c))))
            .collect();

        options.sort_by_key(|&(card, dw)| (dw, card));
        options.truncate(self.config.discard_options);
        options
    }

    /// How much taking `upcard` (and then discarding well) lowers deadwood.
    pub fn upcard_improvement(hand: Hand, upcard: Card) -> u16 {
        let current = deadwood(hand);
        let after = melds::best_discard_deadwood(hand.with(upcard), Some(upcard)).unwrap_or(current);
        current.saturating_sub(after)
    }

    fn end_turn(&self, state: &mut GinState) {
        state.turn = state.turn.saturating_add(1);
        state.to_act = 1 - state.to_act;
        state.taken_upcard = None;

        if state.stock.len() <= self.config.stock_floor {
            state.phase = Phase::Over;
            state.outcome = Some(Outcome::drawn());
        } else {
            state.phase = Phase::Draw;
        }
    }

    /// Score a knock by `knocker`.
    pub fn resolve_knock(&self, state: &GinState, knocker: usize) -> Outcome {
        let defender = 1 - knocker;
        let knock = best_melds(state.hands[knocker]);

        if knock.deadwood == 0 {
            return Outcome {
                kind: OutcomeKind::Gin,
                winner: Some(knocker),
                points: self.config.gin_bonus + deadwood(state.hands[defender]),
            };
        }

        let left = defender_deadwood(state.hands[defender], &knock.melds);
        if knock.deadwood < left {
            Outcome {
                kind: OutcomeKind::Knock,
                winner: Some(knocker),
                points: left - knock.deadwood,
            }
        } else {
            Outcome {
                kind: OutcomeKind::Undercut,
                winner: Some(defender),
                points: self.config.undercut_bonus + (knock.deadwood - left),
            }
        }
    }
}

impl Game for GinRummy {
    type State = GinState;
    type Action = GinAction;
    type View = GinView;

    fn initial_state(&self) -> GinState {
        GinState::default()
    }

    fn is_terminal(&self, state: &GinState) -> bool {
        state.phase == Phase::Over
    }

    fn payoff(&self, state: &GinState, player: usize) -> f64 {
        let outcome = match state.outcome {
            Some(outcome) => outcome,
            None => return 0.0,
        };
        let points = outcome.points as f64 / self.config.payoff_scale;

        match outcome.winner {
            Some(w) if w == player => points,
            Some(_) => -points,
            None => 0.0,
        }
    }

    fn current_player(&self, state: &GinState) -> Option<usize> {
        match state.phase {
            Phase::Draw | Phase::Discard | Phase::Knock => Some(state.to_act),
            Phase::Deal | Phase::Over => None,
        }
    }

    fn legal_actions(&self, state: &GinState) -> Vec<GinAction> {
        match state.phase {
            Phase::Draw if state.discard_pile.is_empty() => vec![GinAction::Draw(false)],
            Phase::Draw => vec![GinAction::Draw(false), GinAction::Draw(true)],
            Phase::Discard => self
                .discard_options(state)
                .into_iter()
                .map(|(card, _)| GinAction::Discard(card))
                .collect(),
            Phase::Knock => vec![GinAction::Knock(false), GinAction::Knock(true)],
            Phase::Deal | Phase::Over => Vec::new(),
        }
    }

    fn apply(&self, state: &GinState, action: &GinAction) -> GinState {
        let mut next = state.clone();
        let player = state.to_act;

        match *action {
            GinAction::Draw(from_pile) => {
                let drawn = if from_pile {
                    next.discard_pile.pop()
                } else {
                    next.stock.pop()
                };
                match drawn {
                    Some(card) => {
                        next.hands[player].insert(card);
                        if from_pile {
                            next.taken_upcard = Some(card);
                            next.pickups[player] = next.pickups[player].saturating_add(1);
                        }
                        next.phase = Phase::Discard;
                    }
                    None => {
                        next.phase = Phase::Over;
                        next.outcome = Some(Outcome::drawn());
                    }
                }
            }
            GinAction::Discard(card) => {
                debug_assert!(state.hands[player].contains(card), "discarding a card not held");
                next.hands[player].remove(card);
                next.discard_pile.push(card);
                next.taken_upcard = None;

                if deadwood(next.hands[player]) <= self.config.knock_limit {
                    next.phase = Phase::Knock;
                } else {
                    self.end_turn(&mut next);
                }
            }
            GinAction::Knock(true) => {
                next.outcome = Some(self.resolve_knock(&next, player));
                next.phase = Phase::Over;
            }
            GinAction::Knock(false) => self.end_turn(&mut next),
        }

        next
    }

    fn observe(&self, state: &GinState, player: usize) -> GinView {
        let hand = state.hands[player];
        let turn = state.turn;

        match state.phase {
            Phase::Draw => {
                let current = deadwood(hand);
                let (rank, improvement) = match state.upcard() {
                    Some(up) => (up.rank() as u16, Self::upcard_improvement(hand, up)),
                    None => (NO_UPCARD, 0),
                };
                GinView::new(DecisionKind::Draw, &[current, rank, improvement, turn])
            }
            Phase::Discard => {
                let options = self.discard_options(state);
                let best = options.first().map_or(0, |&(_, dw)| dw);
                let gap = options.get(1).map_or(0, |&(_, dw)| dw - best);
                GinView::new(DecisionKind::Discard, &[best, gap, turn])
            }
            // Deal and Over have no decision; they report as knock views with
            // no information and are never encoded by the walker.
            Phase::Knock | Phase::Deal | Phase::Over => GinView::new(
                DecisionKind::Knock,
                &[deadwood(hand), turn, state.pickups[1 - player] as u16],
            ),
        }
    }

    fn is_chance(&self, state: &GinState) -> bool {
        state.phase == Phase::Deal
    }

    fn sample_chance<R: Rng>(&self, _state: &GinState, rng: &mut R) -> GinState {
        let mut deck = shuffled_deck(rng);
        let n = self.config.hand_size;

        let stock = deck.split_off(2 * n + 1);
        let upcard = deck[2 * n];
        let hands = [Hand::from_cards(&deck[..n]), Hand::from_cards(&deck[n..2 * n])];

        GinState::dealt(hands, stock, vec![upcard], rng.gen_range(0..2))
    }

    // A draw always faces an upcard and a discard always has at least
    // `discard_options` eligible cards.
    fn action_count(&self, kind: DecisionKind) -> Option<usize> {
        match kind {
            DecisionKind::Draw | DecisionKind::Knock => Some(2),
            DecisionKind::Discard => Some(self.config.discard_options),
        }
    }

    fn baseline_policy(&self, state: &GinState, actions: &[GinAction]) -> Vec<f64> {
        baseline::policy(state, actions)
    }
}
