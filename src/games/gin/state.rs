//! Gin rummy game state, actions and observations.

use std::fmt;

use super::card::{Card, Hand};
use crate::cfr::game::{Action, Observation};
use crate::cfr::infoset::{DecisionKind, MAX_FEATURES};

/// A choice at one of the three decision points of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GinAction {
    /// `true` takes the face-up discard, `false` draws from the stock.
    Draw(bool),
    /// Throw this card onto the discard pile.
    Discard(Card),
    /// `true` knocks and ends the hand.
    Knock(bool),
}

impl Action for GinAction {
    fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GinAction::Draw(false) => write!(f, "draw stock"),
            GinAction::Draw(true) => write!(f, "take upcard"),
            GinAction::Discard(card) => write!(f, "discard {}", card),
            GinAction::Knock(false) => write!(f, "play on"),
            GinAction::Knock(true) => write!(f, "knock"),
        }
    }
}

/// Where in the hand the game is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Cards not yet dealt (chance node).
    Deal,
    /// Player to act draws.
    Draw,
    /// Player to act discards.
    Discard,
    /// Player to act may knock.
    Knock,
    /// Hand finished.
    Over,
}

/// How a hand ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Knocker had zero deadwood.
    Gin,
    /// Knocker had strictly less deadwood than the defender after layoffs.
    Knock,
    /// Defender matched or beat the knocker.
    Undercut,
    /// Stock ran out.
    Drawn,
}

/// Result of a finished hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome {
    /// How it ended.
    pub kind: OutcomeKind,
    /// Scoring player, `None` for a drawn hand.
    pub winner: Option<usize>,
    /// Points scored by the winner.
    pub points: u16,
}

impl Outcome {
    /// A drawn hand.
    pub fn drawn() -> Self {
        Self {
            kind: OutcomeKind::Drawn,
            winner: None,
            points: 0,
        }
    }
}

/// Complete state of one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct GinState {
    /// Both players' hands.
    pub hands: [Hand; 2],
    /// Face-down stock; the top is the last element.
    pub stock: Vec<Card>,
    /// Face-up pile; the top is the last element.
    pub discard_pile: Vec<Card>,
    /// Player to act.
    pub to_act: usize,
    /// Current phase.
    pub phase: Phase,
    /// Completed turns.
    pub turn: u16,
    /// Card taken from the discard pile this turn; it may not be thrown back.
    pub taken_upcard: Option<Card>,
    /// Times each player took the upcard. Public information.
    pub pickups: [u8; 2],
    /// Set once the hand is over.
    pub outcome: Option<Outcome>,
}

crate::impl_game_state!(GinState);

impl Default for GinState {
    fn default() -> Self {
        Self {
            hands: [Hand::EMPTY; 2],
            stock: Vec::new(),
            discard_pile: Vec::new(),
            to_act: 0,
            phase: Phase::Deal,
            turn: 0,
            taken_upcard: None,
            pickups: [0; 2],
            outcome: None,
        }
    }
}

impl GinState {
    /// A state right after the deal, with `to_act` about to draw.
    pub fn dealt(hands: [Hand; 2], stock: Vec<Card>, discard_pile: Vec<Card>, to_act: usize) -> Self {
        Self {
            hands,
            stock,
            discard_pile,
            to_act,
            phase: Phase::Draw,
            ..Default::default()
        }
    }

    /// Top of the discard pile.
    pub fn upcard(&self) -> Option<Card> {
        self.discard_pile.last().copied()
    }

    /// Hand of the player to act.
    pub fn acting_hand(&self) -> Hand {
        self.hands[self.to_act]
    }
}

impl fmt::Display for GinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P0:[{}] P1:[{}] up:{} stock:{} turn:{} {:?} to_act:{}",
            self.hands[0],
            self.hands[1],
            self.upcard().map_or("--".to_string(), |c| c.to_string()),
            self.stock.len(),
            self.turn,
            self.phase,
            self.to_act
        )
    }
}

/// What the acting player sees, as raw integer features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GinView {
    kind: DecisionKind,
    raw: [u16; MAX_FEATURES],
    len: usize,
}

impl GinView {
    /// Build a view from up to `MAX_FEATURES` raw values.
    pub fn new(kind: DecisionKind, features: &[u16]) -> Self {
        let len = features.len().min(MAX_FEATURES);
        let mut raw = [0; MAX_FEATURES];
        raw[..len].copy_from_slice(&features[..len]);
        Self { kind, raw, len }
    }
}

impl Observation for GinView {
    fn kind(&self) -> DecisionKind {
        self.kind
    }

    fn raw_features(&self) -> &[u16] {
        &self.raw[..self.len]
    }
}
