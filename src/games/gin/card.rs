//! Card representation for gin rummy.
//!
//! - `Card`: a single playing card, ace low
//! - `Hand`: a set of cards packed into a 64-bit mask
//! - `shuffled_deck`: a freshly shuffled 52-card deck

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// Number of cards in the deck.
pub const DECK_SIZE: usize = 52;

/// Rank characters for display, ace low.
const RANK_CHARS: [char; 13] = ['A', '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K'];

/// Suit characters for display.
const SUIT_CHARS: [char; 4] = ['c', 'd', 'h', 's'];

/// A single playing card.
///
/// Cards of one suit have consecutive ids so runs are contiguous bit ranges.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card {
    /// Card index 0-51: suit * 13 + rank
    id: u8,
}

impl Card {
    /// Create a card from rank (0-12: A-K) and suit (0-3).
    #[inline]
    pub fn new(rank: u8, suit: u8) -> Self {
        debug_assert!(rank < 13, "rank must be 0-12");
        debug_assert!(suit < 4, "suit must be 0-3");
        Self { id: suit * 13 + rank }
    }

    /// Create a card from its id (0-51).
    #[inline]
    pub fn from_id(id: u8) -> Self {
        debug_assert!((id as usize) < DECK_SIZE, "card id must be 0-51");
        Self { id }
    }

    /// Parse a card from a string like "As", "Th", "7c".
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let (r, su) = (chars.next()?, chars.next()?);
        if chars.next().is_some() {
            return None;
        }

        let rank = RANK_CHARS.iter().position(|&c| c == r.to_ascii_uppercase())?;
        let suit = SUIT_CHARS.iter().position(|&c| c == su.to_ascii_lowercase())?;
        Some(Self::new(rank as u8, suit as u8))
    }

    /// Get the card's id (0-51).
    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Get the card's rank (0-12: A-K).
    #[inline]
    pub fn rank(&self) -> u8 {
        self.id % 13
    }

    /// Get the card's suit (0-3).
    #[inline]
    pub fn suit(&self) -> u8 {
        self.id / 13
    }

    /// Deadwood value: ace 1, pip cards face value, courts 10.
    #[inline]
    pub fn value(&self) -> u16 {
        (self.rank() as u16 + 1).min(10)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", RANK_CHARS[self.rank() as usize], SUIT_CHARS[self.suit() as usize])
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A set of cards.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hand(u64);

impl Hand {
    /// The empty hand.
    pub const EMPTY: Hand = Hand(0);

    /// Build from a list of cards.
    pub fn from_cards(cards: &[Card]) -> Self {
        cards.iter().fold(Self::EMPTY, |h, &c| h.with(c))
    }

    /// Parse a space-separated list like "As 2s 3s Kd".
    pub fn parse(s: &str) -> Option<Self> {
        s.split_whitespace()
            .map(Card::parse)
            .collect::<Option<Vec<_>>>()
            .map(|cards| Self::from_cards(&cards))
    }

    /// Raw bit mask.
    #[inline]
    pub fn mask(&self) -> u64 {
        self.0
    }

    /// Hand from a raw bit mask.
    #[inline]
    pub fn from_mask(mask: u64) -> Self {
        Self(mask)
    }

    /// Copy with `card` added.
    #[inline]
    pub fn with(self, card: Card) -> Self {
        Self(self.0 | 1 << card.id())
    }

    /// Copy with `card` removed.
    #[inline]
    pub fn without(self, card: Card) -> Self {
        Self(self.0 & !(1 << card.id()))
    }

    /// Add a card.
    #[inline]
    pub fn insert(&mut self, card: Card) {
        *self = self.with(card);
    }

    /// Remove a card.
    #[inline]
    pub fn remove(&mut self, card: Card) {
        *self = self.without(card);
    }

    /// Whether the hand holds `card`.
    #[inline]
    pub fn contains(&self, card: Card) -> bool {
        self.0 & (1 << card.id()) != 0
    }

    /// Number of cards.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the hand is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Cards in both hands.
    #[inline]
    pub fn intersect(self, other: Hand) -> Hand {
        Hand(self.0 & other.0)
    }

    /// Cards in either hand.
    #[inline]
    pub fn union(self, other: Hand) -> Hand {
        Hand(self.0 | other.0)
    }

    /// Cards in `self` but not in `other`.
    #[inline]
    pub fn minus(self, other: Hand) -> Hand {
        Hand(self.0 & !other.0)
    }

    /// Sum of the deadwood values of every card.
    pub fn pips(&self) -> u16 {
        self.iter().map(|c| c.value()).sum()
    }

    /// Iterate cards in id order.
    pub fn iter(&self) -> impl Iterator<Item = Card> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let id = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(Card::from_id(id))
        })
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", cards.join(" "))
    }
}

impl fmt::Debug for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self)
    }
}

/// A shuffled 52-card deck.
pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<Card> {
    let mut deck: Vec<Card> = (0..DECK_SIZE as u8).map(Card::from_id).collect();
    deck.shuffle(rng);
    deck
}
