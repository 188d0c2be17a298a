//! Information-set keys.
//!
//! A key is what the acting player can observe at a decision point, reduced
//! to a handful of bucketed features. Two decisions the player cannot tell
//! apart share a key and therefore share a strategy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cfr::game::Observation;

/// Maximum number of features a key can carry.
pub const MAX_FEATURES: usize = 4;

/// The kind of decision a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DecisionKind {
    /// Take the face-up discard or draw from the stock.
    Draw,
    /// Choose which card to throw.
    Discard,
    /// Knock now or keep playing.
    Knock,
}

impl DecisionKind {
    /// All kinds, in key order.
    pub const ALL: [DecisionKind; 3] = [DecisionKind::Draw, DecisionKind::Discard, DecisionKind::Knock];

    /// Short lowercase tag used in the textual key.
    pub fn tag(self) -> &'static str {
        match self {
            DecisionKind::Draw => "draw",
            DecisionKind::Discard => "discard",
            DecisionKind::Knock => "knock",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Bucket widths per decision kind.
///
/// Raw feature `i` of a decision of kind `k` is stored as
/// `raw / widths(k)[i]`. A width of zero drops the feature entirely, which
/// merges every decision that differed only in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBucketing {
    /// Widths for draw decisions.
    pub draw: [u16; MAX_FEATURES],
    /// Widths for discard decisions.
    pub discard: [u16; MAX_FEATURES],
    /// Widths for knock decisions.
    pub knock: [u16; MAX_FEATURES],
}

impl Default for KeyBucketing {
    fn default() -> Self {
        Self {
            // deadwood, up-card rank, improvement, turn
            draw: [5, 1, 5, 4],
            // best deadwood, gap to next option, turn
            discard: [3, 5, 4, 0],
            // deadwood, turn, opponent pickups
            knock: [1, 3, 1, 0],
        }
    }
}

impl KeyBucketing {
    /// Identity bucketing: every raw feature value is kept as is.
    pub fn exact() -> Self {
        Self {
            draw: [1; MAX_FEATURES],
            discard: [1; MAX_FEATURES],
            knock: [1; MAX_FEATURES],
        }
    }

    /// Widths for one kind.
    pub fn widths(&self, kind: DecisionKind) -> &[u16; MAX_FEATURES] {
        match kind {
            DecisionKind::Draw => &self.draw,
            DecisionKind::Discard => &self.discard,
            DecisionKind::Knock => &self.knock,
        }
    }
}

/// Canonical key of an information set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct InfosetKey {
    kind: DecisionKind,
    len: u8,
    features: [u16; MAX_FEATURES],
}

impl InfosetKey {
    /// Build a key directly from already-bucketed features.
    pub fn new(kind: DecisionKind, features: &[u16]) -> Self {
        debug_assert!(features.len() <= MAX_FEATURES, "too many key features");
        let len = features.len().min(MAX_FEATURES);
        let mut packed = [0u16; MAX_FEATURES];
        packed[..len].copy_from_slice(&features[..len]);
        Self {
            kind,
            len: len as u8,
            features: packed,
        }
    }

    /// Encode an observation under the given bucketing.
    pub fn encode<V: Observation>(view: &V, bucketing: &KeyBucketing) -> Self {
        let kind = view.kind();
        let widths = bucketing.widths(kind);
        let mut packed = [0u16; MAX_FEATURES];
        let mut len = 0;

        for (&raw, &width) in view.raw_features().iter().zip(widths.iter()) {
            if width == 0 {
                continue;
            }
            packed[len] = raw / width;
            len += 1;
        }

        Self {
            kind,
            len: len as u8,
            features: packed,
        }
    }

    /// Decision kind.
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Bucketed features.
    pub fn features(&self) -> &[u16] {
        &self.features[..self.len as usize]
    }
}

impl fmt::Display for InfosetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.kind)?;
        for (i, feature) in self.features().iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", feature)?;
        }
        Ok(())
    }
}

/// Failure to parse a textual key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed infoset key `{0}`")]
pub struct ParseKeyError(pub String);

impl FromStr for InfosetKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let (tag, rest) = s.split_once(':').ok_or_else(err)?;
        let kind = DecisionKind::from_tag(tag).ok_or_else(err)?;

        let features: Vec<u16> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/')
                .map(|part| part.parse::<u16>().map_err(|_| err()))
                .collect::<Result<_, _>>()?
        };
        if features.len() > MAX_FEATURES {
            return Err(err());
        }

        Ok(Self::new(kind, &features))
    }
}

impl From<InfosetKey> for String {
    fn from(key: InfosetKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for InfosetKey {
    type Error = ParseKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct View {
        kind: DecisionKind,
        raw: Vec<u16>,
    }

    impl Observation for View {
        fn kind(&self) -> DecisionKind {
            self.kind
        }

        fn raw_features(&self) -> &[u16] {
            &self.raw
        }
    }

    #[test]
    fn test_equal_views_give_equal_keys() {
        let bucketing = KeyBucketing::default();
        let a = View { kind: DecisionKind::Draw, raw: vec![23, 7, 4, 9] };
        let b = View { kind: DecisionKind::Draw, raw: vec![23, 7, 4, 9] };
        assert_eq!(InfosetKey::encode(&a, &bucketing), InfosetKey::encode(&b, &bucketing));
    }

    #[test]
    fn test_bucketing_merges_and_separates() {
        let bucketing = KeyBucketing::default();
        // deadwood 21 and 24 share the width-5 bucket, 25 does not
        let a = View { kind: DecisionKind::Draw, raw: vec![21, 7, 0, 0] };
        let b = View { kind: DecisionKind::Draw, raw: vec![24, 7, 0, 0] };
        let c = View { kind: DecisionKind::Draw, raw: vec![25, 7, 0, 0] };
        let ka = InfosetKey::encode(&a, &bucketing);
        assert_eq!(ka, InfosetKey::encode(&b, &bucketing));
        assert_ne!(ka, InfosetKey::encode(&c, &bucketing));

        // same features, different kind
        let d = View { kind: DecisionKind::Knock, raw: vec![21, 7, 0, 0] };
        assert_ne!(ka, InfosetKey::encode(&d, &KeyBucketing::exact()));
    }

    #[test]
    fn test_zero_width_drops_feature() {
        let bucketing = KeyBucketing::default();
        let a = View { kind: DecisionKind::Discard, raw: vec![6, 10, 8, 99] };
        let key = InfosetKey::encode(&a, &bucketing);
        assert_eq!(key.features(), &[2, 2, 2]);
        assert_eq!(key.to_string(), "discard:2/2/2");
    }

    #[test]
    fn test_text_round_trip() {
        let key = InfosetKey::new(DecisionKind::Knock, &[7, 0, 3]);
        let text = key.to_string();
        assert_eq!(text, "knock:7/0/3");
        assert_eq!(text.parse::<InfosetKey>().unwrap(), key);

        let empty = InfosetKey::new(DecisionKind::Draw, &[]);
        assert_eq!(empty.to_string(), "draw:");
        assert_eq!("draw:".parse::<InfosetKey>().unwrap(), empty);
    }

    #[test]
    fn test_malformed_text_rejected() {
        for bad in ["", "draw", "fold:1", "draw:1/x", "draw:1//2", "knock:1/2/3/4/5", "draw:70000"] {
            assert!(bad.parse::<InfosetKey>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_ordering_groups_by_kind() {
        let mut keys = vec![
            InfosetKey::new(DecisionKind::Knock, &[1]),
            InfosetKey::new(DecisionKind::Draw, &[9, 9]),
            InfosetKey::new(DecisionKind::Discard, &[0]),
        ];
        keys.sort();
        let kinds: Vec<DecisionKind> = keys.iter().map(|k| k.kind()).collect();
        assert_eq!(kinds, DecisionKind::ALL.to_vec());
    }
}
