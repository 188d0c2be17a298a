//! Meld detection and deadwood scoring.
//!
//! A meld is either a set (three or four cards of one rank) or a run (three
//! or more consecutive cards of one suit, ace low, no wrap). Deadwood is the
//! value of the cards left over after the best arrangement of disjoint melds.

use super::card::{Card, Hand};

/// The lowest-deadwood arrangement of a hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeldSolution {
    /// Disjoint melds used.
    pub melds: Vec<Hand>,
    /// Cards outside every meld.
    pub unmatched: Hand,
    /// Value of the unmatched cards.
    pub deadwood: u16,
}

/// Every set and run contained in `hand`, including sub-melds.
///
/// A four-card set also yields its four three-card subsets and a long run
/// yields every contiguous sub-run of length three or more, since the best
/// arrangement may need to split them.
pub fn all_melds(hand: Hand) -> Vec<Hand> {
    let mut melds = Vec::new();

    for rank in 0..13u8 {
        let cards: Vec<Card> = (0..4u8)
            .map(|suit| Card::new(rank, suit))
            .filter(|&c| hand.contains(c))
            .collect();

        match cards.len() {
            3 => melds.push(Hand::from_cards(&cards)),
            4 => {
                melds.push(Hand::from_cards(&cards));
                for skip in 0..4 {
                    let subset: Vec<Card> = cards
                        .iter()
                        .enumerate()
                        .filter(|&(i, _)| i != skip)
                        .map(|(_, &c)| c)
                        .collect();
                    melds.push(Hand::from_cards(&subset));
                }
            }
            _ => {}
        }
    }

    for suit in 0..4u8 {
        let mut start = 0u8;
        while start < 13 {
            if !hand.contains(Card::new(start, suit)) {
                start += 1;
                continue;
            }
            let mut end = start;
            while end + 1 < 13 && hand.contains(Card::new(end + 1, suit)) {
                end += 1;
            }
            for lo in start..=end {
                for hi in lo + 2..=end {
                    let run: Vec<Card> = (lo..=hi).map(|r| Card::new(r, suit)).collect();
                    melds.push(Hand::from_cards(&run));
                }
            }
            start = end + 1;
        }
    }

    melds
}

/// Best arrangement of `hand` into disjoint melds.
pub fn best_melds(hand: Hand) -> MeldSolution {
    let melds = all_melds(hand);
    let mut best = MeldSolution {
        melds: Vec::new(),
        unmatched: hand,
        deadwood: hand.pips(),
    };
    let mut chosen = Vec::new();
    search(&melds, 0, Hand::EMPTY, hand, &mut chosen, &mut best);
    best
}

fn search(melds: &[Hand], start: usize, used: Hand, hand: Hand, chosen: &mut Vec<Hand>, best: &mut MeldSolution) {
    let unmatched = hand.minus(used);
    let deadwood = unmatched.pips();
    if deadwood < best.deadwood {
        *best = MeldSolution {
            melds: chosen.clone(),
            unmatched,
            deadwood,
        };
    }
    if best.deadwood == 0 {
        return;
    }

    for (j, &meld) in melds.iter().enumerate().skip(start) {
        if meld.intersect(used).is_empty() {
            chosen.push(meld);
            search(melds, j + 1, used.union(meld), hand, chosen, best);
            chosen.pop();
        }
    }
}

/// Deadwood of the best arrangement of `hand`.
pub fn deadwood(hand: Hand) -> u16 {
    best_melds(hand).deadwood
}

/// Lowest deadwood reachable by discarding one card other than `forbidden`.
///
/// `None` if every card is forbidden.
pub fn best_discard_deadwood(hand: Hand, forbidden: Option<Card>) -> Option<u16> {
    hand.iter()
        .filter(|&c| Some(c) != forbidden)
        .map(|c| deadwood(hand.without(c)))
        .min()
}

fn is_set(meld: Hand) -> bool {
    let mut cards = meld.iter();
    match cards.next() {
        Some(first) => cards.all(|c| c.rank() == first.rank()),
        None => false,
    }
}

/// Lay `cards` off onto `melds` and return the cards that could not be placed.
///
/// A set takes its missing fourth card; a run takes the next card of its
/// suit at either end. Placing a card can open room for another, so this
/// repeats until nothing changes.
pub fn lay_off(melds: &[Hand], cards: Hand) -> Hand {
    let mut melds: Vec<Hand> = melds.to_vec();
    let mut remaining = cards;

    loop {
        let mut placed = false;

        for card in remaining.iter() {
            let target = melds.iter().position(|&meld| fits(meld, card));
            if let Some(i) = target {
                melds[i].insert(card);
                remaining.remove(card);
                placed = true;
            }
        }

        if !placed {
            return remaining;
        }
    }
}

/// Defender's deadwood after laying off onto the knocker's `knock_melds`.
///
/// Every arrangement of the defender's own melds is tried, since the one with
/// the least deadwood before layoffs can leave more after them.
pub fn defender_deadwood(hand: Hand, knock_melds: &[Hand]) -> u16 {
    let melds = all_melds(hand);
    let mut best = lay_off(knock_melds, hand).pips();
    defend(&melds, 0, Hand::EMPTY, hand, knock_melds, &mut best);
    best
}

fn defend(melds: &[Hand], start: usize, used: Hand, hand: Hand, knock_melds: &[Hand], best: &mut u16) {
    let remaining = lay_off(knock_melds, hand.minus(used)).pips();
    *best = (*best).min(remaining);
    if *best == 0 {
        return;
    }

    for (j, &meld) in melds.iter().enumerate().skip(start) {
        if meld.intersect(used).is_empty() {
            defend(melds, j + 1, used.union(meld), hand, knock_melds, best);
        }
    }
}

fn fits(meld: Hand, card: Card) -> bool {
    if meld.contains(card) {
        return false;
    }
    if is_set(meld) {
        return meld.iter().next().map_or(false, |c| c.rank() == card.rank());
    }

    let suit = match meld.iter().next() {
        Some(c) => c.suit(),
        None => return false,
    };
    if card.suit() != suit {
        return false;
    }
    let lo = meld.iter().map(|c| c.rank()).min().unwrap_or(0);
    let hi = meld.iter().map(|c| c.rank()).max().unwrap_or(0);
    card.rank() + 1 == lo || card.rank() == hi + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(s: &str) -> Hand {
        Hand::parse(s).unwrap()
    }

    #[test]
    fn test_no_melds_is_all_deadwood() {
        let h = hand("As 3d 5c 7h 9s Jd Kc 2h 4s 6d");
        assert!(all_melds(h).is_empty());
        assert_eq!(deadwood(h), 1 + 3 + 5 + 7 + 9 + 10 + 10 + 2 + 4 + 6);
    }

    #[test]
    fn test_gin_hand_has_zero_deadwood() {
        let h = hand("As 2s 3s 4s 7d 7h 7c Qh Kh Jh");
        let solution = best_melds(h);
        assert_eq!(solution.deadwood, 0);
        assert_eq!(solution.melds.len(), 3);
        assert!(solution.unmatched.is_empty());
    }

    #[test]
    fn test_overlapping_set_and_run_picks_best() {
        // 7d can go in the 7 set or the diamond run, not both
        let h = hand("5d 6d 7d 7c 7h Kc Ks");
        let solution = best_melds(h);
        // run 5-6-7d + leftover 7c 7h Kc Ks = 34, set 7s + 5d 6d Kc Ks = 31
        assert_eq!(solution.deadwood, 31);

        // with the 8d the four-card run (7c 7h Kc Ks left) beats the set
        // (5d 6d 8d Kc Ks left)
        let h = hand("5d 6d 7d 8d 7c 7h Kc Ks");
        assert_eq!(deadwood(h), 34);
    }

    #[test]
    fn test_four_card_set_can_split() {
        // 9s needed by the run, leaving a three-card set of nines
        let h = hand("9c 9d 9h 9s Ts Js");
        assert_eq!(deadwood(h), 0);
        let h = hand("9c 9d 9h 9s");
        assert_eq!(all_melds(h).len(), 5);
    }

    #[test]
    fn test_long_run_sub_runs() {
        let h = hand("Ah 2h 3h 4h 5h");
        // lengths 3: 3, 4: 2, 5: 1
        assert_eq!(all_melds(h).len(), 6);
        assert_eq!(deadwood(h), 0);
    }

    #[test]
    fn test_no_wraparound_runs() {
        let h = hand("Qc Kc Ac");
        assert!(all_melds(h).is_empty());
        assert_eq!(deadwood(h), 21);
    }

    #[test]
    fn test_best_discard_deadwood() {
        let h = hand("As 2s 3s 4s 7d 7h 7c Qh Kh Jh 9c");
        assert_eq!(best_discard_deadwood(h, None), Some(0));
        // discarding the 9c is forbidden: best is breaking the 4-run
        assert_eq!(best_discard_deadwood(h, Card::parse("9c")), Some(9));
        assert_eq!(best_discard_deadwood(hand("9c"), Card::parse("9c")), None);
    }

    #[test]
    fn test_lay_off_onto_runs_and_sets() {
        let melds = vec![hand("4s 5s 6s"), hand("8c 8d 8h")];
        let remaining = lay_off(&melds, hand("3s 2s 8s 7s Kd 9h"));
        // 3s then 2s extend down, 7s extends up, 8s completes the set
        assert_eq!(remaining, hand("Kd 9h"));
    }

    #[test]
    fn test_defender_picks_melds_after_layoffs() {
        let knock = vec![hand("9c 9d 9s"), hand("As 2s 3s")];
        let defender = hand("8h 9h Th 8c 8d");

        // the heart run leaves 8c 8d = 16 with nothing to lay off, while the
        // set of eights leaves 9h Th and the 9h completes the knocker's set
        assert_eq!(deadwood(defender), 16);
        assert_eq!(defender_deadwood(defender, &knock), 10);

        // no melds to choose between; the 4s extends the spade run
        assert_eq!(defender_deadwood(hand("4s Kd"), &knock), 10);
    }

    #[test]
    fn test_lay_off_does_not_cross_suits() {
        let melds = vec![hand("4s 5s 6s")];
        assert_eq!(lay_off(&melds, hand("7h 3d")), hand("7h 3d"));
    }
}
