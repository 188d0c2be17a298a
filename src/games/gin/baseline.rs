//! Fixed heuristic play.
//!
//! Takes the upcard only when it lowers deadwood, throws the card leaving the
//! least deadwood and knocks whenever allowed. Used as the evaluation opponent
//! and as the average-policy prior for unvisited infosets.

use super::state::{GinAction, GinState, Phase};
use super::GinRummy;

/// One-hot distribution over `actions` for the heuristic choice.
pub fn policy(state: &GinState, actions: &[GinAction]) -> Vec<f64> {
    let choice = choose(state, actions);
    let mut probs = vec![0.0; actions.len()];
    match actions.iter().position(|a| *a == choice) {
        Some(i) => probs[i] = 1.0,
        None if !actions.is_empty() => probs[0] = 1.0,
        None => {}
    }
    probs
}

/// The heuristic's action.
pub fn choose(state: &GinState, actions: &[GinAction]) -> GinAction {
    match state.phase {
        Phase::Draw => {
            let take = state
                .upcard()
                .map_or(false, |up| GinRummy::upcard_improvement(state.acting_hand(), up) > 0);
            GinAction::Draw(take)
        }
        // discard actions come best first
        Phase::Discard => actions.first().copied().unwrap_or(GinAction::Knock(false)),
        _ => GinAction::Knock(true),
    }
}
