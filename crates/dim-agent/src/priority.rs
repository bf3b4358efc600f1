//! Pairwise priority decisions.
//!
//! When two leaders contest the intersection, the outcome is stored once per
//! unordered pair in a [`DecisionBook`] and read by both sides, so the two
//! agents can never hold contradicting decisions.  An entry lives until
//! either agent re-enters Auto or leaves.

use rustc_hash::FxHashMap;

use dim_core::{AgentKey, SimRng};

use crate::{AgentState, AgentView};

// ── DecisionBook ──────────────────────────────────────────────────────────────

#[derive(Default, Debug)]
pub struct DecisionBook {
    /// Unordered pair → winner.
    winners: FxHashMap<(AgentKey, AgentKey), AgentKey>,
}

#[inline]
fn pair(a: AgentKey, b: AgentKey) -> (AgentKey, AgentKey) {
    if a <= b { (a, b) } else { (b, a) }
}

impl DecisionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(true)` if `me` won against `peer`, `Some(false)` if it lost,
    /// `None` if the pair has no decision.
    pub fn decision(&self, me: AgentKey, peer: AgentKey) -> Option<bool> {
        self.winners.get(&pair(me, peer)).map(|w| *w == me)
    }

    pub fn settle(&mut self, winner: AgentKey, loser: AgentKey) {
        self.winners.insert(pair(winner, loser), winner);
    }

    pub fn clear(&mut self, a: AgentKey, b: AgentKey) {
        self.winners.remove(&pair(a, b));
    }

    /// Drop every decision `agent` takes part in.
    pub fn forget(&mut self, agent: AgentKey) {
        self.winners.retain(|(a, b), _| *a != agent && *b != agent);
    }

    /// Existing decision for the pair, or a fresh shared coin flip.
    pub fn flip(&mut self, me: AgentKey, peer: AgentKey, rng: &mut SimRng) -> bool {
        if let Some(d) = self.decision(me, peer) {
            return d;
        }
        let me_wins = rng.coin_flip();
        if me_wins {
            self.settle(me, peer);
        } else {
            self.settle(peer, me);
        }
        me_wins
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

// ── Priority ladder ───────────────────────────────────────────────────────────

/// Settle who goes first between `me` and `peer`.
///
/// Highest rule first: emergency, forced wait, Flaw against non-Flaw, both
/// gaining priority, both Flaw.  When nothing applies the stored decision (if
/// any) is inherited.  `None` means "no decision": the caller may proceed.
pub fn resolve_priority(
    me:   &AgentView,
    peer: &AgentView,
    book: &mut DecisionBook,
    rng:  &mut SimRng,
) -> Option<bool> {
    match (me.is_emergency, peer.is_emergency) {
        (true, true) => return Some(book.flip(me.key, peer.key, rng)),
        (true, false) => {
            book.clear(me.key, peer.key);
            return None;
        }
        (false, true) => {
            book.settle(peer.key, me.key);
            return Some(false);
        }
        (false, false) => {}
    }

    match (me.should_wait, peer.should_wait) {
        (true, false) => {
            book.settle(peer.key, me.key);
            return Some(false);
        }
        (false, true) => {
            book.settle(me.key, peer.key);
            return Some(true);
        }
        _ => {}
    }

    let (me_flaw, peer_flaw) = (me.profile.is_flaw(), peer.profile.is_flaw());
    if me_flaw != peer_flaw {
        if me_flaw {
            book.settle(peer.key, me.key);
        } else {
            book.settle(me.key, peer.key);
        }
        return Some(!me_flaw);
    }

    if me.state == AgentState::GainingPriority && peer.state == AgentState::GainingPriority {
        return Some(book.flip(me.key, peer.key, rng));
    }
    if me_flaw && peer_flaw {
        return Some(book.flip(me.key, peer.key, rng));
    }
    book.decision(me.key, peer.key)
}
