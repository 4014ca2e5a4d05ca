use super::registry::SwarmRegistry;
use crate::constants::{MAX_UNCHOKED, OPTIMISTIC_ROUND_INTERVAL};
use crate::peer::PeerId;
use rand::Rng as _;

/// One choke-state flip the runtime has to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnchokeAction {
    pub peer_id: PeerId,
    pub unchoke: bool,
}

impl SwarmRegistry {
    /// Runs one tit-for-tat round and returns the choke flips to send.
    ///
    /// The top `MAX_UNCHOKED - 1` interested peers by download rate keep
    /// the regular slots; one more interested peer holds the optimistic
    /// slot, re-picked at random every [`OPTIMISTIC_ROUND_INTERVAL`] rounds
    /// or whenever the slot is empty. Only actual state flips produce
    /// actions.
    pub fn run_unchoke(&self) -> Vec<UnchokeAction> {
        let mut inner = self.lock();
        inner.round += 1;
        let round = inner.round;

        for state in inner.states.values_mut() {
            state.sample_rates();
        }

        let mut interested: Vec<(PeerId, f64)> = inner
            .states
            .iter()
            .filter(|(_, s)| s.peer_interested)
            .map(|(id, s)| (*id, s.download_rate()))
            .collect();
        interested.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut to_unchoke: Vec<PeerId> = interested
            .iter()
            .take(MAX_UNCHOKED - 1)
            .map(|(id, _)| *id)
            .collect();

        if round % OPTIMISTIC_ROUND_INTERVAL == 0 || inner.optimistic.is_none() {
            let candidates: Vec<PeerId> = interested
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| !to_unchoke.contains(id))
                .collect();
            if !candidates.is_empty() {
                let pick = rand::rng().random_range(0..candidates.len());
                inner.optimistic = Some(candidates[pick]);
            }
        }

        if let Some(optimistic) = inner.optimistic {
            if inner.states.contains_key(&optimistic) && !to_unchoke.contains(&optimistic) {
                to_unchoke.push(optimistic);
            }
        }

        let mut actions = Vec::new();
        for (id, state) in inner.states.iter_mut() {
            let should_unchoke = to_unchoke.contains(id);
            if should_unchoke == state.am_choking {
                state.am_choking = !should_unchoke;
                actions.push(UnchokeAction {
                    peer_id: *id,
                    unchoke: should_unchoke,
                });
            }
        }

        actions
    }
}
