use super::*;
use crate::constants::MAX_UNCHOKED;
use crate::peer::{Bitfield, PeerId};
use crate::storage::PieceStore;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};

fn test_id(tag: u8) -> PeerId {
    PeerId([tag; 20])
}

fn test_handle(id: PeerId) -> (PeerHandle, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(16);
    let (close_tx, _close_rx) = watch::channel(false);
    let addr: SocketAddr = "127.0.0.1:6881".parse().unwrap();
    (PeerHandle::new(id, addr, tx, close_tx), rx)
}

fn registry_with_peers(
    num_pieces: usize,
    tags: &[u8],
) -> (SwarmRegistry, Vec<PeerId>, Vec<mpsc::Receiver<Bytes>>) {
    let registry = SwarmRegistry::new(num_pieces);
    let ids: Vec<PeerId> = tags.iter().map(|t| test_id(*t)).collect();
    let mut outboxes = Vec::new();
    for id in &ids {
        let (handle, rx) = test_handle(*id);
        outboxes.push(rx);
        registry.register(handle).unwrap();
    }
    (registry, ids, outboxes)
}

#[test]
fn test_register_and_remove_keep_maps_in_lockstep() {
    let registry = SwarmRegistry::new(4);
    let id = test_id(1);
    let (handle, _rx) = test_handle(id);

    registry.register(handle).unwrap();
    assert!(registry.contains(&id));
    assert!(registry.state(&id).is_some());
    assert_eq!(registry.peer_count(), 1);

    registry.remove(&id);
    assert!(!registry.contains(&id));
    assert!(registry.state(&id).is_none());
    assert!(registry.handle(&id).is_none());

    // Removal is idempotent.
    registry.remove(&id);
    assert_eq!(registry.peer_count(), 0);
}

#[test]
fn test_duplicate_registration_rejected() {
    let registry = SwarmRegistry::new(4);
    let id = test_id(2);
    let (first, _rx1) = test_handle(id);
    let (second, _rx2) = test_handle(id);

    registry.register(first).unwrap();
    assert!(matches!(
        registry.register(second),
        Err(SwarmError::DuplicatePeer(_))
    ));
    assert_eq!(registry.peer_count(), 1);
}

#[test]
fn test_new_peer_state_defaults() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[3]);
    let state = registry.state(&ids[0]).unwrap();
    assert!(state.am_choking);
    assert!(state.peer_choking);
    assert!(!state.peer_interested);
    assert!(registry.am_choking(&ids[0]));
    assert!(registry.peer_choking(&ids[0]));
}

#[test]
fn test_set_peer_has_without_prior_bitfield() {
    let (registry, ids, _outboxes) = registry_with_peers(10, &[4]);
    let store = PieceStore::new(10);

    registry.set_peer_has(&ids[0], 7);

    let mut probe = Bitfield::new(10);
    probe.set(7);
    // Piece 7 now counts as available from that peer.
    assert_eq!(registry.rarest_missing(&store, &probe), vec![7]);
}

#[test]
fn test_pending_requests_drain_once() {
    let (registry, ids, _outboxes) = registry_with_peers(8, &[5]);

    registry.store_pending_requests(&ids[0], vec![3, 1, 4]);
    assert_eq!(registry.take_pending_requests(&ids[0]), vec![3, 1, 4]);
    assert!(registry.take_pending_requests(&ids[0]).is_empty());
}

#[test]
fn test_totals_aggregate_over_peers() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[6, 7]);
    registry.record_upload(&ids[0], 100);
    registry.record_download(&ids[0], 40);
    registry.record_download(&ids[1], 60);

    assert_eq!(registry.totals(), (100, 100));
}

#[test]
fn test_rarest_missing_ordering() {
    // Availability [3, 1, 2, 3]: everyone has pieces 0 and 3, only X has
    // piece 1, X and Y have piece 2.
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2, 3]);
    let store = PieceStore::new(4);

    let full = Bitfield::from_bytes(Bytes::from_static(&[0b1111_0000]), 4);
    let x_and_y = Bitfield::from_bytes(Bytes::from_static(&[0b1011_0000]), 4);
    let base = Bitfield::from_bytes(Bytes::from_static(&[0b1001_0000]), 4);

    registry.update_peer_bitfield(&ids[0], full.clone());
    registry.update_peer_bitfield(&ids[1], x_and_y);
    registry.update_peer_bitfield(&ids[2], base);

    let order = registry.rarest_missing(&store, &full);
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], 1);
    assert_eq!(order[1], 2);
    let mut tail = order[2..].to_vec();
    tail.sort_unstable();
    assert_eq!(tail, vec![0, 3]);
}

#[test]
fn test_rarest_missing_excludes_local_and_unoffered_pieces() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1]);
    let store = PieceStore::new(4);
    store.insert(0, Bytes::from_static(b"p0")).unwrap();

    let offered = Bitfield::from_bytes(Bytes::from_static(&[0b1100_0000]), 4);
    registry.update_peer_bitfield(&ids[0], offered.clone());

    // Piece 0 is held locally, pieces 2 and 3 are not offered.
    assert_eq!(registry.rarest_missing(&store, &offered), vec![1]);
}

#[test]
fn test_unchoke_respects_slot_limit_and_rates() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2, 3, 4, 5]);
    let rates = [10.0, 8.0, 5.0, 2.0, 1.0];

    for (id, rate) in ids.iter().zip(rates) {
        registry.set_peer_interested(id, true);
        registry.set_download_rate(id, rate);
    }

    let actions = registry.run_unchoke();
    let unchoked: Vec<PeerId> = actions
        .iter()
        .filter(|a| a.unchoke)
        .map(|a| a.peer_id)
        .collect();

    assert_eq!(unchoked.len(), MAX_UNCHOKED);
    // The three fastest peers always hold the regular slots.
    for id in &ids[..3] {
        assert!(unchoked.contains(id));
    }
    // The optimistic slot goes to one of the two slow peers.
    let optimistic = registry.optimistic_slot().unwrap();
    assert!(optimistic == ids[3] || optimistic == ids[4]);
    assert!(unchoked.contains(&optimistic));
}

#[test]
fn test_unchoke_emits_actions_only_on_flips() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2]);
    for id in &ids {
        registry.set_peer_interested(id, true);
    }

    let first = registry.run_unchoke();
    assert_eq!(first.len(), 2);

    // Nothing changed, so the next round is silent.
    assert!(registry.run_unchoke().is_empty());
}

#[test]
fn test_uninterested_peers_stay_choked() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2]);
    registry.set_peer_interested(&ids[0], true);

    let actions = registry.run_unchoke();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].peer_id, ids[0]);
    assert!(actions[0].unchoke);
    assert!(registry.am_choking(&ids[1]));
}

#[test]
fn test_optimistic_slot_rotates() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2, 3, 4, 5]);
    let rates = [10.0, 8.0, 5.0, 2.0, 1.0];
    for (id, rate) in ids.iter().zip(rates) {
        registry.set_peer_interested(id, true);
        registry.set_download_rate(id, rate);
    }

    let mut seen = Vec::new();
    for _ in 0..100 {
        registry.run_unchoke();
        seen.push(registry.optimistic_slot().unwrap());
    }

    // Re-picks happen every third round between the two slow peers, so a
    // hundred rounds change the slot at least once.
    assert!(seen.iter().any(|s| *s != seen[0]));
    assert!(seen.iter().all(|s| *s == ids[3] || *s == ids[4]));
}

#[test]
fn test_removing_optimistic_peer_clears_slot() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2, 3, 4]);
    let rates = [10.0, 8.0, 5.0, 2.0];
    for (id, rate) in ids.iter().zip(rates) {
        registry.set_peer_interested(id, true);
        registry.set_download_rate(id, rate);
    }

    // Only the slowest peer is left for the optimistic slot.
    registry.run_unchoke();
    assert_eq!(registry.optimistic_slot(), Some(ids[3]));

    registry.remove(&ids[3]);
    assert_eq!(registry.optimistic_slot(), None);
}

#[test]
fn test_shutdown_clears_everything() {
    let (registry, ids, _outboxes) = registry_with_peers(4, &[1, 2, 3]);
    registry.shutdown();
    assert_eq!(registry.peer_count(), 0);
    for id in &ids {
        assert!(registry.state(id).is_none());
    }
}
