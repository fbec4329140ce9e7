//! Handshake throttle
//!
//! The discovery transport drops messages when several are in flight, so
//! handshakes go out one at a time. Peers that turn up while one is in
//! flight wait in FIFO order. The slot is released only by the outcome of
//! the message that was actually sent for the in-flight peer.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::discovery::PeerToken;

#[derive(Debug)]
struct InFlight {
    peer: PeerToken,
    /// Set once the handshake message has been handed to discovery
    message_id: Option<u32>,
}

#[derive(Debug, Default)]
struct ThrottleState {
    in_flight: Option<InFlight>,
    pending: VecDeque<PeerToken>,
}

impl ThrottleState {
    fn promote_next(&mut self) -> Option<PeerToken> {
        let next = self.pending.pop_front();
        self.in_flight = next.clone().map(|peer| InFlight { peer, message_id: None });
        next
    }
}

/// One handshake slot plus a queue of waiting peers
#[derive(Debug, Default)]
pub struct ConnectThrottle {
    state: Mutex<ThrottleState>,
}

impl ConnectThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a peer for a handshake
    ///
    /// Returns `true` when the caller should send the handshake now. A peer
    /// already in flight or queued is ignored.
    pub fn offer(&self, peer: PeerToken) -> bool {
        let mut state = self.state.lock();

        let in_flight = state.in_flight.as_ref().is_some_and(|f| f.peer == peer);
        if in_flight || state.pending.contains(&peer) {
            return false;
        }

        if state.in_flight.is_none() {
            state.in_flight = Some(InFlight { peer, message_id: None });
            true
        } else {
            state.pending.push_back(peer);
            false
        }
    }

    /// Record the message carrying the handshake for `peer`
    ///
    /// Returns `false` if `peer` no longer holds the slot, in which case
    /// nothing should be sent.
    pub fn sent(&self, peer: &PeerToken, message_id: u32) -> bool {
        let mut state = self.state.lock();
        match state.in_flight.as_mut() {
            Some(f) if f.peer == *peer && f.message_id.is_none() => {
                f.message_id = Some(message_id);
                true
            }
            _ => false,
        }
    }

    /// Whether `message_id` is the handshake currently holding the slot
    pub fn awaits(&self, message_id: u32) -> bool {
        let state = self.state.lock();
        state.in_flight.as_ref().and_then(|f| f.message_id) == Some(message_id)
    }

    /// The handshake sent as `message_id` was acknowledged
    ///
    /// Returns the next peer to handshake with, which is now in flight, or
    /// `None` after freeing the slot. An id that does not match the
    /// in-flight handshake changes nothing and returns `None`.
    pub fn complete(&self, message_id: u32) -> Option<PeerToken> {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().and_then(|f| f.message_id) != Some(message_id) {
            return None;
        }
        state.promote_next()
    }

    /// Give up on `peer` before its handshake was sent
    ///
    /// Returns the next peer, now in flight, like [`complete`](Self::complete).
    pub fn abandon(&self, peer: &PeerToken) -> Option<PeerToken> {
        let mut state = self.state.lock();
        match state.in_flight.as_ref() {
            Some(f) if f.peer == *peer && f.message_id.is_none() => state.promote_next(),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> Option<PeerToken> {
        self.state.lock().in_flight.as_ref().map(|f| f.peer.clone())
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Forget every queued and in-flight peer
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.in_flight = None;
        state.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(name: &str) -> PeerToken {
        PeerToken::new(name)
    }

    #[test]
    fn test_one_in_flight() {
        let throttle = ConnectThrottle::new();

        assert!(throttle.offer(peer("a")));
        assert!(!throttle.offer(peer("b")));
        assert!(!throttle.offer(peer("c")));

        assert_eq!(throttle.in_flight(), Some(peer("a")));
        assert_eq!(throttle.pending(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let throttle = ConnectThrottle::new();
        throttle.offer(peer("a"));
        throttle.offer(peer("b"));
        throttle.offer(peer("c"));

        assert!(throttle.sent(&peer("a"), 1));
        assert_eq!(throttle.complete(1), Some(peer("b")));
        assert!(throttle.sent(&peer("b"), 2));
        assert_eq!(throttle.complete(2), Some(peer("c")));
        assert!(throttle.sent(&peer("c"), 3));
        assert_eq!(throttle.complete(3), None);
        assert_eq!(throttle.in_flight(), None);

        // Free slot: next offer goes out at once
        assert!(throttle.offer(peer("d")));
    }

    #[test]
    fn test_unrelated_ack_keeps_slot() {
        let throttle = ConnectThrottle::new();
        throttle.offer(peer("a"));
        throttle.offer(peer("b"));
        throttle.offer(peer("c"));

        // Nothing sent yet: no id can release the slot
        assert_eq!(throttle.complete(0), None);
        assert!(throttle.sent(&peer("a"), 7));

        assert!(!throttle.awaits(6));
        assert_eq!(throttle.complete(6), None);
        assert_eq!(throttle.complete(8), None);
        assert_eq!(throttle.in_flight(), Some(peer("a")));
        assert_eq!(throttle.pending(), 2);

        assert!(throttle.awaits(7));
        assert_eq!(throttle.complete(7), Some(peer("b")));
        // A repeated ack for the same message is stale now
        assert_eq!(throttle.complete(7), None);
        assert_eq!(throttle.in_flight(), Some(peer("b")));
        assert_eq!(throttle.pending(), 1);
    }

    #[test]
    fn test_sent_only_for_slot_holder() {
        let throttle = ConnectThrottle::new();
        throttle.offer(peer("a"));
        throttle.offer(peer("b"));

        assert!(!throttle.sent(&peer("b"), 1));
        assert!(throttle.sent(&peer("a"), 2));
        assert!(!throttle.sent(&peer("a"), 3));
        assert!(throttle.awaits(2));
    }

    #[test]
    fn test_abandon_moves_to_next() {
        let throttle = ConnectThrottle::new();
        throttle.offer(peer("a"));
        throttle.offer(peer("b"));

        assert_eq!(throttle.abandon(&peer("b")), None);
        assert_eq!(throttle.abandon(&peer("a")), Some(peer("b")));
        assert_eq!(throttle.in_flight(), Some(peer("b")));

        // Once sent, only the acknowledgement frees the slot
        throttle.sent(&peer("b"), 4);
        assert_eq!(throttle.abandon(&peer("b")), None);
        assert_eq!(throttle.in_flight(), Some(peer("b")));
    }

    #[test]
    fn test_duplicates_ignored() {
        let throttle = ConnectThrottle::new();
        assert!(throttle.offer(peer("a")));
        assert!(!throttle.offer(peer("a")));
        throttle.offer(peer("b"));
        throttle.offer(peer("b"));

        assert_eq!(throttle.pending(), 1);
    }

    #[test]
    fn test_clear() {
        let throttle = ConnectThrottle::new();
        throttle.offer(peer("a"));
        throttle.offer(peer("b"));
        throttle.sent(&peer("a"), 1);

        throttle.clear();

        assert_eq!(throttle.in_flight(), None);
        assert_eq!(throttle.pending(), 0);
        assert_eq!(throttle.complete(1), None);
    }
}
