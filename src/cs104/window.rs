//! Send/receive window accounting
//!
//! The 15 bit sequence number bookkeeping of the CS104 engine: V(S), V(R),
//! the peer acknowledge level and the count of received-but-unacknowledged
//! I-frames. All comparisons are modular.

use crate::constants::SEQUENCE_MODULO;
use crate::error::ProtocolError;

/// Modular distance from `b` to `a` (how far `a` is ahead of `b`)
#[inline]
pub fn seq_distance(a: u16, b: u16) -> u16 {
    a.wrapping_sub(b) & (SEQUENCE_MODULO - 1)
}

/// Increment a sequence number modulo 2^15
#[inline]
pub fn seq_next(seq: u16) -> u16 {
    (seq + 1) & (SEQUENCE_MODULO - 1)
}

/// Sliding window state of one CS104 connection
#[derive(Debug, Clone)]
pub struct SequenceWindow {
    v_s: u16,
    v_r: u16,
    ack: u16,
    unacked_rx: u16,
    k: u16,
    w: u16,
}

impl SequenceWindow {
    pub fn new(k: u16, w: u16) -> Self {
        Self {
            v_s: 0,
            v_r: 0,
            ack: 0,
            unacked_rx: 0,
            k,
            w,
        }
    }

    /// Current send sequence counter V(S)
    pub fn send_seq(&self) -> u16 {
        self.v_s
    }

    /// Current receive sequence counter V(R)
    pub fn recv_seq(&self) -> u16 {
        self.v_r
    }

    /// Highest sequence number acknowledged by the peer
    pub fn acked(&self) -> u16 {
        self.ack
    }

    /// Number of unacknowledged I-frames in flight
    pub fn outstanding(&self) -> u16 {
        seq_distance(self.v_s, self.ack)
    }

    /// True while another I-frame may be sent without exceeding k
    pub fn can_send(&self) -> bool {
        self.outstanding() < self.k
    }

    /// Claim the next send sequence number
    pub fn next_send_seq(&mut self) -> u16 {
        let seq = self.v_s;
        self.v_s = seq_next(self.v_s);
        seq
    }

    /// Account a received I-frame; its N(S) must equal V(R)
    pub fn accept_peer_send_seq(&mut self, ns: u16) -> Result<(), ProtocolError> {
        if ns != self.v_r {
            return Err(ProtocolError::SequenceMismatch {
                expected: self.v_r,
                got: ns,
            });
        }
        self.v_r = seq_next(self.v_r);
        self.unacked_rx += 1;
        Ok(())
    }

    /// Apply a received N(R). Returns how many frames it newly acknowledges;
    /// an N(R) outside [ack, V(S)] means the peer acknowledged frames that
    /// were never sent.
    pub fn apply_ack(&mut self, nr: u16) -> Result<u16, ProtocolError> {
        let newly = seq_distance(nr, self.ack);
        if newly > self.outstanding() {
            return Err(ProtocolError::WindowExceeded);
        }
        self.ack = nr;
        Ok(newly)
    }

    /// Count of received I-frames not yet acknowledged by us
    pub fn unacked_rx(&self) -> u16 {
        self.unacked_rx
    }

    /// True once w received I-frames await a supervisory acknowledge
    pub fn s_frame_due(&self) -> bool {
        self.unacked_rx >= self.w
    }

    /// Record that an outbound frame carried N(R) = V(R)
    pub fn mark_rx_acknowledged(&mut self) {
        self.unacked_rx = 0;
    }
}
