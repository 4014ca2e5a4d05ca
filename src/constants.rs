//! Protocol constants and tuning parameters.

use std::time::Duration;

// ============================================================================
// Wire protocol
// ============================================================================

/// Hard cap on a single framed message, header excluded. Exceeding it is a
/// fatal protocol error on the connection.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Initial capacity of the per-connection read buffer.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Queues
// ============================================================================

/// Depth of the engine-wide inbound message channel shared by all read tasks.
/// Overflow drops the newest message; the connection survives until the
/// backpressure repeats.
pub const INBOUND_QUEUE_DEPTH: usize = 1024;

/// Depth of the per-peer send queue. A full outbox is a soft error.
pub const OUTBOX_DEPTH: usize = 16;

/// Consecutive full-queue events a connection survives before it is closed.
pub const BACKPRESSURE_STRIKE_LIMIT: u32 = 3;

// ============================================================================
// Choking
// ============================================================================

/// Upload slots, optimistic slot included.
pub const MAX_UNCHOKED: usize = 4;

/// The optimistic slot is re-picked every this many unchoke rounds.
pub const OPTIMISTIC_ROUND_INTERVAL: u64 = 3;

/// Period of the unchoke scheduler.
pub const UNCHOKE_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Timeouts and announce cadence
// ============================================================================

/// An inbound handshake starts with a blocking read, so both directions are
/// bounded by this.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout applied to every tracker HTTP call.
pub const TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Lower clamp on the tracker-returned announce interval.
pub const MIN_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper clamp on the tracker-returned announce interval.
pub const MAX_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(600);

/// Announce period used until a tracker has responded.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(300);

/// Number of peers requested per announce.
pub const NUMWANT: u32 = 50;
