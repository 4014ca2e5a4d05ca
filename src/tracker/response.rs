use crate::constants::{MAX_ANNOUNCE_INTERVAL, MIN_ANNOUNCE_INTERVAL};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Lifecycle event carried by an announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    /// Periodic re-announce.
    None,
    /// First announce of this engine run.
    Started,
    /// Engine is leaving the swarm.
    Stopped,
    /// All pieces received.
    Completed,
}

impl AnnounceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnounceEvent::None => "",
            AnnounceEvent::Started => "started",
            AnnounceEvent::Stopped => "stopped",
            AnnounceEvent::Completed => "completed",
        }
    }
}

/// One peer entry from an announce response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPeer {
    /// The peer's 20-byte id, when the tracker relayed one.
    pub peer_id: Option<[u8; 20]>,
    pub ip: String,
    pub port: u16,
}

impl TrackerPeer {
    /// The dialable address, if the ip field parses.
    pub fn addr(&self) -> Option<SocketAddr> {
        let ip: IpAddr = self.ip.parse().ok()?;
        Some(SocketAddr::new(ip, self.port))
    }
}

/// A decoded announce response.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    /// Seconds until the tracker wants the next announce.
    pub interval: u32,
    pub peers: Vec<TrackerPeer>,
}

/// Swarm statistics from a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Peers holding the complete content.
    pub complete: i64,
    /// Peers still downloading.
    pub incomplete: i64,
    /// Completed downloads ever reported.
    pub downloaded: i64,
}

/// Clamps a tracker-returned interval to a sane re-announce period.
///
/// Trackers have been seen returning zero and returning hours; both are
/// pathological as a periodic timer.
pub fn clamp_interval(seconds: u32) -> Duration {
    Duration::from_secs(u64::from(seconds))
        .clamp(MIN_ANNOUNCE_INTERVAL, MAX_ANNOUNCE_INTERVAL)
}
