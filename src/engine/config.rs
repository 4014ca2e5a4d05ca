use crate::constants::UNCHOKE_INTERVAL;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings.
///
/// The defaults bind an ephemeral loopback port, run without a tracker,
/// and drop completed content under `downloads/`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address the peer listener binds to.
    pub listen_addr: SocketAddr,
    /// Base URL of the tracker, or `None` to rely on direct dials only.
    pub tracker_url: Option<String>,
    /// Directory receiving the assembled content.
    pub root_dir: PathBuf,
    /// Extension of the output file.
    pub file_extension: String,
    /// Nominal piece size in bytes, used to report `left` to the tracker.
    pub piece_length: u64,
    /// Period of the choking scheduler.
    pub unchoke_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            tracker_url: None,
            root_dir: PathBuf::from("downloads"),
            file_extension: "bin".to_string(),
            piece_length: 0,
            unchoke_interval: UNCHOKE_INTERVAL,
        }
    }
}
