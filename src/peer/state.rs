use std::time::Instant;

/// Per-peer protocol state and transfer accounting.
///
/// Both sides start choked and uninterested. Byte counters are monotonic;
/// the download rate is re-sampled between unchoke rounds and drives the
/// tit-for-tat ranking.
#[derive(Debug, Clone)]
pub struct PeerState {
    /// We are refusing to serve this peer.
    pub am_choking: bool,
    /// We want pieces from this peer.
    pub am_interested: bool,
    /// This peer is refusing to serve us.
    pub peer_choking: bool,
    /// This peer wants pieces from us.
    pub peer_interested: bool,
    /// Bytes of piece data we served this peer.
    pub uploaded: i64,
    /// Bytes of verified piece data this peer served us.
    pub downloaded: i64,

    download_rate: f64,
    upload_rate: f64,
    last_sampled: Instant,
    last_uploaded: i64,
    last_downloaded: i64,
}

impl PeerState {
    pub fn new() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
            uploaded: 0,
            downloaded: 0,
            download_rate: 0.0,
            upload_rate: 0.0,
            last_sampled: Instant::now(),
            last_uploaded: 0,
            last_downloaded: 0,
        }
    }

    pub fn record_upload(&mut self, bytes: i64) {
        self.uploaded += bytes;
    }

    pub fn record_download(&mut self, bytes: i64) {
        self.downloaded += bytes;
    }

    /// Recomputes the download rate over the window since the last sample.
    ///
    /// Windows shorter than one second are skipped so a fast double tick
    /// cannot produce a nonsense rate.
    pub fn sample_rates(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sampled).as_secs_f64();
        if elapsed < 1.0 {
            return;
        }

        self.download_rate = (self.downloaded - self.last_downloaded) as f64 / elapsed;
        self.upload_rate = (self.uploaded - self.last_uploaded) as f64 / elapsed;
        self.last_downloaded = self.downloaded;
        self.last_uploaded = self.uploaded;
        self.last_sampled = now;
    }

    pub fn download_rate(&self) -> f64 {
        self.download_rate
    }

    pub fn upload_rate(&self) -> f64 {
        self.upload_rate
    }

    #[cfg(test)]
    pub(crate) fn force_download_rate(&mut self, rate: f64) {
        self.download_rate = rate;
    }
}

impl Default for PeerState {
    fn default() -> Self {
        Self::new()
    }
}
