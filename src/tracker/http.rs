use super::error::TrackerError;
use super::response::{AnnounceEvent, AnnounceResponse, ScrapeStats, TrackerPeer};
use crate::bencode::{decode, Value};
use crate::constants::{NUMWANT, TRACKER_TIMEOUT};
use crate::metainfo::ContentId;
use crate::peer::PeerId;
use reqwest::Client;

/// An HTTP tracker client.
///
/// Announce requests carry the raw content id percent-encoded, our peer id
/// as 40 hex characters, and the transfer totals; responses are bencoded
/// dictionaries with a non-compact peer list.
#[derive(Clone)]
pub struct TrackerClient {
    client: Client,
    base_url: String,
}

/// Parameters of one announce request.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceRequest<'a> {
    pub content_id: &'a ContentId,
    pub peer_id: &'a PeerId,
    pub port: u16,
    pub uploaded: i64,
    pub downloaded: i64,
    pub left: i64,
    pub event: AnnounceEvent,
}

impl TrackerClient {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder().timeout(TRACKER_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Announces to the tracker and returns its interval and peer list.
    pub async fn announce(
        &self,
        request: AnnounceRequest<'_>,
    ) -> Result<AnnounceResponse, TrackerError> {
        let mut url = format!(
            "{}/announce?info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=0&numwant={}",
            self.base_url,
            request.content_id.url_encode(),
            request.peer_id.to_hex(),
            request.port,
            request.uploaded,
            request.downloaded,
            request.left,
            NUMWANT,
        );

        let event = request.event.as_str();
        if !event.is_empty() {
            url.push_str("&event=");
            url.push_str(event);
        }

        let body = self.client.get(&url).send().await?.bytes().await?;
        parse_announce(&body)
    }

    /// Scrapes swarm statistics for one content id.
    pub async fn scrape(&self, content_id: &ContentId) -> Result<ScrapeStats, TrackerError> {
        let url = format!(
            "{}/scrape?info_hash={}",
            self.base_url,
            content_id.url_encode()
        );

        let body = self.client.get(&url).send().await?.bytes().await?;
        parse_scrape(&body, content_id)
    }
}

pub(super) fn parse_announce(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    let dict = value
        .as_dict()
        .ok_or(TrackerError::InvalidResponse("expected dictionary"))?;

    if let Some(reason) = dict.get(b"failure reason".as_slice()) {
        let reason = reason.as_str().unwrap_or("unreadable failure reason");
        return Err(TrackerError::Failure(reason.to_string()));
    }

    let interval = dict
        .get(b"interval".as_slice())
        .and_then(Value::as_integer)
        .ok_or(TrackerError::InvalidResponse("missing interval"))? as u32;

    let mut peers = Vec::new();
    if let Some(list) = dict.get(b"peers".as_slice()).and_then(Value::as_list) {
        for entry in list {
            let Some(entry) = entry.as_dict() else {
                continue;
            };

            let peer_id = entry
                .get(b"peer id".as_slice())
                .and_then(Value::as_bytes)
                .and_then(|b| b.as_ref().try_into().ok());
            let ip = entry.get(b"ip".as_slice()).and_then(Value::as_str);
            let port = entry
                .get(b"port".as_slice())
                .and_then(Value::as_integer)
                .and_then(|p| u16::try_from(p).ok());

            if let (Some(ip), Some(port)) = (ip, port) {
                peers.push(TrackerPeer {
                    peer_id,
                    ip: ip.to_string(),
                    port,
                });
            }
        }
    }

    Ok(AnnounceResponse { interval, peers })
}

pub(super) fn parse_scrape(
    body: &[u8],
    content_id: &ContentId,
) -> Result<ScrapeStats, TrackerError> {
    let value = decode(body)?;
    let files = value
        .get(b"files")
        .and_then(Value::as_dict)
        .ok_or(TrackerError::InvalidResponse("missing files dictionary"))?;

    // Trackers may scrape several hashes at once; only the entry keyed by
    // our content id counts.
    let stats = files
        .get(content_id.as_bytes().as_slice())
        .and_then(Value::as_dict)
        .ok_or(TrackerError::InvalidResponse("no entry for content id"))?;

    let field = |key: &[u8]| {
        stats
            .get(key)
            .and_then(Value::as_integer)
            .unwrap_or_default()
    };

    Ok(ScrapeStats {
        complete: field(b"complete"),
        incomplete: field(b"incomplete"),
        downloaded: field(b"downloaded"),
    })
}
