use super::config::EngineConfig;
use super::connection::{spawn_peer, ConnectionCtx, Direction, InboundMessage};
use super::error::EngineError;
use crate::constants::{DEFAULT_ANNOUNCE_INTERVAL, INBOUND_QUEUE_DEPTH};
use crate::metainfo::{ContentId, Metainfo};
use crate::peer::{Bitfield, Message, PeerId};
use crate::storage::{assemble, PieceStore};
use crate::swarm::SwarmRegistry;
use crate::tracker::{
    clamp_interval, AnnounceEvent, AnnounceRequest, AnnounceResponse, TrackerClient, TrackerError,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// A swarm engine for one piece of content.
///
/// Construct it with the content id and a piece store (pre-filled when
/// seeding, empty when downloading), then [`start`](Engine::start) it.
pub struct Engine {
    config: EngineConfig,
    content_id: ContentId,
    local_id: PeerId,
    store: Arc<PieceStore>,
}

impl Engine {
    pub fn new(config: EngineConfig, content_id: ContentId, store: PieceStore) -> Self {
        Self {
            config,
            content_id,
            local_id: PeerId::generate(),
            store: Arc::new(store),
        }
    }

    /// Builds an engine straight from a parsed metadata document: verified
    /// piece store, piece length for tracker accounting, and the document's
    /// tracker unless the config already names one.
    pub fn from_metainfo(mut config: EngineConfig, meta: &Metainfo) -> Self {
        config.piece_length = meta.info.piece_length;
        if config.tracker_url.is_none() {
            config.tracker_url = Some(meta.announce.clone());
        }
        let store = PieceStore::with_hashes(meta.info.pieces.clone());
        Self::new(config, meta.content_id, store)
    }

    /// Binds the listener, spawns the accept and dispatch tasks, announces
    /// `started`, and hands back the running engine.
    pub async fn start(self) -> Result<EngineHandle, EngineError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(SwarmRegistry::new(self.store.num_pieces()));
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (complete_tx, complete_rx) = watch::channel(self.store.all_received());
        let (control_tx, control_rx) = mpsc::channel(8);

        let ctx = ConnectionCtx {
            content_id: self.content_id,
            local_id: self.local_id,
            registry,
            store: self.store,
            inbound: inbound_tx,
        };

        let tracker = match &self.config.tracker_url {
            Some(url) => Some(TrackerClient::new(url)?),
            None => None,
        };

        info!(%local_addr, content = %self.content_id, "engine listening");
        tokio::spawn(accept_loop(listener, ctx.clone(), shutdown_rx.clone()));

        if let Some(tracker) = &tracker {
            spawn_announce(
                tracker.clone(),
                ctx.clone(),
                control_tx.clone(),
                self.config.piece_length as i64,
                local_addr,
                AnnounceEvent::Started,
            );
        }

        let event_loop = EventLoop {
            config: self.config.clone(),
            ctx: ctx.clone(),
            tracker,
            local_addr,
            inbound_rx,
            control_rx,
            control_tx,
            shutdown_rx,
            complete_tx,
            announce_period: DEFAULT_ANNOUNCE_INTERVAL,
        };
        tokio::spawn(event_loop.run());

        Ok(EngineHandle {
            local_addr,
            config: self.config,
            ctx,
            shutdown: shutdown_tx,
            complete: complete_rx,
        })
    }
}

/// Control over a started engine, plus its observation surface.
pub struct EngineHandle {
    local_addr: SocketAddr,
    config: EngineConfig,
    ctx: ConnectionCtx,
    shutdown: watch::Sender<bool>,
    complete: watch::Receiver<bool>,
}

impl EngineHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_id(&self) -> PeerId {
        self.ctx.local_id
    }

    pub fn content_id(&self) -> ContentId {
        self.ctx.content_id
    }

    pub fn registry(&self) -> &SwarmRegistry {
        &self.ctx.registry
    }

    pub fn store(&self) -> &PieceStore {
        &self.ctx.store
    }

    /// Where the assembled content lands on completion.
    pub fn output_path(&self) -> PathBuf {
        self.config.root_dir.join(format!(
            "{}.{}",
            self.ctx.content_id.to_hex(),
            self.config.file_extension
        ))
    }

    /// Connects to a peer directly, bypassing tracker discovery.
    pub async fn dial(&self, addr: SocketAddr) -> Result<PeerId, EngineError> {
        dial(self.ctx.clone(), addr).await
    }

    /// Resolves once every piece is present and assembly has run.
    pub async fn wait_complete(&mut self) {
        while !*self.complete.borrow() {
            if self.complete.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stops the listener, closes all peers, and announces `stopped`
    /// best-effort.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn dial(ctx: ConnectionCtx, addr: SocketAddr) -> Result<PeerId, EngineError> {
    let stream = TcpStream::connect(addr).await?;
    spawn_peer(stream, addr, Direction::Outbound, ctx).await
}

async fn accept_loop(
    listener: TcpListener,
    ctx: ConnectionCtx,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "inbound connection");
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = spawn_peer(stream, addr, Direction::Inbound, ctx).await {
                            debug!(%addr, error = %e, "inbound connection dropped");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

enum Control {
    AnnounceDone { interval: u32 },
}

/// The engine's single dispatch task: sole writer of swarm state.
struct EventLoop {
    config: EngineConfig,
    ctx: ConnectionCtx,
    tracker: Option<TrackerClient>,
    local_addr: SocketAddr,
    inbound_rx: mpsc::Receiver<InboundMessage>,
    control_rx: mpsc::Receiver<Control>,
    control_tx: mpsc::Sender<Control>,
    shutdown_rx: watch::Receiver<bool>,
    complete_tx: watch::Sender<bool>,
    announce_period: Duration,
}

impl EventLoop {
    async fn run(mut self) {
        let mut unchoke = tokio::time::interval(self.config.unchoke_interval);
        unchoke.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_announce = Instant::now() + self.announce_period;

        loop {
            tokio::select! {
                message = self.inbound_rx.recv() => match message {
                    Some(message) => self.dispatch(message).await,
                    None => break,
                },
                _ = unchoke.tick() => self.run_unchoke_round(),
                _ = tokio::time::sleep_until(next_announce) => {
                    self.announce(AnnounceEvent::None);
                    next_announce = Instant::now() + self.announce_period;
                }
                outcome = self.control_rx.recv() => {
                    if let Some(Control::AnnounceDone { interval }) = outcome {
                        self.announce_period = clamp_interval(interval);
                    }
                }
                _ = self.shutdown_rx.changed() => break,
            }
        }

        if let Some(tracker) = &self.tracker {
            let farewell = announce_once(
                tracker,
                &self.ctx,
                self.config.piece_length as i64,
                self.local_addr.port(),
                AnnounceEvent::Stopped,
            );
            if tokio::time::timeout(Duration::from_secs(5), farewell).await.is_err() {
                debug!("stopped announce timed out");
            }
        }

        self.ctx.registry.shutdown();
        info!("engine stopped");
    }

    async fn dispatch(&self, message: InboundMessage) {
        let InboundMessage {
            peer_id,
            addr,
            payload,
        } = message;

        let msg = match Message::decode(payload) {
            Ok(msg) => msg,
            Err(e) => {
                // Unknown or malformed messages are dropped, not fatal.
                warn!(peer = ?peer_id, %addr, error = %e, "discarding message");
                return;
            }
        };

        let registry = &self.ctx.registry;
        match msg {
            Message::KeepAlive => trace!(peer = ?peer_id, "keep-alive"),
            Message::Interested => {
                debug!(peer = ?peer_id, "peer interested");
                registry.set_peer_interested(&peer_id, true);
            }
            Message::NotInterested => registry.set_peer_interested(&peer_id, false),
            Message::Choke => registry.set_peer_choking(&peer_id, true),
            Message::Unchoke => {
                debug!(peer = ?peer_id, "peer unchoked us");
                registry.set_peer_choking(&peer_id, false);
                self.flush_pending_requests(&peer_id);
            }
            Message::Have { piece } => registry.set_peer_has(&peer_id, piece),
            Message::Bitfield(bits) => self.handle_bitfield(&peer_id, bits),
            Message::Request { piece } => self.handle_request(&peer_id, piece),
            Message::Piece { piece, data } => self.handle_piece(&peer_id, piece, data).await,
        }
    }

    /// A peer announced its holdings: record them, and if it has anything
    /// we miss, declare interest and line up requests rarest-first.
    fn handle_bitfield(&self, peer_id: &PeerId, bits: Bytes) {
        let registry = &self.ctx.registry;
        let bitfield = Bitfield::from_bytes(bits, self.ctx.store.num_pieces());
        registry.update_peer_bitfield(peer_id, bitfield.clone());

        let wanted = registry.rarest_missing(&self.ctx.store, &bitfield);
        debug!(peer = ?peer_id, pieces = wanted.len(), "peer bitfield received");
        if wanted.is_empty() {
            return;
        }

        let Some(handle) = registry.handle(peer_id) else {
            return;
        };
        if let Err(e) = handle.send(&Message::Interested) {
            warn!(peer = ?peer_id, error = %e, "failed to queue interested");
            return;
        }
        registry.set_am_interested(peer_id, true);
        registry.store_pending_requests(peer_id, wanted);

        // Already unchoked: no need to wait for the next Unchoke.
        if !registry.peer_choking(peer_id) {
            self.flush_pending_requests(peer_id);
        }
    }

    fn flush_pending_requests(&self, peer_id: &PeerId) {
        let registry = &self.ctx.registry;
        let pending = registry.take_pending_requests(peer_id);
        if pending.is_empty() {
            return;
        }
        let Some(handle) = registry.handle(peer_id) else {
            return;
        };

        for (sent, piece) in pending.iter().enumerate() {
            if let Err(e) = handle.send(&Message::Request { piece: *piece }) {
                // Outbox filled up; keep the tail for the next unchoke.
                warn!(peer = ?peer_id, error = %e, "request flush stalled");
                registry.store_pending_requests(peer_id, pending[sent..].to_vec());
                return;
            }
        }
    }

    fn handle_request(&self, peer_id: &PeerId, piece: u32) {
        let registry = &self.ctx.registry;

        if registry.am_choking(peer_id) {
            debug!(peer = ?peer_id, piece, "request from choked peer ignored");
            return;
        }
        let Some(data) = self.ctx.store.get(piece) else {
            debug!(peer = ?peer_id, piece, "requested piece not held");
            return;
        };
        let Some(handle) = registry.handle(peer_id) else {
            return;
        };

        let len = data.len() as i64;
        match handle.send(&Message::Piece { piece, data }) {
            Ok(()) => {
                registry.record_upload(peer_id, len);
                debug!(peer = ?peer_id, piece, bytes = len, "piece served");
            }
            Err(e) => warn!(peer = ?peer_id, piece, error = %e, "failed to queue piece"),
        }
    }

    /// A piece arrived: verify, store, credit the peer, tell the swarm,
    /// and finish the download if it was the last one.
    async fn handle_piece(&self, peer_id: &PeerId, piece: u32, data: Bytes) {
        let store = &self.ctx.store;
        let registry = &self.ctx.registry;

        if !store.verify(piece, &data) {
            warn!(peer = ?peer_id, piece, "piece failed verification, dropped");
            return;
        }

        registry.record_download(peer_id, data.len() as i64);
        if let Err(e) = store.insert(piece, data) {
            warn!(piece, error = %e, "verified piece not stored");
            return;
        }
        debug!(
            peer = ?peer_id,
            piece,
            have = store.received_count(),
            total = store.num_pieces(),
            "piece stored"
        );

        for handle in registry.handles() {
            if let Err(e) = handle.send(&Message::Have { piece }) {
                debug!(peer = ?handle.id(), error = %e, "have broadcast skipped");
            }
        }

        if store.all_received() {
            self.finish().await;
        }
    }

    async fn finish(&self) {
        info!("all pieces received, assembling");
        let written = assemble(
            &self.ctx.store,
            &self.config.root_dir,
            &self.ctx.content_id,
            &self.config.file_extension,
        )
        .await;

        match written {
            Ok(path) => info!(path = %path.display(), "download complete"),
            Err(e) => warn!(error = %e, "assembly failed"),
        }

        let _ = self.complete_tx.send(true);
        self.announce(AnnounceEvent::Completed);
    }

    fn run_unchoke_round(&self) {
        let registry = &self.ctx.registry;
        for action in registry.run_unchoke() {
            let Some(handle) = registry.handle(&action.peer_id) else {
                continue;
            };
            let msg = if action.unchoke {
                Message::Unchoke
            } else {
                Message::Choke
            };
            debug!(peer = ?action.peer_id, unchoke = action.unchoke, "choke flip");
            if let Err(e) = handle.send(&msg) {
                warn!(peer = ?action.peer_id, error = %e, "failed to queue choke flip");
            }
        }
    }

    fn announce(&self, event: AnnounceEvent) {
        if let Some(tracker) = &self.tracker {
            spawn_announce(
                tracker.clone(),
                self.ctx.clone(),
                self.control_tx.clone(),
                self.config.piece_length as i64,
                self.local_addr,
                event,
            );
        }
    }
}

async fn announce_once(
    tracker: &TrackerClient,
    ctx: &ConnectionCtx,
    piece_length: i64,
    port: u16,
    event: AnnounceEvent,
) -> Result<AnnounceResponse, TrackerError> {
    let (uploaded, downloaded) = ctx.registry.totals();
    let left = (ctx.store.num_pieces() - ctx.store.received_count()) as i64 * piece_length;

    tracker
        .announce(AnnounceRequest {
            content_id: &ctx.content_id,
            peer_id: &ctx.local_id,
            port,
            uploaded,
            downloaded,
            left,
            event,
        })
        .await
}

/// Fires one announce in the background; discovered peers get dialed, and
/// the tracker's interval feeds back into the announce timer.
fn spawn_announce(
    tracker: TrackerClient,
    ctx: ConnectionCtx,
    control: mpsc::Sender<Control>,
    piece_length: i64,
    local_addr: SocketAddr,
    event: AnnounceEvent,
) {
    tokio::spawn(async move {
        match announce_once(&tracker, &ctx, piece_length, local_addr.port(), event).await {
            Ok(response) => {
                debug!(
                    interval = response.interval,
                    peers = response.peers.len(),
                    event = event.as_str(),
                    "tracker announce ok"
                );
                let _ = control
                    .send(Control::AnnounceDone {
                        interval: response.interval,
                    })
                    .await;

                for peer in response.peers {
                    let Some(addr) = peer.addr() else { continue };
                    if addr == local_addr || peer.peer_id == Some(*ctx.local_id.as_bytes()) {
                        continue;
                    }
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dial(ctx, addr).await {
                            debug!(%addr, error = %e, "dial failed");
                        }
                    });
                }
            }
            Err(e) => warn!(error = %e, event = event.as_str(), "tracker announce failed"),
        }
    });
}
