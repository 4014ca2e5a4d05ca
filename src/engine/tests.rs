use super::*;
use crate::metainfo::{ContentId, Metainfo};
use crate::peer::{
    read_handshake, send_handshake, FrameReader, FrameWriter, Handshake, Message, PeerError,
    PeerId,
};
use crate::storage::PieceStore;
use crate::swarm::SwarmError;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

fn hash(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

fn content_id() -> ContentId {
    ContentId::from_bytes([9; 20])
}

fn test_config(root: &Path) -> EngineConfig {
    EngineConfig {
        root_dir: root.to_path_buf(),
        file_extension: "txt".to_string(),
        piece_length: 5,
        unchoke_interval: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

async fn start_engine(root: &Path, store: PieceStore) -> EngineHandle {
    Engine::new(test_config(root), content_id(), store)
        .start()
        .await
        .unwrap()
}

/// A bare test peer speaking the wire protocol over one TCP stream.
struct RawPeer {
    reader: FrameReader<tokio::net::tcp::OwnedReadHalf>,
    writer: FrameWriter<tokio::net::tcp::OwnedWriteHalf>,
}

impl RawPeer {
    async fn connect(engine: &EngineHandle, id: PeerId) -> Self {
        let mut stream = TcpStream::connect(engine.local_addr()).await.unwrap();

        let ours = Handshake::new(*engine.content_id().as_bytes(), id.0);
        send_handshake(&mut stream, &ours).await.unwrap();
        let theirs = read_handshake(&mut stream).await.unwrap();
        assert_eq!(theirs.peer_id, *engine.peer_id().as_bytes());

        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        }
    }

    async fn send(&mut self, message: &Message) {
        self.writer.write_frame(&message.encode()).await.unwrap();
    }

    async fn recv(&mut self) -> Message {
        let payload = timeout(Duration::from_secs(5), self.reader.read_frame())
            .await
            .expect("no frame within timeout")
            .unwrap();
        Message::decode(payload).unwrap()
    }
}

#[tokio::test]
async fn test_two_seeder_download_assembles_content() {
    let dir = tempfile::tempdir().unwrap();
    let hashes = vec![hash(b"hello"), hash(b"world")];

    let seeder_a = PieceStore::with_hashes(hashes.clone());
    seeder_a.insert(0, Bytes::from_static(b"hello")).unwrap();
    let seeder_b = PieceStore::with_hashes(hashes.clone());
    seeder_b.insert(1, Bytes::from_static(b"world")).unwrap();

    let a = start_engine(dir.path(), seeder_a).await;
    let b = start_engine(dir.path(), seeder_b).await;
    let mut c = start_engine(dir.path(), PieceStore::with_hashes(hashes)).await;

    c.dial(a.local_addr()).await.unwrap();
    c.dial(b.local_addr()).await.unwrap();

    timeout(Duration::from_secs(20), c.wait_complete())
        .await
        .expect("download did not complete");

    let written = tokio::fs::read(c.output_path()).await.unwrap();
    assert_eq!(written, b"helloworld");
    assert!(c.store().all_received());

    a.shutdown();
    b.shutdown();
    c.shutdown();
}

#[tokio::test]
async fn test_self_connection_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start_engine(dir.path(), PieceStore::new(1)).await;

    let result = engine.dial(engine.local_addr()).await;
    assert!(matches!(
        result,
        Err(EngineError::Peer(PeerError::SelfConnection))
    ));

    // The inbound side rejects it too; nothing may linger in the registry.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.registry().peer_count(), 0);

    engine.shutdown();
}

#[tokio::test]
async fn test_duplicate_connection_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = start_engine(dir.path(), PieceStore::new(1)).await;
    let c = start_engine(dir.path(), PieceStore::new(1)).await;

    c.dial(a.local_addr()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let second = c.dial(a.local_addr()).await;
    assert!(matches!(
        second,
        Err(EngineError::Swarm(SwarmError::DuplicatePeer(_)))
    ));
    assert_eq!(c.registry().peer_count(), 1);

    a.shutdown();
    c.shutdown();
}

#[tokio::test]
async fn test_corrupt_piece_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start_engine(dir.path(), PieceStore::with_hashes(vec![hash(b"hello")])).await;

    let remote_id = PeerId([0x55; 20]);
    let mut peer = RawPeer::connect(&engine, remote_id).await;

    // Registration bitfield comes first.
    assert!(matches!(peer.recv().await, Message::Bitfield(_)));

    // Claim piece 0; the engine declares interest and requests it once
    // unchoked.
    peer.send(&Message::Bitfield(Bytes::from_static(&[0b1000_0000])))
        .await;
    assert_eq!(peer.recv().await, Message::Interested);
    peer.send(&Message::Unchoke).await;
    assert_eq!(peer.recv().await, Message::Request { piece: 0 });

    // Serve bytes that do not hash to the expected value.
    peer.send(&Message::Piece {
        piece: 0,
        data: Bytes::from_static(b"hellx"),
    })
    .await;

    sleep(Duration::from_millis(200)).await;

    // The piece stays missing, the peer gets no download credit, and no
    // Have goes out.
    assert_eq!(engine.store().received_count(), 0);
    let state = engine.registry().state(&remote_id).unwrap();
    assert_eq!(state.downloaded, 0);
    assert!(
        timeout(Duration::from_millis(300), peer.reader.read_frame())
            .await
            .is_err()
    );

    engine.shutdown();
}

#[tokio::test]
async fn test_keep_alive_is_inert() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start_engine(dir.path(), PieceStore::new(1)).await;

    let remote_id = PeerId([0x66; 20]);
    let mut peer = RawPeer::connect(&engine, remote_id).await;
    assert!(matches!(peer.recv().await, Message::Bitfield(_)));
    assert!(engine.registry().contains(&remote_id));

    // A zero-length frame changes nothing and closes nothing.
    peer.send(&Message::KeepAlive).await;
    sleep(Duration::from_millis(100)).await;
    assert!(engine.registry().contains(&remote_id));
    let state = engine.registry().state(&remote_id).unwrap();
    assert!(!state.peer_interested);

    // The connection still works: interest gets us unchoked on the next
    // scheduler round.
    peer.send(&Message::Interested).await;
    assert_eq!(peer.recv().await, Message::Unchoke);

    engine.shutdown();
}

#[tokio::test]
async fn test_request_while_choked_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = PieceStore::new(1);
    store.insert(0, Bytes::from_static(b"data!")).unwrap();
    let engine = start_engine(dir.path(), store).await;

    let mut peer = RawPeer::connect(&engine, PeerId([0x77; 20])).await;
    assert!(matches!(peer.recv().await, Message::Bitfield(_)));

    // Never declared interest, never unchoked: the request goes nowhere.
    peer.send(&Message::Request { piece: 0 }).await;
    assert!(
        timeout(Duration::from_millis(400), peer.reader.read_frame())
            .await
            .is_err()
    );

    engine.shutdown();
}

#[tokio::test]
async fn test_from_metainfo_wires_content_id_and_store() {
    let mut pieces = Vec::new();
    pieces.extend_from_slice(&hash(b"hello"));
    pieces.extend_from_slice(&hash(b"world"));

    let mut doc = Vec::new();
    doc.extend_from_slice(b"d8:announce21:http://localhost:70004:infod6:lengthi10e4:name8:greeting12:piece lengthi5e6:pieces40:");
    doc.extend_from_slice(&pieces);
    doc.extend_from_slice(b"ee");
    let meta = Metainfo::from_bytes(&doc).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::from_metainfo(test_config(dir.path()), &meta);

    // The announce to the document's (dead) tracker fails softly; the
    // engine starts regardless.
    let handle = engine.start().await.unwrap();
    assert_eq!(handle.content_id(), meta.content_id);
    assert_eq!(handle.store().num_pieces(), 2);
    handle.shutdown();
}
