use crate::network::messages::{encode_message, GameMessage, MessageDecoder};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

// ── Constants ───────────────────────────────────────────────────────────────

/// Read buffer size for one inbound chunk.
const READ_CHUNK_SIZE: usize = 4096;

// ── Event types ─────────────────────────────────────────────────────────────

/// Events produced by the TCP layer and consumed by the session layer.
#[derive(Debug)]
pub enum TcpEvent {
    /// A new client connected (before its JOIN_GAME is received).
    ClientConnected { client_id: u32, addr: SocketAddr },
    /// A complete frame was decoded from a connection.
    MessageReceived { client_id: u32, message: GameMessage },
    /// A connection ended (EOF, socket error, or local shutdown).
    ClientDisconnected { client_id: u32, reason: String },
}

// ── TcpHost ─────────────────────────────────────────────────────────────────

/// A client's write half plus metadata, stored in the host's connection map.
struct ClientConnection {
    writer: OwnedWriteHalf,
    #[allow(dead_code)]
    connected_at: Instant,
}

/// Host-side TCP server: accepts connections, reads and writes framed
/// messages. Game logic lives above this layer; the host only moves frames.
pub struct TcpHost {
    connections: Arc<Mutex<HashMap<u32, ClientConnection>>>,
    local_addr: SocketAddr,
    /// Handle to the accept-loop task so we can abort on shutdown.
    accept_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Sender used to cancel per-client reader tasks.
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl TcpHost {
    /// Bind and start accepting connections. Events flow into `event_tx`.
    ///
    /// A bind failure (port in use, no permission) is returned to the caller
    /// once; no retry is attempted here.
    pub async fn start(
        port: u16,
        event_tx: mpsc::Sender<TcpEvent>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = listener.local_addr()?;
        log::info!("Game host listening on {local_addr}");

        let connections: Arc<Mutex<HashMap<u32, ClientConnection>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

        let conns = connections.clone();
        let sd_tx = shutdown_tx.clone();

        let accept_handle = tokio::spawn(async move {
            let mut next_client_id = 1u32;
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        log::error!("TCP accept error: {e}");
                        continue;
                    }
                };

                let client_id = next_client_id;
                next_client_id += 1;

                log::info!("Client {client_id} connected from {addr}");

                let (reader, writer) = stream.into_split();

                {
                    let mut map = conns.lock();
                    map.insert(
                        client_id,
                        ClientConnection {
                            writer,
                            connected_at: Instant::now(),
                        },
                    );
                }

                let _ = event_tx
                    .send(TcpEvent::ClientConnected { client_id, addr })
                    .await;

                // Spawn the reader task for this client.
                let ev_tx = event_tx.clone();
                let conns2 = conns.clone();
                let sd_rx = sd_tx.subscribe();
                tokio::spawn(async move {
                    let reason = read_loop(reader, client_id, &ev_tx, sd_rx).await;
                    let _ = ev_tx
                        .send(TcpEvent::ClientDisconnected { client_id, reason })
                        .await;
                    conns2.lock().remove(&client_id);
                });
            }
        });

        Ok(Self {
            connections,
            local_addr,
            accept_handle: Mutex::new(Some(accept_handle)),
            shutdown_tx,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of open connections (joined or not).
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Send a message to one client. Returns false if the client is gone or
    /// the write fails; a failed connection is dropped from the map.
    pub async fn send_to_client(&self, client_id: u32, msg: &GameMessage) -> bool {
        let frame = match encode_message(msg) {
            Ok(f) => f,
            Err(e) => {
                log::error!("Failed to encode outbound message: {e}");
                return false;
            }
        };

        // The write needs &mut and the mutex can't be held across an await,
        // so take the writer out, write, then re-insert.
        let mut conn = {
            let mut map = self.connections.lock();
            match map.remove(&client_id) {
                Some(conn) => conn,
                None => return false,
            }
        };

        let success = conn.writer.write_all(&frame).await.is_ok();

        if success {
            log::debug!("Sent to client {client_id}: {msg:?}");
            self.connections.lock().insert(client_id, conn);
        } else {
            log::info!("Failed to send to client {client_id}, dropping connection");
        }

        success
    }

    /// Broadcast a message to all connected clients. Per-client ordering is
    /// preserved; delivery across clients is not atomic.
    pub async fn broadcast(&self, msg: &GameMessage) {
        let client_ids: Vec<u32> = {
            let map = self.connections.lock();
            map.keys().copied().collect()
        };
        for cid in client_ids {
            self.send_to_client(cid, msg).await;
        }
    }

    /// Disconnect and remove one client.
    pub fn disconnect_client(&self, client_id: u32) {
        let removed = self.connections.lock().remove(&client_id);
        if let Some(mut conn) = removed {
            // Shutdown the write half so the remote reader gets EOF.
            let _ = conn.writer.shutdown();
            log::info!("Client {client_id} disconnected by host");
        }
    }

    /// Shut down: stop accepting, signal reader tasks, close all
    /// connections, release the listening socket. Safe to call twice.
    pub fn shutdown(&self) {
        if let Some(handle) = self.accept_handle.lock().take() {
            handle.abort();
        }
        let _ = self.shutdown_tx.send(());
        let mut map = self.connections.lock();
        for (cid, mut conn) in map.drain() {
            let _ = conn.writer.shutdown();
            log::info!("Client {cid} disconnected (host shutdown)");
        }
    }
}

impl Drop for TcpHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read chunks from one connection, feed the frame decoder, and forward
/// every decoded message. Returns the disconnect reason.
async fn read_loop(
    mut reader: tokio::net::tcp::OwnedReadHalf,
    client_id: u32,
    event_tx: &mpsc::Sender<TcpEvent>,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) -> String {
    let mut decoder = MessageDecoder::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        tokio::select! {
            result = reader.read(&mut chunk) => {
                match result {
                    Ok(0) => {
                        log::info!("Client {client_id}: connection closed (EOF)");
                        return "connection closed".into();
                    }
                    Ok(n) => {
                        for message in decoder.push(&chunk[..n]) {
                            log::debug!("Client {client_id}: received {message:?}");
                            let _ = event_tx.send(TcpEvent::MessageReceived {
                                client_id,
                                message,
                            }).await;
                        }
                    }
                    Err(e) => {
                        log::info!("Client {client_id}: read error: {e}");
                        return format!("read error: {e}");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                log::debug!("Client {client_id}: shutdown signal");
                return "host shutdown".into();
            }
        }
    }
}

// ── TcpClient ───────────────────────────────────────────────────────────────

/// Player-side TCP connection: connects to a host, reads and writes framed
/// messages. The host end is reported with `client_id` 0 in events.
pub struct TcpClient {
    writer: Option<OwnedWriteHalf>,
    _reader_handle: tokio::task::JoinHandle<()>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl TcpClient {
    /// Connect to a host and start the reader loop. Events flow into
    /// `event_tx`. Connect failure is returned to the caller.
    pub async fn connect<A: tokio::net::ToSocketAddrs>(
        addr: A,
        event_tx: mpsc::Sender<TcpEvent>,
    ) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        if let Ok(peer) = stream.peer_addr() {
            log::info!("Connected to host at {peer}");
        }

        let (reader, writer) = stream.into_split();
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let sd_rx = shutdown_tx.subscribe();

        let ev_tx = event_tx.clone();
        let reader_handle = tokio::spawn(async move {
            let reason = read_loop(reader, 0, &ev_tx, sd_rx).await;
            let _ = ev_tx
                .send(TcpEvent::ClientDisconnected {
                    client_id: 0,
                    reason,
                })
                .await;
        });

        Ok(Self {
            writer: Some(writer),
            _reader_handle: reader_handle,
            shutdown_tx,
        })
    }

    /// Send a message to the host.
    pub async fn send(&mut self, msg: &GameMessage) -> Result<(), std::io::Error> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected")
        })?;
        let frame = encode_message(msg)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        log::debug!("Sending to host: {msg:?}");
        writer.write_all(&frame).await
    }

    /// Shut down the connection; the reader task exits on the signal.
    pub fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(mut w) = self.writer.take() {
            tokio::spawn(async move {
                let _ = w.shutdown().await;
            });
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
