use crate::network::messages::GameMessage;
use crate::network::tcp::{TcpClient, TcpEvent};
use crate::session::ClientEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

// ── ClientSession ───────────────────────────────────────────────────────────

/// The player-side session connection.
///
/// Connecting sends JOIN_GAME immediately; from then on every decodable
/// inbound message is delivered, in arrival order, on the event receiver.
/// The connection holds no game state itself; the presentation layer owns
/// this value and passes it to whatever screen needs it.
pub struct ClientSession {
    pub player_id: String,
    pub player_name: String,
    tcp: TcpClient,
    connected: bool,
    _dispatch_handle: tokio::task::JoinHandle<()>,
}

impl ClientSession {
    /// Connect to a host, send the join message, and start the dispatch
    /// loop. Connect failure is returned to the caller; everything after
    /// arrives as `ClientEvent`s.
    pub async fn connect(
        host: &str,
        port: u16,
        player_id: String,
        player_name: String,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), std::io::Error> {
        let (client_event_tx, client_event_rx) = mpsc::channel::<ClientEvent>(64);
        let (tcp_event_tx, tcp_event_rx) = mpsc::channel::<TcpEvent>(128);

        let mut tcp = TcpClient::connect((host, port), tcp_event_tx).await?;

        tcp.send(&GameMessage::JoinGame {
            player_id: player_id.clone(),
            player_name: player_name.clone(),
        })
        .await?;
        log::info!("Joined game at {host}:{port} as \"{player_name}\"");

        let dispatch_handle = Self::spawn_dispatch_loop(tcp_event_rx, client_event_tx);

        Ok((
            Self {
                player_id,
                player_name,
                tcp,
                connected: true,
                _dispatch_handle: dispatch_handle,
            },
            client_event_rx,
        ))
    }

    /// Forward every decoded message to the handler, then the terminal
    /// disconnect signal. Nothing is filtered on the client side.
    fn spawn_dispatch_loop(
        mut tcp_event_rx: mpsc::Receiver<TcpEvent>,
        event_tx: mpsc::Sender<ClientEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = tcp_event_rx.recv().await {
                match event {
                    TcpEvent::MessageReceived { message, .. } => {
                        if event_tx.send(ClientEvent::Message(message)).await.is_err() {
                            break; // handler gone, nothing left to deliver to
                        }
                    }
                    TcpEvent::ClientDisconnected { reason, .. } => {
                        log::info!("Disconnected from host: {reason}");
                        let _ = event_tx.send(ClientEvent::Disconnected { reason }).await;
                        break;
                    }
                    TcpEvent::ClientConnected { .. } => {}
                }
            }
            log::debug!("Client dispatch loop exiting");
        })
    }

    /// Send a message to the host. Returns false, without panicking across
    /// the boundary, when the connection is already gone.
    pub async fn send(&mut self, msg: &GameMessage) -> bool {
        if !self.connected {
            log::debug!("Ignoring send while disconnected: {msg:?}");
            return false;
        }
        match self.tcp.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                log::info!("Send to host failed: {e}");
                false
            }
        }
    }

    /// Toggle this player's ready state.
    pub async fn send_ready(&mut self, is_ready: bool) -> bool {
        let msg = GameMessage::PlayerReady {
            player_id: self.player_id.clone(),
            is_ready,
        };
        self.send(&msg).await
    }

    /// Submit an answer for the question at `question_index`.
    pub async fn submit_answer(&mut self, question_index: usize, answer: String) -> bool {
        let msg = GameMessage::SubmitAnswer {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            question_index,
            answer,
        };
        self.send(&msg).await
    }

    /// Tear down the transport. The reader task exits, dropping its partial
    /// frame buffer with it. Safe to call twice.
    pub fn disconnect(&mut self) {
        if self.connected {
            log::info!("Disconnecting from host");
            self.connected = false;
        }
        self.tcp.shutdown();
    }
}

/// A fresh opaque player id for callers that don't bring their own.
pub fn generate_player_id() -> String {
    Uuid::new_v4().to_string()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::messages::{GameConfig, Player};
    use crate::network::tcp::TcpHost;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    /// A bare TcpHost standing in for a real host session.
    async fn bare_host(port: u16) -> (TcpHost, mpsc::Receiver<TcpEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (TcpHost::start(port, tx).await.unwrap(), rx)
    }

    #[tokio::test]
    async fn test_connect_sends_join_game() {
        let port = free_port().await;
        let (_host, mut host_rx) = bare_host(port).await;

        let (_session, _events) =
            ClientSession::connect("127.0.0.1", port, "p7".into(), "Gina".into())
                .await
                .unwrap();

        // ClientConnected, then the join frame.
        let _ = timeout(TEST_TIMEOUT, host_rx.recv()).await.unwrap().unwrap();
        let ev = timeout(TEST_TIMEOUT, host_rx.recv()).await.unwrap().unwrap();
        match ev {
            TcpEvent::MessageReceived { message, .. } => {
                assert_eq!(
                    message,
                    GameMessage::JoinGame {
                        player_id: "p7".into(),
                        player_name: "Gina".into(),
                    }
                );
            }
            other => panic!("Expected JOIN_GAME, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_message_reaches_handler_in_order() {
        let port = free_port().await;
        let (host, mut host_rx) = bare_host(port).await;

        let (_session, mut events) =
            ClientSession::connect("127.0.0.1", port, "p1".into(), "Ana".into())
                .await
                .unwrap();
        let client_id = match timeout(TEST_TIMEOUT, host_rx.recv()).await.unwrap().unwrap() {
            TcpEvent::ClientConnected { client_id, .. } => client_id,
            other => panic!("Expected ClientConnected, got {other:?}"),
        };

        let outbound = vec![
            GameMessage::GameConfig(GameConfig::default()),
            GameMessage::PlayerListUpdate {
                players: vec![Player {
                    id: "p1".into(),
                    name: "Ana".into(),
                    is_ready: true,
                    is_host: true,
                }],
            },
            GameMessage::GameStart,
            GameMessage::TimeUpdate { time_remaining: 30 },
        ];
        for msg in &outbound {
            assert!(host.send_to_client(client_id, msg).await);
        }

        for expected in &outbound {
            let ev = timeout(TEST_TIMEOUT, events.recv()).await.unwrap().unwrap();
            match ev {
                ClientEvent::Message(msg) => assert_eq!(&msg, expected),
                other => panic!("Expected message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_host_close_delivers_terminal_disconnect() {
        let port = free_port().await;
        let (host, mut host_rx) = bare_host(port).await;

        let (_session, mut events) =
            ClientSession::connect("127.0.0.1", port, "p1".into(), "Ana".into())
                .await
                .unwrap();
        let client_id = match timeout(TEST_TIMEOUT, host_rx.recv()).await.unwrap().unwrap() {
            TcpEvent::ClientConnected { client_id, .. } => client_id,
            other => panic!("Expected ClientConnected, got {other:?}"),
        };

        host.disconnect_client(client_id);

        let ev = timeout(TEST_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert!(matches!(ev, ClientEvent::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_send_after_disconnect_is_a_quiet_noop() {
        let port = free_port().await;
        let (_host, mut host_rx) = bare_host(port).await;

        let (mut session, _events) =
            ClientSession::connect("127.0.0.1", port, "p1".into(), "Ana".into())
                .await
                .unwrap();
        let _ = timeout(TEST_TIMEOUT, host_rx.recv()).await;

        session.disconnect();
        session.disconnect(); // twice is fine

        assert!(!session.send_ready(true).await);
        assert!(!session.submit_answer(0, "France".into()).await);
    }

    #[test]
    fn test_generated_player_ids_are_unique() {
        let a = generate_player_id();
        let b = generate_player_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
