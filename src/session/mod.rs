pub mod client;
pub mod host;

use crate::network::messages::{GameMessage, Player, PlayerAnswers, Question};
use client::ClientSession;
use host::HostSession;

// ── Session events ──────────────────────────────────────────────────────────

/// Events emitted by the hosting side to the presentation layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// A player joined the roster.
    PlayerJoined { player: Player },
    /// A player disconnected and was removed from the roster.
    PlayerLeft {
        player_id: String,
        player_name: String,
    },
    /// The game left the lobby; questions follow.
    GameStarted,
    /// A question went out to all players.
    QuestionPosted { question: Question },
    /// The grace period elapsed and the final aggregate was broadcast.
    ResultsReady { all_answers: Vec<PlayerAnswers> },
    /// The session ended (explicit stop or host-player disconnect).
    Stopped { reason: String },
}

/// Events delivered by a client connection to the presentation layer.
///
/// Every decodable message reaches the handler; `Disconnected` is terminal.
#[derive(Debug)]
pub enum ClientEvent {
    Message(GameMessage),
    Disconnected { reason: String },
}

// ── Session coordinator ─────────────────────────────────────────────────────

/// Top-level session state. The presentation layer holds exactly one of
/// these and passes it to whatever screen needs it; there is no global
/// connection handle.
#[derive(Default)]
pub enum Session {
    Host(HostSession),
    Client(ClientSession),
    #[default]
    None,
}

impl Session {
    /// Returns `true` if there is an active session (host or client).
    pub fn is_active(&self) -> bool {
        !matches!(self, Session::None)
    }

    /// Shut down whatever session is active and transition to `None`.
    pub async fn shutdown(&mut self) {
        let old = std::mem::take(self);
        match old {
            Session::Host(host) => host.stop().await,
            Session::Client(mut client) => client.disconnect(),
            Session::None => {}
        }
    }
}
