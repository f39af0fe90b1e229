use crate::game::collector::AnswerCollector;
use crate::game::questions::{QuestionSupply, QuestionSupplyError};
use crate::game::roster::Roster;
use crate::game::sequencer::QuestionSequencer;
use crate::game::timer::{QuestionTimer, TimerEvent};
use crate::network::messages::{Answer, GameConfig, GameMessage, Player, Question};
use crate::network::tcp::{TcpEvent, TcpHost};
use crate::session::SessionEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

// ── Constants ───────────────────────────────────────────────────────────────

/// Delay between sequence exhaustion and the final aggregate, absorbing
/// in-flight last-second answers.
pub const RESULTS_GRACE_PERIOD: Duration = Duration::from_secs(3);

const STOP_REASON_HOST_ENDED: &str = "Host ended the game";
const STOP_REASON_HOST_LEFT: &str = "Host left the game";

// ── Phases ──────────────────────────────────────────────────────────────────

/// The host-side progression state machine. Transitions only move forward;
/// a new game needs a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// Accepting joins and ready-toggles, waiting for the start action.
    Lobby,
    /// Questions are live; the timer drives advancement.
    Playing,
    /// Sequence exhausted; grace period running before results.
    Calculating,
    /// Results broadcast, or the session was stopped.
    Ended,
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Why `start_game` refused to start.
#[derive(Debug)]
pub enum StartGameError {
    /// The session is not in the lobby (already started or stopped).
    NotInLobby,
    /// Starting with zero players is not allowed.
    NoPlayers,
    /// At least one roster member is not ready.
    NotAllReady,
    /// The question supply produced nothing usable.
    Supply(QuestionSupplyError),
}

impl std::fmt::Display for StartGameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInLobby => write!(f, "game already started or session stopped"),
            Self::NoPlayers => write!(f, "cannot start with no players"),
            Self::NotAllReady => write!(f, "not all players are ready"),
            Self::Supply(e) => write!(f, "question supply failed: {e}"),
        }
    }
}

impl std::error::Error for StartGameError {}

// ── Internal state ──────────────────────────────────────────────────────────

/// Fired by the grace-period task when the delay elapses.
struct GraceElapsed;

/// Everything the event loop and the public methods both touch. Guarded by
/// one mutex so every operation is atomic with respect to the others.
struct HostState {
    phase: HostPhase,
    config: GameConfig,
    roster: Roster,
    sequencer: Option<QuestionSequencer>,
    collector: AnswerCollector,
    timer: QuestionTimer,
    /// Display names of players who left mid-game, for result attribution.
    departed_names: HashMap<String, String>,
    /// Transport client id → player id, filled in when JOIN_GAME arrives.
    client_players: HashMap<u32, String>,
    grace_handle: Option<tokio::task::JoinHandle<()>>,
    stopped: bool,
}

/// Handles shared between the event loop and the session's public surface.
#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<HostState>>,
    tcp: Arc<TcpHost>,
    event_tx: mpsc::Sender<SessionEvent>,
    timer_tx: mpsc::Sender<TimerEvent>,
    grace_tx: mpsc::Sender<GraceElapsed>,
}

// ── HostSession ─────────────────────────────────────────────────────────────

/// The host-side session controller.
///
/// Owns the listening socket, the roster, the question sequencer, the
/// answer collector and the countdown timer for the lifetime of one hosted
/// game. All inbound messages and timer events are processed on a single
/// event loop task; public methods synchronize through the same state lock.
pub struct HostSession {
    pub session_name: String,
    shared: Shared,
    supply: Arc<dyn QuestionSupply + Send + Sync>,
    event_loop_handle: Option<tokio::task::JoinHandle<()>>,
}

impl HostSession {
    /// Bind the listening socket and start processing connections.
    ///
    /// A bind failure is reported here once; no retry is attempted. The
    /// caller receives `SessionEvent`s on the returned receiver.
    pub async fn start(
        session_name: String,
        config: GameConfig,
        supply: Arc<dyn QuestionSupply + Send + Sync>,
        port: u16,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), std::io::Error> {
        let (session_event_tx, session_event_rx) = mpsc::channel::<SessionEvent>(64);
        let (tcp_event_tx, tcp_event_rx) = mpsc::channel::<TcpEvent>(128);
        let (timer_tx, timer_rx) = mpsc::channel::<TimerEvent>(32);
        let (grace_tx, grace_rx) = mpsc::channel::<GraceElapsed>(1);

        let tcp = Arc::new(TcpHost::start(port, tcp_event_tx).await?);

        let shared = Shared {
            state: Arc::new(Mutex::new(HostState {
                phase: HostPhase::Lobby,
                config,
                roster: Roster::new(),
                sequencer: None,
                collector: AnswerCollector::new(),
                timer: QuestionTimer::new(),
                departed_names: HashMap::new(),
                client_players: HashMap::new(),
                grace_handle: None,
                stopped: false,
            })),
            tcp,
            event_tx: session_event_tx,
            timer_tx,
            grace_tx,
        };

        let event_loop_handle =
            Self::spawn_event_loop(tcp_event_rx, timer_rx, grace_rx, shared.clone());

        log::info!(
            "Host session \"{session_name}\" started on port {}",
            shared.tcp.local_addr().port()
        );

        Ok((
            Self {
                session_name,
                shared,
                supply,
                event_loop_handle: Some(event_loop_handle),
            },
            session_event_rx,
        ))
    }

    /// The single task that serializes all game-state transitions.
    fn spawn_event_loop(
        mut tcp_event_rx: mpsc::Receiver<TcpEvent>,
        mut timer_rx: mpsc::Receiver<TimerEvent>,
        mut grace_rx: mpsc::Receiver<GraceElapsed>,
        shared: Shared,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = tcp_event_rx.recv() => match event {
                        TcpEvent::ClientConnected { client_id, addr } => {
                            log::info!(
                                "Client {client_id} connected from {addr}, awaiting JOIN_GAME"
                            );
                        }
                        TcpEvent::MessageReceived { client_id, message } => {
                            handle_message(client_id, message, &shared).await;
                        }
                        TcpEvent::ClientDisconnected { client_id, reason } => {
                            handle_disconnect(client_id, &reason, &shared).await;
                        }
                    },
                    Some(event) = timer_rx.recv() => {
                        handle_timer_event(event, &shared).await;
                    }
                    Some(GraceElapsed) = grace_rx.recv() => {
                        finalize_results(&shared).await;
                    }
                    else => break,
                }
            }
            log::debug!("Host event loop exiting");
        })
    }

    /// Explicit host-issued start. Requires the lobby phase, a non-empty
    /// roster, and every member ready; generates the question sequence,
    /// broadcasts the start signal and the first question, and arms the
    /// timer.
    pub async fn start_game(&self) -> Result<(), StartGameError> {
        let (count, levels) = {
            let st = self.shared.state.lock();
            if st.stopped || st.phase != HostPhase::Lobby {
                return Err(StartGameError::NotInLobby);
            }
            if st.roster.is_empty() {
                return Err(StartGameError::NoPlayers);
            }
            if !st.roster.all_ready() {
                return Err(StartGameError::NotAllReady);
            }
            (st.config.questions_count, st.config.difficulty_levels.clone())
        };

        let questions = self
            .supply
            .fetch_questions(count, &levels)
            .map_err(StartGameError::Supply)?;

        let first = {
            let mut guard = self.shared.state.lock();
            let st = &mut *guard;
            // Re-check: a stop may have raced the fetch.
            if st.stopped || st.phase != HostPhase::Lobby {
                return Err(StartGameError::NotInLobby);
            }
            let sequencer = QuestionSequencer::new(questions);
            let Some(first) = sequencer.current() else {
                return Err(StartGameError::Supply(
                    QuestionSupplyError::NoMatchingQuestions,
                ));
            };
            st.sequencer = Some(sequencer);
            st.phase = HostPhase::Playing;
            st.timer
                .start(st.config.time_per_question, self.shared.timer_tx.clone());
            first
        };

        log::info!(
            "Game started: {} questions, {}s each",
            count,
            self.shared.state.lock().config.time_per_question
        );

        self.shared.tcp.broadcast(&GameMessage::GameStart).await;
        self.shared
            .tcp
            .broadcast(&GameMessage::NewQuestion(first.clone()))
            .await;

        let _ = self.shared.event_tx.send(SessionEvent::GameStarted).await;
        let _ = self
            .shared
            .event_tx
            .send(SessionEvent::QuestionPosted { question: first })
            .await;
        Ok(())
    }

    /// Replace the lobby configuration and push it to everyone. Returns
    /// false once the game has started; the config is immutable from then.
    pub async fn update_config(&self, config: GameConfig) -> bool {
        {
            let mut st = self.shared.state.lock();
            if st.stopped || st.phase != HostPhase::Lobby {
                return false;
            }
            st.config = config.clone();
        }
        self.shared
            .tcp
            .broadcast(&GameMessage::GameConfig(config))
            .await;
        true
    }

    /// Stop the session: notify every client, then close all connections
    /// and release the listening socket. Idempotent; a second call does
    /// nothing and does not re-broadcast.
    pub async fn stop(&self) {
        stop_session(&self.shared, STOP_REASON_HOST_ENDED).await;
    }

    // ── Snapshots for the presentation layer ────────────────────────────

    pub fn phase(&self) -> HostPhase {
        self.shared.state.lock().phase
    }

    pub fn players(&self) -> Vec<Player> {
        self.shared.state.lock().roster.players().to_vec()
    }

    pub fn player_count(&self) -> usize {
        self.shared.state.lock().roster.len()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.tcp.local_addr()
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
        // Last-resort teardown; the explicit path is stop().
        self.shared.tcp.shutdown();
        let mut st = self.shared.state.lock();
        st.timer.cancel();
        if let Some(handle) = st.grace_handle.take() {
            handle.abort();
        }
    }
}

// ── Event handlers ──────────────────────────────────────────────────────────
//
// Free functions over `Shared` so the event loop and public methods reuse
// the exact same transitions. The state lock is never held across an await.

/// Process one inbound message from a client connection.
async fn handle_message(client_id: u32, message: GameMessage, shared: &Shared) {
    match message {
        GameMessage::JoinGame {
            player_id,
            player_name,
        } => {
            let joined = {
                let mut guard = shared.state.lock();
                let st = &mut *guard;
                if st.stopped {
                    return;
                }
                let player = st.roster.join(player_id.clone(), player_name).clone();
                st.client_players.insert(client_id, player_id);
                Some((
                    GameMessage::GameConfig(st.config.clone()),
                    GameMessage::PlayerListUpdate {
                        players: st.roster.players().to_vec(),
                    },
                    player,
                ))
            };
            if let Some((config_msg, list_msg, player)) = joined {
                shared.tcp.send_to_client(client_id, &config_msg).await;
                shared.tcp.broadcast(&list_msg).await;
                let _ = shared
                    .event_tx
                    .send(SessionEvent::PlayerJoined { player })
                    .await;
            }
        }

        GameMessage::PlayerReady {
            player_id,
            is_ready,
        } => {
            let list_msg = {
                let mut guard = shared.state.lock();
                let st = &mut *guard;
                if st.stopped {
                    return;
                }
                // Unknown ids are a no-op; we still re-broadcast the roster.
                st.roster.set_ready(&player_id, is_ready);
                GameMessage::PlayerListUpdate {
                    players: st.roster.players().to_vec(),
                }
            };
            shared.tcp.broadcast(&list_msg).await;
        }

        GameMessage::SubmitAnswer {
            player_id,
            player_name,
            question_index,
            answer,
        } => {
            let mut guard = shared.state.lock();
            let st = &mut *guard;
            let Some(sequencer) = st.sequencer.as_ref() else {
                log::debug!("Dropping answer from {player_id}: game not running");
                return;
            };
            match sequencer.by_index(question_index) {
                Some(question) => {
                    let record = Answer::new(
                        question_index,
                        player_id.clone(),
                        player_name,
                        answer,
                        question.country.name.clone(),
                        question.country.image_key.clone(),
                    );
                    st.collector.record(&player_id, record);
                }
                None => {
                    log::debug!(
                        "Dropping answer from {player_id} for unknown question index {question_index}"
                    );
                }
            }
        }

        other => {
            log::debug!("Ignoring unexpected message from client {client_id}: {other:?}");
        }
    }
}

/// Outcome of removing a disconnected client from the session.
enum DisconnectOutcome {
    /// The connection never joined, or the session is already stopping.
    Ignore,
    /// A regular player left; broadcast the departure.
    PlayerLeft(Player, GameMessage),
    /// The host-designated player left; the session cannot continue.
    HostLeft,
}

/// Process a closed client connection.
async fn handle_disconnect(client_id: u32, reason: &str, shared: &Shared) {
    let outcome = {
        let mut guard = shared.state.lock();
        let st = &mut *guard;
        if st.stopped {
            DisconnectOutcome::Ignore
        } else {
            match st
                .client_players
                .remove(&client_id)
                .and_then(|pid| st.roster.remove(&pid))
            {
                None => DisconnectOutcome::Ignore,
                Some(player) if player.is_host => DisconnectOutcome::HostLeft,
                Some(player) => {
                    st.departed_names
                        .insert(player.id.clone(), player.name.clone());
                    let list_msg = GameMessage::PlayerListUpdate {
                        players: st.roster.players().to_vec(),
                    };
                    DisconnectOutcome::PlayerLeft(player, list_msg)
                }
            }
        }
    };

    match outcome {
        DisconnectOutcome::Ignore => {}
        DisconnectOutcome::HostLeft => {
            log::info!("Host player disconnected ({reason}); stopping session");
            stop_session(shared, STOP_REASON_HOST_LEFT).await;
        }
        DisconnectOutcome::PlayerLeft(player, list_msg) => {
            log::info!("Player {} left ({reason})", player.name);
            shared
                .tcp
                .broadcast(&GameMessage::PlayerLeft {
                    player_id: player.id.clone(),
                    player_name: player.name.clone(),
                })
                .await;
            shared.tcp.broadcast(&list_msg).await;
            let _ = shared
                .event_tx
                .send(SessionEvent::PlayerLeft {
                    player_id: player.id,
                    player_name: player.name,
                })
                .await;
        }
    }
}

/// Process a countdown event for the current question.
async fn handle_timer_event(event: TimerEvent, shared: &Shared) {
    match event {
        TimerEvent::Tick { remaining } => {
            let playing = {
                let st = shared.state.lock();
                !st.stopped && st.phase == HostPhase::Playing
            };
            if playing {
                shared
                    .tcp
                    .broadcast(&GameMessage::TimeUpdate {
                        time_remaining: remaining,
                    })
                    .await;
            }
        }
        TimerEvent::Expired => advance_question(shared).await,
    }
}

/// What the expiry handler decided while holding the lock.
enum Advance {
    Question(Question),
    Calculating,
    Nothing,
}

/// Move to the next question, or into the grace period when the sequence
/// is exhausted.
async fn advance_question(shared: &Shared) {
    let next = {
        let mut guard = shared.state.lock();
        let st = &mut *guard;
        if st.stopped || st.phase != HostPhase::Playing {
            Advance::Nothing
        } else {
            st.timer.cancel();
            match st.sequencer.as_mut().and_then(QuestionSequencer::advance) {
                Some(question) => {
                    st.timer
                        .start(st.config.time_per_question, shared.timer_tx.clone());
                    Advance::Question(question)
                }
                None => {
                    st.phase = HostPhase::Calculating;
                    let grace_tx = shared.grace_tx.clone();
                    st.grace_handle = Some(tokio::spawn(async move {
                        tokio::time::sleep(RESULTS_GRACE_PERIOD).await;
                        let _ = grace_tx.send(GraceElapsed).await;
                    }));
                    Advance::Calculating
                }
            }
        }
    };

    match next {
        Advance::Nothing => {}
        Advance::Question(question) => {
            shared
                .tcp
                .broadcast(&GameMessage::NewQuestion(question.clone()))
                .await;
            let _ = shared
                .event_tx
                .send(SessionEvent::QuestionPosted { question })
                .await;
        }
        Advance::Calculating => {
            log::info!(
                "Question sequence exhausted; collecting results in {}s",
                RESULTS_GRACE_PERIOD.as_secs()
            );
            shared.tcp.broadcast(&GameMessage::CalculatingResults).await;
        }
    }
}

/// Grace period over: build and broadcast the final aggregate.
async fn finalize_results(shared: &Shared) {
    let aggregate = {
        let mut guard = shared.state.lock();
        let st = &mut *guard;
        if st.stopped || st.phase != HostPhase::Calculating {
            None
        } else {
            st.phase = HostPhase::Ended;
            st.grace_handle = None;
            let HostState {
                roster,
                departed_names,
                collector,
                ..
            } = st;
            let all = collector.drain_all(|id| {
                roster
                    .get(id)
                    .map(|p| p.name.clone())
                    .or_else(|| departed_names.get(id).cloned())
            });
            collector.clear();
            Some(all)
        }
    };

    if let Some(all_answers) = aggregate {
        log::info!(
            "Game over: broadcasting results for {} player(s)",
            all_answers.len()
        );
        shared
            .tcp
            .broadcast(&GameMessage::GameEnd {
                all_answers: all_answers.clone(),
            })
            .await;
        let _ = shared
            .event_tx
            .send(SessionEvent::ResultsReady { all_answers })
            .await;
    }
}

/// The one terminal transition: notify every client, then tear down the
/// transport. Guarded so a second call is a no-op.
async fn stop_session(shared: &Shared, reason: &str) {
    let proceed = {
        let mut st = shared.state.lock();
        if st.stopped {
            false
        } else {
            st.stopped = true;
            st.phase = HostPhase::Ended;
            st.timer.cancel();
            if let Some(handle) = st.grace_handle.take() {
                handle.abort();
            }
            st.client_players.clear();
            true
        }
    };

    if proceed {
        log::info!("Stopping session: {reason}");
        // SERVER_STOPPED must reach every client before its socket closes.
        shared
            .tcp
            .broadcast(&GameMessage::ServerStopped {
                reason: reason.to_string(),
            })
            .await;
        shared.tcp.shutdown();
        let _ = shared
            .event_tx
            .send(SessionEvent::Stopped {
                reason: reason.to_string(),
            })
            .await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
