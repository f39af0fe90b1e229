use serde::{Deserialize, Serialize};

// ── Shared game data types ──────────────────────────────────────────────────

/// A player as tracked by the host and mirrored to every client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub is_ready: bool,
    pub is_host: bool,
}

/// Session configuration, set by the host before start and pushed to each
/// joining client. Immutable once the game starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub questions_count: u32,
    pub time_per_question: u32,
    pub difficulty_levels: Vec<u8>,
}

/// Bounds for the configuration screen. Values outside these are clamped
/// by `GameConfig::clamped`.
pub const MIN_QUESTIONS: u32 = 5;
pub const MAX_QUESTIONS: u32 = 50;
pub const MIN_TIME: u32 = 10;
pub const MAX_TIME: u32 = 120;

/// Default TCP port for game sessions.
pub const DEFAULT_PORT: u16 = 8080;

/// Default TCP port for the discovery side-channel.
pub const DISCOVERY_PORT: u16 = 8081;

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            questions_count: 10,
            time_per_question: 30,
            difficulty_levels: vec![1, 2, 3],
        }
    }
}

impl GameConfig {
    /// Returns a copy with counts and times forced into the supported ranges.
    pub fn clamped(&self) -> Self {
        Self {
            questions_count: self.questions_count.clamp(MIN_QUESTIONS, MAX_QUESTIONS),
            time_per_question: self.time_per_question.clamp(MIN_TIME, MAX_TIME),
            difficulty_levels: self.difficulty_levels.clone(),
        }
    }
}

/// One entry from the question supply: a country whose flag is shown and
/// whose name is the expected answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub name: String,
    pub region: String,
    pub difficulty_level: u8,
    pub image_key: String,
}

/// A positioned question: the country record plus its index in the host's
/// sequence. The index correlates late answers with the right question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub country: CountryRecord,
    pub question_index: usize,
}

/// One submitted answer, with correctness computed once at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_index: usize,
    pub player_id: String,
    pub player_name: String,
    pub answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub image_key: String,
}

impl Answer {
    /// Build an answer record, computing `is_correct` from the submitted and
    /// expected text.
    pub fn new(
        question_index: usize,
        player_id: String,
        player_name: String,
        answer: String,
        correct_answer: String,
        image_key: String,
    ) -> Self {
        let is_correct = answers_match(&answer, &correct_answer);
        Self {
            question_index,
            player_id,
            player_name,
            answer,
            correct_answer,
            is_correct,
            image_key,
        }
    }
}

/// Trimmed, case-insensitive answer comparison.
pub fn answers_match(submitted: &str, correct: &str) -> bool {
    submitted.trim().to_lowercase() == correct.trim().to_lowercase()
}

/// All answers by one player across the session, assembled at game end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnswers {
    pub player_id: String,
    pub player_name: String,
    pub answers: Vec<Answer>,
}

/// Session lifecycle vocabulary shared between host and clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Menu,
    Lobby,
    Playing,
    Ended,
}

// ── Wire messages ───────────────────────────────────────────────────────────

/// Every message that crosses a game-session connection, in both directions.
///
/// Wire shape: `{"type": "<TAG>", "payload": {...}}`, one JSON object per
/// line. Variants without data omit the payload field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMessage {
    /// Client → host, sent immediately after connecting.
    #[serde(rename_all = "camelCase")]
    JoinGame { player_id: String, player_name: String },
    /// Host → clients, full roster after any membership or ready change.
    PlayerListUpdate { players: Vec<Player> },
    /// Client → host, ready-state toggle.
    #[serde(rename_all = "camelCase")]
    PlayerReady { player_id: String, is_ready: bool },
    /// Host → one client, pushed at join time and on lobby config changes.
    GameConfig(GameConfig),
    /// Host → clients, the game is starting.
    GameStart,
    /// Host → clients, a new question is live.
    NewQuestion(Question),
    /// Client → host, an answer for the referenced question index.
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        player_id: String,
        player_name: String,
        question_index: usize,
        answer: String,
    },
    /// Host → clients, countdown broadcast for the current question.
    #[serde(rename_all = "camelCase")]
    TimeUpdate { time_remaining: u32 },
    /// Host → clients, sequence exhausted; results follow after the grace
    /// period.
    CalculatingResults,
    /// Host → clients, the final per-player answer aggregate.
    #[serde(rename_all = "camelCase")]
    GameEnd { all_answers: Vec<PlayerAnswers> },
    /// Host → clients, the session is over; sockets close right after.
    ServerStopped { reason: String },
    /// Host → clients, a named player disconnected.
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: String, player_name: String },
}

// ── Message framing ─────────────────────────────────────────────────────────
//
// Wire format: one JSON-encoded message per line, `\n` delimited.
//
// A single write may arrive as multiple reads, and multiple writes may
// coalesce into one read, so the decoder keeps the unterminated tail of the
// last chunk and prefixes it to the next one.

/// Upper bound on a single frame. A buffer that grows past this without a
/// delimiter is discarded wholesale; no legitimate message comes close.
const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a message as a newline-terminated JSON frame.
pub fn encode_message(msg: &GameMessage) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = serde_json::to_vec(msg)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Incremental frame decoder for one connection.
///
/// Feed raw chunks with [`MessageDecoder::push`]; complete messages come
/// back in buffer order. A malformed line is logged and dropped without
/// affecting later lines in the same chunk.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buf: Vec<u8>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of inbound bytes, returning every message completed
    /// by it. Unterminated trailing bytes are retained for the next push.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<GameMessage> {
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<GameMessage>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    log::warn!("Dropping malformed frame ({} bytes): {e}", line.len());
                }
            }
        }

        if self.buf.len() > MAX_FRAME_SIZE {
            log::warn!(
                "Discarding {} buffered bytes with no frame delimiter",
                self.buf.len()
            );
            self.buf.clear();
        }

        messages
    }

    /// Drop any partial frame (called when a connection is torn down).
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes awaiting a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
