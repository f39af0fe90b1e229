use crate::network::messages::Player;

// ── Roster ──────────────────────────────────────────────────────────────────

/// The live set of players in a session, in arrival order.
///
/// The first player to join is the host and starts ready; everyone after
/// joins as a regular, not-ready player. Host status never transfers: if
/// the host leaves, the session ends rather than electing a new host.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player. The first join gets `is_host = true` and
    /// `is_ready = true`; later joins get neither.
    pub fn join(&mut self, id: String, name: String) -> &Player {
        let first = self.players.is_empty();
        self.players.push(Player {
            id,
            name,
            is_ready: first,
            is_host: first,
        });
        log::info!(
            "Player joined: {} ({})",
            self.players[self.players.len() - 1].name,
            if first { "host" } else { "player" }
        );
        &self.players[self.players.len() - 1]
    }

    /// Update a player's ready state. Unknown ids are ignored.
    pub fn set_ready(&mut self, id: &str, is_ready: bool) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
            player.is_ready = is_ready;
        }
    }

    /// Remove a player, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(pos))
    }

    /// True iff every current member is ready. Vacuously true when empty;
    /// callers must separately guard against starting with zero players.
    pub fn all_ready(&self) -> bool {
        self.players.iter().all(|p| p.is_ready)
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// All players in arrival order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
