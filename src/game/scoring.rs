use crate::network::messages::{Answer, PlayerAnswers};

// ── Scoring ─────────────────────────────────────────────────────────────────
//
// Display-layer helpers over the GAME_END aggregate. Scores are revealed
// only at game end; nothing here feeds back into session state.

/// One row of the end-of-game leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub player_name: String,
    /// Percent correct, rounded to the nearest integer.
    pub score: u32,
    pub correct: usize,
    pub total: usize,
}

/// Percent of answers that were correct, rounded. Zero for no answers.
pub fn calculate_score(answers: &[Answer]) -> u32 {
    if answers.is_empty() {
        return 0;
    }
    let correct = answers.iter().filter(|a| a.is_correct).count();
    ((correct as f64 / answers.len() as f64) * 100.0).round() as u32
}

/// Build the leaderboard from the final aggregate, best score first.
/// Ties keep the aggregate's player order.
pub fn leaderboard(all_answers: &[PlayerAnswers]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = all_answers
        .iter()
        .map(|pa| LeaderboardEntry {
            player_name: pa.player_name.clone(),
            score: calculate_score(&pa.answers),
            correct: pa.answers.iter().filter(|a| a.is_correct).count(),
            total: pa.answers.len(),
        })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

// ── Tests ───────────────────────────────────────────────────────────────────
