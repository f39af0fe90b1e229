use crate::network::messages::{Answer, PlayerAnswers};
use std::collections::HashMap;

// ── AnswerCollector ─────────────────────────────────────────────────────────

/// Accumulates answers per player across one session.
///
/// Membership here is independent of the roster: a player who leaves
/// mid-game keeps their recorded answers, and those answers appear in the
/// final aggregate under their last known display name. Duplicate
/// submissions for the same question are retained as-is.
#[derive(Debug, Default)]
pub struct AnswerCollector {
    answers: HashMap<String, Vec<Answer>>,
    /// Player ids in first-recorded order, for a stable aggregate.
    order: Vec<String>,
}

impl AnswerCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an answer to the player's record, creating it on first use.
    pub fn record(&mut self, player_id: &str, answer: Answer) {
        match self.answers.get_mut(player_id) {
            Some(list) => list.push(answer),
            None => {
                self.order.push(player_id.to_string());
                self.answers.insert(player_id.to_string(), vec![answer]);
            }
        }
    }

    /// Produce the final aggregate: one entry per player ever recorded, in
    /// first-recorded order. `resolve_name` supplies the best-known display
    /// name (current roster, then departed-player lookup); the raw id is
    /// the fallback.
    pub fn drain_all<F>(&self, resolve_name: F) -> Vec<PlayerAnswers>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.order
            .iter()
            .map(|player_id| PlayerAnswers {
                player_id: player_id.clone(),
                player_name: resolve_name(player_id).unwrap_or_else(|| player_id.clone()),
                answers: self.answers.get(player_id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Forget everything (called after the aggregate is broadcast).
    pub fn clear(&mut self) {
        self.answers.clear();
        self.order.clear();
    }

    /// Total recorded answers across all players.
    pub fn answer_count(&self) -> usize {
        self.answers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(player_id: &str, question_index: usize, text: &str) -> Answer {
        Answer::new(
            question_index,
            player_id.into(),
            format!("Name of {player_id}"),
            text.into(),
            "France".into(),
            "fr".into(),
        )
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut collector = AnswerCollector::new();
        collector.record("p1", answer("p1", 0, "France"));
        collector.record("p1", answer("p1", 1, "Spain"));

        let all = collector.drain_all(|_| None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].answers.len(), 2);
        assert_eq!(all[0].answers[0].question_index, 0);
        assert_eq!(all[0].answers[1].question_index, 1);
    }

    #[test]
    fn test_duplicate_submissions_are_both_retained() {
        let mut collector = AnswerCollector::new();
        collector.record("p1", answer("p1", 0, "Frnace"));
        collector.record("p1", answer("p1", 0, "France"));

        let all = collector.drain_all(|_| None);
        assert_eq!(all[0].answers.len(), 2);
        assert!(!all[0].answers[0].is_correct);
        assert!(all[0].answers[1].is_correct);
    }

    #[test]
    fn test_players_appear_in_first_recorded_order() {
        let mut collector = AnswerCollector::new();
        collector.record("p2", answer("p2", 0, "a"));
        collector.record("p1", answer("p1", 0, "b"));
        collector.record("p2", answer("p2", 1, "c"));

        let ids: Vec<String> = collector
            .drain_all(|_| None)
            .into_iter()
            .map(|pa| pa.player_id)
            .collect();
        assert_eq!(ids, vec!["p2".to_string(), "p1".to_string()]);
    }

    #[test]
    fn test_name_resolution_prefers_resolver_then_raw_id() {
        let mut collector = AnswerCollector::new();
        collector.record("p1", answer("p1", 0, "a"));
        collector.record("p2", answer("p2", 0, "b"));

        let all = collector.drain_all(|id| {
            if id == "p1" {
                Some("Alice".to_string())
            } else {
                None
            }
        });
        assert_eq!(all[0].player_name, "Alice");
        assert_eq!(all[1].player_name, "p2");
    }

    #[test]
    fn test_record_survives_roster_departure_semantics() {
        // The collector has no roster link at all: recording for an id that
        // "left" is indistinguishable from any other record call.
        let mut collector = AnswerCollector::new();
        collector.record("departed", answer("departed", 1, "France"));

        let all = collector.drain_all(|id| {
            // Departed-name lookup as the host would provide it.
            (id == "departed").then(|| "Bob".to_string())
        });
        assert_eq!(all[0].player_name, "Bob");
        assert_eq!(all[0].answers.len(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut collector = AnswerCollector::new();
        collector.record("p1", answer("p1", 0, "a"));
        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.answer_count(), 0);
        assert!(collector.drain_all(|_| None).is_empty());
    }
}
