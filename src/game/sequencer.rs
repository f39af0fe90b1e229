use crate::network::messages::{CountryRecord, Question};

// ── QuestionSequencer ───────────────────────────────────────────────────────

/// Linear cursor over one game's question sequence.
///
/// The sequence is produced once at game start by the question supply;
/// exhaustion is terminal, a new game needs a fresh sequencer. `by_index`
/// exists because a slow client's answer may reference a question the host
/// has already advanced past.
#[derive(Debug)]
pub struct QuestionSequencer {
    questions: Vec<CountryRecord>,
    index: usize,
}

impl QuestionSequencer {
    pub fn new(questions: Vec<CountryRecord>) -> Self {
        Self {
            questions,
            index: 0,
        }
    }

    /// The question at the cursor, or none once the sequence is exhausted.
    pub fn current(&self) -> Option<Question> {
        self.by_index(self.index)
    }

    /// Move the cursor forward and return the new current question, or none
    /// if the sequence is now exhausted.
    pub fn advance(&mut self) -> Option<Question> {
        self.index += 1;
        self.current()
    }

    /// Positional lookup, independent of the cursor.
    pub fn by_index(&self, index: usize) -> Option<Question> {
        self.questions.get(index).map(|country| Question {
            country: country.clone(),
            question_index: index,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.questions.len()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<CountryRecord> {
        (0..n)
            .map(|i| CountryRecord {
                name: format!("Country {i}"),
                region: "Test".into(),
                difficulty_level: 1,
                image_key: format!("c{i}"),
            })
            .collect()
    }

    #[test]
    fn test_current_starts_at_first_question() {
        let seq = QuestionSequencer::new(records(3));
        let q = seq.current().unwrap();
        assert_eq!(q.question_index, 0);
        assert_eq!(q.country.name, "Country 0");
    }

    #[test]
    fn test_advance_walks_then_exhausts() {
        let count = 5;
        let mut seq = QuestionSequencer::new(records(count));

        // advance() called exactly `count` times: count - 1 questions, then none.
        let mut yielded = Vec::new();
        for _ in 0..count {
            yielded.push(seq.advance());
        }
        assert_eq!(yielded.iter().filter(|q| q.is_some()).count(), count - 1);
        assert!(yielded[count - 1].is_none());
        assert!(seq.is_exhausted());
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let mut seq = QuestionSequencer::new(records(1));
        assert!(seq.advance().is_none());
        assert!(seq.advance().is_none());
        assert!(seq.current().is_none());
    }

    #[test]
    fn test_by_index_out_of_range_is_none() {
        let seq = QuestionSequencer::new(records(3));
        assert!(seq.by_index(3).is_none());
        assert!(seq.by_index(100).is_none());
    }

    #[test]
    fn test_by_index_ignores_cursor() {
        let mut seq = QuestionSequencer::new(records(3));
        seq.advance();
        seq.advance();
        // A late answer for question 0 still resolves.
        let q = seq.by_index(0).unwrap();
        assert_eq!(q.question_index, 0);
    }

    #[test]
    fn test_empty_sequence_is_immediately_exhausted() {
        let seq = QuestionSequencer::new(Vec::new());
        assert!(seq.current().is_none());
        assert!(seq.is_exhausted());
    }
}
