use crate::network::messages::CountryRecord;

// ── Question supply ─────────────────────────────────────────────────────────

/// Source of question material for one game.
///
/// The host calls this once per game start. Implementations must return
/// records randomly selected without replacement, filtered to the requested
/// difficulty set.
pub trait QuestionSupply {
    fn fetch_questions(
        &self,
        count: u32,
        difficulty_levels: &[u8],
    ) -> Result<Vec<CountryRecord>, QuestionSupplyError>;
}

/// Errors from a question supply.
#[derive(Debug)]
pub enum QuestionSupplyError {
    /// The difficulty filter matched nothing.
    NoMatchingQuestions,
}

impl std::fmt::Display for QuestionSupplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatchingQuestions => {
                write!(f, "no questions match the requested difficulty levels")
            }
        }
    }
}

impl std::error::Error for QuestionSupplyError {}

// ── CountryDataset ──────────────────────────────────────────────────────────

/// The bundled in-memory question pool: country name, region, difficulty,
/// and the flag image key the presentation layer resolves to an asset.
#[derive(Debug, Clone)]
pub struct CountryDataset {
    countries: Vec<CountryRecord>,
}

impl CountryDataset {
    /// A dataset with a custom pool (used by tests and external loaders).
    pub fn with_countries(countries: Vec<CountryRecord>) -> Self {
        Self { countries }
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

impl Default for CountryDataset {
    fn default() -> Self {
        Self {
            countries: builtin_countries(),
        }
    }
}

impl QuestionSupply for CountryDataset {
    /// Random selection without replacement. An empty difficulty slice
    /// means no filter; fewer matches than `count` yields a shorter game.
    fn fetch_questions(
        &self,
        count: u32,
        difficulty_levels: &[u8],
    ) -> Result<Vec<CountryRecord>, QuestionSupplyError> {
        let mut pool: Vec<CountryRecord> = self
            .countries
            .iter()
            .filter(|c| {
                difficulty_levels.is_empty()
                    || difficulty_levels.contains(&c.difficulty_level)
            })
            .cloned()
            .collect();

        if pool.is_empty() {
            return Err(QuestionSupplyError::NoMatchingQuestions);
        }

        fastrand::shuffle(&mut pool);
        pool.truncate(count as usize);
        Ok(pool)
    }
}

fn country(name: &str, region: &str, difficulty_level: u8, image_key: &str) -> CountryRecord {
    CountryRecord {
        name: name.into(),
        region: region.into(),
        difficulty_level,
        image_key: image_key.into(),
    }
}

/// The built-in pool. Difficulty 1 is flags most people know on sight,
/// 3 is the long tail.
fn builtin_countries() -> Vec<CountryRecord> {
    vec![
        country("France", "Europe", 1, "fr"),
        country("Germany", "Europe", 1, "de"),
        country("Italy", "Europe", 1, "it"),
        country("Spain", "Europe", 1, "es"),
        country("United Kingdom", "Europe", 1, "gb"),
        country("United States", "Americas", 1, "us"),
        country("Canada", "Americas", 1, "ca"),
        country("Brazil", "Americas", 1, "br"),
        country("Japan", "Asia", 1, "jp"),
        country("China", "Asia", 1, "cn"),
        country("Australia", "Oceania", 1, "au"),
        country("Mexico", "Americas", 1, "mx"),
        country("Sweden", "Europe", 2, "se"),
        country("Norway", "Europe", 2, "no"),
        country("Portugal", "Europe", 2, "pt"),
        country("Greece", "Europe", 2, "gr"),
        country("Poland", "Europe", 2, "pl"),
        country("Turkey", "Asia", 2, "tr"),
        country("Egypt", "Africa", 2, "eg"),
        country("South Africa", "Africa", 2, "za"),
        country("Argentina", "Americas", 2, "ar"),
        country("South Korea", "Asia", 2, "kr"),
        country("India", "Asia", 2, "in"),
        country("New Zealand", "Oceania", 2, "nz"),
        country("Slovenia", "Europe", 3, "si"),
        country("Moldova", "Europe", 3, "md"),
        country("Bhutan", "Asia", 3, "bt"),
        country("Kyrgyzstan", "Asia", 3, "kg"),
        country("Burkina Faso", "Africa", 3, "bf"),
        country("Lesotho", "Africa", 3, "ls"),
        country("Suriname", "Americas", 3, "sr"),
        country("Belize", "Americas", 3, "bz"),
        country("Vanuatu", "Oceania", 3, "vu"),
        country("Kiribati", "Oceania", 3, "ki"),
        country("Comoros", "Africa", 3, "km"),
        country("Tajikistan", "Asia", 3, "tj"),
    ]
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fetch_respects_count() {
        let dataset = CountryDataset::default();
        let questions = dataset.fetch_questions(10, &[]).unwrap();
        assert_eq!(questions.len(), 10);
    }

    #[test]
    fn test_fetch_filters_by_difficulty() {
        let dataset = CountryDataset::default();
        let questions = dataset.fetch_questions(50, &[3]).unwrap();
        assert!(!questions.is_empty());
        assert!(questions.iter().all(|c| c.difficulty_level == 3));
    }

    #[test]
    fn test_fetch_accepts_multiple_levels() {
        let dataset = CountryDataset::default();
        let questions = dataset.fetch_questions(50, &[1, 2]).unwrap();
        assert!(questions
            .iter()
            .all(|c| c.difficulty_level == 1 || c.difficulty_level == 2));
    }

    #[test]
    fn test_selection_is_without_replacement() {
        let dataset = CountryDataset::default();
        let questions = dataset.fetch_questions(50, &[]).unwrap();
        let names: HashSet<&str> = questions.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), questions.len());
    }

    #[test]
    fn test_count_larger_than_pool_returns_whole_pool() {
        let dataset = CountryDataset::with_countries(vec![
            CountryRecord {
                name: "France".into(),
                region: "Europe".into(),
                difficulty_level: 1,
                image_key: "fr".into(),
            },
            CountryRecord {
                name: "Japan".into(),
                region: "Asia".into(),
                difficulty_level: 1,
                image_key: "jp".into(),
            },
        ]);
        let questions = dataset.fetch_questions(10, &[]).unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn test_unmatched_filter_is_an_error() {
        let dataset = CountryDataset::default();
        let result = dataset.fetch_questions(10, &[42]);
        assert!(matches!(
            result,
            Err(QuestionSupplyError::NoMatchingQuestions)
        ));
    }

    #[test]
    fn test_builtin_pool_covers_all_difficulties() {
        let dataset = CountryDataset::default();
        for level in 1..=3u8 {
            assert!(
                dataset.fetch_questions(1, &[level]).is_ok(),
                "difficulty {level} should have entries"
            );
        }
    }
}
