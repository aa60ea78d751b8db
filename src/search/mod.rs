//! Fuzzy title/author search.
//!
//! Scoring follows `pg_trgm`: strings are split into alphanumeric words,
//! each word padded with two leading spaces and one trailing space, and cut
//! into overlapping character trigrams. `similarity` compares whole trigram
//! sets, `word_similarity` compares the query against the best contiguous
//! extent of the target.

mod trigram;

pub use trigram::{similarity, trigram_set, word_similarity};

/// Weight of each searchable column in the relevance score.
pub const TITLE_WEIGHT: f32 = 2.5;
pub const TITLE_EN_WEIGHT: f32 = 2.0;
pub const AUTHOR_WEIGHT: f32 = 1.0;

/// Lowercase, keep letters and digits, collapse everything else into single
/// spaces. Applied to stored columns and to queries alike.
#[must_use]
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;

    for ch in input.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// The searchable projection of a novel row.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub title_normalized: String,
    pub title_en_normalized: String,
    pub author_normalized: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub id: String,
    pub relevance: f32,
}

/// Relevance of `candidate` for an already-normalized query, or `None` when
/// no column reaches `threshold` word similarity.
#[must_use]
pub fn score(query: &str, candidate: &Candidate, threshold: f32) -> Option<f32> {
    let columns = [
        (candidate.title_normalized.as_str(), TITLE_WEIGHT),
        (candidate.title_en_normalized.as_str(), TITLE_EN_WEIGHT),
        (candidate.author_normalized.as_str(), AUTHOR_WEIGHT),
    ];

    let mut matched = false;
    let mut relevance = 0.0;

    for (column, weight) in columns {
        let word = word_similarity(query, column);
        if word >= threshold {
            matched = true;
        }
        relevance += weight * (word + similarity(query, column));
    }

    matched.then_some(relevance)
}

/// Top `limit` candidates by relevance, ties broken by newest `created_at`.
#[must_use]
pub fn rank(query: &str, candidates: &[Candidate], threshold: f32, limit: usize) -> Vec<Ranked> {
    let query = normalize(query);
    if query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &Candidate)> = candidates
        .iter()
        .filter_map(|c| score(&query, c, threshold).map(|s| (s, c)))
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score
            .total_cmp(a_score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(relevance, c)| Ranked {
            id: c.id.clone(),
            relevance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, title_en: &str, author: &str, day: u32) -> Candidate {
        Candidate {
            id: id.to_string(),
            title_normalized: normalize(title),
            title_en_normalized: normalize(title_en),
            author_normalized: normalize(author),
            created_at: format!("2024-01-{day:02}T00:00:00.000Z"),
        }
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Война и  МИР!! "), "война и мир");
        assert_eq!(normalize("Re:Zero — Life"), "re zero life");
        assert_eq!(normalize("***"), "");
    }

    #[test]
    fn test_rank_orders_by_relevance() {
        let candidates = vec![
            candidate(
                "a",
                "Мастер и Маргарита",
                "The Master and Margarita",
                "Булгаков",
                1,
            ),
            candidate("b", "Собачье сердце", "Heart of a Dog", "Булгаков", 2),
            candidate("c", "Идиот", "The Idiot", "Достоевский", 3),
        ];

        let ranked = rank("маргарита", &candidates, 0.3, 20);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "a");

        let ranked = rank("булгаков", &candidates, 0.3, 20);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        // Equal relevance, newer first.
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_rank_no_trigram_match_is_empty() {
        let candidates = vec![candidate("a", "Идиот", "The Idiot", "Достоевский", 1)];
        assert!(rank("zzzzqqq", &candidates, 0.3, 20).is_empty());
        assert!(rank("   ", &candidates, 0.3, 20).is_empty());
    }

    #[test]
    fn test_rank_respects_limit() {
        let candidates: Vec<Candidate> = (0..30)
            .map(|i| candidate(&i.to_string(), "Клинок", "Blade", "Author", i % 28 + 1))
            .collect();
        assert_eq!(rank("клинок", &candidates, 0.3, 20).len(), 20);
    }

    #[test]
    fn test_title_outweighs_author() {
        let by_title = candidate("t", "Ворон", "", "Иванов", 1);
        let by_author = candidate("a", "Сад", "", "Ворон", 1);
        let t = score("ворон", &by_title, 0.3).unwrap();
        let a = score("ворон", &by_author, 0.3).unwrap();
        assert!(t > a);
    }
}
