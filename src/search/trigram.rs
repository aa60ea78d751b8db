use std::collections::HashSet;

type Trigram = [char; 3];

/// Trigrams of every word in order, duplicates kept.
fn trigram_sequence(input: &str) -> Vec<Trigram> {
    let mut out = Vec::new();

    for word in input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = [' ', ' ']
            .into_iter()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        out.extend(padded.windows(3).map(|w| [w[0], w[1], w[2]]));
    }

    out
}

#[must_use]
pub fn trigram_set(input: &str) -> HashSet<[char; 3]> {
    trigram_sequence(input).into_iter().collect()
}

fn jaccard(common: usize, left: usize, right: usize) -> f32 {
    let union = left + right - common;
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = common as f32 / union as f32;
    ratio
}

/// Shared trigrams over the union of both trigram sets.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f32 {
    let left = trigram_set(a);
    let right = trigram_set(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let common = left.intersection(&right).count();
    jaccard(common, left.len(), right.len())
}

/// Greatest similarity between the trigrams of `query` and any contiguous
/// extent of the ordered trigrams of `target`.
#[must_use]
pub fn word_similarity(query: &str, target: &str) -> f32 {
    let wanted = trigram_set(query);
    let sequence = trigram_sequence(target);
    if wanted.is_empty() || sequence.is_empty() {
        return 0.0;
    }

    let mut best = 0.0_f32;

    // Extents that start or end on a trigram absent from the query can
    // always be shrunk without lowering the score.
    for start in 0..sequence.len() {
        if !wanted.contains(&sequence[start]) {
            continue;
        }

        let mut extent: HashSet<Trigram> = HashSet::new();
        let mut common = 0;

        for trigram in &sequence[start..] {
            if extent.insert(*trigram) && wanted.contains(trigram) {
                common += 1;
            }
            if wanted.contains(trigram) {
                best = best.max(jaccard(common, wanted.len(), extent.len()));
            }
        }

        if (best - 1.0).abs() < f32::EPSILON {
            break;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_trigram_set_pads_words() {
        let set = trigram_set("cat");
        assert_eq!(set.len(), 4);
        assert!(set.contains(&[' ', ' ', 'c']));
        assert!(set.contains(&['a', 't', ' ']));
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        assert!(approx(similarity("word", "word"), 1.0));
        assert!(approx(similarity("abc", "xyz"), 0.0));
        assert!(approx(similarity("", "abc"), 0.0));
    }

    #[test]
    fn test_similarity_matches_pg_trgm() {
        // "word" has 5 trigrams, "words" 6, sharing 4.
        assert!(approx(similarity("word", "words"), 4.0 / 7.0));
    }

    #[test]
    fn test_word_similarity_matches_pg_trgm_example() {
        assert!(approx(word_similarity("word", "two words"), 0.8));
    }

    #[test]
    fn test_word_similarity_full_word_inside_longer_text() {
        assert!(approx(word_similarity("мир", "война и мир"), 1.0));
        assert!(word_similarity("мир", "война и мир") > similarity("мир", "война и мир"));
    }

    #[test]
    fn test_word_similarity_unrelated_is_zero() {
        assert!(approx(word_similarity("qqq", "война и мир"), 0.0));
    }
}
