use std::collections::HashSet;

/// Characters of the body sampled as the transcript excerpt.
const TRANSCRIPT_SAMPLE_CHARS: usize = 500;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "been", "be", "have", "has", "had", "do", "does", "did",
    "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who",
    "when", "where", "why", "how", "all", "each", "every", "both", "few", "more", "most",
    "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very", "just",
];

/// Lowercased alphanumeric tokens longer than two characters, minus stop
/// words, in text order (repeats kept).
pub fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Distinct [`tokens`] of a text.
pub fn keywords(text: &str) -> HashSet<String> {
    tokens(text).into_iter().collect()
}

fn coverage(query: &HashSet<String>, field: &HashSet<String>) -> f64 {
    let overlap = query.intersection(field).count();
    (overlap as f64 / query.len().max(1) as f64).min(1.0)
}

/// Keyword-overlap relevance of a record against the crawler query.
///
/// Returns `None` when the query has no usable keywords, so the caller can
/// fall back to its neutral default.
pub fn keyword_relevance(query: &str, title: &str, body: &str, tags: &[String]) -> Option<f64> {
    let query_kw = keywords(query);
    if query_kw.is_empty() {
        return None;
    }

    let sample: String = body.chars().take(TRANSCRIPT_SAMPLE_CHARS).collect();
    let tag_kw: HashSet<String> = tags.iter().flat_map(|t| keywords(t)).collect();

    let score = coverage(&query_kw, &keywords(title)) * 0.40
        + coverage(&query_kw, &keywords(body)) * 0.30
        + coverage(&query_kw, &keywords(&sample)) * 0.20
        + coverage(&query_kw, &tag_kw) * 0.10;

    Some(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_drop_stop_words_and_short_tokens() {
        let kw = keywords("How to play the C major scale on a piano!");
        assert!(kw.contains("play"));
        assert!(kw.contains("major"));
        assert!(kw.contains("piano"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("how"));
        assert!(!kw.contains("on"));
    }

    #[test]
    fn test_full_overlap_scores_one() {
        let tags = vec!["piano scales".to_string()];
        let score = keyword_relevance(
            "piano scales",
            "Piano scales for beginners",
            "Learn piano scales step by step",
            &tags,
        )
        .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let score = keyword_relevance("sourdough bread", "Guitar chords", "Strum along", &[]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_empty_query_is_none() {
        assert!(keyword_relevance("the a an", "Title", "Body", &[]).is_none());
    }

    #[test]
    fn test_title_only_match() {
        let score = keyword_relevance("arpeggio", "Arpeggio drills", "Unrelated text", &[]).unwrap();
        assert!((score - 0.40).abs() < 1e-9);
    }
}
