//! Prompt keyword extraction (spec §4.2).

use std::collections::HashSet;

/// Stopwords filtered during extraction (spec GLOSSARY).
const STOPWORDS: &[&str] = &[
    "the", "this", "that", "with", "from", "into", "about", "would", "could",
    "should", "there", "their", "your", "need", "have", "please", "just",
    "when", "what", "where", "which", "while", "after", "before", "code",
    "repo", "project",
];

const MIN_TOKEN_LEN: usize = 4;
const MAX_KEYWORDS: usize = 6;

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '/' | '-')
}

/// Tokenize a prompt into ranked search terms.
///
/// Lowercases input, splits on any character outside `[a-z0-9_./-]`, drops
/// tokens shorter than 4 chars, drops stopwords, deduplicates preserving
/// first-seen order, keeps the first 6. Deterministic for identical input.
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let lowered = prompt.to_lowercase();
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for raw_token in lowered.split(|c: char| !is_allowed_char(c)) {
        if out.len() >= MAX_KEYWORDS {
            break;
        }
        if raw_token.len() < MIN_TOKEN_LEN {
            continue;
        }
        if stopwords.contains(raw_token) {
            continue;
        }
        if seen.insert(raw_token.to_string()) {
            out.push(raw_token.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_in_first_seen_order_deduped() {
        let kws = extract_keywords("Refactor the token bucket token bucket to use monotonic time");
        assert_eq!(kws, vec!["refactor", "token", "bucket", "monotonic", "time"]);
    }

    #[test]
    fn drops_short_tokens_and_stopwords() {
        let kws = extract_keywords("fix the bug in api.rs when it breaks");
        assert!(!kws.contains(&"the".to_string()));
        assert!(!kws.contains(&"bug".to_string())); // len 3, below MIN_TOKEN_LEN
        assert!(kws.contains(&"api.rs".to_string()));
    }

    #[test]
    fn caps_at_six_keywords() {
        let kws = extract_keywords("alpha bravo charlie delta echo foxtrot golf hotel india");
        assert_eq!(kws.len(), 6);
    }

    #[test]
    fn empty_prompt_yields_empty_keywords() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("   ...   ").is_empty());
    }

    #[test]
    fn is_deterministic() {
        let prompt = "Investigate the rate/limiter.rs module for concurrency issues";
        assert_eq!(extract_keywords(prompt), extract_keywords(prompt));
    }
}
