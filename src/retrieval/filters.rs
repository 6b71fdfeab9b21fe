//! Client/title filter inference from free-text questions (§4.6.1).
//!
//! Both filters share the same single-pass best-match algorithm: walk
//! every candidate once, keep the longest candidate that appears in
//! the lowercased question either as a whole string or as a standalone
//! word longer than three characters, and track only the single best
//! match seen so far rather than collecting every hit.

use crate::types::{ClientNameFilter, TitleFilter};

/// Single pass over `candidates`, returning the longest one found in
/// `question_lower` either verbatim or as one of its own `>3`-char
/// (character count, not byte length) words. Ties keep the first
/// (longest-seen-so-far) candidate.
fn best_match<'a, I: Iterator<Item = &'a str>>(candidates: I, question_lower: &str) -> Option<String> {
    let mut best: Option<&'a str> = None;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();
        if candidate_lower.is_empty() {
            continue;
        }

        let whole_match = question_lower.contains(&candidate_lower);
        let word_match = !whole_match
            && candidate_lower
                .split_whitespace()
                .any(|word| word.chars().count() > 3 && question_lower.contains(word));

        if whole_match || word_match {
            if best.map(|b| candidate.len() > b.len()).unwrap_or(true) {
                best = Some(candidate);
            }
        }
    }

    best.map(|s| s.to_string())
}

/// Infer a meeting-title filter from known `titles` (§4.6.1). Each
/// title is reduced to its leading `" - "` segment, trimmed, and
/// discarded if two characters or shorter — a raw client-name prefix
/// like `Acme - Working session` becomes the candidate `Acme`.
pub fn infer_title_filter(titles: &[String], question: &str) -> Option<TitleFilter> {
    let question_lower = question.to_lowercase();
    let candidates: Vec<String> = titles
        .iter()
        .map(|t| t.split(" - ").next().unwrap_or(t).trim().to_string())
        .filter(|c| c.chars().count() > 2)
        .collect();

    best_match(candidates.iter().map(String::as_str), &question_lower).map(TitleFilter)
}

/// Infer a chat-room client-name filter from known `client_names`
/// (§4.6.1). Unlike title inference, raw client names are used as
/// candidates directly with no length filter — a two-letter client
/// abbreviation is still a legitimate exact match.
pub fn infer_client_name_filter(client_names: &[String], question: &str) -> Option<ClientNameFilter> {
    let question_lower = question.to_lowercase();
    best_match(client_names.iter().map(String::as_str), &question_lower).map(ClientNameFilter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_filter_matches_leading_segment() {
        let titles = vec!["Acme - Working session".to_string(), "Globex - Intro".to_string()];
        let filter = infer_title_filter(&titles, "что обсуждали с Acme на прошлой неделе?").unwrap();
        assert_eq!(filter.0, "Acme");
    }

    #[test]
    fn title_filter_discards_short_prefix() {
        let titles = vec!["Ло - Diagnostics".to_string()];
        assert!(infer_title_filter(&titles, "что было у Ло?").is_none());
    }

    #[test]
    fn title_filter_picks_longest_match() {
        let titles = vec!["Acme".to_string(), "Acme Corp".to_string()];
        let filter = infer_title_filter(&titles, "что нового у Acme Corp?").unwrap();
        assert_eq!(filter.0, "Acme Corp");
    }

    #[test]
    fn client_name_filter_matches_whole_string() {
        let names = vec!["ООО Ромашка".to_string(), "Vector LLC".to_string()];
        let filter = infer_client_name_filter(&names, "переписка с ооо ромашка за март").unwrap();
        assert_eq!(filter.0, "ООО Ромашка");
    }

    #[test]
    fn no_candidates_no_match() {
        assert!(infer_title_filter(&[], "что угодно").is_none());
        assert!(infer_client_name_filter(&[], "что угодно").is_none());
    }
}
