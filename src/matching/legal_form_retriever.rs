// src/matching/legal_form_retriever.rs - identifies the legal-form variant
// inside a corporate name and produces the name without that suffix
//
// Pipeline: clean into lowercase ASCII tokens, rewrite known legal-form
// spellings with the replacement rules (splitting agglutinated tokens and
// tracking the splits), locate the catalog form by token-window matching,
// then remove it and restore the surviving original tokens.

use std::collections::{HashMap, HashSet};

use log::debug;
use strsim::normalized_levenshtein;

use crate::catalog::{self, LegalFormEntry, ReplacementRule};
use crate::utils::text::clean_tokens;

const SIMILARITY_THRESHOLD: f64 = 0.85;
const MAX_RECURSION_DEPTH: usize = 50;

/// Relation between current normalized token indices and the original
/// cleaned-token indices they came from. Splits insert a second
/// normalized index for the same original token.
#[derive(Debug, Clone, Default)]
struct SplitTracker {
    normalized_to_original: HashMap<usize, usize>,
}

impl SplitTracker {
    fn with_identity_mapping(word_count: usize) -> Self {
        Self {
            normalized_to_original: (0..word_count).map(|i| (i, i)).collect(),
        }
    }

    fn record_split(&mut self, normalized_index: usize) {
        let Some(&original_index) = self.normalized_to_original.get(&normalized_index) else {
            return;
        };

        let mut shifted = HashMap::with_capacity(self.normalized_to_original.len() + 1);
        for (&norm_idx, &orig_idx) in &self.normalized_to_original {
            if norm_idx > normalized_index {
                shifted.insert(norm_idx + 1, orig_idx);
            } else {
                shifted.insert(norm_idx, orig_idx);
            }
        }
        shifted.insert(normalized_index + 1, original_index);
        self.normalized_to_original = shifted;
    }

    fn normalized_indices(&self, original_index: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .normalized_to_original
            .iter()
            .filter(|(_, &orig)| orig == original_index)
            .map(|(&norm, _)| norm)
            .collect();
        indices.sort_unstable();
        indices
    }

    fn contributed_to_match(&self, original_index: usize, match_start: usize, match_end: usize) -> bool {
        self.normalized_indices(original_index)
            .iter()
            .any(|&idx| idx >= match_start && idx <= match_end)
    }
}

struct NormalizeOutcome {
    // Alternative token lists; the replacement chain currently yields one.
    alternatives: Vec<Vec<String>>,
    tracker: SplitTracker,
}

/// Normalize a name into replacement-rewritten token lists. Never fails:
/// cycles and excessive depth return the tokens reached so far.
fn normalize_with_tracking(name: &str) -> NormalizeOutcome {
    let cleaned = clean_tokens(name);
    if cleaned.is_empty() {
        return NormalizeOutcome {
            alternatives: vec![Vec::new()],
            tracker: SplitTracker::default(),
        };
    }

    let mut tracker = SplitTracker::with_identity_mapping(cleaned.len());
    let mut visited = HashSet::new();
    let normalized = process_replacements(cleaned, &mut tracker, &mut visited, 0);

    NormalizeOutcome {
        alternatives: vec![normalized],
        tracker,
    }
}

struct ReplacementOutcome {
    words: Vec<String>,
    tracker: SplitTracker,
}

fn process_replacements(
    words: Vec<String>,
    tracker: &mut SplitTracker,
    visited: &mut HashSet<Vec<String>>,
    depth: usize,
) -> Vec<String> {
    // Cycle and depth guards return the current state instead of failing.
    if visited.contains(&words) || depth > MAX_RECURSION_DEPTH {
        return words;
    }
    visited.insert(words.clone());

    // Rules are pre-sorted by word count then pattern length, so the first
    // full match encountered is the best full match; a partial match only
    // stands when no rule produces a full match.
    let mut chosen: Option<ReplacementOutcome> = None;
    for rule in catalog::replacement_rules() {
        if let Some(outcome) = try_replacement(&words, rule, tracker) {
            if is_full_match_for_pattern(&words, rule) {
                chosen = Some(outcome);
                break;
            }
            if chosen.is_none() {
                chosen = Some(outcome);
            }
        }
    }

    match chosen {
        Some(outcome) => {
            *tracker = outcome.tracker;
            if outcome.words.is_empty() {
                outcome.words
            } else {
                process_replacements(outcome.words, tracker, visited, depth + 1)
            }
        }
        None => words,
    }
}

/// A replacement is a full match when it consumes the entire token list
/// without splitting the leftmost token.
fn is_full_match_for_pattern(words: &[String], rule: &ReplacementRule) -> bool {
    if words.len() != rule.word_count() {
        return false;
    }
    if rule.word_count() == 1 {
        return normalized_levenshtein(&words[0], &rule.search_words[0]) >= SIMILARITY_THRESHOLD;
    }
    true
}

/// Apply `rule` at the rightmost matching position. The leftmost pattern
/// token may consume only a suffix of its input token; the head survives
/// as its own token and the split is recorded.
fn try_replacement(
    words: &[String],
    rule: &ReplacementRule,
    tracker: &SplitTracker,
) -> Option<ReplacementOutcome> {
    if words.len() < rule.word_count() {
        return None;
    }

    for end_idx in (rule.word_count() - 1..words.len()).rev() {
        if !matches_at_position(words, end_idx, rule) {
            continue;
        }
        let start_idx = end_idx + 1 - rule.word_count();

        let mut new_tracker = tracker.clone();
        let mut result: Vec<String> = words[..start_idx].to_vec();

        let mut split_recorded_at = None;
        if let Some(split_point) = find_best_suffix_match(&words[start_idx], &rule.search_words[0]) {
            if split_point > 0 {
                result.push(words[start_idx][..split_point].to_string());
                split_recorded_at = Some(start_idx);
            }
        }

        result.push(rule.replacement.clone());
        result.extend_from_slice(&words[end_idx + 1..]);

        if let Some(idx) = split_recorded_at {
            new_tracker.record_split(idx);
        }

        return Some(ReplacementOutcome {
            words: result,
            tracker: new_tracker,
        });
    }

    None
}

fn matches_at_position(words: &[String], end_idx: usize, rule: &ReplacementRule) -> bool {
    if end_idx + 1 < rule.word_count() {
        return false;
    }
    let start_idx = end_idx + 1 - rule.word_count();

    // The leftmost pattern token may match just the suffix of its input
    // token; short pattern tokens require exact suffix equality.
    let first_word = &words[start_idx];
    let search_first = &rule.search_words[0];
    if search_first.len() > 2 {
        if !ends_with_fuzzy(first_word, search_first) {
            return false;
        }
    } else if !first_word.ends_with(search_first.as_str()) {
        return false;
    }

    for i in 1..rule.word_count() {
        let word = &words[start_idx + i];
        let pattern = &rule.search_words[i];
        if pattern.len() > 2 {
            if normalized_levenshtein(word, pattern) < SIMILARITY_THRESHOLD {
                return false;
            }
        } else if word != pattern {
            return false;
        }
    }

    true
}

fn ends_with_fuzzy(word: &str, suffix: &str) -> bool {
    if normalized_levenshtein(word, suffix) >= SIMILARITY_THRESHOLD {
        return true;
    }
    if suffix.len() <= word.len() {
        let word_end = &word[word.len() - suffix.len()..];
        if normalized_levenshtein(word_end, suffix) >= SIMILARITY_THRESHOLD {
            return true;
        }
    }
    false
}

/// Split point before a trailing occurrence of `suffix` in `word`, or
/// `None` when the word does not end with it (exactly or fuzzily).
/// Cleaned tokens are ASCII, so byte indices are character indices.
fn find_best_suffix_match(word: &str, suffix: &str) -> Option<usize> {
    if suffix.len() > word.len() {
        return None;
    }
    if word.ends_with(suffix) {
        return Some(word.len() - suffix.len());
    }
    let word_end = &word[word.len() - suffix.len()..];
    if normalized_levenshtein(word_end, suffix) >= SIMILARITY_THRESHOLD {
        return Some(word.len() - suffix.len());
    }
    None
}

struct MatchWindow {
    start: usize,
    end: usize,
    trailing_chars: usize,
}

/// Locate a token window `[start, end]` whose concatenation starts with
/// the concatenated cleaned form, scanning from the rightmost start.
fn find_match_window(tokens: &[String], cleaned_short_name: &[String]) -> Option<MatchWindow> {
    if tokens.is_empty() || cleaned_short_name.is_empty() {
        return None;
    }
    let target: String = cleaned_short_name.concat();

    for i in (0..tokens.len()).rev() {
        let mut combined = String::new();
        for (j, token) in tokens.iter().enumerate().skip(i) {
            combined.push_str(token);
            if combined.len() >= target.len() {
                if combined.starts_with(&target) {
                    let consumed_before_current = combined.len() - token.len();
                    let consumed_from_current = target.len() - consumed_before_current;
                    let trailing_chars = token.len().saturating_sub(consumed_from_current);
                    return Some(MatchWindow {
                        start: i,
                        end: j,
                        trailing_chars,
                    });
                }
                break;
            }
        }
    }

    None
}

struct LegalFormMatch<'a> {
    entry: &'a LegalFormEntry,
    alternative: Vec<String>,
    start: usize,
    end: usize,
    trailing_chars: usize,
    fallback: bool,
    fallback_chars_to_trim: usize,
}

fn windows_overlap(a: &LegalFormMatch, b: &LegalFormMatch) -> bool {
    a.end >= b.start && b.end >= a.start
}

fn form_contains(longer: &LegalFormMatch, shorter: &LegalFormMatch) -> bool {
    longer
        .entry
        .concatenated_cleaned()
        .contains(&shorter.entry.concatenated_cleaned())
}

/// Candidate elimination and selection:
/// drop a match when an overlapping match from the same alternative is
/// longer by cleaned length, or when a longer form textually contains it;
/// of the survivors pick the rightmost end, ties broken by cleaned length.
fn select_best_match<'a>(matches: Vec<LegalFormMatch<'a>>) -> Option<LegalFormMatch<'a>> {
    if matches.len() <= 1 {
        return matches.into_iter().next();
    }

    let mut surviving: Vec<bool> = vec![true; matches.len()];
    for (i, candidate) in matches.iter().enumerate() {
        for (j, other) in matches.iter().enumerate() {
            if i == j || candidate.alternative != other.alternative {
                continue;
            }
            let candidate_shorter = candidate.entry.cleaned_len() < other.entry.cleaned_len();
            if !candidate_shorter {
                continue;
            }
            if windows_overlap(candidate, other) || form_contains(other, candidate) {
                surviving[i] = false;
                break;
            }
        }
    }

    let mut best: Option<LegalFormMatch<'a>> = None;
    for (keep, candidate) in surviving.into_iter().zip(matches) {
        if !keep {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let replace = candidate.end > current.end
                    || (candidate.end == current.end
                        && candidate.entry.cleaned_len() > current.entry.cleaned_len());
                Some(if replace { candidate } else { current })
            }
        };
    }
    best
}

fn find_best_legal_form_match<'a>(
    alternatives: &[Vec<String>],
    country_forms: &'a [LegalFormEntry],
) -> Option<LegalFormMatch<'a>> {
    let mut all_matches = Vec::new();
    for alternative in alternatives {
        for entry in country_forms {
            if let Some(window) = find_match_window(alternative, &entry.cleaned_short_name) {
                all_matches.push(LegalFormMatch {
                    entry,
                    alternative: alternative.clone(),
                    start: window.start,
                    end: window.end,
                    trailing_chars: window.trailing_chars,
                    fallback: false,
                    fallback_chars_to_trim: 0,
                });
            }
        }
    }

    if let Some(best) = select_best_match(all_matches) {
        debug!(
            "legal form {} matched at tokens [{}, {}] ({} trailing chars)",
            best.entry.legal_form_id, best.start, best.end, best.trailing_chars
        );
        return Some(best);
    }

    // Fallback: the concatenated tokens end with the concatenated form.
    // Abbreviated short names are excluded; they would fire on arbitrary
    // name endings.
    for alternative in alternatives {
        let combined: String = alternative.concat();
        for entry in country_forms {
            if entry.actually_shortened {
                continue;
            }
            let concatenated = entry.concatenated_cleaned();
            if concatenated.is_empty() || !combined.ends_with(&concatenated) {
                continue;
            }
            if let Some((start, chars_to_trim)) = align_fallback_suffix(alternative, &concatenated) {
                debug!(
                    "legal form {} matched by concatenated-suffix fallback",
                    entry.legal_form_id
                );
                return Some(LegalFormMatch {
                    entry,
                    alternative: alternative.clone(),
                    start,
                    end: alternative.len() - 1,
                    trailing_chars: 0,
                    fallback: true,
                    fallback_chars_to_trim: chars_to_trim,
                });
            }
        }
    }

    None
}

/// Walk tokens right-to-left consuming the concatenated form. Every fully
/// consumed token must equal its expected slice; a partially consumed
/// first token records how many characters to trim from its tail.
fn align_fallback_suffix(alternative: &[String], concatenated: &str) -> Option<(usize, usize)> {
    let mut remaining = concatenated.len();
    let mut index = alternative.len();
    let mut chars_to_trim = 0;

    while remaining > 0 && index > 0 {
        let token = &alternative[index - 1];
        if token.len() <= remaining {
            let expected = &concatenated[remaining - token.len()..remaining];
            if token != expected {
                return None;
            }
            remaining -= token.len();
            index -= 1;
        } else {
            let expected = &concatenated[..remaining];
            let token_suffix = &token[token.len() - remaining..];
            if token_suffix != expected {
                return None;
            }
            chars_to_trim = remaining;
            index -= 1;
            remaining = 0;
        }
    }

    if remaining > 0 {
        return None;
    }
    Some((index, chars_to_trim))
}

fn apply_primary_removal(words: &mut Vec<String>, m: &LegalFormMatch) {
    if m.start >= words.len() {
        return;
    }
    let source = &m.alternative;
    if m.start >= source.len() {
        return;
    }

    let target = m.entry.concatenated_cleaned();
    let mut base_end = m.end.min(source.len() - 1);
    let mut base_string: String = source[m.start..=base_end].concat();

    if !target.is_empty() && !base_string.starts_with(&target) && target.len() > base_string.len() {
        // Replacements can shorten tokens; extend until the target length
        // is covered again.
        let mut i = base_end + 1;
        while i < source.len() && base_string.len() < target.len() {
            base_string.push_str(&source[i]);
            base_end = i;
            i += 1;
        }
    }

    let trailing_from_base = if base_string.len() > target.len() {
        base_string[target.len()..].to_string()
    } else {
        String::new()
    };

    // Extend removal rightward only while additional tokens stay fully
    // inside the target or repeat the form's last cleaned token.
    let last_cleaned_token = m
        .entry
        .cleaned_short_name
        .last()
        .cloned()
        .unwrap_or_default();
    let mut extended_end = base_end;
    let mut extended = base_string;
    for i in base_end + 1..source.len() {
        let token = &source[i];
        let candidate = format!("{extended}{token}");
        if !candidate.starts_with(&target) {
            break;
        }
        let extra_beyond_target = &candidate[target.len()..];
        if !extra_beyond_target.is_empty() {
            if last_cleaned_token.is_empty() {
                break;
            }
            if !last_cleaned_token.starts_with(extra_beyond_target)
                && !last_cleaned_token.ends_with(extra_beyond_target)
            {
                break;
            }
        }
        extended = candidate;
        extended_end = i;
    }

    let removal_count = (extended_end + 1).saturating_sub(m.start);
    for _ in 0..removal_count {
        if m.start >= words.len() {
            break;
        }
        words.remove(m.start);
    }

    if !trailing_from_base.is_empty() {
        let insert_at = m.start.min(words.len());
        words.insert(insert_at, trailing_from_base);
    }
}

fn apply_fallback_removal(words: &mut Vec<String>, m: &LegalFormMatch) {
    let mut i = m.end;
    while i > m.start {
        if i < words.len() {
            words.remove(i);
        }
        i -= 1;
    }

    if m.start >= words.len() {
        return;
    }

    if m.fallback_chars_to_trim == 0 {
        words.remove(m.start);
        return;
    }

    let token = words[m.start].clone();
    if token.len() <= m.fallback_chars_to_trim {
        words.remove(m.start);
    } else {
        words[m.start] = token[..token.len() - m.fallback_chars_to_trim].to_string();
    }
}

/// Walk the original cleaned tokens alongside the surviving normalized
/// tokens. Originals that fed the match emit their leftover fragments;
/// all others are restored verbatim when the normalized run still equals
/// or prefixes them.
fn restore_original_tokens(
    original_name: &str,
    normalized_words: Vec<String>,
    m: &LegalFormMatch,
    tracker: &SplitTracker,
) -> Vec<String> {
    if normalized_words.is_empty() {
        return normalized_words;
    }
    let original_words = clean_tokens(original_name);
    if original_words.is_empty() {
        return normalized_words;
    }

    let mut restored = Vec::new();
    let mut normalized_index = 0usize;

    for (original_index, original_word) in original_words.iter().enumerate() {
        if normalized_index >= normalized_words.len() {
            break;
        }

        if tracker.contributed_to_match(original_index, m.start, m.end) {
            let remaining = tracker
                .normalized_indices(original_index)
                .iter()
                .filter(|&&idx| idx < m.start || idx > m.end)
                .count();
            for _ in 0..remaining {
                if normalized_index >= normalized_words.len() {
                    break;
                }
                restored.push(normalized_words[normalized_index].clone());
                normalized_index += 1;
            }
        } else {
            let fragment_count = tracker.normalized_indices(original_index).len();
            let mut combined = String::new();
            for i in 0..fragment_count {
                if normalized_index + i >= normalized_words.len() {
                    break;
                }
                combined.push_str(&normalized_words[normalized_index + i]);
            }

            if words_equivalent_for_restoration(original_word, &combined) {
                restored.push(original_word.clone());
            } else {
                for i in 0..fragment_count {
                    if normalized_index + i >= normalized_words.len() {
                        break;
                    }
                    restored.push(normalized_words[normalized_index + i].clone());
                }
            }
            normalized_index += fragment_count;
        }
    }

    while normalized_index < normalized_words.len() {
        restored.push(normalized_words[normalized_index].clone());
        normalized_index += 1;
    }

    restored
}

fn words_equivalent_for_restoration(original: &str, candidate: &str) -> bool {
    original == candidate
        || (!original.is_empty() && original.starts_with(candidate))
        || (!candidate.is_empty() && candidate.starts_with(original))
        || normalized_levenshtein(original, candidate) >= SIMILARITY_THRESHOLD
}

/// Identify the legal form in `corporate_name` for `country_code` and
/// return its catalog id. Unknown countries have no legal forms.
pub fn retrieve_legal_form(corporate_name: &str, country_code: &str) -> Option<String> {
    let forms = catalog::legal_form_registry().for_country(country_code)?;
    let outcome = normalize_with_tracking(corporate_name);
    find_best_legal_form_match(&outcome.alternatives, forms)
        .map(|m| m.entry.legal_form_id.clone())
}

/// The normalized company name with the matched legal form removed and
/// original tokens restored where possible. Names without a recognized
/// form come back normalized but otherwise intact.
pub fn company_name_without_legal_form(corporate_name: &str, country_code: &str) -> String {
    let outcome = normalize_with_tracking(corporate_name);
    let first_alternative = outcome
        .alternatives
        .first()
        .cloned()
        .unwrap_or_default();

    let Some(forms) = catalog::legal_form_registry().for_country(country_code) else {
        return first_alternative.join(" ");
    };

    let Some(m) = find_best_legal_form_match(&outcome.alternatives, forms) else {
        return first_alternative.join(" ");
    };

    let mut words = m.alternative.clone();
    if m.fallback {
        apply_fallback_removal(&mut words, &m);
    } else {
        apply_primary_removal(&mut words, &m);
    }

    restore_original_tokens(corporate_name, words, &m, &outcome.tracker).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieve_simple_forms() {
        assert_eq!(retrieve_legal_form("Siemens AG", "DE").as_deref(), Some("DE-AG"));
        assert_eq!(
            retrieve_legal_form("Beispiel GmbH", "DE").as_deref(),
            Some("DE-GMBH")
        );
        assert_eq!(retrieve_legal_form("Siemens", "DE"), None);
    }

    #[test]
    fn test_retrieve_long_spelling_via_replacement_rules() {
        assert_eq!(
            retrieve_legal_form("Siemens Aktiengesellschaft", "DE").as_deref(),
            Some("DE-AG")
        );
        assert_eq!(
            retrieve_legal_form("Beispiel Gesellschaft mit beschränkter Haftung", "DE").as_deref(),
            Some("DE-GMBH")
        );
    }

    #[test]
    fn test_retrieve_prefers_the_longest_compound_form() {
        assert_eq!(
            retrieve_legal_form("Muster GmbH & Co. KG", "DE").as_deref(),
            Some("DE-GMBH-CO-KG")
        );
    }

    #[test]
    fn test_retrieve_prefers_the_rightmost_match() {
        // "AG" opens the name, "GmbH" closes it; the trailing form wins.
        assert_eq!(
            retrieve_legal_form("AG Vermögensverwaltung GmbH", "DE").as_deref(),
            Some("DE-GMBH")
        );
    }

    #[test]
    fn test_retrieve_unknown_country() {
        assert_eq!(retrieve_legal_form("Siemens AG", "XX"), None);
    }

    #[test]
    fn test_retrieve_agglutinated_suffix_by_fallback() {
        // "stiftung" glued to the name only matches through the
        // concatenated-suffix fallback.
        assert_eq!(
            retrieve_legal_form("Beispielstiftung", "DE").as_deref(),
            Some("DE-STIFTUNG")
        );
    }

    #[test]
    fn test_abbreviated_forms_do_not_fire_the_fallback() {
        // "...erse" must not be read as the European-company suffix SE.
        assert_eq!(retrieve_legal_form("Deutsche Boerse", "DE"), None);
    }

    #[test]
    fn test_removal_simple() {
        assert_eq!(company_name_without_legal_form("Siemens AG", "DE"), "siemens");
        assert_eq!(
            company_name_without_legal_form("Muster GmbH & Co. KG", "DE"),
            "muster"
        );
    }

    #[test]
    fn test_removal_restores_original_tokens() {
        assert_eq!(
            company_name_without_legal_form("Vereinigte Stahlwerke Aktiengesellschaft", "DE"),
            "vereinigte stahlwerke"
        );
    }

    #[test]
    fn test_removal_splits_agglutinated_tokens() {
        // The replacement rule "Gesellschaft mbH -> gmbh" splits the head
        // "bau" off the first token before the form is removed.
        assert_eq!(
            company_name_without_legal_form("Baugesellschaft mbH", "DE"),
            "bau"
        );
    }

    #[test]
    fn test_removal_trims_fallback_suffix_characters() {
        assert_eq!(
            company_name_without_legal_form("Beispielstiftung", "DE"),
            "beispiel"
        );
    }

    #[test]
    fn test_removal_without_any_form_returns_normalized_name() {
        assert_eq!(
            company_name_without_legal_form("Warner Brothers Discovery", "DE"),
            "warner brothers discovery"
        );
        assert_eq!(company_name_without_legal_form("", "DE"), "");
    }

    #[test]
    fn test_normalize_handles_connectors_and_diacritics() {
        let outcome = normalize_with_tracking("Müller & Söhne GmbH");
        assert_eq!(
            outcome.alternatives,
            vec![vec!["mueller", "u", "soehne", "gmbh"]]
        );
    }

    #[test]
    fn test_normalize_of_empty_input() {
        let outcome = normalize_with_tracking("   ");
        assert_eq!(outcome.alternatives, vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_split_tracker_shifts_mappings() {
        let mut tracker = SplitTracker::with_identity_mapping(3);
        tracker.record_split(1);
        assert_eq!(tracker.normalized_indices(0), vec![0]);
        assert_eq!(tracker.normalized_indices(1), vec![1, 2]);
        assert_eq!(tracker.normalized_indices(2), vec![3]);
        assert!(tracker.contributed_to_match(1, 2, 2));
        assert!(!tracker.contributed_to_match(0, 2, 3));
    }

    #[test]
    fn test_fallback_alignment_rejects_misaligned_tokens() {
        let tokens: Vec<String> = vec!["abc".into(), "xkg".into()];
        // Concatenation ends with "kg" inside the last token.
        assert_eq!(align_fallback_suffix(&tokens, "kg"), Some((1, 2)));
        assert_eq!(align_fallback_suffix(&tokens, "ykg"), None);
    }
}
