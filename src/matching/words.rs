// src/matching/words.rs - multi-pass fuzzy word-to-word matching with
// prefix and abbreviation awareness

use once_cell::sync::Lazy;
use regex::Regex;
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::utils::text::normalize_preserve_specials;

const SCORE_THRESHOLD: f64 = 0.6;
const LENGTH_DIFFERENCE_THRESHOLD: f64 = 0.2;

// (min score, prefix matching) per pass, strictest first.
const PASSES: [(f64, bool); 6] = [
    (0.98, false),
    (0.98, true),
    (0.95, true),
    (0.9, true),
    (0.8, true),
    (0.6, true),
];

static TRAILING_SPECIALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.;:/$%&"!]+$"#).expect("invalid TRAILING_SPECIALS_RE"));
static WORD_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-/]+").expect("invalid WORD_SPLIT_RE"));

/// Score of a word-to-word comparison and whether the prefix rule decided it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareResult {
    pub score: f64,
    pub used_prefix: bool,
}

impl CompareResult {
    fn thresholded(score: f64, used_prefix: bool) -> Self {
        if score < SCORE_THRESHOLD {
            Self {
                score: 0.0,
                used_prefix: false,
            }
        } else {
            Self { score, used_prefix }
        }
    }
}

/// An assignment of one word in list A to an index in list B.
#[derive(Debug, Clone, Copy)]
pub struct MatchEntry {
    pub index_b: usize,
    pub score: f64,
    pub used_prefix: bool,
}

/// Result of matching two word lists: one optional entry per word of A,
/// plus the B indices nothing claimed.
#[derive(Debug)]
pub struct WordListMatch {
    pub matches: Vec<Option<MatchEntry>>,
    pub unmatched_b: Vec<usize>,
}

/// Compare two words. The base score is `min(Jaro-Winkler, Levenshtein)`;
/// words of length <= 2 on both sides only compare equal or not. With
/// `allow_prefix`, a word at least 20% longer is additionally compared
/// through its prefix of the shorter word's length (trailing specials
/// stripped, 0.8 penalty when the shorter's last character is absent from
/// the longer's tail). Scores below 0.6 collapse to 0.
pub fn compare_word(
    word1: &str,
    word2: &str,
    allow_prefix: bool,
    can_use_abbreviation: bool,
) -> CompareResult {
    if word1.is_empty() || word2.is_empty() {
        if word1.is_empty() && word2.is_empty() {
            return CompareResult {
                score: 1.0,
                used_prefix: false,
            };
        }
        return CompareResult {
            score: 0.0,
            used_prefix: false,
        };
    }

    let len1 = word1.chars().count();
    let len2 = word2.chars().count();

    let full_score = if len1 <= 2 && len2 <= 2 {
        if word1 == word2 {
            1.0
        } else {
            0.0
        }
    } else {
        normalized_levenshtein(word1, word2).min(jaro_winkler(word1, word2))
    };

    let mut abbrev_score = 0.0;
    if allow_prefix
        && can_use_abbreviation
        && len1 > 1
        && len2 > 1
        && is_likely_abbreviation(word1, word2)
    {
        abbrev_score = 0.95;
    }

    if !allow_prefix || len1 == len2 {
        return CompareResult::thresholded(full_score, false);
    }

    let (longer, shorter) = if len1 > len2 {
        (word1, word2)
    } else {
        (word2, word1)
    };
    let longer_len = longer.chars().count();
    let shorter_len = shorter.chars().count();

    let length_difference = (longer_len - shorter_len) as f64 / shorter_len as f64;
    if length_difference < LENGTH_DIFFERENCE_THRESHOLD {
        return CompareResult::thresholded(full_score, false);
    }

    let longer_clean = TRAILING_SPECIALS_RE.replace(longer, "").to_string();
    let shorter_clean = TRAILING_SPECIALS_RE.replace(shorter, "").to_string();
    if longer_clean.is_empty() || shorter_clean.is_empty() {
        return CompareResult::thresholded(full_score, false);
    }

    let longer_chars: Vec<char> = longer_clean.chars().collect();
    let shorter_chars: Vec<char> = shorter_clean.chars().collect();
    let prefix: String = if longer_chars.len() >= shorter_chars.len() {
        longer_chars[..shorter_chars.len()].iter().collect()
    } else {
        longer_clean.clone()
    };

    let prefix_score = if shorter_chars.len() <= 3 {
        if prefix == shorter_clean {
            1.0
        } else {
            0.0
        }
    } else {
        let mut score = normalized_levenshtein(&prefix, &shorter_clean)
            .min(jaro_winkler(&prefix, &shorter_clean));
        let prefix_chars: Vec<char> = prefix.chars().collect();
        if let (Some(&last1), Some(&last2)) = (prefix_chars.last(), shorter_chars.last()) {
            if last1 != last2 && prefix_chars.len() != longer_chars.len() {
                let rest: String = longer_chars[prefix_chars.len()..].iter().collect();
                if !rest.contains(last2) {
                    score *= 0.8;
                }
            }
        }
        score
    };

    if prefix_score > full_score && prefix_score > abbrev_score {
        CompareResult::thresholded(prefix_score, true)
    } else if full_score >= abbrev_score {
        CompareResult::thresholded(full_score, false)
    } else {
        CompareResult::thresholded(abbrev_score, true)
    }
}

/// True when the shorter word starts with the same letter as the longer
/// and all of its remaining characters appear in the longer in order.
/// "Deutschland"/"Dtl" holds, "Eintragung"/"Egr" does not.
pub fn is_likely_abbreviation(str1: &str, str2: &str) -> bool {
    if str1.is_empty() || str2.is_empty() {
        return false;
    }

    let len1 = str1.chars().count();
    let len2 = str2.chars().count();
    if len1 == len2 {
        return false;
    }
    let (longer, shorter) = if len1 > len2 {
        (str1, str2)
    } else {
        (str2, str1)
    };

    let longer: Vec<char> = longer.to_uppercase().chars().collect();
    let shorter: Vec<char> = shorter.to_uppercase().chars().collect();
    if longer[0] != shorter[0] {
        return false;
    }

    let mut position = 0usize;
    for &c in &shorter {
        match longer[position..].iter().position(|&lc| lc == c) {
            Some(offset) => position += offset + 1,
            None => return false,
        }
    }
    true
}

fn find_best_match(
    word_a: &str,
    previous_index_b: usize,
    list_b: &[String],
    used_b: &[bool],
    allow_prefix: bool,
    min_score: f64,
    is_in_order: bool,
) -> Option<MatchEntry> {
    let mut best: Option<MatchEntry> = None;
    let mut best_score = min_score - 0.0001;

    // Ascending index order keeps tie-breaking deterministic.
    for (index_b, word_b) in list_b.iter().enumerate() {
        if used_b[index_b] {
            continue;
        }
        let result = compare_word(
            word_a,
            word_b,
            allow_prefix,
            is_in_order && index_b > previous_index_b,
        );
        if result.score >= min_score && result.score > best_score {
            best_score = result.score;
            best = Some(MatchEntry {
                index_b,
                score: result.score,
                used_prefix: result.used_prefix,
            });
        }
    }

    best
}

fn previous_index(matches: &[Option<MatchEntry>], end_index: usize) -> usize {
    if matches.len() <= 1 {
        return 0;
    }
    let mut previous = 0usize;
    for entry in matches.iter().take(end_index).flatten() {
        previous = entry.index_b;
    }
    previous
}

/// Assign words of A to words of B across six passes of decreasing
/// strictness. Every word matches at most once per side; an assignment
/// landing before an earlier one flips the order flag, which disables the
/// abbreviation bonus for subsequent comparisons.
pub fn match_word_lists(list_a: &[String], list_b: &[String]) -> WordListMatch {
    let mut matches: Vec<Option<MatchEntry>> = vec![None; list_a.len()];
    let mut used_b = vec![false; list_b.len()];
    let mut is_in_order = true;

    for (min_score, allow_prefix) in PASSES {
        let mut all_matched = true;

        for index_a in 0..list_a.len() {
            if matches[index_a].is_some() {
                continue;
            }
            all_matched = false;

            let previous = previous_index(&matches, index_a);
            if let Some(entry) = find_best_match(
                &list_a[index_a],
                previous,
                list_b,
                &used_b,
                allow_prefix,
                min_score,
                is_in_order,
            ) {
                used_b[entry.index_b] = true;
                if previous > entry.index_b {
                    is_in_order = false;
                }
                matches[index_a] = Some(entry);
            }
        }

        if all_matched {
            break;
        }
    }

    let unmatched_b = used_b
        .iter()
        .enumerate()
        .filter(|(_, &used)| !used)
        .map(|(index, _)| index)
        .collect();

    WordListMatch {
        matches,
        unmatched_b,
    }
}

fn word_order_mismatches(matches: &[Option<MatchEntry>]) -> usize {
    let mut mismatches = 0;
    let mut previous: Option<usize> = None;
    for entry in matches.iter().flatten() {
        if let Some(prev) = previous {
            if entry.index_b < prev {
                mismatches += 1;
            }
        }
        previous = Some(entry.index_b);
    }
    mismatches
}

fn split_and_clean_words(input: &str) -> Vec<String> {
    let without_amp = input.replace('&', "");
    WORD_SPLIT_RE
        .split(&without_amp)
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Word-level similarity of two names. The shorter token list drives the
/// matching; rejected outright when it is half the other's size or less,
/// when fewer than half its words match, when only prefix matches exist,
/// or when under half of the paired characters are covered. Prefix
/// matches are penalized by 0.1, unmatched A words contribute 0.4, each
/// excess unmatched B word costs x0.95 (one free per three matched) and
/// each order violation costs x0.98.
pub fn compare_by_words(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        if a.trim().is_empty() && b.trim().is_empty() {
            return 1.0;
        }
        return 0.0;
    }

    let words_a = split_and_clean_words(a);
    let words_b = split_and_clean_words(b);
    if words_a.is_empty() || words_b.is_empty() {
        if words_a.is_empty() && words_b.is_empty() {
            return 1.0;
        }
        return 0.0;
    }

    let (list_a, list_b) = if words_a.len() <= words_b.len() {
        (words_a, words_b)
    } else {
        (words_b, words_a)
    };

    if list_a.len() * 2 <= list_b.len() {
        return 0.0;
    }

    let normalized_a: Vec<String> = list_a
        .iter()
        .map(|w| normalize_preserve_specials(w))
        .collect();
    let normalized_b: Vec<String> = list_b
        .iter()
        .map(|w| normalize_preserve_specials(w))
        .collect();

    let result = match_word_lists(&normalized_a, &normalized_b);
    let order_mismatches = word_order_mismatches(&result.matches);

    final_score(
        &result,
        list_a.len(),
        order_mismatches,
        &normalized_a,
        &normalized_b,
    )
}

fn final_score(
    result: &WordListMatch,
    list_a_len: usize,
    order_mismatches: usize,
    list_a: &[String],
    list_b: &[String],
) -> f64 {
    let matched_count = result.matches.iter().flatten().count();

    // More than half of A must match: 2 of 2, 2 of 3, 3 of 4.
    if matched_count < (list_a_len + 1) / 2 {
        return 0.0;
    }

    if !result.matches.iter().flatten().any(|m| !m.used_prefix) {
        return 0.0;
    }

    let mut total_characters = 0usize;
    let mut matched_characters = 0usize;
    for (index_a, entry) in result.matches.iter().enumerate() {
        if let Some(entry) = entry {
            let len_a = list_a[index_a].chars().count();
            let len_b = list_b[entry.index_b].chars().count();
            total_characters += len_a.max(len_b);
            matched_characters += len_a.min(len_b);
        }
    }
    if total_characters > 0 && (matched_characters as f64) < total_characters as f64 / 2.0 {
        return 0.0;
    }

    let mut sum = 0.0;
    for entry in &result.matches {
        match entry {
            Some(entry) if entry.used_prefix => sum += entry.score - 0.1,
            Some(entry) => sum += entry.score,
            None => sum += 0.4,
        }
    }
    let mut average = sum / list_a_len as f64;

    let free_unmatched_b = matched_count / 3;
    let penalized_unmatched_b = result.unmatched_b.len().saturating_sub(free_unmatched_b);
    for _ in 0..penalized_unmatched_b {
        average *= 0.95;
    }
    for _ in 0..order_mismatches {
        average *= 0.98;
    }

    average
}
