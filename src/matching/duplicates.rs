// src/matching/duplicates.rs - blocking-based duplicate discovery
//
// Candidate reduction: names are normalized into significant tokens, the
// first letters of those tokens form a block key of at most four
// characters, and only pairs inside the same block that share a token
// (or a token prefix) reach the expensive scorer. This cuts the ~3*10^10
// naive comparisons of the large catalog down by several orders of
// magnitude; company duplicates almost always share their leading words.

use std::collections::HashMap;

use log::info;
use rayon::prelude::*;

use crate::catalog;
use crate::matching::corporate::match_corporate_names;
use crate::matching::legal_form_cleaner::clean_company_name;
use crate::models::MatchResult;
use crate::utils::text::normalize_without_diacriticals;

const SCORE_THRESHOLD: f64 = 0.85;
const MAX_BLOCK_KEY_LEN: usize = 4;
const STOPWORDS: [&str; 4] = ["AND", "THE", "OF", "&"];

/// Significant tokens of a name: cleaned, upper-cased, diacritic-folded,
/// reduced to alphanumerics, stopwords removed.
fn normalize_for_blocking(name: &str) -> Vec<String> {
    let cleaned = clean_company_name(name);
    cleaned
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '/' | '&'))
        .map(normalize_without_diacriticals)
        .filter(|token| !token.is_empty())
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// First characters of the tokens, truncated to at most four.
fn block_key(tokens: &[String]) -> String {
    tokens
        .iter()
        .filter_map(|token| token.chars().next())
        .take(MAX_BLOCK_KEY_LEN)
        .collect()
}

fn is_strict_prefix(prefix: &str, word: &str) -> bool {
    prefix.len() < word.len() && word.starts_with(prefix)
}

/// Cheap pre-filter: some token of one name equals, or is a strict
/// prefix of, some token of the other.
fn share_token_or_prefix(tokens_a: &[String], tokens_b: &[String]) -> bool {
    tokens_a.iter().any(|a| {
        tokens_b
            .iter()
            .any(|b| a == b || is_strict_prefix(a, b) || is_strict_prefix(b, a))
    })
}

/// Find all unordered pairs of names scoring above 0.85. Blocks are
/// independent and scored in parallel; result order is not defined.
pub fn find_duplicates(names: &[String]) -> Vec<MatchResult> {
    catalog::init();

    let token_lists: Vec<Vec<String>> = names
        .iter()
        .map(|name| normalize_for_blocking(name))
        .collect();

    let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, tokens) in token_lists.iter().enumerate() {
        blocks.entry(block_key(tokens)).or_default().push(index);
    }

    let block_members: Vec<Vec<usize>> = blocks
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();

    info!(
        "comparing {} names across {} candidate blocks",
        names.len(),
        block_members.len()
    );

    let matches: Vec<MatchResult> = block_members
        .par_iter()
        .flat_map_iter(|members| {
            let mut block_matches = Vec::new();
            for (position, &i) in members.iter().enumerate() {
                for &j in &members[position + 1..] {
                    if !share_token_or_prefix(&token_lists[i], &token_lists[j]) {
                        continue;
                    }
                    if let Some(score) = match_corporate_names(&names[i], &names[j]) {
                        if score > SCORE_THRESHOLD {
                            block_matches.push(MatchResult {
                                name1: names[i].clone(),
                                name2: names[j].clone(),
                                score,
                            });
                        }
                    }
                }
            }
            block_matches
        })
        .collect();

    info!("found {} duplicate pairs above {}", matches.len(), SCORE_THRESHOLD);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_for_blocking_drops_stopwords_and_folds() {
        assert_eq!(
            normalize_for_blocking("Johnson & Johnson"),
            vec!["JOHNSON", "JOHNSON"]
        );
        assert_eq!(
            normalize_for_blocking("The Bank of Münster"),
            vec!["BANK", "MUENSTER"]
        );
        assert_eq!(
            normalize_for_blocking("PNC Financial Service G."),
            vec!["PNC", "FINANCIAL", "SERVICE", "G"]
        );
    }

    #[test]
    fn test_block_key_truncates_to_four() {
        assert_eq!(block_key(&normalize_for_blocking("Warner Brothers Discovery")), "WBD");
        assert_eq!(
            block_key(&normalize_for_blocking("PNC Financial Services Group")),
            "PFSG"
        );
        assert_eq!(
            block_key(&normalize_for_blocking("Alpha Beta Gamma Delta Epsilon")),
            "ABGD"
        );
        assert_eq!(block_key(&[]), "");
    }

    #[test]
    fn test_shared_block_keys_for_known_duplicates() {
        let pairs = [
            ("Warner Brothers Discovery", "Warner Bros. Discovery"),
            ("Johnson & Johnson", "Johnson and Jonson"),
            ("PNC Financial Services Group", "PNC Financial Service G."),
            ("PayPal Holdings", "PayPal Holding"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                block_key(&normalize_for_blocking(a)),
                block_key(&normalize_for_blocking(b)),
                "{a} and {b} must share a block"
            );
        }
    }

    #[test]
    fn test_cheap_filter_accepts_prefix_overlap() {
        let a = normalize_for_blocking("PayPal Holdings");
        let b = normalize_for_blocking("PayPal Holding");
        assert!(share_token_or_prefix(&a, &b));

        let c = normalize_for_blocking("Pacific Holdings");
        let d = normalize_for_blocking("Pineapple Hotels");
        assert!(!share_token_or_prefix(&c, &d));
    }

    #[test]
    fn test_find_duplicates_reports_known_pairs_once() {
        let input = names(&[
            "PayPal Holdings",
            "Deutsche Telekom",
            "PayPal Holding",
            "Siemens Energy",
        ]);
        let matches = find_duplicates(&input);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name1, "PayPal Holdings");
        assert_eq!(matches[0].name2, "PayPal Holding");
        assert!(matches[0].score > 0.85);
    }

    #[test]
    fn test_find_duplicates_never_emits_self_or_ordered_pairs() {
        let input = names(&[
            "Warner Brothers Discovery",
            "Warner Bros. Discovery",
            "Johnson & Johnson",
            "Johnson and Jonson",
        ]);
        let matches = find_duplicates(&input);
        for m in &matches {
            assert_ne!(m.name1, m.name2);
        }
        for (a, m1) in matches.iter().enumerate() {
            for m2 in matches.iter().skip(a + 1) {
                let reversed = m1.name1 == m2.name2 && m1.name2 == m2.name1;
                let repeated = m1.name1 == m2.name1 && m1.name2 == m2.name2;
                assert!(!reversed && !repeated);
            }
        }
    }

    #[test]
    fn test_initials_pairs_are_separated_by_blocking() {
        let input = names(&["International Business Machines", "IBM"]);
        assert!(find_duplicates(&input).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(find_duplicates(&[]).is_empty());
    }
}
