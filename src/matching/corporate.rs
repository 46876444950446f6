// src/matching/corporate.rs - pairwise corporate name scoring
//
// The score combines diacritic-insensitive equality, penalized
// Jaro-Winkler, Levenshtein, ordered word matching with abbreviation
// handling, word-list comparison and initial-letter matching. Absence of
// a score means "no opinion", never an error.

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::catalog;
use crate::matching::legal_form_cleaner::clean_company_name;
use crate::matching::legal_form_retriever::{company_name_without_legal_form, retrieve_legal_form};
use crate::matching::words::compare_by_words;
use crate::utils::text::equal_without_diacriticals;

const DEFAULT_COUNTRY: &str = "DE";
const LEGAL_FORM_MISMATCH_PENALTY: f64 = 0.9;

/// Jaro-Winkler is too optimistic when the first letters agree; stretch
/// the distance from a perfect score by 2.5. The value can go negative
/// and stays unclamped because later branches compare it against high
/// thresholds.
fn stretched_jaro_winkler(a: &str, b: &str) -> f64 {
    1.0 - (1.0 - jaro_winkler(a, b)) * 2.5
}

/// Match two corporate names with both countries defaulting to Germany.
pub fn match_corporate_names(name1: &str, name2: &str) -> Option<f64> {
    match_corporate_names_in_countries(name1, name2, Some(DEFAULT_COUNTRY), Some(DEFAULT_COUNTRY))
}

/// Probability that two corporate names denote the same legal entity, or
/// `None` when the matcher has no opinion (empty inputs, names that
/// collapse to nothing after legal-form removal, or no method passing
/// its threshold).
pub fn match_corporate_names_in_countries(
    name1: &str,
    name2: &str,
    country_code1: Option<&str>,
    country_code2: Option<&str>,
) -> Option<f64> {
    catalog::init();

    let trimmed1 = name1.trim().to_uppercase();
    let trimmed2 = name2.trim().to_uppercase();
    if trimmed1.is_empty() || trimmed2.is_empty() {
        return None;
    }

    if equal_without_diacriticals(&trimmed1, &trimmed2) {
        return Some(1.0);
    }

    let jw_score = stretched_jaro_winkler(&trimmed1, &trimmed2);
    if jw_score >= 0.95 {
        return Some(jw_score);
    }

    let l_score = if trimmed1.chars().count() > 2 && trimmed2.chars().count() > 2 {
        // Capped at 0.95 so residual differences keep some weight.
        normalized_levenshtein(&trimmed1, &trimmed2).min(0.95)
    } else {
        0.0
    };
    if l_score >= 0.95 {
        return Some(l_score);
    }

    // Conflicting country codes fall back to the default; a single
    // provided code covers both sides.
    let country = match (country_code1, country_code2) {
        (Some(c1), Some(c2)) if !c1.eq_ignore_ascii_case(c2) => DEFAULT_COUNTRY.to_string(),
        (Some(c1), _) => c1.to_uppercase(),
        (None, Some(c2)) => c2.to_uppercase(),
        (None, None) => DEFAULT_COUNTRY.to_string(),
    };

    let retrieved1 = retrieve_legal_form(&trimmed1, &country);
    let retrieved2 = retrieve_legal_form(&trimmed2, &country);

    // One name without a legal form still pairs with a carrier of one.
    let have_any_form = retrieved1.is_some() || retrieved2.is_some();

    let mismatch_penalty = match (&retrieved1, &retrieved2) {
        (Some(form1), Some(form2)) if form1 != form2 => LEGAL_FORM_MISMATCH_PENALTY,
        _ => 1.0,
    };

    let (cleaned1, cleaned2) = if have_any_form {
        (
            company_name_without_legal_form(&trimmed1, &country).to_uppercase(),
            company_name_without_legal_form(&trimmed2, &country).to_uppercase(),
        )
    } else {
        (clean_company_name(&trimmed1), clean_company_name(&trimmed2))
    };

    if cleaned1.is_empty() || cleaned2.is_empty() {
        return None;
    }

    if equal_without_diacriticals(&cleaned1, &cleaned2) {
        return Some(0.99 * mismatch_penalty);
    }

    if let Some(word_match_score) = match_words_with_abbreviations(&cleaned1, &cleaned2) {
        if word_match_score > 0.85 {
            return Some(word_match_score);
        }
    }

    let word_score = compare_by_words(&cleaned1, &cleaned2);

    if match_initial_letters(&cleaned1, &cleaned2).is_some() {
        return Some(0.5);
    }

    let cleaned_jw = stretched_jaro_winkler(&cleaned1, &cleaned2);
    let cleaned_l = if cleaned1.chars().count() > 2 && cleaned2.chars().count() > 2 {
        // The cleaned forms lose word-order information, so a perfect
        // Levenshtein stays below 1.0.
        normalized_levenshtein(&cleaned1, &cleaned2).min(0.95)
    } else {
        0.0
    };

    if cleaned_jw * mismatch_penalty >= 0.9 && cleaned_l >= word_score {
        return Some(cleaned_jw * mismatch_penalty);
    }

    if word_score > l_score && word_score > cleaned_l && word_score >= 0.85 {
        return Some(word_score * mismatch_penalty);
    }

    if l_score >= 0.85 {
        return Some(l_score * mismatch_penalty);
    }

    if cleaned_l >= 0.85 {
        return Some(cleaned_l * mismatch_penalty);
    }

    None
}

/// Split a name into words on whitespace and hyphens, additionally
/// splitting after dots while keeping the dot with its word, so
/// "Co.KG" becomes ["Co.", "KG"].
fn split_into_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    for part in name.split(|c: char| c.is_whitespace() || c == '-') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.contains('.') {
            let mut current = String::new();
            for c in part.chars() {
                current.push(c);
                if c == '.' {
                    let word = current.trim().to_string();
                    if !word.is_empty() {
                        words.push(word);
                    }
                    current.clear();
                }
            }
            let tail = current.trim().to_string();
            if !tail.is_empty() {
                words.push(tail);
            }
        } else {
            words.push(part.to_string());
        }
    }
    words
}

/// Ordered word matching in both directions; the better defined
/// direction wins, which keeps the public score symmetric.
fn match_words_with_abbreviations(name1: &str, name2: &str) -> Option<f64> {
    let words1 = split_into_words(name1);
    let words2 = split_into_words(name2);

    if words1.len() <= 1 || words2.len() <= 1 {
        return None;
    }

    let score1 = match_word_sequence(&words1, &words2);
    let score2 = match_word_sequence(&words2, &words1);

    match (score1, score2) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Pair words by index up to the shorter length. Every pair must match
/// exactly, as a single-letter abbreviation, or with Jaro-Winkler
/// >= 0.95; one failing pair voids the direction. Extra words discount
/// the score instead of voiding it.
fn match_word_sequence(words1: &[String], words2: &[String]) -> Option<f64> {
    let total_words = words1.len().min(words2.len());
    let max_total_words = words1.len().max(words2.len());

    if total_words == 0 || total_words as f64 <= max_total_words as f64 / 2.0 {
        return None;
    }

    let mut total_score = 0.0;
    for i in 0..total_words {
        let word1 = &words1[i];
        let word2 = &words2[i];

        if word1.eq_ignore_ascii_case(word2) || equal_without_diacriticals(word1, word2) {
            total_score += 1.0;
            continue;
        }

        if is_abbreviation(word1, word2) || is_abbreviation(word2, word1) {
            total_score += 0.9;
            continue;
        }

        let word_jw = jaro_winkler(word1, word2);
        if word_jw >= 0.95 {
            total_score += word_jw;
            continue;
        }

        return None;
    }

    Some(total_score / (total_words as f64 + (max_total_words - total_words) as f64 * 0.2))
}

/// "Business"/"B." and "Machines"/"M" count as abbreviation pairs.
fn is_abbreviation(full_word: &str, abbrev: &str) -> bool {
    let full_len = full_word.chars().count();
    let abbrev_len = abbrev.chars().count();
    if full_len <= abbrev_len {
        return false;
    }

    let first_full = match full_word.chars().next() {
        Some(c) => c.to_ascii_uppercase(),
        None => return false,
    };
    let first_abbrev = match abbrev.chars().next() {
        Some(c) => c.to_ascii_uppercase(),
        None => return false,
    };

    if abbrev_len == 2 && abbrev.ends_with('.') {
        return first_abbrev == first_full;
    }
    if abbrev_len == 1 {
        return first_abbrev == first_full;
    }
    false
}

/// "International Business Machines" vs "IBM" scores a flat 0.5.
fn match_initial_letters(name1: &str, name2: &str) -> Option<f64> {
    let words1 = split_into_words(name1);
    let words2 = split_into_words(name2);

    if matches_initials(&words1, name2) || matches_initials(&words2, name1) {
        return Some(0.5);
    }
    None
}

fn matches_initials(long_words: &[String], short_name: &str) -> bool {
    if long_words.is_empty() || short_name.is_empty() {
        return false;
    }

    let initials: String = long_words
        .iter()
        .filter_map(|word| word.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let short_upper: String = short_name
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .collect();

    initials == short_upper
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names_score_one() {
        assert_eq!(match_corporate_names("Siemens AG", "Siemens AG"), Some(1.0));
        assert_eq!(match_corporate_names("siemens ag", "SIEMENS AG"), Some(1.0));
    }

    #[test]
    fn test_diacritic_variants_score_one() {
        assert_eq!(
            match_corporate_names("Müller GmbH", "Mueller GmbH"),
            Some(1.0)
        );
        assert_eq!(match_corporate_names("Müller GmbH", "Muller GmbH"), Some(1.0));
    }

    #[test]
    fn test_empty_names_have_no_opinion() {
        assert_eq!(match_corporate_names("", "Siemens AG"), None);
        assert_eq!(match_corporate_names("Siemens AG", "   "), None);
        assert_eq!(match_corporate_names("", ""), None);
    }

    #[test]
    fn test_warner_brothers_pair() {
        let score = match_corporate_names("Warner Brothers Discovery", "Warner Bros. Discovery")
            .expect("score");
        assert!(score > 0.85, "score was {score}");
    }

    #[test]
    fn test_johnson_pair() {
        let score =
            match_corporate_names("Johnson & Johnson", "Johnson and Jonson").expect("score");
        assert!(score > 0.85, "score was {score}");
    }

    #[test]
    fn test_pnc_pair_with_abbreviated_tail() {
        let score = match_corporate_names(
            "PNC Financial Services Group",
            "PNC Financial Service G.",
        )
        .expect("score");
        assert!(score > 0.85, "score was {score}");
    }

    #[test]
    fn test_paypal_singular_plural() {
        let score = match_corporate_names("PayPal Holdings", "PayPal Holding").expect("score");
        assert!(score > 0.85, "score was {score}");
    }

    #[test]
    fn test_initials_stay_below_detection_threshold() {
        assert_eq!(
            match_corporate_names("International Business Machines", "IBM"),
            Some(0.5)
        );
    }

    #[test]
    fn test_differing_legal_forms_apply_the_mismatch_factor() {
        let score = match_corporate_names("Siemens AG", "Siemens GmbH").expect("score");
        assert!(score > 0.85, "score was {score}");
        assert!((score - 0.99 * 0.9).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_one_sided_legal_form_is_copied() {
        let score = match_corporate_names("Beispiel GmbH", "Beispiel").expect("score");
        assert!((score - 0.99).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_name_collapsing_to_a_bare_legal_form_has_no_opinion() {
        assert_eq!(match_corporate_names("GmbH", "Beispiel GmbH"), None);
    }

    #[test]
    fn test_unrelated_names_have_no_opinion() {
        assert_eq!(
            match_corporate_names("Deutsche Telekom", "Bayerische Motoren Werke"),
            None
        );
    }

    #[test]
    fn test_score_is_commutative() {
        let pairs = [
            ("Warner Brothers Discovery", "Warner Bros. Discovery"),
            ("Johnson & Johnson", "Johnson and Jonson"),
            ("Siemens AG", "Siemens GmbH"),
            ("PayPal Holdings", "PayPal Holding"),
            ("International Business Machines", "IBM"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                match_corporate_names(a, b),
                match_corporate_names(b, a),
                "asymmetric for {a} / {b}"
            );
        }
    }

    #[test]
    fn test_conflicting_countries_fall_back_to_default() {
        let score = match_corporate_names_in_countries(
            "Beispiel GmbH",
            "Beispiel Aktiengesellschaft",
            Some("DE"),
            Some("AT"),
        )
        .expect("score");
        assert!((score - 0.99 * 0.9).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_split_into_words_keeps_dots() {
        assert_eq!(
            split_into_words("Warner Bros. Discovery"),
            vec!["Warner", "Bros.", "Discovery"]
        );
        assert_eq!(split_into_words("Co.KG"), vec!["Co.", "KG"]);
        assert_eq!(split_into_words("A-B C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_is_abbreviation() {
        assert!(is_abbreviation("Business", "B."));
        assert!(is_abbreviation("Machines", "M"));
        assert!(!is_abbreviation("Business", "Bus"));
        assert!(!is_abbreviation("B.", "Business"));
    }

    #[test]
    fn test_matches_initials() {
        let words = split_into_words("International Business Machines");
        assert!(matches_initials(&words, "IBM"));
        assert!(!matches_initials(&words, "IBX"));
    }
}
