// src/utils/text.rs - diacritic folding, case folding, shared token cleaning

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ß needs no entry: `to_uppercase` already expands it to SS.
const SPECIAL_CHAR_MAPPING_EXTENDED: [(char, &str); 5] = [
    ('Ä', "AE"),
    ('Ö', "OE"),
    ('Ü', "UE"),
    ('Æ', "AE"),
    ('Ø', "OE"),
];

const SPECIAL_CHAR_MAPPING_SIMPLE: [(char, &str); 7] = [
    ('Ä', "A"),
    ('Ö', "O"),
    ('Ü', "U"),
    ('Æ', "A"),
    ('Ø', "O"),
    ('Ł', "L"),
    ('Đ', "D"),
];

static CLEAN_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[;$.,_#+*§"!?-]"#).expect("invalid CLEAN_PUNCT_RE"));
static BRACKET_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("invalid BRACKET_GROUP_RE"));

fn replace_special_chars(input: &str, mapping: &[(char, &str)]) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match mapping.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => result.push_str(to),
            None => result.push(c),
        }
    }
    result
}

/// NFD-decompose and drop all combining marks (é -> E after uppercasing).
fn strip_combining_marks(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Reduce to the `{A-Z, 0-9}` alphabet used for strict comparisons.
fn keep_alphanumeric(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

fn normalization_variants(upper: &str) -> [String; 3] {
    [
        keep_alphanumeric(&strip_combining_marks(upper)),
        keep_alphanumeric(&strip_combining_marks(&replace_special_chars(
            upper,
            &SPECIAL_CHAR_MAPPING_EXTENDED,
        ))),
        keep_alphanumeric(&strip_combining_marks(&replace_special_chars(
            upper,
            &SPECIAL_CHAR_MAPPING_SIMPLE,
        ))),
    ]
}

/// Diacritic-insensitive, case-insensitive equality.
///
/// Umlauts match both their simple and extended transliterations, so
/// "Müller" == "Muller" == "Mueller". Each side is normalized under the
/// plain Unicode decomposition, the extended map (Ä->AE, Ø->OE) and the
/// simple map (Ä->A, Ø->O); the strings are equal if any combination of
/// the variants is equal.
pub fn equal_without_diacriticals(first: &str, second: &str) -> bool {
    let first_variants = normalization_variants(&first.to_uppercase());
    let second_variants = normalization_variants(&second.to_uppercase());

    first_variants
        .iter()
        .any(|f| second_variants.iter().any(|s| f == s))
}

/// Uppercase, apply the extended special-char map, strip combining marks
/// and reduce to `{A-Z, 0-9}`.
pub fn normalize_without_diacriticals(input: &str) -> String {
    keep_alphanumeric(&strip_combining_marks(&replace_special_chars(
        &input.to_uppercase(),
        &SPECIAL_CHAR_MAPPING_EXTENDED,
    )))
}

/// Same fold as [`normalize_without_diacriticals`] but non-alphanumeric
/// characters survive. Used where token shape (dots, ampersands) matters.
pub fn normalize_preserve_specials(input: &str) -> String {
    strip_combining_marks(&replace_special_chars(
        &input.to_uppercase(),
        &SPECIAL_CHAR_MAPPING_EXTENDED,
    ))
}

/// Shared cleaning step for the legal-form retriever and the catalog
/// search patterns.
///
/// Lowercases, turns `&` and `+` into the connector token `u`, strips the
/// punctuation class `;$.,_#+*§"!?-` and parenthesized groups, then folds
/// each whitespace token to its diacritic-free lowercase form. The German
/// connector "und" collapses to `u` as well.
pub fn clean_tokens(name: &str) -> Vec<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut processed = trimmed.to_lowercase();
    processed = processed.replace('&', " u ");
    processed = processed.replace('+', " u ");
    let processed = CLEAN_PUNCT_RE.replace_all(&processed, " ");
    let processed = BRACKET_GROUP_RE.replace_all(&processed, " ");

    processed
        .split_whitespace()
        .filter_map(|word| {
            let normalized = normalize_without_diacriticals(word).to_lowercase();
            if normalized.is_empty() {
                None
            } else if normalized == "und" {
                Some("u".to_string())
            } else {
                Some(normalized)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_without_diacriticals_umlauts() {
        assert!(equal_without_diacriticals("Müller", "Mueller"));
        assert!(equal_without_diacriticals("Müller", "Muller"));
        assert!(equal_without_diacriticals("MÜLLER GMBH", "mueller gmbh"));
        assert!(equal_without_diacriticals("Ørsted", "Oersted"));
        assert!(equal_without_diacriticals("Ørsted", "Orsted"));
        assert!(!equal_without_diacriticals("Müller", "Mahler"));
    }

    #[test]
    fn test_equal_without_diacriticals_accents_and_case() {
        assert!(equal_without_diacriticals("Société Générale", "SOCIETE GENERALE"));
        assert!(equal_without_diacriticals("Škoda", "Skoda"));
        assert!(equal_without_diacriticals("", ""));
        assert!(!equal_without_diacriticals("Siemens", "Siemans"));
    }

    #[test]
    fn test_eszett_expands_to_ss() {
        assert!(equal_without_diacriticals("Straße", "Strasse"));
        assert_eq!(normalize_without_diacriticals("Straße"), "STRASSE");
    }

    #[test]
    fn test_normalize_without_diacriticals() {
        assert_eq!(normalize_without_diacriticals("Müller & Söhne"), "MUELLERSOEHNE");
        assert_eq!(normalize_without_diacriticals("café 24"), "CAFE24");
    }

    #[test]
    fn test_normalize_preserve_specials() {
        assert_eq!(normalize_preserve_specials("Bros."), "BROS.");
        assert_eq!(normalize_preserve_specials("Müller & Co."), "MUELLER & CO.");
    }

    #[test]
    fn test_clean_tokens_basic() {
        assert_eq!(
            clean_tokens("Müller & Söhne GmbH"),
            vec!["mueller", "u", "soehne", "gmbh"]
        );
        assert_eq!(
            clean_tokens("Maschinenbau Schmidt und Partner"),
            vec!["maschinenbau", "schmidt", "u", "partner"]
        );
    }

    #[test]
    fn test_clean_tokens_punctuation_and_brackets() {
        assert_eq!(
            clean_tokens("ACME Holding (formerly ACME Group), Inc."),
            vec!["acme", "holding", "inc"]
        );
        assert_eq!(clean_tokens("A+B Technik"), vec!["a", "u", "b", "technik"]);
        assert_eq!(clean_tokens("   "), Vec::<String>::new());
    }

    #[test]
    fn test_clean_tokens_idempotent_on_output() {
        let first = clean_tokens("Bäckerei Künzel & Co. KG");
        let second = clean_tokens(&first.join(" "));
        assert_eq!(first, second);
    }
}
