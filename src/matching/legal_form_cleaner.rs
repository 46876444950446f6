// src/matching/legal_form_cleaner.rs - bracket/punctuation cleanup and
// whole-word legal form stripping against the flat catalog set

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog;

static TRAILING_BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]+\)\s*$").expect("invalid TRAILING_BRACKET_RE"));

/// Trim, drop a single trailing parenthesized group and remove the
/// punctuation characters `,` `;` `:`.
pub fn clean_company_name(company_name: &str) -> String {
    let trimmed = company_name.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let without_brackets = strip_trailing_brackets(trimmed);
    remove_punctuation(&without_brackets).trim().to_string()
}

/// [`clean_company_name`] plus iterative stripping of every catalog legal
/// form that appears as a trailing whole word. Returns `""` when the
/// entire remainder was a legal form.
pub fn clean_company_name_and_remove_legal_form(company_name: &str) -> String {
    let cleaned = clean_company_name(company_name);
    if cleaned.is_empty() {
        return cleaned;
    }
    remove_legal_forms(&cleaned)
}

fn strip_trailing_brackets(name: &str) -> String {
    match TRAILING_BRACKET_RE.find(name) {
        Some(m) => name[..m.start()].trim_end().to_string(),
        None => name.to_string(),
    }
}

fn remove_punctuation(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, ',' | ':' | ';'))
        .collect()
}

/// Byte index of the whitespace run preceding a trailing whole-word,
/// case-insensitive occurrence of `form` (itself upper-cased).
fn trailing_form_start(name: &str, form: &str) -> Option<usize> {
    for (idx, ch) in name.char_indices() {
        if !ch.is_whitespace() {
            continue;
        }
        if name[idx..].trim_start().to_uppercase() == form {
            return Some(idx);
        }
    }
    None
}

fn remove_legal_forms(name: &str) -> String {
    let forms = catalog::legal_form_set();
    let mut result = name.to_string();

    loop {
        let mut removed = false;
        for form in forms.iter() {
            if result.to_uppercase() == form {
                result.clear();
                removed = true;
                break;
            }
            if let Some(idx) = trailing_form_start(&result, form) {
                result = result[..idx].trim_end().to_string();
                removed = true;
                break;
            }
        }
        if !removed || result.is_empty() {
            break;
        }
    }

    result
}
