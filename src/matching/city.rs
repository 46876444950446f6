// src/matching/city.rs - place-name matching collaborator
//
// Same primitives as the corporate matcher, plus place-specific rules:
// canonical city mappings, topographic qualifier handling ("Frankfurt am
// Main" vs "Frankfurt") and middle-initial abbreviations.

use std::collections::HashSet;

use strsim::jaro_winkler;

use crate::catalog;
use crate::utils::names::is_nobiliary_particle;
use crate::utils::text::{equal_without_diacriticals, normalize_preserve_specials};

// Qualifier openings that mark the rest of a longer place name as a
// topographic tail ("am Main", "bei München", "OT Lindenthal").
const QUALIFIER_REST_MARKERS: [&str; 14] = [
    "AM ", "AN ", "BEI ", "A.", "IM", "I.", "VOR ", "V.", "(", "OT ", ",", "-", "A D", "AN",
];

/// Probability that two place strings denote the same place, or `None`
/// when both provide no usable signal.
pub fn match_city_name(place1: &str, place2: &str) -> Option<f64> {
    catalog::init();

    if place1.trim().is_empty() || place2.trim().is_empty() {
        return None;
    }

    let upper1 = place1.trim().to_uppercase();
    let upper2 = place2.trim().to_uppercase();

    if equal_without_diacriticals(&upper1, &upper2) {
        return Some(1.0);
    }

    let clean1 = normalize_preserve_specials(&upper1);
    let clean2 = normalize_preserve_specials(&upper2);

    if clean1.starts_with(&clean2) || clean2.starts_with(&clean1) {
        let (shorter, longer) = if clean1.len() <= clean2.len() {
            (&clean1, &clean2)
        } else {
            (&clean2, &clean1)
        };
        let rest = longer[shorter.len()..].trim();
        if QUALIFIER_REST_MARKERS
            .iter()
            .any(|marker| rest.starts_with(marker))
        {
            return Some(0.99);
        }
    }

    let mapped1 = catalog::city_mappings().map_city(&upper1);
    let mapped2 = catalog::city_mappings().map_city(&upper2);
    if mapped1 == mapped2 {
        return Some(0.99);
    }

    let word_score = match_individual_words(&mapped1, &mapped2);
    if let Some(score) = word_score {
        if score > 0.9 {
            return Some(score);
        }
    }
    let word_score_significant = word_score.is_some_and(|score| score > 0.85);

    let jw_score = jaro_winkler(&clean1, &clean2);
    if jw_score > 0.9 {
        return Some(jw_score);
    }
    let jw_significant = jw_score > 0.85;

    if jw_significant || word_score_significant {
        let mut max_score: f64 = 0.0;
        if jw_significant {
            max_score = max_score.max(jw_score);
        }
        if word_score_significant {
            max_score = max_score.max(word_score.unwrap_or(0.0));
        }
        return Some(max_score);
    }

    if upper1.chars().count() > 3 && upper2.chars().count() > 3 {
        if upper1.contains(&upper2) || upper2.contains(&upper1) {
            return Some(0.7);
        }
    }

    None
}

/// Split on whitespace, hyphens and slashes, additionally after dots,
/// dropping nobility particles and titles.
fn split_and_filter_names(full_name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for chunk in full_name.split(|c: char| c.is_whitespace() || matches!(c, '-' | '/')) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if chunk.contains('.') {
            let mut current = String::new();
            for c in chunk.chars() {
                current.push(c);
                if c == '.' {
                    let part = current.trim().to_string();
                    if !part.is_empty() {
                        parts.push(part);
                    }
                    current.clear();
                }
            }
            let tail = current.trim().to_string();
            if !tail.is_empty() {
                parts.push(tail);
            }
        } else {
            parts.push(chunk.to_string());
        }
    }

    parts
        .into_iter()
        .filter(|part| !is_nobiliary_particle(part))
        .collect()
}

#[derive(Default)]
struct CityWordMatches {
    scores: Vec<f64>,
    middle_initial_matches: usize,
    has_unmatchable_names: bool,
    abbreviation_indices_1: HashSet<usize>,
    abbreviation_indices_2: HashSet<usize>,
}

impl CityWordMatches {
    fn add_match(&mut self, score: f64) {
        self.scores.push(score);
    }

    fn add_abbreviation_match(&mut self, index1: usize, index2: usize, score: f64) {
        self.scores.push(score);
        self.middle_initial_matches += 1;
        self.abbreviation_indices_1.insert(index1);
        self.abbreviation_indices_2.insert(index2);
    }

    fn has_abbreviation_at(&self, index: usize) -> bool {
        self.abbreviation_indices_1.contains(&index) || self.abbreviation_indices_2.contains(&index)
    }

    fn real_matches(&self) -> usize {
        self.scores.iter().filter(|&&score| score > 0.8).count()
    }

    fn matches_at_least(&self, threshold: f64) -> usize {
        self.scores.iter().filter(|&&score| score >= threshold).count()
    }

    fn average(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
    }
}

fn match_individual_words(full_name1: &str, full_name2: &str) -> Option<f64> {
    let names1 = split_and_filter_names(full_name1);
    let names2 = split_and_filter_names(full_name2);

    if names1.is_empty() || names2.is_empty() {
        return None;
    }

    let result = find_name_matches(&names1, &names2);

    if !is_valid_matching(&result, names1.len(), names2.len()) {
        return None;
    }

    result.average()
}

fn find_name_matches(names1: &[String], names2: &[String]) -> CityWordMatches {
    let mut result = CityWordMatches::default();
    let mut used1 = vec![false; names1.len()];
    let mut used2 = vec![false; names2.len()];

    // Exact, diacritic and Jaro-Winkler matches first.
    for (i, name1) in names1.iter().enumerate() {
        if used1[i] {
            continue;
        }
        if let Some((index, score)) = find_best_word_match(name1, names2, &used2) {
            result.add_match(score);
            used1[i] = true;
            used2[index] = true;
        }
    }

    // Middle-initial abbreviations on the leftovers.
    for (i, name1) in names1.iter().enumerate() {
        if used1[i] {
            continue;
        }
        for (j, name2) in names2.iter().enumerate() {
            if used2[j] {
                continue;
            }
            if is_abbreviation_match(name1, name2) {
                result.add_abbreviation_match(i, j, 0.95);
                used1[i] = true;
                used2[j] = true;
                break;
            }
        }
    }

    handle_unmatched_names(
        names1.len() - used1.iter().filter(|&&u| u).count(),
        names2.len() - used2.iter().filter(|&&u| u).count(),
        &mut result,
    );

    result
}

fn find_best_word_match(
    name: &str,
    candidates: &[String],
    used: &[bool],
) -> Option<(usize, f64)> {
    for (j, candidate) in candidates.iter().enumerate() {
        if used[j] {
            continue;
        }
        if name == candidate || equal_without_diacriticals(name, candidate) {
            return Some((j, 1.0));
        }
    }

    let mut best_index = None;
    let mut best_score = 0.85;
    for (j, candidate) in candidates.iter().enumerate() {
        if used[j] {
            continue;
        }
        let score = jaro_winkler(name, candidate);
        if score > best_score {
            best_score = score;
            best_index = Some(j);
        }
    }

    best_index.map(|index| (index, best_score))
}

fn handle_unmatched_names(unmatched1: usize, unmatched2: usize, result: &mut CityWordMatches) {
    if unmatched1 > 0 && unmatched2 == 0 {
        for _ in 0..unmatched1 {
            result.add_match(0.8);
        }
    } else if unmatched2 > 0 && unmatched1 == 0 {
        for _ in 0..unmatched2 {
            result.add_match(0.8);
        }
    } else if unmatched1 > 0 && unmatched2 > 0 {
        result.has_unmatchable_names = true;
        for _ in 0..unmatched1.max(unmatched2) {
            result.add_match(0.1);
        }
    }
}

/// "M." pairs with any word starting with "M".
fn is_abbreviation_match(name1: &str, name2: &str) -> bool {
    let (mut longer, mut shorter) = if name1.chars().count() > name2.chars().count() {
        (name1, name2)
    } else {
        (name2, name1)
    };

    if shorter.chars().count() == 2 && longer.chars().count() == 2 && longer.ends_with('.') {
        std::mem::swap(&mut longer, &mut shorter);
    }

    shorter.chars().count() == 2
        && shorter.ends_with('.')
        && shorter
            .chars()
            .next()
            .zip(longer.chars().next())
            .is_some_and(|(a, b)| a == b)
}

fn is_valid_matching(result: &CityWordMatches, names1_len: usize, names2_len: usize) -> bool {
    let min_size = names1_len.min(names2_len);

    // Every part of the shorter name needs at least a weak match.
    if result.matches_at_least(0.8) < min_size {
        return false;
    }

    if min_size > 2 && result.has_unmatchable_names && result.real_matches() < 2 {
        return false;
    }

    // Abbreviations only count next to at least one real word match.
    if result.middle_initial_matches > 0
        && result.real_matches() - result.middle_initial_matches < 1
    {
        return false;
    }

    // The leading word must not be an abbreviation.
    if result.has_abbreviation_at(0) {
        return false;
    }

    true
}
