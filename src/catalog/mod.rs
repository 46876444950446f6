// src/catalog/mod.rs - one-time loading of legal-form and place catalogs
//
// All catalog data is parsed once into immutable structures. The bundled
// resource files are compiled in, so the crate scores names without any
// filesystem setup; the `load` constructors exist for callers that ship
// their own catalog files.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::utils::text::clean_tokens;

const LEGAL_FORMS_JSON: &str = include_str!("../../resources/legal_forms.json");
const ADDITION_LEGAL_FORMS: &str = include_str!("../../resources/addition_legal_forms.txt");
const LEGAL_FORM_REPLACEMENTS: &str = include_str!("../../resources/legal_form_replacements.csv");
const CITY_MAPPINGS: &str = include_str!("../../resources/cityMappings.txt");
const NOBILITY_TITLES: &str = include_str!("../../resources/nobility-titles.txt");
const PERSONAL_TITLES: &str = include_str!("../../resources/titles.txt");

#[derive(Debug, Deserialize)]
struct LegalFormRecord {
    legal_form_id: String,
    short_name: String,
    #[serde(default)]
    long_name: Option<String>,
    country: String,
}

/// One recognized legal form of a country, pre-cleaned for window matching.
#[derive(Debug, Clone)]
pub struct LegalFormEntry {
    pub legal_form_id: String,
    pub cleaned_short_name: Vec<String>,
    /// Whether the short name is an actual abbreviation of the long name.
    /// Abbreviated forms are excluded from the concatenated-suffix
    /// fallback, which would otherwise fire on arbitrary name endings.
    pub actually_shortened: bool,
}

impl LegalFormEntry {
    pub fn cleaned_len(&self) -> usize {
        self.cleaned_short_name.iter().map(|w| w.len()).sum()
    }

    pub fn concatenated_cleaned(&self) -> String {
        self.cleaned_short_name.concat()
    }
}

/// Legal forms grouped by country, each country sorted by cleaned length
/// descending so longer forms win the first scan.
#[derive(Debug, Default)]
pub struct LegalFormRegistry {
    by_country: HashMap<String, Vec<LegalFormEntry>>,
}

impl LegalFormRegistry {
    pub fn parse(json: &str) -> Result<Self> {
        let records: Vec<LegalFormRecord> =
            serde_json::from_str(json).context("failed to parse legal forms JSON")?;

        let mut by_country: HashMap<String, Vec<LegalFormEntry>> = HashMap::new();
        for record in records {
            let cleaned_short_name = clean_tokens(&record.short_name);
            if cleaned_short_name.is_empty() {
                warn!(
                    "skipping legal form {} with empty cleaned short name",
                    record.legal_form_id
                );
                continue;
            }
            let actually_shortened = record
                .long_name
                .as_deref()
                .map(|long| !record.short_name.eq_ignore_ascii_case(long))
                .unwrap_or(false);
            by_country
                .entry(record.country.to_uppercase())
                .or_default()
                .push(LegalFormEntry {
                    legal_form_id: record.legal_form_id,
                    cleaned_short_name,
                    actually_shortened,
                });
        }

        for entries in by_country.values_mut() {
            entries.sort_by(|a, b| b.cleaned_len().cmp(&a.cleaned_len()));
        }

        let total: usize = by_country.values().map(Vec::len).sum();
        info!(
            "loaded {} legal forms across {} countries",
            total,
            by_country.len()
        );
        Ok(Self { by_country })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read legal forms file {}", path.display()))?;
        Self::parse(&json)
    }

    pub fn for_country(&self, country_code: &str) -> Option<&[LegalFormEntry]> {
        self.by_country
            .get(&country_code.to_uppercase())
            .map(Vec::as_slice)
    }
}

/// A multiword suffix-rewriting rule applied during normalization.
#[derive(Debug, Clone)]
pub struct ReplacementRule {
    pub search_words: Vec<String>,
    pub replacement: String,
}

impl ReplacementRule {
    pub fn word_count(&self) -> usize {
        self.search_words.len()
    }

    fn pattern_len(&self) -> usize {
        self.search_words.iter().map(|w| w.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct ReplacementTable {
    rules: Vec<ReplacementRule>,
}

impl ReplacementTable {
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((pattern, replacement)) = line.split_once(',') else {
                warn!(
                    "skipping malformed replacement rule at line {}: {}",
                    line_number + 1,
                    line
                );
                continue;
            };
            let search_words = clean_tokens(pattern);
            let replacement = replacement.trim().to_lowercase();
            if search_words.is_empty() || replacement.is_empty() {
                warn!(
                    "skipping empty replacement rule at line {}: {}",
                    line_number + 1,
                    line
                );
                continue;
            }
            rules.push(ReplacementRule {
                search_words,
                replacement,
            });
        }

        // Longer patterns must win over their own sub-patterns.
        rules.sort_by(|a, b| {
            b.word_count()
                .cmp(&a.word_count())
                .then(b.pattern_len().cmp(&a.pattern_len()))
        });

        info!("loaded {} legal form replacement rules", rules.len());
        Self { rules }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read replacement rules {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }
}

/// The flat, country-less set of legal-form strings used by the cleaner.
#[derive(Debug, Default)]
pub struct LegalFormSet {
    // Sorted longest-first so compound forms strip before their tails.
    forms_sorted: Vec<String>,
    lookup: HashSet<String>,
}

impl LegalFormSet {
    pub fn parse(legal_forms_json: &str, additions: &str) -> Result<Self> {
        let records: Vec<LegalFormRecord> =
            serde_json::from_str(legal_forms_json).context("failed to parse legal forms JSON")?;

        let mut lookup = HashSet::new();
        for record in records {
            insert_form(&mut lookup, &record.short_name);
            if let Some(long_name) = &record.long_name {
                insert_form(&mut lookup, long_name);
            }
        }
        for line in additions.lines() {
            insert_form(&mut lookup, line);
        }

        let mut forms_sorted: Vec<String> = lookup.iter().cloned().collect();
        forms_sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        info!("loaded {} legal form strings for the cleaner", lookup.len());
        Ok(Self {
            forms_sorted,
            lookup,
        })
    }

    pub fn load(legal_forms_path: &Path, additions_path: &Path) -> Result<Self> {
        let json = fs::read_to_string(legal_forms_path).with_context(|| {
            format!(
                "failed to read legal forms file {}",
                legal_forms_path.display()
            )
        })?;
        let additions = match fs::read_to_string(additions_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "additional legal forms file {} not readable ({}); continuing without it",
                    additions_path.display(),
                    e
                );
                String::new()
            }
        };
        Self::parse(&json, &additions)
    }

    pub fn contains(&self, form: &str) -> bool {
        self.lookup.contains(&form.trim().to_uppercase())
    }

    /// Forms in stripping order: longest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.forms_sorted.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

fn insert_form(lookup: &mut HashSet<String>, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return;
    }
    lookup.insert(trimmed.to_uppercase());
}

/// Canonical English names for cities, keyed by upper-cased local names.
#[derive(Debug, Default)]
pub struct CityMappings {
    map: HashMap<String, String>,
}

impl CityMappings {
    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("input_name,") {
                continue;
            }
            let Some((input, canonical)) = line.split_once(',') else {
                warn!(
                    "skipping malformed city mapping at line {}: {}",
                    line_number + 1,
                    line
                );
                continue;
            };
            let input = input.trim();
            let canonical = canonical.trim();
            if input.is_empty() || canonical.is_empty() {
                warn!(
                    "skipping empty city mapping at line {}: {}",
                    line_number + 1,
                    line
                );
                continue;
            }
            map.insert(input.to_uppercase(), canonical.to_uppercase());
        }
        info!("loaded {} city mappings", map.len());
        Self { map }
    }

    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                warn!(
                    "city mappings file {} not readable ({}); continuing with empty map",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Canonical English form, or the input upper-cased when unmapped.
    pub fn map_city(&self, city_name: &str) -> String {
        let upper = city_name.trim().to_uppercase();
        self.map.get(&upper).cloned().unwrap_or(upper)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Case-insensitive membership of nobility particles and personal titles.
#[derive(Debug, Default)]
pub struct TitleSet {
    titles: HashSet<String>,
}

impl TitleSet {
    pub fn parse(texts: &[&str]) -> Self {
        let mut titles = HashSet::new();
        for text in texts {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                titles.insert(line.to_uppercase());
            }
        }
        info!("loaded {} nobility particles and titles", titles.len());
        Self { titles }
    }

    pub fn load(paths: &[&Path]) -> Self {
        let mut texts = Vec::new();
        for path in paths {
            match fs::read_to_string(path) {
                Ok(text) => texts.push(text),
                Err(e) => warn!(
                    "titles file {} not readable ({}); continuing without it",
                    path.display(),
                    e
                ),
            }
        }
        Self::parse(&texts.iter().map(String::as_str).collect::<Vec<_>>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.titles.contains(&name.trim().to_uppercase())
    }
}

static LEGAL_FORM_REGISTRY: Lazy<LegalFormRegistry> = Lazy::new(|| {
    LegalFormRegistry::parse(LEGAL_FORMS_JSON).expect("bundled legal_forms.json must parse")
});

static REPLACEMENT_TABLE: Lazy<ReplacementTable> =
    Lazy::new(|| ReplacementTable::parse(LEGAL_FORM_REPLACEMENTS));

static LEGAL_FORM_SET: Lazy<LegalFormSet> = Lazy::new(|| {
    LegalFormSet::parse(LEGAL_FORMS_JSON, ADDITION_LEGAL_FORMS)
        .expect("bundled legal_forms.json must parse")
});

static CITY_MAPPINGS_TABLE: Lazy<CityMappings> = Lazy::new(|| CityMappings::parse(CITY_MAPPINGS));

static TITLE_SET: Lazy<TitleSet> =
    Lazy::new(|| TitleSet::parse(&[NOBILITY_TITLES, PERSONAL_TITLES]));

pub fn legal_form_registry() -> &'static LegalFormRegistry {
    &LEGAL_FORM_REGISTRY
}

pub fn replacement_rules() -> &'static [ReplacementRule] {
    REPLACEMENT_TABLE.rules()
}

pub fn legal_form_set() -> &'static LegalFormSet {
    &LEGAL_FORM_SET
}

pub fn city_mappings() -> &'static CityMappings {
    &CITY_MAPPINGS_TABLE
}

pub fn titles() -> &'static TitleSet {
    &TITLE_SET
}

/// Force every bundled catalog. Scoring entry points call this so catalog
/// construction is sequenced before the first comparison rather than
/// racing into the hot path of some arbitrary pair.
pub fn init() {
    Lazy::force(&LEGAL_FORM_REGISTRY);
    Lazy::force(&REPLACEMENT_TABLE);
    Lazy::force(&LEGAL_FORM_SET);
    Lazy::force(&CITY_MAPPINGS_TABLE);
    Lazy::force(&TITLE_SET);
}
