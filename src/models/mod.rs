// src/models/mod.rs

use serde::Serialize;

/// A pair of input names judged to denote the same legal entity.
///
/// `score` is the matcher probability in (0.85, 1.0]; the pair is
/// unordered and stored exactly as the names appeared in the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub name1: String,
    pub name2: String,
    pub score: f64,
}
