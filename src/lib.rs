// src/lib.rs
//
// Corporate-name duplicate detection: normalization, legal-form
// handling, pairwise similarity scoring and blocking-based discovery of
// likely duplicate pairs in large name catalogs.

pub mod catalog;
pub mod matching;
pub mod models;
pub mod utils;

pub use matching::city::match_city_name;
pub use matching::corporate::{match_corporate_names, match_corporate_names_in_countries};
pub use matching::duplicates::find_duplicates;
pub use matching::legal_form_cleaner::{
    clean_company_name, clean_company_name_and_remove_legal_form,
};
pub use matching::legal_form_retriever::{company_name_without_legal_form, retrieve_legal_form};
pub use models::MatchResult;
