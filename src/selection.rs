// ABOUTME: Factor list filtering for the selection views
// ABOUTME: Hides denylisted factors and reproduction predictors; matches factors by key

use crate::model::SelectableOption;
use crate::tables::{is_hidden_factor, is_reproduction_factor_disallowed, resolve_table_name};

/// Factors offered for selection at all.
pub fn visible_factors(factors: &[SelectableOption]) -> Vec<SelectableOption> {
    factors
        .iter()
        .filter(|f| !is_hidden_factor(Some(f.code_or_label())))
        .cloned()
        .collect()
}

/// Factors usable as predictors of `trait_option` in cross-validation.
/// Reproduction-only factors are kept only for reproduction traits.
pub fn cross_validation_candidates(
    trait_option: Option<&SelectableOption>,
    factors: &[SelectableOption],
) -> Vec<SelectableOption> {
    let trait_table = trait_option.map(|t| resolve_table_name(t.into()));
    visible_factors(factors)
        .into_iter()
        .filter(|f| match trait_table {
            Some(table) => !is_reproduction_factor_disallowed(table, resolve_table_name(f.into())),
            None => true,
        })
        .collect()
}

/// Whether `key` names `option`: its exact id, or its label or code
/// compared case-insensitively.
pub fn matches_key(option: &SelectableOption, key: &str) -> bool {
    let key = key.trim();
    if option.id == key {
        return true;
    }
    let key = key.to_lowercase();
    option.label.to_lowercase() == key
        || option
            .code
            .as_deref()
            .is_some_and(|code| code.to_lowercase() == key)
}

/// Picks the available factors named in `names`. Used to apply saved
/// recommendations and factors handed over from factor analysis.
pub fn match_factors(names: &[String], available: &[SelectableOption]) -> Vec<SelectableOption> {
    available
        .iter()
        .filter(|f| names.iter().any(|name| matches_key(f, name)))
        .cloned()
        .collect()
}
