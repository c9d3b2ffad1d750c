// ABOUTME: Attributes traits and factors to their backing table on the service side
// ABOUTME: Also holds the reproduction-factor exclusion rule and the hidden factor list

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::SelectableOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableName {
    Animals,
    Classification,
    Reproduction,
}

const KNOWN_TABLES: [TableName; 3] = [
    TableName::Animals,
    TableName::Classification,
    TableName::Reproduction,
];

const REPRODUCTION_FIELDS: &[&str] = &["liveborn", "cycle", "nest_weight", "fertility"];
const CLASSIFICATION_FIELDS: &[&str] = &["nipples", "daily_growth", "backfat1", "weight"];

// Never offered in factor selection
const HIDDEN_FACTORS: &[&str] = &["farm"];

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Animals => "animals",
            TableName::Classification => "classification",
            TableName::Reproduction => "reproduction",
        }
    }

    fn normalize(value: Option<&str>) -> Option<TableName> {
        let normalized = value?.trim().to_lowercase();
        KNOWN_TABLES
            .iter()
            .copied()
            .find(|table| table.as_str() == normalized)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whatever is known about a trait or factor when deciding its table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHint<'a> {
    pub table: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub code: Option<&'a str>,
    pub label: Option<&'a str>,
}

impl<'a> TableHint<'a> {
    pub fn code(code: &'a str) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn table(table: &'a str) -> Self {
        Self {
            table: Some(table),
            ..Default::default()
        }
    }
}

impl<'a> From<&'a SelectableOption> for TableHint<'a> {
    fn from(option: &'a SelectableOption) -> Self {
        Self {
            table: option.table.as_deref(),
            kind: option.kind.as_deref(),
            code: option.code.as_deref(),
            label: Some(option.label.as_str()),
        }
    }
}

/// Resolution order: explicit table, explicit type, known field codes
/// (code first, label as fallback), then `animals`. Never fails.
pub fn resolve_table_name(hint: TableHint<'_>) -> TableName {
    if let Some(table) = TableName::normalize(hint.table).or(TableName::normalize(hint.kind)) {
        return table;
    }

    let code = hint
        .code
        .filter(|c| !c.is_empty())
        .or(hint.label)
        .unwrap_or_default()
        .to_lowercase();

    if REPRODUCTION_FIELDS.contains(&code.as_str()) {
        TableName::Reproduction
    } else if CLASSIFICATION_FIELDS.contains(&code.as_str()) {
        TableName::Classification
    } else {
        TableName::Animals
    }
}

/// Reproduction-only factors may not explain a trait outside the
/// reproduction table.
pub fn is_reproduction_factor_disallowed(trait_table: TableName, factor_table: TableName) -> bool {
    factor_table == TableName::Reproduction && trait_table != TableName::Reproduction
}

pub fn is_hidden_factor(code: Option<&str>) -> bool {
    match code {
        Some(code) => HIDDEN_FACTORS.contains(&code.to_lowercase().as_str()),
        None => false,
    }
}
