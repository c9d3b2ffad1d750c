// ABOUTME: Read-only listings of databases, breeds, traits, factors and mask values
// ABOUTME: Maps server rows to SelectableOption, keeping code/type needed for table resolution

use std::fmt;
use tracing::warn;

use crate::error::Result;
use crate::model::{FactorKind, SelectableOption};
use crate::remote::models::{BreedOut, DatabaseOut, FactorOut, TraitOut};
use crate::remote::BlupClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreedScope {
    Database(String),
    /// Breeds across every database; each option's `code` holds its database.
    All,
}

/// Fields whose distinct values can be used to mask records in cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskField {
    Sex,
    Farm,
    MonthYear,
}

impl MaskField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskField::Sex => "sex",
            MaskField::Farm => "farm",
            MaskField::MonthYear => "month_year",
        }
    }
}

impl fmt::Display for MaskField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn database_option(db: DatabaseOut) -> SelectableOption {
    SelectableOption::new(db.code, db.name)
}

fn breed_option(breed: BreedOut) -> SelectableOption {
    SelectableOption {
        id: breed.id,
        label: breed.name,
        code: breed.db_name,
        ..Default::default()
    }
}

fn trait_option(row: TraitOut) -> SelectableOption {
    SelectableOption::new(row.id.to_string(), row.name)
        .with_code(row.code)
        .with_kind(row.kind)
}

fn factor_option(row: FactorOut) -> SelectableOption {
    SelectableOption {
        id: row.id.to_string(),
        label: row.name,
        code: Some(row.code),
        kind: Some(row.kind),
        table: None,
        factor_kind: row.factor_type.as_deref().and_then(FactorKind::parse),
    }
}

#[derive(Clone)]
pub struct MetadataClient {
    client: BlupClient,
}

impl MetadataClient {
    pub fn new(client: BlupClient) -> Self {
        Self { client }
    }

    /// Companies shown in the database selector.
    pub async fn list_companies(&self) -> Result<Vec<SelectableOption>> {
        let rows = self.client.companies().await?;
        Ok(rows.into_iter().map(database_option).collect())
    }

    pub async fn list_databases(&self) -> Result<Vec<SelectableOption>> {
        let rows = self.client.databases().await?;
        Ok(rows.into_iter().map(database_option).collect())
    }

    pub async fn list_breeds(&self, scope: &BreedScope) -> Result<Vec<SelectableOption>> {
        let rows = match scope {
            BreedScope::Database(db) => self.client.breeds(db).await?,
            BreedScope::All => self.client.breeds_all().await?,
        };
        Ok(rows.into_iter().map(breed_option).collect())
    }

    pub async fn list_traits(&self, db: &str) -> Result<Vec<SelectableOption>> {
        let rows = self.client.traits(db).await?;
        Ok(rows.into_iter().map(trait_option).collect())
    }

    pub async fn list_factors(&self, db: &str) -> Result<Vec<SelectableOption>> {
        let rows = self.client.factors(db).await?;
        Ok(rows.into_iter().map(factor_option).collect())
    }

    pub async fn list_mask_values(
        &self,
        db: &str,
        breed_id: &str,
        field: MaskField,
    ) -> Result<Vec<String>> {
        self.client.mask_values(db, breed_id, field.as_str()).await
    }
}

/// Degrades a failed listing to an empty one so the rest of the view stays usable.
pub fn or_empty<T>(result: Result<Vec<T>>, what: &str) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Failed to load {}", what);
            Vec::new()
        }
    }
}

/// A list remembered together with the scope it was fetched for. A view
/// asks `needs_fetch` before loading so it only refetches when the scope
/// changed or nothing was loaded yet.
#[derive(Debug, Clone, Default)]
pub struct ScopedList<T> {
    scope: Option<String>,
    items: Vec<T>,
}

impl<T> ScopedList<T> {
    pub fn new() -> Self {
        Self {
            scope: None,
            items: Vec::new(),
        }
    }

    pub fn needs_fetch(&self, scope: &str) -> bool {
        self.items.is_empty() || self.scope.as_deref() != Some(scope)
    }

    pub fn set(&mut self, scope: impl Into<String>, items: Vec<T>) {
        self.scope = Some(scope.into());
        self.items = items;
    }

    /// Drops the list, e.g. when the breed changes and dependent lists go stale.
    pub fn reset(&mut self) {
        self.scope = None;
        self.items.clear();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}
