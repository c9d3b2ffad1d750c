// ABOUTME: Wire-level data structures exchanged with the BLUP analysis service
// ABOUTME: Job payloads are serialized to JSON; rows and raw results are deserialized as-is

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{CrossValidationStats, JobId};
use crate::tables::TableName;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseOut {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreedOut {
    pub id: String,
    pub name: String,
    /// Source database, only present on the all-databases listing.
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraitOut {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactorOut {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub factor_type: Option<String>,
}

/// Empty callback block; the service requires the key but we never use it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallBack {
    pub url: String,
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitSpec {
    pub table: TableName,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorSpec {
    pub table: TableName,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorAnalysisSettingsSpec {
    pub analyze_all_combinations: bool,
    pub p_value_threshold: f64,
    pub corr_threshold: f64,
    pub max_combinations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorAnalysisPayload {
    pub id: JobId,
    pub db_name: String,
    #[serde(rename = "callBack")]
    pub call_back: CallBack,
    pub breed_id: String,
    #[serde(rename = "trait")]
    pub trait_spec: TraitSpec,
    pub factors: Vec<FactorSpec>,
    pub settings: FactorAnalysisSettingsSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variance {
    #[serde(rename = "varA")]
    pub var_a: f64,
    #[serde(rename = "varE")]
    pub var_e: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub id: String,
    pub method: String,
    pub factors: Vec<FactorSpec>,
    pub table: TableName,
    #[serde(rename = "trait")]
    pub trait_code: String,
    pub variance: Variance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValCriteria {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationPayload {
    pub id: JobId,
    pub db_name: String,
    #[serde(rename = "callBack")]
    pub call_back: CallBack,
    pub breed_id: String,
    #[serde(rename = "trait")]
    pub trait_spec: TraitSpec,
    pub factors: Vec<FactorSpec>,
    pub models: Vec<ModelSpec>,
    pub cross_val_criteria: CrossValCriteria,
}

/// Body of `POST /send_task`, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    FactorAnalysis(FactorAnalysisPayload),
    CrossValidation(CrossValidationPayload),
}

impl TaskPayload {
    pub fn id(&self) -> &JobId {
        match self {
            TaskPayload::FactorAnalysis(p) => &p.id,
            TaskPayload::CrossValidation(p) => &p.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskPayload::FactorAnalysis(_) => "factor_analysis",
            TaskPayload::CrossValidation(_) => "cross_validation",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFactorEffect {
    pub factor: String,
    pub effect: Option<f64>,
    pub r2: Option<f64>,
    pub p_value: f64,
    pub significant: Option<bool>,
    pub is_categorical: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCorrelation {
    pub factor_1: String,
    pub factor_2: String,
    pub corr: f64,
    pub p_value: f64,
    pub high_corr: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawModelScore {
    #[serde(default)]
    pub factors: Vec<String>,
    pub r2: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtifacts {
    pub zip_file: Option<String>,
}

/// `GET /tasks/{id}/result` for a factor analysis job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFactorAnalysisResult {
    pub factor_effect: Option<Vec<RawFactorEffect>>,
    pub factor_corr: Option<Vec<RawCorrelation>>,
    pub model_scores: Option<Vec<RawModelScore>>,
    pub recommended_factors: Option<Vec<String>>,
    pub artifacts: Option<RawArtifacts>,
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 3339 timestamps, or offset-less ones which the service writes in UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFactorAnalysis {
    pub id: String,
    pub task_id: String,
    pub db_name: String,
    pub breed_id: String,
    pub trait_code: String,
    #[serde(default)]
    pub recommended_factors: Vec<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCrossValidation {
    pub id: String,
    pub task_id: String,
    pub db_name: String,
    pub breed_id: String,
    pub trait_code: String,
    #[serde(default)]
    pub factors: Vec<String>,
    pub masking: CrossValCriteria,
    #[serde(default)]
    pub stats: CrossValidationStats,
    pub r2_ebv_trait: Option<f64>,
    pub r2_pred_trait: Option<f64>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub name: Option<String>,
}
