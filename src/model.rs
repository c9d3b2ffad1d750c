// ABOUTME: Display-side value types shared by the metadata, transform and controller layers
// ABOUTME: Serialized camelCase since they are handed straight to the presentation layer

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A database, breed, trait or factor as shown to the user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Backing table name as reported by the service (`type` on the wire).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_kind: Option<FactorKind>,
}

impl SelectableOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// The code sent to the service: the explicit code, or the label when
    /// the service did not provide one.
    pub fn code_or_label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Categorical,
    Continual,
}

impl FactorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorKind::Categorical => "categorical",
            FactorKind::Continual => "continual",
        }
    }

    /// Lenient parse used for server rows; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "categorical" => Some(FactorKind::Categorical),
            "continual" => Some(FactorKind::Continual),
            _ => None,
        }
    }
}

/// Client-generated job identifier, UUID v4 shaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        JobId(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId(value.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
    /// Anything the service reports that we do not recognise; never terminal.
    Unknown,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Error => "error",
            TaskState::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl<'de> Deserialize<'de> for TaskState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "queued" => TaskState::Queued,
            "running" => TaskState::Running,
            "success" => TaskState::Success,
            "error" => TaskState::Error,
            _ => TaskState::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorEffect {
    pub factor: String,
    /// `None` for categorical factors, which have no single effect value.
    pub effect: Option<f64>,
    pub r2: f64,
    pub p_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_categorical: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub factor1: String,
    pub factor2: String,
    pub correlation: f64,
    pub p_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_corr: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracy {
    pub factors: Vec<String>,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_file: Option<String>,
}

/// Factor analysis outcome, with every factor code replaced by its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub status: String,
    pub factor_effects: Vec<FactorEffect>,
    pub correlations: Vec<Correlation>,
    pub model_accuracy: Vec<ModelAccuracy>,
    pub recommended_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, alias = "animal_count", skip_serializing_if = "Option::is_none")]
    pub animal_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrossValidationStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked: Option<StatGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmasked: Option<StatGroup>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossValidationMetrics {
    #[serde(
        default,
        alias = "r2_corr_ebv_trait_masked",
        alias = "r2_ebv_trait",
        skip_serializing_if = "Option::is_none"
    )]
    pub r2_ebv_trait: Option<f64>,
    #[serde(
        default,
        alias = "r2_corr_pred_trait_masked",
        alias = "r2_pred_trait",
        skip_serializing_if = "Option::is_none"
    )]
    pub r2_pred_trait: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrossValidationResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub stats: CrossValidationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CrossValidationMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_uuid_v4_shaped() {
        let id = JobId::generate();
        let parsed = uuid::Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(id, JobId::generate());
    }

    #[test]
    fn test_unknown_task_state_is_not_terminal() {
        let status: JobStatus =
            serde_json::from_str(r#"{"id":"a","status":"provisioning"}"#).unwrap();
        assert_eq!(status.status, TaskState::Unknown);
        assert!(!status.status.is_terminal());

        let status: JobStatus =
            serde_json::from_str(r#"{"id":"a","status":"error","msg":"boom"}"#).unwrap();
        assert!(status.status.is_terminal());
        assert_eq!(status.msg.as_deref(), Some("boom"));
    }

    #[test]
    fn test_cross_validation_metrics_accept_server_names() {
        let raw = r#"{
            "id": "j1",
            "status": "success",
            "stats": {"masked": {"count": 10, "animal_count": 7, "mean": 11.5}},
            "metrics": {"r2_corr_ebv_trait_masked": 0.41, "r2_corr_pred_trait_masked": 0.22}
        }"#;
        let result: CrossValidationResult = serde_json::from_str(raw).unwrap();
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.r2_ebv_trait, Some(0.41));
        assert_eq!(metrics.r2_pred_trait, Some(0.22));
        let masked = result.stats.masked.unwrap();
        assert_eq!(masked.animal_count, Some(7));
        assert!(result.stats.unmasked.is_none());
    }

    #[test]
    fn test_factor_kind_parse_is_lenient() {
        assert_eq!(FactorKind::parse(" Categorical "), Some(FactorKind::Categorical));
        assert_eq!(FactorKind::parse("continual"), Some(FactorKind::Continual));
        assert_eq!(FactorKind::parse("ordinal"), None);
    }
}
