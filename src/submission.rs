// ABOUTME: Builds and submits factor analysis and cross-validation jobs
// ABOUTME: Validation runs before any request; the job id is generated client-side

use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::metadata::MaskField;
use crate::model::{JobId, SelectableOption};
use crate::remote::models::{
    CallBack, CrossValCriteria, CrossValidationPayload, FactorAnalysisPayload,
    FactorAnalysisSettingsSpec, FactorSpec, ModelSpec, TaskPayload, TraitSpec, Variance,
};
use crate::remote::TaskApi;
use crate::tables::resolve_table_name;

pub const DEFAULT_P_VALUE_THRESHOLD: f64 = 0.05;
pub const DEFAULT_CORR_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_COMBINATIONS: u32 = 32768;
pub const DEFAULT_SEED: u64 = 42;

// Every factor is submitted as a crossed effect.
const FACTOR_TYPE: &str = "cross";
const MODEL_METHOD: &str = "blup";
const VAR_A: f64 = 0.3;
const VAR_E: f64 = 0.7;

pub const MSG_SELECT_BREED: &str = "Please select a breed";
pub const MSG_SELECT_TRAIT: &str = "Please select a trait";
pub const MSG_SELECT_FACTOR: &str = "Please select at least one factor";
pub const MSG_SELECT_MASKING_STRATEGY: &str = "Please select a masking strategy";
pub const MSG_SELECT_MASKING_VALUE: &str = "Please select a masking value";
pub const MSG_MASKING_FRACTION: &str = "Masking fraction must be greater than 0 and at most 1";

#[derive(Debug, Clone, PartialEq)]
pub struct FactorAnalysisSettings {
    pub analyze_all_combinations: bool,
    pub p_value_threshold: f64,
    pub corr_threshold: f64,
    pub max_combinations: u32,
}

impl Default for FactorAnalysisSettings {
    fn default() -> Self {
        Self {
            analyze_all_combinations: false,
            p_value_threshold: DEFAULT_P_VALUE_THRESHOLD,
            corr_threshold: DEFAULT_CORR_THRESHOLD,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

/// How records are withheld in cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskingMode {
    Sex,
    Farm,
    /// Month and year combined (`01.2018`).
    MonthYear,
    Random,
}

impl MaskingMode {
    /// Identifier the service expects in `cross_val_criteria.mode`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            MaskingMode::Sex => "sex",
            MaskingMode::Farm => "farm",
            MaskingMode::MonthYear => "year",
            MaskingMode::Random => "random",
        }
    }

    /// Field queried for the list of selectable masking values.
    pub fn mask_field(&self) -> Option<MaskField> {
        match self {
            MaskingMode::Sex => Some(MaskField::Sex),
            MaskingMode::Farm => Some(MaskField::Farm),
            MaskingMode::MonthYear => Some(MaskField::MonthYear),
            MaskingMode::Random => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sex" => Some(MaskingMode::Sex),
            "farm" => Some(MaskingMode::Farm),
            "year" | "month_year" | "month-year" => Some(MaskingMode::MonthYear),
            "random" => Some(MaskingMode::Random),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationSettings {
    pub mode: MaskingMode,
    pub value: Option<String>,
    pub fraction: Option<f64>,
    pub seed: Option<u64>,
}

impl CrossValidationSettings {
    pub fn by_value(mode: MaskingMode, value: impl Into<String>) -> Self {
        Self {
            mode,
            value: Some(value.into()),
            fraction: None,
            seed: Some(DEFAULT_SEED),
        }
    }

    pub fn random(fraction: f64) -> Self {
        Self {
            mode: MaskingMode::Random,
            value: None,
            fraction: Some(fraction),
            seed: Some(DEFAULT_SEED),
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        match self.mode {
            MaskingMode::Random => match self.fraction {
                Some(f) if f > 0.0 && f <= 1.0 => Ok(()),
                _ => Err(AnalysisError::Validation(MSG_MASKING_FRACTION.to_string())),
            },
            _ => match self.value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(()),
                _ => Err(AnalysisError::Validation(MSG_SELECT_MASKING_VALUE.to_string())),
            },
        }
    }

    /// Only the parameter relevant to the mode is sent.
    fn criteria(&self) -> CrossValCriteria {
        let is_random = self.mode == MaskingMode::Random;
        CrossValCriteria {
            mode: self.mode.wire_name().to_string(),
            value: if is_random { None } else { self.value.clone() },
            fraction: if is_random { self.fraction } else { None },
            seed: self.seed,
        }
    }
}

/// Selections for a factor analysis run, as held by the submitting view.
#[derive(Debug, Clone, Default)]
pub struct FactorAnalysisRequest {
    pub db_name: String,
    pub breed: Option<SelectableOption>,
    pub trait_option: Option<SelectableOption>,
    pub factors: Vec<SelectableOption>,
    pub settings: FactorAnalysisSettings,
}

impl FactorAnalysisRequest {
    /// An empty factor list is allowed only when analysing all combinations.
    pub fn validate(&self) -> Result<()> {
        if self.breed.is_none() {
            return Err(AnalysisError::Validation(MSG_SELECT_BREED.to_string()));
        }
        if self.trait_option.is_none() {
            return Err(AnalysisError::Validation(MSG_SELECT_TRAIT.to_string()));
        }
        if self.factors.is_empty() && !self.settings.analyze_all_combinations {
            return Err(AnalysisError::Validation(MSG_SELECT_FACTOR.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CrossValidationRequest {
    pub db_name: String,
    pub breed: Option<SelectableOption>,
    pub trait_option: Option<SelectableOption>,
    pub factors: Vec<SelectableOption>,
    pub settings: Option<CrossValidationSettings>,
}

impl CrossValidationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.breed.is_none() {
            return Err(AnalysisError::Validation(MSG_SELECT_BREED.to_string()));
        }
        if self.trait_option.is_none() {
            return Err(AnalysisError::Validation(MSG_SELECT_TRAIT.to_string()));
        }
        if self.factors.is_empty() {
            return Err(AnalysisError::Validation(MSG_SELECT_FACTOR.to_string()));
        }
        match &self.settings {
            Some(settings) => settings.validate(),
            None => Err(AnalysisError::Validation(MSG_SELECT_MASKING_STRATEGY.to_string())),
        }
    }
}

fn missing(what: &str) -> AnalysisError {
    AnalysisError::Validation(format!("Please select a {}", what))
}

fn trait_spec(option: &SelectableOption, with_label: bool) -> TraitSpec {
    TraitSpec {
        table: resolve_table_name(option.into()),
        name: option.code_or_label().to_string(),
        label: with_label.then(|| option.label.clone()),
    }
}

fn factor_spec(option: &SelectableOption, with_labels: bool) -> FactorSpec {
    FactorSpec {
        table: resolve_table_name(option.into()),
        name: option.code_or_label().to_string(),
        kind: FACTOR_TYPE.to_string(),
        label: with_labels.then(|| option.label.clone()),
        factor_type: if with_labels {
            option.factor_kind.map(|k| k.as_str().to_string())
        } else {
            None
        },
    }
}

/// Pure payload builder; `request` must already be validated.
pub fn build_factor_analysis(
    job_id: JobId,
    request: &FactorAnalysisRequest,
) -> Result<TaskPayload> {
    let breed = request.breed.as_ref().ok_or_else(|| missing("breed"))?;
    let trait_option = request.trait_option.as_ref().ok_or_else(|| missing("trait"))?;
    let settings = &request.settings;

    Ok(TaskPayload::FactorAnalysis(FactorAnalysisPayload {
        id: job_id,
        db_name: request.db_name.clone(),
        call_back: CallBack::default(),
        breed_id: breed.id.clone(),
        trait_spec: trait_spec(trait_option, true),
        factors: request.factors.iter().map(|f| factor_spec(f, true)).collect(),
        settings: FactorAnalysisSettingsSpec {
            analyze_all_combinations: settings.analyze_all_combinations,
            p_value_threshold: settings.p_value_threshold,
            corr_threshold: settings.corr_threshold,
            max_combinations: settings.max_combinations,
        },
    }))
}

/// Pure payload builder; the single BLUP model gets its own id.
pub fn build_cross_validation(
    job_id: JobId,
    model_id: String,
    request: &CrossValidationRequest,
) -> Result<TaskPayload> {
    let breed = request.breed.as_ref().ok_or_else(|| missing("breed"))?;
    let trait_option = request.trait_option.as_ref().ok_or_else(|| missing("trait"))?;
    let settings = request
        .settings
        .as_ref()
        .ok_or_else(|| missing("masking strategy"))?;

    let trait_spec = trait_spec(trait_option, false);
    let factors: Vec<FactorSpec> = request.factors.iter().map(|f| factor_spec(f, false)).collect();
    let model = ModelSpec {
        id: model_id,
        method: MODEL_METHOD.to_string(),
        factors: factors.clone(),
        table: trait_spec.table,
        trait_code: trait_spec.name.clone(),
        variance: Variance {
            var_a: VAR_A,
            var_e: VAR_E,
        },
    };

    Ok(TaskPayload::CrossValidation(CrossValidationPayload {
        id: job_id,
        db_name: request.db_name.clone(),
        call_back: CallBack::default(),
        breed_id: breed.id.clone(),
        trait_spec,
        factors,
        models: vec![model],
        cross_val_criteria: settings.criteria(),
    }))
}

/// Posts the payload. The id inside it was generated before this call, so a
/// failed submission leaves the caller with an id it should discard.
pub async fn submit(api: &dyn TaskApi, payload: &TaskPayload) -> Result<JobId> {
    api.send_task(payload).await?;
    info!(job_id = %payload.id(), kind = payload.kind(), "Task submitted");
    Ok(payload.id().clone())
}

pub async fn submit_factor_analysis(
    api: &dyn TaskApi,
    request: &FactorAnalysisRequest,
) -> Result<JobId> {
    request.validate()?;
    let payload = build_factor_analysis(JobId::generate(), request)?;
    submit(api, &payload).await
}

pub async fn submit_cross_validation(
    api: &dyn TaskApi,
    request: &CrossValidationRequest,
) -> Result<JobId> {
    request.validate()?;
    let model_id = uuid::Uuid::new_v4().to_string();
    let payload = build_cross_validation(JobId::generate(), model_id, request)?;
    submit(api, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedApi;

    fn breed() -> SelectableOption {
        SelectableOption::new("B1", "Йоркшир").with_code("bmk_yy")
    }

    fn liveborn() -> SelectableOption {
        SelectableOption::new("3", "Живорожденные")
            .with_code("liveborn")
            .with_kind("reproduction")
    }

    fn factor(code: &str, label: &str) -> SelectableOption {
        SelectableOption::new(code, label).with_code(code)
    }

    fn fa_request(factors: Vec<SelectableOption>, analyze_all: bool) -> FactorAnalysisRequest {
        FactorAnalysisRequest {
            db_name: "bmk_yy".to_string(),
            breed: Some(breed()),
            trait_option: Some(liveborn()),
            factors,
            settings: FactorAnalysisSettings {
                analyze_all_combinations: analyze_all,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_empty_factors_rejected_before_network() {
        let api = ScriptedApi::new(vec![]);
        let err = submit_factor_analysis(&api, &fa_request(vec![], false))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::Validation(MSG_SELECT_FACTOR.to_string()));
        assert_eq!(api.submitted().len(), 0);
    }

    #[tokio::test]
    async fn test_analyze_all_allows_empty_factors() {
        let api = ScriptedApi::new(vec![]);
        let job_id = submit_factor_analysis(&api, &fa_request(vec![], true))
            .await
            .unwrap();
        let submitted = api.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id(), &job_id);
    }

    #[test]
    fn test_missing_breed_and_trait() {
        let mut request = fa_request(vec![factor("sex", "Пол")], false);
        request.trait_option = None;
        assert_eq!(
            request.validate(),
            Err(AnalysisError::Validation(MSG_SELECT_TRAIT.to_string()))
        );
        request.breed = None;
        assert_eq!(
            request.validate(),
            Err(AnalysisError::Validation(MSG_SELECT_BREED.to_string()))
        );
    }

    #[test]
    fn test_factor_analysis_payload_shape() {
        let mut temp = factor("TEMP", "Температура");
        temp.factor_kind = Some(crate::model::FactorKind::Continual);
        let request = fa_request(vec![temp, factor("nipples", "Соски")], false);
        let payload = build_factor_analysis(JobId::from("job-9"), &request).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "factor_analysis");
        assert_eq!(json["db_name"], "bmk_yy");
        assert_eq!(json["breed_id"], "B1");
        assert_eq!(json["trait"]["table"], "reproduction");
        assert_eq!(json["trait"]["name"], "liveborn");
        assert_eq!(json["trait"]["label"], "Живорожденные");
        assert_eq!(json["factors"][0]["table"], "animals");
        assert_eq!(json["factors"][0]["type"], "cross");
        assert_eq!(json["factors"][0]["factor_type"], "continual");
        assert_eq!(json["factors"][1]["table"], "classification");
        assert_eq!(json["settings"]["p_value_threshold"], 0.05);
        assert_eq!(json["settings"]["corr_threshold"], 0.7);
        assert_eq!(json["settings"]["max_combinations"], 32768);
    }

    fn cv_request(settings: Option<CrossValidationSettings>) -> CrossValidationRequest {
        CrossValidationRequest {
            db_name: "bmk_yy".to_string(),
            breed: Some(breed()),
            trait_option: Some(liveborn()),
            factors: vec![factor("sex", "Пол")],
            settings,
        }
    }

    #[test]
    fn test_masking_validation() {
        assert!(cv_request(None).validate().is_err());
        assert_eq!(
            cv_request(Some(CrossValidationSettings::by_value(MaskingMode::Sex, " "))).validate(),
            Err(AnalysisError::Validation(MSG_SELECT_MASKING_VALUE.to_string()))
        );
        let month_year = CrossValidationSettings::by_value(MaskingMode::MonthYear, "01.2018");
        assert!(cv_request(Some(month_year)).validate().is_ok());
        assert!(cv_request(Some(CrossValidationSettings::random(0.0))).validate().is_err());
        assert!(cv_request(Some(CrossValidationSettings::random(1.5))).validate().is_err());
        assert!(cv_request(Some(CrossValidationSettings::random(1.0))).validate().is_ok());

        let mut request = cv_request(Some(CrossValidationSettings::random(0.1)));
        request.factors.clear();
        assert_eq!(
            request.validate(),
            Err(AnalysisError::Validation(MSG_SELECT_FACTOR.to_string()))
        );
    }

    #[test]
    fn test_cross_validation_payload_shape() {
        let request = cv_request(Some(CrossValidationSettings::by_value(
            MaskingMode::MonthYear,
            "01.2018",
        )));
        let payload =
            build_cross_validation(JobId::from("job-1"), "model-1".to_string(), &request).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "cross_validation");
        assert_eq!(json["cross_val_criteria"]["mode"], "year");
        assert_eq!(json["cross_val_criteria"]["value"], "01.2018");
        assert!(json["cross_val_criteria"].get("fraction").is_none());
        assert_eq!(json["cross_val_criteria"]["seed"], 42);
        assert_eq!(json["models"][0]["id"], "model-1");
        assert_eq!(json["models"][0]["method"], "blup");
        assert_eq!(json["models"][0]["trait"], "liveborn");
        assert_eq!(json["models"][0]["table"], "reproduction");
        assert_eq!(json["models"][0]["variance"]["varA"], 0.3);
        assert!(json["trait"].get("label").is_none());
        assert!(json["factors"][0].get("label").is_none());
    }

    #[test]
    fn test_random_masking_sends_fraction_only() {
        let mut settings = CrossValidationSettings::random(0.25);
        settings.value = Some("ignored".to_string());
        let criteria = settings.criteria();
        assert_eq!(criteria.mode, "random");
        assert_eq!(criteria.value, None);
        assert_eq!(criteria.fraction, Some(0.25));
    }

    #[test]
    fn test_masking_mode_names() {
        assert_eq!(MaskingMode::parse("month_year"), Some(MaskingMode::MonthYear));
        assert_eq!(MaskingMode::parse("year"), Some(MaskingMode::MonthYear));
        assert_eq!(MaskingMode::MonthYear.mask_field(), Some(MaskField::MonthYear));
        assert_eq!(MaskingMode::Random.mask_field(), None);
        assert_eq!(MaskingMode::parse("herd"), None);
    }
}
