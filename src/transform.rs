// ABOUTME: Turns raw job results into display models
// ABOUTME: Factor codes are replaced by their labels; unknown codes pass through unchanged

use std::collections::HashMap;

use crate::model::{
    AnalysisResult, Artifacts, Correlation, CrossValidationResult, FactorEffect, JobId,
    ModelAccuracy, SelectableOption,
};
use crate::remote::models::RawFactorAnalysisResult;

const STATUS_SUCCESS: &str = "success";

/// Case-insensitive code (or label, when the option has no code) to label map.
#[derive(Debug, Clone, Default)]
pub struct FactorLabels {
    by_code: HashMap<String, String>,
}

impl FactorLabels {
    pub fn from_options(options: &[SelectableOption]) -> Self {
        let by_code = options
            .iter()
            .map(|o| (o.code_or_label().to_lowercase(), o.label.clone()))
            .collect();
        Self { by_code }
    }

    pub fn label_for(&self, code: &str) -> String {
        self.by_code
            .get(&code.to_lowercase())
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    fn labels_for(&self, codes: &[String]) -> Vec<String> {
        codes.iter().map(|c| self.label_for(c)).collect()
    }
}

pub fn transform_factor_analysis(
    raw: RawFactorAnalysisResult,
    job_id: &JobId,
    labels: &FactorLabels,
) -> AnalysisResult {
    let factor_effects = raw
        .factor_effect
        .unwrap_or_default()
        .into_iter()
        .map(|e| FactorEffect {
            factor: labels.label_for(&e.factor),
            effect: e.effect,
            r2: e.r2.unwrap_or(0.0),
            p_value: e.p_value,
            significant: e.significant,
            is_categorical: e.is_categorical,
        })
        .collect();

    let correlations = raw
        .factor_corr
        .unwrap_or_default()
        .into_iter()
        .map(|c| Correlation {
            factor1: labels.label_for(&c.factor_1),
            factor2: labels.label_for(&c.factor_2),
            correlation: c.corr,
            p_value: c.p_value,
            high_corr: c.high_corr,
        })
        .collect();

    let model_accuracy = raw
        .model_scores
        .unwrap_or_default()
        .into_iter()
        .map(|m| ModelAccuracy {
            factors: labels.labels_for(&m.factors),
            r2: m.r2,
        })
        .collect();

    AnalysisResult {
        id: job_id.to_string(),
        status: STATUS_SUCCESS.to_string(),
        factor_effects,
        correlations,
        model_accuracy,
        recommended_factors: labels.labels_for(&raw.recommended_factors.unwrap_or_default()),
        artifacts: raw.artifacts.map(|a| Artifacts {
            zip_file: a.zip_file,
        }),
        warnings: raw.warnings,
    }
}

/// Cross-validation results need no relabelling; only id and status are stamped.
pub fn transform_cross_validation(
    mut raw: CrossValidationResult,
    job_id: &JobId,
) -> CrossValidationResult {
    raw.id = job_id.to_string();
    if raw.status.is_empty() {
        raw.status = STATUS_SUCCESS.to_string();
    }
    raw
}
