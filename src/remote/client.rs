// ABOUTME: HTTP client for the BLUP analysis service endpoints
// ABOUTME: Handles metadata listing, job submission, status polling, results and saved snapshots

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::models::{
    BreedOut, DatabaseOut, FactorOut, RawFactorAnalysisResult, SaveRequest,
    SavedCrossValidation, SavedFactorAnalysis, TaskPayload, TraitOut,
};
use super::routing::{with_query, RouteStrategy};
use super::transport::{Credentials, Transport};
use crate::error::Result;
use crate::model::{CrossValidationResult, JobId, JobStatus};

/// The job-facing part of the service. The poller and the processing
/// controller only depend on this trait.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn send_task(&self, payload: &TaskPayload) -> Result<()>;

    async fn task_status(&self, job_id: &JobId) -> Result<JobStatus>;

    async fn factor_analysis_result(&self, job_id: &JobId) -> Result<RawFactorAnalysisResult>;

    async fn cross_validation_result(&self, job_id: &JobId) -> Result<CrossValidationResult>;
}

#[derive(Clone)]
pub struct BlupClient {
    transport: Transport,
}

impl BlupClient {
    pub fn new(route: Arc<dyn RouteStrategy>, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(route, credentials)?,
        })
    }

    pub fn base_url(&self) -> String {
        self.transport.base_url()
    }

    pub async fn companies(&self) -> Result<Vec<DatabaseOut>> {
        self.transport.get("/meta/companies").await
    }

    pub async fn databases(&self) -> Result<Vec<DatabaseOut>> {
        self.transport
            .get(&with_query("/meta/databases", &[("group", "bmk")]))
            .await
    }

    pub async fn breeds(&self, db: &str) -> Result<Vec<BreedOut>> {
        self.transport
            .get(&with_query("/meta/breeds", &[("db", db)]))
            .await
    }

    pub async fn breeds_all(&self) -> Result<Vec<BreedOut>> {
        self.transport.get("/meta/breeds_all").await
    }

    pub async fn traits(&self, db: &str) -> Result<Vec<TraitOut>> {
        self.transport
            .get(&with_query("/meta/traits", &[("db", db)]))
            .await
    }

    pub async fn factors(&self, db: &str) -> Result<Vec<FactorOut>> {
        self.transport
            .get(&with_query("/meta/factors", &[("db", db)]))
            .await
    }

    pub async fn mask_values(&self, db: &str, breed_id: &str, field: &str) -> Result<Vec<String>> {
        let endpoint = with_query(
            "/meta/mask_values",
            &[("db", db), ("breed_id", breed_id), ("field", field)],
        );
        self.transport.get(&endpoint).await
    }

    /// Complete report archive (ZIP) for a finished job.
    pub async fn download_report(&self, job_id: &JobId) -> Result<Vec<u8>> {
        let endpoint = format!("/tasks/{}/report", job_id);
        self.transport
            .request_bytes(&endpoint, Some("application/zip"))
            .await
    }

    /// A single named artifact of a finished job.
    pub async fn download_artifact(&self, job_id: &JobId, filename: &str) -> Result<Vec<u8>> {
        let endpoint = with_query(&format!("/tasks/{}/download", job_id), &[("file", filename)]);
        self.transport.request_bytes(&endpoint, None).await
    }

    pub async fn save_factor_analysis(
        &self,
        job_id: &JobId,
        name: Option<String>,
    ) -> Result<SavedFactorAnalysis> {
        let endpoint = format!("/factor_analysis/{}/save", job_id);
        self.transport.post(&endpoint, &SaveRequest { name }).await
    }

    pub async fn saved_factor_analyses(
        &self,
        db: &str,
        breed_id: &str,
        trait_code: &str,
    ) -> Result<Vec<SavedFactorAnalysis>> {
        let endpoint = with_query(
            "/factor_analysis/saved",
            &[("db", db), ("breed_id", breed_id), ("trait_code", trait_code)],
        );
        self.transport.get(&endpoint).await
    }

    pub async fn delete_saved_factor_analysis(&self, saved_id: &str) -> Result<()> {
        let endpoint = format!("/factor_analysis/saved/{}", saved_id);
        self.transport.delete(&endpoint).await
    }

    pub async fn save_cross_validation(
        &self,
        job_id: &JobId,
        name: Option<String>,
    ) -> Result<SavedCrossValidation> {
        let endpoint = format!("/cross_validation/{}/save", job_id);
        self.transport.post(&endpoint, &SaveRequest { name }).await
    }

    pub async fn saved_cross_validations(
        &self,
        db: &str,
        breed_id: &str,
        trait_code: &str,
    ) -> Result<Vec<SavedCrossValidation>> {
        let endpoint = with_query(
            "/cross_validation/saved",
            &[("db", db), ("breed_id", breed_id), ("trait_code", trait_code)],
        );
        self.transport.get(&endpoint).await
    }

    pub async fn delete_saved_cross_validation(&self, saved_id: &str) -> Result<()> {
        let endpoint = format!("/cross_validation/saved/{}", saved_id);
        self.transport.delete(&endpoint).await
    }
}

#[async_trait]
impl TaskApi for BlupClient {
    async fn send_task(&self, payload: &TaskPayload) -> Result<()> {
        info!(job_id = %payload.id(), kind = payload.kind(), "Submitting task");
        // The acknowledgement body carries nothing we need; the id is ours.
        self.transport
            .send("/send_task", reqwest::Method::POST, Some(payload))
            .await
    }

    async fn task_status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.transport
            .get(&format!("/tasks/{}/status", job_id))
            .await
    }

    async fn factor_analysis_result(&self, job_id: &JobId) -> Result<RawFactorAnalysisResult> {
        self.transport
            .get(&format!("/tasks/{}/result", job_id))
            .await
    }

    async fn cross_validation_result(&self, job_id: &JobId) -> Result<CrossValidationResult> {
        self.transport
            .get(&format!("/tasks/{}/result", job_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::routing::{Deployment, DeploymentRoute};

    #[test]
    fn test_client_creation() {
        let route = Arc::new(DeploymentRoute::new(
            "https://api.example.com",
            Deployment::Forwarding,
        ));
        let client = BlupClient::new(route, None);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://api.example.com/api");
    }
}
