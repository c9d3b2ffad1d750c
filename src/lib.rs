// ABOUTME: Library root for the BLUP analysis client
// ABOUTME: Exposes metadata listing, task submission, polling, transforms and state

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod poller;
pub mod remote;
pub mod selection;
pub mod store;
pub mod submission;
pub mod tables;
pub mod transform;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::{
    AnalysisKind, CrossValidationKind, FactorAnalysisKind, KindState, ProcessingController,
    ProcessingState,
};
pub use error::{AnalysisError, Result};
pub use metadata::{BreedScope, MaskField, MetadataClient};
pub use model::{
    AnalysisResult, CrossValidationResult, FactorKind, JobId, JobStatus, SelectableOption,
    TaskState,
};
pub use poller::{poll_until_complete, PollOptions};
pub use remote::{BlupClient, Deployment, RouteStrategy, TaskApi};
pub use store::AnalysisStore;
pub use submission::{
    CrossValidationRequest, CrossValidationSettings, FactorAnalysisRequest,
    FactorAnalysisSettings, MaskingMode,
};
pub use tables::TableName;
