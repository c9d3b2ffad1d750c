// ABOUTME: Command-line front end for the BLUP analysis client
// ABOUTME: Lists metadata, runs factor analysis and cross-validation jobs, manages saved results

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use blup_client::controller::{AnalysisKind, KindState, ProcessingController};
use blup_client::model::JobId;
use blup_client::selection::{
    cross_validation_candidates, match_factors, matches_key, visible_factors,
};
use blup_client::submission::{MSG_SELECT_MASKING_STRATEGY, MSG_SELECT_TRAIT};
use blup_client::{
    logging, AnalysisStore, BlupClient, BreedScope, Config, CrossValidationRequest,
    CrossValidationSettings, FactorAnalysisRequest, FactorAnalysisSettings, MaskingMode,
    MetadataClient, SelectableOption, TaskApi,
};

#[derive(Parser)]
#[command(name = "blup-client")]
#[command(about = "Client for the BLUP genetic analysis service", version)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist.
    #[arg(long, short, global = true, default_value = "blup-client.toml")]
    config: PathBuf,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List companies
    Companies,
    /// List breeding databases
    Databases,
    /// List breeds of a database, or of every database when --db is omitted
    Breeds {
        #[arg(long)]
        db: Option<String>,
    },
    /// List traits of a database
    Traits {
        #[arg(long)]
        db: Option<String>,
    },
    /// List factors of a database
    Factors {
        #[arg(long)]
        db: Option<String>,
        /// Include factors hidden from selection
        #[arg(long)]
        all: bool,
    },
    /// List distinct values of a masking field
    MaskValues {
        #[arg(long)]
        db: Option<String>,
        #[arg(long)]
        breed: String,
        /// sex, farm or month_year
        #[arg(long)]
        field: String,
    },
    /// Run a factor analysis and print the result
    FactorAnalysis {
        #[arg(long)]
        db: Option<String>,
        /// Breed id, code or name
        #[arg(long)]
        breed: String,
        /// Trait code or name
        #[arg(long = "trait")]
        trait_name: String,
        /// Factor code or name; repeat for several factors
        #[arg(long = "factor")]
        factors: Vec<String>,
        #[arg(long)]
        all_combinations: bool,
        #[arg(long)]
        p_value_threshold: Option<f64>,
        #[arg(long)]
        corr_threshold: Option<f64>,
        #[arg(long)]
        max_combinations: Option<u32>,
    },
    /// Run a cross-validation and print the result
    CrossValidation {
        #[arg(long)]
        db: Option<String>,
        #[arg(long)]
        breed: String,
        #[arg(long = "trait")]
        trait_name: String,
        #[arg(long = "factor")]
        factors: Vec<String>,
        /// sex, farm, year or random
        #[arg(long)]
        mode: String,
        /// Masked value for sex, farm and year modes
        #[arg(long)]
        value: Option<String>,
        /// Masked share of records for random mode, in (0, 1]
        #[arg(long)]
        fraction: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List saved factor analyses
    SavedFactorAnalyses {
        #[arg(long)]
        db: Option<String>,
        #[arg(long)]
        breed: String,
        #[arg(long = "trait")]
        trait_code: String,
    },
    /// List saved cross-validations
    SavedCrossValidations {
        #[arg(long)]
        db: Option<String>,
        #[arg(long)]
        breed: String,
        #[arg(long = "trait")]
        trait_code: String,
    },
    /// Save the result of a finished job
    Save {
        #[arg(value_enum)]
        kind: Kind,
        job_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a saved result
    DeleteSaved {
        #[arg(value_enum)]
        kind: Kind,
        saved_id: String,
    },
    /// Download the report archive of a finished job, or one artifact of it
    Report {
        job_id: String,
        #[arg(long, short)]
        output: PathBuf,
        /// Artifact file name inside the job instead of the full report
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    FactorAnalysis,
    CrossValidation,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config =
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?;
    let client = BlupClient::new(config.route(), config.credentials())
        .context("Failed to create HTTP client")?;
    info!(base_url = %client.base_url(), "Using BLUP service");

    let app = App { config, client };
    app.run(cli.command).await
}

struct App {
    config: Config,
    client: BlupClient,
}

impl App {
    fn db(&self, db: Option<String>) -> String {
        db.unwrap_or_else(|| self.config.defaults.db_name.clone())
    }

    fn metadata(&self) -> MetadataClient {
        MetadataClient::new(self.client.clone())
    }

    fn store(&self) -> AnalysisStore {
        let api: Arc<dyn TaskApi> = Arc::new(self.client.clone());
        AnalysisStore::new(api, self.config.poll_options())
    }

    async fn run(&self, command: Commands) -> Result<()> {
        let metadata = self.metadata();
        match command {
            Commands::Companies => print_json(&metadata.list_companies().await?),
            Commands::Databases => print_json(&metadata.list_databases().await?),
            Commands::Breeds { db } => {
                let scope = match db {
                    Some(db) => BreedScope::Database(db),
                    None => BreedScope::All,
                };
                print_json(&metadata.list_breeds(&scope).await?)
            }
            Commands::Traits { db } => print_json(&metadata.list_traits(&self.db(db)).await?),
            Commands::Factors { db, all } => {
                let factors = metadata.list_factors(&self.db(db)).await?;
                if all {
                    print_json(&factors)
                } else {
                    print_json(&visible_factors(&factors))
                }
            }
            Commands::MaskValues { db, breed, field } => {
                let Some(field) = MaskingMode::parse(&field).and_then(|m| m.mask_field()) else {
                    bail!("Unknown mask field '{}'", field);
                };
                let values = metadata
                    .list_mask_values(&self.db(db), &breed, field)
                    .await?;
                print_json(&values)
            }
            Commands::FactorAnalysis {
                db,
                breed,
                trait_name,
                factors,
                all_combinations,
                p_value_threshold,
                corr_threshold,
                max_combinations,
            } => {
                let db = self.db(db);
                let breed = resolve_breed(&metadata, &db, &breed).await?;
                let trait_option = resolve_trait(&metadata, &db, &trait_name).await?;
                let known_factors = metadata.list_factors(&db).await?;
                let selected = resolve_factors(&factors, &visible_factors(&known_factors))?;

                let defaults = FactorAnalysisSettings::default();
                let request = FactorAnalysisRequest {
                    db_name: db,
                    breed: Some(breed),
                    trait_option: Some(trait_option),
                    factors: selected,
                    settings: FactorAnalysisSettings {
                        analyze_all_combinations: all_combinations,
                        p_value_threshold: p_value_threshold.unwrap_or(defaults.p_value_threshold),
                        corr_threshold: corr_threshold.unwrap_or(defaults.corr_threshold),
                        max_combinations: max_combinations.unwrap_or(defaults.max_combinations),
                    },
                };

                let store = self.store();
                let handle = store.run_factor_analysis(&request, known_factors).await?;
                let result = follow(&store.factor_analysis, handle, "Factor analysis").await?;
                print_json(&result)
            }
            Commands::CrossValidation {
                db,
                breed,
                trait_name,
                factors,
                mode,
                value,
                fraction,
                seed,
            } => {
                let db = self.db(db);
                let breed = resolve_breed(&metadata, &db, &breed).await?;
                let trait_option = resolve_trait(&metadata, &db, &trait_name).await?;
                let known_factors = metadata.list_factors(&db).await?;
                let candidates = cross_validation_candidates(Some(&trait_option), &known_factors);
                let selected = resolve_factors(&factors, &candidates)?;

                let Some(mode) = MaskingMode::parse(&mode) else {
                    bail!("{}", MSG_SELECT_MASKING_STRATEGY);
                };
                let settings = match mode {
                    MaskingMode::Random => CrossValidationSettings::random(fraction.unwrap_or(0.0)),
                    _ => CrossValidationSettings::by_value(mode, value.unwrap_or_default()),
                }
                .with_seed(Some(seed.unwrap_or(self.config.defaults.seed)));

                let request = CrossValidationRequest {
                    db_name: db,
                    breed: Some(breed),
                    trait_option: Some(trait_option),
                    factors: selected,
                    settings: Some(settings),
                };

                let store = self.store();
                let handle = store.run_cross_validation(&request).await?;
                let result = follow(&store.cross_validation, handle, "Cross-validation").await?;
                print_json(&result)
            }
            Commands::SavedFactorAnalyses {
                db,
                breed,
                trait_code,
            } => {
                let saved = self
                    .client
                    .saved_factor_analyses(&self.db(db), &breed, &trait_code)
                    .await?;
                print_json(&saved)
            }
            Commands::SavedCrossValidations {
                db,
                breed,
                trait_code,
            } => {
                let saved = self
                    .client
                    .saved_cross_validations(&self.db(db), &breed, &trait_code)
                    .await?;
                print_json(&saved)
            }
            Commands::Save { kind, job_id, name } => {
                let job_id = JobId::from(job_id);
                match kind {
                    Kind::FactorAnalysis => {
                        print_json(&self.client.save_factor_analysis(&job_id, name).await?)
                    }
                    Kind::CrossValidation => {
                        print_json(&self.client.save_cross_validation(&job_id, name).await?)
                    }
                }
            }
            Commands::DeleteSaved { kind, saved_id } => {
                match kind {
                    Kind::FactorAnalysis => {
                        self.client.delete_saved_factor_analysis(&saved_id).await?
                    }
                    Kind::CrossValidation => {
                        self.client.delete_saved_cross_validation(&saved_id).await?
                    }
                }
                info!(saved_id = %saved_id, "Saved result deleted");
                Ok(())
            }
            Commands::Report {
                job_id,
                output,
                file,
            } => {
                let job_id = JobId::from(job_id);
                let bytes = match file {
                    Some(file) => self.client.download_artifact(&job_id, &file).await?,
                    None => self.client.download_report(&job_id).await?,
                };
                tokio::fs::write(&output, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!(bytes = bytes.len(), path = %output.display(), "Report saved");
                Ok(())
            }
        }
    }
}

/// Waits for the job while showing its state on a spinner. Ctrl-C abandons
/// the job locally; the service keeps running it.
async fn follow<K: AnalysisKind>(
    controller: &ProcessingController<K>,
    mut handle: JoinHandle<()>,
    what: &str,
) -> Result<K::Output> {
    let mut rx = controller.subscribe();
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(progress_message(what, &controller.snapshot()));

    loop {
        tokio::select! {
            joined = &mut handle => {
                joined.context("Polling task aborted")?;
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    (&mut handle).await.context("Polling task aborted")?;
                    break;
                }
                let message = progress_message(what, &*rx.borrow_and_update());
                spinner.set_message(message);
            }
            _ = tokio::signal::ctrl_c() => {
                controller.abandon();
                spinner.finish_and_clear();
                bail!("Interrupted; {} abandoned", what);
            }
        }
    }
    spinner.finish_and_clear();

    let state = controller.snapshot();
    match state.result {
        Some(result) => Ok(result),
        None => bail!(state
            .processing
            .error
            .unwrap_or_else(|| no_result_message(what))),
    }
}

fn no_result_message(what: &str) -> String {
    format!("{} finished without a result", what)
}

fn progress_message<R>(what: &str, state: &KindState<R>) -> String {
    match (&state.processing.job_id, state.server_status) {
        (Some(job_id), Some(status)) => format!("{} {}: {}", what, job_id, status.as_str()),
        (Some(job_id), None) => format!("{} {}: submitted", what, job_id),
        (None, _) => format!("{}: finishing", what),
    }
}

async fn resolve_breed(
    metadata: &MetadataClient,
    db: &str,
    key: &str,
) -> Result<SelectableOption> {
    let breeds = metadata
        .list_breeds(&BreedScope::Database(db.to_string()))
        .await?;
    breeds
        .into_iter()
        .find(|b| matches_key(b, key))
        .with_context(|| format!("Breed '{}' not found in database '{}'", key, db))
}

async fn resolve_trait(
    metadata: &MetadataClient,
    db: &str,
    key: &str,
) -> Result<SelectableOption> {
    let traits = metadata.list_traits(db).await?;
    traits
        .into_iter()
        .find(|t| matches_key(t, key))
        .with_context(|| format!("{}: '{}' not found in database '{}'", MSG_SELECT_TRAIT, key, db))
}

fn resolve_factors(
    names: &[String],
    available: &[SelectableOption],
) -> Result<Vec<SelectableOption>> {
    let selected = match_factors(names, available);
    let missing: Vec<&str> = names
        .iter()
        .filter(|name| !selected.iter().any(|f| matches_key(f, name)))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("Factors not available for this selection: {}", missing.join(", "));
    }
    Ok(selected)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
