// ABOUTME: Client configuration loaded from a TOML file with environment overrides
// ABOUTME: Decides the deployment route, credentials, polling limits and default selections

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AnalysisError, Result};
use crate::poller::{PollOptions, DEFAULT_MAX_ATTEMPTS};
use crate::remote::{Credentials, Deployment, DeploymentRoute, RouteStrategy};
use crate::submission::DEFAULT_SEED;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_DIRECT_HOST_MARKER: &str = "testserver.tech";
const DEFAULT_DB_NAME: &str = "bmk_yy";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// `auto`, `dev_proxy`, `same_origin` or `forwarding`.
    #[serde(default = "default_deployment")]
    pub deployment: String,
    /// Only consulted in `auto` mode.
    #[serde(default)]
    pub dev: bool,
    #[serde(default = "default_direct_host_marker")]
    pub direct_host_marker: String,
    /// Hostname used for detection instead of the one in `base_url`.
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            deployment: default_deployment(),
            dev: false,
            direct_host_marker: default_direct_host_marker(),
            hostname: None,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            seed: default_seed(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_deployment() -> String {
    "auto".to_string()
}

fn default_direct_host_marker() -> String {
    DEFAULT_DIRECT_HOST_MARKER.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Config {
    /// Reads `path` when it exists; a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    AnalysisError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            _ => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    /// Overrides from `BLUP_*` variables. Takes a lookup function so tests
    /// do not have to touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BLUP_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = lookup("BLUP_DEPLOYMENT") {
            self.api.deployment = v;
        }
        if let Some(v) = lookup("BLUP_DEV") {
            self.api.dev = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("BLUP_HOSTNAME") {
            self.api.hostname = Some(v);
        }
        if let Some(v) = lookup("BLUP_USERNAME") {
            self.api.username = Some(v);
        }
        if let Some(v) = lookup("BLUP_PASSWORD") {
            self.api.password = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AnalysisError::Config("api.base_url must not be empty".to_string()));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            AnalysisError::Config(format!("api.base_url is not a valid URL: {}", e))
        })?;
        if self.api.deployment != "auto" && Deployment::parse(&self.api.deployment).is_none() {
            return Err(AnalysisError::Config(format!(
                "Unknown deployment '{}'",
                self.api.deployment
            )));
        }
        if self.polling.max_attempts == 0 {
            return Err(AnalysisError::Config(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Explicit deployment, or in `auto` mode one detected from the dev
    /// flag and the hostname.
    pub fn deployment(&self) -> Deployment {
        if let Some(deployment) = Deployment::parse(&self.api.deployment) {
            return deployment;
        }
        let host = self.api.hostname.clone().or_else(|| {
            url::Url::parse(&self.api.base_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
        });
        Deployment::detect(self.api.dev, host.as_deref(), &self.api.direct_host_marker)
    }

    pub fn route(&self) -> Arc<dyn RouteStrategy> {
        Arc::new(DeploymentRoute::new(self.api.base_url.clone(), self.deployment()))
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.api.username, &self.api.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            max_attempts: self.polling.max_attempts,
            interval: Duration::from_millis(self.polling.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_options(), PollOptions::default());
        assert_eq!(config.defaults.db_name, "bmk_yy");
        assert_eq!(config.defaults.seed, 42);
        assert!(config.credentials().is_none());
        assert_eq!(config.deployment(), Deployment::Forwarding);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://blup.testserver.tech"
username = "blup_user"
password = "secret"

[polling]
max_attempts = 10
interval_ms = 500
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.deployment(), Deployment::SameOrigin);
        assert_eq!(config.poll_options().max_attempts, 10);
        assert_eq!(config.poll_options().interval, Duration::from_millis(500));
        assert_eq!(config.credentials().unwrap().username, "blup_user");
        assert_eq!(config.route().resolve_base_url(), "https://blup.testserver.tech/api");
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_toml("").unwrap();
        assert!(Config::load(Some(dir.path().join("absent.toml").as_path())).is_ok());
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BLUP_DEPLOYMENT", "auto"),
            ("BLUP_DEV", "true"),
            ("BLUP_BASE_URL", "http://localhost:5173"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://localhost:5173");
        assert_eq!(config.deployment(), Deployment::DevProxy);
    }

    #[test]
    fn test_explicit_deployment_wins() {
        let config = Config::from_toml(
            r#"
[api]
base_url = "https://blup.testserver.tech"
deployment = "forwarding"
"#,
        )
        .unwrap();
        assert_eq!(config.deployment(), Deployment::Forwarding);
    }

    #[test]
    fn test_hostname_override_drives_detection() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "BLUP_HOSTNAME" => Some("app.testserver.tech".to_string()),
            _ => None,
        });
        assert_eq!(config.deployment(), Deployment::SameOrigin);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config::from_toml("[api]\ndeployment = \"carrier_pigeon\"\n").unwrap();
        assert!(matches!(config.validate(), Err(AnalysisError::Config(_))));

        let config = Config::from_toml("[polling]\nmax_attempts = 0\n").unwrap();
        assert!(config.validate().is_err());

        assert!(Config::from_toml("[api]\nbase_url = 5\n").is_err());
        assert!(Config::from_toml("[unknown]\n").is_err());
    }
}
