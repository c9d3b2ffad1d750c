// ABOUTME: Error taxonomy for the analysis client
// ABOUTME: Every failure ends up as one message on the processing state banner

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A required selection is missing; raised before any request is made.
    Validation(String),
    /// Non-2xx response. The body is kept verbatim since it is not always JSON.
    Transport { status: u16, body: String },
    Network(String),
    Parse(String),
    /// The service reported `status: "error"` for a job.
    JobFailed(String),
    PollingTimeout { attempts: u32 },
    Config(String),
}

impl AnalysisError {
    /// Text shown to the user. Job failures and validation errors carry the
    /// server/validator message unprefixed.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Validation(msg) | AnalysisError::JobFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AnalysisError::Transport { status, body } => {
                write!(f, "HTTP error! status: {}", status)?;
                if !body.is_empty() {
                    write!(f, ": {}", body)?;
                }
                Ok(())
            }
            AnalysisError::Network(msg) => write!(f, "Network error: {}", msg),
            AnalysisError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            AnalysisError::JobFailed(msg) => write!(f, "Job failed: {}", msg),
            AnalysisError::PollingTimeout { attempts } => {
                write!(f, "Task polling timeout after {} attempts", attempts)
            }
            AnalysisError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::Parse(err.to_string())
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_keeps_status_and_body() {
        let err = AnalysisError::Transport {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error! status: 502: <html>bad gateway</html>"
        );
    }

    #[test]
    fn test_user_message_is_unprefixed_for_job_failures() {
        let err = AnalysisError::JobFailed("Not enough records".to_string());
        assert_eq!(err.user_message(), "Not enough records");

        let err = AnalysisError::PollingTimeout { attempts: 150 };
        assert_eq!(err.user_message(), "Task polling timeout after 150 attempts");
    }
}
