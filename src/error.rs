use crate::models::ElectionStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors raised at the backend API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("resource not found")]
    NotFound,
    #[error("network error: {0}")]
    Network(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response from {endpoint}: {detail}")]
    Schema { endpoint: String, detail: String },
}

/// Why the wizard could not produce a ballot to vote on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    #[error("election not found")]
    NotFound,
    #[error("could not reach the election server: {0}")]
    Network(String),
    #[error("your session is no longer valid: {0}")]
    Unauthorized(String),
    #[error("the election server sent an unexpected response: {0}")]
    Schema(String),
    #[error("the election server refused to load the ballot: {0}")]
    Server(String),
    #[error("loading the ballot took longer than {0:?}")]
    Timeout(Duration),
    #[error("this election is {0}, voting is not open")]
    ElectionNotOpen(ElectionStatus),
    #[error("you have already voted in this election")]
    AlreadyVoted,
    #[error("this election has no positions to vote on")]
    EmptyBallot,
}

impl From<ServiceError> for LoadFailure {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => LoadFailure::NotFound,
            ServiceError::Network(msg) => LoadFailure::Network(msg),
            ServiceError::Unauthorized(msg) => LoadFailure::Unauthorized(msg),
            ServiceError::Schema { endpoint, detail } => {
                LoadFailure::Schema(format!("{}: {}", endpoint, detail))
            }
            ServiceError::Validation(msg) => LoadFailure::Server(msg),
            ServiceError::Server { status, message } => {
                LoadFailure::Server(format!("{} ({})", message, status))
            }
        }
    }
}

/// Failures surfaced by the wizard to the voter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error(transparent)]
    Load(LoadFailure),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Submit(String),
    #[error(transparent)]
    Rejected(#[from] WizardError),
}

impl Failure {
    /// Submit failures are the only ones the voter may retry in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Failure::Submit(_))
    }
}

/// Voter actions the wizard refuses in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("'{action}' is not available while {state}")]
    InvalidState { action: &'static str, state: &'static str },
    #[error("position {0} is not the one currently displayed")]
    PositionMismatch(String),
    #[error("candidate {candidate_id} is not running for {position_id}")]
    UnknownCandidate { position_id: String, candidate_id: String },
    #[error("there is no position number {0}")]
    PositionOutOfRange(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_keep_the_endpoint_in_load_failures() {
        let failure = LoadFailure::from(ServiceError::Schema {
            endpoint: "GET /elections/7".to_string(),
            detail: "missing field `election`".to_string(),
        });
        assert_eq!(
            failure,
            LoadFailure::Schema("GET /elections/7: missing field `election`".to_string())
        );
    }

    #[test]
    fn server_side_rejections_are_not_reported_as_network_trouble() {
        let failure = LoadFailure::from(ServiceError::Server {
            status: 500,
            message: "database unavailable".to_string(),
        });
        assert_eq!(failure, LoadFailure::Server("database unavailable (500)".to_string()));
        assert!(!failure.to_string().contains("could not reach"));

        let failure = LoadFailure::from(ServiceError::Validation("Election is archived".to_string()));
        assert_eq!(failure, LoadFailure::Server("Election is archived".to_string()));
    }

    #[test]
    fn only_submit_failures_are_retryable() {
        assert!(Failure::Submit("boom".into()).is_retryable());
        assert!(!Failure::Validation("no votes".into()).is_retryable());
        assert!(!Failure::Auth("expired".into()).is_retryable());
        assert!(!Failure::Load(LoadFailure::NotFound).is_retryable());
    }
}
