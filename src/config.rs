use crate::error::ConfigError;
use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// Upper bound on the wizard's initial election + positions fetch.
    pub load_timeout: Duration,
    pub request_timeout: Duration,
    pub student_id: Option<String>,
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            load_timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            student_id: None,
            password: None,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment. Call
    /// `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("BALLOT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let load_timeout = parse_secs(&lookup, "BALLOT_LOAD_TIMEOUT_SECS", DEFAULT_LOAD_TIMEOUT_SECS)?;
        let request_timeout =
            parse_secs(&lookup, "BALLOT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            api_url,
            load_timeout,
            request_timeout,
            student_id: lookup("BALLOT_STUDENT_ID").filter(|s| !s.is_empty()),
            password: lookup("BALLOT_PASSWORD").filter(|s| !s.is_empty()),
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
