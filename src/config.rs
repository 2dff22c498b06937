use std::env;
use std::fmt;
use std::time::Duration;

use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use tracing::debug;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, read once at cold start.
#[derive(Clone)]
pub struct Config {
    pub api_key: ApiKey,
    pub endpoint: String,
    pub auth_token: String,
    pub request_timeout: Duration,
}

/// Credential sent to the ingestion API. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        ApiKey(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        ApiKey(value.to_string())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key)
            .field("endpoint", &self.endpoint)
            .field("auth_token", &"***")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("error parsing {name} - {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl Config {
    pub fn load_from_env() -> Result<Config, ConfigError> {
        let conf = Config {
            api_key: required("AMPLITUDE_API_KEY")?.into(),
            endpoint: required("AMPLITUDE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            auth_token: required("WEBHOOK_AUTH_TOKEN")?,
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
                    .parse::<u64>()
                    .map_err(|e| ConfigError::Invalid {
                        name: "REQUEST_TIMEOUT_SECS",
                        reason: e.to_string(),
                    })?,
            ),
        };

        Ok(conf)
    }

    /// Whether the api key is a Secrets Manager reference rather than the key itself.
    pub fn api_key_is_secret_arn(&self) -> bool {
        self.api_key.token().starts_with("arn:aws:secretsmanager:")
    }
}

// blank values count as unset
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[derive(thiserror::Error, Debug)]
pub enum KeySourceError {
    #[error("cannot read secret {secret_id}, the function role needs secretsmanager:GetSecretValue on it - {error}")]
    Unreadable {
        secret_id: String,
        error: GetSecretValueError,
    },
    #[error("secret {secret_id} has no string value")]
    Empty { secret_id: String },
}

impl Config {
    /// Swaps an api key that names a Secrets Manager secret for the secret's value.
    /// A plain key is left alone.
    pub async fn resolve_api_key(
        &mut self,
        secrets: &aws_sdk_secretsmanager::Client,
    ) -> Result<(), KeySourceError> {
        if !self.api_key_is_secret_arn() {
            return Ok(());
        }

        let secret_id = self.api_key.token().to_string();
        let response = secrets
            .get_secret_value()
            .secret_id(&secret_id)
            .send()
            .await
            .map_err(|error| KeySourceError::Unreadable {
                secret_id: secret_id.clone(),
                error: error.into_service_error(),
            })?;
        let key = response
            .secret_string
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(KeySourceError::Empty {
                secret_id: secret_id.clone(),
            })?;

        debug!("Resolved api key from {}", secret_id);
        self.api_key = ApiKey::from(key);
        Ok(())
    }
}
