//! Minimal GraphQL-over-HTTP client for the school backend.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphqlError {
    #[error("GraphQL request failed: {0}")]
    Transport(String),

    #[error("GraphQL endpoint answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL errors: {0}")]
    Errors(String),

    #[error("Unexpected GraphQL response: {0}")]
    Decode(String),
}

/// Settings read from `PBIS_GRAPHQL_URL`, `PBIS_GRAPHQL_TOKEN` and `PBIS_REVALIDATE_URL`
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlSettings {
    pub endpoint: String,
    pub token: Option<String>,
    pub revalidate_url: Option<String>,
    pub timeout: Duration,
}

impl GraphqlSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            revalidate_url: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// `None` when no endpoint is configured
    pub fn from_env() -> Option<Self> {
        let endpoint = env_value("PBIS_GRAPHQL_URL")?;
        Some(Self {
            token: env_value("PBIS_GRAPHQL_TOKEN"),
            revalidate_url: env_value("PBIS_REVALIDATE_URL"),
            ..Self::new(endpoint)
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: reqwest::Client,
    settings: GraphqlSettings,
}

impl GraphqlClient {
    pub fn new(settings: GraphqlSettings) -> Result<Self, GraphqlError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GraphqlSettings {
        &self.settings
    }

    #[instrument(skip(self, query, variables), fields(endpoint = %self.settings.endpoint))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GraphqlError> {
        let body = json!({ "query": query, "variables": variables });
        let mut request = self.client.post(&self.settings.endpoint).json(&body);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphqlError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GraphqlError::Decode(e.to_string()))?;
        debug!("GraphQL response received");
        decode_response(payload)
    }

    /// POSTs `{ "pathName": path }` to the hosting framework's revalidate endpoint
    #[instrument(skip(self))]
    pub async fn revalidate(&self, path: &str) -> Result<bool, GraphqlError> {
        let Some(url) = &self.settings.revalidate_url else {
            debug!("No revalidate endpoint configured, skipping");
            return Ok(false);
        };

        let response = self
            .client
            .post(url)
            .json(&json!({ "pathName": path }))
            .send()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphqlError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(true)
    }
}

/// Pulls `data` out of a GraphQL response, failing on any `errors` entry
pub fn decode_response<T: DeserializeOwned>(mut payload: Value) -> Result<T, GraphqlError> {
    if let Some(errors) = payload.get("errors").filter(|errors| !errors.is_null()) {
        let messages: Vec<String> = errors
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|error| {
                        error
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string())
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![errors.to_string()]);
        return Err(GraphqlError::Errors(messages.join("; ")));
    }

    let data = payload
        .get_mut("data")
        .map(Value::take)
        .filter(|data| !data.is_null())
        .ok_or_else(|| GraphqlError::Decode("missing 'data'".to_string()))?;

    serde_json::from_value(data).map_err(|e| GraphqlError::Decode(e.to_string()))
}
