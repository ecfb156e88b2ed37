use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument};

use crate::graphql::{GraphqlClient, GraphqlError};

use super::models::EmailMessage;

const SEND_EMAIL_MUTATION: &str = r#"
mutation SEND_EMAIL($emailData: JSON!) {
  sendEmail(emailData: $emailData)
}"#;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmailError {
    #[error("Email rejected: {0}")]
    Rejected(String),

    #[error("Email transport error: {0}")]
    Transport(String),
}

/// Outbound mail provider
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Writes emails to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEmailSender;

impl LoggingEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for LoggingEmailSender {
    #[instrument(skip(self, message), fields(to = %message.to_address))]
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if !message.to_address.contains('@') {
            return Err(EmailError::Rejected(format!(
                "invalid recipient '{}'",
                message.to_address
            )));
        }
        info!(
            from = %message.from_address,
            subject = %message.subject,
            "Email dispatched"
        );
        Ok(())
    }
}

impl From<GraphqlError> for EmailError {
    fn from(err: GraphqlError) -> Self {
        match err {
            GraphqlError::Errors(msg) => EmailError::Rejected(msg),
            other => EmailError::Transport(other.to_string()),
        }
    }
}

/// Delivers through the backend's `sendEmail` mutation
#[derive(Debug, Clone)]
pub struct GraphqlEmailSender {
    client: GraphqlClient,
}

impl GraphqlEmailSender {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmailSender for GraphqlEmailSender {
    #[instrument(skip(self, message), fields(to = %message.to_address))]
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let _: serde_json::Value = self
            .client
            .request(SEND_EMAIL_MUTATION, json!({ "emailData": message }))
            .await?;
        Ok(())
    }
}
