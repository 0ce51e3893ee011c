//! Concrete transports for pushing notifications to subjects.
//!
//! Two adapter shapes exist, mirroring the two capability shapes real-time
//! messaging services expose: a connection-addressed push endpoint and a
//! generic message-send endpoint. [`build_transport`] picks one at wiring
//! time; the dispatcher only ever sees the [`Transport`] trait and never
//! probes capabilities per call.

use crate::core::Transport;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::TransportConfig;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Raised once at wiring time when neither endpoint is configured.
    /// Never produced per-call.
    #[error("no transport endpoint configured: set transport.push_url or transport.webhook_url")]
    NoEndpointConfigured,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Selects the concrete transport from configuration: the
/// connection-addressed push endpoint when present, otherwise the generic
/// webhook endpoint.
pub fn build_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    if let Some(url) = &config.push_url {
        info!(endpoint = %url, "Using connection-addressed push transport");
        Ok(Arc::new(PushTransport::new(url.clone(), timeout)?))
    } else if let Some(url) = &config.webhook_url {
        info!(endpoint = %url, "Using generic webhook transport");
        Ok(Arc::new(WebhookTransport::new(url.clone(), timeout)?))
    } else {
        Err(TransportError::NoEndpointConfigured)
    }
}

/// Management-style push primitive: the endpoint addresses a specific
/// connection, so the subject goes into the URL path and the body is the
/// serialized notification itself.
#[derive(Debug)]
pub struct PushTransport {
    base_url: String,
    client: reqwest::Client,
}

impl PushTransport {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for PushTransport {
    #[instrument(skip(self, payload))]
    async fn send(&self, subject: &str, payload: &str) -> anyhow::Result<()> {
        let url = format!("{}/connections/{}/messages", self.base_url, subject);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await?;

        check_status(response, subject).await
    }
}

/// Generic send-message primitive: a single endpoint for all subjects, so
/// the subject rides in an envelope around the serialized notification.
#[derive(Debug)]
pub struct WebhookTransport {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    #[instrument(skip(self, payload))]
    async fn send(&self, subject: &str, payload: &str) -> anyhow::Result<()> {
        let envelope = json!({ "subject": subject, "message": payload });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&envelope)
            .send()
            .await?;

        check_status(response, subject).await
    }
}

async fn check_status(response: reqwest::Response, subject: &str) -> anyhow::Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        error!(
            subject = %subject,
            status = %status,
            body = %body,
            "Transport rejected notification"
        );
        anyhow::bail!("transport rejected notification: status {}, body: {}", status, body)
    }
}
