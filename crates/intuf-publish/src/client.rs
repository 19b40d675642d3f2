//! # Publish Client
//!
//! Registers targets in, and removes them from, the repository's target
//! index through its authorized API.
//!
//! | Method | Body | Token |
//! |--------|------|-------|
//! | POST   | `{"targets": [{"path", "info"}, ...]}` | write |
//! | DELETE | `{"targets": ["path", ...]}` | delete |
//!
//! Each request carries exactly one scope's token, chosen by the type of
//! credential passed in. Neither operation is retried. Empty batches and
//! duplicate paths fail before any request is sent.

use intuf_core::credential::CredentialScope;
use intuf_core::{BearerToken, DeleteCredential, TargetDescriptor, TargetPath, WriteCredential};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Serialize;
use url::Url;

use crate::batch::{ensure_distinct, TargetBatch};
use crate::config::PublishConfig;
use crate::error::PublishError;

#[derive(Serialize)]
struct RetractRequest<'a> {
    targets: &'a [TargetPath],
}

/// Server acknowledgement of an accepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    /// HTTP status code.
    pub status: u16,
    /// Background task identifier, when the server reports one.
    pub task_id: Option<String>,
    /// Server message, when present.
    pub message: Option<String>,
    /// Paths the request covered.
    pub targets: Vec<TargetPath>,
}

impl Receipt {
    fn from_body(status: u16, body: &str, targets: Vec<TargetPath>) -> Self {
        let json: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let text = |v: &serde_json::Value| v.as_str().map(str::to_string);
        Self {
            status,
            task_id: text(&json["data"]["task_id"]).or_else(|| text(&json["task_id"])),
            message: text(&json["message"]),
            targets,
        }
    }
}

/// Client for the repository's target API.
#[derive(Debug, Clone)]
pub struct PublishClient {
    http: reqwest::Client,
    api_url: Url,
}

impl PublishClient {
    /// Create a client from configuration.
    pub fn new(config: &PublishConfig) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PublishError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    /// The target API endpoint.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Publish `primary` together with its `attachments` in one request.
    pub async fn publish(
        &self,
        credential: &WriteCredential,
        primary: TargetDescriptor,
        attachments: &[TargetDescriptor],
    ) -> Result<Receipt, PublishError> {
        self.publish_batch(credential, &TargetBatch::with_attachments(primary, attachments))
            .await
    }

    /// Publish every descriptor in `batch` in one request.
    pub async fn publish_batch(
        &self,
        credential: &WriteCredential,
        batch: &TargetBatch,
    ) -> Result<Receipt, PublishError> {
        batch.validate()?;
        let endpoint = format!("POST {}", self.api_url);
        tracing::info!(targets = batch.len(), endpoint = %endpoint, "publishing targets");

        let resp = self
            .http
            .post(self.api_url.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, bearer(credential)?)
            .json(batch)
            .send()
            .await
            .map_err(|e| PublishError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| PublishError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), endpoint = %endpoint, "publish rejected");
            return Err(PublishError::PublishRejected {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let receipt = Receipt::from_body(status.as_u16(), &body, batch.paths());
        tracing::info!(status = receipt.status, task_id = ?receipt.task_id, "publish accepted");
        Ok(receipt)
    }

    /// Remove `paths` from the index in one request.
    pub async fn retract(
        &self,
        credential: &DeleteCredential,
        paths: &[TargetPath],
    ) -> Result<Receipt, PublishError> {
        ensure_distinct(paths)?;
        let endpoint = format!("DELETE {}", self.api_url);
        tracing::info!(targets = paths.len(), endpoint = %endpoint, "retracting targets");

        let resp = self
            .http
            .delete(self.api_url.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, bearer(credential)?)
            .json(&RetractRequest { targets: paths })
            .send()
            .await
            .map_err(|e| PublishError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| PublishError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), endpoint = %endpoint, "retract rejected");
            return Err(PublishError::RetractRejected {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let receipt = Receipt::from_body(status.as_u16(), &body, paths.to_vec());
        tracing::info!(status = receipt.status, task_id = ?receipt.task_id, "retract accepted");
        Ok(receipt)
    }
}

/// `Bearer <token>` marked sensitive so it is omitted from reqwest's debug output.
fn bearer<S: CredentialScope>(credential: &BearerToken<S>) -> Result<HeaderValue, PublishError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.expose())).map_err(|_| {
        PublishError::InvalidCredential {
            scope: credential.scope(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}
