//! HTTP collaborator for the analysis service.
//!
//! Each stage maps to an endpoint under a base URL (default
//! `{base_url}/stages/{stage}`). Extraction uploads the document bytes as
//! multipart; every other stage posts the `StageRequest` as JSON.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use super::{Collaborator, CollaboratorError, StageRequest};
use crate::domain::Stage;

/// Analysis service client
pub struct HttpCollaborator {
    /// Service base URL, without trailing slash
    base_url: String,
    /// Bearer token (optional)
    token: Option<String>,
    /// Per-stage endpoint paths
    endpoints: HashMap<Stage, String>,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpCollaborator {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            endpoints: HashMap::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the endpoint path of one stage
    pub fn with_endpoint(mut self, stage: Stage, path: impl Into<String>) -> Self {
        self.endpoints.insert(stage, path.into());
        self
    }

    /// Full URL for a stage
    pub fn url_for(&self, stage: Stage) -> String {
        match self.endpoints.get(&stage) {
            Some(path) if path.starts_with("http://") || path.starts_with("https://") => {
                path.clone()
            }
            Some(path) => format!("{}/{}", self.base_url, path.trim_start_matches('/')),
            None => format!("{}/stages/{}", self.base_url, stage),
        }
    }

    fn multipart_form(request: &StageRequest) -> Result<Form, CollaboratorError> {
        let content = request.content.clone().ok_or_else(|| {
            CollaboratorError::Rejected("Extraction request carries no document content".to_string())
        })?;

        let part = Part::bytes(content)
            .file_name(request.document_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        Ok(Form::new()
            .text("documentId", request.document_id.to_string())
            .part("file", part))
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: StageRequest) -> Result<Value, CollaboratorError> {
        let url = self.url_for(request.stage);
        debug!(%url, stage = %request.stage, "Calling analysis service");

        let mut builder = self.client.post(&url);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        builder = if request.stage == Stage::Extraction {
            builder.multipart(Self::multipart_form(&request)?)
        } else {
            builder.json(&request)
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))
    }
}
