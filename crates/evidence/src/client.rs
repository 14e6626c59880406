use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{EvidenceConfig, EvidenceError};

/// Image attached to a submission as proof of work.
#[derive(Debug, Clone)]
pub struct EvidenceImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct VerifierResponse {
    result: String,
}

#[derive(Debug, Clone)]
pub struct EvidenceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl EvidenceClient {
    pub fn new(config: &EvidenceConfig) -> Result<Self, EvidenceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Send one task to the verifier and return its raw answer text.
    pub async fn verify(
        &self,
        task: &str,
        description: &str,
        image: &EvidenceImage,
    ) -> Result<String, EvidenceError> {
        let images = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .text("task", task.to_string())
            .text("description", description.to_string())
            .part("images", images);

        tracing::debug!(endpoint = %self.endpoint, task, bytes = image.bytes.len(), "sending evidence");

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %self.endpoint, %status, "verifier rejected request");
            return Err(EvidenceError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: VerifierResponse =
            serde_json::from_slice(&body).map_err(|e| EvidenceError::Decode(e.to_string()))?;

        Ok(parsed.result)
    }
}
