use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response, StatusCode};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::models::api::{
    CreateInputRequest, EnhanceContent, EnhanceRequest, EnhanceResponse, JobStatusResponse,
    PresignedUrlResponse,
};

/// Client for the remote media enhancement API.
pub struct EnhanceClient {
    http: Client,
    base_url: String,
    bearer_token: String,
}

impl EnhanceClient {
    pub fn new(http: Client, base_url: &str, bearer_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    /// Register an input reference and obtain a presigned upload URL for it.
    pub async fn create_input(&self, input_ref: &str) -> Result<String, EnhanceError> {
        let response = self
            .http
            .post(format!("{}/media/input", self.base_url))
            .bearer_auth(&self.bearer_token)
            .header(ACCEPT, "application/json")
            .json(&CreateInputRequest {
                url: input_ref.to_string(),
            })
            .send()
            .await?;

        let presigned: PresignedUrlResponse = decode(check_status(response)?).await?;
        if presigned.url.is_empty() {
            return Err(EnhanceError::Malformed(
                "presigned upload URL missing".to_string(),
            ));
        }
        Ok(presigned.url)
    }

    /// Stream the raw file bytes to a presigned URL.
    ///
    /// Presigned object-store URLs reject chunked transfer encoding, so the
    /// length is taken from the file metadata and declared up front.
    pub async fn upload_file(&self, presigned_url: &str, path: &Path) -> Result<(), EnhanceError> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let body = Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .http
            .put(presigned_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }

    /// Submit an enhancement job. Returns the job id as sent by the service,
    /// which may be empty.
    pub async fn submit_job(
        &self,
        input_ref: &str,
        output_ref: &str,
        profile: &str,
    ) -> Result<String, EnhanceError> {
        let body = EnhanceRequest {
            input: input_ref.to_string(),
            output: output_ref.to_string(),
            content: EnhanceContent {
                kind: profile.to_string(),
            },
        };

        let response = self
            .http
            .post(format!("{}/media/enhance", self.base_url))
            .bearer_auth(&self.bearer_token)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let enhance: EnhanceResponse = decode(check_status(response)?).await?;
        Ok(enhance.job_id)
    }

    /// Query the progress of an enhancement job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, EnhanceError> {
        let response = self
            .http
            .get(format!("{}/media/enhance", self.base_url))
            .query(&[("job_id", job_id)])
            .bearer_auth(&self.bearer_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        decode(check_status(response)?).await
    }

    /// Stream the enhanced artifact into `destination`. Returns bytes written.
    ///
    /// The caller owns cleanup of `destination` on error.
    pub async fn download_output(
        &self,
        output_ref: &str,
        destination: &Path,
    ) -> Result<u64, EnhanceError> {
        let response = self
            .http
            .get(format!("{}/media/output", self.base_url))
            .query(&[("url", output_ref)])
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let mut response = check_status(response)?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

fn check_status(response: Response) -> Result<Response, EnhanceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(EnhanceError::Status(status))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, EnhanceError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| EnhanceError::Malformed(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error("could not build request: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("non-success status {0}")]
    Status(StatusCode),

    #[error("malformed response body: {0}")]
    Malformed(String),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for EnhanceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            EnhanceError::Build(e)
        } else {
            EnhanceError::Transport(e)
        }
    }
}
