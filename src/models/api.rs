use serde::{Deserialize, Serialize};

/// Body of `POST /media/input`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInputRequest {
    pub url: String,
}

/// Presigned, write-capable destination for the raw input bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct PresignedUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceContent {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `POST /media/enhance`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceRequest {
    pub input: String,
    pub output: String,
    pub content: EnhanceContent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceResponse {
    // A missing id is handled by the caller, not by the decoder.
    #[serde(default)]
    pub job_id: String,
}

/// Body of `GET /media/enhance?job_id=...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: u32,
}

impl JobStatusResponse {
    pub fn is_finished(&self) -> bool {
        self.progress >= 100
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("failed")
    }
}

/// Token endpoint response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
