use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::job::{JobStatus, Observation};

pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com/v2";

/// Options for a transcription job.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    /// Diarize the audio and tag each utterance with a speaker label.
    pub speaker_labels: bool,
    /// Vocabulary to boost in the language model (names, jargon).
    pub word_boost: Vec<String>,
}

impl TranscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaker_labels(mut self, enabled: bool) -> Self {
        self.speaker_labels = enabled;
        self
    }

    pub fn word_boost(mut self, words: Vec<String>) -> Self {
        self.word_boost = words;
        self
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Deserialize)]
struct TranscriptCreated {
    id: String,
}

/// Client for the AssemblyAI transcription API.
///
/// Holds the API key and base URL for one invocation; nothing is ambient.
pub struct AssemblyClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssemblyClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| Error::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(AUTHORIZATION, key);

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload a local file, returning the service-assigned URL.
    ///
    /// The body is streamed in chunks, never fully buffered.
    pub async fn upload(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let resp: UploadResponse = self
            .http
            .post(format!("{}/upload", self.base_url))
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(file = %path.display(), url = %resp.upload_url, bytes = len, "uploaded");
        Ok(resp.upload_url)
    }

    /// Submit a transcription job for an uploaded audio URL, returning the
    /// job id.
    pub async fn submit(&self, audio_url: &str, options: &TranscribeOptions) -> Result<String> {
        let body = json!({
            "audio_url": audio_url,
            "speaker_labels": options.speaker_labels,
            "word_boost": options.word_boost,
        });

        info!(%audio_url, "submitting transcription job");
        let created: TranscriptCreated = self
            .http
            .post(format!("{}/transcript", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(job_id = %created.id, "job created");
        Ok(created.id)
    }

    /// Fetch the raw job result exactly as the service returned it.
    ///
    /// Kept as a [`serde_json::Value`] so it can be persisted verbatim; use
    /// [`crate::transcript::Transcript::from_value`] for the typed view.
    pub async fn result(&self, job_id: &str) -> Result<serde_json::Value> {
        let value = self
            .http
            .get(format!("{}/transcript/{}", self.base_url, job_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    /// Single status query; the retry loop lives in [`crate::job::watch`].
    ///
    /// The transcription service reports no progress percentage; progress is
    /// unknown here, not zero.
    pub async fn status(&self, job_id: &str) -> Result<Observation> {
        let value = self.result(job_id).await?;
        let status = value
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or(Error::MalformedResponse("status"))?;

        debug!(%job_id, %status, "poll");
        Ok(Observation {
            status: JobStatus::from_assembly(status),
            progress: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_rejects_missing_file_before_any_request() {
        let client =
            AssemblyClient::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
        let err = client
            .upload(Path::new("/nonexistent/ep1.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InputNotFound { .. }));
    }

    #[test]
    fn rejects_api_key_with_control_characters() {
        assert!(matches!(
            AssemblyClient::new("bad\nkey"),
            Err(Error::InvalidApiKey)
        ));
    }
}
