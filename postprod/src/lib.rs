pub mod assembly;
pub mod dolby;
pub mod error;
pub mod job;
pub mod transcode;
pub mod transcript;

pub use assembly::{AssemblyClient, TranscribeOptions};
pub use dolby::{ContentType, DolbyClient, EnhanceOptions, JobKind, NoiseReduction, SubmittedJob};
pub use error::{Error, Result};
pub use job::{JobStatus, Observation, Update};
pub use transcode::{transcode, TranscodeOptions};
pub use transcript::{SpeakerNames, Transcript};

use std::path::{Path, PathBuf};

/// Enhance a local audio file end to end: upload, submit, poll to a terminal
/// state, download the processed audio into `dest_dir`.
///
/// `on_update` receives status changes and monotonic progress increases.
pub async fn enhance_file(
    client: &DolbyClient,
    input: &Path,
    dest_dir: &Path,
    options: &EnhanceOptions,
    on_update: impl FnMut(Update),
) -> Result<PathBuf> {
    process_file(client, input, dest_dir, JobKind::Enhance, options, on_update).await
}

/// Analyze a local audio file end to end, downloading the JSON report into
/// `dest_dir`. With `speech` set, runs the speech-specific analysis.
pub async fn analyze_file(
    client: &DolbyClient,
    input: &Path,
    dest_dir: &Path,
    speech: bool,
    options: &EnhanceOptions,
    on_update: impl FnMut(Update),
) -> Result<PathBuf> {
    let kind = if speech {
        JobKind::AnalyzeSpeech
    } else {
        JobKind::Analyze
    };
    process_file(client, input, dest_dir, kind, options, on_update).await
}

async fn process_file(
    client: &DolbyClient,
    input: &Path,
    dest_dir: &Path,
    kind: JobKind,
    options: &EnhanceOptions,
    on_update: impl FnMut(Update),
) -> Result<PathBuf> {
    let in_url = client.upload(input).await?;
    let job = client.submit(&in_url, kind, options).await?;

    let status = job::watch(
        || client.status(&job.id, kind),
        on_update,
        |d| tokio::time::sleep(d),
    )
    .await?;

    if status == JobStatus::Error {
        return Err(Error::JobFailed {
            id: job.id,
            status: status.to_string(),
        });
    }

    client.download(&job.output, dest_dir, kind).await
}

/// Transcribe a local audio file end to end: upload, submit, poll to a
/// terminal state, return the raw job result for verbatim persistence.
pub async fn transcribe_file(
    client: &AssemblyClient,
    input: &Path,
    options: &TranscribeOptions,
    on_update: impl FnMut(Update),
) -> Result<serde_json::Value> {
    let audio_url = client.upload(input).await?;
    let job_id = client.submit(&audio_url, options).await?;

    let status = job::watch(
        || client.status(&job_id),
        on_update,
        |d| tokio::time::sleep(d),
    )
    .await?;

    if status == JobStatus::Error {
        return Err(Error::JobFailed {
            id: job_id,
            status: status.to_string(),
        });
    }

    client.result(&job_id).await
}
