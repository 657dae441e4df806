use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::job::{JobStatus, Observation};

pub const DEFAULT_BASE_URL: &str = "https://api.dolby.com/media";

/// Namespace marker for uploaded inputs.
const IN_NAMESPACE: &str = "dlb://in/";
/// Namespace marker for processed outputs.
const OUT_NAMESPACE: &str = "dlb://out/";

/// Processing jobs offered by the enhancement service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Enhance,
    Analyze,
    AnalyzeSpeech,
}

impl JobKind {
    /// Endpoint path suffix under the media base URL.
    pub fn path(self) -> &'static str {
        match self {
            JobKind::Enhance => "enhance",
            JobKind::Analyze => "analyze",
            JobKind::AnalyzeSpeech => "analyze/speech",
        }
    }

    /// Tag inserted into downloaded filenames, before the extension.
    pub fn file_tag(self) -> &'static str {
        match self {
            JobKind::Enhance => " - Enhanced",
            JobKind::Analyze => " - Analyzed",
            JobKind::AnalyzeSpeech => " - Speech Analyzed",
        }
    }

    /// Analysis jobs produce a JSON report instead of processed audio.
    fn is_analysis(self) -> bool {
        matches!(self, JobKind::Analyze | JobKind::AnalyzeSpeech)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Enhance => "enhance",
            JobKind::Analyze => "analyze",
            JobKind::AnalyzeSpeech => "analyze-speech",
        };
        write!(f, "{s}")
    }
}

/// Content tags the enhance endpoint accepts.
///
/// Anything outside this set is rejected before a request goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Conference,
    Interview,
    Lecture,
    Meeting,
    MobilePhone,
    Music,
    Podcast,
    Studio,
    VoiceOver,
    VoiceRecording,
}

impl ContentType {
    /// Parse a content-type tag, e.g. from a CLI argument.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "conference" => Ok(ContentType::Conference),
            "interview" => Ok(ContentType::Interview),
            "lecture" => Ok(ContentType::Lecture),
            "meeting" => Ok(ContentType::Meeting),
            "mobile_phone" => Ok(ContentType::MobilePhone),
            "music" => Ok(ContentType::Music),
            "podcast" => Ok(ContentType::Podcast),
            "studio" => Ok(ContentType::Studio),
            "voice_over" => Ok(ContentType::VoiceOver),
            "voice_recording" => Ok(ContentType::VoiceRecording),
            _ => Err(Error::UnknownContentType(tag.to_string())),
        }
    }

    /// Tag as the service expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Conference => "conference",
            ContentType::Interview => "interview",
            ContentType::Lecture => "lecture",
            ContentType::Meeting => "meeting",
            ContentType::MobilePhone => "mobile_phone",
            ContentType::Music => "music",
            ContentType::Podcast => "podcast",
            ContentType::Studio => "studio",
            ContentType::VoiceOver => "voice_over",
            ContentType::VoiceRecording => "voice_recording",
        }
    }

    /// Every accepted tag.
    pub fn all() -> &'static [ContentType] {
        &[
            ContentType::Conference,
            ContentType::Interview,
            ContentType::Lecture,
            ContentType::Meeting,
            ContentType::MobilePhone,
            ContentType::Music,
            ContentType::Podcast,
            ContentType::Studio,
            ContentType::VoiceOver,
            ContentType::VoiceRecording,
        ]
    }
}

/// Noise reduction strength for enhancement jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseReduction {
    #[default]
    Auto,
    Low,
    Medium,
    High,
    Max,
}

impl NoiseReduction {
    pub fn parse(amount: &str) -> Result<Self> {
        match amount {
            "auto" => Ok(NoiseReduction::Auto),
            "low" => Ok(NoiseReduction::Low),
            "medium" => Ok(NoiseReduction::Medium),
            "high" => Ok(NoiseReduction::High),
            "max" => Ok(NoiseReduction::Max),
            _ => Err(Error::UnknownNoiseReduction(amount.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoiseReduction::Auto => "auto",
            NoiseReduction::Low => "low",
            NoiseReduction::Medium => "medium",
            NoiseReduction::High => "high",
            NoiseReduction::Max => "max",
        }
    }
}

/// Options for a processing job.
///
/// The audio settings only apply to [`JobKind::Enhance`]; analysis kinds use
/// just the `output` override. Defaults match a spoken-word episode: loudness
/// with dialog intelligence, range control, noise reduction, dynamic EQ and
/// high-pass all on.
#[derive(Debug, Clone)]
pub struct EnhanceOptions {
    pub content_type: ContentType,
    pub loudness: bool,
    pub dialog_intelligence: bool,
    /// Loudness target in LUFS. None lets the service pick.
    pub loudness_target: Option<i32>,
    pub range_control: bool,
    pub noise_reduction: bool,
    pub noise_reduction_amount: NoiseReduction,
    pub dynamic_eq: bool,
    pub high_pass: bool,
    /// Explicit output reference; required when the input is outside the
    /// service's input namespace.
    pub output: Option<String>,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            content_type: ContentType::Interview,
            loudness: true,
            dialog_intelligence: true,
            loudness_target: None,
            range_control: true,
            noise_reduction: true,
            noise_reduction_amount: NoiseReduction::Auto,
            dynamic_eq: true,
            high_pass: true,
            output: None,
        }
    }
}

impl EnhanceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn loudness(mut self, enabled: bool) -> Self {
        self.loudness = enabled;
        self
    }

    pub fn dialog_intelligence(mut self, enabled: bool) -> Self {
        self.dialog_intelligence = enabled;
        self
    }

    pub fn loudness_target(mut self, lufs: i32) -> Self {
        self.loudness_target = Some(lufs);
        self
    }

    pub fn range_control(mut self, enabled: bool) -> Self {
        self.range_control = enabled;
        self
    }

    pub fn noise_reduction(mut self, enabled: bool) -> Self {
        self.noise_reduction = enabled;
        self
    }

    pub fn noise_reduction_amount(mut self, amount: NoiseReduction) -> Self {
        self.noise_reduction_amount = amount;
        self
    }

    pub fn dynamic_eq(mut self, enabled: bool) -> Self {
        self.dynamic_eq = enabled;
        self
    }

    pub fn high_pass(mut self, enabled: bool) -> Self {
        self.high_pass = enabled;
        self
    }

    pub fn output(mut self, output_ref: impl Into<String>) -> Self {
        self.output = Some(output_ref.into());
        self
    }
}

/// A submitted job: service-assigned id plus the output reference the
/// artifact will appear under once the job completes.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub id: String,
    pub output: String,
}

#[derive(Deserialize)]
struct PresignedResponse {
    url: String,
}

#[derive(Deserialize)]
struct JobCreated {
    job_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    progress: Option<u8>,
}

/// Client for the Dolby.io Media enhancement/analysis API.
///
/// Holds the API key and base URL for one invocation; nothing is ambient.
pub struct DolbyClient {
    http: reqwest::Client,
    base_url: String,
}

impl DolbyClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| Error::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: JobKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }

    /// Upload a local file into the service's input namespace.
    ///
    /// Registers `dlb://in/<filename>`, then PUTs the file bytes to the
    /// pre-signed URL the service hands back. The body is streamed in chunks,
    /// never fully buffered.
    pub async fn upload(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            Error::Upload(format!("no usable filename in {}", path.display()))
        })?;

        let in_url = format!("{IN_NAMESPACE}{name}");

        let presigned: PresignedResponse = self
            .http
            .post(format!("{}/input", self.base_url))
            .json(&json!({ "url": &in_url }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(url = %in_url, "registered input endpoint");

        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        self.http
            .put(&presigned.url)
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        info!(file = %path.display(), url = %in_url, bytes = len, "uploaded");
        Ok(in_url)
    }

    /// Submit a processing job for an uploaded input reference.
    ///
    /// The output reference is derived before any request goes out; validation
    /// failures never touch the network.
    pub async fn submit(
        &self,
        input: &str,
        kind: JobKind,
        options: &EnhanceOptions,
    ) -> Result<SubmittedJob> {
        let output = derive_output_ref(input, kind, options.output.as_deref())?;

        let body = match kind {
            JobKind::Enhance => {
                let mut loudness = json!({
                    "enable": options.loudness,
                    "dialog_intelligence": options.dialog_intelligence,
                });
                if let Some(target) = options.loudness_target {
                    loudness["target_level"] = json!(target);
                }
                json!({
                    "content": { "type": options.content_type.as_str() },
                    "audio": {
                        "loudness": loudness,
                        "dynamics": {
                            "range_control": { "enable": options.range_control },
                        },
                        "noise": {
                            "reduction": {
                                "enable": options.noise_reduction,
                                "amount": options.noise_reduction_amount.as_str(),
                            },
                        },
                        "filter": {
                            "dynamic_eq": { "enable": options.dynamic_eq },
                            "high_pass": { "enable": options.high_pass },
                        },
                    },
                    "input": input,
                    "output": &output,
                })
            }
            JobKind::Analyze | JobKind::AnalyzeSpeech => json!({
                "input": input,
                "output": &output,
            }),
        };

        info!(%input, %output, %kind, "submitting job");
        let created: JobCreated = self
            .http
            .post(self.endpoint(kind))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(job_id = %created.job_id, "job created");
        Ok(SubmittedJob {
            id: created.job_id,
            output,
        })
    }

    /// Single status query; the retry loop lives in [`crate::job::watch`].
    pub async fn status(&self, job_id: &str, kind: JobKind) -> Result<Observation> {
        let resp: StatusResponse = self
            .http
            .get(self.endpoint(kind))
            .query(&[("job_id", job_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(%job_id, status = %resp.status, progress = ?resp.progress, "poll");
        Ok(Observation {
            status: JobStatus::from_dolby(&resp.status),
            progress: resp.progress,
        })
    }

    /// Download a finished artifact into `dest_dir`, streaming to disk.
    ///
    /// The local filename is the reference's final path segment with the kind
    /// tag inserted before the extension. A partial file may remain after a
    /// failure; the error is still returned.
    pub async fn download(
        &self,
        output_ref: &str,
        dest_dir: &Path,
        kind: JobKind,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(local_filename(output_ref, kind));

        info!(url = %output_ref, file = %dest.display(), "downloading");
        let response = self
            .http
            .get(format!("{}/output", self.base_url))
            .query(&[("url", output_ref)])
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length().unwrap_or(0);
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .expect("valid template")
                .progress_chars("#>-"),
        );

        let mut file = std::fs::File::create(&dest)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        use std::io::Write;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
            pb.set_position(written);
        }
        file.flush()?;
        pb.finish_and_clear();

        info!(file = %dest.display(), bytes = written, "download complete");
        Ok(dest)
    }
}

/// Derive the output reference for a job from its input reference.
///
/// Inside the input namespace, the marker is swapped for the output marker and
/// the rest of the reference is preserved byte-for-byte; analysis kinds also
/// swap the extension for the JSON report's. Outside the namespace an explicit
/// output reference must be supplied.
pub fn derive_output_ref(
    input: &str,
    kind: JobKind,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(output) = explicit {
        return Ok(output.to_string());
    }

    let rest = input
        .strip_prefix(IN_NAMESPACE)
        .ok_or_else(|| Error::OutputRefRequired {
            input: input.to_string(),
        })?;

    let rest = if kind.is_analysis() {
        match rest.rsplit_once('.') {
            Some((stem, _)) => format!("{stem}.json"),
            None => format!("{rest}.json"),
        }
    } else {
        rest.to_string()
    };

    Ok(format!("{OUT_NAMESPACE}{rest}"))
}

/// Local filename for a downloaded artifact: final path segment of the
/// reference with the kind tag inserted before the extension.
pub fn local_filename(output_ref: &str, kind: JobKind) -> String {
    let name = output_ref.rsplit('/').next().unwrap_or(output_ref);
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{}.{ext}", kind.file_tag()),
        None => format!("{name}{}", kind.file_tag()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhance_output_preserves_path() {
        let out = derive_output_ref("dlb://in/ep1.wav", JobKind::Enhance, None).unwrap();
        assert_eq!(out, "dlb://out/ep1.wav");
    }

    #[test]
    fn enhance_output_preserves_nested_path_bytes() {
        let out =
            derive_output_ref("dlb://in/season 2/ep 14.final.wav", JobKind::Enhance, None)
                .unwrap();
        assert_eq!(out, "dlb://out/season 2/ep 14.final.wav");
    }

    #[test]
    fn analyze_output_swaps_extension() {
        let out = derive_output_ref("dlb://in/ep1.wav", JobKind::Analyze, None).unwrap();
        assert_eq!(out, "dlb://out/ep1.json");

        let out =
            derive_output_ref("dlb://in/ep1.wav", JobKind::AnalyzeSpeech, None).unwrap();
        assert_eq!(out, "dlb://out/ep1.json");
    }

    #[test]
    fn analyze_output_without_extension_gains_one() {
        let out = derive_output_ref("dlb://in/ep1", JobKind::Analyze, None).unwrap();
        assert_eq!(out, "dlb://out/ep1.json");
    }

    #[test]
    fn foreign_input_requires_explicit_output() {
        let err =
            derive_output_ref("s3://bucket/ep1.wav", JobKind::Enhance, None).unwrap_err();
        assert!(matches!(err, Error::OutputRefRequired { .. }));
    }

    #[test]
    fn explicit_output_wins() {
        let out = derive_output_ref(
            "s3://bucket/ep1.wav",
            JobKind::Enhance,
            Some("s3://bucket/ep1-clean.wav"),
        )
        .unwrap();
        assert_eq!(out, "s3://bucket/ep1-clean.wav");
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(JobKind::Enhance.path(), "enhance");
        assert_eq!(JobKind::Analyze.path(), "analyze");
        assert_eq!(JobKind::AnalyzeSpeech.path(), "analyze/speech");
    }

    #[test]
    fn download_filenames_carry_kind_tag() {
        assert_eq!(
            local_filename("dlb://out/ep1.wav", JobKind::Enhance),
            "ep1 - Enhanced.wav"
        );
        assert_eq!(
            local_filename("dlb://out/ep1.json", JobKind::Analyze),
            "ep1 - Analyzed.json"
        );
        assert_eq!(
            local_filename("dlb://out/ep1.json", JobKind::AnalyzeSpeech),
            "ep1 - Speech Analyzed.json"
        );
    }

    #[test]
    fn download_filename_without_extension() {
        assert_eq!(
            local_filename("dlb://out/ep1", JobKind::Enhance),
            "ep1 - Enhanced"
        );
    }

    #[test]
    fn content_type_round_trips() {
        for ct in ContentType::all() {
            assert_eq!(ContentType::parse(ct.as_str()).unwrap(), *ct);
        }
    }

    #[test]
    fn content_type_rejects_unknown_tags() {
        for tag in ["metal concert", "Interview", "", "speech"] {
            assert!(matches!(
                ContentType::parse(tag),
                Err(Error::UnknownContentType(_))
            ));
        }
    }

    #[test]
    fn noise_reduction_rejects_unknown_amounts() {
        assert!(NoiseReduction::parse("medium").is_ok());
        assert!(matches!(
            NoiseReduction::parse("extreme"),
            Err(Error::UnknownNoiseReduction(_))
        ));
    }

    #[tokio::test]
    async fn submit_validates_before_any_request() {
        // Unroutable base URL: if submit reached the network this would fail
        // with Error::Http, not the validation error.
        let client = DolbyClient::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
        let err = client
            .submit("s3://bucket/ep1.wav", JobKind::Enhance, &EnhanceOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutputRefRequired { .. }));
    }

    #[tokio::test]
    async fn upload_rejects_missing_file_before_any_request() {
        let client = DolbyClient::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
        let err = client
            .upload(Path::new("/nonexistent/ep1.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn download_creates_destination_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("output").join("nested");

        // The request itself fails (nothing listens on port 9), but the
        // destination directory must exist by then.
        let client = DolbyClient::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
        let result = client
            .download("dlb://out/ep1.wav", &dest, JobKind::Enhance)
            .await;
        assert!(result.is_err());
        assert!(dest.is_dir());
    }
}
