use std::path::PathBuf;

/// All errors that can occur in postprod.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown content type: \"{0}\" — use ContentType::all() to list valid tags")]
    UnknownContentType(String),

    #[error("unknown noise reduction amount: \"{0}\" (expected auto, low, medium, high or max)")]
    UnknownNoiseReduction(String),

    #[error("input reference \"{input}\" is outside the dlb://in/ namespace — supply an explicit output reference")]
    OutputRefRequired { input: String },

    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    #[error("upload error: {0}")]
    Upload(String),

    #[error("service response missing field: {0}")]
    MalformedResponse(&'static str),

    #[error("job {id} finished with status {status}")]
    JobFailed { id: String, status: String },

    #[error("invalid speaker mapping \"{0}\" — expected TAG=Name")]
    SpeakerPair(String),

    #[error("no speaker name mapped for tag \"{0}\"")]
    UnmappedSpeaker(String),

    #[error("aborted by user")]
    Aborted,

    #[error("transcode error: {0}")]
    Transcode(String),

    #[error("ffmpeg not found — install with: apt install ffmpeg")]
    FfmpegNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
