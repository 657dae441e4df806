use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single transcribed word with timing (milliseconds) and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: u64,
    pub end: u64,
    pub confidence: f64,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// One speaker turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    pub start: u64,
    pub end: u64,
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Typed view of a transcription job result.
///
/// The raw JSON is what gets persisted; this covers the fields the toolkit
/// reads and ignores the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    pub words: Option<Vec<Word>>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Transcript {
    /// Parse the typed view out of a raw job result.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Mapping from service speaker tags ("A", "B", ...) to display names.
///
/// Rendering never prompts: an unmapped tag falls back to a
/// "Speaker <tag>" placeholder, or fails in strict mode.
#[derive(Debug, Clone, Default)]
pub struct SpeakerNames {
    names: BTreeMap<String, String>,
    strict: bool,
}

impl SpeakerNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on unmapped tags instead of substituting a placeholder.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn insert(&mut self, tag: impl Into<String>, name: impl Into<String>) {
        self.names.insert(tag.into(), name.into());
    }

    /// Add a mapping given as `TAG=Name`, e.g. "A=Kelly".
    pub fn insert_pair(&mut self, pair: &str) -> Result<()> {
        let (tag, name) = pair
            .split_once('=')
            .ok_or_else(|| Error::SpeakerPair(pair.to_string()))?;
        if tag.is_empty() || name.is_empty() {
            return Err(Error::SpeakerPair(pair.to_string()));
        }
        self.insert(tag.trim(), name.trim());
        Ok(())
    }

    fn resolve(&self, tag: &str) -> Result<String> {
        match self.names.get(tag) {
            Some(name) => Ok(name.clone()),
            None if self.strict => Err(Error::UnmappedSpeaker(tag.to_string())),
            None => Ok(format!("Speaker {tag}")),
        }
    }
}

/// Render a plain-text transcript, one section per speaker turn.
///
/// Jobs run without speaker labels have no utterances; those fall back to the
/// flat transcript text.
pub fn render_text(transcript: &Transcript, speakers: &SpeakerNames) -> Result<String> {
    let utterances = transcript.utterances.as_deref().unwrap_or(&[]);
    if utterances.is_empty() {
        return Ok(transcript.text.clone().unwrap_or_default());
    }

    let mut sections = Vec::with_capacity(utterances.len());
    for utterance in utterances {
        let name = speakers.resolve(&utterance.speaker)?;
        sections.push(format!("{name}:\n{}\n", utterance.text));
    }
    Ok(sections.join("\n"))
}

/// Persist a raw job result verbatim.
pub fn save_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    std::fs::write(path, serde_json::to_string(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::from_value(serde_json::json!({
            "id": "c5r2z8wlu-f032-44c2-b288-f870e217db25",
            "status": "completed",
            "text": "Welcome back. Thanks, glad to be here.",
            "audio_duration": 1864.5,
            "confidence": 0.93,
            "utterances": [
                {
                    "speaker": "A",
                    "text": "Welcome back.",
                    "start": 800,
                    "end": 1900,
                    "confidence": 0.95,
                },
                {
                    "speaker": "B",
                    "text": "Thanks, glad to be here.",
                    "start": 2100,
                    "end": 4000,
                    "confidence": 0.91,
                },
            ],
        }))
        .unwrap()
    }

    #[test]
    fn parses_sample_response() {
        let t = sample();
        assert_eq!(t.status, "completed");
        assert_eq!(t.utterances.as_ref().unwrap().len(), 2);
        assert_eq!(t.audio_duration, Some(1864.5));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let t = Transcript::from_value(serde_json::json!({
            "id": "x",
            "status": "queued",
            "language_model": "default",
            "webhook_url": null,
        }))
        .unwrap();
        assert_eq!(t.status, "queued");
        assert!(t.utterances.is_none());
    }

    #[test]
    fn renders_one_section_per_turn() {
        let mut speakers = SpeakerNames::new();
        speakers.insert("A", "Kelly");
        speakers.insert("B", "Sean");

        let text = render_text(&sample(), &speakers).unwrap();
        assert_eq!(
            text,
            "Kelly:\nWelcome back.\n\nSean:\nThanks, glad to be here.\n"
        );
    }

    #[test]
    fn unmapped_speaker_gets_placeholder() {
        let mut speakers = SpeakerNames::new();
        speakers.insert("A", "Kelly");

        let text = render_text(&sample(), &speakers).unwrap();
        assert!(text.contains("Speaker B:"));
    }

    #[test]
    fn strict_mode_fails_on_unmapped_speaker() {
        let speakers = SpeakerNames::new().strict(true);
        let err = render_text(&sample(), &speakers).unwrap_err();
        assert!(matches!(err, Error::UnmappedSpeaker(tag) if tag == "A"));
    }

    #[test]
    fn no_utterances_falls_back_to_flat_text() {
        let t = Transcript::from_value(serde_json::json!({
            "id": "x",
            "status": "completed",
            "text": "No diarization here.",
        }))
        .unwrap();
        let text = render_text(&t, &SpeakerNames::new()).unwrap();
        assert_eq!(text, "No diarization here.");
    }

    #[test]
    fn speaker_pairs_parse_and_reject_garbage() {
        let mut speakers = SpeakerNames::new();
        speakers.insert_pair("A=Kelly").unwrap();
        speakers.insert_pair(" B = Sean Tibor ").unwrap();
        assert_eq!(speakers.resolve("B").unwrap(), "Sean Tibor");

        assert!(matches!(
            speakers.insert_pair("no-separator"),
            Err(Error::SpeakerPair(_))
        ));
        assert!(matches!(
            speakers.insert_pair("=Name"),
            Err(Error::SpeakerPair(_))
        ));
    }

    #[test]
    fn save_json_writes_raw_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ep1.json");
        let value = serde_json::json!({"id": "x", "status": "completed"});

        save_json(&path, &value).unwrap();

        let read: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, value);
    }
}
