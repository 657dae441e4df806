use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Crossfade length fading intro music into the episode, seconds.
const INTRO_FADE_SECS: u32 = 4;
/// Crossfade length fading the episode into outro music, seconds.
const OUTRO_FADE_SECS: u32 = 1;

/// Options for assembling and encoding an episode.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOptions {
    /// Intro music, crossfaded into the start of the episode.
    pub intro: Option<PathBuf>,
    /// Outro music, crossfaded after the end of the episode.
    pub outro: Option<PathBuf>,
    /// Output path. Defaults to the input with an `.mp3` extension.
    pub output: Option<PathBuf>,
}

impl TranscodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intro(mut self, path: impl Into<PathBuf>) -> Self {
        self.intro = Some(path.into());
        self
    }

    pub fn outro(mut self, path: impl Into<PathBuf>) -> Self {
        self.outro = Some(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
}

/// Splice intro/outro music onto an episode and encode it as mono
/// 160 kbit/s MP3.
///
/// Decoding, crossfading, and encoding are delegated to ffmpeg in one
/// invocation.
pub fn transcode(input: &Path, options: &TranscodeOptions) -> Result<PathBuf> {
    if !input.exists() {
        return Err(Error::InputNotFound {
            path: input.to_path_buf(),
        });
    }
    for music in [&options.intro, &options.outro].into_iter().flatten() {
        if !music.exists() {
            return Err(Error::InputNotFound {
                path: music.clone(),
            });
        }
    }

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("mp3"));

    let args = build_args(input, options, &output);
    info!(input = %input.display(), output = %output.display(), "transcoding");
    debug!(?args, "ffmpeg arguments");

    let result = Command::new("ffmpeg").args(&args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FfmpegNotFound
        } else {
            Error::Transcode(format!("failed to run ffmpeg: {e}"))
        }
    })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        // Limit error message length to avoid dumping huge stderr
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::Transcode(format!("ffmpeg failed: {stderr_truncated}")));
    }

    info!(output = %output.display(), "transcode complete");
    Ok(output)
}

/// Build the full ffmpeg argument list for one episode.
///
/// Inputs are ordered intro (if any), episode, outro (if any); the filter
/// graph crossfades them in that order. With no music the episode is just
/// re-encoded.
fn build_args(input: &Path, options: &TranscodeOptions, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-nostdin".into(), "-y".into()];

    let mut inputs: Vec<&Path> = Vec::with_capacity(3);
    if let Some(intro) = &options.intro {
        inputs.push(intro);
    }
    inputs.push(input);
    if let Some(outro) = &options.outro {
        inputs.push(outro);
    }
    for path in &inputs {
        args.push("-i".into());
        args.push(path.as_os_str().to_os_string());
    }

    if let Some(graph) = filter_graph(options) {
        args.push("-filter_complex".into());
        args.push(graph.into());
        args.push("-map".into());
        args.push("[out]".into());
    }

    args.extend([
        "-ac".into(),
        "1".into(),
        "-b:a".into(),
        "160k".into(),
        "-f".into(),
        "mp3".into(),
        output.as_os_str().to_os_string(),
    ]);
    args
}

/// Crossfade filter graph over the ordered inputs, or None when there is no
/// music to splice.
fn filter_graph(options: &TranscodeOptions) -> Option<String> {
    match (&options.intro, &options.outro) {
        (Some(_), Some(_)) => Some(format!(
            "[0:a][1:a]acrossfade=d={INTRO_FADE_SECS}:c1=tri:c2=nofade[x0];\
             [x0][2:a]acrossfade=d={OUTRO_FADE_SECS}:c1=nofade:c2=tri[out]"
        )),
        (Some(_), None) => Some(format!(
            "[0:a][1:a]acrossfade=d={INTRO_FADE_SECS}:c1=tri:c2=nofade[out]"
        )),
        (None, Some(_)) => Some(format!(
            "[0:a][1:a]acrossfade=d={OUTRO_FADE_SECS}:c1=nofade:c2=tri[out]"
        )),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn plain_reencode_has_no_filter() {
        let args = build_args(
            Path::new("ep1.wav"),
            &TranscodeOptions::new(),
            Path::new("ep1.mp3"),
        );
        let args = to_strings(&args);
        assert_eq!(
            args,
            vec![
                "-nostdin", "-y", "-i", "ep1.wav", "-ac", "1", "-b:a", "160k", "-f",
                "mp3", "ep1.mp3",
            ]
        );
    }

    #[test]
    fn intro_is_first_input_and_fades_into_episode() {
        let opts = TranscodeOptions::new().intro("intro.mp3");
        let args = to_strings(&build_args(Path::new("ep1.wav"), &opts, Path::new("out.mp3")));

        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(i, a)| *a == "-i" && *i + 1 < args.len())
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(inputs, vec!["intro.mp3", "ep1.wav"]);

        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(
            args[graph_pos + 1],
            "[0:a][1:a]acrossfade=d=4:c1=tri:c2=nofade[out]"
        );
        assert!(args.contains(&"-map".to_string()));
    }

    #[test]
    fn outro_fades_out_of_episode() {
        let opts = TranscodeOptions::new().outro("outro.mp3");
        let args = to_strings(&build_args(Path::new("ep1.wav"), &opts, Path::new("out.mp3")));

        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(
            args[graph_pos + 1],
            "[0:a][1:a]acrossfade=d=1:c1=nofade:c2=tri[out]"
        );
    }

    #[test]
    fn intro_and_outro_chain_two_crossfades() {
        let opts = TranscodeOptions::new().intro("intro.mp3").outro("outro.mp3");
        let args = to_strings(&build_args(Path::new("ep1.wav"), &opts, Path::new("out.mp3")));

        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(i, a)| *a == "-i" && *i + 1 < args.len())
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(inputs, vec!["intro.mp3", "ep1.wav", "outro.mp3"]);

        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &args[graph_pos + 1];
        assert!(graph.contains("acrossfade=d=4:c1=tri:c2=nofade[x0]"));
        assert!(graph.contains("[x0][2:a]acrossfade=d=1:c1=nofade:c2=tri[out]"));
    }

    #[test]
    fn encode_settings_are_mono_160k_mp3() {
        let args = to_strings(&build_args(
            Path::new("ep1.wav"),
            &TranscodeOptions::new(),
            Path::new("out.mp3"),
        ));
        let ac = args.iter().position(|a| a == "-ac").unwrap();
        assert_eq!(args[ac + 1], "1");
        let ba = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[ba + 1], "160k");
    }

    #[test]
    fn missing_input_fails_without_running_ffmpeg() {
        let err = transcode(Path::new("/nonexistent/ep1.wav"), &TranscodeOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::InputNotFound { .. }));
    }

    #[test]
    fn missing_music_fails_without_running_ffmpeg() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("ep1.wav");
        std::fs::write(&input, b"riff").unwrap();

        let opts = TranscodeOptions::new().intro(tmp.path().join("missing-intro.mp3"));
        let err = transcode(&input, &opts).unwrap_err();
        assert!(matches!(err, Error::InputNotFound { path } if path.ends_with("missing-intro.mp3")));
    }
}
