use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use postprod::{
    transcript, AssemblyClient, ContentType, DolbyClient, EnhanceOptions, NoiseReduction,
    SpeakerNames, TranscodeOptions, TranscribeOptions, Transcript, Update,
};

#[derive(Parser)]
#[command(
    name = "postprod",
    version,
    about = "Podcast post-production: enhance, analyze, transcribe, transcode"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Skip confirmation prompts.
    #[arg(short = 'y', long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Enhance an audio file through the cloud media API.
    Enhance {
        input: PathBuf,

        /// Directory for the processed file (default: <input dir>/output).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Content type tag for the enhancement profile.
        #[arg(long, default_value = "interview")]
        content_type: String,

        /// Loudness target in LUFS.
        #[arg(long)]
        loudness_target: Option<i32>,

        /// Noise reduction amount: auto, low, medium, high or max.
        #[arg(long, default_value = "auto")]
        noise_reduction: String,
    },

    /// Analyze an audio file, writing a JSON quality report.
    Analyze {
        input: PathBuf,

        /// Directory for the report (default: <input dir>/output).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the speech-specific analysis instead of the general one.
        #[arg(long)]
        speech: bool,
    },

    /// Transcribe an audio file through the transcription API.
    Transcribe {
        input: PathBuf,

        /// Word to boost in the transcript vocabulary. Repeatable.
        #[arg(long = "boost", value_name = "WORD")]
        word_boost: Vec<String>,

        /// Speaker tag mapping for the plain-text transcript. Repeatable,
        /// e.g. -s A=Kelly -s B=Sean.
        #[arg(short = 's', long = "speaker", value_name = "TAG=NAME")]
        speakers: Vec<String>,

        /// Fail on unmapped speaker tags instead of using a placeholder.
        #[arg(long)]
        strict_speakers: bool,

        /// Also write a plain-text transcript, one section per speaker turn.
        #[arg(long)]
        text: bool,
    },

    /// Fetch a finished transcription job by id and write its result.
    Retrieve {
        job_id: String,

        /// Output stem (default: the job id in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Speaker tag mapping for the plain-text transcript. Repeatable.
        #[arg(short = 's', long = "speaker", value_name = "TAG=NAME")]
        speakers: Vec<String>,

        /// Fail on unmapped speaker tags instead of using a placeholder.
        #[arg(long)]
        strict_speakers: bool,

        /// Also write a plain-text transcript.
        #[arg(long)]
        text: bool,
    },

    /// Splice intro/outro music and encode to mono 160 kbit/s MP3.
    Transcode {
        input: PathBuf,

        /// Output file (default: input with .mp3 extension).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Intro music, crossfaded into the episode.
        #[arg(long)]
        intro: Option<PathBuf>,

        /// Outro music, crossfaded after the episode.
        #[arg(long)]
        outro: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("postprod=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> postprod::Result<()> {
    match cli.command {
        Command::Enhance {
            input,
            output,
            content_type,
            loudness_target,
            noise_reduction,
        } => {
            let mut options = EnhanceOptions::new()
                .content_type(ContentType::parse(&content_type)?)
                .noise_reduction_amount(NoiseReduction::parse(&noise_reduction)?);
            if let Some(lufs) = loudness_target {
                options = options.loudness_target(lufs);
            }

            let client = DolbyClient::new(&resolve_key("DOLBY_API_KEY", "Dolby.io")?)?;
            confirm_upload(&input, cli.yes)?;

            let dest = output.unwrap_or_else(|| default_output_dir(&input));
            let pb = job_progress_bar();
            let result = postprod::enhance_file(&client, &input, &dest, &options, |u| {
                report_update(&pb, u)
            })
            .await;
            pb.finish_and_clear();

            let path = result?;
            println!("Enhanced file saved to {}", path.display());
        }

        Command::Analyze {
            input,
            output,
            speech,
        } => {
            let client = DolbyClient::new(&resolve_key("DOLBY_API_KEY", "Dolby.io")?)?;
            confirm_upload(&input, cli.yes)?;

            let dest = output.unwrap_or_else(|| default_output_dir(&input));
            let pb = job_progress_bar();
            let result = postprod::analyze_file(
                &client,
                &input,
                &dest,
                speech,
                &EnhanceOptions::default(),
                |u| report_update(&pb, u),
            )
            .await;
            pb.finish_and_clear();

            let path = result?;
            println!("Analysis report saved to {}", path.display());
        }

        Command::Transcribe {
            input,
            word_boost,
            speakers,
            strict_speakers,
            text,
        } => {
            let client =
                AssemblyClient::new(&resolve_key("ASSEMBLYAI_API_KEY", "AssemblyAI")?)?;
            confirm_upload(&input, cli.yes)?;

            let options = TranscribeOptions::new()
                .speaker_labels(true)
                .word_boost(word_boost);

            let spinner = ProgressBar::new_spinner();
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message("Transcribing");
            let result = postprod::transcribe_file(&client, &input, &options, |u| {
                if let Update::Status(status) = u {
                    spinner.set_message(format!("Transcription {status}"));
                }
            })
            .await;
            spinner.finish_and_clear();

            let value = result?;
            write_transcript_outputs(&input.with_extension(""), &value, &speakers, strict_speakers, text)?;
        }

        Command::Retrieve {
            job_id,
            output,
            speakers,
            strict_speakers,
            text,
        } => {
            let client =
                AssemblyClient::new(&resolve_key("ASSEMBLYAI_API_KEY", "AssemblyAI")?)?;

            let value = client.result(&job_id).await?;
            let status = value
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            if status != "completed" {
                return Err(postprod::Error::JobFailed {
                    id: job_id,
                    status: status.to_string(),
                });
            }

            let stem = output.unwrap_or_else(|| PathBuf::from(&job_id));
            write_transcript_outputs(&stem, &value, &speakers, strict_speakers, text)?;
        }

        Command::Transcode {
            input,
            output,
            intro,
            outro,
        } => {
            let mut options = TranscodeOptions::new();
            if let Some(path) = intro {
                options = options.intro(path);
            }
            if let Some(path) = outro {
                options = options.outro(path);
            }
            if let Some(path) = output {
                options = options.output(path);
            }

            let path = postprod::transcode(&input, &options)?;
            println!("Transcoded file saved to {}", path.display());
        }
    }

    Ok(())
}

/// Write the raw job result to `<stem>.json` and, when asked, the plain-text
/// transcript to `<stem> - transcript.txt`.
fn write_transcript_outputs(
    stem: &Path,
    value: &serde_json::Value,
    speakers: &[String],
    strict_speakers: bool,
    text: bool,
) -> postprod::Result<()> {
    let json_path = stem.with_extension("json");
    transcript::save_json(&json_path, value)?;
    println!("Transcript JSON saved to {}", json_path.display());

    if text {
        let parsed = Transcript::from_value(value.clone())?;
        let mut names = SpeakerNames::new().strict(strict_speakers);
        for pair in speakers {
            names.insert_pair(pair)?;
        }
        let rendered = transcript::render_text(&parsed, &names)?;

        let file_name = stem
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_string());
        let txt_path = stem.with_file_name(format!("{file_name} - transcript.txt"));
        std::fs::write(&txt_path, rendered)?;
        println!("Plain-text transcript saved to {}", txt_path.display());
    }

    Ok(())
}

/// Processed artifacts land next to the input by default.
fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("output")
}

fn job_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{wide_bar:.cyan/blue}] {pos}/100")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message("Processing");
    pb
}

fn report_update(pb: &ProgressBar, update: Update) {
    match update {
        Update::Progress(pct) => pb.set_position(pct as u64),
        Update::Status(status) => pb.set_message(format!("Processing ({status})")),
    }
}

/// Resolve an API key from the environment, falling back to a prompt.
fn resolve_key(env_var: &str, service: &str) -> postprod::Result<String> {
    if let Ok(key) = std::env::var(env_var) {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }

    eprintln!("This tool requires a valid API key for {service}.");
    eprint!("Enter your {service} API key: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    let key = line.trim();
    if read == 0 || key.is_empty() {
        return Err(postprod::Error::Aborted);
    }
    Ok(key.to_string())
}

/// Uploads cost money; ask first unless --yes was given.
fn confirm_upload(input: &Path, yes: bool) -> postprod::Result<()> {
    if yes {
        return Ok(());
    }

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    eprint!("Ready to upload {name}? You may incur costs. [Y/n] ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    if read == 0 || answer == "n" || answer == "no" {
        return Err(postprod::Error::Aborted);
    }
    Ok(())
}
