//! Command-line interface: one-shot transcribe-and-summarize.

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::progress::Stage;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(
    name = "voxsum",
    version = crate::version_string(),
    about = "Offline voice-note transcription and summarization"
)]
pub struct Cli {
    /// Audio file to transcribe and summarize
    pub audio: PathBuf,

    /// Language code for transcription (e.g. "en"), or "auto"
    #[arg(short, long)]
    pub language: Option<String>,

    /// Config file path (default: <config dir>/voxsum/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the Whisper model path
    #[arg(long, value_name = "FILE")]
    pub stt_model: Option<PathBuf>,

    /// Override the summarizer GGUF weights path
    #[arg(long, value_name = "FILE")]
    pub summary_model: Option<PathBuf>,

    /// Override the tokenizer.json path
    #[arg(long, value_name = "FILE")]
    pub tokenizer: Option<PathBuf>,

    /// Fixed sampling seed for reproducible summaries
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print only the transcript, skip summarization
    #[arg(long)]
    pub transcript_only: bool,
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxsum").join("config.toml"))
}

/// Load the config file and apply CLI overrides.
pub fn resolve_config(cli: &Cli) -> Config {
    let path = cli.config.clone().or_else(default_config_path);
    let mut config = match path {
        Some(p) => Config::load_or_default(&p),
        None => Config::default(),
    };

    if let Some(model) = &cli.stt_model {
        config.stt.model = model.clone();
    }
    if let Some(language) = &cli.language {
        config.stt.language = language.clone();
    }
    if let Some(model) = &cli.summary_model {
        config.summarizer.model = model.clone();
    }
    if let Some(tokenizer) = &cli.tokenizer {
        config.summarizer.tokenizer = tokenizer.clone();
    }
    if let Some(seed) = cli.seed {
        config.summarizer.seed = Some(seed);
    }

    config
}

/// Run the CLI: progress bar on stderr, results on stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli);
    let pipeline = Pipeline::from_config(&config)?;

    let mut rx = pipeline.subscribe();
    let bar = indicatif::ProgressBar::new(100);
    bar.set_style(
        indicatif::ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
    );

    let render = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match ev.stage {
                    Stage::Error => bar.abandon_with_message(ev.message),
                    Stage::Done => bar.finish_with_message(ev.message),
                    stage => {
                        bar.set_position((ev.fraction * 100.0).round() as u64);
                        bar.set_message(format!("{}: {}", stage, ev.message));
                    }
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    if !bar.is_finished() {
                        bar.finish_and_clear();
                    }
                    break;
                }
            }
        }
    });

    let result = if cli.transcript_only {
        pipeline
            .transcribe(&cli.audio, cli.language.as_deref())
            .await
            .map(|transcript| (transcript, None))
    } else {
        pipeline
            .process(&cli.audio, cli.language.as_deref())
            .await
            .map(|output| (output.transcript, Some(output.summary)))
    };

    // Dropping the pipeline closes the progress stream and lets the
    // renderer drain and exit.
    drop(pipeline);
    let _ = render.await;

    let (transcript, summary) = result?;

    println!("{}", "Transcript".bold());
    println!("{}", transcript);
    if let Some(summary) = summary {
        println!();
        println!("{}", "Summary".bold().green());
        println!("{}", summary);
    }

    Ok(())
}
