//! `transposer` binary. Shifts a WAV file by whole semitones, keeping its
//! length, and writes the result as WAV or Opus.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use transposer::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Wav,
    Opus,
}

impl From<OutputFormat> for AudioFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Wav => AudioFormat::Wav,
            OutputFormat::Opus => AudioFormat::Opus,
        }
    }
}

/// Duration-preserving pitch shifter
#[derive(Parser, Debug)]
#[command(name = "transposer")]
#[command(version)]
struct Args {
    /// Input WAV file
    input: PathBuf,

    /// Shift in semitones, -12..=12
    #[arg(
        short,
        long,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-12..=12)
    )]
    semitones: i32,

    /// Output file. Defaults to <input>-pitch-<plus|minus><n>.<ext> in the
    /// current directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "wav")]
    format: OutputFormat,

    /// Opus bitrate in kbps (overrides the config file)
    #[arg(long)]
    bitrate: Option<u32>,

    /// ffmpeg executable (overrides the config file)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "transposer=debug,transposer_core=debug,transposer_export=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::debug!(?args, "Parsed arguments");

    let mut config = match &args.config {
        Some(path) => TransposerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TransposerConfig::default(),
    };
    if let Some(kbps) = args.bitrate {
        config.transcode.bitrate_kbps = kbps;
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        config.transcode.ffmpeg_path = ffmpeg.clone();
    }

    let semitones = Semitones::new(args.semitones)?;
    let mut transposer = Transposer::builder()
        .config(config)
        .build()
        .context("Failed to start transposer")?;

    transposer
        .load_wav_file(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    if let Some(source) = transposer.source() {
        println!(
            "Loaded: {} | {}ch @ {} Hz | {:.2}s",
            transposer.source_name().unwrap_or("input"),
            source.channel_count(),
            source.sample_rate(),
            source.duration_seconds()
        );
    }

    let mut last_status = String::new();
    let rendered = transposer
        .render(semitones, |status| {
            let text = status.to_string();
            if text != last_status {
                println!("{}", text);
                last_status = text;
            }
        })
        .context("Process failed")?;
    println!("Done. Output length: {:.2}s", rendered.duration_seconds());

    let (bytes, extension) = match AudioFormat::from(args.format) {
        AudioFormat::Wav => (transposer.render_wav(semitones, |_| {})?, "wav"),
        AudioFormat::Opus => {
            let mut sink = |line: &str| println!("Encoding Opus... {}", line);
            let output = transposer
                .export_opus(Some(&mut sink as &mut dyn FnMut(&str)))
                .context("Opus export failed")?;
            (output.bytes.clone(), output.extension)
        }
    };

    let path = match args.output {
        Some(path) => path,
        None => PathBuf::from(transposer.output_file_name(extension)?),
    };
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote: {}", path.display());

    Ok(())
}
