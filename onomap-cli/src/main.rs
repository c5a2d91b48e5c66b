//! OnoMap command-line host.
//!
//! Measures a calibrated WAV recording and writes a JSON report:
//!
//! ```text
//! onomap <input.wav> [--settings <path>] [--output <path>] [--period fast|slow] [--stream]
//! ```
//!
//! `--stream` replays the recording through a live measurement session
//! instead of computing the indicators on the whole file at once.

mod report;
mod settings;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use onomap_core::{audio::read_wav_block, TimePeriod};
use tracing::info;

use settings::{default_settings_path, load_settings};

#[derive(Debug)]
struct Args {
    input: PathBuf,
    settings: Option<PathBuf>,
    output: Option<PathBuf>,
    period: Option<TimePeriod>,
    stream: bool,
}

const USAGE: &str =
    "usage: onomap <input.wav> [--settings <path>] [--output <path>] [--period fast|slow] [--stream]";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut settings: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut period: Option<TimePeriod> = None;
    let mut stream = false;

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let v = it.next().context("--settings requires a path")?;
                settings = Some(PathBuf::from(v));
            }
            "--output" | "-o" => {
                let v = it.next().context("--output requires a path")?;
                output = Some(PathBuf::from(v));
            }
            "--period" => {
                let v = it.next().context("--period requires fast or slow")?;
                period = Some(v.parse()?);
            }
            "--stream" => stream = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown flag '{other}'\n{USAGE}"),
            other => {
                if input.is_some() {
                    bail!("unexpected extra argument '{other}'\n{USAGE}");
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    let input = input.with_context(|| format!("missing input file\n{USAGE}"))?;
    Ok(Args {
        input,
        settings,
        output,
        period,
        stream,
    })
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path)?;
    if let Some(period) = args.period {
        settings.time_period = period;
    }
    info!(
        settings = %settings_path.display(),
        period = %settings.time_period,
        reference_pressure = settings.reference_pressure,
        "settings loaded"
    );

    let block = read_wav_block(&args.input, settings.pascal_full_scale)
        .with_context(|| format!("cannot load {}", args.input.display()))?;

    let input = args.input.display().to_string();
    let report = if args.stream {
        report::streamed_report(&input, &block, &settings)?
    } else {
        report::offline_report(&input, &block, &settings)?
    };

    let json = serde_json::to_string_pretty(&report)?;
    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)
                .with_context(|| format!("cannot write report {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("onomap failed: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn period_flag_overrides_settings() {
        let args = parse(&["rec.wav", "--period", "slow", "--stream"]).unwrap();
        assert_eq!(args.input, PathBuf::from("rec.wav"));
        assert_eq!(args.period, Some(TimePeriod::Slow));
        assert!(args.stream);
    }

    #[test]
    fn period_defaults_to_settings() {
        let args = parse(&["rec.wav", "-o", "out.json"]).unwrap();
        assert_eq!(args.period, None);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["rec.wav", "--period", "impulse"]).is_err());
        assert!(parse(&["rec.wav", "--period"]).is_err());
        assert!(parse(&["--stream"]).is_err());
        assert!(parse(&["a.wav", "b.wav"]).is_err());
        assert!(parse(&["a.wav", "--loud"]).is_err());
    }
}
