use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use batch_denoise_core::{SpectralGate, DEFAULT_PROFILE_NAME, PRESET_NAMES};
use clap::builder::PossibleValuesParser;
use clap::Parser;
use log::error;

mod audio_io;
mod batch;
mod error;
mod processor;

use batch::{BatchOptions, BatchResult, BatchRunner};
use processor::OutputMode;

/// Denoise recordings using a noise sample taken from each file
#[derive(Parser, Debug)]
#[command(name = "batch-denoise")]
#[command(version)]
#[command(after_help = "Noise position examples:
  start        first second of the track
  end          last second of the track
  10.5-12.0    from 10.5 s to 12.0 s
  5%           first 5% of the track
  42           one second starting at 42 s")]
struct Args {
    /// Input file or directory
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "cleaned_audio")]
    output: PathBuf,

    /// Noise preset
    #[arg(short, long, default_value = DEFAULT_PROFILE_NAME, value_parser = PossibleValuesParser::new(PRESET_NAMES))]
    profile: String,

    /// Where to take the noise sample from
    #[arg(short = 'n', long, default_value = "start", allow_hyphen_values = true)]
    noise_position: String,

    /// Sample length in seconds for `start`, `end` and single positions
    #[arg(short = 'd', long, default_value_t = 1.0, value_parser = parse_noise_duration)]
    noise_duration: f64,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Log every file
    #[arg(short, long)]
    verbose: bool,

    /// Only write the extracted noise sample of each file
    #[arg(short, long)]
    test_noise: bool,
}

fn parse_noise_duration(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds)
    } else {
        Err("noise duration must be a positive number of seconds".to_string())
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(args: Args) -> Result<BatchResult> {
    let options = BatchOptions {
        input: args.input,
        output_dir: args.output,
        profile_name: args.profile,
        noise_position: args.noise_position,
        noise_duration: args.noise_duration,
        recursive: args.recursive,
        mode: OutputMode::from_test_noise(args.test_noise),
        show_progress: !args.verbose,
    };

    BatchRunner::new(SpectralGate::new())
        .run(&options)
        .context("Nothing to process")
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(result) => {
            println!("Succeeded: {}", result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["batch-denoise", "-i", "in.wav"]).unwrap();
        assert_eq!(args.output, PathBuf::from("cleaned_audio"));
        assert_eq!(args.profile, "default");
        assert_eq!(args.noise_position, "start");
        assert_eq!(args.noise_duration, 1.0);
        assert!(!args.recursive && !args.verbose && !args.test_noise);
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        assert!(Args::try_parse_from(["batch-denoise", "-i", "x", "-p", "thunder"]).is_err());
    }

    #[test]
    fn test_noise_duration_must_be_positive() {
        assert!(parse_noise_duration("2.5").is_ok());
        assert!(parse_noise_duration("0").is_err());
        assert!(parse_noise_duration("-1").is_err());
        assert!(parse_noise_duration("abc").is_err());
    }

    #[test]
    fn test_long_flags() {
        let args = Args::try_parse_from([
            "batch-denoise",
            "--input",
            "dir",
            "--profile",
            "rain",
            "--noise-position",
            "10.5-12.0",
            "--noise-duration",
            "2",
            "--recursive",
            "--test-noise",
        ])
        .unwrap();
        assert_eq!(args.profile, "rain");
        assert_eq!(args.noise_position, "10.5-12.0");
        assert_eq!(args.noise_duration, 2.0);
        assert!(args.recursive && args.test_noise);
    }
}
