//! Batch orchestration: discover inputs, plan jobs, run them in order.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use batch_denoise_core::Denoiser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, log, warn, Level};
use walkdir::WalkDir;

use crate::error::BatchError;
use crate::processor::{FileProcessor, Job, OutputMode};

/// Extensions picked up when scanning a directory (compared lowercase).
pub const AUDIO_EXTENSIONS: [&str; 5] = ["flac", "wav", "mp3", "ogg", "aiff"];

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub profile_name: String,
    pub noise_position: String,
    pub noise_duration: f64,
    pub recursive: bool,
    pub mode: OutputMode,
    /// Draw a progress bar when scanning a directory
    pub show_progress: bool,
}

/// Tally of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded: usize,
}

impl BatchResult {
    /// Count one more finished job.
    pub fn record(self, success: bool) -> Self {
        Self {
            attempted: self.attempted + 1,
            succeeded: self.succeeded + usize::from(success),
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.attempted)
    }
}

pub struct BatchRunner<D> {
    processor: FileProcessor<D>,
}

impl<D: Denoiser> BatchRunner<D> {
    pub fn new(denoiser: D) -> Self {
        Self {
            processor: FileProcessor::new(denoiser),
        }
    }

    /// Process every input described by `options`, one file at a time.
    ///
    /// Only a missing input path is an error; per-file failures show up in
    /// the returned tally.
    pub fn run(&mut self, options: &BatchOptions) -> Result<BatchResult, BatchError> {
        let jobs = plan_jobs(options)?;

        if jobs.is_empty() {
            warn!("No supported audio files found in {}", options.input.display());
            return Ok(BatchResult::default());
        }

        info!("Found {} audio file(s)", jobs.len());
        info!("Profile: {}", options.profile_name);
        info!("Noise position: {}", options.noise_position);

        let started = Instant::now();
        let progress = progress_bar(jobs.len(), options.show_progress && options.input.is_dir());

        // A lone file gets its output path reported at info level.
        let report_level = if jobs.len() == 1 { Level::Info } else { Level::Debug };

        let result = jobs.iter().fold(BatchResult::default(), |result, job| {
            if let Some(name) = job.input.file_name() {
                progress.set_message(name.to_string_lossy().into_owned());
            }
            let success = self.run_job(job, report_level);
            progress.inc(1);
            result.record(success)
        });

        progress.finish_and_clear();

        info!(
            "Done! Succeeded: {} in {:.2}s",
            result,
            started.elapsed().as_secs_f64()
        );
        if result.failed() > 0 {
            warn!("{} file(s) failed", result.failed());
        }
        info!("Output directory: {}", options.output_dir.display());

        Ok(result)
    }

    fn run_job(&mut self, job: &Job, report_level: Level) -> bool {
        debug!("Processing {}", job.input.display());

        if let Some(parent) = job.output.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create {}: {}", parent.display(), e);
                return false;
            }
        }

        let success = self.processor.process(job);
        if success {
            let what = match job.mode {
                OutputMode::Cleaned => "Cleaned",
                OutputMode::NoiseSample => "Noise sample",
            };
            log!(report_level, "{} written to {}", what, job.output.display());
        }
        success
    }
}

/// Turn the options into one job per input file.
pub fn plan_jobs(options: &BatchOptions) -> Result<Vec<Job>, BatchError> {
    let make_job = |input: PathBuf, output: PathBuf| Job {
        input,
        output,
        profile_name: options.profile_name.clone(),
        noise_position: options.noise_position.clone(),
        noise_duration: options.noise_duration,
        mode: options.mode,
    };

    if options.input.is_file() {
        let output = options
            .output_dir
            .join(prefixed_name(&options.input, options.mode));
        return Ok(vec![make_job(options.input.clone(), output)]);
    }

    if options.input.is_dir() {
        let jobs = discover_audio_files(&options.input, options.recursive)
            .into_iter()
            .map(|file| {
                let output =
                    mirrored_output_path(&options.input, &file, &options.output_dir, options.mode);
                make_job(file, output)
            })
            .collect();
        return Ok(jobs);
    }

    Err(BatchError::InputNotFound(options.input.clone()))
}

/// Audio files under `dir`, sorted by path. Subdirectories are only
/// entered when `recursive` is set.
pub fn discover_audio_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                None
            }
        })
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_supported_audio(path))
        .collect()
}

pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `output_dir / <file's directory relative to input_dir> / <prefix><name>`.
pub fn mirrored_output_path(
    input_dir: &Path,
    file: &Path,
    output_dir: &Path,
    mode: OutputMode,
) -> PathBuf {
    let relative_dir = file
        .strip_prefix(input_dir)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));

    output_dir
        .join(relative_dir)
        .join(prefixed_name(file, mode))
}

fn prefixed_name(file: &Path, mode: OutputMode) -> OsString {
    let mut name = OsString::from(mode.prefix());
    name.push(file.file_name().unwrap_or_default());
    name
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        Ok(style) => progress.set_style(style.progress_chars("#>-")),
        Err(e) => debug!("Falling back to the default progress style: {}", e),
    }
    progress
}
