//! Processing of a single file.

use std::path::PathBuf;
use std::time::Instant;

use batch_denoise_core::{
    clamp_interval, extract_noise_clip, parse_time_range, resolve_profile, AudioTrack, Denoiser,
    ParsedRange,
};
use log::{debug, error, warn};

use crate::audio_io::{read_audio, write_audio};
use crate::error::ProcessError;

/// What gets written for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// The denoised recording
    Cleaned,
    /// Only the extracted noise clip, for checking the noise position
    NoiseSample,
}

impl OutputMode {
    pub fn from_test_noise(test_noise: bool) -> Self {
        if test_noise {
            OutputMode::NoiseSample
        } else {
            OutputMode::Cleaned
        }
    }

    /// File name prefix for outputs in this mode.
    pub fn prefix(self) -> &'static str {
        match self {
            OutputMode::Cleaned => "cleaned_",
            OutputMode::NoiseSample => "noise_sample_",
        }
    }
}

/// One input file and everything needed to process it.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile_name: String,
    pub noise_position: String,
    /// Window length in seconds for `start`, `end` and single positions
    pub noise_duration: f64,
    pub mode: OutputMode,
}

impl Job {
    /// Noise window for a track of `total_duration` seconds, clamped to the track.
    fn noise_window(&self, total_duration: f64) -> ParsedRange {
        let parsed = parse_time_range(&self.noise_position, total_duration, self.noise_duration);
        ParsedRange {
            interval: clamp_interval(parsed.interval, total_duration),
            ..parsed
        }
    }
}

pub struct FileProcessor<D> {
    denoiser: D,
}

impl<D: Denoiser> FileProcessor<D> {
    pub fn new(denoiser: D) -> Self {
        Self { denoiser }
    }

    /// Run `job` to completion. Failures are logged and reported as `false`.
    pub fn process(&mut self, job: &Job) -> bool {
        let started = Instant::now();
        match self.try_process(job) {
            Ok(()) => {
                debug!(
                    "Wrote {} in {:.2}s",
                    job.output.display(),
                    started.elapsed().as_secs_f64()
                );
                true
            }
            Err(e) => {
                error!("Failed to process {}: {}", job.input.display(), e);
                false
            }
        }
    }

    fn try_process(&mut self, job: &Job) -> Result<(), ProcessError> {
        let track = read_audio(&job.input)?.into_mono();
        if track.is_empty() || track.sample_rate == 0 {
            return Err(ProcessError::EmptyTrack(job.input.clone()));
        }

        let output = self.render(job, &track)?;
        write_audio(&job.output, &output, track.sample_rate)
    }

    fn render(&mut self, job: &Job, track: &AudioTrack) -> Result<Vec<f32>, ProcessError> {
        let total_duration = track.duration_secs();
        debug!(
            "{}: {} Hz, {:.2}s",
            job.input.display(),
            track.sample_rate,
            total_duration
        );

        let range = job.noise_window(total_duration);
        if let Some(warning) = &range.warning {
            warn!("{}: {}", job.input.display(), warning);
        }

        let clip = extract_noise_clip(
            &track.samples,
            track.sample_rate,
            range.interval,
            total_duration,
        );
        debug!(
            "Noise clip: {:.2}s-{:.2}s ({} samples)",
            range.interval.start,
            range.interval.end,
            clip.len()
        );

        if job.mode == OutputMode::NoiseSample {
            return Ok(clip.to_vec());
        }

        let profile = resolve_profile(&job.profile_name);
        let cleaned = self
            .denoiser
            .denoise(&track.samples, clip, track.sample_rate, &profile)?;
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_denoise_core::{GateError, NoiseProfile, TimeInterval};
    use std::path::Path;

    use crate::audio_io::read_audio;

    /// Records the clip it was handed and halves the signal.
    #[derive(Default)]
    struct RecordingDenoiser {
        clip_len: Option<usize>,
        profile: Option<NoiseProfile>,
    }

    impl Denoiser for RecordingDenoiser {
        fn denoise(
            &mut self,
            signal: &[f32],
            noise: &[f32],
            _sample_rate: u32,
            profile: &NoiseProfile,
        ) -> Result<Vec<f32>, GateError> {
            self.clip_len = Some(noise.len());
            self.profile = Some(*profile);
            Ok(signal.iter().map(|s| s * 0.5).collect())
        }
    }

    struct FailingDenoiser;

    impl Denoiser for FailingDenoiser {
        fn denoise(
            &mut self,
            _signal: &[f32],
            _noise: &[f32],
            _sample_rate: u32,
            _profile: &NoiseProfile,
        ) -> Result<Vec<f32>, GateError> {
            Err(GateError::EmptyNoiseClip)
        }
    }

    fn write_fixture(path: &Path, seconds: f32, sample_rate: u32) {
        let samples: Vec<f32> = (0..(seconds * sample_rate as f32) as usize)
            .map(|i| if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        crate::audio_io::write_audio(path, &samples, sample_rate).unwrap();
    }

    fn job(input: &Path, output: &Path, position: &str, mode: OutputMode) -> Job {
        Job {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            profile_name: "wind".to_string(),
            noise_position: position.to_string(),
            noise_duration: 1.0,
            mode,
        }
    }

    #[test]
    fn test_output_mode_prefix() {
        assert_eq!(OutputMode::from_test_noise(false).prefix(), "cleaned_");
        assert_eq!(OutputMode::from_test_noise(true).prefix(), "noise_sample_");
    }

    #[test]
    fn test_cleaned_output_keeps_length_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("cleaned_in.wav");
        write_fixture(&input, 3.0, 8000);

        let mut processor = FileProcessor::new(RecordingDenoiser::default());
        assert!(processor.process(&job(&input, &output, "end", OutputMode::Cleaned)));

        let written = read_audio(&output).unwrap();
        assert_eq!(written.sample_rate, 8000);
        assert_eq!(written.samples.len(), 24000);
        assert!((written.samples[0] - 0.2).abs() < 1e-3);

        assert_eq!(processor.denoiser.clip_len, Some(8000));
        assert_eq!(processor.denoiser.profile, Some(resolve_profile("wind")));
    }

    #[test]
    fn test_noise_window_is_clamped_to_track() {
        let mut short = job(Path::new("a.wav"), Path::new("b.wav"), "end", OutputMode::Cleaned);
        assert_eq!(short.noise_window(0.5).interval, TimeInterval::new(0.0, 0.5));

        short.noise_position = "50-70".to_string();
        let late = short.noise_window(10.0).interval;
        assert!((late.start - 9.9).abs() < 1e-9 && (late.end - 10.0).abs() < 1e-9);

        short.noise_position = "2-3".to_string();
        let window = short.noise_window(10.0);
        assert_eq!(window.interval, TimeInterval::new(2.0, 3.0));
        assert!(window.warning.is_none());

        short.noise_position = "junk".to_string();
        assert!(short.noise_window(10.0).warning.is_some());
    }

    #[test]
    fn test_noise_sample_mode_writes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("noise_sample_in.wav");
        write_fixture(&input, 4.0, 8000);

        let mut processor = FileProcessor::new(FailingDenoiser);
        assert!(processor.process(&job(&input, &output, "25%", OutputMode::NoiseSample)));

        let written = read_audio(&output).unwrap();
        assert_eq!(written.samples.len(), 8000);
    }

    #[test]
    fn test_malformed_position_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_fixture(&input, 2.0, 8000);

        let mut processor = FileProcessor::new(RecordingDenoiser::default());
        assert!(processor.process(&job(&input, &output, "not-a-time", OutputMode::Cleaned)));
        assert_eq!(processor.denoiser.clip_len, Some(8000));
    }

    #[test]
    fn test_failures_are_reported_as_false() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");

        let mut processor = FileProcessor::new(RecordingDenoiser::default());
        assert!(!processor.process(&job(&input, &output, "start", OutputMode::Cleaned)));

        std::fs::write(&input, b"garbage").unwrap();
        assert!(!processor.process(&job(&input, &output, "start", OutputMode::Cleaned)));

        write_fixture(&input, 1.0, 8000);
        let mut failing = FileProcessor::new(FailingDenoiser);
        assert!(!failing.process(&job(&input, &output, "start", OutputMode::Cleaned)));
        assert!(!output.exists());
    }

    #[test]
    fn test_empty_track_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.wav");
        let output = dir.path().join("out.wav");
        crate::audio_io::write_audio(&input, &[], 8000).unwrap();

        let mut processor = FileProcessor::new(RecordingDenoiser::default());
        assert!(!processor.process(&job(&input, &output, "start", OutputMode::Cleaned)));
    }
}
