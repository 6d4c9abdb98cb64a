//! Reading and writing audio files.
//!
//! Decoding goes through symphonia, so anything it probes (FLAC, WAV, MP3,
//! OGG, AIFF) can be read. WAV is written with hound and FLAC with
//! flac-bound. Other output extensions (MP3, OGG, AIFF) are written as a
//! temporary WAV and handed to ffmpeg.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use batch_denoise_core::AudioTrack;
use flac_bound::{FlacEncoder, WriteWrapper};
use hound::{WavSpec, WavWriter};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ProcessError;

/// Decoded interleaved audio as it came out of the container.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Average all channels into a mono track.
    pub fn into_mono(self) -> AudioTrack {
        if self.channels <= 1 {
            return AudioTrack::new(self.samples, self.sample_rate);
        }
        AudioTrack::from_interleaved(&self.samples, self.channels, self.sample_rate)
    }
}

pub fn read_audio(path: &Path) -> Result<DecodedAudio, ProcessError> {
    let file = File::open(path).map_err(|source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let decode_err = |source| ProcessError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ProcessError::NoTrack(path.to_path_buf()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!("Skipping corrupt packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(decode_err(e)),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        channels: channels.max(1),
        sample_rate,
    })
}

/// Write mono samples, choosing the format from the file extension.
pub fn write_audio(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ProcessError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        None | Some("wav") => write_wav(path, samples, sample_rate),
        Some("flac") => write_flac(path, samples, sample_rate),
        Some(_) => {
            let temp_wav = temp_wav_path(path);
            write_wav(&temp_wav, samples, sample_rate)?;
            let result = transcode(&temp_wav, path);
            if let Err(e) = std::fs::remove_file(&temp_wav) {
                warn!("Could not remove {}: {}", temp_wav.display(), e);
            }
            result
        }
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ProcessError> {
    let wav_err = |source| ProcessError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for sample in samples {
        writer.write_sample(to_i16(*sample)).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

/// 16-bit mono FLAC, encoded in memory and written in one go.
fn write_flac(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ProcessError> {
    const BLOCK_SIZE: usize = 4096;

    let flac_err = |message: String| ProcessError::Flac {
        path: path.to_path_buf(),
        message,
    };

    let mut encoded = Vec::new();
    {
        let mut wrapper = WriteWrapper(&mut encoded);
        let mut encoder = FlacEncoder::new()
            .ok_or_else(|| flac_err("encoder allocation failed".to_string()))?
            .channels(1)
            .bits_per_sample(16)
            .sample_rate(sample_rate)
            .compression_level(5)
            .init_write(&mut wrapper)
            .map_err(|e| flac_err(format!("init failed: {:?}", e)))?;

        let pcm: Vec<i32> = samples.iter().map(|&s| i32::from(to_i16(s))).collect();
        for block in pcm.chunks(BLOCK_SIZE) {
            encoder
                .process_interleaved(block, block.len() as u32)
                .map_err(|_| flac_err("encoding failed".to_string()))?;
        }
        encoder
            .finish()
            .map_err(|_| flac_err("finish failed".to_string()))?;
    }

    std::fs::write(path, encoded).map_err(|source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Encoded {} as FLAC", path.display());
    Ok(())
}

fn temp_wav_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp.wav");
    PathBuf::from(name)
}

/// Convert a WAV file to the format implied by `output`'s extension.
fn transcode(wav_path: &Path, output: &Path) -> Result<(), ProcessError> {
    let result = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(wav_path)
        .arg(output)
        .output()
        .map_err(|e| ProcessError::Transcode {
            path: output.to_path_buf(),
            message: format!("failed to run ffmpeg (is it installed?): {}", e),
        })?;

    if !result.status.success() {
        return Err(ProcessError::Transcode {
            path: output.to_path_buf(),
            message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    debug!("Transcoded {} -> {}", wav_path.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_wav(path: &Path, frames: &[(i16, i16)], sample_rate: u32) {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_write_then_read_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..4000).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();

        write_audio(&path, &samples, 8000).unwrap();
        let decoded = read_audio(&path).unwrap();

        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), samples.len());
        assert!((decoded.samples[10] - samples[10]).abs() < 1e-3);
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_wav(&path, &[(16384, 0), (-16384, -16384), (0, 0)], 22050);

        let decoded = read_audio(&path).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), 6);

        let track = decoded.into_mono();
        assert_eq!(track.sample_rate, 22050);
        assert_eq!(track.len(), 3);
        assert!((track.samples[0] - 0.25).abs() < 1e-3);
        assert!((track.samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_audio(Path::new("/nonexistent/input.wav"));
        assert!(matches!(result, Err(ProcessError::Io { .. })));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let result = read_audio(&path);
        assert!(matches!(result, Err(ProcessError::Decode { .. })));
    }

    #[test]
    fn test_samples_are_clamped_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loud.wav");
        write_audio(&path, &[2.0, -2.0], 8000).unwrap();

        let decoded = read_audio(&path).unwrap();
        assert!((decoded.samples[0] - 1.0).abs() < 1e-3);
        assert!((decoded.samples[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_write_then_read_flac() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.flac");
        let samples: Vec<f32> = (0..10_000)
            .map(|i| 0.5 * (i as f32 * 0.05).sin())
            .collect();

        write_audio(&path, &samples, 22050).unwrap();
        assert!(!temp_wav_path(&path).exists());

        let decoded = read_audio(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), samples.len());
        for i in [0, 123, 5000, 9999] {
            assert!((decoded.samples[i] - samples[i]).abs() < 1e-3, "sample {}", i);
        }
    }

    #[test]
    fn test_empty_flac_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.flac");
        write_audio(&path, &[], 8000).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failed_transcode_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.not-a-format");

        // Fails whether or not ffmpeg is installed: there is no such muxer.
        let result = write_audio(&path, &[0.1; 800], 8000);
        assert!(matches!(result, Err(ProcessError::Transcode { .. })));
        assert!(!temp_wav_path(&path).exists());
    }

    #[test]
    fn test_temp_wav_path() {
        assert_eq!(
            temp_wav_path(Path::new("out/cleaned_a.flac")),
            PathBuf::from("out/cleaned_a.flac.tmp.wav")
        );
    }
}
