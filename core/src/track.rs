//! In-memory mono audio.

/// Mono samples (-1.0 to 1.0) with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Downmix interleaved frames by averaging the channels.
    ///
    /// A trailing partial frame is averaged over the channels it has.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        let samples = if channels <= 1 {
            interleaved.to_vec()
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_is_averaged() {
        let track = AudioTrack::from_interleaved(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 8000);
        assert_eq!(track.samples, vec![0.5, 0.5, 0.0]);
        assert_eq!(track.sample_rate, 8000);
    }

    #[test]
    fn test_mono_passes_through() {
        let track = AudioTrack::from_interleaved(&[0.1, 0.2, 0.3], 1, 8000);
        assert_eq!(track.samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_duration() {
        let track = AudioTrack::new(vec![0.0; 22050], 44100);
        assert_eq!(track.duration_secs(), 0.5);
        assert_eq!(AudioTrack::new(vec![0.0; 10], 0).duration_secs(), 0.0);
    }
}
