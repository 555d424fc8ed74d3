//! Impulse response loading and conditioning for the cabinet simulation.

use std::path::{Path, PathBuf};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    error::Error,
    utils::{buffer::interleaved_to_planar, db_to_linear, decoder::AudioDecoder},
};

// -------------------------------------------------------------------------------------------------

// level below which trailing samples count as silence when trimming
const TRIM_THRESHOLD_DB: f32 = -90.0;

// layout and seed of the synthesized default response
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_LENGTH: usize = 2048;
const DEFAULT_SEED: u64 = 0xD10DE;

// -------------------------------------------------------------------------------------------------

/// Options for loading and conditioning impulse response files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrLoadOptions {
    /// By default true: keep all channels of the response. When false, the response gets
    /// downmixed to a single channel before use.
    pub stereo: bool,
    /// By default true: strip trailing samples below -90 dB from the end of the response,
    /// which shortens the convolution without audibly changing it.
    pub trim: bool,
    /// By default true: rescale the response to unit energy, so that switching between
    /// responses does not change the overall output level.
    pub normalize: bool,
}

impl Default for IrLoadOptions {
    fn default() -> Self {
        Self {
            stereo: true,
            trim: true,
            normalize: true,
        }
    }
}

impl IrLoadOptions {
    pub fn stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// A decoded, conditioned impulse response, stored as planar f32 channels at its native
/// sample rate. Responses are immutable once loaded: rate conversion for a specific
/// processing layout happens when a convolution engine is built from them.
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    file_path: Option<PathBuf>,
}

impl ImpulseResponse {
    /// Load and condition a response from an audio file.
    pub fn from_file<P: AsRef<Path>>(path: P, options: IrLoadOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MediaFileNotFound);
        }
        let mut decoder = AudioDecoder::from_file(path)?;
        let mut response = Self::from_decoder(&mut decoder, options)?;
        response.file_path = Some(path.to_path_buf());
        Ok(response)
    }

    /// Load and condition a response from raw, encoded file contents.
    pub fn from_buffer(buffer: Vec<u8>, options: IrLoadOptions) -> Result<Self, Error> {
        let mut decoder = AudioDecoder::from_buffer(buffer)?;
        Self::from_decoder(&mut decoder, options)
    }

    /// The built-in cabinet response: a deterministic, lowpass filtered noise burst with an
    /// exponential decay. Used when no response file is available.
    pub fn default_response() -> Self {
        // decay to -60 dB over the burst's length
        let decay = (1000.0_f32).ln() / (DEFAULT_LENGTH - 1) as f32;
        // one pole lowpass, darkening the noise like a speaker rolloff
        let lowpass = 0.2_f32;

        let mut rng = SmallRng::seed_from_u64(DEFAULT_SEED);
        let mut filtered = 0.0_f32;
        let mut samples = Vec::with_capacity(DEFAULT_LENGTH);
        for index in 0..DEFAULT_LENGTH {
            let noise = rng.random::<f32>() * 2.0 - 1.0;
            filtered += lowpass * (noise - filtered);
            samples.push(filtered * (-decay * index as f32).exp());
        }

        let mut response = Self {
            channels: vec![samples],
            sample_rate: DEFAULT_SAMPLE_RATE,
            file_path: None,
        };
        response.normalize();
        response
    }

    /// Planar sample data, one vec per channel, all of the same length.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames.
    pub fn length(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// The response's native sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Path of the file this response was loaded from, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn from_decoder(decoder: &mut AudioDecoder, options: IrLoadOptions) -> Result<Self, Error> {
        let signal_spec = decoder.signal_spec();
        let channel_count = signal_spec.channels.count();
        let interleaved = decoder.decode_all()?;

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![vec![0.0; frames]; channel_count];
        interleaved_to_planar(&interleaved, &mut channels);

        let mut response = Self {
            channels,
            sample_rate: signal_spec.rate,
            file_path: None,
        };
        if !options.stereo {
            response.downmix_to_mono();
        }
        if options.trim {
            response.trim_trailing_silence();
        }
        if options.normalize {
            response.normalize();
        }
        Ok(response)
    }

    fn downmix_to_mono(&mut self) {
        if self.channels.len() <= 1 {
            return;
        }
        let scale = 1.0 / self.channels.len() as f32;
        let mut mono = vec![0.0; self.length()];
        for channel in &self.channels {
            for (sum, sample) in mono.iter_mut().zip(channel.iter()) {
                *sum += *sample;
            }
        }
        for sample in mono.iter_mut() {
            *sample *= scale;
        }
        self.channels = vec![mono];
    }

    fn trim_trailing_silence(&mut self) {
        let threshold = db_to_linear(TRIM_THRESHOLD_DB);
        let mut length = 0;
        for channel in &self.channels {
            let channel_length = channel
                .iter()
                .rposition(|sample| sample.abs() >= threshold)
                .map_or(0, |position| position + 1);
            length = length.max(channel_length);
        }
        // keep at least one frame, even for an all silent response
        let length = length.max(1);
        for channel in self.channels.iter_mut() {
            channel.truncate(length);
        }
    }

    fn normalize(&mut self) {
        let energy: f32 = self
            .channels
            .iter()
            .flatten()
            .map(|sample| sample * sample)
            .sum();
        if energy > 0.0 {
            let scale = 1.0 / energy.sqrt();
            for channel in self.channels.iter_mut() {
                for sample in channel.iter_mut() {
                    *sample *= scale;
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
