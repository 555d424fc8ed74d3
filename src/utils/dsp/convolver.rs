//! Partitioned FFT convolution for cabinet impulse responses.

use std::sync::Arc;

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::{
    error::Error,
    utils::{buffer::clear_buffer, resampler::resample_buffer},
};

// -------------------------------------------------------------------------------------------------

/// Streaming convolution engine with a uniformly partitioned impulse response.
///
/// The partition size equals the maximum processing block size, so each incoming block is
/// convolved with the full response within the same `process` call and the engine adds no
/// latency. Impulse response channels are resampled to the engine's sample rate on
/// construction. All FFT and overlap buffers are allocated up front: `process` neither
/// allocates nor blocks.
///
/// Blocks shorter than the configured maximum are treated as zero padded up to a full block,
/// which keeps the partition alignment intact for a trailing partial block at stream end.
pub struct Convolver {
    sample_rate: u32,
    max_block_size: usize,
    channel_count: usize,
    fft_size: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    // impulse response partition spectra, per processing channel
    partitions: Vec<Vec<Vec<Complex<f32>>>>,
    // spectra of past input blocks: one ring per channel with one slot per partition
    delay_lines: Vec<Vec<Vec<Complex<f32>>>>,
    delay_pos: usize,
    // sliding window over the previous and the current input block, per channel
    inputs: Vec<Vec<f32>>,
    fft_in: Vec<f32>,
    fft_out: Vec<f32>,
    spectrum_in: Vec<Complex<f32>>,
    spectrum_sum: Vec<Complex<f32>>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Create a new engine for the given planar impulse response and processing layout.
    ///
    /// When the response has fewer channels than the processing layout, the last response
    /// channel is shared by the remaining processing channels.
    pub fn new(
        response: &[Vec<f32>],
        response_sample_rate: u32,
        sample_rate: u32,
        max_block_size: usize,
        channel_count: usize,
    ) -> Result<Self, Error> {
        if sample_rate == 0 || max_block_size == 0 || channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "invalid convolver layout (sample rate {}, block size {}, channels {})",
                sample_rate, max_block_size, channel_count
            )));
        }
        if response.is_empty() || response.iter().all(|channel| channel.is_empty()) {
            return Err(Error::ParameterError(
                "impulse response is empty".to_string(),
            ));
        }

        // bring the response to the engine's sample rate
        let resampled;
        let response: &[Vec<f32>] = if response_sample_rate != sample_rate {
            resampled = resample_buffer(response, response_sample_rate, sample_rate)?;
            &resampled
        } else {
            response
        };

        let fft_size = 2 * max_block_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let response_length = response
            .iter()
            .map(|channel| channel.len())
            .max()
            .unwrap_or(0);
        let partition_count = response_length.div_ceil(max_block_size).max(1);

        // split every channel into zero padded partitions and transform them once
        let mut fft_in = vec![0.0_f32; fft_size];
        let mut forward_scratch = forward.make_scratch_vec();
        let mut partitions = Vec::with_capacity(channel_count);
        for channel_index in 0..channel_count {
            let source = &response[channel_index.min(response.len() - 1)];
            let mut channel_partitions = Vec::with_capacity(partition_count);
            for partition_index in 0..partition_count {
                let start = (partition_index * max_block_size).min(source.len());
                let end = (start + max_block_size).min(source.len());
                fft_in.fill(0.0);
                fft_in[..end - start].copy_from_slice(&source[start..end]);
                let mut spectrum = forward.make_output_vec();
                forward
                    .process_with_scratch(&mut fft_in, &mut spectrum, &mut forward_scratch)
                    .expect("Failed to transform impulse response partition");
                channel_partitions.push(spectrum);
            }
            partitions.push(channel_partitions);
        }

        let spectrum_size = forward.complex_len();
        Ok(Self {
            sample_rate,
            max_block_size,
            channel_count,
            fft_size,
            partitions,
            delay_lines: vec![
                vec![vec![Complex::new(0.0, 0.0); spectrum_size]; partition_count];
                channel_count
            ],
            delay_pos: 0,
            inputs: vec![vec![0.0; fft_size]; channel_count],
            fft_in,
            fft_out: inverse.make_output_vec(),
            spectrum_in: forward.make_output_vec(),
            spectrum_sum: forward.make_output_vec(),
            forward_scratch,
            inverse_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
        })
    }

    /// Sample rate, maximum block size and channel count this engine was built for.
    pub fn spec(&self) -> (u32, usize, usize) {
        (self.sample_rate, self.max_block_size, self.channel_count)
    }

    /// Number of partitions the impulse response was split into.
    pub fn partition_count(&self) -> usize {
        self.partitions[0].len()
    }

    /// Convolve an interleaved block in place with the configured impulse response.
    pub fn process(&mut self, output: &mut [f32]) {
        let channel_count = self.channel_count;
        if channel_count == 0 || output.is_empty() {
            return;
        }
        let frames = (output.len() / channel_count).min(self.max_block_size);
        debug_assert!(
            output.len() <= self.max_block_size * channel_count,
            "Unexpected block size"
        );

        let block_size = self.max_block_size;
        let partition_count = self.partitions[0].len();
        let scale = 1.0 / self.fft_size as f32;

        for channel_index in 0..channel_count {
            // slide the input window one block and append the new samples
            {
                let input = &mut self.inputs[channel_index];
                input.copy_within(block_size.., 0);
                let current = &mut input[block_size..];
                for frame in 0..frames {
                    current[frame] = output[frame * channel_count + channel_index];
                }
                if frames < block_size {
                    current[frames..].fill(0.0);
                }
            }

            // buffer sizes are fixed at construction, so the transforms cannot fail
            self.fft_in.copy_from_slice(&self.inputs[channel_index]);
            self.forward
                .process_with_scratch(
                    &mut self.fft_in,
                    &mut self.spectrum_in,
                    &mut self.forward_scratch,
                )
                .expect("Failed to transform input block");
            self.delay_lines[channel_index][self.delay_pos].copy_from_slice(&self.spectrum_in);

            // accumulate the products of past input spectra with their response partitions
            self.spectrum_sum.fill(Complex::new(0.0, 0.0));
            for partition_index in 0..partition_count {
                let delay_index =
                    (self.delay_pos + partition_count - partition_index) % partition_count;
                let delayed = &self.delay_lines[channel_index][delay_index];
                let partition = &self.partitions[channel_index][partition_index];
                for (sum, (input, response)) in self
                    .spectrum_sum
                    .iter_mut()
                    .zip(delayed.iter().zip(partition.iter()))
                {
                    *sum += *input * *response;
                }
            }

            // DC and nyquist bins must stay purely real for the inverse transform
            let nyquist = self.spectrum_sum.len() - 1;
            self.spectrum_sum[0].im = 0.0;
            self.spectrum_sum[nyquist].im = 0.0;
            self.inverse
                .process_with_scratch(
                    &mut self.spectrum_sum,
                    &mut self.fft_out,
                    &mut self.inverse_scratch,
                )
                .expect("Failed to transform output block");

            // overlap-save: the first half of the result is circular garbage
            for frame in 0..frames {
                output[frame * channel_count + channel_index] =
                    self.fft_out[block_size + frame] * scale;
            }
        }
        self.delay_pos = (self.delay_pos + 1) % partition_count;
    }

    /// Clear all overlap state, as if no audio had been processed yet.
    pub fn reset(&mut self) {
        for channel in self.delay_lines.iter_mut() {
            for slot in channel.iter_mut() {
                slot.fill(Complex::new(0.0, 0.0));
            }
        }
        for input in self.inputs.iter_mut() {
            clear_buffer(input);
        }
        self.delay_pos = 0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run_blocks(convolver: &mut Convolver, input: &[f32], block_size: usize) -> Vec<f32> {
        let (_, _, channel_count) = convolver.spec();
        let mut output = input.to_vec();
        for chunk in output.chunks_mut(block_size * channel_count) {
            convolver.process(chunk);
        }
        output
    }

    #[test]
    fn unit_impulse_response_is_identity() {
        let response = vec![vec![1.0_f32]];
        let mut convolver = Convolver::new(&response, 44100, 44100, 64, 1).unwrap();
        assert_eq!(convolver.partition_count(), 1);

        let input: Vec<f32> = (0..256).map(|index| (index as f32 * 0.1).sin()).collect();
        let output = run_blocks(&mut convolver, &input, 64);
        for (index, (a, b)) in input.iter().zip(output.iter()).enumerate() {
            assert!(
                (a - b).abs() < 1e-4,
                "identity mismatch at {}: {} vs {}",
                index,
                a,
                b
            );
        }
    }

    #[test]
    fn delayed_impulse_spans_partitions() {
        // a single tap in the second partition delays the signal by a block plus two samples
        let block_size = 32;
        let delay = block_size + 2;
        let mut response = vec![vec![0.0_f32; delay + 1]];
        response[0][delay] = 1.0;

        let mut convolver = Convolver::new(&response, 48000, 48000, block_size, 1).unwrap();
        assert_eq!(convolver.partition_count(), 2);

        let mut input = vec![0.0_f32; block_size * 4];
        input[3] = 1.0;
        let output = run_blocks(&mut convolver, &input, block_size);
        for (index, sample) in output.iter().enumerate() {
            let expected = if index == 3 + delay { 1.0 } else { 0.0 };
            assert!(
                (sample - expected).abs() < 1e-4,
                "unexpected sample {} at {}",
                sample,
                index
            );
        }
    }

    #[test]
    fn stereo_channels_use_their_own_response() {
        let response = vec![vec![0.5_f32], vec![0.25_f32]];
        let mut convolver = Convolver::new(&response, 44100, 44100, 16, 2).unwrap();

        let mut buffer = vec![0.0_f32; 16 * 2];
        buffer[0] = 1.0;
        buffer[1] = 1.0;
        convolver.process(&mut buffer);
        assert!((buffer[0] - 0.5).abs() < 1e-4);
        assert!((buffer[1] - 0.25).abs() < 1e-4);
        assert!(buffer[2].abs() < 1e-4 && buffer[3].abs() < 1e-4);
    }

    #[test]
    fn mono_response_feeds_all_channels() {
        let response = vec![vec![0.5_f32]];
        let mut convolver = Convolver::new(&response, 44100, 44100, 16, 2).unwrap();

        let mut buffer = vec![0.0_f32; 16 * 2];
        buffer[0] = 1.0;
        buffer[1] = -1.0;
        convolver.process(&mut buffer);
        assert!((buffer[0] - 0.5).abs() < 1e-4);
        assert!((buffer[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn reset_clears_the_tail() {
        // the tap at sample three pushes the impulse into the following block
        let response = vec![vec![0.0_f32, 0.0, 0.0, 1.0]];
        let mut convolver = Convolver::new(&response, 44100, 44100, 4, 1).unwrap();

        let mut block = vec![0.0_f32, 0.0, 1.0, 0.0];
        convolver.process(&mut block);
        assert!(block.iter().all(|sample| sample.abs() < 1e-4));

        convolver.reset();
        let mut silence = vec![0.0_f32; 4];
        convolver.process(&mut silence);
        assert!(silence.iter().all(|sample| sample.abs() < 1e-6));
    }

    #[test]
    fn rejects_empty_responses_and_layouts() {
        assert!(Convolver::new(&[], 44100, 44100, 64, 1).is_err());
        assert!(Convolver::new(&[vec![]], 44100, 44100, 64, 1).is_err());
        assert!(Convolver::new(&[vec![1.0]], 44100, 44100, 0, 1).is_err());
        assert!(Convolver::new(&[vec![1.0]], 44100, 44100, 64, 0).is_err());
    }
}
