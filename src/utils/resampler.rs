//! Offline sinc resampling for planar audio buffers.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::Error;

// -------------------------------------------------------------------------------------------------

// input frames fed into the sinc resampler per process call
const CHUNK_SIZE: usize = 1024;

/// Resample a planar buffer from `input_rate` to `output_rate` in one go, using a high quality
/// windowed sinc interpolation. All channels must have the same length. The resampler's output
/// delay is compensated, so the result is time aligned with the input and has a length of
/// `ceil(input_length * output_rate / input_rate)` frames per channel.
///
/// Returns an unmodified copy when both rates already match.
pub fn resample_buffer(
    input: &[Vec<f32>],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<Vec<f32>>, Error> {
    if input_rate == 0 || output_rate == 0 {
        return Err(Error::ParameterError(format!(
            "invalid resampling rates ({} -> {})",
            input_rate, output_rate
        )));
    }
    let input_length = input.first().map(Vec::len).unwrap_or(0);
    if input.iter().any(|channel| channel.len() != input_length) {
        return Err(Error::ParameterError(
            "resampling channels have different lengths".to_string(),
        ));
    }
    if input_rate == output_rate || input.is_empty() || input_length == 0 {
        return Ok(input.to_vec());
    }

    let channel_count = input.len();
    let ratio = output_rate as f64 / input_rate as f64;
    let parameters = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, parameters, CHUNK_SIZE, channel_count)
        .map_err(|err| Error::ResamplingError(Box::new(err)))?;

    let output_length = (input_length as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = (0..channel_count)
        .map(|_| Vec::with_capacity(output_length + delay))
        .collect();
    let mut process_buffer = resampler.output_buffer_allocate(true);

    // feed all complete chunks
    let mut position = 0;
    while position + resampler.input_frames_next() <= input_length {
        let frames = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = input
            .iter()
            .map(|channel| &channel[position..position + frames])
            .collect();
        let (consumed, written) = resampler
            .process_into_buffer(&chunk, &mut process_buffer, None)
            .map_err(|err| Error::ResamplingError(Box::new(err)))?;
        for (channel, processed) in output.iter_mut().zip(process_buffer.iter()) {
            channel.extend_from_slice(&processed[..written]);
        }
        position += consumed;
    }

    // feed the remaining frames, then flush the resampler's delay line
    while output[0].len() < output_length + delay {
        let (consumed, written) = if position < input_length {
            let chunk: Vec<&[f32]> = input.iter().map(|channel| &channel[position..]).collect();
            resampler.process_partial_into_buffer(Some(&chunk), &mut process_buffer, None)
        } else {
            resampler.process_partial_into_buffer(None::<&[&[f32]]>, &mut process_buffer, None)
        }
        .map_err(|err| Error::ResamplingError(Box::new(err)))?;
        for (channel, processed) in output.iter_mut().zip(process_buffer.iter()) {
            channel.extend_from_slice(&processed[..written]);
        }
        position += consumed;
    }

    // compensate the sinc filter's delay and trim to the expected length
    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(output_length);
    }
    Ok(output)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, length: usize) -> Vec<f32> {
        (0..length)
            .map(|index| {
                (index as f32 * frequency * 2.0 * std::f32::consts::PI / sample_rate as f32).sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|sample| sample * sample).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn passthrough_at_equal_rates() {
        let input = vec![sine(440.0, 44100, 512)];
        let output = resample_buffer(&input, 44100, 44100).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn downsampling_preserves_length_and_level() {
        let input = vec![sine(1000.0, 44100, 8192)];
        let output = resample_buffer(&input, 44100, 22050).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].len(), 4096);

        // compare levels in the middle of the buffers to skip filter edge transients
        let input_rms = rms(&input[0][2048..6144]);
        let output_rms = rms(&output[0][1024..3072]);
        assert!(
            (input_rms - output_rms).abs() < 0.1 * input_rms,
            "unexpected level change: {} vs {}",
            input_rms,
            output_rms
        );
    }

    #[test]
    fn upsampling_preserves_length() {
        let input = vec![sine(440.0, 22050, 1000)];
        let output = resample_buffer(&input, 22050, 44100).unwrap();
        assert_eq!(output[0].len(), 2000);
    }

    #[test]
    fn channels_stay_independent() {
        let input = vec![sine(440.0, 44100, 4096), vec![0.0; 4096]];
        let output = resample_buffer(&input, 44100, 48000).unwrap();
        assert!(rms(&output[0]) > 0.1);
        assert!(rms(&output[1]) < 1e-3);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(resample_buffer(&[vec![0.0; 16]], 0, 44100).is_err());
        assert!(resample_buffer(&[vec![0.0; 16]], 44100, 0).is_err());
        assert!(resample_buffer(&[vec![0.0; 16], vec![0.0; 8]], 44100, 48000).is_err());
    }
}
