// -------------------------------------------------------------------------------------------------

/// Multiply every sample in the given interleaved buffer with the given factor.
pub fn scale_buffer(buffer: &mut [f32], factor: f32) {
    if factor == 1.0 {
        return;
    }
    for sample in buffer.iter_mut() {
        *sample *= factor;
    }
}

// -------------------------------------------------------------------------------------------------

/// Set every sample in the given buffer to zero.
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

// -------------------------------------------------------------------------------------------------

/// Copy the given interleaved buffer into a planar one.
/// The planar buffer's layout defines layout of the interleaved buffer (channel and frame count).
pub fn interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channel_count = planar.len();
    match channel_count {
        1 => {
            for (p, i) in planar[0].iter_mut().zip(interleaved) {
                *p = *i;
            }
        }
        2 => {
            let left = &mut planar[0];
            for (index, l) in left.iter_mut().enumerate() {
                *l = interleaved[index * 2];
            }
            let right = &mut planar[1];
            for (index, r) in right.iter_mut().enumerate() {
                *r = interleaved[index * 2 + 1];
            }
        }
        _ => {
            for (channel_index, channel_values) in planar.iter_mut().enumerate() {
                for (frame_index, value) in channel_values.iter_mut().enumerate() {
                    *value = interleaved[frame_index * channel_count + channel_index];
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_and_clear() {
        let mut buffer = vec![1.0, -2.0, 0.5, 4.0];
        scale_buffer(&mut buffer, 0.5);
        assert_eq!(buffer, vec![0.5, -1.0, 0.25, 2.0]);
        scale_buffer(&mut buffer, 1.0);
        assert_eq!(buffer, vec![0.5, -1.0, 0.25, 2.0]);
        clear_buffer(&mut buffer);
        assert_eq!(buffer, vec![0.0; 4]);
    }

    #[test]
    fn interleaved_planar() {
        // mono
        let interleaved_mono = vec![1.0, 2.0, 3.0, 4.0];
        let mut planar_mono = vec![vec![0.0; 4]];
        interleaved_to_planar(&interleaved_mono, &mut planar_mono);
        assert_eq!(planar_mono, vec![vec![1.0, 2.0, 3.0, 4.0]]);

        // stereo
        let interleaved_stereo = vec![1.0, 4.0, 2.0, 3.0, 3.0, 2.0, 4.0, 1.0];
        let mut planar_stereo = vec![vec![0.0; 4]; 2];
        interleaved_to_planar(&interleaved_stereo, &mut planar_stereo);
        assert_eq!(
            planar_stereo,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]]
        );

        // general
        let interleaved_general = vec![1.0, 4.0, 2.0, 2.0, 3.0, 1.0, 3.0, 2.0, 4.0, 4.0, 1.0, 3.0];
        let mut planar_general = vec![vec![0.0; 4]; 3];
        interleaved_to_planar(&interleaved_general, &mut planar_general);
        assert_eq!(
            planar_general,
            vec![
                vec![1.0, 2.0, 3.0, 4.0],
                vec![4.0, 3.0, 2.0, 1.0],
                vec![2.0, 1.0, 4.0, 3.0],
            ]
        );
    }
}
