// -------------------------------------------------------------------------------------------------

/// The waveshaper's front factor uses this truncated value instead of `f32::consts::PI`.
/// The constant is part of the amp's voicing, so it stays at this precision.
const PI_APPROX: f32 = 3.14;

// -------------------------------------------------------------------------------------------------

/// Memoryless diode clipping waveshaper.
///
/// Each sample runs through an exponential Shockley diode response followed by an atan soft
/// limiter. The limiter input is scaled by a coefficient derived from the drive parameter,
/// `10^(drive/4)`, so drive 0 leaves the shaped signal unscaled.
///
/// There is no cross-sample state: channels and samples are shaped independently, and output
/// magnitude stays below `PI/3.14` for any finite input.
#[derive(Debug, Clone)]
pub struct DiodeClipper {
    drive_scaled: f32,
}

impl DiodeClipper {
    /// Creates a new clipper with the drive parameter at 0.
    pub fn new() -> Self {
        Self { drive_scaled: 1.0 }
    }

    /// Set a new drive parameter value and derive the internal drive coefficient from it.
    pub fn set_drive(&mut self, drive: f32) {
        self.drive_scaled = 10.0f32.powf(drive * 0.25);
    }

    /// The drive coefficient derived from the last applied drive parameter value.
    pub fn drive_scaled(&self) -> f32 {
        self.drive_scaled
    }

    #[inline]
    fn shape(sample: f32, drive_scaled: f32) -> f32 {
        let diode_clipping = ((0.1 * sample) / (0.0253 * 1.68)).exp() - 1.0;
        2.0 / PI_APPROX * (diode_clipping * drive_scaled * 16.0).atan()
    }

    /// Shape all samples of all channels in the given interleaved buffer in place.
    pub fn process(&self, output: &mut [f32]) {
        let drive_scaled = self.drive_scaled;
        for sample in output.iter_mut() {
            *sample = Self::shape(*sample, drive_scaled);
        }
    }
}

impl Default for DiodeClipper {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_coefficient() {
        let mut clipper = DiodeClipper::new();
        assert_eq!(clipper.drive_scaled(), 1.0);

        let mut previous = 0.0;
        for step in 0..=100 {
            clipper.set_drive(step as f32 * 0.1);
            assert!(
                clipper.drive_scaled() > previous,
                "drive coefficient must increase strictly with the drive parameter"
            );
            previous = clipper.drive_scaled();
        }
        clipper.set_drive(10.0);
        assert_eq!(clipper.drive_scaled(), 10.0f32.powf(2.5));
    }

    #[test]
    fn output_is_bounded() {
        let bound = std::f32::consts::PI / PI_APPROX + 1e-6;
        let mut clipper = DiodeClipper::new();
        for drive in [0.0, 2.5, 10.0] {
            clipper.set_drive(drive);
            let mut buffer = vec![0.0, 1e-3, -1e-3, 0.5, -0.5, 1.0, -1.0, 100.0, -100.0, 1e6];
            clipper.process(&mut buffer);
            for sample in buffer {
                assert!(sample.is_finite());
                assert!(
                    sample.abs() <= bound,
                    "shaped sample {sample} exceeds the atan limiter bound"
                );
            }
        }
    }

    #[test]
    fn silence_stays_silent() {
        let mut buffer = vec![0.0; 64];
        let mut clipper = DiodeClipper::new();
        clipper.set_drive(10.0);
        clipper.process(&mut buffer);
        assert!(buffer.iter().all(|&sample| sample == 0.0));
    }
}
