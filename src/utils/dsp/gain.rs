use crate::utils::{buffer::scale_buffer, db_to_linear, linear_to_db};

// -------------------------------------------------------------------------------------------------

/// Scalar gain over an interleaved multichannel buffer, set in decibels.
///
/// Gain changes take effect with the next processed block: the chain applies parameters at
/// block granularity, so there is no per-sample ramping here.
#[derive(Debug, Clone)]
pub struct GainStage {
    gain: f32,
}

impl GainStage {
    /// Creates a new stage at unity gain (0 dB).
    pub fn new() -> Self {
        Self { gain: 1.0 }
    }

    /// Creates a new stage with the given gain in decibels.
    pub fn with_gain_db(gain_db: f32) -> Self {
        let mut stage = Self::new();
        stage.set_gain_db(gain_db);
        stage
    }

    /// Set a new gain, given in decibels.
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain = db_to_linear(gain_db);
    }

    /// The current gain as linear factor.
    #[inline(always)]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// The current gain in decibels.
    pub fn gain_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    /// Scale all samples of all channels in the given interleaved buffer.
    pub fn process(&self, output: &mut [f32]) {
        scale_buffer(output, self.gain);
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    #[test]
    fn db_roundtrip() {
        let mut stage = GainStage::new();
        assert_eq!(stage.gain(), 1.0);
        assert_eq!(stage.gain_db(), 0.0);

        stage.set_gain_db(6.0);
        assert_eq_with_epsilon!(stage.gain(), 1.9952623, 0.0001);
        assert_eq_with_epsilon!(stage.gain_db(), 6.0, 0.0001);

        stage.set_gain_db(-24.0);
        assert_eq_with_epsilon!(stage.gain_db(), -24.0, 0.0001);
    }

    #[test]
    fn scales_in_place() {
        let mut buffer = vec![1.0, -1.0, 0.5, -0.25];
        let stage = GainStage::with_gain_db(-6.0);
        stage.process(&mut buffer);
        let factor = db_to_linear(-6.0);
        assert_eq!(buffer, vec![factor, -factor, 0.5 * factor, -0.25 * factor]);
    }
}
