use std::{f32, f64};

use strum::{Display, EnumIter, EnumString};

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Available filter types for the State Variable Filter.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Display, EnumIter, EnumString)]
pub enum BiquadFilterType {
    #[default]
    Highpass,
    Bell,
    Lowshelf,
}

// -------------------------------------------------------------------------------------------------

/// The coefficients that hold parameters and necessary data to process the filter.
///
/// Unlike common RBJ style designs, `gain` here is a plain linear amplitude factor and not a
/// decibel value: the amp's stage tables produce linear factors directly. Internally the shelf
/// and bell designs use `A = sqrt(gain)`.
///
/// See [BiquadFilter] for more info about the filter implementation.
#[derive(Default, Clone, PartialEq)]
pub struct BiquadFilterCoefficients {
    filter_type: BiquadFilterType,
    sample_rate: u32,
    cutoff: f32,
    q: f32,
    gain: f32,
    a1: f64,
    a2: f64,
    a3: f64,
    m0: f64,
    m1: f64,
    m2: f64,
}

impl BiquadFilterCoefficients {
    pub fn new(
        filter_type: BiquadFilterType,
        sample_rate: u32,
        cutoff: f32,
        q: f32,
        gain: f32,
    ) -> Result<Self, Error> {
        let mut coefficients = BiquadFilterCoefficients::default();
        coefficients.set(filter_type, sample_rate, cutoff, q, gain)?;
        Ok(coefficients)
    }

    /// Get currently applied filter type.
    pub fn filter_type(&self) -> BiquadFilterType {
        self.filter_type
    }

    /// Get currently applied sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The frequency in Hz where the cutoff of the filter is.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// The steepness of the filter.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// The linear gain factor. Only used by Bell and Lowshelf filters.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set a new linear gain factor, keeping type, sample rate, cutoff and q as they are.
    /// Must be > 0.0 for Bell and Lowshelf filters.
    pub fn set_gain(&mut self, gain: f32) -> Result<(), Error> {
        if self.gain != gain {
            self.gain = gain;
            self.apply()
        } else {
            Ok(())
        }
    }

    /// Sets and applies a batch of new filter parameters.
    pub fn set(
        &mut self,
        filter_type: BiquadFilterType,
        sample_rate: u32,
        cutoff: f32,
        q: f32,
        gain: f32,
    ) -> Result<(), Error> {
        if self.filter_type != filter_type
            || self.sample_rate != sample_rate
            || self.cutoff != cutoff
            || self.q != q
            || self.gain != gain
        {
            self.filter_type = filter_type;
            self.sample_rate = sample_rate;
            self.cutoff = cutoff;
            self.q = q;
            self.gain = gain;
            self.apply()
        } else {
            Ok(())
        }
    }

    /// Recompute internal coefficients from the current filter parameters.
    fn apply(&mut self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter sample-rate: must be > 0, but is {s}",
                s = self.sample_rate
            )));
        }
        if self.q <= 0.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter Q: must be > 0, but is {q}",
                q = self.q
            )));
        }
        if self.cutoff >= self.sample_rate as f32 / 2.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter frequency: must be < nyquist {n}, but is {f}",
                n = self.sample_rate as f32 / 2.0,
                f = self.cutoff
            )));
        }
        if self.filter_type != BiquadFilterType::Highpass && self.gain <= 0.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter gain: must be a linear factor > 0, but is {g}",
                g = self.gain
            )));
        }
        match self.filter_type {
            BiquadFilterType::Highpass => {
                let g = f64::tan(f64::consts::PI * self.cutoff as f64 / self.sample_rate as f64);
                let k = 1.0 / self.q as f64;
                self.a1 = 1.0 / (1.0 + g * (g + k));
                self.a2 = g * self.a1;
                self.a3 = g * self.a2;
                self.m0 = 1.0;
                self.m1 = -k;
                self.m2 = -1.0;
            }
            BiquadFilterType::Bell => {
                let a = f64::sqrt(self.gain as f64);
                let g = f64::tan(f64::consts::PI * self.cutoff as f64 / self.sample_rate as f64);
                let k = 1.0 / (self.q as f64 * a);
                self.a1 = 1.0 / (1.0 + g * (g + k));
                self.a2 = g * self.a1;
                self.a3 = g * self.a2;
                self.m0 = 1.0;
                self.m1 = k * (a * a - 1.0);
                self.m2 = 0.0;
            }
            BiquadFilterType::Lowshelf => {
                let a = f64::sqrt(self.gain as f64);
                let g = f64::tan(f64::consts::PI * self.cutoff as f64 / self.sample_rate as f64)
                    / f64::sqrt(a);
                let k = 1.0 / self.q as f64;
                self.a1 = 1.0 / (1.0 + g * (g + k));
                self.a2 = g * self.a1;
                self.a3 = g * self.a2;
                self.m0 = 1.0;
                self.m1 = k * (a - 1.0);
                self.m2 = a * a - 1.0;
            }
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// State variable biquad filter, designed by Andrew Simper of Cytomic.
/// See <http://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
///
/// The frequency response of this filter is the same as of BZT filters.
///
/// This is a second-order filter. It has a cutoff slope of 12 dB/octave. Q = 0.707 means no
/// resonant peaking. This filter will self-oscillate when Q is very high.
///
/// This filter is stable when modulated at high rates.
#[derive(Default, Clone)]
pub struct BiquadFilter {
    ic1eq: f64,
    ic2eq: f64,
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    /// Process helper function that calls `process_sample` for each sample in a buffer.
    #[inline]
    pub fn process<'a>(
        &mut self,
        coefficients: &BiquadFilterCoefficients,
        output: impl Iterator<Item = &'a mut f32>,
    ) {
        for sample in output {
            *sample = self.process_sample(coefficients, *sample as f64) as f32;
        }
    }

    /// Apply the filter on a single sample.
    #[inline]
    pub fn process_sample(&mut self, coefficients: &BiquadFilterCoefficients, input: f64) -> f64 {
        let v0 = input;
        let v3 = v0 - self.ic2eq;
        let v1 = coefficients.a1 * self.ic1eq + coefficients.a2 * v3;
        let v2 = self.ic2eq + coefficients.a2 * self.ic1eq + coefficients.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        coefficients.m0 * v0 + coefficients.m1 * v1 + coefficients.m2 * v2
    }

    /// Reset state of filter.
    /// Can be used when the audio callback is restarted.
    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    // Run a sine of the given frequency through a freshly designed filter and measure the output
    // peak after the filter settled.
    fn measure_sine_peak(coefficients: &BiquadFilterCoefficients, frequency: f32) -> f32 {
        let sample_rate = coefficients.sample_rate();
        let mut filter = BiquadFilter::new();
        let mut peak = 0.0f32;
        let length = 2 * sample_rate as usize;
        for i in 0..length {
            let phase = i as f32 * frequency * 2.0 * f32::consts::PI / sample_rate as f32;
            let output = filter.process_sample(coefficients, phase.sin() as f64) as f32;
            if i > length / 2 {
                peak = peak.max(output.abs());
            }
        }
        peak
    }

    #[test]
    fn deterministic_design() {
        for filter_type in BiquadFilterType::iter() {
            let a =
                BiquadFilterCoefficients::new(filter_type, 48000, 1420.0, 0.5, 6.0).unwrap();
            let b =
                BiquadFilterCoefficients::new(filter_type, 48000, 1420.0, 0.5, 6.0).unwrap();
            assert!(a == b, "identical designs must yield identical coefficients");
        }
    }

    #[test]
    fn invalid_parameters() {
        assert!(BiquadFilterCoefficients::new(BiquadFilterType::Bell, 0, 815.0, 0.3, 1.0).is_err());
        assert!(
            BiquadFilterCoefficients::new(BiquadFilterType::Bell, 44100, 815.0, 0.0, 1.0).is_err()
        );
        assert!(BiquadFilterCoefficients::new(
            BiquadFilterType::Highpass,
            44100,
            23000.0,
            0.7,
            1.0
        )
        .is_err());
        assert!(
            BiquadFilterCoefficients::new(BiquadFilterType::Lowshelf, 44100, 200.0, 1.3, 0.0)
                .is_err()
        );
    }

    #[test]
    fn rejected_design_keeps_previous_coefficients() {
        let mut coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Bell, 44100, 815.0, 0.3, 2.0).unwrap();
        let reference = BiquadFilter::new().process_sample(&coefficients, 1.0);
        assert!(coefficients.set_gain(-1.0).is_err());
        let after = BiquadFilter::new().process_sample(&coefficients, 1.0);
        assert_eq!(reference, after);
    }

    #[test]
    fn highpass_response() {
        let coefficients = BiquadFilterCoefficients::new(
            BiquadFilterType::Highpass,
            44100,
            200.0,
            f32::consts::FRAC_1_SQRT_2,
            1.0,
        )
        .unwrap();
        let stop_band = measure_sine_peak(&coefficients, 25.0);
        let pass_band = measure_sine_peak(&coefficients, 2000.0);
        assert!(stop_band < 0.1, "expected strong attenuation below cutoff");
        assert!(pass_band > 0.9, "expected pass band to remain untouched");
    }

    #[test]
    fn bell_gain_at_center() {
        let gain = 10.0f32.powf(6.0 * 0.05);
        let coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Bell, 44100, 815.0, 2.0, gain).unwrap();
        let peak = measure_sine_peak(&coefficients, 815.0);
        assert_eq_with_epsilon!(peak, gain, 0.1);
    }

    #[test]
    fn lowshelf_gain_below_cutoff() {
        let gain = 10.0f32.powf(6.0 * 0.05);
        let coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Lowshelf, 44100, 200.0, 1.3, gain)
                .unwrap();
        let peak = measure_sine_peak(&coefficients, 30.0);
        assert_eq_with_epsilon!(peak, gain, 0.15);
    }
}
