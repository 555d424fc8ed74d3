//! Common DSP helpers and conversion tools.

pub mod buffer;
pub mod decoder;
pub mod dsp;
pub mod resampler;

// -------------------------------------------------------------------------------------------------

const MINUS_INF_IN_DB: f32 = -200.0f32;

// -------------------------------------------------------------------------------------------------

macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {
        assert!(
            ($x - $y).abs() < $d,
            "assertion failed: `{}` differs from `{}` by more than `{}`",
            $x,
            $y,
            $d
        );
    };
}
pub(crate) use assert_eq_with_epsilon;

// -------------------------------------------------------------------------------------------------

pub fn linear_to_db(value: f32) -> f32 {
    if value == 1.0 {
        return 0.0; // avoid rounding errors at exactly 0 dB
    } else if value > 1e-12f32 {
        return value.ln() * (20.0f32 / std::f32::consts::LN_10);
    }
    MINUS_INF_IN_DB
}

// -------------------------------------------------------------------------------------------------

pub fn db_to_linear(value: f32) -> f32 {
    if value == 0.0f32 {
        return 1.0f32; // avoid rounding errors at exactly 0 dB
    } else if value > MINUS_INF_IN_DB {
        return (value * (std::f32::consts::LN_10 / 20.0f32)).exp();
    }
    0.0f32
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_db_conversion() {
        assert_eq!(linear_to_db(1.0), 0.0);
        assert_eq!(linear_to_db(0.0), MINUS_INF_IN_DB);
        assert_eq!(db_to_linear(MINUS_INF_IN_DB), 0.0);
        assert_eq!(db_to_linear(0.0), 1.0);
        assert_eq_with_epsilon!(linear_to_db(db_to_linear(20.0)), 20.0, 0.0001);
        assert_eq_with_epsilon!(linear_to_db(db_to_linear(-20.0)), -20.0, 0.0001);
    }
}
