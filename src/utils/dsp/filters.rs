//! Second order IIR filter implementations.

pub mod biquad;
