//! Shared DSP building blocks for the amp's signal chain.

pub mod convolver;
pub mod filters;
pub mod gain;
pub mod waveshaper;
