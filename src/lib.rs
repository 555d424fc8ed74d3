#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod controller;
mod error;
mod ir;
mod parameter;
mod processor;
mod state;

// public, flat re-exports
pub use controller::AmpController;
pub use error::Error;
pub use ir::{ImpulseResponse, IrLoadOptions};
pub use parameter::{
    AmpParams, BooleanParameter, BooleanParameterValue, ClonableParameter, FloatParameter,
    FloatParameterValue, IntegerParameter, IntegerParameterValue, Parameter, ParameterId,
    ParameterType,
};
pub use processor::AmpProcessor;
pub use state::{AmpState, STATE_VERSION};

// public mods
pub mod utils;
