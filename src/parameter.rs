//! Amp parameter ids, descriptors and value holders.

use std::fmt::Debug;

use strum::{Display, EnumIter, EnumString};

// -------------------------------------------------------------------------------------------------

/// Identifies a single amp parameter. The string representation doubles as the parameter's
/// key in persisted state, so variant names must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ParameterId {
    /// Input gain in dB, applied before any filtering.
    Input,
    /// Distortion amount, scaling the waveshaper's input.
    Drive,
    /// Low shelf gain in dB.
    Low,
    /// Mid peak gain in dB.
    Mid,
    /// High peak gain in dB.
    High,
    /// Output gain in dB, applied after the cabinet stage.
    Output,
    /// Treble boost toggle for the bright voicing filter.
    Bright,
    /// Cabinet simulation toggle.
    Cab,
    /// Oversampling mode selector. Recorded, but does not alter the processing path.
    Menu,
}

// -------------------------------------------------------------------------------------------------

/// Describes the type of a [`Parameter`] to e.g. select a proper visual representation in a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    /// A continuous floating-point value.
    Float {
        range: std::ops::RangeInclusive<f32>,
        default: f32,
    },
    /// A discrete integer value.
    Integer {
        range: std::ops::RangeInclusive<i32>,
        default: i32,
    },
    /// A boolean toggle.
    Boolean { default: bool },
}

// -------------------------------------------------------------------------------------------------

/// Describes a single amp parameter for use in UIs or by a plugin host.
pub trait Parameter: Debug {
    /// The unique id of the parameter.
    fn id(&self) -> ParameterId;

    /// The name of the parameter.
    fn name(&self) -> &'static str;

    /// The parameter type.
    fn parameter_type(&self) -> ParameterType;

    /// Default value of the parameter, expressed as a normalized value in range \[0, 1\].
    fn normalized_default_value(&self) -> f32;

    /// Convert the given normalized value to a display string.
    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String;

    /// Convert the given display string to a normalized value.
    /// Returns `None` when conversion failed, else a valid normalized value.
    fn string_to_normalized_value(&self, string: &str) -> Option<f32>;
}

/// Allows creating `dyn Parameter` clones.
pub trait ClonableParameter: Parameter {
    /// Create a dyn Parameter clone, wrapped into a box.
    fn dyn_clone(&self) -> Box<dyn Parameter>;
}

impl<P> ClonableParameter for P
where
    P: Parameter + Clone + 'static,
{
    fn dyn_clone(&self) -> Box<dyn Parameter> {
        Box::new(Self::clone(self))
    }
}

// -------------------------------------------------------------------------------------------------

mod float;
pub use float::{FloatParameter, FloatParameterValue};

mod integer;
pub use integer::{IntegerParameter, IntegerParameterValue};

mod boolean;
pub use boolean::{BooleanParameter, BooleanParameterValue};

// -------------------------------------------------------------------------------------------------

/// Current values of all amp parameters, with their descriptors.
///
/// Hosts deliver every parameter as a plain float: [`AmpParams::set`] converts and clamps the
/// value as needed for the addressed parameter, so out of range or mistyped host values can
/// never corrupt the bundle.
#[derive(Debug, Clone)]
pub struct AmpParams {
    pub input: FloatParameterValue,
    pub drive: FloatParameterValue,
    pub low: FloatParameterValue,
    pub mid: FloatParameterValue,
    pub high: FloatParameterValue,
    pub output: FloatParameterValue,
    pub bright: BooleanParameterValue,
    pub cab: BooleanParameterValue,
    pub menu: IntegerParameterValue,
}

impl AmpParams {
    pub const INPUT: FloatParameter =
        FloatParameter::new(ParameterId::Input, "Input", -24.0..=24.0, 0.0).with_unit("dB");
    pub const DRIVE: FloatParameter =
        FloatParameter::new(ParameterId::Drive, "Drive", 0.0..=10.0, 0.0);
    pub const LOW: FloatParameter =
        FloatParameter::new(ParameterId::Low, "Low", -6.0..=6.0, 0.0).with_unit("dB");
    pub const MID: FloatParameter =
        FloatParameter::new(ParameterId::Mid, "Mid", -6.0..=6.0, 0.0).with_unit("dB");
    pub const HIGH: FloatParameter =
        FloatParameter::new(ParameterId::High, "High", -6.0..=6.0, 0.0).with_unit("dB");
    pub const OUTPUT: FloatParameter =
        FloatParameter::new(ParameterId::Output, "Output", -24.0..=24.0, 0.0).with_unit("dB");
    pub const BRIGHT: BooleanParameter =
        BooleanParameter::new(ParameterId::Bright, "Bright", false);
    pub const CAB: BooleanParameter = BooleanParameter::new(ParameterId::Cab, "Cabinet", true);
    pub const MENU: IntegerParameter =
        IntegerParameter::new(ParameterId::Menu, "Oversampling", 0..=1, 0);

    /// Descriptors of all parameters, in declaration order.
    pub fn descriptions() -> Vec<Box<dyn Parameter>> {
        vec![
            Box::new(Self::INPUT),
            Box::new(Self::DRIVE),
            Box::new(Self::LOW),
            Box::new(Self::MID),
            Box::new(Self::HIGH),
            Box::new(Self::OUTPUT),
            Box::new(Self::BRIGHT),
            Box::new(Self::CAB),
            Box::new(Self::MENU),
        ]
    }

    /// Set a parameter from a plain float value. Boolean parameters treat values >= 0.5 as
    /// true, integer parameters round to the nearest step, and all values are clamped into
    /// the parameter's range.
    pub fn set(&mut self, id: ParameterId, value: f32) {
        match id {
            ParameterId::Input => self.input.set_value_clamped(value),
            ParameterId::Drive => self.drive.set_value_clamped(value),
            ParameterId::Low => self.low.set_value_clamped(value),
            ParameterId::Mid => self.mid.set_value_clamped(value),
            ParameterId::High => self.high.set_value_clamped(value),
            ParameterId::Output => self.output.set_value_clamped(value),
            ParameterId::Bright => self.bright.set_value(value >= 0.5),
            ParameterId::Cab => self.cab.set_value(value >= 0.5),
            ParameterId::Menu => self.menu.set_value_clamped(value.round() as i32),
        }
    }

    /// Get a parameter's current value as a plain float.
    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::Input => self.input.value(),
            ParameterId::Drive => self.drive.value(),
            ParameterId::Low => self.low.value(),
            ParameterId::Mid => self.mid.value(),
            ParameterId::High => self.high.value(),
            ParameterId::Output => self.output.value(),
            ParameterId::Bright => {
                if self.bright.value() {
                    1.0
                } else {
                    0.0
                }
            }
            ParameterId::Cab => {
                if self.cab.value() {
                    1.0
                } else {
                    0.0
                }
            }
            ParameterId::Menu => self.menu.value() as f32,
        }
    }
}

impl Default for AmpParams {
    fn default() -> Self {
        Self {
            input: FloatParameterValue::from_description(Self::INPUT),
            drive: FloatParameterValue::from_description(Self::DRIVE),
            low: FloatParameterValue::from_description(Self::LOW),
            mid: FloatParameterValue::from_description(Self::MID),
            high: FloatParameterValue::from_description(Self::HIGH),
            output: FloatParameterValue::from_description(Self::OUTPUT),
            bright: BooleanParameterValue::from_description(Self::BRIGHT),
            cab: BooleanParameterValue::from_description(Self::CAB),
            menu: IntegerParameterValue::from_description(Self::MENU),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        for id in ParameterId::iter() {
            let name = id.to_string();
            assert_eq!(name, name.to_lowercase());
            assert_eq!(ParameterId::from_str(&name).unwrap(), id);
        }
    }

    #[test]
    fn defaults_follow_the_schema() {
        let params = AmpParams::default();
        assert_eq!(params.get(ParameterId::Input), 0.0);
        assert_eq!(params.get(ParameterId::Drive), 0.0);
        assert_eq!(params.get(ParameterId::Low), 0.0);
        assert_eq!(params.get(ParameterId::Mid), 0.0);
        assert_eq!(params.get(ParameterId::High), 0.0);
        assert_eq!(params.get(ParameterId::Output), 0.0);
        assert_eq!(params.get(ParameterId::Bright), 0.0);
        assert_eq!(params.get(ParameterId::Cab), 1.0);
        assert_eq!(params.get(ParameterId::Menu), 0.0);
    }

    #[test]
    fn set_clamps_and_converts() {
        let mut params = AmpParams::default();

        params.set(ParameterId::Input, 99.0);
        assert_eq!(params.input.value(), 24.0);
        params.set(ParameterId::Low, -100.0);
        assert_eq!(params.low.value(), -6.0);

        params.set(ParameterId::Bright, 0.4);
        assert!(!params.bright.value());
        params.set(ParameterId::Bright, 0.6);
        assert!(params.bright.value());

        params.set(ParameterId::Menu, 5.0);
        assert_eq!(params.menu.value(), 1);
        params.set(ParameterId::Menu, 0.2);
        assert_eq!(params.menu.value(), 0);
    }

    #[test]
    fn descriptions_cover_all_ids() {
        let descriptions = AmpParams::descriptions();
        assert_eq!(descriptions.len(), ParameterId::iter().count());
        for (description, id) in descriptions.iter().zip(ParameterId::iter()) {
            assert_eq!(description.id(), id);
        }
    }
}
