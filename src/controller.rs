use std::{path::Path, sync::Arc};

use basedrop::{Collector, Owned};
use crossbeam_queue::ArrayQueue;
use strum::IntoEnumIterator;

use crate::{
    error::Error,
    ir::{ImpulseResponse, IrLoadOptions},
    parameter::{AmpParams, Parameter, ParameterId},
    processor::{AmpMessage, AmpProcessor, ProcessorLayout},
    state::AmpState,
    utils::dsp::convolver::Convolver,
};

// -------------------------------------------------------------------------------------------------

/// The control half of the amp simulation: owns the parameter mirror, stages impulse responses,
/// persists and restores state, and forwards everything as messages to its [`AmpProcessor`].
///
/// A controller and its processor are created as a pair with [`AmpController::new`]. The
/// processor is moved into the audio processing context; the controller stays on the control
/// context (UI or host main thread) and never touches audio buffers. Memory released by the
/// audio thread is reclaimed by calling [`cleanup`](Self::cleanup) periodically.
///
/// The cab toggle applies a loudness compensation policy: switching the cabinet simulation off
/// forces the output gain to a persisted compensation value (-16 dB until the user moves the
/// output control with the cabinet off), and switching it back on forces the output gain to
/// 0 dB. The policy runs here on the mirror and is forwarded as plain output-gain messages, so
/// the processor cannot diverge from the persisted state.
pub struct AmpController {
    params: AmpParams,
    cab_off_gain: f32,
    response: Arc<ImpulseResponse>,
    messages: Arc<ArrayQueue<AmpMessage>>,
    layout: Arc<ProcessorLayout>,
    collector: Collector,
}

impl AmpController {
    /// Create a new controller/processor pair with default parameters and the built-in default
    /// impulse response.
    pub fn new() -> (AmpController, AmpProcessor) {
        const MESSAGE_QUEUE_SIZE: usize = 1024;

        let collector = Collector::new();
        let messages = Arc::new(ArrayQueue::new(MESSAGE_QUEUE_SIZE));
        let layout = Arc::new(ProcessorLayout::new());
        let processor =
            AmpProcessor::new(Arc::clone(&messages), Arc::clone(&layout), &collector.handle());

        let controller = AmpController {
            params: AmpParams::default(),
            cab_off_gain: AmpState::DEFAULT_CAB_OFF_GAIN_DB,
            response: Arc::new(ImpulseResponse::default_response()),
            messages,
            layout,
            collector,
        };
        (controller, processor)
    }

    /// Descriptors of all amp parameters, for UIs and host parameter stores.
    pub fn descriptions() -> Vec<Box<dyn Parameter>> {
        AmpParams::descriptions()
    }

    /// The current value of the given parameter, in plain (unnormalized) form.
    pub fn parameter(&self, id: ParameterId) -> f32 {
        self.params.get(id)
    }

    /// Change a parameter value. The value is clamped against the descriptor range, applied to
    /// the controller's mirror and forwarded to the processor for the next audio block.
    ///
    /// Boolean parameters treat values >= 0.5 as on; the integer parameter is rounded.
    pub fn set_parameter(&mut self, id: ParameterId, value: f32) -> Result<(), Error> {
        match id {
            ParameterId::Output => {
                self.params.set(id, value);
                let clamped = self.params.output.value();
                // a manual output change with the cabinet off becomes the new compensation
                if !self.params.cab.value() {
                    self.cab_off_gain = clamped;
                }
                self.send_parameter(id, clamped)
            }
            ParameterId::Cab => {
                let was_enabled = self.params.cab.value();
                self.params.set(id, value);
                let enabled = self.params.cab.value();
                self.send_parameter(id, self.params.get(id))?;
                if enabled != was_enabled {
                    // compensate the loudness jump of the missing (or returning) cabinet
                    let forced_db = if enabled { 0.0 } else { self.cab_off_gain };
                    self.params.output.set_value_clamped(forced_db);
                    self.send_parameter(ParameterId::Output, self.params.output.value())?;
                }
                Ok(())
            }
            _ => {
                self.params.set(id, value);
                self.send_parameter(id, self.params.get(id))
            }
        }
    }

    /// The currently active impulse response.
    pub fn impulse_response(&self) -> &Arc<ImpulseResponse> {
        &self.response
    }

    /// Load a new cabinet impulse response from an audio file and hand it to the processor.
    /// On failure the previously active response stays in place.
    pub fn load_impulse_response_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        options: IrLoadOptions,
    ) -> Result<(), Error> {
        let response = ImpulseResponse::from_file(&path, options)?;
        log::debug!(
            "Loaded impulse response from file '{}'",
            path.as_ref().display()
        );
        self.publish_response(response)
    }

    /// Load a new cabinet impulse response from a raw media file buffer (a WAV, AIFF or FLAC
    /// file loaded into memory) and hand it to the processor. On failure the previously active
    /// response stays in place.
    pub fn load_impulse_response_buffer(
        &mut self,
        buffer: Vec<u8>,
        options: IrLoadOptions,
    ) -> Result<(), Error> {
        let response = ImpulseResponse::from_buffer(buffer, options)?;
        log::debug!("Loaded impulse response from buffer");
        self.publish_response(response)
    }

    /// Activate the built-in default impulse response.
    pub fn load_default_impulse_response(&mut self) -> Result<(), Error> {
        self.publish_response(ImpulseResponse::default_response())
    }

    /// Serialize the complete amp state, including the impulse response source, to a JSON
    /// document.
    pub fn save_state(&self) -> Result<String, Error> {
        let mut state = AmpState::from_params(&self.params);
        state.cab_off_gain = self.cab_off_gain;
        if let Some(path) = self.response.file_path() {
            state.file = path.to_string_lossy().into_owned();
            state.root = path
                .parent()
                .map(|parent| parent.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        state.to_json()
    }

    /// Restore a previously saved amp state.
    ///
    /// All parameter values are clamped and forwarded to the processor. The impulse response is
    /// reloaded from the stored file path; when the file no longer exists, the built-in default
    /// response is substituted. While the cabinet is off, the stored compensation gain wins over
    /// the stored output gain.
    pub fn restore_state(&mut self, json: &str) -> Result<(), Error> {
        let state = AmpState::from_json(json)?;

        state.apply_params(&mut self.params);
        self.cab_off_gain = state.cab_off_gain;
        if !self.params.cab.value() {
            self.params.output.set_value_clamped(self.cab_off_gain);
        }
        for id in ParameterId::iter() {
            self.send_parameter(id, self.params.get(id))?;
        }

        if state.file.is_empty() {
            self.load_default_impulse_response()
        } else if Path::new(&state.file).is_file() {
            self.load_impulse_response_file(&state.file, IrLoadOptions::default())
        } else {
            log::info!(
                "Impulse response file '{}' no longer exists: using the default response",
                state.file
            );
            self.load_default_impulse_response()
        }
    }

    /// Reclaim memory that the audio thread released. Should be called periodically from the
    /// control context, e.g. along UI updates or a timer.
    pub fn cleanup(&mut self) {
        self.collector.collect();
    }

    // Forward a single parameter change to the processor.
    fn send_parameter(&self, id: ParameterId, value: f32) -> Result<(), Error> {
        self.messages
            .push(AmpMessage::Parameter { id, value })
            .map_err(|_message| Self::message_queue_error("parameter"))
    }

    // Stage a response together with a convolution engine prebuilt for the processor's layout,
    // then publish both as one message. The controller's own mirror is updated only after the
    // message got through.
    fn publish_response(&mut self, response: ImpulseResponse) -> Result<(), Error> {
        let response = Arc::new(response);
        let convolver = self.stage_convolver(&response)?;
        let handle = self.collector.handle();
        self.messages
            .push(AmpMessage::ImpulseResponse {
                response: Owned::new(&handle, Arc::clone(&response)),
                convolver,
            })
            .map_err(|_message| Self::message_queue_error("impulse response"))?;
        self.response = response;
        Ok(())
    }

    // Build a convolution engine for the processor's prepared layout, or None while the
    // processor is not prepared (it then builds its own engine in the next prepare).
    fn stage_convolver(
        &self,
        response: &Arc<ImpulseResponse>,
    ) -> Result<Option<Owned<Convolver>>, Error> {
        let (sample_rate, max_block_size, channel_count) = self.layout.get();
        if channel_count == 0 {
            return Ok(None);
        }
        let convolver = Convolver::new(
            response.channels(),
            response.sample_rate(),
            sample_rate,
            max_block_size,
            channel_count,
        )?;
        Ok(Some(Owned::new(&self.collector.handle(), convolver)))
    }

    fn message_queue_error(event_name: &str) -> Error {
        log::warn!("Amp processor's message queue is full. Failed to send a {event_name} event.");
        Error::SendError("Amp processor's message queue is full".to_string())
    }
}

impl Drop for AmpController {
    fn drop(&mut self) {
        self.collector.collect();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    // Serialize a mono float WAV file into a byte buffer.
    fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).expect("Failed to create WAV writer");
        for &sample in samples {
            writer.write_sample(sample).expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize WAV writer");
        cursor.into_inner()
    }

    #[test]
    fn cab_toggle_forces_the_output_gain() {
        let (mut controller, _processor) = AmpController::new();
        assert_eq!(controller.parameter(ParameterId::Cab), 1.0);
        assert_eq!(controller.parameter(ParameterId::Output), 0.0);

        // switching off applies the default compensation
        controller
            .set_parameter(ParameterId::Cab, 0.0)
            .expect("Failed to set parameter");
        assert_eq!(
            controller.parameter(ParameterId::Output),
            AmpState::DEFAULT_CAB_OFF_GAIN_DB
        );

        // output moves with the cabinet off become the new compensation
        controller
            .set_parameter(ParameterId::Output, -10.0)
            .expect("Failed to set parameter");
        controller
            .set_parameter(ParameterId::Cab, 1.0)
            .expect("Failed to set parameter");
        assert_eq!(controller.parameter(ParameterId::Output), 0.0);
        controller
            .set_parameter(ParameterId::Cab, 0.0)
            .expect("Failed to set parameter");
        assert_eq!(controller.parameter(ParameterId::Output), -10.0);
    }

    #[test]
    fn repeated_cab_values_do_not_refire_the_policy() {
        let (mut controller, _processor) = AmpController::new();
        controller
            .set_parameter(ParameterId::Output, -3.0)
            .expect("Failed to set parameter");
        // cab is already on: setting it on again must not force the output gain back to 0
        controller
            .set_parameter(ParameterId::Cab, 1.0)
            .expect("Failed to set parameter");
        assert_eq!(controller.parameter(ParameterId::Output), -3.0);
    }

    #[test]
    fn state_round_trips_identically() {
        let (mut controller, _processor) = AmpController::new();
        controller
            .set_parameter(ParameterId::Drive, 7.5)
            .expect("Failed to set parameter");
        controller
            .set_parameter(ParameterId::Low, -6.0)
            .expect("Failed to set parameter");
        controller
            .set_parameter(ParameterId::Bright, 1.0)
            .expect("Failed to set parameter");
        controller
            .set_parameter(ParameterId::Cab, 0.0)
            .expect("Failed to set parameter");
        controller
            .set_parameter(ParameterId::Output, -12.0)
            .expect("Failed to set parameter");

        let json = controller.save_state().expect("Failed to save state");

        let (mut restored, _processor) = AmpController::new();
        restored.restore_state(&json).expect("Failed to restore state");
        for id in ParameterId::iter() {
            assert_eq!(
                restored.parameter(id),
                controller.parameter(id),
                "parameter '{id}' did not round trip"
            );
        }
        assert!(restored.impulse_response().file_path().is_none());
        assert_eq!(
            restored.save_state().expect("Failed to save state"),
            json,
            "a restored controller must save the same state again"
        );

        restored.cleanup();
    }

    #[test]
    fn restore_substitutes_missing_impulse_response_files() {
        let (mut controller, _processor) = AmpController::new();
        let state = AmpState {
            file: "/nonexistent/directory/cab.wav".to_string(),
            root: "/nonexistent/directory".to_string(),
            ..AmpState::default()
        };
        let json = state.to_json().expect("Failed to serialize state");

        controller
            .restore_state(&json)
            .expect("Failed to restore state");
        assert!(controller.impulse_response().file_path().is_none());
    }

    #[test]
    fn restore_rejects_unknown_versions() {
        let (mut controller, _processor) = AmpController::new();
        controller
            .set_parameter(ParameterId::Drive, 5.0)
            .expect("Failed to set parameter");

        let state = AmpState {
            version: crate::state::STATE_VERSION + 1,
            ..AmpState::default()
        };
        let json = state.to_json().expect("Failed to serialize state");
        assert!(matches!(
            controller.restore_state(&json),
            Err(Error::StateError(_))
        ));
        // a rejected restore leaves the controller untouched
        assert_eq!(controller.parameter(ParameterId::Drive), 5.0);
    }

    #[test]
    fn load_failures_keep_the_previous_response() {
        let (mut controller, _processor) = AmpController::new();
        let previous = Arc::clone(controller.impulse_response());

        let result = controller
            .load_impulse_response_buffer(vec![0xde; 128], IrLoadOptions::default());
        assert!(result.is_err());
        assert!(Arc::ptr_eq(controller.impulse_response(), &previous));

        let result = controller
            .load_impulse_response_file("/nonexistent/cab.wav", IrLoadOptions::default());
        assert!(matches!(result, Err(Error::MediaFileNotFound)));
        assert!(Arc::ptr_eq(controller.impulse_response(), &previous));
    }

    #[test]
    fn unit_impulse_responses_pass_the_chain_through() {
        // processor A: cabinet convolution with a unit impulse response
        let (mut controller_a, mut processor_a) = AmpController::new();
        processor_a.prepare(44100, 128, 1).expect("Failed to prepare");
        let mut unit = vec![0.0f32; 32];
        unit[0] = 1.0;
        controller_a
            .load_impulse_response_buffer(wav_bytes(&unit, 44100), IrLoadOptions::default())
            .expect("Failed to load impulse response");

        // processor B: cabinet bypassed, with the output gain moved back to unity
        let (mut controller_b, mut processor_b) = AmpController::new();
        processor_b.prepare(44100, 128, 1).expect("Failed to prepare");
        controller_b
            .set_parameter(ParameterId::Cab, 0.0)
            .expect("Failed to set parameter");
        controller_b
            .set_parameter(ParameterId::Output, 0.0)
            .expect("Failed to set parameter");

        // both must now process identically
        let mut rng = SmallRng::seed_from_u64(12345);
        for _ in 0..4 {
            let input: Vec<f32> = (0..128).map(|_| rng.random::<f32>() * 0.5 - 0.25).collect();
            let mut block_a = input.clone();
            let mut block_b = input;
            processor_a.process(&mut block_a);
            processor_b.process(&mut block_b);
            for (a, b) in block_a.iter().zip(&block_b) {
                assert!(
                    (a - b).abs() < 1e-4,
                    "unit response convolution deviates from bypass: {a} vs {b}"
                );
            }
        }
    }
}
