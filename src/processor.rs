use std::{
    f32,
    ops::Range,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
};

use basedrop::{Handle, Owned};
use crossbeam_queue::ArrayQueue;

use crate::{
    error::Error,
    ir::ImpulseResponse,
    parameter::{AmpParams, ParameterId},
    utils::{
        db_to_linear,
        dsp::{
            convolver::Convolver,
            filters::biquad::{BiquadFilter, BiquadFilterCoefficients, BiquadFilterType},
            gain::GainStage,
            waveshaper::DiodeClipper,
        },
    },
};

// -------------------------------------------------------------------------------------------------

/// Messages sent from an [`AmpController`](crate::AmpController) to its [`AmpProcessor`].
///
/// Payloads that own heap memory are wrapped in [`Owned`], so dropping a drained message on the
/// audio thread defers the actual deallocation to the controller's garbage collector.
pub(crate) enum AmpMessage {
    /// Apply a single parameter change.
    Parameter { id: ParameterId, value: f32 },
    /// Swap the active impulse response. When the controller knows the processor's prepared
    /// layout, it stages a ready-to-use convolution engine along with the raw response.
    ImpulseResponse {
        response: Owned<Arc<ImpulseResponse>>,
        convolver: Option<Owned<Convolver>>,
    },
}

// -------------------------------------------------------------------------------------------------

/// Playback layout the processor was last prepared with, shared with the control context.
///
/// The controller reads this to stage impulse responses into ready-to-use convolution engines
/// without asking the audio thread. A channel count of zero means "not prepared yet".
pub(crate) struct ProcessorLayout {
    sample_rate: AtomicU32,
    max_block_size: AtomicUsize,
    channel_count: AtomicUsize,
}

impl ProcessorLayout {
    pub fn new() -> Self {
        Self {
            sample_rate: AtomicU32::new(0),
            max_block_size: AtomicUsize::new(0),
            channel_count: AtomicUsize::new(0),
        }
    }

    /// The last prepared `(sample_rate, max_block_size, channel_count)` layout.
    pub fn get(&self) -> (u32, usize, usize) {
        (
            self.sample_rate.load(Ordering::Relaxed),
            self.max_block_size.load(Ordering::Relaxed),
            self.channel_count.load(Ordering::Relaxed),
        )
    }

    fn set(&self, sample_rate: u32, max_block_size: usize, channel_count: usize) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.max_block_size.store(max_block_size, Ordering::Relaxed);
        self.channel_count.store(channel_count, Ordering::Relaxed);
    }
}

// -------------------------------------------------------------------------------------------------

/// The real-time half of the amp simulation: applies the fixed processing chain to interleaved
/// audio blocks and reacts to parameter changes and impulse response swaps sent by its
/// [`AmpController`](crate::AmpController).
///
/// Per block the chain runs, in place and in this order: input gain, high-pass, pre-clip peak
/// filter, diode waveshaper, low shelf, mid peak, high peak, bright notch, cabinet convolution
/// (when enabled), output gain. Filters ahead of the waveshaper shape the harmonic content that
/// gets clipped; filters behind it form the tone stack of the already distorted signal, and the
/// cabinet response receives the fully processed signal.
///
/// All functions are expected to be called from the same audio processing thread: `prepare`
/// before playback (re)starts, then `process` once per block. `process` never blocks, allocates
/// or performs I/O; pending controller messages are drained at the top of each call, so a change
/// is either fully applied to a block or not at all.
pub struct AmpProcessor {
    // playback layout, as last prepared
    sample_rate: u32,
    max_block_size: usize,
    channel_count: usize,
    layout: Arc<ProcessorLayout>,

    // control context communication
    messages: Arc<ArrayQueue<AmpMessage>>,
    collector_handle: Handle,

    // parameter snapshot, audio-side mirror
    params: AmpParams,

    // processing chain
    input_gain: GainStage,
    output_gain: GainStage,
    filter_coefficients: [BiquadFilterCoefficients; Self::STAGE_COUNT],
    filters: Vec<[BiquadFilter; Self::STAGE_COUNT]>,
    clipper: DiodeClipper,

    // cabinet simulation
    response: Owned<Arc<ImpulseResponse>>,
    convolver: Option<Owned<Convolver>>,
    cab_enabled: bool,
}

impl AmpProcessor {
    // Stage order within the filter bank.
    const STAGE_HIGHPASS: usize = 0;
    const STAGE_PRECLIP: usize = 1;
    const STAGE_LOW: usize = 2;
    const STAGE_MID: usize = 3;
    const STAGE_HIGH: usize = 4;
    const STAGE_BRIGHT: usize = 5;
    const STAGE_COUNT: usize = 6;

    /// Stages applied ahead of the waveshaper.
    const PRE_CLIP_STAGES: Range<usize> = Self::STAGE_HIGHPASS..Self::STAGE_LOW;
    /// Stages applied behind the waveshaper.
    const POST_CLIP_STAGES: Range<usize> = Self::STAGE_LOW..Self::STAGE_COUNT;

    /// Fixed linear gain of the pre-clip peak filter. This intentionally is a plain factor and
    /// not a decibel value: it drives the filter design directly.
    const PRECLIP_GAIN: f32 = 6.0;

    pub(crate) fn new(
        messages: Arc<ArrayQueue<AmpMessage>>,
        layout: Arc<ProcessorLayout>,
        collector_handle: &Handle,
    ) -> Self {
        let params = AmpParams::default();
        let cab_enabled = params.cab.value();
        let response = Owned::new(
            collector_handle,
            Arc::new(ImpulseResponse::default_response()),
        );
        Self {
            sample_rate: 0,
            max_block_size: 0,
            channel_count: 0,
            layout,
            messages,
            collector_handle: collector_handle.clone(),
            params,
            input_gain: GainStage::new(),
            output_gain: GainStage::new(),
            filter_coefficients: Default::default(),
            filters: Vec::new(),
            clipper: DiodeClipper::new(),
            response,
            convolver: None,
            cab_enabled,
        }
    }

    /// The sample rate the processor was last prepared with. Zero when not prepared yet.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The max block size in frames the processor was last prepared with.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// The channel count the processor was last prepared with. Zero when not prepared yet.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Processing latency in frames. The chain adds none: convolution partitions are aligned
    /// to the processing block size.
    pub fn latency(&self) -> usize {
        0
    }

    /// (Re)configure the processor for a new playback layout.
    ///
    /// Designs all filter stages at the new sample rate from the current parameter snapshot,
    /// refreshes both gain stages and the drive coefficient, rebuilds the cabinet convolution
    /// engine from the active impulse response, and clears all filter and overlap state.
    ///
    /// This runs on the audio thread before playback (re)starts, so allocations are fine here.
    /// Returns an error for a zero sample rate, block size or channel count, and for sample
    /// rates of 12 kHz and below, where the fixed 6 kHz stage would exceed Nyquist. After a
    /// failed prepare the processor stays muted until prepared again with valid arguments.
    pub fn prepare(
        &mut self,
        sample_rate: u32,
        max_block_size: usize,
        channel_count: usize,
    ) -> Result<(), Error> {
        if sample_rate == 0 || max_block_size == 0 || channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "Invalid playback layout: \
                 rate {sample_rate}, block size {max_block_size}, channels {channel_count}"
            )));
        }

        // block processing until the new layout is fully applied
        self.channel_count = 0;
        self.layout.set(0, 0, 0);
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        // refresh gains and drive from the current parameter snapshot
        self.input_gain.set_gain_db(self.params.input.value());
        self.output_gain.set_gain_db(self.params.output.value());
        self.clipper.set_drive(self.params.drive.value());
        self.cab_enabled = self.params.cab.value();

        // redesign all filter stages at the new rate and allocate fresh per-channel state
        for stage in 0..Self::STAGE_COUNT {
            self.design_stage(stage)?;
        }
        self.filters = vec![Default::default(); channel_count];

        // rebuild the cabinet engine for the new layout from the active response
        self.convolver = None;
        let convolver = Convolver::new(
            self.response.channels(),
            self.response.sample_rate(),
            sample_rate,
            max_block_size,
            channel_count,
        )?;
        self.convolver = Some(Owned::new(&self.collector_handle, convolver));

        self.channel_count = channel_count;
        self.layout.set(sample_rate, max_block_size, channel_count);

        log::debug!(
            "Amp processor prepared: {sample_rate} Hz, \
             {max_block_size} frames, {channel_count} channels"
        );
        Ok(())
    }

    /// Process one interleaved audio block in place.
    ///
    /// Drains pending controller messages first, then runs the chain. Does nothing to the
    /// buffer when the processor is not prepared. The block length must be a multiple of the
    /// prepared channel count and must not exceed the prepared max block size.
    pub fn process(&mut self, output: &mut [f32]) {
        self.process_messages();

        if self.channel_count == 0 || output.is_empty() {
            return;
        }
        debug_assert_eq!(
            output.len() % self.channel_count,
            0,
            "block is not aligned to the prepared channel layout"
        );
        debug_assert!(
            output.len() / self.channel_count <= self.max_block_size,
            "block exceeds the prepared max block size"
        );

        Self::assert_no_alloc(|| {
            self.input_gain.process(output);
            self.process_filter_stages(Self::PRE_CLIP_STAGES, output);
            self.clipper.process(output);
            self.process_filter_stages(Self::POST_CLIP_STAGES, output);
            if self.cab_enabled {
                if let Some(convolver) = &mut self.convolver {
                    convolver.process(output);
                }
            }
            self.output_gain.process(output);
        });
    }

    /// Clear all filter and convolution overlap state without touching parameters.
    /// Can be used when the audio stream is restarted.
    pub fn reset(&mut self) {
        for channel_filters in &mut self.filters {
            for filter in channel_filters {
                filter.reset();
            }
        }
        if let Some(convolver) = &mut self.convolver {
            convolver.reset();
        }
    }

    // Apply pending control messages. Called at the top of each process call, so parameter
    // changes and impulse response swaps are observed at block boundaries only.
    fn process_messages(&mut self) {
        while let Some(message) = self.messages.pop() {
            match message {
                AmpMessage::Parameter { id, value } => {
                    self.apply_parameter(id, value);
                }
                AmpMessage::ImpulseResponse { response, convolver } => {
                    self.response = response;
                    match convolver {
                        Some(convolver)
                            if convolver.spec()
                                == (self.sample_rate, self.max_block_size, self.channel_count) =>
                        {
                            self.convolver = Some(convolver);
                        }
                        _ => {
                            // no engine for our layout: keep the previous one running and pick
                            // up the new response with the next prepare
                            log::debug!(
                                "Staged impulse response has no matching convolution engine"
                            );
                        }
                    }
                }
            }
        }
    }

    // Apply a single parameter change to the chain.
    fn apply_parameter(&mut self, id: ParameterId, value: f32) {
        self.params.set(id, value);
        match id {
            ParameterId::Input => self.input_gain.set_gain_db(self.params.input.value()),
            ParameterId::Output => self.output_gain.set_gain_db(self.params.output.value()),
            ParameterId::Drive => self.clipper.set_drive(self.params.drive.value()),
            ParameterId::Low => self.redesign_stage(Self::STAGE_LOW),
            ParameterId::Mid => self.redesign_stage(Self::STAGE_MID),
            ParameterId::High => self.redesign_stage(Self::STAGE_HIGH),
            ParameterId::Bright => self.redesign_stage(Self::STAGE_BRIGHT),
            ParameterId::Cab => self.cab_enabled = self.params.cab.value(),
            // recorded and persisted only: the toggle does not alter the processing path
            ParameterId::Menu => (),
        }
    }

    // Redesign a single stage at the last prepared sample rate. Skipped while unprepared:
    // prepare designs all stages from the parameter snapshot anyway.
    fn redesign_stage(&mut self, stage: usize) {
        if self.sample_rate > 0 {
            self.design_stage(stage)
                .expect("Failed to update filter coefficients");
        }
    }

    // Design a single stage of the amp's fixed voicing at the current sample rate.
    fn design_stage(&mut self, stage: usize) -> Result<(), Error> {
        let (filter_type, cutoff, q, gain) = match stage {
            Self::STAGE_HIGHPASS => (
                BiquadFilterType::Highpass,
                200.0,
                f32::consts::FRAC_1_SQRT_2,
                1.0,
            ),
            Self::STAGE_PRECLIP => (BiquadFilterType::Bell, 1420.0, 0.5, Self::PRECLIP_GAIN),
            Self::STAGE_LOW => (
                BiquadFilterType::Lowshelf,
                200.0,
                1.3,
                db_to_linear(self.params.low.value()),
            ),
            Self::STAGE_MID => (
                BiquadFilterType::Bell,
                815.0,
                0.3,
                db_to_linear(self.params.mid.value()),
            ),
            Self::STAGE_HIGH => (
                BiquadFilterType::Bell,
                6000.0,
                0.2,
                db_to_linear(self.params.high.value()),
            ),
            Self::STAGE_BRIGHT => (
                BiquadFilterType::Bell,
                4000.0,
                1.0,
                Self::bright_gain(self.params.bright.value()),
            ),
            _ => unreachable!("Invalid filter stage index"),
        };
        self.filter_coefficients[stage].set(filter_type, self.sample_rate, cutoff, q, gain)
    }

    // Gain of the bright notch: a fixed -12 dB cut, doubled when the bright switch is on.
    fn bright_gain(bright: bool) -> f32 {
        let base = db_to_linear(-12.0);
        if bright {
            2.0 * base
        } else {
            base
        }
    }

    // Run a consecutive range of filter bank stages over the given interleaved buffer,
    // keeping samples in f64 across the chained stages.
    fn process_filter_stages(&mut self, stages: Range<usize>, output: &mut [f32]) {
        let channel_count = self.channel_count;
        let frame_count = output.len() / channel_count;
        for frame_index in 0..frame_count {
            for (channel_index, filters) in self.filters.iter_mut().enumerate() {
                let sample_index = frame_index * channel_count + channel_index;
                let mut sample = output[sample_index] as f64;
                for stage in stages.start..stages.end {
                    sample =
                        filters[stage].process_sample(&self.filter_coefficients[stage], sample);
                }
                output[sample_index] = sample as f32;
            }
        }
    }

    #[inline]
    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

// -------------------------------------------------------------------------------------------------
