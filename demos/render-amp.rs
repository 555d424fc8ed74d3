//! An example which runs a WAV file offline through the amp simulation and writes the
//! processed result into a new WAV file.

use std::path::PathBuf;

use arg::{parse_args, Args};

use diodeamp::{utils::decoder::AudioDecoder, AmpController, IrLoadOptions, ParameterId};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

/// Frames per processing block.
const BLOCK_SIZE: usize = 512;

// -------------------------------------------------------------------------------------------------

/// Program arguments for the offline amp render.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "i", long = "input")]
    /// The audio file to process (wav, aiff, flac or mp3).
    input_path: Option<PathBuf>,
    #[arg(short = "o", long = "output")]
    /// Where to write the processed audio as a 32 bit float wav file.
    output_path: Option<PathBuf>,
    #[arg(short = "c", long = "cab-ir")]
    /// Cabinet impulse response file. Uses the built-in response when not set.
    cab_ir_path: Option<PathBuf>,
    #[arg(short = "d", long = "drive")]
    /// Drive amount in the range 0..10. Default: 5.
    drive: Option<f32>,
    #[arg(long = "input-gain")]
    /// Input gain in dB (-24..24). Default: 0.
    input_gain: Option<f32>,
    #[arg(long = "output-gain")]
    /// Output gain in dB (-24..24). Default: 0.
    output_gain: Option<f32>,
    #[arg(long = "low")]
    /// Low tone control in dB (-6..6). Default: 0.
    low: Option<f32>,
    #[arg(long = "mid")]
    /// Mid tone control in dB (-6..6). Default: 0.
    mid: Option<f32>,
    #[arg(long = "high")]
    /// High tone control in dB (-6..6). Default: 0.
    high: Option<f32>,
    #[arg(short = "b", long = "bright")]
    /// Enable the bright switch.
    bright: bool,
    #[arg(long = "no-cab")]
    /// Bypass the cabinet simulation.
    no_cab: bool,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments and init logging
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        // disable logging in chatty modules
        .with_module_level("symphonia_core", log::LevelFilter::Warn)
        .with_module_level("symphonia_format", log::LevelFilter::Warn)
        .init()
        .expect("Failed to set logger");

    let Some(input_path) = &args.input_path else {
        return Err("Missing input file argument (--input FILE)".into());
    };
    let Some(output_path) = &args.output_path else {
        return Err("Missing output file argument (--output FILE)".into());
    };

    // Decode the input file into an interleaved buffer
    let mut decoder = AudioDecoder::from_file(input_path)?;
    let signal_spec = decoder.signal_spec();
    let sample_rate = signal_spec.rate;
    let channel_count = signal_spec.channels.count();
    let mut samples = decoder.decode_all()?;
    log::info!(
        "Processing '{}': {} Hz, {} channels, {} frames",
        input_path.display(),
        sample_rate,
        channel_count,
        samples.len() / channel_count
    );

    // Create and configure the amp
    let (mut controller, mut processor) = AmpController::new();
    processor.prepare(sample_rate, BLOCK_SIZE, channel_count)?;

    controller.set_parameter(ParameterId::Drive, args.drive.unwrap_or(5.0))?;
    controller.set_parameter(ParameterId::Input, args.input_gain.unwrap_or(0.0))?;
    controller.set_parameter(ParameterId::Low, args.low.unwrap_or(0.0))?;
    controller.set_parameter(ParameterId::Mid, args.mid.unwrap_or(0.0))?;
    controller.set_parameter(ParameterId::High, args.high.unwrap_or(0.0))?;
    controller.set_parameter(ParameterId::Bright, if args.bright { 1.0 } else { 0.0 })?;
    if args.no_cab {
        controller.set_parameter(ParameterId::Cab, 0.0)?;
    } else if let Some(cab_ir_path) = &args.cab_ir_path {
        controller.load_impulse_response_file(cab_ir_path, IrLoadOptions::default())?;
    }
    // applied last: switching the cabinet off above forces its own compensation gain
    controller.set_parameter(ParameterId::Output, args.output_gain.unwrap_or(0.0))?;

    // Run the whole file through the amp, block by block
    for block in samples.chunks_mut(BLOCK_SIZE * channel_count) {
        processor.process(block);
    }

    // Write the processed audio
    let wav_spec = hound::WavSpec {
        channels: channel_count as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output_path, wav_spec)?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    log::info!("Wrote processed audio to '{}'", output_path.display());

    controller.cleanup();
    Ok(())
}
