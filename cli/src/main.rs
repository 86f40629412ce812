use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec};
use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tapewave_core::audio::frame_to_timestamp;
use tapewave_core::{
    basic, BitHistory, CassetteError, CassetteReader, Encoding, HighSpeedEncoder, Program,
    ReaderConfig, SAMPLE_RATE,
};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cassette(#[from] CassetteError),

    #[error("Unsupported WAV file: {0}")]
    UnsupportedFormat(String),
}

type Result<T> = std::result::Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tapewave")]
#[command(about = "Recover TRS-80 cassette programs from WAV recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every program on a recording and write it out
    Read {
        /// Recording to read (mono, 16-bit, 44100 Hz)
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Prefix of the output files, e.g. "out/tape-"
        #[arg(value_name = "OUTPUT_PREFIX")]
        prefix: String,

        /// DC-removal filter window, in samples
        #[arg(long, default_value_t = tapewave_core::DC_WINDOW_SAMPLES)]
        dc_window: usize,

        /// Seconds of searching after which a program starts a new track
        #[arg(long, default_value_t = tapewave_core::NEW_TRACK_GAP_SECS)]
        track_gap: f64,

        /// Skip writing the high-speed re-encoding of each program
        #[arg(long)]
        no_wav: bool,
    },

    /// Encode a binary as a 1500 baud recording
    Encode {
        /// Program bytes
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Print the listing of a tokenized BASIC program
    List {
        /// Program bytes
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,
    },
}

/// Contents of a `.bad.json` file
#[derive(Serialize)]
struct BadSectionReport<'a> {
    track: Option<usize>,
    copy: Option<usize>,
    encoding: Option<Encoding>,
    start_frame: Option<usize>,
    sections: &'a [BitHistory],
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Read {
            input,
            prefix,
            dc_window,
            track_gap,
            no_wav,
        } => {
            let config = ReaderConfig {
                dc_window,
                new_track_gap_secs: track_gap,
                ..ReaderConfig::default()
            };
            read_command(&input, &prefix, config, !no_wav)
        }
        Commands::Encode { input, output } => encode_command(&input, &output),
        Commands::List { input } => list_command(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_command(input: &Path, prefix: &str, config: ReaderConfig, write_wav: bool) -> Result<()> {
    let reader = CassetteReader::with_config(config)?;
    let samples = read_wav_file(input)?;

    let results = reader.read(&samples);

    for program in results.programs() {
        write_program(program, prefix, write_wav)?;
    }

    if !results.discarded_bad_sections().is_empty() {
        let report = BadSectionReport {
            track: None,
            copy: None,
            encoding: None,
            start_frame: None,
            sections: results.discarded_bad_sections(),
        };
        write_json(&format!("{}discarded.bad.json", prefix), &report)?;
    }

    println!("Recovered {} programs", results.programs().len());
    println!("New programs at:");
    for &frame in results.new_track_frames() {
        println!("    {}", frame_to_timestamp(frame));
    }

    Ok(())
}

fn write_program(program: &Program, prefix: &str, write_wav: bool) -> Result<()> {
    let binary = program.binary();
    let is_basic = program.is_basic();

    if !is_basic {
        let head: Vec<String> = binary.iter().take(3).map(|b| format!("0x{:02X}", b)).collect();
        info!("First few bytes (of {}): {}", binary.len(), head.join(" "));
    }

    // Highlight non-programs in the file name
    let suffix = if is_basic { "" } else { "-binary" };
    let base = format!("{}{}-{}{}", prefix, program.track(), program.copy(), suffix);

    let bin_path = format!("{}.bin", base);
    std::fs::write(&bin_path, binary)?;
    info!("Wrote {} bytes to {}", binary.len(), bin_path);

    if is_basic {
        match program.listing() {
            Ok(listing) => {
                let bas_path = format!("{}.bas", base);
                std::fs::write(&bas_path, listing)?;
                info!("Wrote {}", bas_path);
            }
            Err(e) => error!("Cannot parse BASIC program {}: {}", base, e),
        }
    }

    if write_wav {
        write_wav_file(Path::new(&format!("{}.wav", base)), &program.to_high_speed_audio())?;
    }

    if !program.bad_sections().is_empty() {
        let report = BadSectionReport {
            track: Some(program.track()),
            copy: Some(program.copy()),
            encoding: Some(program.encoding()),
            start_frame: Some(program.start_frame()),
            sections: program.bad_sections(),
        };
        write_json(&format!("{}.bad.json", base), &report)?;
    }

    Ok(())
}

fn encode_command(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input)?;
    info!("Read {} bytes from {}", data.len(), input.display());

    let samples = HighSpeedEncoder::new().encode(&data);
    write_wav_file(output, &samples)
}

fn list_command(input: &Path) -> Result<()> {
    let data = std::fs::read(input)?;
    let listing = basic::detokenize(&data)?;
    print!("{}", listing);
    Ok(())
}

/// Read a recording, rejecting anything but 16-bit integer mono at 44100 Hz
fn read_wav_file(path: &Path) -> Result<Vec<i16>> {
    info!("Reading {}", path.display());
    let mut reader = hound::WavReader::open(path)?;

    let spec = reader.spec();
    info!(
        "WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );
    check_spec(&spec)?;

    let samples = reader.samples::<i16>().collect::<std::result::Result<Vec<_>, _>>()?;
    info!("Read {} samples", samples.len());
    Ok(samples)
}

fn check_spec(spec: &WavSpec) -> Result<()> {
    if spec.channels != 1 {
        return Err(CliError::UnsupportedFormat(format!(
            "file must be mono, has {} channels",
            spec.channels
        )));
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(CliError::UnsupportedFormat(format!(
            "file must be 16-bit integer PCM, is {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.sample_rate != SAMPLE_RATE as u32 {
        return Err(CliError::UnsupportedFormat(format!(
            "file must be {} Hz, is {} Hz",
            SAMPLE_RATE, spec.sample_rate
        )));
    }
    Ok(())
}

fn write_wav_file(path: &Path, samples: &[i16]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    info!("Wrote {}", path);
    Ok(())
}
