//! Cassette tape recovery for the TRS-80 Model I/III
//!
//! Finds 500 baud and 1500 baud programs in a recording, recovers their bytes,
//! lists tokenized BASIC, and re-encodes programs as 1500 baud audio.

use std::fmt;

use serde::Serialize;

pub mod audio;
pub mod basic;
pub mod bit_history;
pub mod decoder;
pub mod decoder_high_speed;
pub mod decoder_low_speed;
pub mod encoder_high_speed;
pub mod error;
pub mod reader;

pub use bit_history::{BitEvent, BitHistory, BitKind};
pub use decoder::{DecoderState, TapeDecoder};
pub use decoder_high_speed::{HighSpeedConfig, HighSpeedDecoder};
pub use decoder_low_speed::{LowSpeedConfig, LowSpeedDecoder};
pub use encoder_high_speed::HighSpeedEncoder;
pub use error::{BasicField, CassetteError, Result};
pub use reader::{CassetteReader, Program, ReaderConfig, Results};

// Audio configuration
pub const SAMPLE_RATE: usize = 44100;

/// Default window of the DC-removal filter applied before decoding
pub const DC_WINDOW_SAMPLES: usize = 500;

/// Lead time (seconds) after which a detection starts a new track
pub const NEW_TRACK_GAP_SECS: f64 = 10.0;

/// The two tape formats a program can be recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// 500 baud, self-clocking pulses
    LowSpeed,
    /// 1500 baud, one sine cycle per bit
    HighSpeed,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::LowSpeed => f.write_str("low speed"),
            Encoding::HighSpeed => f.write_str("high speed"),
        }
    }
}
