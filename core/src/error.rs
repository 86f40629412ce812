use std::fmt;

use thiserror::Error;

use crate::Encoding;

/// Multi-byte field of a tokenized BASIC program that can be cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicField {
    LineAddress,
    LineNumber,
    Line,
}

impl fmt::Display for BasicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BasicField::LineAddress => "next line's address",
            BasicField::LineNumber => "line number",
            BasicField::Line => "line",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CassetteError {
    #[error("Missing BASIC magic number, not a BASIC program")]
    MissingMagic,

    #[error("EOF in {0}")]
    Truncated(BasicField),

    #[error("Bad start bit at byte {byte_offset}, {timestamp}, cycle size {cycle_size}")]
    BadStartBit {
        byte_offset: usize,
        frame: usize,
        timestamp: String,
        cycle_size: usize,
    },

    #[error("Clock pulse of wrong value at {timestamp}, diff = {diff}, last = {last_timestamp}")]
    ClockMismatch {
        frame: usize,
        timestamp: String,
        diff: usize,
        last_timestamp: String,
    },

    #[error("Reached end of samples while still reading {encoding} track ({bytes} bytes discarded)")]
    StreamExhausted { encoding: Encoding, bytes: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CassetteError>;
