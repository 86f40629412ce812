use log::{debug, warn};

use crate::audio::frame_to_timestamp;
use crate::bit_history::{BitEvent, BitHistory, BitKind};
use crate::decoder::{DecoderState, TapeDecoder};
use crate::error::CassetteError;
use crate::Encoding;

// High-speed (1500 baud) tape format
//
// Each bit is one full sine cycle; its period carries the value:
// - ONE:  short cycle (~15 samples at 44.1 kHz)
// - ZERO: long cycle (~32 samples)
//
// A header of 0x55 bytes ends with 0x7F. After that every byte is a ZERO start
// bit followed by 8 data bits, MSB first. The first byte's start bit is folded
// into the header, so the counter starts at 1.

/// Calibration of the high-speed decoder
///
/// The defaults were tuned against real recordings; new sources may need others.
#[derive(Debug, Clone, PartialEq)]
pub struct HighSpeedConfig {
    /// Samples within ±threshold keep the previous sign
    pub sign_threshold: i32,
    /// Cycles must be strictly longer than this to carry a bit
    pub min_cycle: usize,
    /// Cycles must be strictly shorter than this to carry a bit
    pub max_cycle: usize,
    /// Cycles shorter than this are ONE, the rest ZERO
    pub one_cycle_limit: usize,
    /// An out-of-range cycle longer than this (~1.5 ms) ends the recording
    pub end_gap_cycle: usize,
    /// Frames without any zero crossing that end the recording
    pub max_silence_frames: usize,
    /// Last 16 header bits, 0x55 followed by 0x7F
    pub header_marker: u16,
    /// Bits kept for diagnosing bad sections
    pub history_len: usize,
}

impl Default for HighSpeedConfig {
    fn default() -> Self {
        Self {
            sign_threshold: 500,
            min_cycle: 7,
            max_cycle: 44,
            one_cycle_limit: 22,
            end_gap_cycle: 66,
            max_silence_frames: 1000,
            header_marker: 0x557F,
            history_len: 20,
        }
    }
}

/// Zero-crossing decoder for 1500 baud cassettes
pub struct HighSpeedDecoder {
    config: HighSpeedConfig,
    state: DecoderState,
    program: Vec<u8>,
    old_sign: i8,
    cycle_size: usize,
    recent_bits: u32,
    bit_count: u32,
    last_crossing_frame: usize,
    history: BitHistory,
    bad_sections: Vec<BitHistory>,
    last_error: Option<CassetteError>,
}

impl HighSpeedDecoder {
    pub fn new() -> Self {
        Self::with_config(HighSpeedConfig::default())
    }

    pub fn with_config(config: HighSpeedConfig) -> Self {
        let history = BitHistory::new(config.history_len);
        Self {
            config,
            state: DecoderState::Undecided,
            program: Vec::new(),
            old_sign: 0,
            cycle_size: 0,
            recent_bits: 0,
            bit_count: 0,
            last_crossing_frame: 0,
            history,
            bad_sections: Vec::new(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &HighSpeedConfig {
        &self.config
    }

    fn sign(&self, sample: i16) -> i8 {
        let sample = sample as i32;
        if sample > self.config.sign_threshold {
            1
        } else if sample < -self.config.sign_threshold {
            -1
        } else {
            0
        }
    }

    /// A negative-to-positive crossing closes the current cycle
    fn end_cycle(&mut self, frame: usize) {
        let cycle_size = self.cycle_size;

        if cycle_size > self.config.min_cycle && cycle_size < self.config.max_cycle {
            let bit = cycle_size < self.config.one_cycle_limit;
            self.recent_bits = (self.recent_bits << 1) | bit as u32;

            if self.state == DecoderState::Detected {
                self.handle_data_bit(bit, frame, cycle_size);
            } else if (self.recent_bits & 0xFFFF) as u16 == self.config.header_marker {
                debug!("High-speed header found at {}", frame_to_timestamp(frame));
                self.state = DecoderState::Detected;
                self.bit_count = 1;
                self.recent_bits = 0;
            }
        } else if self.state == DecoderState::Detected
            && !self.program.is_empty()
            && cycle_size > self.config.end_gap_cycle
        {
            // Long gap after data, end of recording
            self.state = DecoderState::Finished;
        }

        self.cycle_size = 0;
    }

    fn handle_data_bit(&mut self, bit: bool, frame: usize, cycle_size: usize) {
        self.bit_count += 1;
        let start_frame = frame.saturating_sub(cycle_size);

        if self.bit_count == 1 {
            // Start bit must be zero
            if bit {
                let error = CassetteError::BadStartBit {
                    byte_offset: self.program.len(),
                    frame,
                    timestamp: frame_to_timestamp(frame),
                    cycle_size,
                };
                warn!("{}", error);
                self.history
                    .push(BitEvent::new(start_frame, frame, BitKind::Bad));
                self.bad_sections.push(self.history.clone());
                self.last_error = Some(error);
                self.state = DecoderState::Error;
                return;
            }
            self.history
                .push(BitEvent::new(start_frame, frame, BitKind::Start));
        } else {
            let kind = if bit { BitKind::One } else { BitKind::Zero };
            self.history.push(BitEvent::new(start_frame, frame, kind));
        }

        // Start bit plus 8 data bits
        if self.bit_count == 9 {
            self.program.push((self.recent_bits & 0xFF) as u8);
            self.bit_count = 0;
        }
    }
}

impl Default for HighSpeedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TapeDecoder for HighSpeedDecoder {
    fn name(&self) -> &'static str {
        "high speed"
    }

    fn encoding(&self) -> Encoding {
        Encoding::HighSpeed
    }

    fn handle_sample(&mut self, samples: &[i16], frame: usize) {
        if self.state.is_terminal() {
            return;
        }

        let new_sign = self.sign(samples[frame]);

        if self.old_sign != 0 && new_sign != 0 && self.old_sign != new_sign {
            self.last_crossing_frame = frame;

            // Positive edge ends the cycle
            if self.old_sign == -1 {
                self.end_cycle(frame);
            }
        } else {
            self.cycle_size += 1;
        }

        if new_sign != 0 {
            self.old_sign = new_sign;
        }

        if self.state == DecoderState::Detected
            && frame.saturating_sub(self.last_crossing_frame) > self.config.max_silence_frames
        {
            self.state = DecoderState::Finished;
        }
    }

    fn state(&self) -> DecoderState {
        self.state
    }

    fn program(&self) -> &[u8] {
        &self.program
    }

    fn bad_sections(&self) -> &[BitHistory] {
        &self.bad_sections
    }

    fn last_error(&self) -> Option<&CassetteError> {
        self.last_error.as_ref()
    }

    fn take_output(&mut self) -> (Vec<u8>, Vec<BitHistory>) {
        (
            std::mem::take(&mut self.program),
            std::mem::take(&mut self.bad_sections),
        )
    }
}
