use log::{debug, warn};

use crate::audio::frame_to_timestamp;
use crate::bit_history::{BitEvent, BitHistory, BitKind};
use crate::decoder::{DecoderState, TapeDecoder};
use crate::error::{CassetteError, Result};
use crate::{Encoding, SAMPLE_RATE};

/// Calibration of the low-speed decoder
///
/// The defaults were tuned against real recordings; new sources may need others.
#[derive(Debug, Clone, PartialEq)]
pub struct LowSpeedConfig {
    /// Samples between the top of a pulse and its bottom
    pub pulse_peak_distance: usize,
    /// Samples ignored after a pulse is detected
    pub pulse_width: usize,
    /// Pulse spacing below this is a ONE, otherwise a ZERO
    pub bit_boundary: usize,
    /// Samples without a pulse that end the program (0.1 s)
    pub end_of_program_silence: usize,
    /// Consecutive ZERO bits required before the header byte
    pub min_header_zeros: u32,
    /// Sync byte ending the header
    pub header_byte: u8,
    /// A pulse must reach 1/divisor of the previous pulse's height
    pub pulse_height_divisor: i32,
    /// Bits kept for diagnosing bad sections
    pub history_len: usize,
}

impl Default for LowSpeedConfig {
    fn default() -> Self {
        Self {
            pulse_peak_distance: 7,
            pulse_width: 22,
            bit_boundary: 68,
            end_of_program_silence: SAMPLE_RATE / 10,
            min_header_zeros: 6,
            header_byte: 0xA5,
            pulse_height_divisor: 3,
            history_len: 10,
        }
    }
}

impl LowSpeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pulse_height_divisor <= 0 {
            return Err(CassetteError::InvalidConfig(format!(
                "pulse height divisor must be positive, got {}",
                self.pulse_height_divisor
            )));
        }
        Ok(())
    }
}

/// Pulse decoder for 500 baud cassettes
///
/// Every bit cell starts with a clock pulse. A ONE adds a second pulse half way
/// through the cell, so a short gap is a ONE and the clock pulse after it has to
/// be eaten. A long gap is a ZERO.
///
/// The first pulse after the header is eaten without checking its timing:
/// recordings show no clock pulse right after the final 1 of the sync byte, and
/// the next pulse arrives late. The reason is unknown, so it is kept as is.
pub struct LowSpeedDecoder {
    config: LowSpeedConfig,
    state: DecoderState,
    program: Vec<u8>,
    last_pulse_frame: usize,
    eat_next_pulse: bool,
    lenient_first_bit: bool,
    bit_count: u32,
    recent_bits: u32,
    detected_zeros: u32,
    /// Peak of the previous pulse, sets the threshold for the next one
    pulse_height: i32,
    history: BitHistory,
    bad_sections: Vec<BitHistory>,
    last_error: Option<CassetteError>,
}

impl LowSpeedDecoder {
    pub fn new() -> Self {
        Self::from_valid_config(LowSpeedConfig::default())
    }

    pub fn with_config(config: LowSpeedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Caller has already run `LowSpeedConfig::validate`
    pub(crate) fn from_valid_config(config: LowSpeedConfig) -> Self {
        let history = BitHistory::new(config.history_len);
        Self {
            config,
            state: DecoderState::Undecided,
            program: Vec::new(),
            last_pulse_frame: 0,
            eat_next_pulse: false,
            lenient_first_bit: false,
            bit_count: 0,
            recent_bits: 0,
            detected_zeros: 0,
            pulse_height: 0,
            history,
            bad_sections: Vec::new(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &LowSpeedConfig {
        &self.config
    }

    /// Differentiate to accentuate a pulse
    ///
    /// Pulses swing positive then negative `pulse_peak_distance` samples later,
    /// so the difference peaks at the bottom of the pulse.
    fn differentiate(&self, samples: &[i16], frame: usize) -> i32 {
        let distance = self.config.pulse_peak_distance;
        if frame >= distance {
            samples[frame - distance] as i32 - samples[frame] as i32
        } else {
            0
        }
    }

    fn handle_pulse(&mut self, frame: usize, time_diff: usize) {
        let bit = time_diff < self.config.bit_boundary;

        if self.eat_next_pulse {
            if self.state == DecoderState::Detected && !bit && !self.lenient_first_bit {
                let error = CassetteError::ClockMismatch {
                    frame,
                    timestamp: frame_to_timestamp(frame),
                    diff: time_diff,
                    last_timestamp: frame_to_timestamp(self.last_pulse_frame),
                };
                warn!("{}", error);
                self.history
                    .push(BitEvent::new(self.last_pulse_frame, frame, BitKind::Bad));
                self.bad_sections.push(self.history.clone());
                self.last_error = Some(error);
            }
            self.eat_next_pulse = false;
            self.lenient_first_bit = false;
            return;
        }

        // A ONE before enough leading zeros restarts the count
        if bit
            && self.state == DecoderState::Undecided
            && self.detected_zeros < self.config.min_header_zeros
        {
            self.detected_zeros = 0;
            return;
        }

        if bit {
            self.eat_next_pulse = true;
        } else {
            self.detected_zeros = self.detected_zeros.saturating_add(1);
        }
        self.recent_bits = (self.recent_bits << 1) | bit as u32;

        let kind = if bit { BitKind::One } else { BitKind::Zero };
        self.history
            .push(BitEvent::new(self.last_pulse_frame, frame, kind));

        if self.state == DecoderState::Undecided {
            // Sync byte must follow nothing but zeros
            if self.recent_bits == self.config.header_byte as u32 {
                debug!("Low-speed header found at {}", frame_to_timestamp(frame));
                self.bit_count = 0;
                self.lenient_first_bit = true;
                self.state = DecoderState::Detected;
            }
        } else {
            self.bit_count += 1;
            if self.bit_count == 8 {
                self.program.push((self.recent_bits & 0xFF) as u8);
                self.bit_count = 0;
            }
        }
    }
}

impl Default for LowSpeedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TapeDecoder for LowSpeedDecoder {
    fn name(&self) -> &'static str {
        "low speed"
    }

    fn encoding(&self) -> Encoding {
        Encoding::LowSpeed
    }

    fn handle_sample(&mut self, samples: &[i16], frame: usize) {
        if self.state.is_terminal() {
            return;
        }

        let pulse = self.differentiate(samples, frame);
        let time_diff = frame.saturating_sub(self.last_pulse_frame);
        let pulsing = time_diff > self.config.pulse_width
            && pulse >= self.pulse_height / self.config.pulse_height_divisor;

        // Track this pulse's height to calibrate the next one
        if time_diff < self.config.pulse_width {
            self.pulse_height = self.pulse_height.max(pulse);
        }

        if self.state == DecoderState::Detected && time_diff > self.config.end_of_program_silence
        {
            self.state = DecoderState::Finished;
        } else if pulsing {
            self.handle_pulse(frame, time_diff);
            self.last_pulse_frame = frame;
            self.pulse_height = 0;
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
