use std::f64::consts::PI;

use crate::SAMPLE_RATE;

/// Length of a ZERO bit cycle, in samples
pub const ZERO_LENGTH: usize = 32;

/// Length of a ONE bit cycle, in samples
pub const ONE_LENGTH: usize = 15;

/// The first start bit after the header is 1 ms longer than a regular ZERO
pub const LONG_ZERO_EXTRA: usize = SAMPLE_RATE / 1000;

/// Peak of a bit cycle (-0.5 to 0.5 of full scale, matches recorded audio)
const CYCLE_AMPLITUDE: f64 = 16384.0;

/// Silence before and after the program
pub const SILENCE_SAMPLES: usize = SAMPLE_RATE / 2;

/// Number of 0x55 bytes in the header
pub const HEADER_REPEAT: usize = 256;
const HEADER_FILL: u8 = 0x55;
const HEADER_END: u8 = 0x7F;

/// The final half cycle spans three ZERO cycles
const FINAL_HALF_CYCLE_LENGTH: usize = ZERO_LENGTH * 3;

/// Steps taken along the Bézier curve of the final half cycle
const BEZIER_STEPS: usize = 128;

/// Encoder producing 1500 baud cassette audio
///
/// Output layout:
/// - 0.5 s silence
/// - 256 × 0x55 then 0x7F (header)
/// - per byte: ZERO start bit (the first one 1 ms longer), then 8 bits MSB first
/// - a final half cycle, so the last bit ends with a rising edge
/// - 0.5 s silence
///
/// Decoding the output with the high-speed decoder returns the input bytes.
pub struct HighSpeedEncoder {
    zero: Vec<i16>,
    one: Vec<i16>,
    long_zero: Vec<i16>,
    final_half_cycle: Vec<i16>,
}

impl HighSpeedEncoder {
    pub fn new() -> Self {
        let zero = generate_cycle(ZERO_LENGTH);
        let final_half_cycle = generate_final_half_cycle(FINAL_HALF_CYCLE_LENGTH, &zero);
        Self {
            one: generate_cycle(ONE_LENGTH),
            long_zero: generate_cycle(ZERO_LENGTH + LONG_ZERO_EXTRA),
            zero,
            final_half_cycle,
        }
    }

    /// Encode the bytes as a complete high-speed recording
    pub fn encode(&self, data: &[u8]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.encoded_len(data.len()));

        samples.resize(SILENCE_SAMPLES, 0);

        for _ in 0..HEADER_REPEAT {
            self.push_byte(&mut samples, HEADER_FILL);
        }
        self.push_byte(&mut samples, HEADER_END);

        for (i, &byte) in data.iter().enumerate() {
            if i == 0 {
                self.push_long_zero(&mut samples);
            } else {
                self.push_bit(&mut samples, false);
            }
            self.push_byte(&mut samples, byte);
        }

        self.push_final_half_cycle(&mut samples);

        samples.resize(samples.len() + SILENCE_SAMPLES, 0);
        samples
    }

    /// Upper bound on the number of samples `encode` produces
    pub fn encoded_len(&self, data_len: usize) -> usize {
        let byte_max = (8 + 1) * ZERO_LENGTH;
        2 * SILENCE_SAMPLES
            + (HEADER_REPEAT + 1) * 8 * ZERO_LENGTH
            + data_len * byte_max
            + LONG_ZERO_EXTRA
            + self.final_half_cycle.len()
    }

    pub(crate) fn push_bit(&self, samples: &mut Vec<i16>, bit: bool) {
        if bit {
            samples.extend_from_slice(&self.one);
        } else {
            samples.extend_from_slice(&self.zero);
        }
    }

    /// Data bits only, MSB first
    pub(crate) fn push_byte(&self, samples: &mut Vec<i16>, byte: u8) {
        for i in (0..8).rev() {
            self.push_bit(samples, byte & (1 << i) != 0);
        }
    }

    pub(crate) fn push_long_zero(&self, samples: &mut Vec<i16>) {
        samples.extend_from_slice(&self.long_zero);
    }

    pub(crate) fn push_final_half_cycle(&self, samples: &mut Vec<i16>) {
        samples.extend_from_slice(&self.final_half_cycle);
    }
}

impl Default for HighSpeedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// One full sine cycle of `length` samples, starting at zero and rising
pub(crate) fn generate_cycle(length: usize) -> Vec<i16> {
    (0..length)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / length as f64;
            (t.sin() * CYCLE_AMPLITUDE) as i16
        })
        .collect()
}

/// A positive half cycle that eases back to zero instead of dropping hard
///
/// Without a final rising edge the last bit never completes on real hardware.
/// The curve is a cubic Bézier whose first control point follows the slope at
/// the end of a ZERO cycle, rising toward full scale and settling at zero.
fn generate_final_half_cycle(length: usize, zero: &[i16]) -> Vec<i16> {
    let n = zero.len();
    let slope = (zero[n - 1] as i32 - zero[n - 2] as i32).max(1);

    let (x1, y1) = (0i32, 0i32);
    let y2 = i16::MAX as i32;
    let x2 = (y2 - y1 + x1 * slope) / slope;
    let (x3, y3) = (length as i32 / 2, 0i32);
    let (x4, y4) = (length as i32 - 1, 0i32);

    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

    let mut audio = vec![0i16; length];
    let mut position = 0usize;

    for i in 0..=BEZIER_STEPS {
        let t = i as f64 / BEZIER_STEPS as f64;

        // de Casteljau
        let x12 = lerp(x1 as f64, x2 as f64, t);
        let y12 = lerp(y1 as f64, y2 as f64, t);
        let x23 = lerp(x2 as f64, x3 as f64, t);
        let y23 = lerp(y2 as f64, y3 as f64, t);
        let x34 = lerp(x3 as f64, x4 as f64, t);
        let y34 = lerp(y3 as f64, y4 as f64, t);

        let x123 = lerp(x12, x23, t);
        let y123 = lerp(y12, y23, t);
        let x234 = lerp(x23, x34, t);
        let y234 = lerp(y23, y34, t);

        let x = lerp(x123, x234, t);
        let y = lerp(y123, y234, t);

        // Fill horizontally up to the new point
        let new_position = (x as usize).min(length - 1);
        while position <= new_position {
            audio[position] = y as i16;
            position += 1;
        }
    }

    audio
}
