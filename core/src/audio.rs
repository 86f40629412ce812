//! Audio helpers shared by the decoders and the reader

use crate::SAMPLE_RATE;

/// Remove the slowly drifting DC component of a recording
///
/// Subtracts the average of the last `window` samples (including the current
/// one) from each sample. The sum is always divided by the full window, so the
/// first `window` outputs see a partially filled average. Results are clamped
/// to the i16 range since the difference can overflow it.
///
/// A `window` of zero disables the filter and returns a copy of the input.
///
/// # Example
/// ```
/// use tapewave_core::audio::high_pass_filter;
///
/// let flat = vec![1000i16; 1000];
/// let filtered = high_pass_filter(&flat, 500);
/// assert_eq!(filtered[999], 0);
/// ```
pub fn high_pass_filter(samples: &[i16], window: usize) -> Vec<i16> {
    if window == 0 {
        return samples.to_vec();
    }

    let size = window as i64;
    let mut filtered = Vec::with_capacity(samples.len());
    let mut sum: i64 = 0;

    for (i, &sample) in samples.iter().enumerate() {
        sum += sample as i64;
        if i >= window {
            sum -= samples[i - window] as i64;
        }

        let value = sample as i64 - sum / size;
        filtered.push(value.clamp(i16::MIN as i64, i16::MAX as i64) as i16);
    }

    filtered
}

/// Format a frame index as `h:mm:ss.mmm (frame n,nnn)` for log messages
pub fn frame_to_timestamp(frame: usize) -> String {
    let total_ms = (frame as u64 * 1000) / SAMPLE_RATE as u64;

    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!(
        "{}:{:02}:{:02}.{:03} (frame {})",
        hours,
        mins,
        secs,
        ms,
        group_thousands(frame)
    )
}

/// Convert a frame count to seconds
pub fn frames_to_secs(frames: usize) -> f64 {
    frames as f64 / SAMPLE_RATE as f64
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
