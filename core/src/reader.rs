use log::{info, warn};

use crate::audio::{frame_to_timestamp, frames_to_secs, high_pass_filter};
use crate::basic;
use crate::bit_history::BitHistory;
use crate::decoder::{DecoderState, TapeDecoder};
use crate::decoder_high_speed::{HighSpeedConfig, HighSpeedDecoder};
use crate::decoder_low_speed::{LowSpeedConfig, LowSpeedDecoder};
use crate::encoder_high_speed::HighSpeedEncoder;
use crate::error::{CassetteError, Result};
use crate::{Encoding, DC_WINDOW_SAMPLES, NEW_TRACK_GAP_SECS};

/// Settings for reading a whole recording
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Window of the DC-removal filter, in samples
    pub dc_window: usize,
    /// Seconds of searching after which a detection starts a new track
    pub new_track_gap_secs: f64,
    pub high_speed: HighSpeedConfig,
    pub low_speed: LowSpeedConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            dc_window: DC_WINDOW_SAMPLES,
            new_track_gap_secs: NEW_TRACK_GAP_SECS,
            high_speed: HighSpeedConfig::default(),
            low_speed: LowSpeedConfig::default(),
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dc_window == 0 {
            return Err(CassetteError::InvalidConfig(
                "DC filter window must be at least one sample".into(),
            ));
        }
        if !self.new_track_gap_secs.is_finite() || self.new_track_gap_secs < 0.0 {
            return Err(CassetteError::InvalidConfig(format!(
                "new track gap must be a non-negative number of seconds, got {}",
                self.new_track_gap_secs
            )));
        }
        self.low_speed.validate()
    }
}

/// A program recovered from the recording
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    track: usize,
    copy: usize,
    start_frame: usize,
    encoding: Encoding,
    binary: Vec<u8>,
    bad_sections: Vec<BitHistory>,
}

impl Program {
    pub fn new(
        track: usize,
        copy: usize,
        start_frame: usize,
        encoding: Encoding,
        binary: Vec<u8>,
        bad_sections: Vec<BitHistory>,
    ) -> Self {
        Self {
            track,
            copy,
            start_frame,
            encoding,
            binary,
            bad_sections,
        }
    }

    /// Track number, starting at 1
    pub fn track(&self) -> usize {
        self.track
    }

    /// Copy within the track, starting at 1
    pub fn copy(&self) -> usize {
        self.copy
    }

    /// Frame of the filtered recording where the header was detected
    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    /// Bit histories of clock errors the decoder recovered from
    pub fn bad_sections(&self) -> &[BitHistory] {
        &self.bad_sections
    }

    /// Whether the binary is a tokenized BASIC program
    pub fn is_basic(&self) -> bool {
        basic::is_basic_program(&self.binary)
    }

    /// BASIC listing of the program
    pub fn listing(&self) -> Result<String> {
        basic::detokenize(&self.binary)
    }

    /// Binary as a high-speed tape stores it
    ///
    /// Low-speed programs end in two 0x00 but high-speed programs end in three,
    /// so the missing one is added.
    pub fn high_speed_binary(&self) -> Vec<u8> {
        let mut binary = self.binary.clone();
        let n = binary.len();
        if n >= 3 && binary[n - 1] == 0 && binary[n - 2] == 0 && binary[n - 3] != 0 {
            binary.push(0);
        }
        binary
    }

    /// Re-encode the program as 1500 baud audio
    pub fn to_high_speed_audio(&self) -> Vec<i16> {
        HighSpeedEncoder::new().encode(&self.high_speed_binary())
    }
}

/// Everything found in one recording
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    programs: Vec<Program>,
    new_track_frames: Vec<usize>,
    discarded_bad_sections: Vec<BitHistory>,
    exhausted: Option<CassetteError>,
}

impl Results {
    /// Recovered programs in tape order
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Detection frame of the first copy of every track
    pub fn new_track_frames(&self) -> &[usize] {
        &self.new_track_frames
    }

    /// Bad sections of attempts that were skipped because of an error
    pub fn discarded_bad_sections(&self) -> &[BitHistory] {
        &self.discarded_bad_sections
    }

    /// Set when the recording ended in the middle of a program
    pub fn exhausted(&self) -> Option<&CassetteError> {
        self.exhausted.as_ref()
    }
}

/// Finds and decodes every program on a recording
///
/// Each search runs all decoders side by side, one frame at a time. The first
/// decoder to leave `Undecided` wins and the others are dropped; when two
/// leave on the same frame the later hypothesis (high speed) wins. The winner
/// runs until it finishes or fails, then a new search starts on the next
/// frame.
pub struct CassetteReader {
    config: ReaderConfig,
}

impl CassetteReader {
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
        }
    }

    pub fn with_config(config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// DC-filter the recording, then read every program on it
    pub fn read(&self, samples: &[i16]) -> Results {
        info!(
            "Filtering {} samples, window {}",
            samples.len(),
            self.config.dc_window
        );
        let filtered = high_pass_filter(samples, self.config.dc_window);
        self.read_filtered(&filtered)
    }

    /// Read every program on an already filtered recording
    pub fn read_filtered(&self, samples: &[i16]) -> Results {
        let mut results = Results::default();
        let mut frame = 0;
        let mut track = 0;
        let mut copy = 1;
        let mut attempt = 1;

        while frame < samples.len() {
            info!("Search {} from {}", attempt, frame_to_timestamp(frame));

            let mut decoders = self.hypotheses();
            let search_start = frame;
            let mut start_frame = frame;
            let mut state = DecoderState::Undecided;

            while frame < samples.len() && !state.is_terminal() {
                for decoder in decoders.iter_mut() {
                    decoder.handle_sample(samples, frame);
                }

                if state == DecoderState::Undecided {
                    let detected = decoders
                        .iter()
                        .rposition(|d| d.state() != DecoderState::Undecided);
                    if let Some(index) = detected {
                        let winner = decoders.swap_remove(index);
                        decoders.clear();
                        decoders.push(winner);

                        let lead_time = frames_to_secs(frame - search_start);
                        if lead_time > self.config.new_track_gap_secs
                            || results.new_track_frames.is_empty()
                        {
                            results.new_track_frames.push(frame);
                            track += 1;
                            copy = 1;
                        }

                        info!(
                            "Decoder \"{}\" detected {}-{} at {} after {:.1} seconds",
                            decoders[0].name(),
                            track,
                            copy,
                            frame_to_timestamp(frame),
                            lead_time
                        );
                        start_frame = frame;
                        state = decoders[0].state();
                    }
                } else {
                    state = decoders[0].state();
                }

                frame += 1;
            }

            match state {
                DecoderState::Undecided => {
                    info!("Reached end of samples without finding a program");
                }
                DecoderState::Detected => {
                    let decoder = &mut decoders[0];
                    let (binary, bad_sections) = decoder.take_output();
                    let error = CassetteError::StreamExhausted {
                        encoding: decoder.encoding(),
                        bytes: binary.len(),
                    };
                    warn!(
                        "Decoder \"{}\" on {}-{} at {}: {}",
                        decoder.name(),
                        track,
                        copy,
                        frame_to_timestamp(frame.saturating_sub(1)),
                        error
                    );
                    results.discarded_bad_sections.extend(bad_sections);
                    results.exhausted = Some(error);
                }
                DecoderState::Error => {
                    let decoder = &mut decoders[0];
                    if let Some(error) = decoder.last_error() {
                        warn!(
                            "Decoder \"{}\" failed on {}-{} at {}: {}",
                            decoder.name(),
                            track,
                            copy,
                            frame_to_timestamp(frame.saturating_sub(1)),
                            error
                        );
                    }
                    let (binary, bad_sections) = decoder.take_output();
                    warn!(
                        "Skipping {}-{}, {} bytes discarded",
                        track,
                        copy,
                        binary.len()
                    );
                    results.discarded_bad_sections.extend(bad_sections);
                }
                DecoderState::Finished => {
                    let decoder = &mut decoders[0];
                    let encoding = decoder.encoding();
                    let (binary, bad_sections) = decoder.take_output();
                    info!(
                        "Decoder \"{}\" finished {}-{} at {}: {} bytes, {} bad sections",
                        decoder.name(),
                        track,
                        copy,
                        frame_to_timestamp(frame.saturating_sub(1)),
                        binary.len(),
                        bad_sections.len()
                    );
                    results.programs.push(Program::new(
                        track,
                        copy,
                        start_frame,
                        encoding,
                        binary,
                        bad_sections,
                    ));
                }
            }

            copy += 1;
            attempt += 1;
        }

        results
    }

    /// Fresh decoders, one per encoding, in tie-break order
    fn hypotheses(&self) -> Vec<Box<dyn TapeDecoder>> {
        vec![
            Box::new(LowSpeedDecoder::from_valid_config(self.config.low_speed.clone())),
            Box::new(HighSpeedDecoder::with_config(self.config.high_speed.clone())),
        ]
    }
}

impl Default for CassetteReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;

    fn program(binary: &[u8]) -> Program {
        Program::new(1, 1, 0, Encoding::LowSpeed, binary.to_vec(), Vec::new())
    }

    fn silence(secs: usize) -> Vec<i16> {
        vec![0; secs * SAMPLE_RATE]
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ReaderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ReaderConfig {
            dc_window: 0,
            ..ReaderConfig::default()
        };
        assert!(matches!(
            CassetteReader::with_config(config),
            Err(CassetteError::InvalidConfig(_))
        ));

        for gap in [-1.0, f64::NAN, f64::INFINITY] {
            let config = ReaderConfig {
                new_track_gap_secs: gap,
                ..ReaderConfig::default()
            };
            assert!(config.validate().is_err(), "gap {}", gap);
        }

        let mut config = ReaderConfig::default();
        config.low_speed.pulse_height_divisor = 0;
        assert!(matches!(
            CassetteReader::with_config(config),
            Err(CassetteError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_high_speed_binary_adds_third_zero() {
        assert_eq!(program(&[1, 2, 0, 0]).high_speed_binary(), vec![1, 2, 0, 0, 0]);
        // Already three zeros
        assert_eq!(program(&[1, 0, 0, 0]).high_speed_binary(), vec![1, 0, 0, 0]);
        assert_eq!(program(&[1, 2, 3, 0]).high_speed_binary(), vec![1, 2, 3, 0]);
        assert_eq!(program(&[0, 0]).high_speed_binary(), vec![0, 0]);
        assert!(program(&[]).high_speed_binary().is_empty());
    }

    #[test]
    fn test_basic_detection() {
        let basic = program(&[0xD3, 0xD3, 0xD3, b'A', 0x01, 0x42, 0x0A, 0x00, 0x80, 0x00, 0x00, 0x00]);
        assert!(basic.is_basic());
        assert_eq!(basic.listing().unwrap(), "10 END\n");

        let binary = program(&[0x55, 0x3C, 0x00]);
        assert!(!binary.is_basic());
        assert_eq!(binary.listing(), Err(CassetteError::MissingMagic));
    }

    #[test]
    fn test_silence_finds_nothing() {
        let results = CassetteReader::new().read(&silence(1));
        assert!(results.programs().is_empty());
        assert!(results.new_track_frames().is_empty());
        assert!(results.exhausted().is_none());
    }

    #[test]
    fn test_copies_and_tracks() {
        let encoder = HighSpeedEncoder::new();
        let first = encoder.encode(b"first");
        let second = encoder.encode(b"second");

        // first, second right after it, then second again after a long gap
        let mut samples = first;
        samples.extend_from_slice(&second);
        samples.extend_from_slice(&silence(12));
        samples.extend_from_slice(&second);

        let results = CassetteReader::new().read(&samples);
        let found: Vec<(usize, usize, &[u8])> = results
            .programs()
            .iter()
            .map(|p| (p.track(), p.copy(), p.binary()))
            .collect();
        assert_eq!(
            found,
            vec![
                (1, 1, &b"first"[..]),
                (1, 2, &b"second"[..]),
                (2, 1, &b"second"[..]),
            ]
        );

        assert_eq!(results.new_track_frames().len(), 2);
        assert_eq!(results.new_track_frames()[0], results.programs()[0].start_frame());
        assert_eq!(results.new_track_frames()[1], results.programs()[2].start_frame());
        assert!(results
            .programs()
            .iter()
            .all(|p| p.encoding() == Encoding::HighSpeed));
    }

    #[test]
    fn test_track_gap_is_configurable() {
        let encoder = HighSpeedEncoder::new();
        let mut samples = encoder.encode(&[1, 2, 3]);
        samples.extend_from_slice(&encoder.encode(&[4, 5, 6]));

        // Second copy is found about two seconds into its search
        let config = ReaderConfig {
            new_track_gap_secs: 0.5,
            ..ReaderConfig::default()
        };
        let results = CassetteReader::with_config(config).unwrap().read(&samples);

        let tracks: Vec<(usize, usize)> = results
            .programs()
            .iter()
            .map(|p| (p.track(), p.copy()))
            .collect();
        assert_eq!(tracks, vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn test_cut_off_program_is_exhausted() {
        let samples = HighSpeedEncoder::new().encode(&[0x12; 100]);
        // Stop in the middle of the data
        let cut = samples.len() - SAMPLE_RATE / 2 - 50 * 9 * 32;

        let results = CassetteReader::new().read(&samples[..cut]);
        assert!(results.programs().is_empty());
        assert_eq!(results.new_track_frames().len(), 1);
        match results.exhausted() {
            Some(CassetteError::StreamExhausted { encoding, bytes }) => {
                assert_eq!(*encoding, Encoding::HighSpeed);
                assert!(*bytes > 0 && *bytes < 100);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_program_round_trips_through_audio() {
        let original = program(&[0xD3, 0xD3, 0xD3, b'A', 0x00, 0x00]);
        let audio = original.to_high_speed_audio();

        let results = CassetteReader::new().read(&audio);
        assert_eq!(results.programs().len(), 1);
        assert_eq!(results.programs()[0].binary(), &original.high_speed_binary()[..]);
    }
}
