use crate::bit_history::BitHistory;
use crate::error::CassetteError;
use crate::Encoding;

/// Progress of a tape decoder.
///
/// Starts `Undecided` and moves to `Detected` once the decoder has seen the
/// header of its own format. `Error` and `Finished` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Still looking for a header
    Undecided,
    /// Header found, reading program bytes
    Detected,
    /// Framing broke; the program is unusable
    Error,
    /// End of program reached
    Finished,
}

impl DecoderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DecoderState::Error | DecoderState::Finished)
    }
}

/// Sample-at-a-time decoder for one tape format
///
/// The reader feeds every frame of the (filtered) recording in order. Decoders
/// see the whole buffer so they can look back a few frames, but must only act
/// on `samples[frame]` and earlier.
pub trait TapeDecoder {
    /// Human-readable name, all lower case
    fn name(&self) -> &'static str;

    fn encoding(&self) -> Encoding;

    /// Handle the sample at `frame`. Ignored once the state is terminal.
    fn handle_sample(&mut self, samples: &[i16], frame: usize);

    fn state(&self) -> DecoderState;

    /// Bytes recovered so far
    fn program(&self) -> &[u8];

    /// Bit histories captured when a bit could not be decoded
    fn bad_sections(&self) -> &[BitHistory];

    /// Most recent decode problem, if any
    fn last_error(&self) -> Option<&CassetteError>;

    /// Move the recovered bytes and bad sections out of the decoder
    fn take_output(&mut self) -> (Vec<u8>, Vec<BitHistory>);
}
