//! Listing of tokenized Level II BASIC programs
//!
//! A BASIC program on tape is the magic `D3 D3 D3`, a one-byte name, then
//! lines of `[address: u16 LE][line number: u16 LE][tokens...][0x00]`. An
//! address of zero ends the program. Addresses are regenerated by BASIC when a
//! program loads, so they only mark where lines stop.

use crate::error::{BasicField, CassetteError, Result};

const MAGIC: [u8; 3] = [0xD3, 0xD3, 0xD3];

const DATA: u8 = 0x88;
const REM: u8 = 0x93;
const ELSE: u8 = 0x95;
const REM_QUOTE: u8 = 0xFB;

/// Keyword text for tokens 0x80 to 0xFF. Empty entries are unassigned.
const KEYWORDS: [&str; 128] = [
    "END", "FOR", "RESET", "SET", "CLS", "CMD", "RANDOM", "NEXT", // 0x80
    "DATA", "INPUT", "DIM", "READ", "LET", "GOTO", "RUN", "IF", // 0x88
    "RESTORE", "GOSUB", "RETURN", "REM", "STOP", "ELSE", "TRON", "TROFF", // 0x90
    "DEFSTR", "DEFINT", "DEFSNG", "DEFDBL", "LINE", "EDIT", "ERROR", "RESUME", // 0x98
    "OUT", "ON", "OPEN", "FIELD", "GET", "PUT", "CLOSE", "LOAD", // 0xA0
    "MERGE", "NAME", "KILL", "LSET", "RSET", "SAVE", "SYSTEM", "LPRINT", // 0xA8
    "DEF", "POKE", "PRINT", "CONT", "LIST", "LLIST", "DELETE", "AUTO", // 0xB0
    "CLEAR", "CLOAD", "CSAVE", "NEW", "TAB(", "TO", "FN", "USING", // 0xB8
    "VARPTR", "USR", "ERL", "ERR", "STRING", "INSTR", "POINT", "TIME$", // 0xC0
    "MEM", "INKEY$", "THEN", "NOT", "STEP", "+", "-", "*", // 0xC8
    "/", "[", "AND", "OR", ">", "=", "<", "SGN", // 0xD0
    "INT", "ABS", "FRE", "INP", "POS", "SQR", "RND", "LOG", // 0xD8
    "EXP", "COS", "SIN", "TAN", "ATN", "PEEK", "CVI", "CVS", // 0xE0
    "CVD", "EOF", "LOC", "LOF", "MKI", "MKS$", "MKD$", "CINT", // 0xE8
    "CSNG", "CDBL", "FIX", "LEN", "STR$", "VAL", "ASC", "CHR$", // 0xF0
    "LEFT$", "RIGHT$", "MID$", "'", "", "", "", "", // 0xF8
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    StringLiteral,
    /// After DATA or REM, copied verbatim to the end of the line
    Raw,
    /// Just ate a colon
    Colon,
    /// Just ate a colon and a REM
    ColonRem,
}

/// Whether the bytes start with the BASIC magic number
pub fn is_basic_program(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

/// Convert a tokenized BASIC program to its listing, one line per BASIC line
pub fn detokenize(bytes: &[u8]) -> Result<String> {
    if !is_basic_program(bytes) || bytes.len() < MAGIC.len() + 1 {
        return Err(CassetteError::MissingMagic);
    }

    // Skip the magic and the one-byte program name
    let mut input = Input::new(&bytes[MAGIC.len() + 1..]);
    let mut out = String::new();

    loop {
        let address = input.read_u16(BasicField::LineAddress)?;
        if address == 0 {
            break;
        }

        let line_number = input.read_u16(BasicField::LineNumber)?;
        out.push_str(&format!("{} ", line_number));

        let mut state = State::Normal;
        loop {
            let ch = input.read_u8(BasicField::Line)?;
            if ch == 0 {
                break;
            }
            state = detokenize_byte(&mut out, state, ch);
        }

        // Pending colon or colon-REM at end of line
        flush_colon(&mut out, state);
        out.push('\n');
    }

    Ok(out)
}

/// Handle one byte of a line, returning the next state
fn detokenize_byte(out: &mut String, state: State, ch: u8) -> State {
    // ":REM'" is the backward-compatible spelling of a single quote comment
    match (state, ch) {
        (State::Normal, b':') => return State::Colon,
        (State::Colon, b':') => {
            out.push(':');
            return State::Colon;
        }
        (State::Colon, REM) => return State::ColonRem,
        (State::ColonRem, REM_QUOTE) => {
            out.push('\'');
            return State::Raw;
        }
        (State::Colon, ELSE) => {
            out.push_str("ELSE");
            return State::Normal;
        }
        _ => {}
    }

    let state = flush_colon(out, state).unwrap_or(state);

    match state {
        State::Normal => {
            push_token(out, ch);
            match ch {
                DATA | REM => State::Raw,
                b'"' => State::StringLiteral,
                _ => State::Normal,
            }
        }
        State::StringLiteral => {
            match ch {
                b'\r' => out.push_str("\\n"),
                b' '..=0x7F if ch != b'\\' => out.push(ch as char),
                _ => out.push_str(&format!("\\{:03o}", ch)),
            }
            if ch == b'"' {
                State::Normal
            } else {
                State::StringLiteral
            }
        }
        State::Raw => {
            out.push(ch as char);
            State::Raw
        }
        // Flushed above
        State::Colon | State::ColonRem => state,
    }
}

/// Emit a pending `:` or `:REM`, returning the state it resolves to
fn flush_colon(out: &mut String, state: State) -> Option<State> {
    match state {
        State::Colon => {
            out.push(':');
            Some(State::Normal)
        }
        State::ColonRem => {
            out.push_str(":REM");
            Some(State::Raw)
        }
        _ => None,
    }
}

fn push_token(out: &mut String, ch: u8) {
    if ch >= 0x80 {
        let keyword = KEYWORDS[(ch - 0x80) as usize];
        if !keyword.is_empty() {
            out.push_str(keyword);
            return;
        }
    }
    // Latin-1
    out.push(ch as char);
}

struct Input<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Input<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn read_u8(&mut self, field: BasicField) -> Result<u8> {
        let byte = *self
            .bytes
            .get(self.position)
            .ok_or(CassetteError::Truncated(field))?;
        self.position += 1;
        Ok(byte)
    }

    /// Little-endian
    fn read_u16(&mut self, field: BasicField) -> Result<u16> {
        let low = self.read_u8(field)?;
        let high = self.read_u8(field)?;
        Ok(u16::from_le_bytes([low, high]))
    }
}
