//! Wire codec for the constrained device channel.
//!
//! The channel is asymmetric. Outbound (controller → device) has byte-level
//! bandwidth: a release percentage travels as a raw `0..=100` byte and
//! readiness as a `0`/`1` byte. Inbound (device → controller) is limited to a
//! single printable character, so the desired percentage is quantized to one
//! of ten steps (`'0'..='9'`, each worth 10%) plus the sentinel `'A'` for the
//! unrepresentable "complete at 100%" action.
//!
//! Decoding is strict: any byte outside the inbound alphabet is a protocol
//! violation and is rejected rather than coerced.

use thiserror::Error;

/// Errors produced while decoding inbound wire bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The byte is not in the inbound alphabet `'0'..='9' | 'A'`.
    #[error("protocol violation: unexpected inbound byte 0x{0:02x}")]
    ProtocolViolation(u8),
}

/// One symbol of the inbound single-character alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSymbol {
    /// A decimal digit `0..=9`, representing `digit * 10` percent.
    Digit(u8),
    /// The `'A'` sentinel: complete the release at 100%.
    Complete,
}

impl WireSymbol {
    /// The byte that travels on the wire for this symbol.
    pub fn as_byte(self) -> u8 {
        match self {
            WireSymbol::Digit(d) => b'0' + d,
            WireSymbol::Complete => b'A',
        }
    }
}

/// A decoded inbound command.
///
/// `Complete` is a distinct intent, not the number 100: the planner drops the
/// rollback target entirely when it sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the canary traffic share to the given percentage (a multiple of 10).
    SetPercentage(u8),
    /// Complete the release: full cutover to the candidate version.
    Complete,
}

/// Quantize a desired percentage into the inbound alphabet.
///
/// Division truncates, so 0–9 → `'0'`, 10–19 → `'1'`, and so on. Exactly 100
/// maps to the completion sentinel.
pub fn quantize(desired_pct: u8) -> WireSymbol {
    if desired_pct >= 100 {
        WireSymbol::Complete
    } else {
        WireSymbol::Digit(desired_pct / 10)
    }
}

/// Encode a release percentage for the outbound channel. Values above 100 are
/// clamped.
pub fn encode_percentage(pct: u8) -> u8 {
    pct.min(100)
}

/// Encode a readiness flag for the outbound channel.
pub fn encode_ready(ready: bool) -> u8 {
    ready as u8
}

/// Decode one inbound byte into a [`Command`].
pub fn decode(byte: u8) -> Result<Command, CodecError> {
    match byte {
        b'0'..=b'9' => Ok(Command::SetPercentage((byte - b'0') * 10)),
        b'A' => Ok(Command::Complete),
        other => Err(CodecError::ProtocolViolation(other)),
    }
}
