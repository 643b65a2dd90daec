//! Backslash escape decoding
//!
//! The source buffer is a sequence of UTF-16-style code units. An escape
//! decodes to a single unit; `\u` escapes may decode to one half of a
//! surrogate pair, which the builder then combines with the following
//! unit (raw or itself escaped) exactly like unescaped surrogates.
//!
//! Malformed escapes (`\u12G4`, truncated hex) are not errors: the caller
//! falls through to literal-character handling and the backslash renders
//! as text.

use crate::color::hex_digit;

/// A successfully decoded escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedEscape {
  /// The decoded code unit. For `\uXXXX` this may be a lone surrogate
  /// half; the builder pairs it with the following unit.
  pub unit: u32,
  /// Number of source units consumed, including the backslash.
  pub consumed: usize,
}

/// Attempts to decode an escape sequence at `start`, which must index the
/// backslash itself. Returns `None` when the sequence is not a recognized
/// escape, leaving the caller to emit the backslash literally.
pub fn decode_escape(units: &[u32], start: usize) -> Option<DecodedEscape> {
  debug_assert_eq!(units.get(start).copied(), Some(0x5C));
  let selector = units.get(start + 1).copied()?;

  let simple = |unit: u32| Some(DecodedEscape { unit, consumed: 2 });
  match selector {
    0x5C => simple(0x5C),            // \\
    0x6E => simple(0x0A),            // \n
    0x72 => simple(0x0D),            // \r
    0x74 => simple(0x09),            // \t
    0x76 => simple(0x0B),            // \v
    0x75 => hex_escape(units, start, 4), // \uXXXX
    0x55 => hex_escape(units, start, 8), // \UXXXXXXXX
    _ => None,
  }
}

fn hex_escape(units: &[u32], start: usize, digits: usize) -> Option<DecodedEscape> {
  let mut value: u32 = 0;
  for offset in 0..digits {
    let cp = units.get(start + 2 + offset).copied()?;
    let digit = hex_digit(cp)?;
    value = (value << 4) | u32::from(digit);
  }
  Some(DecodedEscape {
    unit: value,
    consumed: digits + 2,
  })
}
