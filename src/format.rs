//! Numeric text formatting
//!
//! `set_text_format` writes a pattern with positional float arguments
//! directly into the text backing buffer, avoiding any intermediate
//! string allocation:
//!
//! - `{0}` substitutes argument 0 with up to two fractional digits as
//!   needed.
//! - `{0:2}` is the legacy precision shorthand: exactly two fractional
//!   digits.
//! - `{0:000.00}` pads the integer part with zeros to three digits and
//!   emits exactly two fractional digits.
//!
//! Rounding uses a fixed table of halved negative powers of ten rather
//! than a floating-point `powf` call. Negative values emit a leading
//! `-`. An argument index outside 0-7 or braces without a digit index
//! pass through as literal characters.

use crate::error::{FormatError, Result};

/// Most positional arguments a pattern can reference.
pub const MAX_FORMAT_ARGS: usize = 8;

/// Largest supported fractional precision.
pub const MAX_PRECISION: usize = 9;

/// `ROUNDING[p]` is added before truncating to `p` fractional digits.
const ROUNDING: [f64; 10] = [
  0.5, 0.05, 0.005, 0.0005, 0.00005, 0.000005, 0.0000005, 0.00000005, 0.000000005, 0.0000000005,
];

/// Expands `pattern` into code units appended to `out`.
///
/// `out` is the text object's backing buffer; the caller clears it
/// beforehand when replacing the whole text.
pub fn format_into(pattern: &str, args: &[f32], out: &mut Vec<u32>) -> Result<()> {
  if args.len() > MAX_FORMAT_ARGS {
    return Err(
      FormatError::TooManyArguments {
        count: args.len(),
        max: MAX_FORMAT_ARGS,
      }
      .into(),
    );
  }

  let units: Vec<u32> = pattern.chars().map(|c| c as u32).collect();
  let mut i = 0usize;
  while i < units.len() {
    if units[i] == 0x7B {
      if let Some((spec, next)) = parse_placeholder(&units, i) {
        if let Some(&value) = args.get(spec.index) {
          write_float(value, spec.padding, spec.precision, out);
          i = next;
          continue;
        }
        // Valid syntax but no such argument: pass the braces through.
      }
    }
    out.push(units[i]);
    i += 1;
  }
  Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Placeholder {
  index: usize,
  /// Zero-pad the integer part to this many digits (0 = natural).
  padding: usize,
  /// Exact fractional digits, or `None` for as-needed (up to 2).
  precision: Option<usize>,
}

/// Parses `{N}`, `{N:P}`, or `{N:000.00}` starting at the `{`.
/// Returns the spec and the index just past `}`.
fn parse_placeholder(units: &[u32], start: usize) -> Option<(Placeholder, usize)> {
  let mut i = start + 1;
  let digit = *units.get(i)?;
  if !(0x30..=0x39).contains(&digit) {
    return None;
  }
  let index = (digit - 0x30) as usize;
  i += 1;

  let mut padding = 0usize;
  let mut precision = None;

  match *units.get(i)? {
    0x7D => return Some((Placeholder { index, padding, precision }, i + 1)),
    0x3A => i += 1,
    _ => return None,
  }

  // After ':' comes either a bare precision digit or a 000.00 pattern.
  let mut zeros_before = 0usize;
  let mut zeros_after = 0usize;
  let mut seen_dot = false;
  let mut bare_digit = None;
  loop {
    match *units.get(i)? {
      0x7D => {
        i += 1;
        break;
      }
      0x30 => {
        if seen_dot {
          zeros_after += 1;
        } else {
          zeros_before += 1;
        }
      }
      0x2E => {
        if seen_dot {
          return None;
        }
        seen_dot = true;
      }
      d @ 0x31..=0x39 if !seen_dot && zeros_before == 0 && bare_digit.is_none() => {
        bare_digit = Some((d - 0x30) as usize);
      }
      _ => return None,
    }
    i += 1;
  }

  if let Some(p) = bare_digit {
    precision = Some(p.min(MAX_PRECISION));
  } else {
    padding = zeros_before;
    precision = Some(zeros_after.min(MAX_PRECISION));
  }
  Some((Placeholder { index, padding, precision }, i))
}

/// Writes `value` as code units with the given padding/precision.
fn write_float(value: f32, padding: usize, precision: Option<usize>, out: &mut Vec<u32>) {
  let mut value = value as f64;
  if value < 0.0 {
    out.push(0x2D);
    value = -value;
  }

  let (precision, trim_trailing) = match precision {
    Some(p) => (p, false),
    // As-needed: round at two digits, then drop trailing zeros.
    None => (2, true),
  };

  value += ROUNDING[precision];
  let mut integer = value as u64;
  let mut fraction = value - integer as f64;

  // Integer digits, most significant first, zero-padded.
  let mut digits = [0u8; 20];
  let mut count = 0usize;
  loop {
    digits[count] = (integer % 10) as u8;
    integer /= 10;
    count += 1;
    if integer == 0 {
      break;
    }
  }
  for _ in count..padding {
    out.push(0x30);
  }
  for d in (0..count).rev() {
    out.push(0x30 + u32::from(digits[d]));
  }

  if precision == 0 {
    return;
  }

  let mut frac_digits = [0u8; 10];
  for slot in frac_digits.iter_mut().take(precision) {
    fraction *= 10.0;
    let digit = fraction as u8;
    *slot = digit.min(9);
    fraction -= f64::from(digit);
  }

  let mut last = precision;
  if trim_trailing {
    while last > 0 && frac_digits[last - 1] == 0 {
      last -= 1;
    }
  }
  if last == 0 {
    return;
  }
  out.push(0x2E);
  for &d in frac_digits.iter().take(last) {
    out.push(0x30 + u32::from(d));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fmt(pattern: &str, args: &[f32]) -> String {
    let mut out = Vec::new();
    format_into(pattern, args, &mut out).unwrap();
    out.iter().filter_map(|&u| char::from_u32(u)).collect()
  }

  #[test]
  fn plain_substitution() {
    assert_eq!(fmt("{0} pts", &[42.0]), "42 pts");
    assert_eq!(fmt("{0}/{1}", &[3.0, 7.0]), "3/7");
  }

  #[test]
  fn as_needed_fraction() {
    assert_eq!(fmt("{0}", &[1.5]), "1.5");
    assert_eq!(fmt("{0}", &[1.25]), "1.25");
    assert_eq!(fmt("{0}", &[2.0]), "2");
  }

  #[test]
  fn legacy_precision_shorthand() {
    assert_eq!(fmt("{0:2}", &[1.5]), "1.50");
    assert_eq!(fmt("{0:3}", &[2.0]), "2.000");
  }

  #[test]
  fn padded_pattern() {
    assert_eq!(fmt("{0:000.00}", &[7.5]), "007.50");
    assert_eq!(fmt("{0:00}", &[3.0]), "03");
    assert_eq!(fmt("{0:0.0}", &[12.34]), "12.3");
  }

  #[test]
  fn rounding_at_precision() {
    assert_eq!(fmt("{0:1}", &[1.25]), "1.3");
    assert_eq!(fmt("{0:0}", &[1.5]), "2");
    assert_eq!(fmt("{0}", &[0.999]), "1");
  }

  #[test]
  fn negative_values() {
    assert_eq!(fmt("{0:2}", &[-1.0]), "-1.00");
    assert_eq!(fmt("{0}", &[-3.0]), "-3");
    assert_eq!(fmt("{0:1}", &[-2.45]), "-2.5");
  }

  #[test]
  fn out_of_range_index_passes_through() {
    assert_eq!(fmt("{8} {1}", &[1.0, 2.0]), "{8} 2");
    assert_eq!(fmt("{3}", &[1.0]), "{3}");
  }

  #[test]
  fn non_placeholder_braces_pass_through() {
    assert_eq!(fmt("{x} {} {0", &[1.0]), "{x} {} {0");
  }

  #[test]
  fn too_many_arguments_is_an_error() {
    let mut out = Vec::new();
    let result = format_into("{0}", &[0.0; 9], &mut out);
    assert!(result.is_err());
  }
}
