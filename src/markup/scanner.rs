//! Markup tag tokenizer/validator
//!
//! Given the processing array and the index of the element immediately
//! after a `<`, [`TagScanner::scan`] decides whether a syntactically valid
//! tag follows and, if so, where its closing `>` sits. While scanning it
//! fills a fixed attribute array with case-insensitive name/value hashes
//! and typed value spans; no substring is ever allocated.
//!
//! Scanning is purely syntactic. Whether the tag *means* anything is the
//! caller's concern: it dispatches the tag-name hash through
//! [`crate::markup::tag_kind`] and treats both scan failure and an
//! unrecognized name as literal text.
//!
//! The scanner owns its scratch state (attribute array, cursor bookkeeping)
//! so concurrent text objects never alias; one scanner instance belongs to
//! one text object.

use crate::color::{decode_hex_color, Color32};
use crate::markup::hash::NameHasher;
use crate::markup::{TagAttribute, TagUnit, TagValueKind};
use crate::prepare::TextElement;

/// Maximum number of elements scanned before a tag is rejected.
pub const MAX_TAG_LENGTH: usize = 128;

/// Maximum number of attributes captured per tag; excess attributes are
/// scanned for validity but not recorded.
pub const MAX_ATTRIBUTES: usize = 8;

/// Sentinel ceiling for numeric tag values; anything above rejects the tag.
pub const NUMERIC_VALUE_CEILING: f32 = 32767.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
  /// Accumulating the current attribute's name (attribute 0 is the tag).
  Name,
  /// Seen `=`, deciding how the value is delimited.
  ValueStart,
  /// Inside an unquoted value.
  BareValue,
  /// Inside a `"..."` value.
  QuotedValue,
  /// Value closed; only space or `>` may follow.
  AfterValue,
}

/// Result of a successful tag scan.
#[derive(Debug, Clone, Copy)]
pub struct ScannedTag {
  /// Index of the closing `>` element in the processing array.
  pub closing_index: usize,
  /// Number of attributes captured (at least 1: the tag itself).
  pub attribute_count: usize,
}

/// Tag tokenizer with per-object scratch state.
#[derive(Debug)]
pub struct TagScanner {
  /// Captured attributes; slot 0 is the tag name/value itself.
  pub attributes: [TagAttribute; MAX_ATTRIBUTES],
}

impl TagScanner {
  pub fn new() -> Self {
    Self {
      attributes: [TagAttribute::default(); MAX_ATTRIBUTES],
    }
  }

  /// Scans a tag starting at `start`, the element index immediately after
  /// the opening `<`.
  ///
  /// Returns `None` (tag is literal text) when:
  /// - the scan runs past [`MAX_TAG_LENGTH`] elements or the end of the
  ///   logical content without finding `>`,
  /// - an unescaped `<` appears inside the tag,
  /// - a value assignment appears without a preceding attribute name, or
  ///   a second value group opens without a space separator.
  ///
  /// On success the attribute array holds the captured attributes and the
  /// returned [`ScannedTag`] carries the index of `>`.
  pub fn scan(&mut self, elements: &[TextElement], start: usize) -> Option<ScannedTag> {
    for attr in self.attributes.iter_mut() {
      attr.clear();
    }

    let mut attr_index = 0usize;
    let mut captured = 1usize;
    let mut state = ScanState::Name;
    let mut name_hasher = NameHasher::new();
    let mut name_len = 0usize;
    let mut value_hasher = NameHasher::new();
    let mut unit = TagUnit::Pixels;

    let mut i = start;
    let cap = start + MAX_TAG_LENGTH;

    while i < elements.len() && i < cap {
      let cp = elements[i].unicode;
      if cp == 0 {
        // Logical end of content before `>`.
        return None;
      }

      match cp {
        0x3E => {
          // `>` terminates the tag. A dangling `=` with no value is
          // malformed; an empty tag name is malformed.
          if state == ScanState::ValueStart || state == ScanState::QuotedValue {
            return None;
          }
          if attr_index == 0 && name_len == 0 {
            return None;
          }
          self.finish_slot(attr_index, captured, name_hasher, value_hasher, i, unit, state);
          return Some(ScannedTag {
            closing_index: i,
            attribute_count: captured.min(MAX_ATTRIBUTES),
          });
        }
        0x3C => {
          // Unescaped `<` inside a tag.
          return None;
        }
        _ => {}
      }

      match state {
        ScanState::Name => match cp {
          0x3D => {
            // `=` with no name opens a value group without an attribute.
            if name_len == 0 {
              return None;
            }
            state = ScanState::ValueStart;
          }
          0x20 => {
            if name_len > 0 {
              self.finish_slot(attr_index, captured, name_hasher, value_hasher, i, unit, state);
              attr_index += 1;
              captured += 1;
              name_hasher = NameHasher::new();
              name_len = 0;
              value_hasher = NameHasher::new();
              unit = TagUnit::Pixels;
            }
            // Leading/duplicate spaces are skipped without opening a slot.
          }
          _ => {
            name_hasher.write(cp);
            name_len += 1;
          }
        },
        ScanState::ValueStart => {
          let slot = self.slot(attr_index);
          match cp {
            0x22 => {
              if let Some(slot) = slot {
                slot.kind = TagValueKind::StringValue;
                slot.value_start = i + 1;
              }
              state = ScanState::QuotedValue;
            }
            0x23 => {
              if let Some(slot) = slot {
                slot.kind = TagValueKind::Color;
                slot.value_start = i;
                slot.value_length = 1;
              }
              value_hasher.write(cp);
              state = ScanState::BareValue;
            }
            0x2B | 0x2D | 0x2E | 0x30..=0x39 => {
              if let Some(slot) = slot {
                slot.kind = TagValueKind::Numerical;
                slot.value_start = i;
                slot.value_length = 1;
              }
              value_hasher.write(cp);
              state = ScanState::BareValue;
            }
            0x20 => return None,
            _ => {
              if let Some(slot) = slot {
                slot.kind = TagValueKind::StringValue;
                slot.value_start = i;
                slot.value_length = 1;
              }
              value_hasher.write(cp);
              state = ScanState::BareValue;
            }
          }
        }
        ScanState::BareValue => match cp {
          0x20 => {
            self.finish_slot(attr_index, captured, name_hasher, value_hasher, i, unit, state);
            attr_index += 1;
            captured += 1;
            name_hasher = NameHasher::new();
            name_len = 0;
            value_hasher = NameHasher::new();
            unit = TagUnit::Pixels;
            state = ScanState::Name;
          }
          0x3D => {
            // `<size=5=6>`: second value group without a separator.
            return None;
          }
          _ => {
            let numeric = self
              .slot_kind(attr_index)
              .map(|k| k == TagValueKind::Numerical)
              .unwrap_or(false);
            if numeric && (cp == 0x25 || cp == 0x65 || cp == 0x6D) {
              // `%`, `e`, `em` unit suffixes end the numeric span.
              unit = match cp {
                0x25 => TagUnit::Percentage,
                _ => TagUnit::FontUnits,
              };
            } else if numeric && unit != TagUnit::Pixels {
              // Only `m` (of `em`) may follow a suffix character.
              return None;
            } else {
              value_hasher.write(cp);
              if let Some(slot) = self.slot(attr_index) {
                slot.value_length += 1;
              }
            }
          }
        },
        ScanState::QuotedValue => match cp {
          0x22 => {
            state = ScanState::AfterValue;
          }
          _ => {
            value_hasher.write(cp);
            if let Some(slot) = self.slot(attr_index) {
              if slot.value_length == 0 {
                slot.value_start = i;
              }
              slot.value_length += 1;
            }
          }
        },
        ScanState::AfterValue => match cp {
          0x20 => {
            self.finish_slot(attr_index, captured, name_hasher, value_hasher, i, unit, state);
            attr_index += 1;
            captured += 1;
            name_hasher = NameHasher::new();
            name_len = 0;
            value_hasher = NameHasher::new();
            unit = TagUnit::Pixels;
            state = ScanState::Name;
          }
          _ => return None,
        },
      }

      i += 1;
    }

    // Ran out of content or hit the length cap without a closing `>`.
    None
  }

  /// Returns the captured tag-name hash (attribute slot 0).
  #[inline]
  pub fn tag_hash(&self) -> u32 {
    self.attributes[0].name_hash
  }

  fn slot(&mut self, index: usize) -> Option<&mut TagAttribute> {
    self.attributes.get_mut(index)
  }

  fn slot_kind(&self, index: usize) -> Option<TagValueKind> {
    self.attributes.get(index).map(|a| a.kind)
  }

  #[allow(clippy::too_many_arguments)]
  fn finish_slot(
    &mut self,
    attr_index: usize,
    captured: usize,
    name_hasher: NameHasher,
    value_hasher: NameHasher,
    _at: usize,
    unit: TagUnit,
    _state: ScanState,
  ) {
    if captured > MAX_ATTRIBUTES {
      return;
    }
    if let Some(slot) = self.attributes.get_mut(attr_index) {
      slot.name_hash = name_hasher.finish();
      slot.value_hash = value_hasher.finish();
      slot.unit = unit;
    }
  }
}

impl Default for TagScanner {
  fn default() -> Self {
    Self::new()
  }
}

/// Parses a numerical attribute value from its span.
///
/// Accepts an optional sign, integer digits, and a fractional part.
/// Returns `None` on empty or malformed spans and on values whose
/// magnitude exceeds [`NUMERIC_VALUE_CEILING`].
pub fn numeric_value(elements: &[TextElement], attr: &TagAttribute) -> Option<f32> {
  if attr.kind != TagValueKind::Numerical || attr.value_length == 0 {
    return None;
  }
  let span = elements.get(attr.value_start..attr.value_start + attr.value_length)?;

  let mut negative = false;
  let mut idx = 0;
  match span[0].unicode {
    0x2D => {
      negative = true;
      idx = 1;
    }
    0x2B => idx = 1,
    _ => {}
  }

  let mut integer: f64 = 0.0;
  let mut fraction: f64 = 0.0;
  let mut divisor: f64 = 1.0;
  let mut in_fraction = false;
  let mut digits = 0;

  while idx < span.len() {
    match span[idx].unicode {
      cp @ 0x30..=0x39 => {
        let digit = (cp - 0x30) as f64;
        if in_fraction {
          divisor *= 10.0;
          fraction += digit / divisor;
        } else {
          integer = integer * 10.0 + digit;
        }
        digits += 1;
      }
      0x2E if !in_fraction => in_fraction = true,
      _ => return None,
    }
    idx += 1;
  }

  if digits == 0 {
    return None;
  }

  let mut value = (integer + fraction) as f32;
  if negative {
    value = -value;
  }
  if value.abs() > NUMERIC_VALUE_CEILING {
    return None;
  }
  Some(value)
}

/// Decodes a color attribute value (`#RGB`/`#RGBA`/`#RRGGBB`/`#RRGGBBAA`).
pub fn color_value(elements: &[TextElement], attr: &TagAttribute) -> Option<Color32> {
  if attr.kind != TagValueKind::Color || attr.value_length < 2 {
    return None;
  }
  let span = elements.get(attr.value_start..attr.value_start + attr.value_length)?;
  debug_assert_eq!(span[0].unicode, 0x23);
  let digits: Vec<u32> = span[1..].iter().map(|e| e.unicode).collect();
  decode_hex_color(&digits)
}

/// Materializes a string attribute value, preserving case.
pub fn string_value(elements: &[TextElement], attr: &TagAttribute) -> String {
  let end = (attr.value_start + attr.value_length).min(elements.len());
  elements[attr.value_start.min(end)..end]
    .iter()
    .filter_map(|e| char::from_u32(e.unicode))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::markup::hash::name_hash;
  use crate::markup::{tag_kind, TagKind};

  fn elements(text: &str) -> Vec<TextElement> {
    let mut out: Vec<TextElement> = text
      .chars()
      .enumerate()
      .map(|(i, c)| TextElement::character(c as u32, i, 1))
      .collect();
    out.push(TextElement::character(0, text.len(), 0));
    out
  }

  fn scan(text: &str) -> Option<(TagScanner, ScannedTag)> {
    // `text` starts with '<'; scan from index 1.
    let els = elements(text);
    let mut scanner = TagScanner::new();
    scanner.scan(&els, 1).map(|tag| (scanner, tag))
  }

  // ===========================================================================
  // Basic validity
  // ===========================================================================

  #[test]
  fn simple_tag() {
    let (scanner, tag) = scan("<b>").unwrap();
    assert_eq!(tag.closing_index, 2);
    assert_eq!(tag_kind(scanner.tag_hash()), Some(TagKind::Bold));
  }

  #[test]
  fn closing_tag() {
    let (scanner, _) = scan("</b>").unwrap();
    assert_eq!(tag_kind(scanner.tag_hash()), Some(TagKind::BoldClose));
  }

  #[test]
  fn unterminated_tag_rejected() {
    assert!(scan("<b").is_none());
    assert!(scan("<size=42").is_none());
  }

  #[test]
  fn nested_open_angle_rejected() {
    assert!(scan("<si<ze>").is_none());
  }

  #[test]
  fn empty_tag_rejected() {
    assert!(scan("<>").is_none());
  }

  #[test]
  fn over_long_tag_rejected() {
    let long = format!("<{}>", "x".repeat(MAX_TAG_LENGTH + 1));
    assert!(scan(&long).is_none());
  }

  #[test]
  fn double_value_group_rejected() {
    assert!(scan("<size=5=6>").is_none());
  }

  #[test]
  fn dangling_equals_rejected() {
    assert!(scan("<size=>").is_none());
  }

  // ===========================================================================
  // Value classification
  // ===========================================================================

  #[test]
  fn numeric_pixel_value() {
    let (scanner, _) = scan("<size=24.5>").unwrap();
    let attr = &scanner.attributes[0];
    assert_eq!(attr.kind, TagValueKind::Numerical);
    assert_eq!(attr.unit, TagUnit::Pixels);
    let els = elements("<size=24.5>");
    assert_eq!(numeric_value(&els, attr), Some(24.5));
  }

  #[test]
  fn numeric_percentage_value() {
    let els = elements("<size=80%>");
    let mut scanner = TagScanner::new();
    scanner.scan(&els, 1).unwrap();
    let attr = &scanner.attributes[0];
    assert_eq!(attr.unit, TagUnit::Percentage);
    assert_eq!(numeric_value(&els, attr), Some(80.0));
  }

  #[test]
  fn numeric_font_unit_value() {
    for text in ["<space=1.5e>", "<space=1.5em>"] {
      let els = elements(text);
      let mut scanner = TagScanner::new();
      scanner.scan(&els, 1).unwrap();
      let attr = &scanner.attributes[0];
      assert_eq!(attr.unit, TagUnit::FontUnits, "in {text}");
      assert_eq!(numeric_value(&els, attr), Some(1.5), "in {text}");
    }
  }

  #[test]
  fn negative_numeric_value() {
    let els = elements("<voffset=-1.25>");
    let mut scanner = TagScanner::new();
    scanner.scan(&els, 1).unwrap();
    assert_eq!(numeric_value(&els, &scanner.attributes[0]), Some(-1.25));
  }

  #[test]
  fn numeric_ceiling_rejected() {
    let els = elements("<size=40000>");
    let mut scanner = TagScanner::new();
    scanner.scan(&els, 1).unwrap();
    assert_eq!(numeric_value(&els, &scanner.attributes[0]), None);
  }

  #[test]
  fn color_value_decodes() {
    let els = elements("<color=#FF8800>");
    let mut scanner = TagScanner::new();
    scanner.scan(&els, 1).unwrap();
    let attr = &scanner.attributes[0];
    assert_eq!(attr.kind, TagValueKind::Color);
    assert_eq!(color_value(&els, attr), Some(Color32::new(255, 136, 0, 255)));
  }

  #[test]
  fn string_value_hash_is_case_folded() {
    let (scanner, _) = scan("<align=LEFT>").unwrap();
    assert_eq!(scanner.attributes[0].value_hash, name_hash("left"));
  }

  // ===========================================================================
  // Attributes
  // ===========================================================================

  #[test]
  fn named_attributes() {
    let text = "<sprite name=\"star\" index=3>";
    let els = elements(text);
    let mut scanner = TagScanner::new();
    let tag = scanner.scan(&els, 1).unwrap();
    assert_eq!(tag.attribute_count, 3);
    assert_eq!(scanner.attributes[1].name_hash, name_hash("name"));
    assert_eq!(scanner.attributes[1].kind, TagValueKind::StringValue);
    assert_eq!(string_value(&els, &scanner.attributes[1]), "star");
    assert_eq!(scanner.attributes[2].name_hash, name_hash("index"));
    assert_eq!(numeric_value(&els, &scanner.attributes[2]), Some(3.0));
  }

  #[test]
  fn quoted_value_preserves_spaces() {
    let text = "<font=\"Liberation Sans\">";
    let els = elements(text);
    let mut scanner = TagScanner::new();
    let tag = scanner.scan(&els, 1).unwrap();
    assert_eq!(tag.attribute_count, 1);
    assert_eq!(string_value(&els, &scanner.attributes[0]), "Liberation Sans");
  }

  #[test]
  fn text_after_quoted_value_rejected() {
    assert!(scan("<font=\"x\"y>").is_none());
  }

  #[test]
  fn excess_attributes_scan_but_do_not_capture() {
    let text = "<sprite a=1 b=2 c=3 d=4 e=5 f=6 g=7 h=8 i=9>";
    let els = elements(text);
    let mut scanner = TagScanner::new();
    let tag = scanner.scan(&els, 1).unwrap();
    assert_eq!(tag.attribute_count, MAX_ATTRIBUTES);
  }
}
