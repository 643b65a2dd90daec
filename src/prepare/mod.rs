//! Text processing array builder
//!
//! Converts raw source text into the normalized element sequence the
//! layout engine consumes. The source is a buffer of UTF-16-style code
//! units (a `&str` converts losslessly; UTF-16 buffers pass through
//! unchanged), scanned left to right:
//!
//! 1. Backslash escapes decode to single units (`\n`, `\t`, `\uXXXX`,
//!    `\UXXXXXXXX`, ...); malformed escapes fall through to literal text.
//! 2. A high surrogate followed by a low surrogate collapses into one
//!    code point (two source units, one element). Escaped and raw halves
//!    pair freely.
//! 3. With rich text enabled, `<` starts an inline-replacement probe:
//!    `<br>`/`<cr>`/`<nbsp>`/`<zwsp>`/`<zwj>`/`<shy>` replace themselves
//!    with their control code point, and `<style=...>`/`</style>` splice
//!    in style-sheet definitions (recursively, with a per-depth hash
//!    stack so nested styles close in order). Any other tag is left for
//!    the layout engine's own validator.
//! 4. Everything else is emitted verbatim.
//!
//! The output array is owned by the text object and reused across layout
//! passes: capacity grows to the next power of two and never shrinks
//! mid-pass. A trailing zero-code-point element terminates the logical
//! content; consumers must not assume physical length equals logical
//! length.

pub mod escape;

use crate::markup::hash::NameHasher;
use crate::markup::{tag_kind, TagKind};
use crate::style::StyleSheet;
use escape::decode_escape;

/// Maximum nesting depth for `<style>` expansion. A style whose
/// definition re-enters itself stops expanding at this depth and renders
/// literally from there on.
pub const MAX_STYLE_DEPTH: usize = 16;

/// Origin of a processing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
  /// Present in the source text.
  Character,
  /// Inserted by markup processing (style expansion, inline replacement).
  Markup,
}

/// One entry of the text processing array.
#[derive(Debug, Clone, Copy)]
pub struct TextElement {
  pub kind: ElementKind,
  /// Unicode scalar value (post surrogate combination). Zero terminates
  /// the logical content.
  pub unicode: u32,
  /// Index of the first source unit this element was produced from.
  pub source_index: usize,
  /// Number of source units consumed (0 for inserted elements).
  pub source_length: u8,
}

impl TextElement {
  #[inline]
  pub fn character(unicode: u32, source_index: usize, source_length: u8) -> Self {
    Self {
      kind: ElementKind::Character,
      unicode,
      source_index,
      source_length,
    }
  }

  #[inline]
  pub fn markup(unicode: u32, source_index: usize, source_length: u8) -> Self {
    Self {
      kind: ElementKind::Markup,
      unicode,
      source_index,
      source_length,
    }
  }
}

/// Pluggable hook run over the source text before conversion, e.g. for
/// localization or glyph substitution at the string level.
pub trait TextPreprocessor {
  fn preprocess(&self, text: &str) -> String;
}

/// Inputs for one build pass.
#[derive(Debug, Clone, Copy)]
pub struct PrepareRequest<'a> {
  /// Source code units (UTF-16 style; see [`units_from_str`]).
  pub source: &'a [u32],
  /// Whether `<...>` markup is interpreted at all.
  pub rich_text: bool,
  /// Whether backslash escapes are decoded.
  pub parse_escapes: bool,
  /// Style sheet consulted for `<style>` expansion.
  pub sheet: Option<&'a StyleSheet>,
  /// Hash of the text object's default style, or
  /// [`crate::style::normal_style_hash`] for none.
  pub default_style: u32,
}

#[derive(Debug, Clone, Copy)]
enum Origin {
  /// Elements map 1:1 onto source spans.
  Source,
  /// Elements were spliced in by style expansion; they all carry the
  /// originating tag's source index and zero length.
  Inserted { index: usize },
}

enum InlineOutcome {
  /// The tag was consumed; resume scanning at this unit index.
  Consumed(usize),
  /// Not an inline tag (or suppressed by `<noparse>`); emit `<` literally.
  Literal,
}

/// Builds the text processing array. Owns the style-nesting scratch state
/// so one instance belongs to one text object.
#[derive(Debug, Default)]
pub struct TextPreparer {
  /// Per-depth stacks of style name hashes; index = nesting depth.
  style_stacks: Vec<Vec<u32>>,
  /// Set while between `<noparse>` and `</noparse>`; suppresses all
  /// inline replacement so the layout validator sees the region verbatim.
  noparse: bool,
}

impl TextPreparer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Converts `request.source` into `out`, returning the logical element
  /// count (excluding the zero sentinel).
  pub fn build(&mut self, request: &PrepareRequest, out: &mut Vec<TextElement>) -> usize {
    for stack in &mut self.style_stacks {
      stack.clear();
    }
    self.noparse = false;

    out.clear();
    reserve_pow2(out, request.source.len() + 1);

    let default_style = request
      .rich_text
      .then(|| {
        request
          .sheet
          .and_then(|sheet| sheet.get_style(request.default_style))
          .map(|style| (style.hash(), style.opening().to_vec(), style.closing().to_vec()))
      })
      .flatten();

    if let Some((hash, opening, _)) = &default_style {
      self.stack_at(0).push(*hash);
      self.process(opening, Origin::Inserted { index: 0 }, 1, request, out);
    }

    self.process(request.source, Origin::Source, 0, request, out);

    if let Some((_, _, closing)) = &default_style {
      self.stack_at(0).pop();
      let index = request.source.len().saturating_sub(1);
      self.process(closing, Origin::Inserted { index }, 1, request, out);
    }

    let logical = out.len();
    reserve_pow2(out, 1);
    out.push(TextElement::character(0, request.source.len(), 0));
    logical
  }

  fn process(
    &mut self,
    units: &[u32],
    origin: Origin,
    depth: usize,
    request: &PrepareRequest,
    out: &mut Vec<TextElement>,
  ) {
    let mut i = 0usize;
    while i < units.len() {
      let unit = units[i];

      if request.parse_escapes && unit == 0x5C {
        if let Some(esc) = decode_escape(units, i) {
          if is_high_surrogate(esc.unit) {
            let next = i + esc.consumed;
            if let Some((low, low_len)) = peek_unit(units, next, request.parse_escapes) {
              if is_low_surrogate(low) {
                let combined = combine_surrogates(esc.unit, low);
                emit(out, origin, combined, i, esc.consumed + low_len);
                i = next + low_len;
                continue;
              }
            }
          }
          emit(out, origin, esc.unit, i, esc.consumed);
          i += esc.consumed;
          continue;
        }
        // Malformed escape: the backslash falls through as a literal.
      }

      if is_high_surrogate(unit) {
        if let Some(&low) = units.get(i + 1) {
          if is_low_surrogate(low) {
            emit(out, origin, combine_surrogates(unit, low), i, 2);
            i += 2;
            continue;
          }
        }
      }

      if request.rich_text && unit == 0x3C {
        match self.try_inline_tag(units, i, origin, depth, request, out) {
          InlineOutcome::Consumed(next) => {
            i = next;
            continue;
          }
          InlineOutcome::Literal => {}
        }
      }

      emit(out, origin, unit, i, 1);
      i += 1;
    }
  }

  fn try_inline_tag(
    &mut self,
    units: &[u32],
    lt_index: usize,
    origin: Origin,
    depth: usize,
    request: &PrepareRequest,
    out: &mut Vec<TextElement>,
  ) -> InlineOutcome {
    let Some(tag) = scan_inline_tag(units, lt_index) else {
      return InlineOutcome::Literal;
    };
    let kind = tag_kind(tag.name_hash);

    if self.noparse {
      // Only the closing tag ends the verbatim region; it stays in the
      // stream so the layout validator consumes it too.
      if kind == Some(TagKind::NoParseClose) {
        self.noparse = false;
      }
      return InlineOutcome::Literal;
    }

    let tag_len = (tag.end - lt_index + 1).min(u8::MAX as usize) as u8;
    let replace = |out: &mut Vec<TextElement>, unicode: u32| {
      let index = match origin {
        Origin::Source => lt_index,
        Origin::Inserted { index } => index,
      };
      let length = match origin {
        Origin::Source => tag_len,
        Origin::Inserted { .. } => 0,
      };
      reserve_pow2(out, 1);
      out.push(TextElement::markup(unicode, index, length));
    };

    match kind {
      Some(TagKind::LineBreak) => {
        replace(out, 0x0A);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::CarriageReturn) => {
        replace(out, 0x0D);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::NonBreakingSpace) => {
        replace(out, 0xA0);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::ZeroWidthSpace) => {
        replace(out, 0x200B);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::ZeroWidthJoiner) => {
        replace(out, 0x200D);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::SoftHyphen) => {
        replace(out, 0xAD);
        InlineOutcome::Consumed(tag.end + 1)
      }
      Some(TagKind::NoParse) => {
        self.noparse = true;
        InlineOutcome::Literal
      }
      Some(TagKind::Style) => self.expand_opening_style(&tag, lt_index, origin, depth, request, out),
      Some(TagKind::StyleClose) => self.expand_closing_style(&tag, lt_index, origin, depth, request, out),
      _ => InlineOutcome::Literal,
    }
  }

  fn expand_opening_style(
    &mut self,
    tag: &InlineTag,
    lt_index: usize,
    origin: Origin,
    depth: usize,
    request: &PrepareRequest,
    out: &mut Vec<TextElement>,
  ) -> InlineOutcome {
    if depth + 1 >= MAX_STYLE_DEPTH {
      return InlineOutcome::Literal;
    }
    let Some(style) = request.sheet.and_then(|sheet| sheet.get_style(tag.value_hash)) else {
      return InlineOutcome::Literal;
    };
    let (hash, opening) = (style.hash(), style.opening().to_vec());
    self.stack_at(depth + 1).push(hash);
    let inner_origin = inserted_origin(origin, lt_index);
    self.process(&opening, inner_origin, depth + 1, request, out);
    InlineOutcome::Consumed(tag.end + 1)
  }

  fn expand_closing_style(
    &mut self,
    tag: &InlineTag,
    lt_index: usize,
    origin: Origin,
    depth: usize,
    request: &PrepareRequest,
    out: &mut Vec<TextElement>,
  ) -> InlineOutcome {
    // Pop-on-underflow is a no-op: an unmatched </style> is consumed
    // without expansion rather than corrupting the stacks.
    let Some(hash) = self.stack_at(depth + 1).pop() else {
      return InlineOutcome::Consumed(tag.end + 1);
    };
    let Some(style) = request.sheet.and_then(|sheet| sheet.get_style(hash)) else {
      return InlineOutcome::Consumed(tag.end + 1);
    };
    let closing = style.closing().to_vec();
    let inner_origin = inserted_origin(origin, lt_index);
    self.process(&closing, inner_origin, depth + 1, request, out);
    InlineOutcome::Consumed(tag.end + 1)
  }

  fn stack_at(&mut self, depth: usize) -> &mut Vec<u32> {
    if self.style_stacks.len() <= depth {
      self.style_stacks.resize_with(depth + 1, Vec::new);
    }
    &mut self.style_stacks[depth]
  }
}

fn inserted_origin(origin: Origin, lt_index: usize) -> Origin {
  match origin {
    Origin::Source => Origin::Inserted { index: lt_index },
    inserted @ Origin::Inserted { .. } => inserted,
  }
}

#[derive(Debug, Clone, Copy)]
struct InlineTag {
  name_hash: u32,
  value_hash: u32,
  /// Index of the closing `>`.
  end: usize,
}

/// Minimal tag probe for the builder's fast path. Recognizes
/// `<name>`/`<name=value>`/`<name="value">` shapes only; a space, nested
/// `<`, missing `>`, or over-long tag returns `None` and the tag is left
/// for the layout validator.
fn scan_inline_tag(units: &[u32], lt_index: usize) -> Option<InlineTag> {
  let cap = lt_index + 1 + crate::markup::scanner::MAX_TAG_LENGTH;
  let mut hasher = NameHasher::new();
  let mut i = lt_index + 1;
  let mut name_len = 0usize;

  loop {
    let unit = *units.get(i)?;
    if i >= cap || unit == 0 {
      return None;
    }
    match unit {
      0x3E => {
        if name_len == 0 {
          return None;
        }
        return Some(InlineTag {
          name_hash: hasher.finish(),
          value_hash: 0,
          end: i,
        });
      }
      0x3D => break,
      0x3C | 0x20 => return None,
      _ => {
        hasher.write(unit);
        name_len += 1;
      }
    }
    i += 1;
  }

  if name_len == 0 {
    return None;
  }
  let name_hash = hasher.finish();
  let mut value_hasher = NameHasher::new();
  let mut quoted = false;
  i += 1;
  if units.get(i).copied() == Some(0x22) {
    quoted = true;
    i += 1;
  }

  loop {
    let unit = *units.get(i)?;
    if i >= cap || unit == 0 {
      return None;
    }
    match unit {
      0x22 if quoted => {
        quoted = false;
      }
      0x3E if !quoted => {
        return Some(InlineTag {
          name_hash,
          value_hash: value_hasher.finish(),
          end: i,
        });
      }
      0x3C => return None,
      _ => value_hasher.write(unit),
    }
    i += 1;
  }
}

#[inline]
fn peek_unit(units: &[u32], i: usize, parse_escapes: bool) -> Option<(u32, usize)> {
  let unit = *units.get(i)?;
  if parse_escapes && unit == 0x5C {
    if let Some(decoded) = decode_escape(units, i) {
      return Some((decoded.unit, decoded.consumed));
    }
  }
  Some((unit, 1))
}

#[inline]
fn emit(out: &mut Vec<TextElement>, origin: Origin, unicode: u32, at: usize, length: usize) {
  reserve_pow2(out, 1);
  let element = match origin {
    Origin::Source => TextElement::character(unicode, at, length.min(u8::MAX as usize) as u8),
    Origin::Inserted { index } => TextElement::markup(unicode, index, 0),
  };
  out.push(element);
}

#[inline]
pub fn is_high_surrogate(unit: u32) -> bool {
  (0xD800..=0xDBFF).contains(&unit)
}

#[inline]
pub fn is_low_surrogate(unit: u32) -> bool {
  (0xDC00..=0xDFFF).contains(&unit)
}

/// Combines a surrogate pair into its UTF-32 code point.
#[inline]
pub fn combine_surrogates(high: u32, low: u32) -> u32 {
  0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
}

/// Grows `out` so `additional` more elements fit, rounding the target
/// capacity to the next power of two. Never shrinks.
fn reserve_pow2(out: &mut Vec<TextElement>, additional: usize) {
  let needed = out.len() + additional;
  if needed > out.capacity() {
    let target = needed.next_power_of_two();
    out.reserve_exact(target - out.len());
  }
}

/// Converts a `&str` into source code units.
///
/// Rust strings carry whole scalar values, so no surrogate pairs occur
/// here; they arise only from `\u` escapes or UTF-16 input.
pub fn units_from_str(text: &str, out: &mut Vec<u32>) {
  out.clear();
  out.extend(text.chars().map(|c| c as u32));
}

/// Converts a UTF-16 buffer into source code units, preserving surrogate
/// halves for the builder to combine.
pub fn units_from_utf16(text: &[u16], out: &mut Vec<u32>) {
  out.clear();
  out.extend(text.iter().map(|&u| u as u32));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::style::{normal_style_hash, Style, StyleSheet};

  fn build(text: &str) -> Vec<TextElement> {
    build_with(text, None, true, true)
  }

  fn build_with(
    text: &str,
    sheet: Option<&StyleSheet>,
    rich_text: bool,
    parse_escapes: bool,
  ) -> Vec<TextElement> {
    let mut units = Vec::new();
    units_from_str(text, &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text,
      parse_escapes,
      sheet,
      default_style: normal_style_hash(),
    };
    let mut out = Vec::new();
    let logical = TextPreparer::new().build(&request, &mut out);
    assert_eq!(out[logical].unicode, 0, "sentinel terminates logical content");
    out.truncate(logical);
    out
  }

  fn code_points(elements: &[TextElement]) -> Vec<u32> {
    elements.iter().map(|e| e.unicode).collect()
  }

  // ===========================================================================
  // Escapes and surrogates
  // ===========================================================================

  #[test]
  fn escapes_decode_to_single_elements() {
    let out = build("a\\nb\\tc\\\\d");
    assert_eq!(code_points(&out), vec![0x61, 0x0A, 0x62, 0x09, 0x63, 0x5C, 0x64]);
    assert_eq!(out[1].source_length, 2);
  }

  #[test]
  fn short_and_long_unicode_escapes() {
    let out = build("\\u2026\\U0001F600");
    assert_eq!(code_points(&out), vec![0x2026, 0x1F600]);
    assert_eq!(out[0].source_length, 6);
    assert_eq!(out[1].source_length, 10);
  }

  #[test]
  fn escaped_surrogate_pair_combines() {
    let out = build("\\uD83D\\uDE00");
    assert_eq!(code_points(&out), vec![0x1F600]);
    assert_eq!(out[0].source_length, 12);
  }

  #[test]
  fn raw_utf16_surrogate_pair_combines() {
    let mut units = Vec::new();
    units_from_utf16(&[0x0041, 0xD83D, 0xDE00, 0x0042], &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text: true,
      parse_escapes: true,
      sheet: None,
      default_style: normal_style_hash(),
    };
    let mut out = Vec::new();
    let logical = TextPreparer::new().build(&request, &mut out);
    out.truncate(logical);
    assert_eq!(code_points(&out), vec![0x41, 0x1F600, 0x42]);
    assert_eq!(out[1].source_index, 1);
    assert_eq!(out[1].source_length, 2);
  }

  #[test]
  fn unpaired_surrogate_passes_through() {
    let mut units = Vec::new();
    units_from_utf16(&[0xD83D, 0x0041], &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text: true,
      parse_escapes: true,
      sheet: None,
      default_style: normal_style_hash(),
    };
    let mut out = Vec::new();
    let logical = TextPreparer::new().build(&request, &mut out);
    out.truncate(logical);
    assert_eq!(code_points(&out), vec![0xD83D, 0x41]);
  }

  #[test]
  fn malformed_escape_is_literal() {
    let out = build("\\u12G4");
    assert_eq!(code_points(&out), vec![0x5C, 0x75, 0x31, 0x32, 0x47, 0x34]);
  }

  #[test]
  fn escapes_disabled_pass_through() {
    let out = build_with("a\\nb", None, true, false);
    assert_eq!(code_points(&out), vec![0x61, 0x5C, 0x6E, 0x62]);
  }

  // ===========================================================================
  // Inline replacement tags
  // ===========================================================================

  #[test]
  fn br_replaces_with_line_feed() {
    let out = build("a<br>b");
    assert_eq!(code_points(&out), vec![0x61, 0x0A, 0x62]);
    assert_eq!(out[1].kind, ElementKind::Markup);
    assert_eq!(out[1].source_index, 1);
    assert_eq!(out[1].source_length, 4);
  }

  #[test]
  fn zero_width_and_space_tags() {
    let out = build("<nbsp><zwsp><zwj><shy><cr>");
    assert_eq!(code_points(&out), vec![0xA0, 0x200B, 0x200D, 0xAD, 0x0D]);
  }

  #[test]
  fn unknown_tag_left_for_layout_validator() {
    let out = build("<b>x");
    assert_eq!(code_points(&out), vec![0x3C, 0x62, 0x3E, 0x78]);
  }

  #[test]
  fn rich_text_disabled_leaves_tags() {
    let out = build_with("a<br>b", None, false, true);
    assert_eq!(code_points(&out), "a<br>b".chars().map(|c| c as u32).collect::<Vec<_>>());
  }

  #[test]
  fn noparse_suppresses_replacement() {
    let out = build("<noparse><br></noparse><br>");
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "<noparse><br></noparse>\n");
  }

  // ===========================================================================
  // Style expansion
  // ===========================================================================

  fn sheet() -> StyleSheet {
    let mut sheet = StyleSheet::new();
    sheet.insert(Style::new("H1", "<size=36><b>", "</b></size>"));
    sheet.insert(Style::new("Outer", "[<style=Inner>", "</style>]"));
    sheet.insert(Style::new("Inner", "(", ")"));
    sheet.insert(Style::new("Loop", "<style=Loop>x", "</style>"));
    sheet
  }

  #[test]
  fn style_expansion_reproduces_definition() {
    let sheet = sheet();
    let out = build_with("<style=H1>T</style>", Some(&sheet), true, true);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "<size=36><b>T</b></size>");
    // Inserted elements carry the originating tag position.
    assert_eq!(out[0].kind, ElementKind::Markup);
    assert_eq!(out[0].source_index, 0);
  }

  #[test]
  fn nested_styles_close_in_order() {
    let sheet = sheet();
    let out = build_with("<style=Outer>x</style>", Some(&sheet), true, true);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "[(x)]");
  }

  #[test]
  fn unknown_style_is_literal() {
    let sheet = sheet();
    let out = build_with("<style=Missing>x", Some(&sheet), true, true);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "<style=Missing>x");
  }

  #[test]
  fn unmatched_style_close_is_consumed() {
    let sheet = sheet();
    let out = build_with("a</style>b", Some(&sheet), true, true);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "ab");
  }

  #[test]
  fn self_referential_style_stops_at_depth_cap() {
    let sheet = sheet();
    let out = build_with("<style=Loop>", Some(&sheet), true, true);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    // Expansion bottoms out; the innermost reference renders literally.
    assert!(text.contains("<style=Loop>"));
    assert_eq!(text.matches('x').count(), MAX_STYLE_DEPTH - 1);
  }

  #[test]
  fn default_style_wraps_content() {
    let sheet = sheet();
    let mut units = Vec::new();
    units_from_str("T", &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text: true,
      parse_escapes: true,
      sheet: Some(&sheet),
      default_style: crate::markup::hash::name_hash("H1"),
    };
    let mut out = Vec::new();
    let logical = TextPreparer::new().build(&request, &mut out);
    out.truncate(logical);
    let text: String = out.iter().filter_map(|e| char::from_u32(e.unicode)).collect();
    assert_eq!(text, "<size=36><b>T</b></size>");
  }

  // ===========================================================================
  // Buffer policy
  // ===========================================================================

  #[test]
  fn capacity_is_power_of_two_and_reused() {
    let mut units = Vec::new();
    let mut out = Vec::new();
    let mut preparer = TextPreparer::new();

    units_from_str(&"x".repeat(100), &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text: true,
      parse_escapes: true,
      sheet: None,
      default_style: normal_style_hash(),
    };
    preparer.build(&request, &mut out);
    assert_eq!(out.capacity(), 128);

    // A shorter second pass reuses the buffer without shrinking.
    let mut units = Vec::new();
    units_from_str("short", &mut units);
    let request = PrepareRequest {
      source: &units,
      rich_text: true,
      parse_escapes: true,
      sheet: None,
      default_style: normal_style_hash(),
    };
    preparer.build(&request, &mut out);
    assert_eq!(out.capacity(), 128);
  }
}
