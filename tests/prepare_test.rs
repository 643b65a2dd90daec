//! Preparation integration tests: escapes, surrogate pairs, inline
//! replacement tags, numeric formatting, and the preprocessing hook,
//! all driven through the public text-object API.

use std::sync::Arc;

use tagflow::font::{FaceMetrics, GlyphMetrics};
use tagflow::{FontAsset, FontAssetBuilder, TextBlock, TextPreprocessor, TextSettings};

fn test_font() -> Arc<FontAsset> {
  let face = FaceMetrics {
    family_name: "TestSans".to_string(),
    point_size: 10.0,
    scale: 1.0,
    line_height: 12.0,
    ascender: 8.0,
    descender: -2.0,
    ..Default::default()
  };
  let mut builder = FontAssetBuilder::new(face);
  for cp in (0x20..=0x7E).chain([0xA0, 0x2026, 0x25A1, 0x1F600]) {
    builder = builder.glyph(
      cp,
      tagflow::font::Glyph {
        index: cp,
        metrics: GlyphMetrics {
          width: 8.0,
          height: 10.0,
          bearing_x: 1.0,
          bearing_y: 8.0,
          advance: 10.0,
        },
        ..Default::default()
      },
    );
  }
  builder.build()
}

fn block(text: &str) -> TextBlock {
  let mut block = TextBlock::new();
  block.font = Some(test_font());
  block.font_size = 10.0;
  block.set_text(text);
  block
}

fn settings() -> TextSettings {
  TextSettings::default()
}

// =============================================================================
// Escape sequences
// =============================================================================

#[test]
fn newline_escape_breaks_lines() {
  let mut block = block("Line1\\nLine2");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.line_count, 2);
  assert_eq!(info.character_count, 11);
}

#[test]
fn tab_escape_advances_to_tab_stop() {
  let mut block = block("a\\tb");
  let info = block.layout(&settings()).unwrap();
  // Tab width is 10 at this size; 'a' ends at 10, so the tab jumps to 20.
  assert_eq!(info.characters[2].origin, 20.0);
}

#[test]
fn unicode_escapes_decode() {
  let mut block = block("\\u2026\\U0001F600");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.character_count, 2);
  assert_eq!(info.characters[0].unicode, 0x2026);
  assert_eq!(info.characters[1].unicode, 0x1F600);
}

#[test]
fn escaped_surrogate_pair_combines() {
  let mut block = block("\\uD83D\\uDE00");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.character_count, 1);
  assert_eq!(info.characters[0].unicode, 0x1F600);
}

#[test]
fn escape_parsing_can_be_disabled() {
  let mut block = block("");
  block.parse_escapes = false;
  block.set_text("a\\nb");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.line_count, 1);
  assert_eq!(info.parsed_text(), "a\\nb");
}

// =============================================================================
// UTF-16 input
// =============================================================================

#[test]
fn utf16_surrogate_pair_collapses() {
  let mut block = block("");
  block.set_text_utf16(&[0x0041, 0xD83D, 0xDE00, 0x0042]);
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.character_count, 3);
  assert_eq!(info.characters[1].unicode, 0x1F600);
  assert_eq!(info.characters[1].source_index, 1);
}

// =============================================================================
// Inline replacement tags
// =============================================================================

#[test]
fn br_tag_breaks_line() {
  let mut block = block("a<br>b");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.line_count, 2);
  assert_eq!(info.character_count, 3);
}

#[test]
fn nbsp_tag_prevents_wrapping() {
  let mut block = block("aaa<nbsp>bbb");
  block.size = (50.0, f32::INFINITY);
  let info = block.layout(&settings()).unwrap();
  // No break opportunity at the non-breaking space; the word
  // emergency-breaks instead of splitting at the space.
  let first_line = &info.lines[0];
  let break_char = info.characters[first_line.last_character].unicode;
  assert_ne!(break_char, 0xA0, "must not break at nbsp");
}

// =============================================================================
// Numeric formatting
// =============================================================================

#[test]
fn formatted_text_lays_out() {
  let mut block = block("");
  block.set_text_format("{0:00}/{1}", &[7.0, 42.0]).unwrap();
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "07/42");
}

#[test]
fn format_precision_and_padding() {
  let mut block = block("");
  block.set_text_format("{0:000.00}pt", &[9.5]).unwrap();
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "009.50pt");
}

#[test]
fn format_rejects_too_many_args() {
  let mut block = block("");
  assert!(block.set_text_format("{0}", &[0.0; 9]).is_err());
}

// =============================================================================
// Preprocessing hook
// =============================================================================

struct Reverser;

impl TextPreprocessor for Reverser {
  fn preprocess(&self, text: &str) -> String {
    text.chars().rev().collect()
  }
}

#[test]
fn preprocessor_transforms_source() {
  let mut block = block("");
  block.set_preprocessor(Some(Box::new(Reverser)));
  block.set_text("abc");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "cba");
}

// =============================================================================
// Parsed text
// =============================================================================

#[test]
fn parsed_text_strips_markup() {
  let mut block = block("<b>Hello</b> <i>world</i>");
  let parsed = block.parsed_text(&settings()).unwrap();
  assert_eq!(parsed, "Hello world");
}
