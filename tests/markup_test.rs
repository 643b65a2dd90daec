//! Markup integration tests: tag validation through the full pipeline,
//! style-sheet expansion, and the noparse/literal fallbacks.

use std::sync::Arc;

use tagflow::font::{FaceMetrics, GlyphMetrics};
use tagflow::{Color32, FontAsset, FontAssetBuilder, Style, StyleSheet, TextBlock, TextSettings};

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
  for cp in 0x20..=0x7E {
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
// Hex color forms
// =============================================================================

#[test]
fn all_hex_color_forms() {
  let cases = [
    ("<color=#F80>x", Color32::new(0xFF, 0x88, 0x00, 255)),
    ("<color=#F808>x", Color32::new(0xFF, 0x88, 0x00, 0x88)),
    ("<color=#FF8800>x", Color32::new(0xFF, 0x88, 0x00, 255)),
    ("<color=#FF880080>x", Color32::new(0xFF, 0x88, 0x00, 0x80)),
  ];
  for (text, expected) in cases {
    let mut block = block(text);
    let info = block.layout(&settings()).unwrap();
    assert_eq!(info.characters[0].color, expected, "in {text:?}");
  }
}

#[test]
fn invalid_hex_length_renders_literally() {
  let mut block = block("<color=#FF880>x");
  let info = block.layout(&settings()).unwrap();
  // Five digits is not a recognized form; the tag is rejected.
  assert_eq!(info.parsed_text(), "<color=#FF880>x");
}

// =============================================================================
// Style sheets
// =============================================================================

fn sheet() -> Arc<StyleSheet> {
  let mut sheet = StyleSheet::new();
  sheet.insert(Style::new("H1", "<size=20><b>", "</b></size>"));
  sheet.insert(Style::new("Code", "<mspace=12>", "</mspace>"));
  Arc::new(sheet)
}

#[test]
fn style_tag_expands_and_applies() {
  let mut block = block("");
  block.set_style_sheet(Some(sheet()));
  block.set_text("<style=H1>T</style>x");
  let info = block.layout(&settings()).unwrap();

  assert_eq!(info.parsed_text(), "Tx");
  assert!(info.characters[0].style.is_bold());
  assert_eq!(info.characters[0].point_size, 20.0);
  assert!(!info.characters[1].style.is_bold());
  assert_eq!(info.characters[1].point_size, 10.0);
}

#[test]
fn unknown_style_renders_literally() {
  let mut block = block("");
  block.set_style_sheet(Some(sheet()));
  block.set_text("<style=Nope>T");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "<style=Nope>T");
}

#[test]
fn default_style_wraps_whole_text() {
  let mut block = block("");
  block.set_style_sheet(Some(sheet()));
  block.set_default_style("H1");
  block.set_text("ab");
  let info = block.layout(&settings()).unwrap();

  assert_eq!(info.parsed_text(), "ab");
  assert!(info.characters[0].style.is_bold());
  assert!(info.characters[1].style.is_bold());
}

#[test]
fn style_effects_balance_across_close() {
  let mut block = block("");
  block.set_style_sheet(Some(sheet()));
  block.set_text("<style=Code>ab</style>c");
  let info = block.layout(&settings()).unwrap();

  assert_eq!(info.characters[0].x_advance, 12.0);
  assert_eq!(info.characters[1].x_advance, 12.0);
  assert_eq!(info.characters[2].x_advance, 10.0);
}

// =============================================================================
// noparse
// =============================================================================

#[test]
fn noparse_renders_markup_verbatim() {
  let mut block = block("<noparse><b>x</b></noparse>y");
  let info = block.layout(&settings()).unwrap();

  assert_eq!(info.parsed_text(), "<b>x</b>y");
  // None of the literal tag characters are bold.
  for ch in &info.characters[..info.character_count] {
    assert!(!ch.style.is_bold());
  }
}

#[test]
fn noparse_suppresses_inline_replacement() {
  let mut block = block("<noparse><br></noparse>");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.line_count, 1);
  assert_eq!(info.parsed_text(), "<br>");
}

// =============================================================================
// Literal fallbacks
// =============================================================================

#[test]
fn unterminated_tag_is_literal() {
  let mut block = block("a<b");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "a<b");
}

#[test]
fn rich_text_disabled_renders_tags() {
  let mut block = block("<b>x</b>");
  block.rich_text = false;
  block.set_text("<b>x</b>");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "<b>x</b>");
  assert!(!info.characters[0].style.is_bold());
}

#[test]
fn angle_bracket_in_text_is_harmless() {
  let mut block = block("1 < 2 > 0");
  let info = block.layout(&settings()).unwrap();
  assert_eq!(info.parsed_text(), "1 < 2 > 0");
}
