//! Layout output model
//!
//! A layout pass produces a [`TextInfo`]: per-character records
//! ([`CharacterInfo`]), per-line records ([`LineInfo`]), link spans, word
//! spans, and aggregate measurements. The buffers are owned by the text
//! object and reused across passes: they are invalidated and rebuilt
//! wholesale, growing by powers of two and never shrinking mid-pass.

pub mod breaking;
pub mod context;
pub mod engine;
pub mod stacks;

use std::sync::Arc;

use crate::color::{Color32, ColorGradient};
use crate::font::resolver::ResolvedElement;
use crate::font::{FontAsset, FontStyleFlags};

/// A 2D point/vector in object space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
  pub x: f32,
  pub y: f32,
}

impl Vec2 {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// Min/max bounding box, tracked incrementally during layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
  pub min: Vec2,
  pub max: Vec2,
}

impl Extents {
  /// An inverted box that any real point will shrink onto.
  pub fn empty() -> Self {
    Self {
      min: Vec2::new(f32::MAX, f32::MAX),
      max: Vec2::new(f32::MIN, f32::MIN),
    }
  }

  pub fn include(&mut self, point: Vec2) {
    self.min.x = self.min.x.min(point.x);
    self.min.y = self.min.y.min(point.y);
    self.max.x = self.max.x.max(point.x);
    self.max.y = self.max.y.max(point.y);
  }

  pub fn width(&self) -> f32 {
    (self.max.x - self.min.x).max(0.0)
  }

  pub fn height(&self) -> f32 {
    (self.max.y - self.min.y).max(0.0)
  }
}

impl Default for Extents {
  fn default() -> Self {
    Self::empty()
  }
}

/// Horizontal alignment of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalAlignment {
  #[default]
  Left,
  Center,
  Right,
  /// Inter-word spacing stretched so interior lines fill the width.
  Justified,
  /// Like `Justified`, but the last line stretches too.
  Flush,
}

impl HorizontalAlignment {
  /// Justified/flush lines get a 1.05 width tolerance before wrapping.
  pub fn is_fitted(self) -> bool {
    matches!(self, HorizontalAlignment::Justified | HorizontalAlignment::Flush)
  }
}

/// Behavior when text exceeds the layout rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowMode {
  /// Keep laying out past the bounds.
  #[default]
  Overflow,
  /// Stop at the last fitting character.
  Truncate,
  /// Stop at the last fitting character and append an ellipsis.
  Ellipsis,
}

/// One laid-out character.
#[derive(Debug, Clone, Default)]
pub struct CharacterInfo {
  /// Code point after case transforms.
  pub unicode: u32,
  /// Index of the first source unit this character came from.
  pub source_index: usize,
  /// The resolved glyph or sprite, `None` for control characters and
  /// characters that failed resolution.
  pub element: Option<ResolvedElement>,
  /// Font asset the glyph was taken from (the sprite path records the
  /// asset inside `element`).
  pub font: Option<Arc<FontAsset>>,
  /// Material bound for this character's quad.
  pub material_hash: u32,
  pub style: FontStyleFlags,
  /// Point size in effect, after `<size>` and auto-sizing.
  pub point_size: f32,
  /// Final scale from font units to object space.
  pub scale: f32,
  /// Pen x position where this character started.
  pub origin: f32,
  /// Baseline y for this character (includes `<voffset>`/sub/superscript).
  pub baseline: f32,
  /// Horizontal advance consumed by this character.
  pub x_advance: f32,
  pub ascender: f32,
  pub descender: f32,
  /// Top-left corner of the glyph quad.
  pub top_left: Vec2,
  /// Bottom-right corner of the glyph quad.
  pub bottom_right: Vec2,
  pub color: Color32,
  pub underline_color: Color32,
  pub strikethrough_color: Color32,
  pub highlight_color: Color32,
  pub gradient: Option<ColorGradient>,
  /// Shear/rotation applied at mesh generation, in degrees.
  pub rotation: f32,
  pub italic_angle: f32,
  /// Whether this character produces a visible quad.
  pub is_visible: bool,
  pub line_number: usize,
  pub page_number: usize,
}

/// One laid-out line.
#[derive(Debug, Clone, Default)]
pub struct LineInfo {
  pub first_character: usize,
  pub first_visible_character: usize,
  pub last_character: usize,
  pub last_visible_character: usize,
  pub character_count: usize,
  pub visible_character_count: usize,
  /// Extremes across the line's characters, in object space.
  pub ascender: f32,
  pub baseline: f32,
  pub descender: f32,
  /// Pen width consumed, excluding trailing whitespace.
  pub width: f32,
  /// Full pen width consumed, including trailing whitespace.
  pub length: f32,
  /// Widest single character advance on the line.
  pub max_advance: f32,
  pub extents: Extents,
  pub alignment: HorizontalAlignment,
}

/// A `<link>`/`<a href>` span.
#[derive(Debug, Clone, Default)]
pub struct LinkInfo {
  /// Case-insensitive hash of the link id.
  pub hash: u32,
  /// The literal id string, case preserved.
  pub id: String,
  pub first_character: usize,
  pub character_count: usize,
}

/// A word span, delimited by whitespace and punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordInfo {
  pub first_character: usize,
  pub last_character: usize,
  pub character_count: usize,
}

/// The read-only result of a layout pass.
#[derive(Debug, Default)]
pub struct TextInfo {
  pub characters: Vec<CharacterInfo>,
  pub lines: Vec<LineInfo>,
  pub links: Vec<LinkInfo>,
  pub words: Vec<WordInfo>,
  /// Logical character count for this pass; `characters` may be longer
  /// (buffers never shrink).
  pub character_count: usize,
  pub visible_character_count: usize,
  pub line_count: usize,
  pub word_count: usize,
  pub page_count: usize,
  /// Index of the first character that no longer fit, when truncated.
  pub first_overflow_character: Option<usize>,
  /// Whether the text was cut short by `Truncate`/`Ellipsis` overflow.
  pub truncated: bool,
  /// Tight size of the laid-out text, margins excluded.
  pub rendered_width: f32,
  pub rendered_height: f32,
  /// Size the text would occupy unconstrained, margins included.
  pub preferred_width: f32,
  pub preferred_height: f32,
}

impl TextInfo {
  /// Resets per-pass state, keeping allocations.
  pub fn clear(&mut self) {
    self.characters.clear();
    self.lines.clear();
    self.links.clear();
    self.words.clear();
    self.character_count = 0;
    self.visible_character_count = 0;
    self.line_count = 0;
    self.word_count = 0;
    self.page_count = 0;
    self.first_overflow_character = None;
    self.truncated = false;
    self.rendered_width = 0.0;
    self.rendered_height = 0.0;
    self.preferred_width = 0.0;
    self.preferred_height = 0.0;
  }

  /// Characters of line `index`, in logical order.
  pub fn line_characters(&self, index: usize) -> &[CharacterInfo] {
    let line = &self.lines[index];
    if line.character_count == 0 {
      return &[];
    }
    &self.characters[line.first_character..=line.last_character]
  }

  /// The laid-out text with markup stripped, after case transforms.
  pub fn parsed_text(&self) -> String {
    self.characters[..self.character_count]
      .iter()
      .filter_map(|c| char::from_u32(c.unicode))
      .collect()
  }
}

/// Grows `buffer` to hold at least `needed` default-initialized entries,
/// rounding capacity to the next power of two. Existing content within
/// `needed` is retained; the buffer never shrinks.
pub(crate) fn grow_buffer<T: Clone + Default>(buffer: &mut Vec<T>, needed: usize) {
  if buffer.len() < needed {
    let target = needed.next_power_of_two();
    if buffer.capacity() < target {
      buffer.reserve_exact(target - buffer.len());
    }
    buffer.resize(needed, T::default());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extents_track_min_max() {
    let mut extents = Extents::empty();
    extents.include(Vec2::new(1.0, -2.0));
    extents.include(Vec2::new(-3.0, 4.0));
    assert_eq!(extents.min, Vec2::new(-3.0, -2.0));
    assert_eq!(extents.max, Vec2::new(1.0, 4.0));
    assert_eq!(extents.width(), 4.0);
    assert_eq!(extents.height(), 6.0);
  }

  #[test]
  fn grow_buffer_rounds_to_power_of_two() {
    let mut buffer: Vec<u32> = Vec::new();
    grow_buffer(&mut buffer, 5);
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.capacity(), 8);
    grow_buffer(&mut buffer, 3);
    assert_eq!(buffer.len(), 5, "never shrinks");
  }

  #[test]
  fn fitted_alignments() {
    assert!(HorizontalAlignment::Justified.is_fitted());
    assert!(HorizontalAlignment::Flush.is_fitted());
    assert!(!HorizontalAlignment::Left.is_fitted());
  }
}
