//! Layout scan state and word-wrap snapshots
//!
//! Every accumulator the layout scan mutates lives in [`LayoutContext`],
//! a dedicated value struct threaded through the engine — the text
//! object configures a pass, the context *is* the pass. That split makes
//! checkpointing trivial: [`WordWrapState`] captures the whole context
//! (plus the resume position) as one structural copy, and restoring is
//! the reverse copy. Several snapshots live concurrently during a scan
//! (line start, last hard break, soft-break candidate, ellipsis
//! candidate) with fully divergent values; nothing is shared between
//! them.

use std::sync::Arc;

use crate::color::{Color32, ColorGradient};
use crate::font::{FontAsset, FontStyleFlags, FontWeight, SpriteAsset};
use crate::layout::stacks::TagStack;
use crate::layout::{Extents, HorizontalAlignment};

/// Per-style-bit nesting counter.
///
/// `<b><b>x</b>y</b>`: `y` is still bold; a style bit stays active while
/// its count is positive. Removing an inactive bit is a no-op, so
/// unbalanced closing tags cannot underflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontStyleStack {
  counts: [u8; 16],
}

impl FontStyleStack {
  pub fn clear(&mut self) {
    self.counts = [0; 16];
  }

  pub fn add(&mut self, flag: FontStyleFlags) {
    for bit in 0..16 {
      if flag.bits() & (1 << bit) != 0 {
        self.counts[bit] = self.counts[bit].saturating_add(1);
      }
    }
  }

  pub fn remove(&mut self, flag: FontStyleFlags) {
    for bit in 0..16 {
      if flag.bits() & (1 << bit) != 0 {
        self.counts[bit] = self.counts[bit].saturating_sub(1);
      }
    }
  }

  /// The union of all active style bits.
  pub fn flags(&self) -> FontStyleFlags {
    let mut bits = 0u16;
    for bit in 0..16 {
      if self.counts[bit] > 0 {
        bits |= 1 << bit;
      }
    }
    FontStyleFlags::from_bits(bits)
  }

  pub fn is_balanced(&self) -> bool {
    self.counts.iter().all(|&c| c == 0)
  }
}

/// The complete mutable state of one layout scan.
///
/// Groups, top to bottom: current assets, pen state, per-line trackers,
/// running counts, whole-text trackers, wrap/parse flags, and the markup
/// effect stacks.
#[derive(Debug, Clone)]
pub struct LayoutContext {
  // Current assets.
  pub font: Arc<FontAsset>,
  pub sprite_asset: Option<Arc<SpriteAsset>>,
  pub material_hash: u32,

  // Pen state.
  pub x_advance: f32,
  /// Accumulated downward offset of the current baseline from the first
  /// line's baseline (positive = down).
  pub line_offset: f32,
  pub baseline_offset: f32,
  pub font_size: f32,
  /// Multiplier from sub/superscript and smallcaps, applied on top of
  /// the size-derived scale.
  pub scale_multiplier: f32,
  /// Extra horizontal scale from `<scale>`.
  pub horizontal_scale: f32,
  /// Rotation from `<rotate>`, degrees.
  pub rotation: f32,
  pub character_spacing: f32,
  /// Fixed advance from `<mspace>`, in object units.
  pub monospace_advance: Option<f32>,
  pub word_spacing: f32,

  // Per-line trackers.
  pub line_number: usize,
  pub page_number: usize,
  pub first_character_of_line: usize,
  pub first_visible_character_of_line: usize,
  pub last_visible_character_of_line: usize,
  pub max_line_ascender: f32,
  pub max_line_descender: f32,
  /// Ascender at the moment the line began; line-offset advance uses the
  /// delta against it when a taller glyph appears mid-line.
  pub start_of_line_ascender: f32,
  pub line_indent: f32,

  // Running counts.
  pub character_count: usize,
  pub visible_character_count: usize,
  pub last_visible_character: Option<usize>,

  // Whole-text trackers.
  pub mesh_extents: Extents,
  pub max_cap_height: f32,
  /// Widest line seen so far, trailing whitespace excluded.
  pub max_line_width: f32,

  // Wrap/parse flags.
  pub no_break: bool,
  pub no_parsing: bool,

  // Layout-rect modifiers.
  pub margin_left: f32,
  pub margin_right: f32,
  pub width_override: Option<f32>,

  // Link under construction: index into the links buffer.
  pub open_link: Option<usize>,

  // Markup effect stacks.
  pub style_stack: FontStyleStack,
  pub size_stack: TagStack<f32>,
  pub color_stack: TagStack<Color32>,
  pub underline_color_stack: TagStack<Color32>,
  pub strikethrough_color_stack: TagStack<Color32>,
  pub highlight_color_stack: TagStack<Color32>,
  pub gradient_stack: TagStack<Option<ColorGradient>>,
  pub italic_angle_stack: TagStack<f32>,
  pub weight_stack: TagStack<FontWeight>,
  pub baseline_offset_stack: TagStack<f32>,
  pub action_stack: TagStack<u32>,
  pub material_stack: TagStack<u32>,
  pub font_stack: TagStack<Arc<FontAsset>>,
  pub alignment_stack: TagStack<HorizontalAlignment>,
  pub indent_stack: TagStack<f32>,
  pub line_indent_stack: TagStack<f32>,
  /// `None` means line height follows the face metrics.
  pub line_height_stack: TagStack<Option<f32>>,
}

impl LayoutContext {
  /// A fresh context for one scan pass.
  pub fn new(
    font: Arc<FontAsset>,
    font_size: f32,
    base_color: Color32,
    alignment: HorizontalAlignment,
    character_spacing: f32,
    word_spacing: f32,
  ) -> Self {
    let material_hash = font.material_hash;
    let italic_angle = font.face.italic_slant;
    Self {
      material_hash,
      sprite_asset: None,
      x_advance: 0.0,
      line_offset: 0.0,
      baseline_offset: 0.0,
      font_size,
      scale_multiplier: 1.0,
      horizontal_scale: 1.0,
      rotation: 0.0,
      character_spacing,
      monospace_advance: None,
      word_spacing,
      line_number: 0,
      page_number: 0,
      first_character_of_line: 0,
      first_visible_character_of_line: 0,
      last_visible_character_of_line: 0,
      max_line_ascender: f32::MIN,
      max_line_descender: f32::MAX,
      start_of_line_ascender: f32::MIN,
      line_indent: 0.0,
      character_count: 0,
      visible_character_count: 0,
      last_visible_character: None,
      mesh_extents: Extents::empty(),
      max_cap_height: 0.0,
      max_line_width: 0.0,
      no_break: false,
      no_parsing: false,
      margin_left: 0.0,
      margin_right: 0.0,
      width_override: None,
      open_link: None,
      style_stack: FontStyleStack::default(),
      size_stack: TagStack::new(font_size),
      color_stack: TagStack::new(base_color),
      underline_color_stack: TagStack::new(base_color),
      strikethrough_color_stack: TagStack::new(base_color),
      highlight_color_stack: TagStack::new(base_color),
      gradient_stack: TagStack::new(None),
      italic_angle_stack: TagStack::new(italic_angle),
      weight_stack: TagStack::new(FontWeight::Regular),
      baseline_offset_stack: TagStack::new(0.0),
      action_stack: TagStack::new(0),
      material_stack: TagStack::new(material_hash),
      font_stack: TagStack::new(Arc::clone(&font)),
      alignment_stack: TagStack::new(alignment),
      indent_stack: TagStack::new(0.0),
      line_indent_stack: TagStack::new(0.0),
      line_height_stack: TagStack::new(None),
      font,
    }
  }

  /// Scale from font units to object space for the current size.
  #[inline]
  pub fn current_scale(&self) -> f32 {
    self.font_size / self.font.face.point_size * self.font.face.scale * self.scale_multiplier
  }

  /// True when every effect stack is back at depth zero.
  pub fn stacks_balanced(&self) -> bool {
    self.style_stack.is_balanced()
      && self.size_stack.is_balanced()
      && self.color_stack.is_balanced()
      && self.underline_color_stack.is_balanced()
      && self.strikethrough_color_stack.is_balanced()
      && self.highlight_color_stack.is_balanced()
      && self.gradient_stack.is_balanced()
      && self.italic_angle_stack.is_balanced()
      && self.weight_stack.is_balanced()
      && self.baseline_offset_stack.is_balanced()
      && self.action_stack.is_balanced()
      && self.material_stack.is_balanced()
      && self.font_stack.is_balanced()
      && self.alignment_stack.is_balanced()
      && self.indent_stack.is_balanced()
      && self.line_indent_stack.is_balanced()
      && self.line_height_stack.is_balanced()
  }
}

/// A checkpoint of the full layout state at a candidate break point.
///
/// Capture and restore are symmetric structural copies: restoring
/// reproduces the accumulator state at capture time exactly.
#[derive(Debug, Clone)]
pub struct WordWrapState {
  /// Processing-array index to resume scanning from.
  pub resume_index: usize,
  context: LayoutContext,
}

impl WordWrapState {
  /// Copies every layout accumulator into a new checkpoint.
  pub fn capture(context: &LayoutContext, resume_index: usize) -> Self {
    Self {
      resume_index,
      context: context.clone(),
    }
  }

  /// Copies the checkpointed accumulators back and returns the index to
  /// resume scanning from.
  pub fn restore(&self, context: &mut LayoutContext) -> usize {
    *context = self.context.clone();
    self.resume_index
  }

  /// Character count at capture time; the engine truncates its output
  /// buffers back to this on restore.
  pub fn character_count(&self) -> usize {
    self.context.character_count
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::font::{FaceMetrics, FontAssetBuilder};

  fn context() -> LayoutContext {
    let font = FontAssetBuilder::new(FaceMetrics::default()).build();
    LayoutContext::new(
      font,
      24.0,
      Color32::WHITE,
      HorizontalAlignment::Left,
      0.0,
      0.0,
    )
  }

  #[test]
  fn style_stack_counts_nesting() {
    let mut stack = FontStyleStack::default();
    stack.add(FontStyleFlags::BOLD);
    stack.add(FontStyleFlags::BOLD);
    stack.remove(FontStyleFlags::BOLD);
    assert!(stack.flags().is_bold(), "still nested once");
    stack.remove(FontStyleFlags::BOLD);
    assert!(!stack.flags().is_bold());
    // Underflow is a no-op.
    stack.remove(FontStyleFlags::BOLD);
    assert!(stack.is_balanced());
  }

  #[test]
  fn interleaved_styles_resolve_by_count() {
    let mut stack = FontStyleStack::default();
    stack.add(FontStyleFlags::BOLD);
    stack.add(FontStyleFlags::ITALIC);
    stack.remove(FontStyleFlags::BOLD);
    let flags = stack.flags();
    assert!(flags.is_italic());
    assert!(!flags.is_bold());
  }

  #[test]
  fn snapshot_restore_is_symmetric() {
    let mut ctx = context();
    ctx.x_advance = 123.5;
    ctx.line_number = 3;
    ctx.color_stack.push(Color32::BLACK);
    ctx.style_stack.add(FontStyleFlags::ITALIC);
    ctx.character_count = 42;

    let snapshot = WordWrapState::capture(&ctx, 17);

    // Mutate everything the snapshot should undo.
    ctx.x_advance = 999.0;
    ctx.line_number = 9;
    ctx.color_stack.pop();
    ctx.style_stack.remove(FontStyleFlags::ITALIC);
    ctx.character_count = 99;

    let resume = snapshot.restore(&mut ctx);
    assert_eq!(resume, 17);
    assert_eq!(ctx.x_advance, 123.5);
    assert_eq!(ctx.line_number, 3);
    assert_eq!(*ctx.color_stack.current(), Color32::BLACK);
    assert!(ctx.style_stack.flags().is_italic());
    assert_eq!(ctx.character_count, 42);
  }

  #[test]
  fn concurrent_snapshots_are_independent() {
    let mut ctx = context();
    ctx.x_advance = 10.0;
    let first = WordWrapState::capture(&ctx, 1);
    ctx.x_advance = 20.0;
    let second = WordWrapState::capture(&ctx, 2);

    ctx.x_advance = 30.0;
    second.restore(&mut ctx);
    assert_eq!(ctx.x_advance, 20.0);
    first.restore(&mut ctx);
    assert_eq!(ctx.x_advance, 10.0);
  }

  #[test]
  fn fresh_context_stacks_balanced() {
    assert!(context().stacks_balanced());
  }
}
