//! The layout scan
//!
//! A single stateful forward pass over the text processing array, with
//! two escape hatches and no recursion:
//!
//! - **Backtracking**: the scan snapshots its full state
//!   ([`WordWrapState`]) at every safe break opportunity. When a line
//!   overflows, the most recent snapshot is restored and the line is
//!   finalized at the break point; scanning resumes from there. Even
//!   adversarial input (every character a break point) costs stack
//!   nothing.
//! - **Restart**: with auto-sizing enabled, an overflow that wrapping
//!   cannot fix returns [`ScanOutcome::TooLarge`] instead of laying out
//!   invalid metrics; the caller adjusts the working point size or the
//!   character-width delta and re-invokes the scan.
//!
//! Markup tags are validated by [`crate::markup::scanner`] and applied
//! here through a closed dispatch on [`TagKind`]: each arm validates its
//! value and pushes/pops the matching effect stack. A tag that fails
//! validation is not consumed; its `<` renders as text.
//!
//! Failure is always local: unresolvable characters notify the
//! missing-glyph handler and substitute or skip, malformed tags render
//! literally, stack underflows are no-ops, and the auto-size loop is
//! bounded by an iteration cap upstream.
//!
//! ## Coordinate conventions
//!
//! The first line's baseline sits at y = 0 and lines grow downward:
//! line `n`'s baseline is `-line_offset(n)`. Character records store
//! absolute object-space values; [`LineInfo`] ascenders/descenders are
//! relative to their own baseline.

use std::sync::Arc;

use crate::color::Color32;
use crate::font::resolver::{GlyphResolver, ResolvedElement};
use crate::font::sprite::{SpriteAsset, SpriteGlyph};
use crate::font::{AssetId, FontAsset, FontStyleFlags, FontWeight, Glyph};
use crate::layout::breaking::{is_breakable_whitespace, is_hard_break_point, is_whitespace, is_zero_width};
use crate::layout::context::{LayoutContext, WordWrapState};
use crate::layout::{
  grow_buffer, Extents, HorizontalAlignment, LineInfo, LinkInfo, OverflowMode, TextInfo, Vec2,
  WordInfo,
};
use crate::markup::hash::name_hash;
use crate::markup::scanner::{color_value, numeric_value, string_value, TagScanner};
use crate::markup::{attr_name, named_color, tag_kind, AttrName, TagKind, TagUnit, TagValueKind};
use crate::prepare::TextElement;
use crate::settings::TextSettings;

/// Auto-size step granularity: candidate sizes snap to multiples of this.
pub const AUTO_SIZE_GRANULARITY: f32 = 0.05;

/// Upper bound on auto-size restarts before the size freezes.
pub const AUTO_SIZE_MAX_ITERATIONS: u32 = 100;

/// Width tolerance applied before wrapping justified/flush lines.
const FITTED_WIDTH_TOLERANCE: f32 = 1.05;

const ELLIPSIS: u32 = 0x2026;

/// Callback invoked when a character resolves nowhere in the reachable
/// fallback graph. Purely informational; layout continues either way.
pub trait MissingGlyphHandler {
  fn on_missing_glyph(&self, unicode: u32, source_index: usize, text: &str, font: &FontAsset);
}

/// Per-pass configuration, assembled by the text object.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
  pub font: Arc<FontAsset>,
  pub sprite_asset: Option<Arc<SpriteAsset>>,
  pub base_color: Color32,
  pub alignment: HorizontalAlignment,
  pub wrapping: bool,
  pub overflow: OverflowMode,
  /// Layout rectangle; `f32::INFINITY` for unconstrained axes.
  pub width: f32,
  pub height: f32,
  /// Left, top, right, bottom.
  pub margins: [f32; 4],
  pub rich_text: bool,
  pub kerning: bool,
  pub character_spacing: f32,
  pub word_spacing: f32,
  pub line_spacing: f32,
  pub paragraph_spacing: f32,
  /// Base style applied under all markup (e.g. an all-bold text object).
  pub font_style: FontStyleFlags,
  pub font_weight: FontWeight,
}

/// Result of one scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
  Complete,
  /// The text cannot fit and the caller permitted shrinking; no valid
  /// layout was produced.
  TooLarge,
}

/// How the scan loop proceeds after an element.
enum Step {
  /// Advance to the next element.
  Next,
  /// Jump to this element index (after a rewind).
  Resume(usize),
  /// Stop scanning; the text was truncated.
  Stop,
  /// Abort for an auto-size restart.
  TooLarge,
}

/// A measured element ready to commit. Vertical metrics are line-local
/// (relative to the line's own baseline); `commit` shifts them into
/// object space.
struct Pending {
  unicode: u32,
  source_index: usize,
  element: Option<ResolvedElement>,
  font: Option<Arc<FontAsset>>,
  material_hash: u32,
  style: FontStyleFlags,
  scale: f32,
  /// Pen advance, fully scaled and spaced.
  advance: f32,
  /// Rightmost extent of the glyph quad relative to the pen.
  right_extent: f32,
  /// Line-local ascender/descender (baseline-relative).
  ascender: f32,
  descender: f32,
  top_left: Vec2,
  bottom_right: Vec2,
  baseline: f32,
  is_visible: bool,
  color: Option<Color32>,
}

pub(crate) struct LayoutEngine<'a> {
  config: &'a LayoutConfig,
  settings: &'a TextSettings,
  elements: &'a [TextElement],
  source_text: &'a str,
  resolver: &'a mut GlyphResolver,
  scanner: &'a mut TagScanner,
  missing_handler: Option<&'a dyn MissingGlyphHandler>,

  // Per-pass scratch, reset by `scan`.
  base_font_size: f32,
  width_adjust: f32,
  can_shrink: bool,
  last_safe_break: Option<WordWrapState>,
  ellipsis_candidate: Option<WordWrapState>,
  /// Lazily resolved ellipsis glyph, cached per font asset.
  ellipsis: Option<(AssetId, Option<(Arc<Glyph>, Arc<FontAsset>)>)>,
}

impl<'a> LayoutEngine<'a> {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    config: &'a LayoutConfig,
    settings: &'a TextSettings,
    elements: &'a [TextElement],
    source_text: &'a str,
    resolver: &'a mut GlyphResolver,
    scanner: &'a mut TagScanner,
    missing_handler: Option<&'a dyn MissingGlyphHandler>,
  ) -> Self {
    Self {
      config,
      settings,
      elements,
      source_text,
      resolver,
      scanner,
      missing_handler,
      base_font_size: 0.0,
      width_adjust: 0.0,
      can_shrink: false,
      last_safe_break: None,
      ellipsis_candidate: None,
      ellipsis: None,
    }
  }

  /// Runs one scan pass at `font_size`, compressing glyph advances by
  /// `width_adjust` (0..1). With `can_shrink`, an unfixable overflow
  /// aborts with [`ScanOutcome::TooLarge`] instead of truncating.
  pub fn scan(
    &mut self,
    info: &mut TextInfo,
    font_size: f32,
    width_adjust: f32,
    can_shrink: bool,
  ) -> ScanOutcome {
    info.clear();
    self.base_font_size = font_size;
    self.width_adjust = width_adjust.clamp(0.0, 0.99);
    self.can_shrink = can_shrink;
    self.last_safe_break = None;
    self.ellipsis_candidate = None;

    let mut ctx = LayoutContext::new(
      Arc::clone(&self.config.font),
      font_size,
      self.config.base_color,
      self.config.alignment,
      self.config.character_spacing,
      self.config.word_spacing,
    );
    ctx.weight_stack.reset(self.config.font_weight);

    let mut previous_cp: u32 = 0;
    let mut i = 0usize;
    while i < self.elements.len() {
      let element = self.elements[i];
      let cp = element.unicode;
      if cp == 0 {
        break;
      }

      if self.config.rich_text && cp == 0x3C {
        if let Some(end) = self.try_apply_tag(&mut ctx, info, i) {
          i = end + 1;
          continue;
        }
      }

      let step = match cp {
        0x0A | 0x0B | 0x0C | 0x0D | 0x2028 | 0x2029 => {
          self.commit_invisible(&mut ctx, info, cp, element.source_index, 0.0);
          let paragraph = cp == 0x0A || cp == 0x2029;
          self.finish_line(&mut ctx, info, true, paragraph);
          self.last_safe_break = None;
          if self.height_exceeded(&ctx, info) {
            self.handle_vertical_overflow(&mut ctx, info)
          } else {
            Step::Next
          }
        }
        0x09 => {
          let scale = ctx.current_scale();
          let tab = ctx.font.face.tab_width * scale;
          let advance = if tab > 0.0 {
            ((ctx.x_advance / tab).floor() + 1.0) * tab - ctx.x_advance
          } else {
            0.0
          };
          self.commit_invisible(&mut ctx, info, cp, element.source_index, advance);
          Step::Next
        }
        _ => self.layout_character(&mut ctx, info, cp, element.source_index, previous_cp, i),
      };

      match step {
        Step::Next => {
          if self.config.wrapping && !ctx.no_break {
            let next_cp = self.next_code_point(i);
            if self.is_break_opportunity(cp, previous_cp, next_cp) {
              self.last_safe_break = Some(WordWrapState::capture(&ctx, i + 1));
            }
          }
          previous_cp = cp;
          i += 1;
        }
        Step::Resume(index) => {
          previous_cp = 0;
          i = index;
        }
        Step::Stop => {
          info.truncated = true;
          break;
        }
        Step::TooLarge => return ScanOutcome::TooLarge,
      }
    }

    self.finish_line(&mut ctx, info, false, false);
    self.finalize(&ctx, info);
    ScanOutcome::Complete
  }

  // ===========================================================================
  // Character layout
  // ===========================================================================

  /// Resolves, measures, and commits one character, handling horizontal
  /// overflow.
  fn layout_character(
    &mut self,
    ctx: &mut LayoutContext,
    info: &mut TextInfo,
    raw_cp: u32,
    source_index: usize,
    previous_cp: u32,
    i: usize,
  ) -> Step {
    let style = self.effective_style(ctx);
    let (cp, smallcaps_lowered) = apply_case(raw_cp, style);

    if is_zero_width(cp) {
      self.commit_invisible(ctx, info, cp, source_index, 0.0);
      return Step::Next;
    }

    let weight = *ctx.weight_stack.current();

    if is_whitespace(cp) {
      // Whitespace is never "missing": take the font's advance when the
      // glyph exists, otherwise fall back to a quarter em.
      let advance = match self
        .resolver
        .resolve_character(cp, &ctx.font.clone(), true, FontStyleFlags::NORMAL, weight)
      {
        Some((glyph, font)) => {
          let scale = ctx.font_size / font.face.point_size * font.face.scale * glyph.scale;
          glyph.metrics.advance * scale
        }
        None => ctx.font_size * 0.25,
      };
      let advance = (advance + ctx.character_spacing + ctx.word_spacing) * ctx.horizontal_scale;
      self.commit_invisible(ctx, info, cp, source_index, advance);
      return Step::Next;
    }
    let Some((glyph, font)) = self.resolve(ctx, cp, source_index, style, weight) else {
      // Nothing anywhere, substitution included: keep the logical slot.
      self.commit_invisible(ctx, info, cp, source_index, 0.0);
      return Step::Next;
    };

    let face = &font.face;
    let base_scale = ctx.font_size / face.point_size * face.scale;
    let mut scale_multiplier = ctx.scale_multiplier;
    let mut script_offset = 0.0;
    if style.contains(FontStyleFlags::SUBSCRIPT) {
      scale_multiplier *= face.subscript_size.max(f32::EPSILON);
      script_offset += face.subscript_offset * base_scale;
    }
    if style.contains(FontStyleFlags::SUPERSCRIPT) {
      scale_multiplier *= face.superscript_size.max(f32::EPSILON);
      script_offset += face.superscript_offset * base_scale;
    }
    if smallcaps_lowered {
      scale_multiplier *= 0.8;
    }

    let scale = base_scale * glyph.scale * scale_multiplier;
    // Line-local baseline for this character.
    let local_baseline = *ctx.baseline_offset_stack.current() + script_offset;
    let baseline = -ctx.line_offset + local_baseline;

    let metrics = glyph.metrics;

    // Kerning against the previous glyph of the same font.
    let mut placement = Vec2::new(0.0, 0.0);
    let mut kern_advance = 0.0;
    if self.config.kerning {
      if let Some(prev) = self.previous_glyph_on_line(ctx, info, &font) {
        if let Some(pair) = font.kerning_pair(prev, glyph.index) {
          placement.x += pair.x_placement * scale;
          placement.y += pair.y_placement * scale;
          kern_advance = pair.x_advance * scale;
        }
      }
    }

    // Mark attachment repositions the glyph against its base and
    // consumes no advance.
    let mut mark_attached = false;
    let mut origin_x = ctx.x_advance;
    if is_combining_mark(cp) {
      if let Some(offset) = self.attach_mark(ctx, info, &font, glyph.index, scale) {
        origin_x = self.last_base_origin(ctx, info).unwrap_or(ctx.x_advance);
        placement = offset;
        mark_attached = true;
      }
    }

    let bold = style.is_bold() || weight >= FontWeight::Bold;
    let mut advance = if mark_attached {
      0.0
    } else if let Some(mono) = ctx.monospace_advance {
      mono
    } else {
      let mut advance = metrics.advance * scale;
      if bold {
        advance += face.bold_spacing * base_scale * 0.01 * face.point_size;
      }
      advance += kern_advance;
      advance *= 1.0 - self.width_adjust;
      advance
    };
    if !mark_attached {
      advance += ctx.character_spacing;
      advance *= ctx.horizontal_scale;
    }

    let top_left = Vec2::new(
      origin_x + placement.x + metrics.bearing_x * scale,
      baseline + placement.y + metrics.bearing_y * scale,
    );
    let bottom_right = Vec2::new(top_left.x + metrics.width * scale, top_left.y - metrics.height * scale);

    let pending = Pending {
      unicode: cp,
      source_index,
      element: Some(ResolvedElement::Glyph {
        glyph: Arc::clone(&glyph),
        font: Arc::clone(&font),
      }),
      font: Some(Arc::clone(&font)),
      material_hash: *ctx.material_stack.current(),
      style,
      scale,
      advance,
      right_extent: placement.x + (metrics.bearing_x + metrics.width) * scale,
      ascender: face.ascender * scale + local_baseline,
      descender: face.descender * scale + local_baseline,
      top_left,
      bottom_right,
      baseline,
      is_visible: true,
      color: None,
    };

    self.place(ctx, info, pending, i)
  }

  /// Commits a measured element, first checking horizontal overflow.
  fn place(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo, pending: Pending, i: usize) -> Step {
    let available = self.width_available(ctx);
    let tolerance = if ctx.alignment_stack.current().is_fitted() {
      FITTED_WIDTH_TOLERANCE
    } else {
      1.0
    };

    if pending.is_visible && ctx.x_advance + pending.right_extent > available * tolerance {
      if self.config.wrapping {
        if let Some(state) = self.last_safe_break.take() {
          // Only rewind if the break leaves characters on this line;
          // otherwise the same overflow recurs forever.
          if state.character_count() > ctx.first_character_of_line {
            let resume = state.restore(ctx);
            self.finish_line(ctx, info, true, false);
            if self.height_exceeded(ctx, info) {
              return self.handle_vertical_overflow(ctx, info);
            }
            return Step::Resume(resume);
          }
        }
        // A single word wider than the line.
        if self.can_shrink {
          return Step::TooLarge;
        }
        if !ctx.no_break && ctx.character_count > ctx.first_character_of_line {
          // Emergency break before the current character.
          self.finish_line(ctx, info, true, false);
          if self.height_exceeded(ctx, info) {
            return self.handle_vertical_overflow(ctx, info);
          }
          return Step::Resume(i);
        }
        // Inside `<nobr>`, or the line's very first character overflows
        // on its own: place it and let it stick out.
      } else {
        if self.can_shrink {
          return Step::TooLarge;
        }
        match self.config.overflow {
          OverflowMode::Overflow => {
            if info.first_overflow_character.is_none() {
              info.first_overflow_character = Some(ctx.character_count);
            }
          }
          OverflowMode::Truncate => {
            if info.first_overflow_character.is_none() {
              info.first_overflow_character = Some(ctx.character_count);
            }
            return Step::Stop;
          }
          OverflowMode::Ellipsis => {
            if info.first_overflow_character.is_none() {
              info.first_overflow_character = Some(ctx.character_count);
            }
            self.insert_ellipsis(ctx, info);
            return Step::Stop;
          }
        }
      }
    }

    let is_visible = pending.is_visible;
    self.commit(ctx, info, pending);

    // Track the last spot where an appended ellipsis would still fit.
    if self.config.overflow == OverflowMode::Ellipsis && is_visible {
      if let Some((glyph, font)) = self.ellipsis_glyph(ctx) {
        let scale = ctx.font_size / font.face.point_size * font.face.scale * glyph.scale;
        let needed = glyph.metrics.advance * scale;
        if ctx.x_advance + needed <= available {
          self.ellipsis_candidate = Some(WordWrapState::capture(ctx, i + 1));
        }
      }
    }

    Step::Next
  }

  /// Writes a committed element into the character buffer and advances
  /// the pen and line trackers.
  fn commit(&self, ctx: &mut LayoutContext, info: &mut TextInfo, pending: Pending) {
    let index = ctx.character_count;
    grow_buffer(&mut info.characters, index + 1);
    let record = &mut info.characters[index];

    record.unicode = pending.unicode;
    record.source_index = pending.source_index;
    record.element = pending.element;
    record.font = pending.font;
    record.material_hash = pending.material_hash;
    record.style = pending.style;
    record.point_size = ctx.font_size;
    record.scale = pending.scale;
    record.origin = ctx.x_advance;
    record.baseline = pending.baseline;
    record.x_advance = pending.advance;
    record.ascender = pending.ascender - ctx.line_offset;
    record.descender = pending.descender - ctx.line_offset;
    record.top_left = pending.top_left;
    record.bottom_right = pending.bottom_right;
    record.color = pending
      .color
      .unwrap_or_else(|| ctx.color_stack.current().min(self.config.base_color));
    record.underline_color = *ctx.underline_color_stack.current();
    record.strikethrough_color = *ctx.strikethrough_color_stack.current();
    record.highlight_color = *ctx.highlight_color_stack.current();
    record.gradient = *ctx.gradient_stack.current();
    record.rotation = ctx.rotation;
    record.italic_angle = if pending.style.is_italic() {
      *ctx.italic_angle_stack.current()
    } else {
      0.0
    };
    record.is_visible = pending.is_visible;
    record.line_number = ctx.line_number;
    record.page_number = ctx.page_number;

    ctx.max_line_ascender = ctx.max_line_ascender.max(pending.ascender);
    ctx.max_line_descender = ctx.max_line_descender.min(pending.descender);
    if ctx.start_of_line_ascender == f32::MIN {
      ctx.start_of_line_ascender = pending.ascender;
    }
    ctx.max_cap_height = ctx
      .max_cap_height
      .max(ctx.font.face.cap_height * pending.scale);

    if pending.is_visible {
      ctx.mesh_extents.include(pending.top_left);
      ctx.mesh_extents.include(pending.bottom_right);
      ctx.last_visible_character = Some(index);
      ctx.last_visible_character_of_line = index;
      ctx.visible_character_count += 1;
    }

    ctx.x_advance += pending.advance;
    ctx.character_count = index + 1;
  }

  /// Commits an invisible slot (controls, zero-width characters,
  /// unresolvable characters, tabs).
  fn commit_invisible(
    &self,
    ctx: &mut LayoutContext,
    info: &mut TextInfo,
    cp: u32,
    source_index: usize,
    advance: f32,
  ) {
    let scale = ctx.current_scale();
    let local_baseline = *ctx.baseline_offset_stack.current();
    let baseline = -ctx.line_offset + local_baseline;
    let face = &ctx.font.face;
    let pending = Pending {
      unicode: cp,
      source_index,
      element: None,
      font: Some(Arc::clone(&ctx.font)),
      material_hash: *ctx.material_stack.current(),
      style: self.effective_style(ctx),
      scale,
      advance,
      right_extent: 0.0,
      ascender: face.ascender * scale + local_baseline,
      descender: face.descender * scale + local_baseline,
      top_left: Vec2::new(ctx.x_advance, baseline),
      bottom_right: Vec2::new(ctx.x_advance + advance, baseline),
      baseline,
      is_visible: false,
      color: None,
    };
    self.commit(ctx, info, pending);
  }

  // ===========================================================================
  // Resolution
  // ===========================================================================

  fn resolve(
    &mut self,
    ctx: &mut LayoutContext,
    cp: u32,
    source_index: usize,
    style: FontStyleFlags,
    weight: FontWeight,
  ) -> Option<(Arc<Glyph>, Arc<FontAsset>)> {
    let font = Arc::clone(&ctx.font);
    if let Some(found) = self.resolver.resolve_character(cp, &font, true, style, weight) {
      return Some(found);
    }

    // Settings-level fallback chain (emoji and friends). Sprite hits
    // are not taken here; `<sprite>` is the sprite entry point.
    if let Some(ResolvedElement::Glyph { glyph, font }) =
      self.resolver.resolve_from_assets(cp, &self.settings.fallback_assets)
    {
      return Some((glyph, font));
    }

    self.notify_missing(cp, source_index, &font);

    let substitute = self.settings.missing_glyph;
    if substitute != 0 && substitute != cp {
      if let Some(found) = self
        .resolver
        .resolve_character(substitute, &font, true, style, weight)
      {
        return Some(found);
      }
    }
    None
  }

  fn notify_missing(&self, cp: u32, source_index: usize, font: &FontAsset) {
    if self.settings.warnings_enabled {
      log::warn!(
        "no glyph for U+{cp:04X} in '{}' or its fallbacks",
        font.face.family_name
      );
    }
    if let Some(handler) = self.missing_handler {
      handler.on_missing_glyph(cp, source_index, self.source_text, font);
    }
  }

  /// Glyph index of the nearest preceding visible character on the
  /// current line that used the same font.
  fn previous_glyph_on_line(&self, ctx: &LayoutContext, info: &TextInfo, font: &Arc<FontAsset>) -> Option<u32> {
    let last = ctx.last_visible_character?;
    if last < ctx.first_character_of_line {
      return None;
    }
    let record = &info.characters[last];
    match (&record.element, &record.font) {
      (Some(ResolvedElement::Glyph { glyph, .. }), Some(prev_font)) if prev_font.id() == font.id() => {
        Some(glyph.index)
      }
      _ => None,
    }
  }

  /// Walks backward to the nearest preceding mark or base glyph and
  /// returns the placement offset for a combining mark. Nearest match
  /// wins; the walk ends at the first base glyph either way.
  fn attach_mark(
    &self,
    ctx: &LayoutContext,
    info: &TextInfo,
    font: &Arc<FontAsset>,
    mark_glyph: u32,
    scale: f32,
  ) -> Option<Vec2> {
    let mut index = ctx.character_count;
    while index > ctx.first_character_of_line {
      index -= 1;
      let record = &info.characters[index];
      if !record.is_visible {
        continue;
      }
      let Some(ResolvedElement::Glyph { glyph, .. }) = &record.element else {
        continue;
      };
      if record.font.as_ref().map(|f| f.id()) != Some(font.id()) {
        return None;
      }
      if is_combining_mark(record.unicode) {
        if let Some(anchor) = font.mark_mark_anchor(glyph.index, mark_glyph) {
          return Some(Vec2::new(
            (anchor.base_x - anchor.mark_x) * scale,
            (anchor.base_y - anchor.mark_y) * scale,
          ));
        }
        // An unrelated mark does not end the search toward the base.
        continue;
      }
      return font.mark_base_anchor(glyph.index, mark_glyph).map(|anchor| {
        Vec2::new(
          (anchor.base_x - anchor.mark_x) * scale,
          (anchor.base_y - anchor.mark_y) * scale,
        )
      });
    }
    None
  }

  /// Origin of the nearest preceding visible base character.
  fn last_base_origin(&self, ctx: &LayoutContext, info: &TextInfo) -> Option<f32> {
    let mut index = ctx.character_count;
    while index > ctx.first_character_of_line {
      index -= 1;
      let record = &info.characters[index];
      if record.is_visible && !is_combining_mark(record.unicode) {
        return Some(record.origin);
      }
    }
    None
  }

  // ===========================================================================
  // Lines and overflow
  // ===========================================================================

  fn width_available(&self, ctx: &LayoutContext) -> f32 {
    let base = ctx.width_override.unwrap_or(self.config.width);
    base - self.config.margins[0] - self.config.margins[2] - ctx.margin_left - ctx.margin_right
  }

  fn height_available(&self) -> f32 {
    self.config.height - self.config.margins[1] - self.config.margins[3]
  }

  /// Whether the next line's baseline falls below the layout rectangle.
  fn height_exceeded(&self, ctx: &LayoutContext, info: &TextInfo) -> bool {
    let available = self.height_available();
    if !available.is_finite() {
      return false;
    }
    let first_ascender = info.lines.first().map(|line| line.ascender).unwrap_or(0.0);
    first_ascender + ctx.line_offset > available
  }

  fn handle_vertical_overflow(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo) -> Step {
    if self.can_shrink {
      return Step::TooLarge;
    }
    match self.config.overflow {
      OverflowMode::Overflow => Step::Next,
      OverflowMode::Truncate => {
        if info.first_overflow_character.is_none() {
          info.first_overflow_character = Some(ctx.character_count);
        }
        Step::Stop
      }
      OverflowMode::Ellipsis => {
        if info.first_overflow_character.is_none() {
          info.first_overflow_character = Some(ctx.character_count);
        }
        self.insert_ellipsis(ctx, info);
        Step::Stop
      }
    }
  }

  /// Rewinds to the last position where an ellipsis fits and appends it.
  fn insert_ellipsis(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo) {
    if let Some(state) = self.ellipsis_candidate.take() {
      state.restore(ctx);
      // Line records past the restored position are rebuilt below.
      info.line_count = ctx.line_number;
    }
    if let Some((glyph, font)) = self.ellipsis_glyph(ctx) {
      let face = &font.face;
      let scale = ctx.font_size / face.point_size * face.scale * glyph.scale;
      let metrics = glyph.metrics;
      let local_baseline = *ctx.baseline_offset_stack.current();
      let baseline = -ctx.line_offset + local_baseline;
      let top_left = Vec2::new(
        ctx.x_advance + metrics.bearing_x * scale,
        baseline + metrics.bearing_y * scale,
      );
      let pending = Pending {
        unicode: ELLIPSIS,
        source_index: self.source_text.len(),
        element: Some(ResolvedElement::Glyph {
          glyph: Arc::clone(&glyph),
          font: Arc::clone(&font),
        }),
        font: Some(Arc::clone(&font)),
        material_hash: *ctx.material_stack.current(),
        style: self.effective_style(ctx),
        scale,
        advance: metrics.advance * scale,
        right_extent: (metrics.bearing_x + metrics.width) * scale,
        ascender: face.ascender * scale + local_baseline,
        descender: face.descender * scale + local_baseline,
        top_left,
        bottom_right: Vec2::new(top_left.x + metrics.width * scale, top_left.y - metrics.height * scale),
        baseline,
        is_visible: true,
        color: None,
      };
      self.commit(ctx, info, pending);
    }
  }

  fn ellipsis_glyph(&mut self, ctx: &LayoutContext) -> Option<(Arc<Glyph>, Arc<FontAsset>)> {
    let font_id = ctx.font.id();
    if let Some((cached_id, cached)) = &self.ellipsis {
      if *cached_id == font_id {
        return cached.clone();
      }
    }
    let resolved =
      self
        .resolver
        .resolve_character(ELLIPSIS, &ctx.font, true, FontStyleFlags::NORMAL, FontWeight::Regular);
    self.ellipsis = Some((font_id, resolved.clone()));
    resolved
  }

  /// Finalizes the current line's [`LineInfo`] and, when `advance`,
  /// moves the pen to the next line.
  fn finish_line(&self, ctx: &mut LayoutContext, info: &mut TextInfo, advance: bool, paragraph: bool) {
    let line_number = ctx.line_number;
    let first = ctx.first_character_of_line;
    let count = ctx.character_count.saturating_sub(first);

    let scale = ctx.current_scale();
    let face = &ctx.font.face;

    let ascender = if ctx.max_line_ascender == f32::MIN {
      face.ascender * scale
    } else {
      ctx.max_line_ascender
    };
    let descender = if ctx.max_line_descender == f32::MAX {
      face.descender * scale
    } else {
      ctx.max_line_descender
    };

    let mut line = LineInfo {
      first_character: first,
      first_visible_character: first,
      last_character: if count == 0 { first } else { ctx.character_count - 1 },
      last_visible_character: first,
      character_count: count,
      visible_character_count: 0,
      ascender,
      baseline: -ctx.line_offset,
      descender,
      width: 0.0,
      length: 0.0,
      max_advance: 0.0,
      extents: Extents::empty(),
      alignment: *ctx.alignment_stack.current(),
    };

    let mut seen_visible = false;
    for index in first..ctx.character_count {
      let record = &info.characters[index];
      line.length = record.origin + record.x_advance;
      if record.is_visible {
        if !seen_visible {
          line.first_visible_character = index;
          seen_visible = true;
        }
        line.last_visible_character = index;
        line.visible_character_count += 1;
        line.max_advance = line.max_advance.max(record.x_advance);
        line.extents.include(record.top_left);
        line.extents.include(record.bottom_right);
        line.width = record.origin + record.x_advance;
      }
    }

    grow_buffer(&mut info.lines, line_number + 1);
    ctx.max_line_width = ctx.max_line_width.max(line.width);
    info.lines[line_number] = line;
    info.line_count = line_number + 1;

    if !advance {
      return;
    }

    let line_height = match ctx.line_height_stack.current() {
      Some(height) => *height,
      None => face.line_height * scale,
    };
    let mut offset_delta = line_height + self.config.line_spacing;
    if paragraph {
      offset_delta += self.config.paragraph_spacing;
    }
    ctx.line_offset += offset_delta;

    ctx.line_number += 1;
    ctx.x_advance = *ctx.line_indent_stack.current() + *ctx.indent_stack.current();
    ctx.first_character_of_line = ctx.character_count;
    ctx.first_visible_character_of_line = ctx.character_count;
    ctx.max_line_ascender = f32::MIN;
    ctx.max_line_descender = f32::MAX;
    ctx.start_of_line_ascender = f32::MIN;
  }

  /// Aggregates whole-text measurements, word spans, and open links.
  fn finalize(&self, ctx: &LayoutContext, info: &mut TextInfo) {
    info.character_count = ctx.character_count;
    info.visible_character_count = ctx.visible_character_count;
    info.page_count = ctx.page_number + 1;

    if info.line_count > 0 {
      let first = &info.lines[0];
      let last = &info.lines[info.line_count - 1];
      info.rendered_height = (first.baseline + first.ascender) - (last.baseline + last.descender);
      info.rendered_width = info.lines[..info.line_count]
        .iter()
        .map(|line| line.width)
        .fold(0.0, f32::max);
    }

    let h_margins = self.config.margins[0] + self.config.margins[2];
    let v_margins = self.config.margins[1] + self.config.margins[3];
    info.preferred_width = info.rendered_width + h_margins;
    info.preferred_height = info.rendered_height + v_margins;

    // Close any link left open by unbalanced markup.
    if let Some(open) = ctx.open_link {
      if let Some(link) = info.links.get_mut(open) {
        if link.character_count == 0 {
          link.character_count = ctx.character_count.saturating_sub(link.first_character);
        }
      }
    }

    // Word spans: maximal alphanumeric runs.
    info.words.clear();
    let mut start: Option<usize> = None;
    for index in 0..ctx.character_count {
      let cp = info.characters[index].unicode;
      let is_word = char::from_u32(cp).map(|c| c.is_alphanumeric()).unwrap_or(false);
      match (is_word, start) {
        (true, None) => start = Some(index),
        (false, Some(begin)) => {
          info.words.push(WordInfo {
            first_character: begin,
            last_character: index - 1,
            character_count: index - begin,
          });
          start = None;
        }
        _ => {}
      }
    }
    if let Some(begin) = start {
      info.words.push(WordInfo {
        first_character: begin,
        last_character: ctx.character_count - 1,
        character_count: ctx.character_count - begin,
      });
    }
    info.word_count = info.words.len();
  }

  // ===========================================================================
  // Break classification
  // ===========================================================================

  fn next_code_point(&self, i: usize) -> u32 {
    self.elements.get(i + 1).map(|e| e.unicode).unwrap_or(0)
  }

  fn is_break_opportunity(&self, cp: u32, previous: u32, next: u32) -> bool {
    if is_hard_break_point(cp, previous) {
      return true;
    }
    let rules = &self.settings.line_breaking;
    if rules.breaks_per_character(cp) {
      return rules.can_break_between(cp, next);
    }
    // Latin directly followed by CJK is a break candidate.
    if next != 0 && !is_breakable_whitespace(cp) && rules.breaks_per_character(next) {
      return !rules.leading.contains(&next);
    }
    false
  }

  // ===========================================================================
  // Markup application
  // ===========================================================================

  fn effective_style(&self, ctx: &LayoutContext) -> FontStyleFlags {
    let mut style = self.config.font_style | ctx.style_stack.flags();
    if *ctx.weight_stack.current() >= FontWeight::Bold {
      style.insert(FontStyleFlags::BOLD);
    }
    style
  }

  /// Validates the tag starting at `lt_index` and applies its effect.
  /// Returns the index of `>` on success; `None` renders the `<`
  /// literally.
  fn try_apply_tag(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo, lt_index: usize) -> Option<usize> {
    let tag = self.scanner.scan(self.elements, lt_index + 1)?;
    let kind = tag_kind(self.scanner.tag_hash())?;

    if ctx.no_parsing {
      if kind == TagKind::NoParseClose {
        ctx.no_parsing = false;
        return Some(tag.closing_index);
      }
      return None;
    }

    self.apply_tag(ctx, info, kind).then_some(tag.closing_index)
  }

  /// Style-toggle tags; everything carrying a value dispatches on to
  /// [`Self::apply_value_tag`].
  fn apply_tag(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo, kind: TagKind) -> bool {
    use TagKind::*;

    let elements = self.elements;
    let attr0 = self.scanner.attributes[0];

    match kind {
      Bold => ctx.style_stack.add(FontStyleFlags::BOLD),
      BoldClose => ctx.style_stack.remove(FontStyleFlags::BOLD),
      Italic => {
        let angle = if attr0.kind == TagValueKind::Numerical {
          match numeric_value(elements, &attr0) {
            Some(angle) => angle,
            None => return false,
          }
        } else {
          *ctx.italic_angle_stack.current()
        };
        ctx.style_stack.add(FontStyleFlags::ITALIC);
        ctx.italic_angle_stack.push(angle);
      }
      ItalicClose => {
        ctx.style_stack.remove(FontStyleFlags::ITALIC);
        ctx.italic_angle_stack.pop();
      }
      Underline => {
        let color = match attr0.kind {
          TagValueKind::Color => match color_value(elements, &attr0) {
            Some(color) => color,
            None => return false,
          },
          _ => *ctx.color_stack.current(),
        };
        ctx.style_stack.add(FontStyleFlags::UNDERLINE);
        ctx.underline_color_stack.push(color);
      }
      UnderlineClose => {
        ctx.style_stack.remove(FontStyleFlags::UNDERLINE);
        ctx.underline_color_stack.pop();
      }
      Strikethrough => {
        let color = match attr0.kind {
          TagValueKind::Color => match color_value(elements, &attr0) {
            Some(color) => color,
            None => return false,
          },
          _ => *ctx.color_stack.current(),
        };
        ctx.style_stack.add(FontStyleFlags::STRIKETHROUGH);
        ctx.strikethrough_color_stack.push(color);
      }
      StrikethroughClose => {
        ctx.style_stack.remove(FontStyleFlags::STRIKETHROUGH);
        ctx.strikethrough_color_stack.pop();
      }
      Highlight => {
        let color = match attr0.kind {
          TagValueKind::Color => match color_value(elements, &attr0) {
            Some(color) => color,
            None => return false,
          },
          TagValueKind::StringValue => match named_color(attr0.value_hash) {
            Some(color) => color,
            None => return false,
          },
          _ => return false,
        };
        ctx.style_stack.add(FontStyleFlags::HIGHLIGHT);
        ctx.highlight_color_stack.push(color);
      }
      HighlightClose => {
        ctx.style_stack.remove(FontStyleFlags::HIGHLIGHT);
        ctx.highlight_color_stack.pop();
      }
      Subscript => ctx.style_stack.add(FontStyleFlags::SUBSCRIPT),
      SubscriptClose => ctx.style_stack.remove(FontStyleFlags::SUBSCRIPT),
      Superscript => ctx.style_stack.add(FontStyleFlags::SUPERSCRIPT),
      SuperscriptClose => ctx.style_stack.remove(FontStyleFlags::SUPERSCRIPT),
      Lowercase => ctx.style_stack.add(FontStyleFlags::LOWERCASE),
      LowercaseClose => ctx.style_stack.remove(FontStyleFlags::LOWERCASE),
      Uppercase | Allcaps => ctx.style_stack.add(FontStyleFlags::UPPERCASE),
      UppercaseClose | AllcapsClose => ctx.style_stack.remove(FontStyleFlags::UPPERCASE),
      Smallcaps => ctx.style_stack.add(FontStyleFlags::SMALLCAPS),
      SmallcapsClose => ctx.style_stack.remove(FontStyleFlags::SMALLCAPS),
      NoBreak => ctx.no_break = true,
      NoBreakClose => ctx.no_break = false,
      NoParse => ctx.no_parsing = true,
      NoParseClose => ctx.no_parsing = false,
      _ => return self.apply_value_tag(ctx, info, kind),
    }
    true
  }

  fn apply_value_tag(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo, kind: TagKind) -> bool {
    use TagKind::*;

    let elements = self.elements;
    let attr0 = self.scanner.attributes[0];

    match kind {
      TagKind::FontWeight => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.weight_stack.push(crate::font::FontWeight::from_u16(value as u16));
      }
      TagKind::FontWeightClose => {
        ctx.weight_stack.pop();
      }
      Size => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let new_size = match attr0.unit {
          TagUnit::Percentage => self.base_font_size * value / 100.0,
          TagUnit::FontUnits => self.base_font_size * value,
          TagUnit::Pixels => {
            if self.value_is_signed(&attr0) {
              ctx.font_size + value
            } else {
              value
            }
          }
        };
        if new_size <= 0.0 {
          return false;
        }
        ctx.size_stack.push(new_size);
        ctx.font_size = new_size;
      }
      SizeClose => {
        ctx.font_size = ctx.size_stack.pop();
      }
      Position => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.x_advance = self.unit_value(ctx, value, attr0.unit, self.width_available(ctx));
      }
      Space => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.x_advance += self.unit_value(ctx, value, attr0.unit, self.width_available(ctx));
      }
      VerticalOffset => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let offset = self.unit_value(ctx, value, attr0.unit, ctx.font_size);
        ctx.baseline_offset_stack.push(offset);
      }
      VerticalOffsetClose => {
        ctx.baseline_offset_stack.pop();
      }
      Page => {
        ctx.page_number += 1;
        self.finish_line(ctx, info, true, false);
        self.last_safe_break = None;
      }
      Color => {
        let color = match attr0.kind {
          TagValueKind::Color => match color_value(elements, &attr0) {
            Some(color) => color,
            None => return false,
          },
          TagValueKind::StringValue => match named_color(attr0.value_hash) {
            Some(color) => color,
            None => return false,
          },
          _ => return false,
        };
        ctx.color_stack.push(color);
      }
      ColorClose => {
        ctx.color_stack.pop();
      }
      Alpha => {
        // `<alpha=#CC>`: exactly two hex digits.
        if attr0.kind != TagValueKind::Color || attr0.value_length != 3 {
          return false;
        }
        let span = &elements[attr0.value_start + 1..attr0.value_start + 3];
        let (Some(hi), Some(lo)) = (
          crate::color::hex_digit(span[0].unicode),
          crate::color::hex_digit(span[1].unicode),
        ) else {
          return false;
        };
        let alpha = (hi << 4) | lo;
        let current = *ctx.color_stack.current();
        ctx.color_stack.set_current(current.with_alpha(alpha));
      }
      Gradient => {
        let Some(gradient) = self.settings.gradient_presets.get(&attr0.value_hash) else {
          return false;
        };
        ctx.gradient_stack.push(Some(*gradient));
      }
      GradientClose => {
        ctx.gradient_stack.pop();
      }
      Align => {
        let hash = attr0.value_hash;
        let alignment = if hash == name_hash("left") {
          HorizontalAlignment::Left
        } else if hash == name_hash("center") {
          HorizontalAlignment::Center
        } else if hash == name_hash("right") {
          HorizontalAlignment::Right
        } else if hash == name_hash("justified") {
          HorizontalAlignment::Justified
        } else if hash == name_hash("flush") {
          HorizontalAlignment::Flush
        } else {
          return false;
        };
        ctx.alignment_stack.push(alignment);
      }
      AlignClose => {
        ctx.alignment_stack.pop();
      }
      Width => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let width = match attr0.unit {
          TagUnit::Percentage => {
            if !self.config.width.is_finite() {
              return false;
            }
            self.config.width * value / 100.0
          }
          TagUnit::FontUnits => value * ctx.font_size,
          TagUnit::Pixels => value,
        };
        ctx.width_override = Some(width);
      }
      WidthClose => {
        ctx.width_override = None;
      }
      CharacterSpace => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.character_spacing = self.unit_value(ctx, value, attr0.unit, ctx.font_size);
      }
      CharacterSpaceClose => {
        ctx.character_spacing = self.config.character_spacing;
      }
      Monospace => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.monospace_advance = Some(self.unit_value(ctx, value, attr0.unit, ctx.font_size));
      }
      MonospaceClose => {
        ctx.monospace_advance = None;
      }
      Indent => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let indent = self.unit_value(ctx, value, attr0.unit, self.width_available(ctx));
        ctx.indent_stack.push(indent);
        ctx.x_advance = ctx.x_advance.max(indent);
      }
      IndentClose => {
        ctx.indent_stack.pop();
      }
      LineIndent => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let indent = self.unit_value(ctx, value, attr0.unit, self.width_available(ctx));
        ctx.line_indent_stack.push(indent);
      }
      LineIndentClose => {
        ctx.line_indent_stack.pop();
      }
      LineHeight => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let height = self.unit_value(ctx, value, attr0.unit, ctx.font.face.line_height * ctx.current_scale());
        ctx.line_height_stack.push(Some(height));
      }
      LineHeightClose => {
        ctx.line_height_stack.pop();
      }
      Margin => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        let margin = self.unit_value(ctx, value, attr0.unit, self.config.width);
        ctx.margin_left = margin;
        ctx.margin_right = margin;
      }
      MarginClose => {
        ctx.margin_left = 0.0;
        ctx.margin_right = 0.0;
      }
      MarginLeft => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.margin_left = self.unit_value(ctx, value, attr0.unit, self.config.width);
      }
      MarginRight => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.margin_right = self.unit_value(ctx, value, attr0.unit, self.config.width);
      }
      Scale => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        if value <= 0.0 {
          return false;
        }
        ctx.horizontal_scale = value;
      }
      ScaleClose => {
        ctx.horizontal_scale = 1.0;
      }
      Rotate => {
        let Some(value) = numeric_value(elements, &attr0) else {
          return false;
        };
        ctx.rotation = value;
      }
      RotateClose => {
        ctx.rotation = 0.0;
      }
      Action => {
        if attr0.kind == TagValueKind::None {
          return false;
        }
        ctx.action_stack.push(attr0.value_hash);
      }
      ActionClose => {
        ctx.action_stack.pop();
      }
      Link => {
        if attr0.kind == TagValueKind::None {
          return false;
        }
        self.open_link(ctx, info, attr0.value_hash, string_value(elements, &attr0));
      }
      LinkClose | AnchorClose => {
        if let Some(index) = ctx.open_link.take() {
          if let Some(link) = info.links.get_mut(index) {
            link.character_count = ctx.character_count - link.first_character;
          }
        }
      }
      Anchor => {
        // `<a href="...">`; only the href form is recognized.
        let href = self.scanner.attributes[1];
        if attr_name(href.name_hash) != Some(AttrName::Href) {
          return false;
        }
        self.open_link(ctx, info, href.value_hash, string_value(elements, &href));
      }
      Font => {
        if attr0.kind != TagValueKind::StringValue {
          return false;
        }
        let font = if attr0.value_hash == name_hash("default") {
          Arc::clone(&self.config.font)
        } else {
          match self.settings.fonts.get(&attr0.value_hash) {
            Some(font) => Arc::clone(font),
            None => return false,
          }
        };
        let material = self
          .material_attr()
          .unwrap_or(font.material_hash);
        ctx.font_stack.push(Arc::clone(&font));
        ctx.material_stack.push(material);
        ctx.font = font;
      }
      FontClose => {
        let font = ctx.font_stack.pop();
        ctx.material_stack.pop();
        ctx.font = font;
      }
      Material => {
        if attr0.kind != TagValueKind::StringValue {
          return false;
        }
        ctx.material_stack.push(attr0.value_hash);
      }
      MaterialClose => {
        ctx.material_stack.pop();
      }
      Sprite => return self.apply_sprite_tag(ctx, info),
      // `<style>` reaching the engine means the builder could not expand
      // it (unknown style); it renders literally, like the inline
      // replacement tags that the builder always consumes.
      Style | StyleClose | LineBreak | CarriageReturn | NonBreakingSpace | ZeroWidthSpace
      | ZeroWidthJoiner | SoftHyphen => return false,
      _ => return false,
    }
    true
  }

  fn open_link(&self, ctx: &mut LayoutContext, info: &mut TextInfo, hash: u32, id: String) {
    let index = info.links.len();
    info.links.push(LinkInfo {
      hash,
      id,
      first_character: ctx.character_count,
      character_count: 0,
    });
    ctx.open_link = Some(index);
  }

  /// `<sprite=N>` / `<sprite name="x">` / `<sprite="sheet" name="x">`
  /// with optional `tint=1` / `color=#...` attributes.
  fn apply_sprite_tag(&mut self, ctx: &mut LayoutContext, info: &mut TextInfo) -> bool {
    let elements = self.elements;
    let attr0 = self.scanner.attributes[0];

    let asset: Arc<SpriteAsset> = if attr0.kind == TagValueKind::StringValue {
      match self.settings.sprite_assets.get(&attr0.value_hash) {
        Some(asset) => Arc::clone(asset),
        None => return false,
      }
    } else {
      match self
        .config
        .sprite_asset
        .as_ref()
        .or(self.settings.default_sprite_asset.as_ref())
      {
        Some(asset) => Arc::clone(asset),
        None => return false,
      }
    };

    let mut glyph: Option<Arc<SpriteGlyph>> = None;
    if attr0.kind == TagValueKind::Numerical {
      let Some(index) = numeric_value(elements, &attr0) else {
        return false;
      };
      glyph = asset.lookup_index(index as u32);
    }

    let mut tint = false;
    let mut color_override: Option<Color32> = None;
    for attr in &self.scanner.attributes[1..] {
      if attr.name_hash == 0 {
        break;
      }
      match attr_name(attr.name_hash) {
        Some(AttrName::Name) => {
          glyph = asset.lookup_name(attr.value_hash);
        }
        Some(AttrName::Index) => {
          let Some(index) = numeric_value(elements, attr) else {
            return false;
          };
          glyph = asset.lookup_index(index as u32);
        }
        Some(AttrName::Tint) => {
          tint = numeric_value(elements, attr).map(|v| v != 0.0).unwrap_or(false);
        }
        Some(AttrName::Color) => {
          color_override = color_value(elements, attr);
          if color_override.is_none() {
            return false;
          }
        }
        Some(AttrName::Anim) | Some(AttrName::Href) | None => {}
      }
    }

    let Some(glyph) = glyph else {
      return false;
    };

    let scale = ctx.font_size / asset.point_size * asset.scale * glyph.scale;
    let metrics = glyph.metrics;
    let local_baseline = *ctx.baseline_offset_stack.current();
    let baseline = -ctx.line_offset + local_baseline;
    let top_left = Vec2::new(
      ctx.x_advance + metrics.bearing_x * scale,
      baseline + metrics.bearing_y * scale,
    );
    let color = if tint {
      ctx.color_stack.current().min(self.config.base_color)
    } else {
      color_override.unwrap_or(Color32::WHITE)
    };

    let unicode = if glyph.unicode != 0 { glyph.unicode } else { 0xE000 + glyph.index };
    let pending = Pending {
      unicode,
      source_index: 0,
      element: Some(ResolvedElement::Sprite {
        glyph: Arc::clone(&glyph),
        asset: Arc::clone(&asset),
      }),
      font: None,
      material_hash: asset.material_hash,
      style: self.effective_style(ctx),
      scale,
      advance: metrics.advance * scale + ctx.character_spacing,
      right_extent: (metrics.bearing_x + metrics.width) * scale,
      ascender: metrics.bearing_y * scale + local_baseline,
      descender: (metrics.bearing_y - metrics.height) * scale + local_baseline,
      top_left,
      bottom_right: Vec2::new(top_left.x + metrics.width * scale, top_left.y - metrics.height * scale),
      baseline,
      is_visible: true,
      color: Some(color),
    };
    self.commit(ctx, info, pending);
    true
  }

  /// Whether the tag value was written with an explicit sign
  /// (`<size=+2>` is relative, `<size=2>` absolute).
  fn value_is_signed(&self, attr: &crate::markup::TagAttribute) -> bool {
    self
      .elements
      .get(attr.value_start)
      .map(|e| e.unicode == 0x2B || e.unicode == 0x2D)
      .unwrap_or(false)
  }

  fn unit_value(&self, ctx: &LayoutContext, value: f32, unit: TagUnit, percent_reference: f32) -> f32 {
    match unit {
      TagUnit::Pixels => value,
      TagUnit::FontUnits => value * ctx.font_size,
      TagUnit::Percentage => value / 100.0 * percent_reference,
    }
  }

  fn material_attr(&self) -> Option<u32> {
    self.scanner.attributes[1..]
      .iter()
      .find(|attr| attr.name_hash == name_hash("material"))
      .map(|attr| attr.value_hash)
  }
}

/// Combining mark ranges used for mark-to-base/mark-to-mark attachment.
fn is_combining_mark(cp: u32) -> bool {
  matches!(
    cp,
    0x0300..=0x036F
    | 0x0483..=0x0489
    | 0x0591..=0x05BD
    | 0x0610..=0x061A
    | 0x064B..=0x065F
    | 0x0670
    | 0x06D6..=0x06DC
    | 0x08D3..=0x08FF
    | 0x0E31 | 0x0E34..=0x0E3A | 0x0E47..=0x0E4E
    | 0x1AB0..=0x1AFF
    | 0x1DC0..=0x1DFF
    | 0x20D0..=0x20FF
    | 0xFE20..=0xFE2F
  )
}

/// Applies case-transform style flags; the second value reports a small
/// caps transform of a lowercase letter (rendered smaller).
fn apply_case(cp: u32, style: FontStyleFlags) -> (u32, bool) {
  let Some(ch) = char::from_u32(cp) else {
    return (cp, false);
  };
  if style.contains(FontStyleFlags::UPPERCASE) {
    return (upper(ch), false);
  }
  if style.contains(FontStyleFlags::LOWERCASE) {
    return (ch.to_lowercase().next().map(|c| c as u32).unwrap_or(cp), false);
  }
  if style.contains(FontStyleFlags::SMALLCAPS) && ch.is_lowercase() {
    return (upper(ch), true);
  }
  (cp, false)
}

fn upper(ch: char) -> u32 {
  ch.to_uppercase().next().map(|c| c as u32).unwrap_or(ch as u32)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn combining_mark_ranges() {
    assert!(is_combining_mark(0x0301), "combining acute");
    assert!(is_combining_mark(0x20D7), "combining arrow");
    assert!(!is_combining_mark('a' as u32));
    assert!(!is_combining_mark(0x3042));
  }

  #[test]
  fn case_transform() {
    let upper = FontStyleFlags::UPPERCASE;
    assert_eq!(apply_case('a' as u32, upper), ('A' as u32, false));
    let small = FontStyleFlags::SMALLCAPS;
    assert_eq!(apply_case('a' as u32, small), ('A' as u32, true));
    assert_eq!(apply_case('A' as u32, small), ('A' as u32, false));
    let lower = FontStyleFlags::LOWERCASE;
    assert_eq!(apply_case('A' as u32, lower), ('a' as u32, false));
  }
}
