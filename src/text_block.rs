//! The text object
//!
//! [`TextBlock`] is what the embedding application holds: the source
//! text, the layout configuration, and the reusable buffers (processing
//! array, character/line records, parser scratch) that persist across
//! layout passes. One block is one text; blocks are independent and own
//! all their scratch, so separate blocks never alias.
//!
//! `layout` runs the full pipeline: preparation (escapes, styles,
//! surrogates), then the layout scan, wrapped in the auto-size loop when
//! enabled. Auto-sizing binary-searches the `[font_size_min,
//! font_size_max]` interval, snapping candidates to
//! [`AUTO_SIZE_GRANULARITY`] and giving up (freezing the current size)
//! after [`AUTO_SIZE_MAX_ITERATIONS`] restarts. Before touching the
//! point size it spends the character-width adjustment budget, which
//! compresses glyph advances up to `char_width_adjust_max` percent.

use std::sync::Arc;

use crate::color::Color32;
use crate::error::{LayoutError, Result};
use crate::font::resolver::GlyphResolver;
use crate::font::{FontAsset, FontStyleFlags, FontWeight, SpriteAsset};
use crate::format::format_into;
use crate::layout::engine::{
  LayoutConfig, LayoutEngine, MissingGlyphHandler, ScanOutcome, AUTO_SIZE_GRANULARITY,
  AUTO_SIZE_MAX_ITERATIONS,
};
use crate::layout::{HorizontalAlignment, OverflowMode, TextInfo};
use crate::markup::scanner::TagScanner;
use crate::prepare::{units_from_str, units_from_utf16, PrepareRequest, TextElement, TextPreparer, TextPreprocessor};
use crate::settings::TextSettings;
use crate::style::{normal_style_hash, StyleSheet};

/// A rich-text object: configuration, buffers, and layout entry points.
pub struct TextBlock {
  // Configuration.
  pub font: Option<Arc<FontAsset>>,
  pub font_size: f32,
  pub auto_size: bool,
  pub font_size_min: f32,
  pub font_size_max: f32,
  /// Maximum glyph-advance compression during auto-sizing, in percent.
  pub char_width_adjust_max: f32,
  /// Restart budget for the auto-size search.
  pub auto_size_max_iterations: u32,
  pub word_wrapping: bool,
  pub overflow: OverflowMode,
  pub alignment: HorizontalAlignment,
  /// Layout rectangle (width, height); `f32::INFINITY` leaves an axis
  /// unconstrained.
  pub size: (f32, f32),
  /// Left, top, right, bottom.
  pub margins: [f32; 4],
  pub rich_text: bool,
  pub parse_escapes: bool,
  pub kerning: bool,
  pub character_spacing: f32,
  pub word_spacing: f32,
  pub line_spacing: f32,
  pub paragraph_spacing: f32,
  pub base_color: Color32,
  pub font_style: FontStyleFlags,
  pub font_weight: FontWeight,
  pub style_sheet: Option<Arc<StyleSheet>>,
  pub sprite_asset: Option<Arc<SpriteAsset>>,
  default_style: u32,

  // Hooks.
  preprocessor: Option<Box<dyn TextPreprocessor>>,
  missing_glyph_handler: Option<Box<dyn MissingGlyphHandler>>,

  // Buffers, reused across passes.
  source: String,
  source_units: Vec<u32>,
  elements: Vec<TextElement>,
  info: TextInfo,
  preparer: TextPreparer,
  scanner: TagScanner,
  resolver: GlyphResolver,
  dirty: bool,
  computed_font_size: f32,
}

impl Default for TextBlock {
  fn default() -> Self {
    Self::new()
  }
}

impl TextBlock {
  pub fn new() -> Self {
    Self {
      font: None,
      font_size: 36.0,
      auto_size: false,
      font_size_min: 10.0,
      font_size_max: 72.0,
      char_width_adjust_max: 0.0,
      auto_size_max_iterations: AUTO_SIZE_MAX_ITERATIONS,
      word_wrapping: true,
      overflow: OverflowMode::Overflow,
      alignment: HorizontalAlignment::Left,
      size: (f32::INFINITY, f32::INFINITY),
      margins: [0.0; 4],
      rich_text: true,
      parse_escapes: true,
      kerning: true,
      character_spacing: 0.0,
      word_spacing: 0.0,
      line_spacing: 0.0,
      paragraph_spacing: 0.0,
      base_color: Color32::WHITE,
      font_style: FontStyleFlags::NORMAL,
      font_weight: FontWeight::Regular,
      style_sheet: None,
      sprite_asset: None,
      default_style: normal_style_hash(),
      preprocessor: None,
      missing_glyph_handler: None,
      source: String::new(),
      source_units: Vec::new(),
      elements: Vec::new(),
      info: TextInfo::default(),
      preparer: TextPreparer::new(),
      scanner: TagScanner::new(),
      resolver: GlyphResolver::new(),
      dirty: true,
      computed_font_size: 36.0,
    }
  }

  // ===========================================================================
  // Text input
  // ===========================================================================

  /// Replaces the text. The preprocessing hook, when set, runs here.
  pub fn set_text(&mut self, text: &str) {
    match &self.preprocessor {
      Some(hook) => {
        self.source = hook.preprocess(text);
      }
      None => {
        self.source.clear();
        self.source.push_str(text);
      }
    }
    units_from_str(&self.source, &mut self.source_units);
    self.dirty = true;
  }

  /// Replaces the text from a UTF-16 buffer; surrogate pairs combine
  /// during preparation.
  pub fn set_text_utf16(&mut self, units: &[u16]) {
    units_from_utf16(units, &mut self.source_units);
    self.source = String::from_utf16_lossy(units);
    self.dirty = true;
  }

  /// Replaces the text with a formatted pattern (`{0}`, `{1:000.00}`,
  /// up to 8 positional float arguments), writing directly into the
  /// backing buffer.
  pub fn set_text_format(&mut self, pattern: &str, args: &[f32]) -> Result<()> {
    self.source_units.clear();
    format_into(pattern, args, &mut self.source_units)?;
    self.source = self
      .source_units
      .iter()
      .filter_map(|&u| char::from_u32(u))
      .collect();
    self.dirty = true;
    Ok(())
  }

  pub fn text(&self) -> &str {
    &self.source
  }

  /// Sets the default style wrapped around the whole text (`"Normal"`
  /// means none).
  pub fn set_default_style(&mut self, name: &str) {
    self.default_style = crate::markup::hash::name_hash(name);
    self.dirty = true;
  }

  pub fn set_style_sheet(&mut self, sheet: Option<Arc<StyleSheet>>) {
    self.style_sheet = sheet;
    self.dirty = true;
  }

  pub fn set_preprocessor(&mut self, hook: Option<Box<dyn TextPreprocessor>>) {
    self.preprocessor = hook;
    self.dirty = true;
  }

  pub fn set_missing_glyph_handler(&mut self, handler: Option<Box<dyn MissingGlyphHandler>>) {
    self.missing_glyph_handler = handler;
  }

  // ===========================================================================
  // Layout
  // ===========================================================================

  /// Runs the full pipeline and returns the layout result.
  pub fn layout(&mut self, settings: &TextSettings) -> Result<&TextInfo> {
    let font = self
      .font
      .clone()
      .or_else(|| settings.default_font.clone())
      .ok_or(LayoutError::NoFontAsset)?;

    self.prepare();

    let config = self.build_config(font, self.size, self.overflow, self.word_wrapping);

    let auto_size = self.auto_size;
    let min_size = self.font_size_min.max(0.1);
    let max_size = self.font_size_max.max(min_size);
    let max_delta = (self.char_width_adjust_max / 100.0).clamp(0.0, 0.5);
    let cap = self.auto_size_max_iterations.max(1);

    let mut working_size = if auto_size {
      self.font_size.clamp(min_size, max_size)
    } else {
      self.font_size
    };
    let mut lower = min_size;
    let mut upper = max_size;
    let mut width_delta = 0.0f32;
    let mut iterations = 0u32;

    let mut engine = LayoutEngine::new(
      &config,
      settings,
      &self.elements,
      &self.source,
      &mut self.resolver,
      &mut self.scanner,
      self.missing_glyph_handler.as_deref(),
    );

    loop {
      let can_shrink = auto_size
        && iterations < cap
        && (working_size > lower + f32::EPSILON || width_delta < max_delta - f32::EPSILON);
      let outcome = engine.scan(&mut self.info, working_size, width_delta, can_shrink);
      iterations += 1;

      match outcome {
        ScanOutcome::Complete => {
          if auto_size && iterations < cap && !self.info.truncated {
            // Fits: try growing toward the configured maximum.
            if working_size < upper - AUTO_SIZE_GRANULARITY / 2.0 {
              lower = working_size;
              let next = snap((working_size + upper) / 2.0).min(upper);
              if next > working_size + f32::EPSILON {
                working_size = next;
                continue;
              }
            }
          }
          break;
        }
        ScanOutcome::TooLarge => {
          // Spend the width-adjustment budget before shrinking.
          if width_delta < max_delta - f32::EPSILON {
            width_delta = (width_delta + 0.01).min(max_delta);
            continue;
          }
          if iterations < cap && working_size > lower + f32::EPSILON {
            upper = working_size;
            let next = snap((working_size + lower) / 2.0).max(lower);
            if next < working_size - f32::EPSILON {
              working_size = next;
              continue;
            }
          }
          // Frozen: lay out at the current size without restarts.
          engine.scan(&mut self.info, working_size, width_delta, false);
          break;
        }
      }
    }

    self.computed_font_size = working_size;
    Ok(&self.info)
  }

  /// The point size the last layout actually used (differs from
  /// `font_size` when auto-sizing).
  pub fn computed_font_size(&self) -> f32 {
    self.computed_font_size
  }

  /// Read-only access to the last layout result.
  pub fn text_info(&self) -> &TextInfo {
    &self.info
  }

  /// The size the text wants: unconstrained by default, or wrapped at
  /// `constraint_width` when given. Does not disturb the stored layout.
  pub fn preferred_size(
    &mut self,
    settings: &TextSettings,
    constraint_width: Option<f32>,
  ) -> Result<(f32, f32)> {
    let font = self
      .font
      .clone()
      .or_else(|| settings.default_font.clone())
      .ok_or(LayoutError::NoFontAsset)?;

    self.prepare();

    let rect = (constraint_width.unwrap_or(f32::INFINITY), f32::INFINITY);
    let config = self.build_config(font, rect, OverflowMode::Overflow, constraint_width.is_some());

    let mut engine = LayoutEngine::new(
      &config,
      settings,
      &self.elements,
      &self.source,
      &mut self.resolver,
      &mut self.scanner,
      self.missing_glyph_handler.as_deref(),
    );
    let mut scratch = TextInfo::default();
    engine.scan(&mut scratch, self.font_size, 0.0, false);
    Ok((scratch.preferred_width, scratch.preferred_height))
  }

  /// The laid-out text with markup stripped (case transforms applied).
  pub fn parsed_text(&mut self, settings: &TextSettings) -> Result<String> {
    self.layout(settings)?;
    Ok(self.info.parsed_text())
  }

  // ===========================================================================
  // Internals
  // ===========================================================================

  fn prepare(&mut self) {
    if !self.dirty {
      return;
    }
    let request = PrepareRequest {
      source: &self.source_units,
      rich_text: self.rich_text,
      parse_escapes: self.parse_escapes,
      sheet: self.style_sheet.as_deref(),
      default_style: self.default_style,
    };
    self.preparer.build(&request, &mut self.elements);
    self.dirty = false;
  }

  fn build_config(
    &self,
    font: Arc<FontAsset>,
    size: (f32, f32),
    overflow: OverflowMode,
    wrapping: bool,
  ) -> LayoutConfig {
    LayoutConfig {
      font,
      sprite_asset: self.sprite_asset.clone(),
      base_color: self.base_color,
      alignment: self.alignment,
      wrapping,
      overflow,
      width: size.0,
      height: size.1,
      margins: self.margins,
      rich_text: self.rich_text,
      kerning: self.kerning,
      character_spacing: self.character_spacing,
      word_spacing: self.word_spacing,
      line_spacing: self.line_spacing,
      paragraph_spacing: self.paragraph_spacing,
      font_style: self.font_style,
      font_weight: self.font_weight,
    }
  }
}

/// Snaps an auto-size candidate down to the step granularity.
fn snap(size: f32) -> f32 {
  (size / AUTO_SIZE_GRANULARITY).floor() * AUTO_SIZE_GRANULARITY
}
