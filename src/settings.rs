//! Read-only engine settings
//!
//! The settings provider is an external collaborator: the engine reads
//! defaults (font, size), substitution policy for missing characters,
//! line-breaking character tables, gradient presets, and the global
//! fallback asset chain from it, and never writes back. The embedding
//! application typically loads this once from its persisted
//! configuration.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::color::ColorGradient;
use crate::font::{AnyAsset, FontAsset, SpriteAsset};
use crate::layout::breaking::LineBreakingRules;
use crate::markup::hash::name_hash;

/// Engine-wide defaults and policy.
#[derive(Debug, Clone)]
pub struct TextSettings {
  /// Font used when a text object has none assigned.
  pub default_font: Option<Arc<FontAsset>>,
  /// Sprite asset consulted by `<sprite>` tags without a name.
  pub default_sprite_asset: Option<Arc<SpriteAsset>>,
  pub default_font_size: f32,
  /// Replacement code point for unresolvable characters (typically
  /// U+25A1 WHITE SQUARE); 0 skips rendering instead.
  pub missing_glyph: u32,
  pub line_breaking: LineBreakingRules,
  /// Gates the missing-glyph/missing-asset warning log.
  pub warnings_enabled: bool,
  /// Ordered font/sprite assets searched when neither the current font
  /// nor its fallback graph has a character (emoji chain).
  pub fallback_assets: Vec<AnyAsset>,
  /// `<gradient=Name>` presets, keyed by case-insensitive name hash.
  pub gradient_presets: FxHashMap<u32, ColorGradient>,
  /// Fonts addressable by `<font="Family Name">`, keyed by name hash.
  pub fonts: FxHashMap<u32, Arc<FontAsset>>,
  /// Sprite sheets addressable by `<sprite="name" ...>`, keyed by name
  /// hash.
  pub sprite_assets: FxHashMap<u32, Arc<SpriteAsset>>,
}

impl Default for TextSettings {
  fn default() -> Self {
    Self {
      default_font: None,
      default_sprite_asset: None,
      default_font_size: 36.0,
      missing_glyph: 0x25A1,
      line_breaking: LineBreakingRules::default(),
      warnings_enabled: false,
      fallback_assets: Vec::new(),
      gradient_presets: FxHashMap::default(),
      fonts: FxHashMap::default(),
      sprite_assets: FxHashMap::default(),
    }
  }
}

impl TextSettings {
  pub fn with_default_font(mut self, font: Arc<FontAsset>) -> Self {
    self.default_font = Some(font);
    self
  }

  pub fn with_default_sprite_asset(mut self, asset: Arc<SpriteAsset>) -> Self {
    self.default_sprite_asset = Some(asset);
    self
  }

  pub fn with_missing_glyph(mut self, unicode: u32) -> Self {
    self.missing_glyph = unicode;
    self
  }

  pub fn with_warnings(mut self, enabled: bool) -> Self {
    self.warnings_enabled = enabled;
    self
  }

  pub fn with_modern_hangul_breaking(mut self, enabled: bool) -> Self {
    self.line_breaking.use_modern_hangul = enabled;
    self
  }

  pub fn with_fallback_asset(mut self, asset: AnyAsset) -> Self {
    self.fallback_assets.push(asset);
    self
  }

  pub fn with_gradient_preset(mut self, name: &str, gradient: ColorGradient) -> Self {
    self.gradient_presets.insert(name_hash(name), gradient);
    self
  }

  /// Registers a font for `<font="Family Name">` lookup, keyed by its
  /// face family name.
  pub fn with_font(mut self, font: Arc<FontAsset>) -> Self {
    self.fonts.insert(name_hash(&font.face.family_name), font);
    self
  }

  /// Registers a sprite sheet for `<sprite="name">` lookup.
  pub fn with_sprite_asset(mut self, asset: Arc<SpriteAsset>) -> Self {
    self.sprite_assets.insert(asset.name_hash, asset);
    self
  }
}
