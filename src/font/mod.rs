//! Font and sprite asset model
//!
//! The engine does not parse font files or rasterize glyphs. A
//! [`FontAsset`] is an opaque bundle handed in by the embedding
//! application: face metrics, a glyph lookup table, kerning-pair and mark
//! anchor tables, alternative typefaces per weight/style, and a fallback
//! list. Assets are shared, reference-counted, and borrowed by the layout
//! core; the engine never frees them.
//!
//! An asset may carry a [`GlyphSource`], the opaque "rasterize on demand"
//! capability: when a code point is missing from the lookup table, the
//! source is asked once and a returned glyph is cached into the table.
//!
//! Asset identity ([`AssetId`], process-unique) drives the cycle guard in
//! [`resolver`]: fallback graphs may legally contain cycles, and
//! traversal carries a visited-identity set instead of trusting the graph
//! shape.

pub mod resolver;
pub mod sprite;

pub use sprite::{SpriteAsset, SpriteAssetBuilder, SpriteGlyph};

use rustc_hash::FxHashMap;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// Process-unique identity of a font or sprite asset.
pub type AssetId = u32;

static NEXT_ASSET_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_asset_id() -> AssetId {
  NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

/// Per-character style flags, accumulated from markup tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontStyleFlags(u16);

impl FontStyleFlags {
  pub const NORMAL: FontStyleFlags = FontStyleFlags(0);
  pub const BOLD: FontStyleFlags = FontStyleFlags(1 << 0);
  pub const ITALIC: FontStyleFlags = FontStyleFlags(1 << 1);
  pub const UNDERLINE: FontStyleFlags = FontStyleFlags(1 << 2);
  pub const STRIKETHROUGH: FontStyleFlags = FontStyleFlags(1 << 3);
  pub const HIGHLIGHT: FontStyleFlags = FontStyleFlags(1 << 4);
  pub const SUPERSCRIPT: FontStyleFlags = FontStyleFlags(1 << 5);
  pub const SUBSCRIPT: FontStyleFlags = FontStyleFlags(1 << 6);
  pub const SMALLCAPS: FontStyleFlags = FontStyleFlags(1 << 7);
  pub const UPPERCASE: FontStyleFlags = FontStyleFlags(1 << 8);
  pub const LOWERCASE: FontStyleFlags = FontStyleFlags(1 << 9);

  #[inline]
  pub fn contains(self, other: FontStyleFlags) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline]
  pub fn insert(&mut self, other: FontStyleFlags) {
    self.0 |= other.0;
  }

  #[inline]
  pub fn remove(&mut self, other: FontStyleFlags) {
    self.0 &= !other.0;
  }

  /// Raw bit representation; bit positions match the associated consts.
  #[inline]
  pub fn bits(self) -> u16 {
    self.0
  }

  /// Reconstructs flags from raw bits.
  #[inline]
  pub fn from_bits(bits: u16) -> Self {
    FontStyleFlags(bits)
  }

  #[inline]
  pub fn is_italic(self) -> bool {
    self.contains(FontStyleFlags::ITALIC)
  }

  #[inline]
  pub fn is_bold(self) -> bool {
    self.contains(FontStyleFlags::BOLD)
  }
}

impl BitOr for FontStyleFlags {
  type Output = FontStyleFlags;
  fn bitor(self, rhs: Self) -> Self {
    FontStyleFlags(self.0 | rhs.0)
  }
}

impl BitOrAssign for FontStyleFlags {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

/// The nine standard weight classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FontWeight {
  Thin,
  ExtraLight,
  Light,
  #[default]
  Regular,
  Medium,
  SemiBold,
  Bold,
  ExtraBold,
  Black,
}

impl FontWeight {
  /// Numeric weight (100-900).
  pub fn to_u16(self) -> u16 {
    (self.index() as u16) * 100
  }

  /// Index into the weight alternate table (1-9). `Regular` is 4.
  pub fn index(self) -> usize {
    match self {
      FontWeight::Thin => 1,
      FontWeight::ExtraLight => 2,
      FontWeight::Light => 3,
      FontWeight::Regular => 4,
      FontWeight::Medium => 5,
      FontWeight::SemiBold => 6,
      FontWeight::Bold => 7,
      FontWeight::ExtraBold => 8,
      FontWeight::Black => 9,
    }
  }

  /// Maps a numeric weight onto its class; any unmapped value defaults
  /// to `Regular`.
  pub fn from_u16(weight: u16) -> Self {
    match weight {
      100 => FontWeight::Thin,
      200 => FontWeight::ExtraLight,
      300 => FontWeight::Light,
      400 => FontWeight::Regular,
      500 => FontWeight::Medium,
      600 => FontWeight::SemiBold,
      700 => FontWeight::Bold,
      800 => FontWeight::ExtraBold,
      900 => FontWeight::Black,
      _ => FontWeight::Regular,
    }
  }
}

/// Face-level metrics, in font units at `point_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMetrics {
  pub family_name: String,
  /// The size the face was generated at; per-element scale is
  /// `current_size / point_size * scale`.
  pub point_size: f32,
  pub scale: f32,
  pub line_height: f32,
  pub ascender: f32,
  pub descender: f32,
  pub cap_height: f32,
  pub baseline: f32,
  pub underline_offset: f32,
  pub underline_thickness: f32,
  pub strikethrough_offset: f32,
  pub subscript_offset: f32,
  /// Relative size multiplier for subscript glyphs (0-1].
  pub subscript_size: f32,
  pub superscript_offset: f32,
  /// Relative size multiplier for superscript glyphs (0-1].
  pub superscript_size: f32,
  pub tab_width: f32,
  /// Extra advance applied per bold glyph, in font units.
  pub bold_spacing: f32,
  /// Shear angle applied to italicized glyphs, in degrees.
  pub italic_slant: f32,
}

impl Default for FaceMetrics {
  fn default() -> Self {
    Self {
      family_name: String::new(),
      point_size: 36.0,
      scale: 1.0,
      line_height: 42.0,
      ascender: 32.0,
      descender: -10.0,
      cap_height: 26.0,
      baseline: 0.0,
      underline_offset: -4.0,
      underline_thickness: 2.0,
      strikethrough_offset: 11.0,
      subscript_offset: -8.0,
      subscript_size: 0.5,
      superscript_offset: 16.0,
      superscript_size: 0.5,
      tab_width: 10.0,
      bold_spacing: 7.0,
      italic_slant: 35.0,
    }
  }
}

/// Per-glyph metrics, in font units at the face's `point_size`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphMetrics {
  pub width: f32,
  pub height: f32,
  /// Horizontal offset from the origin to the glyph's left edge.
  pub bearing_x: f32,
  /// Vertical offset from the baseline to the glyph's top edge.
  pub bearing_y: f32,
  pub advance: f32,
}

/// Atlas texel rectangle for a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// A resolved glyph: metrics plus atlas placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
  /// Glyph index within its font; keys kerning and anchor tables.
  pub index: u32,
  pub metrics: GlyphMetrics,
  pub rect: GlyphRect,
  /// Glyph-level scale multiplier (1.0 for most glyphs).
  pub scale: f32,
  /// Which atlas texture the rect refers to.
  pub atlas_index: u16,
}

impl Default for Glyph {
  fn default() -> Self {
    Self {
      index: 0,
      metrics: GlyphMetrics::default(),
      rect: GlyphRect::default(),
      scale: 1.0,
      atlas_index: 0,
    }
  }
}

/// Kerning-pair adjustment, applied to the second glyph of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphPairAdjustment {
  pub x_placement: f32,
  pub y_placement: f32,
  pub x_advance: f32,
}

/// Anchor pair for mark attachment: the attachment point on the
/// preceding base (or mark) glyph and the matching point on the mark.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorRecord {
  pub base_x: f32,
  pub base_y: f32,
  pub mark_x: f32,
  pub mark_y: f32,
}

/// Opaque on-demand glyph capability ("given a code point, return glyph
/// metrics and an atlas rect, or fail"). Implementations typically
/// rasterize into a dynamic atlas; that machinery is out of scope here.
pub trait GlyphSource: Send + Sync {
  fn request_glyph(&self, unicode: u32) -> Option<Glyph>;
}

/// A font asset: face metrics plus lookup tables, shared by handle.
pub struct FontAsset {
  id: AssetId,
  /// Hash of the default material bound to this asset's atlas.
  pub material_hash: u32,
  pub face: FaceMetrics,
  glyphs: RwLock<FxHashMap<u32, Arc<Glyph>>>,
  kerning: FxHashMap<(u32, u32), GlyphPairAdjustment>,
  mark_to_base: FxHashMap<(u32, u32), AnchorRecord>,
  mark_to_mark: FxHashMap<(u32, u32), AnchorRecord>,
  /// `[weight index 0-9][0 regular, 1 italic]`; index 0 is unused.
  alternates: RwLock<[[Option<Arc<FontAsset>>; 2]; 10]>,
  fallbacks: RwLock<Vec<Arc<FontAsset>>>,
  source: Option<Box<dyn GlyphSource>>,
}

impl std::fmt::Debug for FontAsset {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FontAsset")
      .field("id", &self.id)
      .field("family", &self.face.family_name)
      .field("dynamic", &self.source.is_some())
      .finish()
  }
}

impl FontAsset {
  #[inline]
  pub fn id(&self) -> AssetId {
    self.id
  }

  /// Table-only lookup; does not consult the glyph source.
  pub fn lookup(&self, unicode: u32) -> Option<Arc<Glyph>> {
    self
      .glyphs
      .read()
      .ok()
      .and_then(|table| table.get(&unicode).cloned())
  }

  /// Table lookup, falling back to on-demand glyph addition when this
  /// asset carries a [`GlyphSource`]. Newly added glyphs are cached.
  pub fn lookup_or_add(&self, unicode: u32) -> Option<Arc<Glyph>> {
    if let Some(glyph) = self.lookup(unicode) {
      return Some(glyph);
    }
    let source = self.source.as_ref()?;
    let glyph = Arc::new(source.request_glyph(unicode)?);
    if let Ok(mut table) = self.glyphs.write() {
      table.insert(unicode, Arc::clone(&glyph));
    }
    Some(glyph)
  }

  pub fn has_glyph(&self, unicode: u32) -> bool {
    self
      .glyphs
      .read()
      .map(|table| table.contains_key(&unicode))
      .unwrap_or(false)
  }

  /// Registers an alternative typeface for a weight/style pair.
  pub fn set_alternate(&self, weight: FontWeight, italic: bool, asset: Arc<FontAsset>) {
    if let Ok(mut table) = self.alternates.write() {
      table[weight.index()][usize::from(italic)] = Some(asset);
    }
  }

  /// Looks up the alternative typeface for a weight index and style.
  pub fn alternate(&self, weight_index: usize, italic: bool) -> Option<Arc<FontAsset>> {
    let table = self.alternates.read().ok()?;
    table.get(weight_index)?.get(usize::from(italic))?.clone()
  }

  /// Appends a fallback font searched when this asset lacks a glyph.
  pub fn add_fallback(&self, asset: Arc<FontAsset>) {
    if let Ok(mut fallbacks) = self.fallbacks.write() {
      fallbacks.push(asset);
    }
  }

  /// Snapshot of the fallback list (cheap handle clones).
  pub fn fallbacks(&self) -> Vec<Arc<FontAsset>> {
    self
      .fallbacks
      .read()
      .map(|list| list.clone())
      .unwrap_or_default()
  }

  /// Kerning adjustment for a glyph-index pair, if any.
  #[inline]
  pub fn kerning_pair(&self, first: u32, second: u32) -> Option<GlyphPairAdjustment> {
    self.kerning.get(&(first, second)).copied()
  }

  /// Mark-to-base anchor record for `(base, mark)` glyph indices.
  #[inline]
  pub fn mark_base_anchor(&self, base: u32, mark: u32) -> Option<AnchorRecord> {
    self.mark_to_base.get(&(base, mark)).copied()
  }

  /// Mark-to-mark anchor record for `(mark, mark)` glyph indices.
  #[inline]
  pub fn mark_mark_anchor(&self, first: u32, second: u32) -> Option<AnchorRecord> {
    self.mark_to_mark.get(&(first, second)).copied()
  }
}

/// Builder for [`FontAsset`]; the embedding application's asset import
/// path populates it from whatever font machinery it uses.
pub struct FontAssetBuilder {
  face: FaceMetrics,
  material_hash: u32,
  glyphs: FxHashMap<u32, Arc<Glyph>>,
  kerning: FxHashMap<(u32, u32), GlyphPairAdjustment>,
  mark_to_base: FxHashMap<(u32, u32), AnchorRecord>,
  mark_to_mark: FxHashMap<(u32, u32), AnchorRecord>,
  source: Option<Box<dyn GlyphSource>>,
}

impl FontAssetBuilder {
  pub fn new(face: FaceMetrics) -> Self {
    Self {
      face,
      material_hash: 0,
      glyphs: FxHashMap::default(),
      kerning: FxHashMap::default(),
      mark_to_base: FxHashMap::default(),
      mark_to_mark: FxHashMap::default(),
      source: None,
    }
  }

  pub fn material_hash(mut self, hash: u32) -> Self {
    self.material_hash = hash;
    self
  }

  pub fn glyph(mut self, unicode: u32, glyph: Glyph) -> Self {
    self.glyphs.insert(unicode, Arc::new(glyph));
    self
  }

  pub fn kerning(mut self, first: u32, second: u32, adjustment: GlyphPairAdjustment) -> Self {
    self.kerning.insert((first, second), adjustment);
    self
  }

  pub fn mark_to_base(mut self, base: u32, mark: u32, record: AnchorRecord) -> Self {
    self.mark_to_base.insert((base, mark), record);
    self
  }

  pub fn mark_to_mark(mut self, first: u32, second: u32, record: AnchorRecord) -> Self {
    self.mark_to_mark.insert((first, second), record);
    self
  }

  /// Attaches the on-demand glyph capability, making the asset dynamic.
  pub fn glyph_source(mut self, source: Box<dyn GlyphSource>) -> Self {
    self.source = Some(source);
    self
  }

  pub fn build(self) -> Arc<FontAsset> {
    Arc::new(FontAsset {
      id: next_asset_id(),
      material_hash: self.material_hash,
      face: self.face,
      glyphs: RwLock::new(self.glyphs),
      kerning: self.kerning,
      mark_to_base: self.mark_to_base,
      mark_to_mark: self.mark_to_mark,
      alternates: RwLock::new(Default::default()),
      fallbacks: RwLock::new(Vec::new()),
      source: self.source,
    })
  }
}

/// A mixed font-or-sprite asset reference, used for ordered search lists
/// such as the settings-provided emoji fallback chain.
#[derive(Debug, Clone)]
pub enum AnyAsset {
  Font(Arc<FontAsset>),
  Sprite(Arc<SpriteAsset>),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn style_flags_combine() {
    let mut flags = FontStyleFlags::BOLD | FontStyleFlags::ITALIC;
    assert!(flags.is_bold());
    assert!(flags.is_italic());
    assert!(!flags.contains(FontStyleFlags::UNDERLINE));
    flags.remove(FontStyleFlags::BOLD);
    assert!(!flags.is_bold());
  }

  #[test]
  fn weight_index_defaults_to_regular() {
    assert_eq!(FontWeight::from_u16(400), FontWeight::Regular);
    assert_eq!(FontWeight::from_u16(450), FontWeight::Regular);
    assert_eq!(FontWeight::from_u16(0), FontWeight::Regular);
    assert_eq!(FontWeight::Regular.index(), 4);
    assert_eq!(FontWeight::Black.index(), 9);
  }

  #[test]
  fn asset_ids_are_unique() {
    let a = FontAssetBuilder::new(FaceMetrics::default()).build();
    let b = FontAssetBuilder::new(FaceMetrics::default()).build();
    assert_ne!(a.id(), b.id());
  }

  struct OneGlyph;

  impl GlyphSource for OneGlyph {
    fn request_glyph(&self, unicode: u32) -> Option<Glyph> {
      (unicode == 0x41).then(|| Glyph {
        index: 7,
        scale: 1.0,
        ..Default::default()
      })
    }
  }

  #[test]
  fn dynamic_lookup_caches_added_glyph() {
    let asset = FontAssetBuilder::new(FaceMetrics::default())
      .glyph_source(Box::new(OneGlyph))
      .build();
    assert!(!asset.has_glyph(0x41));
    let glyph = asset.lookup_or_add(0x41).unwrap();
    assert_eq!(glyph.index, 7);
    assert!(asset.has_glyph(0x41));
    assert!(asset.lookup_or_add(0x42).is_none());
  }
}
