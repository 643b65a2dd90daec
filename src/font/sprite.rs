//! Sprite asset model
//!
//! Sprites are inline graphics addressed either by Unicode code point
//! (emoji substitution) or by name/index through the `<sprite>` tag. A
//! [`SpriteAsset`] mirrors the font asset shape: a glyph table, a
//! fallback list, and shared-handle identity for the resolver's cycle
//! guard.

use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

use super::{next_asset_id, AssetId, GlyphMetrics, GlyphRect};
use crate::markup::hash::name_hash;

/// One sprite glyph within a sprite asset.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteGlyph {
  /// Index within the owning asset; `<sprite index=N>` addresses this.
  pub index: u32,
  /// Code point this sprite substitutes for, or 0 for name/index-only
  /// sprites.
  pub unicode: u32,
  /// Case-insensitive hash of the sprite name.
  pub name_hash: u32,
  pub metrics: GlyphMetrics,
  pub rect: GlyphRect,
  pub scale: f32,
}

/// A sprite sheet asset.
pub struct SpriteAsset {
  id: AssetId,
  /// Case-insensitive hash of the asset name (`<sprite="sheet" ...>`).
  pub name_hash: u32,
  /// Hash of the material bound to the sprite sheet texture.
  pub material_hash: u32,
  /// Nominal size sprites were authored at; used to scale them to the
  /// current font size.
  pub point_size: f32,
  pub scale: f32,
  by_unicode: FxHashMap<u32, Arc<SpriteGlyph>>,
  by_name: FxHashMap<u32, Arc<SpriteGlyph>>,
  by_index: FxHashMap<u32, Arc<SpriteGlyph>>,
  fallbacks: RwLock<Vec<Arc<SpriteAsset>>>,
}

impl std::fmt::Debug for SpriteAsset {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SpriteAsset")
      .field("id", &self.id)
      .field("sprites", &self.by_index.len())
      .finish()
  }
}

impl SpriteAsset {
  #[inline]
  pub fn id(&self) -> AssetId {
    self.id
  }

  pub fn lookup_unicode(&self, unicode: u32) -> Option<Arc<SpriteGlyph>> {
    self.by_unicode.get(&unicode).cloned()
  }

  pub fn lookup_name(&self, hash: u32) -> Option<Arc<SpriteGlyph>> {
    self.by_name.get(&hash).cloned()
  }

  pub fn lookup_index(&self, index: u32) -> Option<Arc<SpriteGlyph>> {
    self.by_index.get(&index).cloned()
  }

  pub fn add_fallback(&self, asset: Arc<SpriteAsset>) {
    if let Ok(mut fallbacks) = self.fallbacks.write() {
      fallbacks.push(asset);
    }
  }

  pub fn fallbacks(&self) -> Vec<Arc<SpriteAsset>> {
    self
      .fallbacks
      .read()
      .map(|list| list.clone())
      .unwrap_or_default()
  }
}

/// Builder for [`SpriteAsset`].
pub struct SpriteAssetBuilder {
  name_hash: u32,
  material_hash: u32,
  point_size: f32,
  scale: f32,
  sprites: Vec<SpriteGlyph>,
}

impl SpriteAssetBuilder {
  pub fn new(name: &str) -> Self {
    Self {
      name_hash: name_hash(name),
      material_hash: 0,
      point_size: 36.0,
      scale: 1.0,
      sprites: Vec::new(),
    }
  }

  pub fn material_hash(mut self, hash: u32) -> Self {
    self.material_hash = hash;
    self
  }

  pub fn point_size(mut self, point_size: f32) -> Self {
    self.point_size = point_size;
    self
  }

  pub fn scale(mut self, scale: f32) -> Self {
    self.scale = scale;
    self
  }

  /// Adds a sprite glyph. `name` feeds the `<sprite name=...>` lookup.
  pub fn sprite(mut self, name: &str, mut glyph: SpriteGlyph) -> Self {
    glyph.name_hash = name_hash(name);
    self.sprites.push(glyph);
    self
  }

  pub fn build(self) -> Arc<SpriteAsset> {
    let mut by_unicode = FxHashMap::default();
    let mut by_name = FxHashMap::default();
    let mut by_index = FxHashMap::default();
    for glyph in self.sprites {
      let glyph = Arc::new(glyph);
      if glyph.unicode != 0 {
        by_unicode.insert(glyph.unicode, Arc::clone(&glyph));
      }
      by_name.insert(glyph.name_hash, Arc::clone(&glyph));
      by_index.insert(glyph.index, glyph);
    }
    Arc::new(SpriteAsset {
      id: next_asset_id(),
      name_hash: self.name_hash,
      material_hash: self.material_hash,
      point_size: self.point_size,
      scale: self.scale,
      by_unicode,
      by_name,
      by_index,
      fallbacks: RwLock::new(Vec::new()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn star(index: u32, unicode: u32) -> SpriteGlyph {
    SpriteGlyph {
      index,
      unicode,
      name_hash: 0,
      metrics: GlyphMetrics {
        width: 32.0,
        height: 32.0,
        bearing_x: 0.0,
        bearing_y: 28.0,
        advance: 34.0,
      },
      rect: GlyphRect::default(),
      scale: 1.0,
    }
  }

  #[test]
  fn lookups_by_unicode_name_and_index() {
    let asset = SpriteAssetBuilder::new("icons")
      .sprite("star", star(0, 0x2B50))
      .sprite("dot", star(1, 0))
      .build();

    assert!(asset.lookup_unicode(0x2B50).is_some());
    assert!(asset.lookup_unicode(0x41).is_none());
    assert_eq!(asset.lookup_name(name_hash("STAR")).unwrap().index, 0);
    assert_eq!(asset.lookup_index(1).unwrap().name_hash, name_hash("dot"));
  }
}
