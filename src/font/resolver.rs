//! Character and sprite glyph resolution
//!
//! `resolve(code point, primary font, style, weight)` walks, in order:
//!
//! 1. For a non-regular weight or italic style: a composite cache keyed
//!    by `(0x80 | style_bit << 4 | weight_index) << 24 | code point`,
//!    then the weight/style alternate table of the primary font.
//! 2. The primary font's own glyph table, with on-demand glyph addition
//!    when the asset is dynamic.
//! 3. The fallback font graph, depth-first, guarded by a visited set of
//!    asset identities so cyclic graphs terminate. The set is cleared at
//!    the start of every top-level request — not per recursion level —
//!    and threaded down the call chain as an explicit parameter.
//!
//! Composite cache entries hold weak handles: a hit whose backing asset
//! has been unloaded is purged and the search retried as a miss, never
//! returned stale.
//!
//! A structurally identical path resolves sprite characters against
//! sprite-asset fallback chains, and a combined path searches an ordered
//! mixed font/sprite list (the settings-provided emoji fallback chain).

use lru::LruCache;
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::BuildHasherDefault;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use super::{AnyAsset, AssetId, FontAsset, FontStyleFlags, FontWeight, Glyph};
use super::sprite::{SpriteAsset, SpriteGlyph};

type CacheHasher = BuildHasherDefault<FxHasher>;

/// Bounded size of the composite style/weight cache.
pub const COMPOSITE_CACHE_CAPACITY: usize = 256;

/// A resolved text element: a font character glyph or a sprite glyph.
#[derive(Debug, Clone)]
pub enum ResolvedElement {
  Glyph {
    glyph: Arc<Glyph>,
    font: Arc<FontAsset>,
  },
  Sprite {
    glyph: Arc<SpriteGlyph>,
    asset: Arc<SpriteAsset>,
  },
}

/// Composite cache key for a styled lookup.
///
/// High byte: `0x80 | italic << 4 | weight_index`; low 24 bits: the code
/// point (all scalar values fit).
#[inline]
pub fn composite_key(unicode: u32, italic: bool, weight: FontWeight) -> u32 {
  let style_bits = 0x80 | (u32::from(italic) << 4) | weight.index() as u32;
  (style_bits << 24) | (unicode & 0x00FF_FFFF)
}

struct CompositeEntry {
  font: Weak<FontAsset>,
  glyph: Weak<Glyph>,
}

/// Stateful resolver owned by one text object.
pub struct GlyphResolver {
  cache: LruCache<u32, CompositeEntry, CacheHasher>,
  /// Reusable visited-set storage; cleared per top-level request and
  /// passed down the recursion as an explicit parameter.
  visited: FxHashSet<AssetId>,
}

impl std::fmt::Debug for GlyphResolver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GlyphResolver")
      .field("cached", &self.cache.len())
      .finish()
  }
}

impl GlyphResolver {
  pub fn new() -> Self {
    let capacity = NonZeroUsize::new(COMPOSITE_CACHE_CAPACITY).expect("nonzero capacity");
    Self {
      cache: LruCache::with_hasher(capacity, CacheHasher::default()),
      visited: FxHashSet::default(),
    }
  }

  /// Resolves a character glyph.
  ///
  /// Returns the glyph and the asset that supplied it, or `None` when no
  /// font in the reachable fallback graph contains the character.
  pub fn resolve_character(
    &mut self,
    unicode: u32,
    font: &Arc<FontAsset>,
    include_fallbacks: bool,
    style: FontStyleFlags,
    weight: FontWeight,
  ) -> Option<(Arc<Glyph>, Arc<FontAsset>)> {
    let italic = style.is_italic();
    if italic || weight != FontWeight::Regular {
      let key = composite_key(unicode, italic, weight);
      if let Some(entry) = self.cache.get(&key) {
        match (entry.font.upgrade(), entry.glyph.upgrade()) {
          (Some(alt), Some(glyph)) => return Some((glyph, alt)),
          _ => {
            // Backing asset unloaded since the entry was cached.
            self.cache.pop(&key);
          }
        }
      }
      if let Some(alt) = font.alternate(weight.index(), italic) {
        if let Some(glyph) = alt.lookup_or_add(unicode) {
          self.cache.put(
            key,
            CompositeEntry {
              font: Arc::downgrade(&alt),
              glyph: Arc::downgrade(&glyph),
            },
          );
          return Some((glyph, alt));
        }
      }
      // No alternate carries the character; fall through to the primary
      // search so the glyph still renders, just without the style face.
    }

    if let Some(glyph) = font.lookup_or_add(unicode) {
      return Some((glyph, Arc::clone(font)));
    }

    if include_fallbacks {
      let mut visited = std::mem::take(&mut self.visited);
      visited.clear();
      visited.insert(font.id());
      let found = search_font_fallbacks(font, unicode, &mut visited);
      self.visited = visited;
      return found;
    }

    None
  }

  /// Resolves a sprite glyph by code point against a sprite asset and
  /// its fallback chain.
  pub fn resolve_sprite(
    &mut self,
    unicode: u32,
    asset: &Arc<SpriteAsset>,
    include_fallbacks: bool,
  ) -> Option<(Arc<SpriteGlyph>, Arc<SpriteAsset>)> {
    if let Some(glyph) = asset.lookup_unicode(unicode) {
      return Some((glyph, Arc::clone(asset)));
    }
    if include_fallbacks {
      let mut visited = std::mem::take(&mut self.visited);
      visited.clear();
      visited.insert(asset.id());
      let found = search_sprite_fallbacks(asset, unicode, &mut visited);
      self.visited = visited;
      return found;
    }
    None
  }

  /// Searches an ordered mixed font/sprite asset list for a character.
  ///
  /// One visited set spans the whole request, so assets reachable from
  /// several list entries are only searched once.
  pub fn resolve_from_assets(&mut self, unicode: u32, assets: &[AnyAsset]) -> Option<ResolvedElement> {
    let mut visited = std::mem::take(&mut self.visited);
    visited.clear();

    let mut found = None;
    for asset in assets {
      match asset {
        AnyAsset::Font(font) => {
          if !visited.insert(font.id()) {
            continue;
          }
          if let Some(glyph) = font.lookup_or_add(unicode) {
            found = Some(ResolvedElement::Glyph {
              glyph,
              font: Arc::clone(font),
            });
            break;
          }
          if let Some((glyph, font)) = search_font_fallbacks(font, unicode, &mut visited) {
            found = Some(ResolvedElement::Glyph { glyph, font });
            break;
          }
        }
        AnyAsset::Sprite(sprite) => {
          if !visited.insert(sprite.id()) {
            continue;
          }
          if let Some(glyph) = sprite.lookup_unicode(unicode) {
            found = Some(ResolvedElement::Sprite {
              glyph,
              asset: Arc::clone(sprite),
            });
            break;
          }
          if let Some((glyph, asset)) = search_sprite_fallbacks(sprite, unicode, &mut visited) {
            found = Some(ResolvedElement::Sprite { glyph, asset });
            break;
          }
        }
      }
    }

    self.visited = visited;
    found
  }
}

impl Default for GlyphResolver {
  fn default() -> Self {
    Self::new()
  }
}

fn search_font_fallbacks(
  font: &FontAsset,
  unicode: u32,
  visited: &mut FxHashSet<AssetId>,
) -> Option<(Arc<Glyph>, Arc<FontAsset>)> {
  for fallback in font.fallbacks() {
    if !visited.insert(fallback.id()) {
      continue;
    }
    if let Some(glyph) = fallback.lookup_or_add(unicode) {
      return Some((glyph, fallback));
    }
    if let Some(found) = search_font_fallbacks(&fallback, unicode, visited) {
      return Some(found);
    }
  }
  None
}

fn search_sprite_fallbacks(
  asset: &SpriteAsset,
  unicode: u32,
  visited: &mut FxHashSet<AssetId>,
) -> Option<(Arc<SpriteGlyph>, Arc<SpriteAsset>)> {
  for fallback in asset.fallbacks() {
    if !visited.insert(fallback.id()) {
      continue;
    }
    if let Some(glyph) = fallback.lookup_unicode(unicode) {
      return Some((glyph, fallback));
    }
    if let Some(found) = search_sprite_fallbacks(&fallback, unicode, visited) {
      return Some(found);
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::font::{FaceMetrics, FontAssetBuilder, GlyphMetrics};

  fn glyph(index: u32) -> Glyph {
    Glyph {
      index,
      metrics: GlyphMetrics {
        advance: 10.0,
        ..Default::default()
      },
      scale: 1.0,
      ..Default::default()
    }
  }

  fn font_with(chars: &[u32]) -> Arc<FontAsset> {
    let mut builder = FontAssetBuilder::new(FaceMetrics::default());
    for (i, &cp) in chars.iter().enumerate() {
      builder = builder.glyph(cp, glyph(i as u32 + 1));
    }
    builder.build()
  }

  #[test]
  fn primary_table_hit() {
    let font = font_with(&[0x41]);
    let mut resolver = GlyphResolver::new();
    let (_, owner) = resolver
      .resolve_character(0x41, &font, true, FontStyleFlags::NORMAL, FontWeight::Regular)
      .unwrap();
    assert_eq!(owner.id(), font.id());
  }

  #[test]
  fn fallback_chain_hit() {
    let primary = font_with(&[0x41]);
    let greek = font_with(&[0x3B1]);
    primary.add_fallback(Arc::clone(&greek));
    let mut resolver = GlyphResolver::new();
    let (_, owner) = resolver
      .resolve_character(0x3B1, &primary, true, FontStyleFlags::NORMAL, FontWeight::Regular)
      .unwrap();
    assert_eq!(owner.id(), greek.id());
  }

  #[test]
  fn fallbacks_excluded_when_disabled() {
    let primary = font_with(&[0x41]);
    let greek = font_with(&[0x3B1]);
    primary.add_fallback(greek);
    let mut resolver = GlyphResolver::new();
    assert!(resolver
      .resolve_character(0x3B1, &primary, false, FontStyleFlags::NORMAL, FontWeight::Regular)
      .is_none());
  }

  #[test]
  fn cyclic_fallback_graph_terminates() {
    let a = font_with(&[0x41]);
    let b = font_with(&[0x42]);
    a.add_fallback(Arc::clone(&b));
    b.add_fallback(Arc::clone(&a));
    let mut resolver = GlyphResolver::new();
    // Neither asset has the character; traversal must terminate.
    assert!(resolver
      .resolve_character(0x3B1, &a, true, FontStyleFlags::NORMAL, FontWeight::Regular)
      .is_none());
    // And a character only in the cycle partner still resolves.
    let (_, owner) = resolver
      .resolve_character(0x42, &a, true, FontStyleFlags::NORMAL, FontWeight::Regular)
      .unwrap();
    assert_eq!(owner.id(), b.id());
  }

  #[test]
  fn italic_resolves_through_alternate_and_caches() {
    let primary = font_with(&[0x41]);
    let italic_face = font_with(&[0x41]);
    primary.set_alternate(FontWeight::Regular, true, Arc::clone(&italic_face));

    let mut resolver = GlyphResolver::new();
    let (_, owner) = resolver
      .resolve_character(0x41, &primary, true, FontStyleFlags::ITALIC, FontWeight::Regular)
      .unwrap();
    assert_eq!(owner.id(), italic_face.id());

    // Second lookup is served by the composite cache.
    let (_, owner) = resolver
      .resolve_character(0x41, &primary, true, FontStyleFlags::ITALIC, FontWeight::Regular)
      .unwrap();
    assert_eq!(owner.id(), italic_face.id());
  }

  #[test]
  fn stale_composite_entry_is_purged() {
    let primary = font_with(&[0x41]);
    let bold_face = font_with(&[0x41]);
    primary.set_alternate(FontWeight::Bold, false, Arc::clone(&bold_face));

    let mut resolver = GlyphResolver::new();
    resolver
      .resolve_character(0x41, &primary, true, FontStyleFlags::BOLD, FontWeight::Bold)
      .unwrap();

    // Unload the bold face: repoint the alternate slot and drop the last
    // strong handle, leaving the cached entry dangling.
    primary.set_alternate(FontWeight::Bold, false, Arc::clone(&primary));
    drop(bold_face);
    let (_, owner) = resolver
      .resolve_character(0x41, &primary, true, FontStyleFlags::BOLD, FontWeight::Bold)
      .unwrap();
    assert_eq!(owner.id(), primary.id());
  }

  #[test]
  fn weight_and_style_key_distinct() {
    assert_ne!(
      composite_key(0x41, false, FontWeight::Bold),
      composite_key(0x41, true, FontWeight::Bold)
    );
    assert_ne!(
      composite_key(0x41, false, FontWeight::Bold),
      composite_key(0x41, false, FontWeight::Regular)
    );
    assert_ne!(
      composite_key(0x41, false, FontWeight::Bold),
      composite_key(0x42, false, FontWeight::Bold)
    );
  }

  #[test]
  fn mixed_asset_list_resolves_in_order() {
    use crate::font::sprite::SpriteAssetBuilder;
    use crate::font::{GlyphRect, SpriteGlyph};

    let font = font_with(&[0x41]);
    let sprites = SpriteAssetBuilder::new("emoji")
      .sprite(
        "smile",
        SpriteGlyph {
          index: 0,
          unicode: 0x1F600,
          name_hash: 0,
          metrics: GlyphMetrics::default(),
          rect: GlyphRect::default(),
          scale: 1.0,
        },
      )
      .build();
    let assets = vec![AnyAsset::Font(font), AnyAsset::Sprite(sprites)];

    let mut resolver = GlyphResolver::new();
    match resolver.resolve_from_assets(0x1F600, &assets) {
      Some(ResolvedElement::Sprite { glyph, .. }) => assert_eq!(glyph.unicode, 0x1F600),
      other => panic!("expected sprite resolution, got {other:?}"),
    }
    assert!(matches!(
      resolver.resolve_from_assets(0x41, &assets),
      Some(ResolvedElement::Glyph { .. })
    ));
    assert!(resolver.resolve_from_assets(0x2603, &assets).is_none());
  }
}
