//! Case-insensitive hashing for tag and attribute names
//!
//! Markup dispatch is keyed by a 32-bit case-insensitive hash of the tag or
//! attribute name, accumulated code point by code point while the scanner
//! walks the tag, so a name never has to be materialized as a string. The
//! same hash is the lookup key for style-sheet entries, so `<style=H1>` and
//! `<style=h1>` resolve identically.
//!
//! Only ASCII letters are folded; tag and attribute names are ASCII by
//! construction, and non-ASCII code points inside quoted values hash as
//! themselves.

/// Incremental case-insensitive hasher for tag/attribute names and values.
///
/// The accumulation is order-sensitive (shift-add-xor), cheap enough to run
/// inline in the scanner loop, and stable across program runs so hash codes
/// can be stored in style sheets and link records.
#[derive(Debug, Clone, Copy)]
pub struct NameHasher {
  state: u32,
}

impl NameHasher {
  #[inline]
  pub fn new() -> Self {
    Self { state: 0 }
  }

  /// Folds one code point into the hash, case-insensitively.
  #[inline]
  pub fn write(&mut self, cp: u32) {
    let folded = fold(cp);
    self.state = (self.state << 5).wrapping_add(self.state) ^ folded;
  }

  /// Returns the accumulated hash.
  #[inline]
  pub fn finish(self) -> u32 {
    self.state
  }
}

impl Default for NameHasher {
  fn default() -> Self {
    Self::new()
  }
}

/// Folds lowercase ASCII to uppercase; other code points pass through.
#[inline]
fn fold(cp: u32) -> u32 {
  match cp {
    0x61..=0x7A => cp - 0x20,
    _ => cp,
  }
}

/// Hashes a string case-insensitively.
///
/// Equivalent to feeding every `char` of `name` through [`NameHasher`].
/// Used to precompute hash codes for the tag dispatch table, named colors,
/// keyword attribute values, and style-sheet entries.
pub fn name_hash(name: &str) -> u32 {
  let mut hasher = NameHasher::new();
  for ch in name.chars() {
    hasher.write(ch as u32);
  }
  hasher.finish()
}

/// Hashes a slice of code points case-insensitively.
pub fn code_point_hash(cps: &[u32]) -> u32 {
  let mut hasher = NameHasher::new();
  for &cp in cps {
    hasher.write(cp);
  }
  hasher.finish()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn case_insensitive() {
    assert_eq!(name_hash("bold"), name_hash("BOLD"));
    assert_eq!(name_hash("Color"), name_hash("cOLOR"));
  }

  #[test]
  fn distinct_names_distinct_hashes() {
    // Not a cryptographic guarantee, but the recognized tag set must be
    // collision-free; spot-check a few near-misses.
    assert_ne!(name_hash("b"), name_hash("i"));
    assert_ne!(name_hash("size"), name_hash("sizes"));
    assert_ne!(name_hash("nobr"), name_hash("/nobr"));
  }

  #[test]
  fn order_sensitive() {
    assert_ne!(name_hash("ab"), name_hash("ba"));
  }

  #[test]
  fn incremental_matches_batch() {
    let mut h = NameHasher::new();
    for ch in "line-height".chars() {
      h.write(ch as u32);
    }
    assert_eq!(h.finish(), name_hash("LINE-HEIGHT"));
  }

  #[test]
  fn non_ascii_passes_through() {
    assert_eq!(name_hash("é"), code_point_hash(&[0xE9]));
  }
}
