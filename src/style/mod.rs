//! Style sheet: named markup macros
//!
//! A style is a named pair of tag sequences: an opening definition applied
//! by `<style=Name>` and a closing definition applied by `</style>`. The
//! definitions are stored as code points and may themselves contain markup,
//! escape sequences, and nested `<style>` references; the processing-array
//! builder splices them inline (see [`crate::prepare`]).
//!
//! Lookup is keyed by the case-insensitive name hash so the builder can
//! resolve a scanned `<style=...>` value without materializing a string.

use rustc_hash::FxHashMap;

use crate::markup::hash::name_hash;

/// Hash of the reserved default style name, `"Normal"`.
///
/// A text object whose default style is `Normal` gets no implicit
/// wrapping; any other default style wraps the whole source text in the
/// style's opening/closing definitions.
pub fn normal_style_hash() -> u32 {
  name_hash("Normal")
}

/// A named style: opening and closing tag definitions.
#[derive(Debug, Clone)]
pub struct Style {
  name: String,
  hash: u32,
  opening: Vec<u32>,
  closing: Vec<u32>,
}

impl Style {
  /// Creates a style from its name and definition strings.
  ///
  /// Definitions are stored as code points; they are not validated here.
  /// A malformed definition surfaces later as literal text, exactly like
  /// malformed inline markup.
  pub fn new(name: impl Into<String>, opening: &str, closing: &str) -> Self {
    let name = name.into();
    let hash = name_hash(&name);
    Self {
      name,
      hash,
      opening: opening.chars().map(|c| c as u32).collect(),
      closing: closing.chars().map(|c| c as u32).collect(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Case-insensitive hash of the style name.
  pub fn hash(&self) -> u32 {
    self.hash
  }

  /// Opening definition as code points.
  pub fn opening(&self) -> &[u32] {
    &self.opening
  }

  /// Closing definition as code points.
  pub fn closing(&self) -> &[u32] {
    &self.closing
  }
}

/// A collection of styles keyed by name hash.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
  styles: FxHashMap<u32, Style>,
}

impl StyleSheet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces a style.
  pub fn insert(&mut self, style: Style) {
    self.styles.insert(style.hash(), style);
  }

  /// Looks up a style by its name hash.
  pub fn get_style(&self, hash: u32) -> Option<&Style> {
    self.styles.get(&hash)
  }

  /// Looks up a style by name.
  pub fn get_style_by_name(&self, name: &str) -> Option<&Style> {
    self.get_style(name_hash(name))
  }

  pub fn len(&self) -> usize {
    self.styles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.styles.is_empty()
  }
}
