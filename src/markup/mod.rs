//! Markup tag model
//!
//! Rich text is annotated with inline `<name>`, `<name=value>`, and
//! `</name>` tags. This module defines the recognized tag set, the typed
//! attribute records the scanner produces, and the hash-keyed dispatch
//! table that maps a scanned tag name onto a closed [`TagKind`] variant.
//!
//! Dispatch is a flat table lookup: the scanner accumulates a
//! case-insensitive hash for the tag name (see [`hash`]) and the layout
//! engine matches on the resolved `TagKind`. There is no reflection and no
//! string comparison on the hot path. An unrecognized hash means the tag is
//! rendered as literal text.

pub mod hash;
pub mod scanner;

use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use crate::color::Color32;
use hash::name_hash;

/// Syntactic classification of a tag attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagValueKind {
  /// No value present (`<b>`).
  #[default]
  None,
  /// Digits with optional sign/decimal point (`<size=24.5>`).
  Numerical,
  /// Leading `#` hex form (`<color=#ff8800>`).
  Color,
  /// Quoted or bare text (`<font="Bangers SDF">`).
  StringValue,
}

/// Unit suffix attached to a numerical attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagUnit {
  /// No suffix; value is in pixels / points.
  #[default]
  Pixels,
  /// `e`/`em` suffix; value is relative to the current font size.
  FontUnits,
  /// `%` suffix; value is relative to a tag-specific reference.
  Percentage,
}

/// One scanned `name=value` attribute.
///
/// Attribute 0 is always the tag itself (its name is the tag name, its
/// value the `=value` part if present). Value text is not copied: the
/// record carries the span into the processing array, plus a
/// case-insensitive hash for keyword dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagAttribute {
  /// Case-insensitive hash of the attribute name.
  pub name_hash: u32,
  /// Case-insensitive hash of the value text.
  pub value_hash: u32,
  /// Syntactic kind of the value.
  pub kind: TagValueKind,
  /// Index of the first value code point in the processing array.
  pub value_start: usize,
  /// Number of code points in the value.
  pub value_length: usize,
  /// Unit suffix for numerical values.
  pub unit: TagUnit,
}

impl TagAttribute {
  /// Clears this slot for reuse by the next tag scan.
  pub fn clear(&mut self) {
    *self = TagAttribute::default();
  }
}

/// The closed set of recognized markup tags.
///
/// Every variant corresponds to exactly one tag name (opening or closing
/// form). The layout engine owns the per-tag validation and effect; this
/// enum is only the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
  Bold,
  BoldClose,
  Italic,
  ItalicClose,
  Underline,
  UnderlineClose,
  Strikethrough,
  StrikethroughClose,
  Highlight,
  HighlightClose,
  Subscript,
  SubscriptClose,
  Superscript,
  SuperscriptClose,
  FontWeight,
  FontWeightClose,
  Position,
  VerticalOffset,
  VerticalOffsetClose,
  Page,
  NoBreak,
  NoBreakClose,
  Size,
  SizeClose,
  Font,
  FontClose,
  Material,
  MaterialClose,
  Space,
  Alpha,
  Link,
  LinkClose,
  Anchor,
  AnchorClose,
  Align,
  AlignClose,
  Width,
  WidthClose,
  Color,
  ColorClose,
  Gradient,
  GradientClose,
  CharacterSpace,
  CharacterSpaceClose,
  Monospace,
  MonospaceClose,
  Indent,
  IndentClose,
  LineIndent,
  LineIndentClose,
  Sprite,
  Lowercase,
  LowercaseClose,
  Uppercase,
  UppercaseClose,
  Allcaps,
  AllcapsClose,
  Smallcaps,
  SmallcapsClose,
  Margin,
  MarginClose,
  MarginLeft,
  MarginRight,
  LineHeight,
  LineHeightClose,
  NoParse,
  NoParseClose,
  Action,
  ActionClose,
  Scale,
  ScaleClose,
  Rotate,
  RotateClose,
  Style,
  StyleClose,
  // Inline replacement tags, expanded by the processing-array builder.
  LineBreak,
  CarriageReturn,
  NonBreakingSpace,
  ZeroWidthSpace,
  ZeroWidthJoiner,
  SoftHyphen,
}

const TAG_NAMES: &[(&str, TagKind)] = &[
  ("b", TagKind::Bold),
  ("/b", TagKind::BoldClose),
  ("i", TagKind::Italic),
  ("/i", TagKind::ItalicClose),
  ("u", TagKind::Underline),
  ("/u", TagKind::UnderlineClose),
  ("s", TagKind::Strikethrough),
  ("/s", TagKind::StrikethroughClose),
  ("mark", TagKind::Highlight),
  ("/mark", TagKind::HighlightClose),
  ("sub", TagKind::Subscript),
  ("/sub", TagKind::SubscriptClose),
  ("sup", TagKind::Superscript),
  ("/sup", TagKind::SuperscriptClose),
  ("font-weight", TagKind::FontWeight),
  ("/font-weight", TagKind::FontWeightClose),
  ("pos", TagKind::Position),
  ("voffset", TagKind::VerticalOffset),
  ("/voffset", TagKind::VerticalOffsetClose),
  ("page", TagKind::Page),
  ("nobr", TagKind::NoBreak),
  ("/nobr", TagKind::NoBreakClose),
  ("size", TagKind::Size),
  ("/size", TagKind::SizeClose),
  ("font", TagKind::Font),
  ("/font", TagKind::FontClose),
  ("material", TagKind::Material),
  ("/material", TagKind::MaterialClose),
  ("space", TagKind::Space),
  ("alpha", TagKind::Alpha),
  ("link", TagKind::Link),
  ("/link", TagKind::LinkClose),
  ("a", TagKind::Anchor),
  ("/a", TagKind::AnchorClose),
  ("align", TagKind::Align),
  ("/align", TagKind::AlignClose),
  ("width", TagKind::Width),
  ("/width", TagKind::WidthClose),
  ("color", TagKind::Color),
  ("/color", TagKind::ColorClose),
  ("gradient", TagKind::Gradient),
  ("/gradient", TagKind::GradientClose),
  ("cspace", TagKind::CharacterSpace),
  ("/cspace", TagKind::CharacterSpaceClose),
  ("mspace", TagKind::Monospace),
  ("/mspace", TagKind::MonospaceClose),
  ("indent", TagKind::Indent),
  ("/indent", TagKind::IndentClose),
  ("line-indent", TagKind::LineIndent),
  ("/line-indent", TagKind::LineIndentClose),
  ("sprite", TagKind::Sprite),
  ("lowercase", TagKind::Lowercase),
  ("/lowercase", TagKind::LowercaseClose),
  ("uppercase", TagKind::Uppercase),
  ("/uppercase", TagKind::UppercaseClose),
  ("allcaps", TagKind::Allcaps),
  ("/allcaps", TagKind::AllcapsClose),
  ("smallcaps", TagKind::Smallcaps),
  ("/smallcaps", TagKind::SmallcapsClose),
  ("margin", TagKind::Margin),
  ("/margin", TagKind::MarginClose),
  ("margin-left", TagKind::MarginLeft),
  ("margin-right", TagKind::MarginRight),
  ("line-height", TagKind::LineHeight),
  ("/line-height", TagKind::LineHeightClose),
  ("noparse", TagKind::NoParse),
  ("/noparse", TagKind::NoParseClose),
  ("action", TagKind::Action),
  ("/action", TagKind::ActionClose),
  ("scale", TagKind::Scale),
  ("/scale", TagKind::ScaleClose),
  ("rotate", TagKind::Rotate),
  ("/rotate", TagKind::RotateClose),
  ("style", TagKind::Style),
  ("/style", TagKind::StyleClose),
  ("br", TagKind::LineBreak),
  ("cr", TagKind::CarriageReturn),
  ("nbsp", TagKind::NonBreakingSpace),
  ("zwsp", TagKind::ZeroWidthSpace),
  ("zwj", TagKind::ZeroWidthJoiner),
  ("shy", TagKind::SoftHyphen),
];

fn tag_table() -> &'static FxHashMap<u32, TagKind> {
  static TABLE: OnceLock<FxHashMap<u32, TagKind>> = OnceLock::new();
  TABLE.get_or_init(|| {
    let mut table = FxHashMap::default();
    for &(name, kind) in TAG_NAMES {
      let previous = table.insert(name_hash(name), kind);
      debug_assert!(previous.is_none(), "tag hash collision on '{name}'");
    }
    table
  })
}

/// Resolves a scanned tag-name hash to its [`TagKind`].
///
/// Returns `None` for unrecognized names, in which case the whole tag is
/// treated as literal text.
#[inline]
pub fn tag_kind(hash: u32) -> Option<TagKind> {
  tag_table().get(&hash).copied()
}

/// Recognized attribute names inside a tag (`<sprite name="x" index=2>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrName {
  Name,
  Index,
  Tint,
  Color,
  Anim,
  Href,
}

const ATTR_NAMES: &[(&str, AttrName)] = &[
  ("name", AttrName::Name),
  ("index", AttrName::Index),
  ("tint", AttrName::Tint),
  ("color", AttrName::Color),
  ("anim", AttrName::Anim),
  ("href", AttrName::Href),
];

fn attr_table() -> &'static FxHashMap<u32, AttrName> {
  static TABLE: OnceLock<FxHashMap<u32, AttrName>> = OnceLock::new();
  TABLE.get_or_init(|| ATTR_NAMES.iter().map(|&(n, a)| (name_hash(n), a)).collect())
}

/// Resolves an attribute-name hash.
#[inline]
pub fn attr_name(hash: u32) -> Option<AttrName> {
  attr_table().get(&hash).copied()
}

const NAMED_COLORS: &[(&str, Color32)] = &[
  ("red", Color32::new(255, 0, 0, 255)),
  ("green", Color32::new(0, 255, 0, 255)),
  ("blue", Color32::new(0, 0, 255, 255)),
  ("white", Color32::new(255, 255, 255, 255)),
  ("black", Color32::new(0, 0, 0, 255)),
  ("yellow", Color32::new(255, 255, 64, 255)),
  ("orange", Color32::new(255, 128, 0, 255)),
  ("purple", Color32::new(160, 32, 240, 255)),
  ("grey", Color32::new(128, 128, 128, 255)),
  ("gray", Color32::new(128, 128, 128, 255)),
  ("lightblue", Color32::new(173, 216, 230, 255)),
  ("teal", Color32::new(0, 128, 128, 255)),
];

fn color_table() -> &'static FxHashMap<u32, Color32> {
  static TABLE: OnceLock<FxHashMap<u32, Color32>> = OnceLock::new();
  TABLE.get_or_init(|| NAMED_COLORS.iter().map(|&(n, c)| (name_hash(n), c)).collect())
}

/// Resolves a named color value (`<color=red>`).
#[inline]
pub fn named_color(hash: u32) -> Option<Color32> {
  color_table().get(&hash).copied()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatch_is_case_insensitive() {
    assert_eq!(tag_kind(name_hash("B")), Some(TagKind::Bold));
    assert_eq!(tag_kind(name_hash("NOBR")), Some(TagKind::NoBreak));
    assert_eq!(tag_kind(name_hash("/Font-Weight")), Some(TagKind::FontWeightClose));
  }

  #[test]
  fn unknown_tag_is_none() {
    assert_eq!(tag_kind(name_hash("notarealtag")), None);
  }

  #[test]
  fn no_hash_collisions_in_tag_set() {
    // The whole recognized set must be collision-free for dispatch to be
    // sound; building the table verifies it in debug builds, this keeps it
    // verified in release test runs too.
    let mut seen = FxHashMap::default();
    for &(name, _) in TAG_NAMES {
      let hash = name_hash(name);
      if let Some(prior) = seen.insert(hash, name) {
        panic!("hash collision between '{prior}' and '{name}'");
      }
    }
  }

  #[test]
  fn named_colors_resolve() {
    assert_eq!(named_color(name_hash("RED")), Some(Color32::new(255, 0, 0, 255)));
    assert_eq!(named_color(name_hash("grey")), named_color(name_hash("gray")));
    assert_eq!(named_color(name_hash("mauve")), None);
  }

  #[test]
  fn attribute_names_resolve() {
    assert_eq!(attr_name(name_hash("Index")), Some(AttrName::Index));
    assert_eq!(attr_name(name_hash("id")), None);
  }
}
