//! Word-wrap opportunity classification
//!
//! The layout engine snapshots its state at every safe break point so an
//! overflowing line can rewind without recursion. This module holds the
//! classification rules:
//!
//! - Whitespace, zero-width space, soft hyphen, and a hyphen-minus not
//!   preceded by whitespace are hard break points.
//! - East-Asian text is breakable between most characters, moderated by
//!   leading/following character tables: a character in the *leading*
//!   set must not start a line, one in the *following* set must not end
//!   a line. Hangul participates only under traditional rules; modern
//!   Hangul breaks at spaces like Latin text.
//! - Latin text immediately followed by a CJK character is also a break
//!   candidate.
//!
//! The tables are data, not behavior: they arrive from the settings
//! provider and default to the customary Japanese/Chinese sets below.

use rustc_hash::FxHashSet;

/// Characters that must not begin a line (closing punctuation, small
/// kana, iteration marks).
const DEFAULT_LEADING: &str = "!%),.:;?]}¢°·'\"†‡›℃∶、。〃〆〕〗〞﹚﹜！＂％＇），．：；？］｝～\
ぁぃぅぇぉっゃゅょゎ゛゜ゝゞァィゥェォッャュョヮヵヶ・ーヽヾ";

/// Characters that must not end a line (opening punctuation, currency).
const DEFAULT_FOLLOWING: &str = "$(£¥·'\"〈《「『【〔〖〝﹙﹛＄（．［｛￡￥";

/// Line-breaking rule data consumed by the layout engine.
#[derive(Debug, Clone)]
pub struct LineBreakingRules {
  /// Code points that cannot start a line.
  pub leading: FxHashSet<u32>,
  /// Code points that cannot end a line.
  pub following: FxHashSet<u32>,
  /// Modern Hangul breaks at spaces (word-based); traditional Hangul
  /// breaks per syllable like other CJK text.
  pub use_modern_hangul: bool,
}

impl LineBreakingRules {
  /// Whether an East-Asian boundary between `current` and `next` is
  /// breakable under the character tables.
  #[inline]
  pub fn can_break_between(&self, current: u32, next: u32) -> bool {
    !self.following.contains(&current) && !self.leading.contains(&next)
  }

  /// Whether `cp` takes part in per-character East-Asian breaking.
  #[inline]
  pub fn breaks_per_character(&self, cp: u32) -> bool {
    if is_hangul(cp) {
      !self.use_modern_hangul
    } else {
      is_cjk(cp)
    }
  }
}

impl Default for LineBreakingRules {
  fn default() -> Self {
    Self {
      leading: DEFAULT_LEADING.chars().map(|c| c as u32).collect(),
      following: DEFAULT_FOLLOWING.chars().map(|c| c as u32).collect(),
      use_modern_hangul: false,
    }
  }
}

/// Whitespace that allows a line break. Excludes the non-breaking
/// spaces (U+00A0, U+2007, U+202F).
#[inline]
pub fn is_breakable_whitespace(cp: u32) -> bool {
  match cp {
    0x09 | 0x20 => true,
    0xA0 | 0x2007 | 0x202F => false,
    0x2000..=0x200A => true,
    0x205F | 0x3000 => true,
    _ => false,
  }
}

/// Any whitespace, breakable or not.
#[inline]
pub fn is_whitespace(cp: u32) -> bool {
  matches!(
    cp,
    0x09..=0x0D | 0x20 | 0x85 | 0xA0 | 0x1680 | 0x2000..=0x200A | 0x2028 | 0x2029 | 0x202F | 0x205F | 0x3000
  )
}

/// Zero-advance characters: they occupy a character slot but no width.
#[inline]
pub fn is_zero_width(cp: u32) -> bool {
  matches!(cp, 0xAD | 0x200B | 0x200C | 0x200D | 0x2060 | 0xFEFF)
}

/// East-Asian ranges that break per character (Han, Kana, Hangul,
/// compatibility forms).
#[inline]
pub fn is_cjk(cp: u32) -> bool {
  matches!(
    cp,
    0x1100..=0x11FF      // Hangul Jamo
    | 0x2E80..=0x9FFF    // radicals, kana, CJK ideographs
    | 0xA960..=0xA97F    // Hangul Jamo Extended-A
    | 0xAC00..=0xD7FF    // Hangul syllables + Jamo Extended-B
    | 0xF900..=0xFAFF    // CJK compatibility ideographs
    | 0xFE30..=0xFE4F    // CJK compatibility forms
    | 0xFF00..=0xFFEF    // half/fullwidth forms
  )
}

/// Hangul ranges, separated out for the modern/traditional rule toggle.
#[inline]
pub fn is_hangul(cp: u32) -> bool {
  matches!(
    cp,
    0x1100..=0x11FF | 0x3130..=0x318F | 0xA960..=0xA97F | 0xAC00..=0xD7FF
  )
}

/// Hard break points independent of the East-Asian tables: breakable
/// whitespace, zero-width space, soft hyphen, or a hyphen-minus that
/// does not directly follow whitespace.
#[inline]
pub fn is_hard_break_point(cp: u32, previous: u32) -> bool {
  is_breakable_whitespace(cp)
    || cp == 0x200B
    || cp == 0xAD
    || (cp == 0x2D && !is_whitespace(previous))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn whitespace_classes() {
    assert!(is_breakable_whitespace(0x20));
    assert!(is_breakable_whitespace(0x3000));
    assert!(!is_breakable_whitespace(0xA0), "nbsp must not break");
    assert!(!is_breakable_whitespace(0x202F));
    assert!(is_whitespace(0xA0));
  }

  #[test]
  fn hyphen_break_needs_non_space_prefix() {
    assert!(is_hard_break_point(0x2D, 'a' as u32));
    assert!(!is_hard_break_point(0x2D, 0x20));
  }

  #[test]
  fn soft_hyphen_and_zwsp_break() {
    assert!(is_hard_break_point(0xAD, 'a' as u32));
    assert!(is_hard_break_point(0x200B, 'a' as u32));
  }

  #[test]
  fn cjk_tables_moderate_breaks() {
    let rules = LineBreakingRules::default();
    // Break between two ideographs is allowed...
    assert!(rules.can_break_between('你' as u32, '好' as u32));
    // ...but not before a closing bracket or after an opening one.
    assert!(!rules.can_break_between('你' as u32, '。' as u32));
    assert!(!rules.can_break_between('「' as u32, '你' as u32));
  }

  #[test]
  fn hangul_rule_toggle() {
    let mut rules = LineBreakingRules::default();
    assert!(rules.breaks_per_character('한' as u32));
    rules.use_modern_hangul = true;
    assert!(!rules.breaks_per_character('한' as u32));
    assert!(rules.breaks_per_character('中' as u32), "Han unaffected by toggle");
  }
}
