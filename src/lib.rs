//! # tagflow
//!
//! A rich-text layout and shaping engine.
//!
//! Given a Unicode string annotated with inline markup tags (color, style,
//! size, sprites, alignment, ...), `tagflow` produces a fully laid-out glyph
//! sequence: per-character position, scale, color, and line/word boundaries,
//! ready for mesh generation.
//!
//! # Architecture
//!
//! Text flows through a fixed pipeline:
//!
//! ```text
//! Source Text → Processing Array → Layout Scan → TextInfo
//!               (escapes, styles)   (tags, glyphs,
//!                                    wrapping, auto-size)
//! ```
//!
//! 1. **Preparation** ([`prepare`]): the source text is normalized into a
//!    sequence of Unicode code points. Escape sequences are decoded,
//!    surrogate pairs are combined, `<style>` macros are expanded, and
//!    zero-width/line-break tags are replaced inline.
//! 2. **Layout** ([`layout`]): a single forward scan over the processing
//!    array applies markup tag effects, resolves each character against the
//!    font/sprite fallback graph ([`font`]), positions glyphs (kerning, mark
//!    attachment), and performs word wrapping with snapshot-based
//!    backtracking plus optional auto-sizing.
//! 3. **Output**: a read-only [`layout::TextInfo`] with per-character and
//!    per-line records.
//!
//! Mesh/vertex generation, glyph rasterization, and atlas management are out
//! of scope; fonts are consumed through the opaque asset model in [`font`].
//!
//! # Example
//!
//! ```rust,ignore
//! use tagflow::{TextBlock, TextSettings};
//!
//! let settings = TextSettings::default().with_default_font(font);
//! let mut block = TextBlock::new();
//! block.set_text("<b>Hello</b> world");
//! let info = block.layout(&settings)?;
//! assert_eq!(info.line_count, 1);
//! ```

pub mod color;
pub mod error;
pub mod font;
pub mod format;
pub mod layout;
pub mod markup;
pub mod prepare;
pub mod settings;
pub mod style;
pub mod text_block;

pub use color::{Color32, ColorGradient};
pub use error::{Error, Result};
pub use font::{FontAsset, FontAssetBuilder, FontStyleFlags, FontWeight, SpriteAsset};
pub use layout::engine::MissingGlyphHandler;
pub use layout::{CharacterInfo, HorizontalAlignment, LineInfo, OverflowMode, TextInfo};
pub use prepare::TextPreprocessor;
pub use settings::TextSettings;
pub use style::{Style, StyleSheet};
pub use text_block::TextBlock;
