//! Error types for tagflow
//!
//! Almost every runtime condition in the engine is recovered locally:
//! unresolvable characters become placeholder glyphs, malformed markup is
//! rendered as literal text, stack underflows are no-ops, and auto-size
//! non-convergence freezes at the last attempted size. The error surface
//! that remains covers API misuse and missing collaborators.
//!
//! All errors use the `thiserror` crate for minimal boilerplate and proper
//! error trait implementations.

use thiserror::Error;

/// Result type alias for tagflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for tagflow.
///
/// Each variant wraps a more specific error type for that subsystem.
#[derive(Error, Debug)]
pub enum Error {
  /// Layout precondition error
  #[error("Layout error: {0}")]
  Layout(#[from] LayoutError),

  /// Numeric text formatting error
  #[error("Format error: {0}")]
  Format(#[from] FormatError),
}

/// Errors raised when a layout pass cannot start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
  /// No font asset is assigned to the text object and the settings
  /// provider has no default.
  #[error("no font asset assigned and no default available")]
  NoFontAsset,
}

/// Errors raised by the numeric text formatter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
  /// More than the supported number of positional arguments was supplied.
  #[error("too many format arguments: {count} (at most {max} supported)")]
  TooManyArguments { count: usize, max: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_display_includes_subsystem() {
    let err = Error::Layout(LayoutError::NoFontAsset);
    let msg = err.to_string();
    assert!(msg.contains("Layout error"));
    assert!(msg.contains("no font asset"));
  }

  #[test]
  fn format_error_reports_limits() {
    let err = Error::Format(FormatError::TooManyArguments { count: 9, max: 8 });
    assert!(err.to_string().contains("9"));
    assert!(err.to_string().contains("8"));
  }
}
