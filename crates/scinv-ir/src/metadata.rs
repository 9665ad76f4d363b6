//! Metadata for tracking source positions and load provenance
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use serde::{Deserialize, Serialize};

/// Source position information for error reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed, in characters)
    pub column: usize,

    /// Byte offset from start of file
    pub offset: usize,

    /// Length in bytes
    pub length: usize,
}

/// Information about where a document came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source file path or identifier
    pub source: String,

    /// Span covered within the source
    pub position: Position,

    /// Additional context (e.g. "streamed network block")
    pub context: Option<String>,

    /// When the source was read
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }

    /// Compute line and column for a byte offset into `text`.
    /// Offsets past the end clamp to the end of the text.
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self::new(line, column, offset, 0)
    }
}

impl SourceInfo {
    /// Create new source info
    pub fn new(source: impl Into<String>, position: Position) -> Self {
        Self {
            source: source.into(),
            position,
            context: None,
            loaded_at: None,
        }
    }

    /// Add context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Stamp the current time as load time
    pub fn loaded_now(mut self) -> Self {
        self.loaded_at = Some(chrono::Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let pos = Position::new(10, 20, 100, 50);
        assert_eq!(pos.line, 10);
        assert_eq!(pos.column, 20);
        assert_eq!(pos.offset, 100);
        assert_eq!(pos.length, 50);
    }

    #[test]
    fn test_position_from_offset() {
        let text = "<a>\n  <b/>\n</a>";
        let pos = Position::from_offset(text, 6);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 3);
        assert_eq!(pos.offset, 6);

        let start = Position::from_offset(text, 0);
        assert_eq!((start.line, start.column), (1, 1));
    }

    #[test]
    fn test_position_from_offset_clamps() {
        let text = "é\nx";
        let pos = Position::from_offset(text, 1);
        assert_eq!(pos.offset, 0);
        let end = Position::from_offset(text, 999);
        assert_eq!(end.line, 2);
        assert_eq!(end.offset, text.len());
    }

    #[test]
    fn test_source_info_with_context() {
        let source = SourceInfo::new("inventory.xml", Position::default())
            .with_context("network block")
            .loaded_now();

        assert_eq!(source.source, "inventory.xml");
        assert_eq!(source.context, Some("network block".to_string()));
        assert!(source.loaded_at.is_some());
    }

    #[test]
    fn test_source_info_serializes() {
        let source = SourceInfo::new("a.xml", Position::new(1, 1, 0, 3));
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"source\":\"a.xml\""));
    }
}
