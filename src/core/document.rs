//! Purpose: Describe the editor-owned document the cell algorithms read and edit.
//! Exports: `Document`, `DocumentEditOps`, `TextDocument`, `cell_text`.
//! Role: Capability seam between the host editor and the segmenter/session.
//! Invariants: Rows are 1-indexed everywhere; row 0 is never a valid line.
//! Invariants: Edit operations report failure with `false`, never by panicking.

use std::collections::BTreeMap;
use std::path::Path;

use bstr::ByteSlice;

use crate::core::error::{Error, map_io_error_kind};

/// Read access to the lines of a document.
pub trait Document {
    fn line_count(&self) -> usize;

    /// Returns the text of `row` (1-indexed), or `None` outside the document.
    fn line(&self, row: usize) -> Option<&str>;

    /// Resolves a named mark to its row. `None` and `Some(0)` both mean unset.
    fn mark_row(&self, _mark: char) -> Option<usize> {
        None
    }
}

/// Cursor and line mutations the host editor performs on request.
pub trait DocumentEditOps {
    /// Current `(row, col)` of the cursor; row is 1-indexed.
    fn cursor(&self) -> (usize, usize);
    fn move_cursor(&mut self, row: usize, col: usize) -> bool;
    fn insert_line_before(&mut self, row: usize, text: &str) -> bool;
    fn insert_line_after(&mut self, row: usize, text: &str) -> bool;
    fn replace_line(&mut self, row: usize, text: &str) -> bool;
}

/// In-memory document used by the CLI and tests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextDocument {
    lines: Vec<String>,
    marks: BTreeMap<char, usize>,
    cursor: (usize, usize),
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TextDocument {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            marks: BTreeMap::new(),
            cursor: (1, 0),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(str::to_string).collect())
    }

    /// Reads a document from disk; invalid UTF-8 is replaced rather than rejected.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to read document")
                .with_path(path)
                .with_source(err)
        })?;
        let lines = bytes
            .lines()
            .map(|line| line.to_str_lossy().into_owned())
            .collect();
        Ok(Self::new(lines))
    }

    pub fn with_mark(mut self, mark: char, row: usize) -> Self {
        self.marks.insert(mark, row);
        self
    }

    pub fn set_mark(&mut self, mark: char, row: usize) {
        self.marks.insert(mark, row);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_text(&self) -> String {
        let mut out = self.lines.join("\n");
        if !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    fn valid_row(&self, row: usize) -> bool {
        row >= 1 && row <= self.lines.len()
    }

    // Marks follow their lines the way editor marks do.
    fn shift_marks_from(&mut self, row: usize) {
        for value in self.marks.values_mut() {
            if *value >= row {
                *value += 1;
            }
        }
    }
}

impl Document for TextDocument {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, row: usize) -> Option<&str> {
        if row == 0 {
            return None;
        }
        self.lines.get(row - 1).map(String::as_str)
    }

    fn mark_row(&self, mark: char) -> Option<usize> {
        self.marks.get(&mark).copied()
    }
}

impl DocumentEditOps for TextDocument {
    fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    fn move_cursor(&mut self, row: usize, col: usize) -> bool {
        if !self.valid_row(row) {
            return false;
        }
        self.cursor = (row, col);
        true
    }

    fn insert_line_before(&mut self, row: usize, text: &str) -> bool {
        // An empty document accepts its first line at row 1.
        if !(self.valid_row(row) || (row == 1 && self.lines.is_empty())) {
            return false;
        }
        self.lines.insert(row - 1, text.to_string());
        self.shift_marks_from(row);
        self.cursor = (row, 0);
        true
    }

    fn insert_line_after(&mut self, row: usize, text: &str) -> bool {
        if !self.valid_row(row) {
            return false;
        }
        self.lines.insert(row, text.to_string());
        self.shift_marks_from(row + 1);
        self.cursor = (row + 1, 0);
        true
    }

    fn replace_line(&mut self, row: usize, text: &str) -> bool {
        if !self.valid_row(row) {
            return false;
        }
        self.lines[row - 1] = text.to_string();
        true
    }
}

/// Joins rows `start_row..=end_row` with `\n`, clamping `end_row` to the document.
pub fn cell_text<D: Document + ?Sized>(doc: &D, start_row: usize, end_row: usize) -> String {
    let end_row = end_row.min(doc.line_count());
    let start_row = start_row.max(1);
    if start_row > end_row {
        return String::new();
    }
    (start_row..=end_row)
        .filter_map(|row| doc.line(row))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Document, DocumentEditOps, TextDocument, cell_text};

    #[test]
    fn default_document_starts_on_row_one() {
        let doc = TextDocument::default();
        assert_eq!(doc.cursor(), (1, 0));
        assert_eq!(doc, TextDocument::new(Vec::new()));
    }

    #[test]
    fn rows_are_one_indexed() {
        let doc = TextDocument::from_text("a\nb\nc\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(0), None);
        assert_eq!(doc.line(1), Some("a"));
        assert_eq!(doc.line(3), Some("c"));
        assert_eq!(doc.line(4), None);
    }

    #[test]
    fn cell_text_clamps_end_row() {
        let doc = TextDocument::from_text("a\n  b\nc");
        assert_eq!(cell_text(&doc, 2, 99), "  b\nc");
        assert_eq!(cell_text(&doc, 3, 2), "");
    }

    #[test]
    fn inserts_move_cursor_and_marks() {
        let mut doc = TextDocument::from_text("a\nb").with_mark('x', 2);
        assert!(doc.insert_line_before(2, "new"));
        assert_eq!(doc.cursor(), (2, 0));
        assert_eq!(doc.mark_row('x'), Some(3));
        assert!(doc.insert_line_after(3, "tail"));
        assert_eq!(doc.cursor(), (4, 0));
        assert_eq!(doc.lines(), ["a", "new", "b", "tail"]);
    }

    #[test]
    fn edits_outside_document_fail() {
        let mut doc = TextDocument::from_text("a");
        assert!(!doc.move_cursor(0, 0));
        assert!(!doc.move_cursor(2, 0));
        assert!(!doc.insert_line_after(5, "x"));
        assert!(!doc.replace_line(2, "x"));
        assert_eq!(doc.cursor(), (1, 0));
    }

    #[test]
    fn empty_document_accepts_first_line() {
        let mut doc = TextDocument::default();
        assert!(doc.insert_line_before(1, "# %%"));
        assert_eq!(doc.to_text(), "# %%\n");
    }
}
