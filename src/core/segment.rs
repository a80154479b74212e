//! Purpose: Compute cell boundaries and answer cell navigation queries.
//! Exports: `DelimitBy`, `TagMatcher`, `BoundaryStrategy`, `BoundarySet`, `CellRange`, `compute_boundaries`.
//! Role: Pure line-based segmenter; knows nothing about the language in the cells.
//! Invariants: A `BoundarySet` is sorted ascending, deduplicated, and only holds rows >= 1.
//! Invariants: Boundaries are recomputed per query; nothing is cached across edits.
//! Invariants: `next_cell` advances past the current cell; `prev_cell` first returns to its start.

use std::str::FromStr;

use regex::Regex;

use crate::core::document::Document;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelimitBy {
    Marks,
    Tags,
}

impl FromStr for DelimitBy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "marks" => Ok(DelimitBy::Marks),
            "tags" => Ok(DelimitBy::Tags),
            other => Err(Error::new(ErrorKind::Config)
                .with_message(format!("invalid delimit_by value: {other:?}"))
                .with_hint("Use `marks` or `tags`.")),
        }
    }
}

/// Tag list compiled for per-line matching.
#[derive(Clone, Debug)]
pub enum TagMatcher {
    Literal(Vec<String>),
    Pattern(Vec<Regex>),
}

impl TagMatcher {
    pub fn literal<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagMatcher::Literal(tags.into_iter().map(Into::into).collect())
    }

    pub fn pattern<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|err| {
                    Error::new(ErrorKind::Config)
                        .with_message(format!("invalid tag pattern: {pattern:?}"))
                        .with_source(err)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TagMatcher::Pattern(compiled))
    }

    pub fn new(tags: &[String], use_regex: bool) -> Result<Self, Error> {
        if use_regex {
            Self::pattern(tags)
        } else {
            Ok(Self::literal(tags.iter().cloned()))
        }
    }

    /// True when any tag occurs anywhere in `line`; stops at the first hit.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            TagMatcher::Literal(tags) => tags.iter().any(|tag| line.contains(tag.as_str())),
            TagMatcher::Pattern(patterns) => patterns.iter().any(|re| re.is_match(line)),
        }
    }
}

#[derive(Clone, Debug)]
pub enum BoundaryStrategy {
    /// Named marks, resolved through the document in the given order.
    Marks(Vec<char>),
    Tags(TagMatcher),
}

impl BoundaryStrategy {
    pub fn delimit_by(&self) -> DelimitBy {
        match self {
            BoundaryStrategy::Marks(_) => DelimitBy::Marks,
            BoundaryStrategy::Tags(_) => DelimitBy::Tags,
        }
    }

    /// Builds a strategy from raw option values; unknown `delimit_by` is a config error.
    pub fn from_options(
        delimit_by: &str,
        valid_marks: &str,
        tags: &[String],
        use_regex: bool,
    ) -> Result<Self, Error> {
        match delimit_by.parse::<DelimitBy>()? {
            DelimitBy::Marks => Ok(BoundaryStrategy::Marks(valid_marks.trim().chars().collect())),
            DelimitBy::Tags => Ok(BoundaryStrategy::Tags(TagMatcher::new(tags, use_regex)?)),
        }
    }
}

/// Sorted, distinct cell-start rows.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BoundarySet {
    rows: Vec<usize>,
}

/// Inclusive row range of one cell. `end_row == None` means "to the end of the document".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CellRange {
    pub start_row: usize,
    pub end_row: Option<usize>,
}

impl CellRange {
    pub fn end_row_or(&self, line_count: usize) -> usize {
        self.end_row.unwrap_or(line_count)
    }
}

impl BoundarySet {
    pub fn from_rows<I: IntoIterator<Item = usize>>(rows: I) -> Self {
        let mut rows: Vec<usize> = rows.into_iter().filter(|row| *row >= 1).collect();
        rows.sort_unstable();
        rows.dedup();
        Self { rows }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.binary_search(&row).is_ok()
    }

    pub fn insert(&mut self, row: usize) {
        if row == 0 {
            return;
        }
        if let Err(pos) = self.rows.binary_search(&row) {
            self.rows.insert(pos, row);
        }
    }

    /// Cell containing `row`. `None` when no boundary sits at or before `row`;
    /// callers normally force row 1 into the set to rule that out.
    pub fn current_cell(&self, row: usize) -> Option<CellRange> {
        // Index of the first boundary strictly after `row`.
        let after = self.rows.partition_point(|boundary| *boundary <= row);
        let start_row = *self.rows.get(after.checked_sub(1)?)?;
        let end_row = self.rows.get(after).map(|next| next - 1);
        Some(CellRange { start_row, end_row })
    }

    /// Start of the next cell, or `row` itself when already in the last cell.
    pub fn next_cell(&self, row: usize) -> usize {
        let after = self.rows.partition_point(|boundary| *boundary <= row);
        self.rows.get(after).copied().unwrap_or(row)
    }

    /// Greatest boundary strictly before `row`, or `row` itself when there is none.
    ///
    /// Inside a cell this is the cell's own start; on a header it is the previous cell.
    pub fn prev_cell(&self, row: usize) -> usize {
        let before = self.rows.partition_point(|boundary| *boundary < row);
        match before.checked_sub(1) {
            Some(idx) => self.rows[idx],
            None => row,
        }
    }
}

/// Computes the boundary rows of `doc` under `strategy`.
pub fn compute_boundaries<D: Document + ?Sized>(
    doc: &D,
    strategy: &BoundaryStrategy,
    include_first_line: bool,
) -> BoundarySet {
    let mut rows = match strategy {
        BoundaryStrategy::Marks(marks) => rows_with_marks(doc, marks),
        BoundaryStrategy::Tags(matcher) => rows_with_tags(doc, matcher),
    };
    if include_first_line {
        rows.push(1);
    }
    BoundarySet::from_rows(rows)
}

fn rows_with_marks<D: Document + ?Sized>(doc: &D, marks: &[char]) -> Vec<usize> {
    marks
        .iter()
        .filter_map(|mark| doc.mark_row(*mark))
        .filter(|row| *row != 0)
        .collect()
}

fn rows_with_tags<D: Document + ?Sized>(doc: &D, matcher: &TagMatcher) -> Vec<usize> {
    (1..=doc.line_count())
        .filter(|row| doc.line(*row).is_some_and(|line| matcher.matches(line)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        BoundarySet, BoundaryStrategy, CellRange, DelimitBy, TagMatcher, compute_boundaries,
    };
    use crate::core::document::TextDocument;
    use crate::core::error::ErrorKind;

    fn doc(lines: &[&str]) -> TextDocument {
        TextDocument::new(lines.iter().map(|line| line.to_string()).collect())
    }

    fn tags(list: &[&str]) -> BoundaryStrategy {
        BoundaryStrategy::Tags(TagMatcher::literal(list.iter().copied()))
    }

    #[test]
    fn tag_scan_with_forced_first_line() {
        let doc = doc(&["x", "# cell", "y", "# cell", "z"]);
        let set = compute_boundaries(&doc, &tags(&["# cell"]), true);
        assert_eq!(set.as_slice(), &[1, 2, 4]);
    }

    #[test]
    fn tag_scan_without_first_line() {
        let doc = doc(&["x", "# cell", "y", "# cell", "z"]);
        let set = compute_boundaries(&doc, &tags(&["# cell"]), false);
        assert_eq!(set.as_slice(), &[2, 4]);
    }

    #[test]
    fn line_matching_several_tags_counts_once() {
        let doc = doc(&["## %%", "a"]);
        let set = compute_boundaries(&doc, &tags(&["##", "%%"]), true);
        assert_eq!(set.as_slice(), &[1]);
    }

    #[test]
    fn regex_tags_search_anywhere_in_line() {
        let doc = doc(&["a", "x = 1  # In[3]", "b", "#In[]"]);
        let matcher = TagMatcher::pattern([r"#\s?In\[\d*\]"]).expect("pattern");
        let set = compute_boundaries(&doc, &BoundaryStrategy::Tags(matcher), false);
        assert_eq!(set.as_slice(), &[2, 4]);
    }

    #[test]
    fn literal_tags_are_not_patterns() {
        let doc = doc(&["a", "#.*", "b"]);
        let set = compute_boundaries(&doc, &tags(&["#.*"]), false);
        assert_eq!(set.as_slice(), &[2]);
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = TagMatcher::pattern(["(unclosed"]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn unset_marks_are_excluded() {
        let doc = doc(&["1", "2", "3", "4", "5", "6"])
            .with_mark('a', 5)
            .with_mark('b', 0);
        let strategy = BoundaryStrategy::Marks(vec!['a', 'b', 'c']);
        let set = compute_boundaries(&doc, &strategy, false);
        assert_eq!(set.as_slice(), &[5]);
    }

    #[test]
    fn marks_are_sorted_and_deduplicated() {
        let doc = doc(&["1", "2", "3", "4"])
            .with_mark('a', 4)
            .with_mark('b', 2)
            .with_mark('c', 4);
        let strategy = BoundaryStrategy::Marks(vec!['a', 'b', 'c']);
        let set = compute_boundaries(&doc, &strategy, true);
        assert_eq!(set.as_slice(), &[1, 2, 4]);
    }

    #[test]
    fn unknown_delimiter_is_config_error() {
        let err = BoundaryStrategy::from_options("lines", "ab", &[], false).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn delimiter_ignores_surrounding_whitespace() {
        assert_eq!(" tags ".parse::<DelimitBy>().expect("parse"), DelimitBy::Tags);
        let strategy = BoundaryStrategy::from_options("marks\n", " ab ", &[], false).expect("ok");
        assert_eq!(strategy.delimit_by(), DelimitBy::Marks);
    }

    #[test]
    fn current_cell_bounds() {
        let set = BoundarySet::from_rows([1, 4, 8]);
        assert_eq!(
            set.current_cell(5),
            Some(CellRange { start_row: 4, end_row: Some(7) })
        );
        assert_eq!(
            set.current_cell(8),
            Some(CellRange { start_row: 8, end_row: None })
        );
        assert_eq!(
            set.current_cell(1),
            Some(CellRange { start_row: 1, end_row: Some(3) })
        );
    }

    #[test]
    fn current_cell_on_boundary_starts_there() {
        let set = BoundarySet::from_rows([2, 4]);
        let cell = set.current_cell(4).expect("cell");
        assert_eq!(cell.start_row, 4);
        assert_eq!(cell.end_row_or(10), 10);
    }

    #[test]
    fn current_cell_before_first_boundary_is_none() {
        let set = BoundarySet::from_rows([3]);
        assert_eq!(set.current_cell(2), None);
    }

    #[test]
    fn next_cell_is_idempotent_at_last_cell() {
        let set = BoundarySet::from_rows([1, 4, 8]);
        assert_eq!(set.next_cell(2), 4);
        assert_eq!(set.next_cell(4), 8);
        assert_eq!(set.next_cell(8), 8);
        assert_eq!(set.next_cell(9), 9);
        assert_eq!(set.next_cell(set.next_cell(9)), 9);
    }

    #[test]
    fn prev_cell_returns_to_current_start_first() {
        let set = BoundarySet::from_rows([1, 4, 8]);
        assert_eq!(set.prev_cell(6), 4);
        assert_eq!(set.prev_cell(4), 1);
        assert_eq!(set.prev_cell(1), 1);
        assert_eq!(set.prev_cell(10), 8);
    }

    #[test]
    fn navigation_properties_hold_for_every_row() {
        let set = BoundarySet::from_rows([1, 3, 4, 9, 15]);
        for row in 1..=20 {
            let cell = set.current_cell(row).expect("row 1 is a boundary");
            assert!(set.contains(cell.start_row));
            assert!(cell.start_row <= row);
            assert!(set.iter().filter(|b| *b <= row).all(|b| b <= cell.start_row));
            if let Some(end) = cell.end_row {
                assert!(cell.start_row <= end);
                assert!(set.contains(end + 1));
            }

            let next = set.next_cell(row);
            assert!(next == row || (set.contains(next) && next > row));

            let prev = set.prev_cell(row);
            assert!(prev == row || (set.contains(prev) && prev < row));
        }
    }

    #[test]
    fn insert_keeps_order() {
        let mut set = BoundarySet::from_rows([5, 2, 2, 0]);
        assert_eq!(set.as_slice(), &[2, 5]);
        set.insert(1);
        set.insert(5);
        set.insert(0);
        assert_eq!(set.as_slice(), &[1, 2, 5]);
        assert_eq!(set.len(), 3);
    }
}
