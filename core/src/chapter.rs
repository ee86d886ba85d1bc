//! Chapter index access.
//!
//! The structured chapter table is optional and potentially large, so it is
//! browsed through a bounded window that is re-read from disk on demand,
//! never cached in full. A degenerate fallback treats the whole book as a
//! single chapter when no structured browsing is requested.

use alloc::string::String;
use alloc::vec::Vec;

use crate::format::{
    parse_padded_str, CHAPTER_END_PAGE_OFFSET, CHAPTER_RECORD_SIZE, CHAPTER_START_PAGE_OFFSET,
    CHAPTER_TITLE_SIZE,
};

/// Records read per window request. Together with the re-read-per-window
/// policy this bounds chapter memory regardless of how many chapters the
/// book has.
pub const CHAPTER_WINDOW_RECORDS: usize = 25;
/// Backing capacity reserved for the window; never grows past this.
pub const CHAPTER_WINDOW_CAPACITY: usize = 30;

/// Single-chapter fallback covering the entire book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSpan {
    pub name: String,
    /// Inclusive, 0-indexed.
    pub start_page: u32,
    /// Inclusive, 0-indexed.
    pub end_page: u32,
}

/// One chapter resident in the window.
///
/// `index` is the chapter's absolute position in the on-disk table. Invalid
/// records are skipped without consuming a window slot, so entry indices are
/// not necessarily contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    pub index: usize,
    pub title: String,
    /// Inclusive, 0-indexed.
    pub start_page: u32,
    /// Inclusive, 0-indexed, clamped to the last page.
    pub end_page: u32,
}

/// Bounded window over the on-disk chapter table.
#[derive(Debug)]
pub struct ChapterWindow {
    entries: Vec<ChapterEntry>,
}

impl ChapterWindow {
    pub fn new() -> Self {
        ChapterWindow {
            entries: Vec::with_capacity(CHAPTER_WINDOW_CAPACITY),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn push(&mut self, entry: ChapterEntry) {
        debug_assert!(self.entries.len() < CHAPTER_WINDOW_RECORDS);
        self.entries.push(entry);
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= CHAPTER_WINDOW_RECORDS
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChapterEntry] {
        &self.entries
    }

    /// Linear search over the currently loaded window only. An index outside
    /// the window yields `None`; the caller is responsible for requesting
    /// the right window first.
    pub fn lookup(&self, index: usize) -> Option<(&str, u32)> {
        self.entries
            .iter()
            .find(|entry| entry.index == index)
            .map(|entry| (entry.title.as_str(), entry.start_page))
    }
}

impl Default for ChapterWindow {
    fn default() -> Self {
        ChapterWindow::new()
    }
}

/// Decodes one 96-byte chapter record, applying the validity filter.
///
/// Returns `None` for records that must be skipped: placeholder rows (empty
/// title, both pages 0), a start page past the book, or an inverted range.
/// Page numbers are stored 1-indexed with 0 meaning "unset"; both are
/// converted to 0-indexed here and the end page is clamped to the last page.
pub(crate) fn parse_record(buf: &[u8], page_count: u16) -> Option<(String, u32, u32)> {
    debug_assert!(buf.len() >= CHAPTER_RECORD_SIZE);

    let title = parse_padded_str(&buf[..CHAPTER_TITLE_SIZE]);
    let raw_start = crate::format::read_u16(buf, CHAPTER_START_PAGE_OFFSET);
    let raw_end = crate::format::read_u16(buf, CHAPTER_END_PAGE_OFFSET);

    if title.is_empty() && raw_start == 0 && raw_end == 0 {
        return None;
    }

    let start = u32::from(raw_start.saturating_sub(1));
    let mut end = u32::from(raw_end.saturating_sub(1));

    if start >= u32::from(page_count) || start > end {
        return None;
    }
    if end >= u32::from(page_count) {
        end = u32::from(page_count) - 1;
    }

    Some((title, start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn record(title: &str, start: u16, end: u16) -> [u8; CHAPTER_RECORD_SIZE] {
        let mut buf = [0u8; CHAPTER_RECORD_SIZE];
        buf[..title.len()].copy_from_slice(title.as_bytes());
        buf[CHAPTER_START_PAGE_OFFSET..CHAPTER_START_PAGE_OFFSET + 2]
            .copy_from_slice(&start.to_le_bytes());
        buf[CHAPTER_END_PAGE_OFFSET..CHAPTER_END_PAGE_OFFSET + 2]
            .copy_from_slice(&end.to_le_bytes());
        buf
    }

    #[test]
    fn converts_one_indexed_pages() {
        let (title, start, end) = parse_record(&record("Chapter 1", 1, 10), 100).unwrap();
        assert_eq!(title, "Chapter 1");
        assert_eq!(start, 0);
        assert_eq!(end, 9);
    }

    #[test]
    fn zero_page_means_unset_not_decremented() {
        // Start 0 stays 0 rather than wrapping.
        let (_, start, _) = parse_record(&record("Intro", 0, 3), 100).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn skips_placeholder_record() {
        assert!(parse_record(&record("", 0, 0), 100).is_none());
    }

    #[test]
    fn skips_start_past_book() {
        assert!(parse_record(&record("Late", 101, 110), 100).is_none());
    }

    #[test]
    fn skips_inverted_range() {
        assert!(parse_record(&record("Backwards", 9, 3), 100).is_none());
    }

    #[test]
    fn clamps_end_to_last_page() {
        let (_, _, end) = parse_record(&record("Tail", 90, 500), 100).unwrap();
        assert_eq!(end, 99);
    }

    #[test]
    fn titled_record_with_zero_pages_is_kept() {
        // Only the fully blank row is a placeholder.
        let parsed = parse_record(&record("Cover", 0, 0), 100);
        assert!(parsed.is_some());
    }

    #[test]
    fn lookup_matches_absolute_index_only() {
        let mut window = ChapterWindow::new();
        window.push(ChapterEntry {
            index: 7,
            title: "Seven".to_string(),
            start_page: 12,
            end_page: 20,
        });
        assert_eq!(window.lookup(7), Some(("Seven", 12)));
        assert_eq!(window.lookup(0), None);
    }
}
