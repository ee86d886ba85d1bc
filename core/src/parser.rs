//! Container open/validation, the windowed page-table cache, the chapter
//! window reader, and page payload extraction.
//!
//! The parser is single-threaded and synchronous; callers that drive it from
//! more than one task must serialize access behind their own lock, since a
//! window reload replaces state a concurrent reader could be iterating.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use embedded_io::{Read, ReadExactError, Seek, SeekFrom};

use crate::chapter::{parse_record, ChapterEntry, ChapterSpan, ChapterWindow};
use crate::error::XtcError;
use crate::format::{
    BitDepth, PageHeader, PageTableEntry, XtcHeader, CHAPTERS_PRESENT, CHAPTER_RECORD_SIZE,
    HEADER_SIZE, PAGE_HEADER_SIZE, PAGE_TABLE_ENTRY_SIZE, TITLE_OFFSET, TITLE_SIZE,
};
use crate::fs::{File, Filesystem, Mode};

/// Page-table entries held per window. Tunable: a larger batch costs RAM
/// (16 bytes per entry on disk, more in memory) but reloads less often.
pub const DEFAULT_PAGE_BATCH: u32 = 500;

/// In-memory view of one page-table entry, tagged with the container's bit
/// depth. Valid only while the page stays inside the loaded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Absolute byte offset of the page's sub-header.
    pub offset: u64,
    /// Declared payload size in bytes.
    pub size: u32,
    pub width: u16,
    pub height: u16,
    pub bit_depth: BitDepth,
}

/// The resident slice of the page table.
#[derive(Debug, Default)]
struct PageWindow {
    start: u32,
    descriptors: Vec<PageDescriptor>,
}

impl PageWindow {
    fn end(&self) -> u32 {
        self.start + self.descriptors.len().saturating_sub(1) as u32
    }

    fn contains(&self, page: u32) -> bool {
        !self.descriptors.is_empty() && page >= self.start && page <= self.end()
    }

    fn get(&self, page: u32) -> Option<PageDescriptor> {
        if !self.contains(page) {
            return None;
        }
        self.descriptors.get((page - self.start) as usize).copied()
    }

    fn clear(&mut self) {
        self.start = 0;
        self.descriptors = Vec::new();
    }
}

/// Reader for one open XTC/XTCH container.
///
/// Owns the file handle and the current page/chapter windows exclusively.
/// Reopening discards all previously loaded state.
pub struct XtcParser<FS: Filesystem> {
    file: Option<FS::File>,
    header: XtcHeader,
    title: String,
    author: String,
    window: PageWindow,
    chapters: ChapterWindow,
    default_width: u16,
    default_height: u16,
    batch_size: u32,
    last_error: Option<XtcError>,
}

impl<FS: Filesystem> XtcParser<FS> {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_PAGE_BATCH)
    }

    /// `batch_size` is the number of page-table entries resident at once.
    pub fn with_batch_size(batch_size: u32) -> Self {
        XtcParser {
            file: None,
            header: XtcHeader::default(),
            title: String::new(),
            author: String::new(),
            window: PageWindow::default(),
            chapters: ChapterWindow::new(),
            default_width: 0,
            default_height: 0,
            batch_size: batch_size.max(1),
            last_error: None,
        }
    }

    /// Cheap probe: does the file start with a recognised container magic?
    pub fn is_valid_container(fs: &FS, path: &str) -> bool {
        let Ok(mut file) = fs.open_file(path, Mode::Read) else {
            return false;
        };
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_err() {
            return false;
        }
        BitDepth::from_container_magic(u32::from_le_bytes(magic)).is_some()
    }

    /// Opens a container: validates the header, reads the title, loads the
    /// first page window and the first chapter window.
    ///
    /// An already-open parser is closed first rather than failing.
    pub fn open(&mut self, fs: &FS, path: &str) -> Result<(), XtcError> {
        if self.file.is_some() {
            self.close();
        }
        let result = self.open_inner(fs, path);
        if let Err(err) = result {
            log::warn!("failed to open {path}: {err}");
            self.close();
        }
        self.last_error = result.err();
        result
    }

    fn open_inner(&mut self, fs: &FS, path: &str) -> Result<(), XtcError> {
        let mut file = fs
            .open_file(path, Mode::Read)
            .map_err(|_| XtcError::FileNotFound)?;

        let mut header_buf = [0u8; HEADER_SIZE];
        read_exact(&mut file, &mut header_buf)?;
        let header = XtcHeader::parse(&header_buf)?;

        // Best-effort title: a short region just truncates, only hard I/O
        // failures propagate.
        let mut title_buf = [0u8; TITLE_SIZE];
        seek_to(&mut file, TITLE_OFFSET)?;
        match file.read_exact(&mut title_buf) {
            Ok(()) | Err(ReadExactError::UnexpectedEof) => {}
            Err(ReadExactError::Other(_)) => return Err(XtcError::ReadError),
        }

        self.file = Some(file);
        self.header = header;
        self.title = crate::format::parse_padded_str(&title_buf);

        self.load_window(0)?;
        self.read_chapter_window(0)?;

        log::info!(
            "opened {path}: {} pages, {}x{}, {}-bit, version {}.{}",
            header.page_count,
            self.default_width,
            self.default_height,
            header.bit_depth().bits(),
            header.version_major,
            header.version_minor,
        );
        Ok(())
    }

    /// Closes the file and discards all loaded state. The configured batch
    /// size survives for the next open.
    pub fn close(&mut self) {
        self.file = None;
        self.header = XtcHeader::default();
        self.title.clear();
        self.author.clear();
        self.window.clear();
        self.chapters.clear();
        self.default_width = 0;
        self.default_height = 0;
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn page_count(&self) -> u32 {
        u32::from(self.header.page_count)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The current container revision carries no author field; this reports
    /// the stored (empty) value for API parity.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Dimensions of page 0, recorded on the first window load and treated
    /// as the container's default page size.
    pub fn width(&self) -> u16 {
        self.default_width
    }

    pub fn height(&self) -> u16 {
        self.default_height
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.header.bit_depth()
    }

    /// Header flag: does the container declare a structured chapter table?
    pub fn has_chapters(&self) -> bool {
        self.header.has_chapters == CHAPTERS_PRESENT
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Inclusive page range currently resident in the window.
    pub fn loaded_window(&self) -> Option<(u32, u32)> {
        if self.window.descriptors.is_empty() {
            None
        } else {
            Some((self.window.start, self.window.end()))
        }
    }

    /// Error raised by the most recent tracked operation, if any.
    pub fn last_error(&self) -> Option<XtcError> {
        self.last_error
    }

    /// Loads the window starting at `start` from the on-disk page table.
    ///
    /// The replacement window is fully read before it is swapped in, so a
    /// failed reload leaves the previous window intact.
    pub fn load_window(&mut self, start: u32) -> Result<(), XtcError> {
        let header = self.header;
        let page_count = u32::from(header.page_count);
        let batch = self.batch_size;
        let file = self.file.as_mut().ok_or(XtcError::FileNotFound)?;
        if start >= page_count {
            return Err(XtcError::PageOutOfRange);
        }
        if header.page_table_offset == 0 {
            return Err(XtcError::CorruptedHeader);
        }

        let end = (start + batch - 1).min(page_count - 1);
        let count = (end - start + 1) as usize;
        seek_to(
            file,
            header.page_table_offset + u64::from(start) * PAGE_TABLE_ENTRY_SIZE as u64,
        )?;

        let bit_depth = header.bit_depth();
        let mut descriptors = Vec::with_capacity(count);
        let mut buf = [0u8; PAGE_TABLE_ENTRY_SIZE];
        for _ in 0..count {
            read_exact(file, &mut buf)?;
            let entry = PageTableEntry::parse(&buf);
            descriptors.push(PageDescriptor {
                offset: entry.data_offset,
                size: entry.data_size,
                width: entry.width,
                height: entry.height,
                bit_depth,
            });
        }

        if start == 0 {
            if let Some(first) = descriptors.first() {
                self.default_width = first.width;
                self.default_height = first.height;
            }
        }
        self.window = PageWindow { start, descriptors };
        log::debug!("page window [{start}, {end}] loaded ({count} entries)");
        Ok(())
    }

    /// Loads the window immediately following the current one.
    pub fn advance_window(&mut self) -> Result<(), XtcError> {
        if self.file.is_none() {
            return Err(XtcError::FileNotFound);
        }
        if self.window.end() + 1 >= self.page_count() {
            return Err(XtcError::PageOutOfRange);
        }
        self.load_window(self.window.end() + 1)
    }

    /// Returns the descriptor for `page`, reloading the window on a miss.
    ///
    /// A miss loads the window *containing* the page, so random jumps in
    /// either direction resolve correctly.
    pub fn resolve(&mut self, page: u32) -> Result<PageDescriptor, XtcError> {
        if self.file.is_none() {
            return Err(XtcError::FileNotFound);
        }
        if page >= self.page_count() {
            return Err(XtcError::PageOutOfRange);
        }
        if !self.window.contains(page) {
            let start = (page / self.batch_size) * self.batch_size;
            self.load_window(start)?;
        }
        self.window.get(page).ok_or(XtcError::ReadError)
    }

    /// Reads a page's raw bitmap bytes into `dest`, returning the byte
    /// count. `dest` must be at least the declared bitmap length.
    pub fn read_page(&mut self, page: u32, dest: &mut [u8]) -> Result<usize, XtcError> {
        let result = self.read_page_inner(page, dest);
        self.last_error = result.err();
        result
    }

    fn read_page_inner(&mut self, page: u32, dest: &mut [u8]) -> Result<usize, XtcError> {
        let (_, bitmap_len) = self.read_validated_page_header(page)?;
        if dest.len() < bitmap_len {
            log::warn!(
                "page {page} buffer too small: need {bitmap_len}, have {}",
                dest.len()
            );
            return Err(XtcError::MemoryError);
        }
        let file = self.file.as_mut().ok_or(XtcError::FileNotFound)?;
        read_exact(file, &mut dest[..bitmap_len])?;
        Ok(bitmap_len)
    }

    /// Streams a page's raw bitmap through `on_chunk(bytes, offset)` in
    /// increasing offset order, using a scratch buffer of `chunk_size`
    /// bytes instead of a full-page allocation.
    pub fn read_page_streaming(
        &mut self,
        page: u32,
        chunk_size: usize,
        mut on_chunk: impl FnMut(&[u8], usize),
    ) -> Result<(), XtcError> {
        let result = self.read_page_streaming_inner(page, chunk_size, &mut on_chunk);
        self.last_error = result.err();
        result
    }

    fn read_page_streaming_inner(
        &mut self,
        page: u32,
        chunk_size: usize,
        on_chunk: &mut impl FnMut(&[u8], usize),
    ) -> Result<(), XtcError> {
        let (_, bitmap_len) = self.read_validated_page_header(page)?;
        let file = self.file.as_mut().ok_or(XtcError::FileNotFound)?;

        let chunk_size = chunk_size.max(1).min(bitmap_len.max(1));
        let mut chunk = vec![0u8; chunk_size];
        let mut total = 0usize;
        while total < bitmap_len {
            let want = chunk_size.min(bitmap_len - total);
            let got = file
                .read(&mut chunk[..want])
                .map_err(|_| XtcError::ReadError)?;
            if got == 0 {
                return Err(XtcError::ReadError);
            }
            on_chunk(&chunk[..got], total);
            total += got;
        }
        Ok(())
    }

    /// Resolves `page`, seeks to its payload and validates the sub-header.
    /// Leaves the file positioned at the first bitmap byte and returns the
    /// header plus the exact bitmap length it declares.
    fn read_validated_page_header(&mut self, page: u32) -> Result<(PageHeader, usize), XtcError> {
        let descriptor = self.resolve(page)?;
        let file = self.file.as_mut().ok_or(XtcError::FileNotFound)?;
        seek_to(file, descriptor.offset)?;

        let mut buf = [0u8; PAGE_HEADER_SIZE];
        read_exact(file, &mut buf)?;
        let header = PageHeader::parse(&buf);
        let expected = descriptor.bit_depth.page_magic();
        if header.magic != expected {
            log::warn!(
                "page {page} magic {:#010x} does not match expected {expected:#010x}",
                header.magic
            );
            return Err(XtcError::InvalidMagic);
        }
        let bitmap_len = descriptor.bit_depth.bitmap_len(header.width, header.height);
        Ok((header, bitmap_len))
    }

    /// Fallback chapter mode: the whole book as one span, named from the
    /// container title.
    pub fn whole_book_chapter(&self) -> Result<ChapterSpan, XtcError> {
        if self.file.is_none() {
            return Err(XtcError::FileNotFound);
        }
        let name = if self.title.is_empty() {
            String::from("Untitled")
        } else {
            self.title.clone()
        };
        Ok(ChapterSpan {
            name,
            start_page: 0,
            end_page: self.page_count() - 1,
        })
    }

    /// Reads one window of chapter records starting at the absolute chapter
    /// index `start_chapter`.
    ///
    /// Absent or malformed chapter tables are not errors: the window comes
    /// back empty and the result is `Ok`. Only seek/read failures on a
    /// well-located table fail with `ReadError`.
    pub fn read_chapter_window(&mut self, start_chapter: usize) -> Result<(), XtcError> {
        self.chapters.clear();
        let header = self.header;
        let file = self.file.as_mut().ok_or(XtcError::FileNotFound)?;

        if header.has_chapters != CHAPTERS_PRESENT {
            return Ok(());
        }
        let chapter_offset = header.chapter_offset;
        if chapter_offset == 0 {
            return Ok(());
        }
        let file_size = file.size();
        if chapter_offset < HEADER_SIZE as u64
            || chapter_offset >= file_size
            || chapter_offset + CHAPTER_RECORD_SIZE as u64 > file_size
        {
            log::warn!("chapter table offset {chapter_offset:#x} out of range, ignoring");
            return Ok(());
        }

        // The table extends to whichever of the page table / data region
        // starts next after it, else to end of file.
        let max_offset = if header.page_table_offset > chapter_offset {
            header.page_table_offset
        } else if header.data_offset > chapter_offset {
            header.data_offset
        } else {
            file_size
        };
        let chapter_count = ((max_offset - chapter_offset) / CHAPTER_RECORD_SIZE as u64) as usize;
        if chapter_count == 0 || start_chapter >= chapter_count {
            return Ok(());
        }

        seek_to(
            file,
            chapter_offset + (start_chapter * CHAPTER_RECORD_SIZE) as u64,
        )?;

        let mut window = ChapterWindow::new();
        let mut buf = [0u8; CHAPTER_RECORD_SIZE];
        let mut index = start_chapter;
        while !window.is_full() && index < chapter_count {
            match file.read_exact(&mut buf) {
                Ok(()) => {}
                // Short read means end of data; keep what was collected.
                Err(ReadExactError::UnexpectedEof) => break,
                Err(ReadExactError::Other(_)) => return Err(XtcError::ReadError),
            }
            if let Some((title, start_page, end_page)) = parse_record(&buf, header.page_count) {
                window.push(ChapterEntry {
                    index,
                    title,
                    start_page,
                    end_page,
                });
            }
            index += 1;
        }

        log::debug!(
            "chapter window from {start_chapter}: {} valid of {} scanned",
            window.len(),
            index - start_chapter
        );
        self.chapters = window;
        Ok(())
    }

    /// Chapters resident in the current window.
    pub fn chapters(&self) -> &[ChapterEntry] {
        self.chapters.entries()
    }

    /// Looks up a chapter by absolute index within the loaded window only.
    pub fn lookup_chapter(&self, index: usize) -> Option<(&str, u32)> {
        self.chapters.lookup(index)
    }
}

impl<FS: Filesystem> Default for XtcParser<FS> {
    fn default() -> Self {
        XtcParser::new()
    }
}

fn seek_to<F: File>(file: &mut F, offset: u64) -> Result<(), XtcError> {
    file.seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|_| XtcError::ReadError)
}

fn read_exact<F: File>(file: &mut F, buf: &mut [u8]) -> Result<(), XtcError> {
    file.read_exact(buf).map_err(|_| XtcError::ReadError)
}
