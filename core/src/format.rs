//! Byte-exact on-disk layout of the XTC container.
//!
//! All multi-byte fields are little-endian and are parsed field-by-field;
//! nothing here relies on struct layout matching the file.

use alloc::string::String;

use crate::error::XtcError;

/// Container magic for 1-bit (two-tone) books.
pub const XTC_MAGIC: u32 = u32::from_le_bytes(*b"XTC\0");
/// Container magic for 2-bit (four-level grayscale) books.
pub const XTCH_MAGIC: u32 = u32::from_le_bytes(*b"XTCH");
/// Page sub-header magic inside 1-bit containers.
pub const XTG_MAGIC: u32 = u32::from_le_bytes(*b"XTG\0");
/// Page sub-header magic inside 2-bit containers.
pub const XTH_MAGIC: u32 = u32::from_le_bytes(*b"XTH\0");

/// Fixed header size; the chapter table may start anywhere past this.
pub const HEADER_SIZE: usize = 0x38;
/// Byte offset of the has-chapters flag within the header.
pub const HAS_CHAPTERS_OFFSET: usize = 0x0B;
/// Flag value marking a structured chapter table as present.
pub const CHAPTERS_PRESENT: u8 = 1;
/// Byte offset of the chapter-table offset field within the header.
pub const CHAPTER_OFFSET_FIELD: usize = 0x30;
/// NUL-padded title region: 128 bytes immediately after the fixed header.
pub const TITLE_OFFSET: u64 = 0x38;
pub const TITLE_SIZE: usize = 128;

pub const PAGE_TABLE_ENTRY_SIZE: usize = 16;
pub const PAGE_HEADER_SIZE: usize = 8;

pub const CHAPTER_RECORD_SIZE: usize = 96;
pub const CHAPTER_TITLE_SIZE: usize = 80;
/// Sub-offsets of the 1-indexed start/end page fields in a chapter record.
pub const CHAPTER_START_PAGE_OFFSET: usize = 0x50;
pub const CHAPTER_END_PAGE_OFFSET: usize = 0x52;

/// Pixel encoding of every page in a container, selected by the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    /// One bit per pixel, row-major, rows padded to whole bytes.
    Mono,
    /// Two independently packed bit planes, each column-major with columns
    /// counted from the right edge and padded to whole bytes.
    Gray2,
}

impl BitDepth {
    pub fn from_container_magic(magic: u32) -> Option<Self> {
        match magic {
            XTC_MAGIC => Some(BitDepth::Mono),
            XTCH_MAGIC => Some(BitDepth::Gray2),
            _ => None,
        }
    }

    /// Magic expected in the sub-header of every page payload.
    pub fn page_magic(self) -> u32 {
        match self {
            BitDepth::Mono => XTG_MAGIC,
            BitDepth::Gray2 => XTH_MAGIC,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Mono => 1,
            BitDepth::Gray2 => 2,
        }
    }

    /// Exact byte length of a page bitmap with the given dimensions.
    pub fn bitmap_len(self, width: u16, height: u16) -> usize {
        let width = width as usize;
        let height = height as usize;
        match self {
            BitDepth::Mono => width.div_ceil(8) * height,
            BitDepth::Gray2 => (width * height).div_ceil(8) * 2,
        }
    }
}

/// Fixed-size container header at offset 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XtcHeader {
    pub magic: u32,
    pub version_major: u8,
    pub version_minor: u8,
    pub page_count: u16,
    pub has_chapters: u8,
    pub page_table_offset: u64,
    pub data_offset: u64,
    pub chapter_offset: u64,
}

impl XtcHeader {
    /// Parses and validates the fixed header.
    ///
    /// `buf` must hold at least [`HEADER_SIZE`] bytes; short reads are the
    /// caller's concern.
    pub fn parse(buf: &[u8]) -> Result<Self, XtcError> {
        debug_assert!(buf.len() >= HEADER_SIZE);

        let magic = read_u32(buf, 0x00);
        if BitDepth::from_container_magic(magic).is_none() {
            log::warn!(
                "invalid container magic {magic:#010x} (expected {XTC_MAGIC:#010x} or {XTCH_MAGIC:#010x})"
            );
            return Err(XtcError::InvalidMagic);
        }

        let version_major = buf[0x04];
        let version_minor = buf[0x05];
        let valid_version = (version_major, version_minor) == (1, 0)
            || (version_major, version_minor) == (0, 1);
        if !valid_version {
            log::warn!("unsupported container version {version_major}.{version_minor}");
            return Err(XtcError::InvalidVersion);
        }

        let page_count = read_u16(buf, 0x06);
        if page_count == 0 {
            return Err(XtcError::CorruptedHeader);
        }

        Ok(XtcHeader {
            magic,
            version_major,
            version_minor,
            page_count,
            has_chapters: buf[HAS_CHAPTERS_OFFSET],
            page_table_offset: read_u64(buf, 0x10),
            data_offset: read_u64(buf, 0x18),
            chapter_offset: read_u64(buf, CHAPTER_OFFSET_FIELD),
        })
    }

    pub fn bit_depth(&self) -> BitDepth {
        // Infallible after parse(); Mono is the pre-open placeholder.
        BitDepth::from_container_magic(self.magic).unwrap_or(BitDepth::Mono)
    }
}

/// One fixed-size page-table record: where a page's payload lives on disk.
#[derive(Debug, Clone, Copy)]
pub struct PageTableEntry {
    pub data_offset: u64,
    pub data_size: u32,
    pub width: u16,
    pub height: u16,
}

impl PageTableEntry {
    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= PAGE_TABLE_ENTRY_SIZE);
        PageTableEntry {
            data_offset: read_u64(buf, 0x00),
            data_size: read_u32(buf, 0x08),
            width: read_u16(buf, 0x0C),
            height: read_u16(buf, 0x0E),
        }
    }
}

/// Per-page sub-header immediately preceding the bitmap bytes.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub magic: u32,
    pub width: u16,
    pub height: u16,
}

impl PageHeader {
    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= PAGE_HEADER_SIZE);
        PageHeader {
            magic: read_u32(buf, 0x00),
            width: read_u16(buf, 0x04),
            height: read_u16(buf, 0x06),
        }
    }
}

/// Reads a NUL-padded string region, truncating at the first NUL or at the
/// buffer end when no terminator is present.
pub fn parse_padded_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub(crate) fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
