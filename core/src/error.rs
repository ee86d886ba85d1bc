use thiserror::Error;

/// Error taxonomy for container access.
///
/// Every variant is terminal for the operation that raised it; nothing is
/// retried internally. Chapter-table absence or malformation is not an
/// error at all: chapters are an optional enhancement and degrade to an
/// empty window.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum XtcError {
    /// The backing file could not be opened, or the parser is not open.
    #[error("file not found")]
    FileNotFound,
    /// A seek failed or a read returned fewer bytes than required.
    #[error("read error")]
    ReadError,
    /// Container or page sub-header magic is not a recognised value.
    #[error("invalid magic")]
    InvalidMagic,
    /// Header version pair is not one of the supported revisions.
    #[error("unsupported version")]
    InvalidVersion,
    /// Header fields are inconsistent (zero page count, missing page table).
    #[error("corrupted header")]
    CorruptedHeader,
    /// Page index at or beyond the container's page count.
    #[error("page out of range")]
    PageOutOfRange,
    /// Caller-supplied buffer is smaller than the page bitmap.
    #[error("buffer too small")]
    MemoryError,
}
