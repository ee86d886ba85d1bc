//! Storage collaborator consumed by the parser.
//!
//! The core never touches a concrete filesystem; it reads containers through
//! these traits. Firmware backs them with an SD card driver, the dump tool
//! with `std::fs`, tests with [`crate::mem::MemFilesystem`].

use core::result::Result;

use embedded_io::{ErrorType, Read, Seek};

pub enum Mode {
    Read,
    // Write access exists for callers persisting reading progress next to
    // the book; the reader core itself only ever opens Mode::Read.
    Write,
    ReadWrite,
}

pub trait Filesystem: ErrorType {
    type File: File;

    fn open_file(&self, path: &str, mode: Mode) -> Result<Self::File, Self::Error>;
    fn exists(&self, path: &str) -> Result<bool, Self::Error>;
}

/// An open, seekable file. Closed by dropping.
pub trait File: Read + Seek {
    fn size(&self) -> u64;
}
