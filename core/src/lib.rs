//! Reader core for the XTC/XTCH pre-rasterized ebook container.
//!
//! Every page of an XTC book is stored as a ready-to-blit bitmap, so a
//! memory-constrained device can display pages without any runtime text
//! layout. The catch is that the on-disk page table and chapter index of a
//! long book do not fit in RAM; this crate reads both through bounded,
//! windowed caches and hands exact byte ranges to the render path.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod chapter;
pub mod error;
pub mod format;
pub mod fs;
pub mod mem;
pub mod parser;

pub use error::XtcError;
pub use parser::{PageDescriptor, XtcParser, DEFAULT_PAGE_BATCH};
