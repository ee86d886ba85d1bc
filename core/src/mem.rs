//! In-memory filesystem backing for tests and host-side simulators.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};

use crate::fs::{File, Filesystem, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFsError(ErrorKind);

impl embedded_io::Error for MemFsError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Path → contents map presented through the [`Filesystem`] seam.
#[derive(Debug, Default)]
pub struct MemFilesystem {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFilesystem {
    pub fn new() -> Self {
        MemFilesystem::default()
    }

    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }
}

impl ErrorType for MemFilesystem {
    type Error = MemFsError;
}

impl Filesystem for MemFilesystem {
    type File = MemFile;

    fn open_file(&self, path: &str, _mode: Mode) -> Result<MemFile, MemFsError> {
        self.files
            .get(path)
            .map(|data| MemFile {
                data: data.clone(),
                pos: 0,
            })
            .ok_or(MemFsError(ErrorKind::NotFound))
    }

    fn exists(&self, path: &str) -> Result<bool, MemFsError> {
        Ok(self.files.contains_key(path))
    }
}

pub struct MemFile {
    data: Vec<u8>,
    pos: u64,
}

impl ErrorType for MemFile {
    type Error = MemFsError;
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MemFsError> {
        let pos = usize::try_from(self.pos.min(self.data.len() as u64))
            .map_err(|_| MemFsError(ErrorKind::InvalidInput))?;
        let n = (self.data.len() - pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MemFsError> {
        let base = match pos {
            SeekFrom::Start(offset) => return Ok(set_pos(&mut self.pos, offset)),
            SeekFrom::End(delta) => (self.data.len() as i64, delta),
            SeekFrom::Current(delta) => (self.pos as i64, delta),
        };
        let target = base.0.checked_add(base.1).filter(|&p| p >= 0);
        match target {
            Some(p) => Ok(set_pos(&mut self.pos, p as u64)),
            None => Err(MemFsError(ErrorKind::InvalidInput)),
        }
    }
}

fn set_pos(pos: &mut u64, target: u64) -> u64 {
    *pos = target;
    target
}

impl File for MemFile {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
