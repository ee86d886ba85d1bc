//! Inspect an XTC/XTCH container from the command line: header summary,
//! chapter windows, page descriptors, and raw page extraction.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;

use xtc_core::fs::Mode;
use xtc_core::XtcParser;

/// `std::fs` presented through the core's storage seam.
struct StdFilesystem;

struct StdFile {
    inner: std::fs::File,
    size: u64,
}

impl embedded_io::ErrorType for StdFilesystem {
    type Error = std::io::Error;
}

impl xtc_core::fs::Filesystem for StdFilesystem {
    type File = StdFile;

    fn open_file(&self, path: &str, mode: Mode) -> Result<StdFile, std::io::Error> {
        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true).create(true),
            Mode::ReadWrite => options.read(true).write(true).create(true),
        };
        let inner = options.open(path)?;
        let size = inner.metadata()?.len();
        Ok(StdFile { inner, size })
    }

    fn exists(&self, path: &str) -> Result<bool, std::io::Error> {
        Ok(std::path::Path::new(path).exists())
    }
}

impl embedded_io::ErrorType for StdFile {
    type Error = std::io::Error;
}

impl embedded_io::Read for StdFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        std::io::Read::read(&mut self.inner, buf)
    }
}

impl embedded_io::Seek for StdFile {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> Result<u64, std::io::Error> {
        let pos = match pos {
            embedded_io::SeekFrom::Start(offset) => std::io::SeekFrom::Start(offset),
            embedded_io::SeekFrom::End(delta) => std::io::SeekFrom::End(delta),
            embedded_io::SeekFrom::Current(delta) => std::io::SeekFrom::Current(delta),
        };
        std::io::Seek::seek(&mut self.inner, pos)
    }
}

impl xtc_core::fs::File for StdFile {
    fn size(&self) -> u64 {
        self.size
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        eprintln!(
            "Usage: xtc-dump <book.xtc> [--page N] [--out raw.bin] [--chapter-window N] [--batch N]"
        );
        std::process::exit(1);
    }

    let input = args.remove(0);
    let mut page = None;
    let mut out = None;
    let mut chapter_window = 0usize;
    let mut batch = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--page" => {
                i += 1;
                page = args.get(i).and_then(|s| s.parse::<u32>().ok());
            }
            "--out" => {
                i += 1;
                out = args.get(i).cloned();
            }
            "--chapter-window" => {
                i += 1;
                chapter_window = args
                    .get(i)
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(0);
            }
            "--batch" => {
                i += 1;
                batch = args.get(i).and_then(|s| s.parse::<u32>().ok());
            }
            _ => {}
        }
        i += 1;
    }

    let fs = StdFilesystem;
    if !XtcParser::is_valid_container(&fs, &input) {
        log::warn!("{input} does not start with an XTC/XTCH magic");
    }

    let mut parser = match batch {
        Some(batch) => XtcParser::with_batch_size(batch),
        None => XtcParser::new(),
    };
    if let Err(err) = parser.open(&fs, &input) {
        eprintln!("Failed to open {input}: {err}");
        std::process::exit(1);
    }

    println!("title:      {}", parser.title());
    println!("pages:      {}", parser.page_count());
    println!("page size:  {}x{}", parser.width(), parser.height());
    println!("bit depth:  {}", parser.bit_depth().bits());
    println!("chapters:   {}", if parser.has_chapters() { "yes" } else { "no" });

    if let Err(err) = parser.read_chapter_window(chapter_window) {
        eprintln!("Failed to read chapter window {chapter_window}: {err}");
        std::process::exit(1);
    }
    if parser.chapters().is_empty() {
        match parser.whole_book_chapter() {
            Ok(span) => println!(
                "no chapter window at {chapter_window}; whole book: \"{}\" pages {}..={}",
                span.name, span.start_page, span.end_page
            ),
            Err(err) => eprintln!("Fallback chapter unavailable: {err}"),
        }
    } else {
        for entry in parser.chapters() {
            println!(
                "chapter {:4}  pages {:5}..={:5}  {}",
                entry.index, entry.start_page, entry.end_page, entry.title
            );
        }
    }

    let Some(page) = page else {
        return;
    };

    let descriptor = match parser.resolve(page) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            eprintln!("Failed to resolve page {page}: {err}");
            std::process::exit(1);
        }
    };
    println!(
        "page {page}: offset {:#x}, {} bytes on disk, {}x{}",
        descriptor.offset, descriptor.size, descriptor.width, descriptor.height
    );

    let Some(out) = out else {
        return;
    };
    let mut file = match std::fs::File::create(&out) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to create {out}: {err}");
            std::process::exit(1);
        }
    };
    let mut written = 0usize;
    let result = parser.read_page_streaming(page, 4096, |chunk, _| {
        if file.write_all(chunk).is_ok() {
            written += chunk.len();
        }
    });
    match result {
        Ok(()) => println!("wrote {written} bitmap bytes to {out}"),
        Err(err) => {
            eprintln!("Failed to extract page {page}: {err}");
            std::process::exit(1);
        }
    }
}
