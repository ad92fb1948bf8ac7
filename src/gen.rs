//! Test-data file generator.
//!
//! Produces record files in two layouts: an ASCII-visible one whose keys
//! read as `" A"`..`" Z"` when the file is opened as text, and a binary
//! one with keys and values anywhere in `[1, 30000)`. The sorter is
//! agnostic to which layout produced a file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::{self, RECORDS_PER_BLOCK};

/// Key of a space followed by `'A'`, the low end of the ASCII key range.
const ASCII_KEY_BASE: i16 = 8257;

/// Number of keys in the ASCII range, `' A'` through `' Z'`.
const ASCII_KEY_SPAN: i16 = 26;

/// A double-space, used as the filler value in the ASCII layout.
const BLANK_VALUE: i16 = 8224;

/// Layout of the generated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Keys in the printable range `" A"`..=`" Z"`, double-space values.
    Ascii,
    /// Keys and values uniform in `[1, 30000)`.
    Binary,
}

/// Writes whole blocks of random records to a file.
pub struct FileGenerator {
    path: PathBuf,
    num_blocks: usize,
    rng: StdRng,
}

impl FileGenerator {
    /// Creates a generator that will write `num_blocks` full blocks
    /// (1024 records each) to `path`.
    pub fn new(path: impl AsRef<Path>, num_blocks: usize) -> Self {
        FileGenerator {
            path: path.as_ref().to_path_buf(),
            num_blocks,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixes the rng seed so repeated generation produces identical files.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Generates the file, truncating any previous content.
    pub fn generate(&mut self, layout: Layout) -> io::Result<()> {
        log::info!(
            "generating {} block(s) of {:?} records into {}",
            self.num_blocks,
            layout,
            self.path.display()
        );

        let mut writer = io::BufWriter::new(fs::File::create(&self.path)?);
        for _ in 0..self.num_blocks * RECORDS_PER_BLOCK {
            let (key, value) = match layout {
                Layout::Ascii => (
                    self.rng.gen_range(ASCII_KEY_BASE..ASCII_KEY_BASE + ASCII_KEY_SPAN),
                    BLANK_VALUE,
                ),
                Layout::Binary => (self.rng.gen_range(1..30000), self.rng.gen_range(1..30000)),
            };
            writer.write_all(&record::encode(key, value))?;
        }
        writer.flush()
    }
}
