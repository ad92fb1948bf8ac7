//! Buffer-pool backed external sorter.
//!
//! Sorts a file of fixed 4-byte records in place, addressing it as a
//! logical array of records 0..N-1 served entirely through a
//! [`BufferPool`]. Storage is never touched directly, so block locality
//! of the access pattern decides how much disk traffic the sort costs.

use crate::pool::{BufferPool, PoolError};
use crate::record::{self, RECORD_SIZE};

/// Partition length at or below which insertion sort takes over.
/// Small ranges are cheaper to finish with insertion sort than to keep
/// partitioning.
pub const INSERTION_THRESHOLD: u64 = 16;

/// Hybrid 3-way quicksort over a record file behind a buffer pool.
///
/// Uses median-of-three pivot selection and Dutch-national-flag
/// partitioning, which degrades gracefully to a linear pass on heavily
/// duplicated keys because the equal band is never recursed into.
pub struct Sorter {
    pool: BufferPool,
    /// Total number of records in the file.
    records: u64,
}

impl Sorter {
    /// Creates a sorter over a pool and the file's byte length.
    /// The length must be an exact multiple of the record size.
    pub fn new(pool: BufferPool, file_len: u64) -> Result<Self, PoolError> {
        if file_len % RECORD_SIZE as u64 != 0 {
            return Err(PoolError::Config(format!(
                "file length {} is not a multiple of the record size {}",
                file_len, RECORD_SIZE
            )));
        }

        Ok(Sorter {
            pool,
            records: file_len / RECORD_SIZE as u64,
        })
    }

    /// Number of records addressed by this sorter.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Consumes the sorter, handing the pool back for flush/close and
    /// counter inspection.
    pub fn into_pool(self) -> BufferPool {
        self.pool
    }

    /// Sorts all records in place by ascending signed key.
    /// A file of zero or one records is left untouched.
    pub fn sort(&mut self) -> Result<(), PoolError> {
        if self.records <= 1 {
            return Ok(());
        }

        log::debug!("sorting {} records", self.records);

        // Explicit work-list instead of recursion, so a pathological
        // partition sequence cannot exhaust the call stack. Ranges are
        // inclusive and never empty.
        let mut ranges = vec![(0, self.records - 1)];

        while let Some((low, high)) = ranges.pop() {
            if high - low <= INSERTION_THRESHOLD {
                self.insertion_sort(low, high)?;
                continue;
            }

            let mid = low + (high - low) / 2;
            let pivot = median(self.key_at(low)?, self.key_at(mid)?, self.key_at(high)?);

            // Dutch-national-flag partition: [low, lt) < pivot,
            // [lt, i) == pivot, (gt, high] > pivot, [i, gt] unscanned.
            let mut lt = low;
            let mut gt = high;
            let mut i = low;
            while i <= gt {
                let key = self.key_at(i)?;
                if key < pivot {
                    self.swap(lt, i)?;
                    lt += 1;
                    i += 1;
                } else if key > pivot {
                    // The record arriving from gt is unscanned, so i stays.
                    // gt cannot pass below i: the range always holds a key
                    // <= pivot (the median sample), and the scan never
                    // pushes it beyond gt.
                    self.swap(i, gt)?;
                    gt -= 1;
                } else {
                    i += 1;
                }
            }

            // The equal band [lt, gt] is already in its final position.
            if lt > low {
                ranges.push((low, lt - 1));
            }
            if gt < high {
                ranges.push((gt + 1, high));
            }
        }

        log::debug!("sort finished");
        Ok(())
    }

    /// Insertion sort over the inclusive range `[low, high]`.
    /// Shifts greater records right one slot at a time and drops the held
    /// record into the gap; a record already in place is not rewritten.
    fn insertion_sort(&mut self, low: u64, high: u64) -> Result<(), PoolError> {
        let mut held = [0u8; RECORD_SIZE];
        let mut scanned = [0u8; RECORD_SIZE];

        let mut i = low + 1;
        while i <= high {
            self.read_record(i, &mut held)?;
            let held_key = record::key(&held);

            let mut dest = i;
            while dest > low {
                self.read_record(dest - 1, &mut scanned)?;
                if record::key(&scanned) <= held_key {
                    break;
                }
                self.write_record(dest, &scanned)?;
                dest -= 1;
            }

            if dest != i {
                self.write_record(dest, &held)?;
            }
            i += 1;
        }
        Ok(())
    }

    /// Exchanges the records at indices `i` and `j` through the pool.
    /// Two reads and two writes; a self-swap is a no-op.
    fn swap(&mut self, i: u64, j: u64) -> Result<(), PoolError> {
        if i == j {
            return Ok(());
        }

        let mut a = [0u8; RECORD_SIZE];
        let mut b = [0u8; RECORD_SIZE];
        self.read_record(i, &mut a)?;
        self.read_record(j, &mut b)?;
        self.write_record(i, &b)?;
        self.write_record(j, &a)?;
        Ok(())
    }

    fn key_at(&mut self, index: u64) -> Result<i16, PoolError> {
        let mut rec = [0u8; RECORD_SIZE];
        self.read_record(index, &mut rec)?;
        Ok(record::key(&rec))
    }

    fn read_record(&mut self, index: u64, buf: &mut [u8; RECORD_SIZE]) -> Result<(), PoolError> {
        self.pool.read_into(buf, index * RECORD_SIZE as u64)
    }

    fn write_record(&mut self, index: u64, rec: &[u8; RECORD_SIZE]) -> Result<(), PoolError> {
        self.pool.insert(rec, index * RECORD_SIZE as u64)
    }
}

/// Median of three keys. When two of the samples tie, either equal value
/// qualifies; the comparison chain below settles the choice.
fn median(a: i16, b: i16, c: i16) -> i16 {
    if (a <= b && b <= c) || (c <= b && b <= a) {
        b
    } else if (b <= a && a <= c) || (c <= a && a <= b) {
        a
    } else {
        c
    }
}
