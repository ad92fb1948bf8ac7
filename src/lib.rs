//! `bufsort` sorts a file of fixed-size binary records in place, even when the
//! file is far larger than available memory.
//!
//! The file is treated as a logical array of 4-byte records (2-byte signed key,
//! 2-byte signed value, big-endian) and sorted with a hybrid 3-way quicksort.
//! The sorter never touches storage directly: every record read and write goes
//! through a bounded [`BufferPool`] that caches 4096-byte blocks under an LRU
//! eviction policy and defers disk writes until eviction or flush.
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   the caller picks how many blocks the pool may keep resident; everything
//!   else stays on disk.
//! * **Duplicate-friendly sorting:**
//!   Dutch-national-flag partitioning keeps heavily duplicated key
//!   distributions close to linear, and small partitions fall back to
//!   insertion sort.
//! * **Diagnostics:**
//!   the pool counts cache hits, disk block reads and disk block writes, so
//!   the I/O cost of a sort is observable.
//!
//! # Example
//!
//! ```no_run
//! use bufsort::{BufferPool, Sorter};
//!
//! fn main() {
//!     let pool = BufferPool::open("records.bin", 10).unwrap();
//!     let file_len = pool.file_len();
//!
//!     let mut sorter = Sorter::new(pool, file_len).unwrap();
//!     sorter.sort().unwrap();
//!
//!     let pool = sorter.into_pool();
//!     println!(
//!         "hits: {}, reads: {}, writes: {}",
//!         pool.cache_hits(),
//!         pool.disk_reads(),
//!         pool.disk_writes()
//!     );
//!     pool.close().unwrap();
//! }
//! ```

pub mod check;
pub mod gen;
pub mod pool;
pub mod record;
pub mod sort;

pub use check::is_sorted;
pub use gen::{FileGenerator, Layout};
pub use pool::{BufferPool, PoolError};
pub use sort::{Sorter, INSERTION_THRESHOLD};
