//! LRU buffer pool.
//!
//! The pool owns the on-disk file and a bounded set of in-memory blocks.
//! Callers address the file by byte offset; the pool maps offsets to
//! 4096-byte blocks, loads missing blocks from disk, and defers writes
//! until eviction or an explicit flush.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::record::BLOCK_SIZE;

/// Sentinel slot index marking a detached list link.
const NIL: usize = usize::MAX;

/// Buffer pool error.
#[derive(Debug)]
pub enum PoolError {
    /// Invalid pool or file configuration, detected at construction time.
    Config(String),
    /// Underlying file open/read/write failure. Not retried.
    Storage(io::Error),
    /// Requested byte span crosses a block boundary.
    UnalignedAccess { pos: u64, len: usize },
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PoolError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            PoolError::Storage(err) => write!(f, "storage operation failed: {}", err),
            PoolError::UnalignedAccess { pos, len } => {
                write!(f, "byte span at offset {} of length {} crosses a block boundary", pos, len)
            }
        }
    }
}

impl From<io::Error> for PoolError {
    fn from(err: io::Error) -> Self {
        PoolError::Storage(err)
    }
}

/// A single cached block: its data, dirty flag and intrusive recency links.
struct Frame {
    block_id: u64,
    data: Box<[u8]>,
    /// True when the in-memory content differs from the on-disk content.
    dirty: bool,
    /// Slot index of the next-less-recently-used frame, [`NIL`] at the LRU end.
    prev: usize,
    /// Slot index of the next-more-recently-used frame, [`NIL`] at the MRU end.
    next: usize,
}

impl Frame {
    fn new(block_id: u64) -> Self {
        Frame {
            block_id,
            data: vec![0; BLOCK_SIZE].into_boxed_slice(),
            dirty: false,
            prev: NIL,
            next: NIL,
        }
    }
}

/// LRU block cache over a random-access file.
///
/// Frames live in a fixed slot arena allocated lazily up to `capacity`.
/// A block-id map gives O(1) lookup; the frames themselves form an
/// intrusive doubly-linked recency list so promotion and eviction are
/// O(1) as well. The most recently touched slot is additionally kept in
/// a fast-path register, skipping the map for repeated same-block access.
pub struct BufferPool {
    file: fs::File,
    capacity: usize,
    /// Logical file length in bytes; grows when a write lands past the end.
    file_len: u64,
    frames: Vec<Frame>,
    map: HashMap<u64, usize>,
    /// Least-recently-used slot, evicted first.
    head: usize,
    /// Most-recently-used slot.
    tail: usize,
    /// Slot of the most recently touched block, [`NIL`] when invalidated.
    last_touched: usize,
    cache_hits: u64,
    disk_reads: u64,
    disk_writes: u64,
}

impl BufferPool {
    /// Opens (creating if absent) a random-access file with a budget of
    /// `capacity` in-memory blocks.
    ///
    /// # Arguments
    /// * `path` - File to be served through the pool
    /// * `capacity` - Maximum number of blocks kept in memory, at least 1
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, PoolError> {
        if capacity < 1 {
            return Err(PoolError::Config(format!(
                "buffer capacity must be at least 1, got {}",
                capacity
            )));
        }

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let file_len = file.metadata()?.len();

        log::info!(
            "opened {} ({} bytes, {} block buffers)",
            path.as_ref().display(),
            file_len,
            capacity
        );

        Ok(BufferPool {
            file,
            capacity,
            file_len,
            frames: Vec::new(),
            map: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            last_touched: NIL,
            cache_hits: 0,
            disk_reads: 0,
            disk_writes: 0,
        })
    }

    /// Reads `buf.len()` bytes starting at file offset `pos` into `buf`.
    /// The span must lie within a single block.
    pub fn read_into(&mut self, buf: &mut [u8], pos: u64) -> Result<(), PoolError> {
        let (block_id, offset) = locate(pos, buf.len())?;
        let slot = self.touch(block_id)?;
        buf.copy_from_slice(&self.frames[slot].data[offset..offset + buf.len()]);
        Ok(())
    }

    /// Writes `data` into the in-memory copy of the owning block at file
    /// offset `pos` and marks the block dirty. No disk write happens until
    /// the block is evicted or flushed. The span must lie within a single
    /// block.
    pub fn insert(&mut self, data: &[u8], pos: u64) -> Result<(), PoolError> {
        let (block_id, offset) = locate(pos, data.len())?;
        let slot = self.touch(block_id)?;

        let frame = &mut self.frames[slot];
        frame.data[offset..offset + data.len()].copy_from_slice(data);
        frame.dirty = true;

        self.file_len = self.file_len.max(pos + data.len() as u64);
        Ok(())
    }

    /// Writes every dirty block back to disk and clears its dirty flag.
    /// Idempotent.
    pub fn flush(&mut self) -> Result<(), PoolError> {
        for slot in 0..self.frames.len() {
            if self.frames[slot].dirty {
                self.write_back(slot)?;
            }
        }
        Ok(())
    }

    /// Flushes and releases the file handle.
    pub fn close(mut self) -> Result<(), PoolError> {
        self.flush()?;
        Ok(())
    }

    /// Logical file length in bytes, including not-yet-flushed writes past
    /// the on-disk end.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Number of accesses served from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Number of blocks loaded from disk.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads
    }

    /// Number of blocks written back to disk.
    pub fn disk_writes(&self) -> u64 {
        self.disk_writes
    }

    /// Returns the slot holding `block_id`, loading the block on a miss,
    /// and promotes it to the most-recently-used position.
    fn touch(&mut self, block_id: u64) -> Result<usize, PoolError> {
        // Fast path: repeated access to the most recently touched block
        // skips the map lookup. Still promotes, so recency stays exact.
        if self.last_touched != NIL && self.frames[self.last_touched].block_id == block_id {
            self.cache_hits += 1;
            self.promote(self.last_touched);
            return Ok(self.last_touched);
        }

        let slot = if let Some(&slot) = self.map.get(&block_id) {
            self.cache_hits += 1;
            self.promote(slot);
            slot
        } else {
            self.load(block_id)?
        };

        self.last_touched = slot;
        Ok(slot)
    }

    /// Loads a block from disk into a free slot, evicting the LRU block
    /// when the arena is at capacity.
    fn load(&mut self, block_id: u64) -> Result<usize, PoolError> {
        let slot = if self.frames.len() < self.capacity {
            self.frames.push(Frame::new(block_id));
            self.frames.len() - 1
        } else {
            self.evict()?
        };

        self.file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;

        let frame = &mut self.frames[slot];
        frame.block_id = block_id;
        frame.dirty = false;

        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.file.read(&mut frame.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        // A short tail block is zero-filled in memory only; the padding is
        // never written back unless the block is later dirtied, and even
        // then the write stops at the logical file length.
        frame.data[filled..].fill(0);

        self.disk_reads += 1;
        log::debug!("loaded block {} from disk ({} bytes)", block_id, filled);

        self.map.insert(block_id, slot);
        self.attach(slot);
        Ok(slot)
    }

    /// Evicts the block at the least-recently-used end of the recency list,
    /// writing it back first if dirty, and returns its freed slot.
    fn evict(&mut self) -> Result<usize, PoolError> {
        let slot = self.head;
        debug_assert!(slot != NIL, "eviction requested on an empty cache");

        let block_id = self.frames[slot].block_id;
        log::debug!("evicting block {} (dirty: {})", block_id, self.frames[slot].dirty);

        if self.frames[slot].dirty {
            self.write_back(slot)?;
        }

        self.detach(slot);
        self.map.remove(&block_id);
        if self.last_touched == slot {
            self.last_touched = NIL;
        }
        Ok(slot)
    }

    /// Writes the block in `slot` back to its block-aligned file offset,
    /// truncated to the logical file length so zero padding of a partial
    /// tail block never lands on disk.
    fn write_back(&mut self, slot: usize) -> Result<(), PoolError> {
        let start = self.frames[slot].block_id * BLOCK_SIZE as u64;
        let len = self.file_len.saturating_sub(start).min(BLOCK_SIZE as u64) as usize;

        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(&self.frames[slot].data[..len])?;

        self.frames[slot].dirty = false;
        self.disk_writes += 1;
        Ok(())
    }

    /// Unlinks `slot` from the recency list.
    fn detach(&mut self, slot: usize) {
        let prev = self.frames[slot].prev;
        let next = self.frames[slot].next;

        if prev == NIL {
            self.head = next;
        } else {
            self.frames[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.frames[next].prev = prev;
        }

        self.frames[slot].prev = NIL;
        self.frames[slot].next = NIL;
    }

    /// Links `slot` in at the most-recently-used end of the recency list.
    fn attach(&mut self, slot: usize) {
        self.frames[slot].prev = self.tail;
        self.frames[slot].next = NIL;

        if self.tail == NIL {
            self.head = slot;
        } else {
            self.frames[self.tail].next = slot;
        }
        self.tail = slot;
    }

    fn promote(&mut self, slot: usize) {
        if self.tail == slot {
            return;
        }
        self.detach(slot);
        self.attach(slot);
    }
}

impl Drop for BufferPool {
    /// Best-effort flush so the handle is never released with dirty blocks
    /// silently dropped. [`BufferPool::close`] leaves nothing dirty, making
    /// this a no-op on the normal path.
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::warn!("flush on drop failed: {}", err);
        }
    }
}

/// Maps a byte span to its owning block id and in-block offset.
/// Spans crossing a block boundary are rejected.
fn locate(pos: u64, len: usize) -> Result<(u64, usize), PoolError> {
    let block_id = pos / BLOCK_SIZE as u64;
    let offset = (pos % BLOCK_SIZE as u64) as usize;

    if offset + len > BLOCK_SIZE {
        return Err(PoolError::UnalignedAccess { pos, len });
    }
    Ok((block_id, offset))
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::PathBuf;

    use rstest::*;

    use super::{BufferPool, PoolError};
    use crate::record::{self, BLOCK_SIZE, RECORD_SIZE};

    /// Writes `blocks` full blocks of records where record `i` carries
    /// key `i % 1000` and value `i % 100`.
    fn record_file(dir: &tempfile::TempDir, blocks: usize) -> PathBuf {
        let path = dir.path().join("pool.bin");
        let mut bytes = Vec::with_capacity(blocks * BLOCK_SIZE);
        for i in 0..blocks * (BLOCK_SIZE / RECORD_SIZE) {
            bytes.extend_from_slice(&record::encode((i % 1000) as i16, (i % 100) as i16));
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_read_and_write(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 1);
        let mut pool = BufferPool::open(&path, 2).unwrap();

        let mut rec = [0u8; RECORD_SIZE];
        pool.read_into(&mut rec, 0).unwrap();
        assert_eq!(record::key(&rec), 0);

        pool.insert(&record::encode(9000, 9999), 0).unwrap();
        pool.flush().unwrap();

        let mut check = [0u8; RECORD_SIZE];
        pool.read_into(&mut check, 0).unwrap();
        assert_eq!(record::key(&check), 9000);
        assert_eq!(record::value(&check), 9999);
        pool.close().unwrap();

        // flushed content is visible outside the pool
        let on_disk = fs::read(&path).unwrap();
        assert_eq!(record::key(&on_disk[0..4]), 9000);
    }

    #[rstest]
    fn test_lru_eviction_bookkeeping(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 3);
        let mut pool = BufferPool::open(&path, 2).unwrap();
        let mut rec = [0u8; RECORD_SIZE];

        // three first-touch misses; the third evicts block 0
        pool.read_into(&mut rec, 0).unwrap();
        pool.read_into(&mut rec, BLOCK_SIZE as u64).unwrap();
        pool.read_into(&mut rec, 2 * BLOCK_SIZE as u64).unwrap();
        assert_eq!(pool.cache_hits(), 0);
        assert_eq!(pool.disk_reads(), 3);

        // block 0 was evicted, so re-touching it is a reload, not a hit
        pool.read_into(&mut rec, 0).unwrap();
        assert_eq!(pool.cache_hits(), 0);
        assert_eq!(pool.disk_reads(), 4);

        // a repeated access to the same block is a hit
        pool.read_into(&mut rec, RECORD_SIZE as u64).unwrap();
        assert_eq!(pool.cache_hits(), 1);
        assert_eq!(pool.disk_reads(), 4);

        pool.close().unwrap();
    }

    #[rstest]
    fn test_hit_promotes_block(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 3);
        let mut pool = BufferPool::open(&path, 2).unwrap();
        let mut rec = [0u8; RECORD_SIZE];

        pool.read_into(&mut rec, 0).unwrap(); // block 0
        pool.read_into(&mut rec, BLOCK_SIZE as u64).unwrap(); // block 1
        pool.read_into(&mut rec, RECORD_SIZE as u64).unwrap(); // block 0 again, now MRU
        pool.read_into(&mut rec, 2 * BLOCK_SIZE as u64).unwrap(); // evicts block 1

        // block 0 must still be cached
        let hits = pool.cache_hits();
        pool.read_into(&mut rec, 0).unwrap();
        assert_eq!(pool.cache_hits(), hits + 1);
        pool.close().unwrap();
    }

    #[rstest]
    fn test_dirty_write_back_on_eviction(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 2);
        let mut pool = BufferPool::open(&path, 1).unwrap();
        let mut rec = [0u8; RECORD_SIZE];

        pool.insert(&record::encode(-123, 456), 0).unwrap();
        assert_eq!(pool.disk_writes(), 0);

        // touching block 1 evicts dirty block 0, forcing a write-back
        pool.read_into(&mut rec, BLOCK_SIZE as u64).unwrap();
        assert_eq!(pool.disk_writes(), 1);

        // the reload reflects the overwritten value, not the original
        pool.read_into(&mut rec, 0).unwrap();
        assert_eq!(record::key(&rec), -123);
        assert_eq!(record::value(&rec), 456);
        pool.close().unwrap();
    }

    #[rstest]
    fn test_flush_is_idempotent(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 1);
        let mut pool = BufferPool::open(&path, 2).unwrap();

        pool.insert(&record::encode(1, 1), 0).unwrap();
        pool.flush().unwrap();
        assert_eq!(pool.disk_writes(), 1);

        // nothing dirty, nothing written
        pool.flush().unwrap();
        assert_eq!(pool.disk_writes(), 1);
        pool.close().unwrap();
    }

    #[rstest]
    #[case(4092, 8)]
    #[case(4094, 4)]
    #[case(0, 4097)]
    fn test_rejects_block_straddling_span(
        tmp_dir: tempfile::TempDir,
        #[case] pos: u64,
        #[case] len: usize,
    ) {
        let path = record_file(&tmp_dir, 2);
        let mut pool = BufferPool::open(&path, 2).unwrap();

        let mut buf = vec![0u8; len];
        let result = pool.read_into(&mut buf, pos);
        assert!(matches!(result, Err(PoolError::UnalignedAccess { .. })));
        pool.close().unwrap();
    }

    #[rstest]
    fn test_rejects_zero_capacity(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("any.bin");
        assert!(matches!(BufferPool::open(&path, 0), Err(PoolError::Config(_))));
    }

    #[rstest]
    fn test_partial_tail_block_not_padded_on_disk(tmp_dir: tempfile::TempDir) {
        // one record only: far shorter than a block
        let path = tmp_dir.path().join("tiny.bin");
        fs::write(&path, record::encode(7, 7)).unwrap();

        let mut pool = BufferPool::open(&path, 1).unwrap();
        let mut rec = [0u8; RECORD_SIZE];
        pool.read_into(&mut rec, 0).unwrap();
        assert_eq!(record::key(&rec), 7);

        // the zero-filled tail is visible in memory
        pool.read_into(&mut rec, 8).unwrap();
        assert_eq!(rec, [0u8; RECORD_SIZE]);

        // dirtying the block still writes only the logical length
        pool.insert(&record::encode(3, 3), 0).unwrap();
        pool.close().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), RECORD_SIZE as u64);
    }

    #[rstest]
    fn test_write_past_end_extends_file(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("grow.bin");
        fs::write(&path, record::encode(1, 1)).unwrap();

        let mut pool = BufferPool::open(&path, 1).unwrap();
        pool.insert(&record::encode(2, 2), RECORD_SIZE as u64).unwrap();
        assert_eq!(pool.file_len(), 2 * RECORD_SIZE as u64);
        pool.close().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 2 * RECORD_SIZE);
        assert_eq!(record::key(&bytes[4..8]), 2);
    }

    #[rstest]
    fn test_drop_flushes_dirty_blocks(tmp_dir: tempfile::TempDir) {
        let path = record_file(&tmp_dir, 1);
        {
            let mut pool = BufferPool::open(&path, 1).unwrap();
            pool.insert(&record::encode(42, 0), 0).unwrap();
            // dropped without close()
        }
        let bytes = fs::read(&path).unwrap();
        assert_eq!(record::key(&bytes[0..4]), 42);
    }
}
