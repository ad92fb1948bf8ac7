//! Linear sortedness check.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::record::{self, RECORD_SIZE};

/// Scans the file once and reports whether every adjacent record pair has
/// a non-decreasing key. Files of zero or one records are sorted by
/// definition. A file length that is not a multiple of the record size is
/// an [`io::ErrorKind::InvalidData`] error.
pub fn is_sorted(path: impl AsRef<Path>) -> io::Result<bool> {
    let file = fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len % RECORD_SIZE as u64 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("file length {} is not a multiple of the record size", len),
        ));
    }

    let mut reader = io::BufReader::new(file);
    let mut rec = [0u8; RECORD_SIZE];
    let mut prev: Option<i16> = None;

    for _ in 0..len / RECORD_SIZE as u64 {
        reader.read_exact(&mut rec)?;
        let key = record::key(&rec);
        if let Some(prev) = prev {
            if key < prev {
                return Ok(false);
            }
        }
        prev = Some(key);
    }
    Ok(true)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io;
    use std::path::Path;

    use rstest::*;

    use super::is_sorted;
    use crate::record;

    fn write_keys(path: &Path, keys: &[i16]) {
        let mut bytes = Vec::new();
        for &key in keys {
            bytes.extend_from_slice(&record::encode(key, 0));
        }
        fs::write(path, bytes).unwrap();
    }

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    #[case(&[], true)]
    #[case(&[5], true)]
    #[case(&[1, 2, 2, 3], true)]
    #[case(&[-3, -1, 0, 7], true)]
    #[case(&[2, 1], false)]
    #[case(&[1, 2, 3, 2], false)]
    fn test_is_sorted(tmp_dir: tempfile::TempDir, #[case] keys: &[i16], #[case] expected: bool) {
        let path = tmp_dir.path().join("check.bin");
        write_keys(&path, keys);

        assert_eq!(is_sorted(&path).unwrap(), expected);
    }

    #[rstest]
    fn test_ragged_length_is_rejected(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("ragged.bin");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        let err = is_sorted(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
