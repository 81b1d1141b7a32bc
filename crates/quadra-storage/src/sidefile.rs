//! Index side-files: persisted snapshots of an Ordered or Point Index.
//!
//! Layout (little-endian):
//! ```text
//! +------------------------+
//! | magic: [u8; 4] "QIDX"  |
//! | version: u16           |
//! | kind: u8               |
//! | bucket_count: u32      |  0 for ordered
//! | entry_count: u64       |
//! +------------------------+
//! | key_len: u16           |  repeated entry_count times
//! | key: [u8; key_len]     |
//! | location: u64          |
//! +------------------------+
//! | crc32: u32             |  over every preceding byte
//! +------------------------+
//! ```

use crate::log::{write_atomic, Location};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use quadra_common::{QuadraError, Result};
use std::path::Path;

const MAGIC: &[u8; 4] = b"QIDX";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 1 + 4 + 8;
const CHECKSUM_SIZE: usize = 4;

/// Which index a side-file snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexKind {
    Ordered = 0,
    Hash = 1,
}

impl TryFrom<u8> for IndexKind {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Ordered),
            1 => Ok(Self::Hash),
            other => Err(format!("unknown index kind {}", other)),
        }
    }
}

/// Decoded contents of a side-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideFile {
    pub kind: IndexKind,
    pub bucket_count: u32,
    pub entries: Vec<(String, Location)>,
}

impl SideFile {
    /// Serializes the snapshot with its checksum trailer.
    pub fn encode(&self) -> Result<Bytes> {
        let body: usize = self.entries.iter().map(|(k, _)| 2 + k.len() + 8).sum();
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body + CHECKSUM_SIZE);

        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u8(self.kind as u8);
        buf.put_u32_le(self.bucket_count);
        buf.put_u64_le(self.entries.len() as u64);

        for (key, loc) in &self.entries {
            let len = u16::try_from(key.len())
                .map_err(|_| QuadraError::InvalidKey(format!("key of {} bytes", key.len())))?;
            buf.put_u16_le(len);
            buf.put_slice(key.as_bytes());
            buf.put_u64_le(loc.0);
        }

        let checksum = crc32fast::hash(&buf);
        buf.put_u32_le(checksum);
        Ok(buf.freeze())
    }

    /// Parses and verifies a snapshot. `path` is only used in errors.
    pub fn decode(path: &Path, data: &[u8]) -> Result<Self> {
        let corrupted = |reason: String| QuadraError::SideFileCorrupted {
            path: path.to_path_buf(),
            reason,
        };

        if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(corrupted(format!("file too short: {} bytes", data.len())));
        }

        let (body, mut trailer) = data.split_at(data.len() - CHECKSUM_SIZE);
        let stored = trailer.get_u32_le();
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(corrupted(format!(
                "checksum mismatch: stored={}, computed={}",
                stored, computed
            )));
        }

        let mut cur = body;
        if &cur[..4] != MAGIC {
            return Err(corrupted("bad magic".to_string()));
        }
        cur.advance(4);
        let version = cur.get_u16_le();
        if version != VERSION {
            return Err(corrupted(format!("unsupported version {}", version)));
        }
        let kind = IndexKind::try_from(cur.get_u8()).map_err(corrupted)?;
        let bucket_count = cur.get_u32_le();
        let count = cur.get_u64_le();

        let mut entries = Vec::new();
        for i in 0..count {
            if cur.remaining() < 2 {
                return Err(corrupted(format!("truncated at entry {}", i)));
            }
            let len = cur.get_u16_le() as usize;
            if cur.remaining() < len + 8 {
                return Err(corrupted(format!("truncated at entry {}", i)));
            }
            let key = std::str::from_utf8(&cur[..len])
                .map_err(|_| corrupted(format!("entry {} key is not UTF-8", i)))?
                .to_string();
            cur.advance(len);
            let loc = Location(cur.get_u64_le());
            entries.push((key, loc));
        }
        if cur.has_remaining() {
            return Err(corrupted(format!("{} trailing bytes", cur.remaining())));
        }

        Ok(Self {
            kind,
            bucket_count,
            entries,
        })
    }

    /// Writes the snapshot to `path` atomically.
    pub fn write(&self, path: &Path, fsync: bool) -> Result<()> {
        let data = self.encode()?;
        write_atomic(path, &data, fsync)
    }

    /// Reads the snapshot at `path`. Returns `Ok(None)` if it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match std::fs::read(path) {
            Ok(data) => Self::decode(path, &data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> SideFile {
        SideFile {
            kind: IndexKind::Hash,
            bucket_count: 101,
            entries: vec![
                ("S001".to_string(), Location(0)),
                ("S002".to_string(), Location(7)),
            ],
        }
    }

    #[test]
    fn test_write_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.hash");
        sample().write(&path, false).unwrap();

        let loaded = SideFile::read(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_missing_is_none() {
        let dir = tempdir().unwrap();
        assert!(SideFile::read(&dir.path().join("none.idx")).unwrap().is_none());
    }

    #[test]
    fn test_checksum_mismatch() {
        let path = Path::new("students.hash");
        let mut data = sample().encode().unwrap().to_vec();
        data[HEADER_SIZE + 3] ^= 0xff;

        let err = SideFile::decode(path, &data).unwrap_err();
        assert!(matches!(err, QuadraError::SideFileCorrupted { ref reason, .. } if reason.contains("checksum")));
    }

    #[test]
    fn test_truncated() {
        let path = Path::new("students.idx");
        let data = sample().encode().unwrap();
        assert!(SideFile::decode(path, &data[..10]).is_err());
        assert!(SideFile::decode(path, &data[..data.len() - 1]).is_err());
    }

    #[test]
    fn test_bad_magic_with_valid_checksum() {
        let path = Path::new("x.idx");
        let mut body = sample().encode().unwrap().to_vec();
        body.truncate(body.len() - CHECKSUM_SIZE);
        body[0] = b'Z';
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());

        let err = SideFile::decode(path, &body).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_key_too_long() {
        let side = SideFile {
            kind: IndexKind::Ordered,
            bucket_count: 0,
            entries: vec![("k".repeat(70_000), Location(0))],
        };
        assert!(matches!(side.encode(), Err(QuadraError::InvalidKey(_))));
    }
}
