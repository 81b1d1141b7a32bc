//! Record Log: a line-oriented file of serialized entities.
//!
//! Each slot is one `\n`-terminated line. Appends extend the file in place.
//! Overwrites replace one line by rewriting the file to a temporary path and
//! renaming it over the original. An empty line marks an abandoned slot.
//! Slots are never reclaimed, so a Location stays valid for the life of the
//! log.

use quadra_common::{QuadraError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Opaque handle to a slot in a [`RecordLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location(pub(crate) u64);

impl Location {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Writes `data` to `path` atomically: temporary file, optional fsync, rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8], fsync: bool) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    if fsync {
        file.sync_all()?;
    }
    drop(file);
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Line-oriented append/overwrite store.
#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    lines: Vec<String>,
    file: File,
    fsync: bool,
}

impl RecordLog {
    /// Opens or creates the log at `path`.
    ///
    /// A trailing fragment without a newline is the remnant of an interrupted
    /// append. It is dropped and the file rewritten without it.
    pub fn open(path: impl Into<PathBuf>, fsync: bool) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let text = String::from_utf8(content).map_err(|e| {
            QuadraError::codec("RecordLog", format!("{} is not UTF-8: {}", path.display(), e))
        })?;

        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        // split yields one piece after the final newline: empty unless torn
        let tail = lines.pop().unwrap_or_default();
        let torn = !tail.is_empty();
        if torn {
            warn!(
                path = %path.display(),
                bytes = tail.len(),
                "Dropping torn record at end of log"
            );
            write_atomic(&path, Self::render(&lines).as_bytes(), fsync)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            lines,
            file,
            fsync,
        })
    }

    fn render(lines: &[String]) -> String {
        let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn check_line(line: &str) -> Result<()> {
        if line.contains('\n') {
            return Err(QuadraError::codec("RecordLog", "record contains a raw newline"));
        }
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of slots, live or abandoned.
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of live slots.
    pub fn live_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_empty()).count()
    }

    /// Appends a record and returns its new Location.
    pub fn append(&mut self, line: &str) -> Result<Location> {
        Self::check_line(line)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.file.write_all(buf.as_bytes())?;
        if self.fsync {
            self.file.sync_data()?;
        }
        self.lines.push(line.to_string());
        Ok(Location(self.lines.len() as u64 - 1))
    }

    /// Replaces the record at `loc`.
    pub fn overwrite(&mut self, loc: Location, line: &str) -> Result<()> {
        Self::check_line(line)?;
        let Some(slot) = self.lines.get_mut(loc.index()) else {
            return Err(QuadraError::RecordNotFound { location: loc.0 });
        };
        let previous = std::mem::replace(slot, line.to_string());
        if let Err(e) = self.rewrite() {
            self.lines[loc.index()] = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Marks the slot at `loc` as abandoned.
    pub fn abandon(&mut self, loc: Location) -> Result<()> {
        self.overwrite(loc, "")
    }

    /// Reads the live record at `loc`.
    pub fn read(&self, loc: Location) -> Result<&str> {
        match self.lines.get(loc.index()) {
            Some(line) if !line.is_empty() => Ok(line.as_str()),
            _ => Err(QuadraError::RecordNotFound { location: loc.0 }),
        }
    }

    /// Live records in slot order.
    pub fn scan(&self) -> impl Iterator<Item = (Location, &str)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(i, line)| (Location(i as u64), line.as_str()))
    }

    /// Forces buffered appends to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn rewrite(&mut self) -> Result<()> {
        write_atomic(&self.path, Self::render(&self.lines).as_bytes(), self.fsync)?;
        // The old handle points at the replaced inode.
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let mut log = RecordLog::open(dir.path().join("s.dat"), false).unwrap();

        let a = log.append("alpha").unwrap();
        let b = log.append("beta").unwrap();
        assert_ne!(a, b);
        assert_eq!(log.read(a).unwrap(), "alpha");
        assert_eq!(log.read(b).unwrap(), "beta");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_other_slots() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.dat");
        let mut log = RecordLog::open(&path, false).unwrap();
        let a = log.append("one").unwrap();
        let b = log.append("two").unwrap();
        let c = log.append("three").unwrap();

        log.overwrite(b, "TWO").unwrap();
        assert_eq!(log.read(a).unwrap(), "one");
        assert_eq!(log.read(b).unwrap(), "TWO");
        assert_eq!(log.read(c).unwrap(), "three");

        // appends after a rewrite land in the new file
        let d = log.append("four").unwrap();
        drop(log);
        let log = RecordLog::open(&path, false).unwrap();
        assert_eq!(log.read(b).unwrap(), "TWO");
        assert_eq!(log.read(d).unwrap(), "four");
    }

    #[test]
    fn test_abandon_and_scan() {
        let dir = tempdir().unwrap();
        let mut log = RecordLog::open(dir.path().join("s.dat"), false).unwrap();
        let a = log.append("a").unwrap();
        let b = log.append("b").unwrap();
        log.abandon(a).unwrap();

        assert!(matches!(log.read(a), Err(QuadraError::RecordNotFound { location: 0 })));
        let live: Vec<_> = log.scan().collect();
        assert_eq!(live, vec![(b, "b")]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.live_count(), 1);
    }

    #[test]
    fn test_read_out_of_range() {
        let dir = tempdir().unwrap();
        let mut log = RecordLog::open(dir.path().join("s.dat"), false).unwrap();
        assert!(log.read(Location(9)).is_err());
        assert!(log.overwrite(Location(9), "x").is_err());
    }

    #[test]
    fn test_rejects_raw_newline() {
        let dir = tempdir().unwrap();
        let mut log = RecordLog::open(dir.path().join("s.dat"), false).unwrap();
        assert!(log.append("bad\nline").is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_torn_tail_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.dat");
        std::fs::write(&path, "first\nsecond\npart").unwrap();

        let mut log = RecordLog::open(&path, false).unwrap();
        assert_eq!(log.len(), 2);
        let loc = log.append("third").unwrap();
        assert_eq!(loc, Location(2));
        drop(log);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\nthird\n");
    }
}
