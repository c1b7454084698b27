//! Disk-resident record files and levelized files.
//!
//! A [`RecordFile`] is an immutable sequence of fixed-width records in a temporary file. It is
//! produced by a [`RecordWriter`], which has exclusive access until [`RecordWriter::finish`]
//! consumes it; only then can [`RecordReader`]s attach. The temporary file is removed when the
//! last owner drops.
//!
//! A [`LevelizedFile`] bundles one or more record files with per-level metadata and cut
//! statistics behind a shared, thread-safe reference count.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::arc::Arc;
use crate::cut::Cuts;
use crate::node::Node;
use crate::types::LevelInfo;

/// Number of records fetched from disk at once by a reader.
pub const BLOCK_RECORDS: usize = 1024;

/// A fixed-width record that can live in a [`RecordFile`].
pub trait Record: Copy + Serialize + DeserializeOwned {
    /// Encoded size in bytes.
    const SIZE: usize;
}

impl Record for Node {
    const SIZE: usize = 24;
}

impl Record for Arc {
    const SIZE: usize = 16;
}

impl Record for LevelInfo {
    const SIZE: usize = 12;
}

/// Reading order of a [`RecordReader`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// In the order the records were written.
    Forward,
    /// Last written record first.
    Reverse,
}

pub(crate) fn temp_file() -> io::Result<NamedTempFile> {
    tempfile::Builder::new().prefix("sweepdd-").tempfile()
}

/// Memory used by one open reader or writer of `T`.
pub fn stream_memory<T: Record>() -> usize {
    BLOCK_RECORDS * T::SIZE
}

/// An immutable file of records.
pub struct RecordFile<T> {
    file: NamedTempFile,
    len: u64,
    _marker: PhantomData<T>,
}

impl<T: Record> RecordFile<T> {
    /// Writes all `records` into a fresh file.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> io::Result<Self> {
        let mut writer = RecordWriter::new()?;
        for rec in records {
            writer.push(&rec)?;
        }
        writer.finish()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attaches a new reader with its own file cursor.
    pub fn reader(&self, direction: Direction) -> io::Result<RecordReader<T>> {
        Ok(RecordReader {
            file: self.file.reopen()?,
            len: self.len,
            fetched: 0,
            direction,
            buffer: VecDeque::new(),
            _marker: PhantomData,
        })
    }

    /// Reads all records into memory.
    pub fn to_vec(&self) -> io::Result<Vec<T>> {
        let mut reader = self.reader(Direction::Forward)?;
        let mut res = Vec::with_capacity(self.len as usize);
        while reader.can_pull() {
            res.push(reader.pull()?);
        }
        Ok(res)
    }
}

/// The exclusive, append-only writer of a [`RecordFile`].
pub struct RecordWriter<T> {
    file: NamedTempFile,
    out: BufWriter<File>,
    len: u64,
    _marker: PhantomData<T>,
}

impl<T: Record> RecordWriter<T> {
    pub fn new() -> io::Result<Self> {
        let file = temp_file()?;
        let out = BufWriter::with_capacity(BLOCK_RECORDS * T::SIZE, file.reopen()?);
        Ok(Self {
            file,
            out,
            len: 0,
            _marker: PhantomData,
        })
    }

    pub fn push(&mut self, rec: &T) -> io::Result<()> {
        bincode::serialize_into(&mut self.out, rec).map_err(io::Error::other)?;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Detaches the writer, turning the file read-only.
    pub fn finish(mut self) -> io::Result<RecordFile<T>> {
        self.out.flush()?;
        Ok(RecordFile {
            file: self.file,
            len: self.len,
            _marker: PhantomData,
        })
    }
}

/// A buffered cursor over a [`RecordFile`].
pub struct RecordReader<T> {
    file: File,
    len: u64,
    fetched: u64,
    direction: Direction,
    buffer: VecDeque<T>,
    _marker: PhantomData<T>,
}

impl<T: Record> RecordReader<T> {
    pub fn can_pull(&self) -> bool {
        !self.buffer.is_empty() || self.fetched < self.len
    }

    /// Returns the next record.
    ///
    /// # Panics
    ///
    /// Panics when reading past the end.
    pub fn pull(&mut self) -> io::Result<T> {
        self.fill()?;
        match self.buffer.pop_front() {
            Some(rec) => Ok(rec),
            None => panic!("Cannot pull past the end of a file of {} records", self.len),
        }
    }

    /// Returns the next record without consuming it.
    ///
    /// # Panics
    ///
    /// Panics when reading past the end.
    pub fn peek(&mut self) -> io::Result<T> {
        self.fill()?;
        match self.buffer.front() {
            Some(&rec) => Ok(rec),
            None => panic!("Cannot peek past the end of a file of {} records", self.len),
        }
    }

    /// Number of records not yet pulled.
    pub fn remaining(&self) -> u64 {
        self.len - self.fetched + self.buffer.len() as u64
    }

    fn fill(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() || self.fetched == self.len {
            return Ok(());
        }
        let unread = self.len - self.fetched;
        let count = unread.min(BLOCK_RECORDS as u64);
        let start = match self.direction {
            Direction::Forward => self.fetched,
            Direction::Reverse => unread - count,
        };
        self.file.seek(SeekFrom::Start(start * T::SIZE as u64))?;
        let mut bytes = vec![0u8; count as usize * T::SIZE];
        self.file.read_exact(&mut bytes)?;
        for chunk in bytes.chunks_exact(T::SIZE) {
            let rec: T = bincode::deserialize(chunk).map_err(io::Error::other)?;
            match self.direction {
                Direction::Forward => self.buffer.push_back(rec),
                Direction::Reverse => self.buffer.push_front(rec),
            }
        }
        self.fetched += count;
        Ok(())
    }
}

/// Statistics of a levelized file, fixed once its writer detaches.
#[derive(Debug, Clone, Default)]
pub struct FileStats {
    /// Number of arcs to the `false` and `true` terminal.
    pub number_of_terminals: [u64; 2],
    pub max_1level_cut: Cuts,
    pub max_2level_cut: Cuts,
    /// Whether the nodes are sorted and numbered as Reduce outputs them.
    pub canonical: bool,
    /// Width of the widest level.
    pub width: u64,
}

struct Contents<T> {
    parts: Vec<RecordFile<T>>,
    levels: RecordFile<LevelInfo>,
    stats: FileStats,
}

/// A shared, immutable levelized file.
///
/// Cloning only bumps the reference count.
pub struct LevelizedFile<T> {
    contents: std::sync::Arc<Contents<T>>,
}

impl<T> Clone for LevelizedFile<T> {
    fn clone(&self) -> Self {
        Self {
            contents: std::sync::Arc::clone(&self.contents),
        }
    }
}

/// Levelized file of nodes, i.e. a reduced diagram.
pub type NodeFile = LevelizedFile<Node>;

/// Levelized file of arcs, i.e. an unreduced diagram.
///
/// Part 0 holds the arcs between nodes (ascending by target), part 1 the arcs to terminals
/// written in order of their source, and part 2 those that were written out of order (sorted
/// by source once the writer detached).
pub type ArcFile = LevelizedFile<Arc>;

impl<T: Record> LevelizedFile<T> {
    pub(crate) fn new(parts: Vec<RecordFile<T>>, levels: RecordFile<LevelInfo>, stats: FileStats) -> Self {
        Self {
            contents: std::sync::Arc::new(Contents { parts, levels, stats }),
        }
    }

    pub fn part(&self, index: usize) -> &RecordFile<T> {
        &self.contents.parts[index]
    }

    pub fn parts(&self) -> usize {
        self.contents.parts.len()
    }

    pub fn levels(&self) -> &RecordFile<LevelInfo> {
        &self.contents.levels
    }

    /// Number of levels.
    pub fn level_count(&self) -> u64 {
        self.contents.levels.len()
    }

    pub fn stats(&self) -> &FileStats {
        &self.contents.stats
    }

    /// Total number of records.
    pub fn size(&self) -> u64 {
        self.contents.parts.iter().map(|p| p.len()).sum()
    }

    /// Whether both handles share the same underlying file.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(&self.contents, &other.contents)
    }

    /// Number of handles currently sharing this file.
    pub fn ref_count(&self) -> usize {
        std::sync::Arc::strong_count(&self.contents)
    }

    /// All level metadata, top level first.
    pub fn level_infos(&self) -> io::Result<Vec<LevelInfo>> {
        self.contents.levels.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ptr::Ptr;

    #[test]
    fn test_record_sizes() {
        let node = Node::new(1, 2, Ptr::FALSE, Ptr::TRUE);
        assert_eq!(bincode::serialized_size(&node).unwrap() as usize, Node::SIZE);
        let arc = Arc::new(Ptr::node(0, 0), Ptr::TRUE);
        assert_eq!(bincode::serialized_size(&arc).unwrap() as usize, Arc::SIZE);
        let info = LevelInfo::new(0, 1);
        assert_eq!(bincode::serialized_size(&info).unwrap() as usize, LevelInfo::SIZE);
    }

    #[test]
    fn test_forward_and_reverse() {
        let infos: Vec<_> = (0..2500).map(|i| LevelInfo::new(i, 1 + i as u64)).collect();
        let file = RecordFile::from_records(infos.iter().copied()).unwrap();
        assert_eq!(file.len(), 2500);

        let mut fwd = file.reader(Direction::Forward).unwrap();
        for info in &infos {
            assert_eq!(fwd.peek().unwrap(), *info);
            assert_eq!(fwd.pull().unwrap(), *info);
        }
        assert!(!fwd.can_pull());

        let mut rev = file.reader(Direction::Reverse).unwrap();
        for info in infos.iter().rev() {
            assert_eq!(rev.pull().unwrap(), *info);
        }
        assert!(!rev.can_pull());
    }

    #[test]
    fn test_independent_readers() {
        let file = RecordFile::from_records((0..10).map(|i| LevelInfo::new(i, 1))).unwrap();
        let mut a = file.reader(Direction::Forward).unwrap();
        let mut b = file.reader(Direction::Forward).unwrap();
        assert_eq!(a.pull().unwrap().label, 0);
        assert_eq!(a.pull().unwrap().label, 1);
        assert_eq!(b.pull().unwrap().label, 0);
        assert_eq!(a.remaining(), 8);
        assert_eq!(b.remaining(), 9);
    }

    #[test]
    #[should_panic(expected = "Cannot pull past the end")]
    fn test_pull_past_end_panics() {
        let file = RecordFile::<LevelInfo>::from_records([]).unwrap();
        let mut reader = file.reader(Direction::Forward).unwrap();
        let _ = reader.pull();
    }

    #[test]
    fn test_shared_ownership() {
        let levels = RecordFile::from_records([LevelInfo::new(0, 1)]).unwrap();
        let part = RecordFile::from_records([Node::new(0, 0, Ptr::FALSE, Ptr::TRUE)]).unwrap();
        let file = NodeFile::new(vec![part], levels, FileStats::default());
        let other = file.clone();
        assert!(file.ptr_eq(&other));
        assert_eq!(file.ref_count(), 2);
        drop(other);
        assert_eq!(file.ref_count(), 1);
        assert_eq!(file.size(), 1);
        assert_eq!(file.level_count(), 1);
    }
}
