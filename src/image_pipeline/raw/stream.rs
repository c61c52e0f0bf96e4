//! Byte sources the decoders read from.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub trait DataStream: Read + Seek {
    /// Current position.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn eof(&mut self) -> io::Result<bool>;

    /// Name of the underlying file, if any.
    fn fname(&self) -> Option<&Path>;

    /// Reads exactly `buf.len()` bytes.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

/// In-memory stream over an owned buffer.
pub struct BufferStream {
    cursor: Cursor<Vec<u8>>,
}

impl BufferStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { cursor: Cursor::new(data) }
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for BufferStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for BufferStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl DataStream for BufferStream {
    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.cursor.position() >= self.cursor.get_ref().len() as u64)
    }

    fn fname(&self) -> Option<&Path> {
        None
    }
}

/// Buffered stream over a file on disk.
pub struct FileStream {
    reader: BufReader<File>,
    path: PathBuf,
    len: u64,
}

impl FileStream {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { reader: BufReader::new(file), path, len })
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl DataStream for FileStream {
    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.reader.stream_position()? >= self.len)
    }

    fn fname(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_buffer_stream_eof() {
        let mut stream = BufferStream::new(vec![1, 2, 3]);
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert!(!stream.eof().unwrap());
        assert_eq!(stream.tell().unwrap(), 2);
        stream.read_exact(&mut buf[..1]).unwrap();
        assert!(stream.eof().unwrap());
        assert!(stream.fname().is_none());
    }

    #[test]
    fn test_file_stream_reads_at_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0, 1, 2, 3, 4, 5]).unwrap();
        file.flush().unwrap();

        let mut stream = FileStream::open(file.path()).unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact_at(3, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        assert_eq!(stream.fname(), Some(file.path()));

        let short = stream.read_exact_at(5, &mut buf).unwrap_err();
        assert_eq!(short.kind(), io::ErrorKind::UnexpectedEof);
    }
}
