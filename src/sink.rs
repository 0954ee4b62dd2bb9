use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{EdfError, Result};

/// Output destination of an encoding session
///
/// Besides plain writing a session needs two things from its sink: a way to
/// overwrite a few header bytes that were already written (used only when
/// the final record count differs from what the header announced), and a
/// way to get rid of partial output when the session fails.
pub trait RecordSink: Write {
    /// Overwrites `bytes` at absolute `offset`, leaving the write position
    /// at the end of the output
    fn patch(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Removes everything written so far; further writes fail
    fn discard(&mut self) -> io::Result<()>;
}

fn discarded() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "output was discarded")
}

/// Buffered file output
///
/// Discarding deletes the file.
///
/// ```rust
/// use vitaledf::FileSink;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("night.edf");
///
/// let sink = FileSink::create(&path)?;
/// assert_eq!(sink.path(), path.as_path());
///
/// // the path is taken now
/// assert!(FileSink::create(&path).is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSink {
    /// Creates a new file; an existing file at `path` is an error
    ///
    /// # Errors
    ///
    /// * `EdfError::SinkOpen` - the path exists, or cannot be created
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        Self::open_with(path.as_ref(), &options)
    }

    /// Creates the file, truncating an existing one
    pub fn create_overwrite<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        Self::open_with(path.as_ref(), &options)
    }

    fn open_with(path: &Path, options: &OpenOptions) -> Result<Self> {
        let file = options.open(path).map_err(|source| EdfError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("opened EDF output {}", path.display());

        Ok(FileSink {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file.as_mut().ok_or_else(discarded)
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl RecordSink for FileSink {
    fn patch(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let writer = self.writer()?;
        writer.flush()?;

        let file = writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn discard(&mut self) -> io::Result<()> {
        if let Some(writer) = self.file.take() {
            // 缓冲区内容不再需要，直接关闭文件
            let (file, _) = writer.into_parts();
            drop(file);
            match fs::remove_file(&self.path) {
                Ok(()) => log::warn!("removed partial EDF output {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// In-memory output
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buffer: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RecordSink for MemorySink {
    fn patch(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let end = start + bytes.len();
        if end > self.buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("patch {}..{} outside output of {} bytes", start, end, self.buffer.len()),
            ));
        }
        self.buffer[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn discard(&mut self) -> io::Result<()> {
        self.buffer.clear();
        Ok(())
    }
}

/// Forward-only output over any writer (pipe, socket, stdout)
///
/// A stream cannot be rewritten, so sessions on it must announce the
/// record count upfront through `EncoderConfig::planned_records` and write
/// exactly that many records. Bytes already delivered cannot be taken back;
/// discarding only stops further output.
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    inner: W,
    discarded: bool,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        StreamSink { inner, discarded: false }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StreamSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.discarded {
            return Err(discarded());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.discarded {
            return Err(discarded());
        }
        self.inner.flush()
    }
}

impl<W: Write> RecordSink for StreamSink<W> {
    fn patch(&mut self, _offset: u64, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream output cannot be rewritten",
        ))
    }

    fn discard(&mut self) -> io::Result<()> {
        if !self.discarded {
            log::warn!("EDF stream abandoned, output already sent is incomplete");
        }
        self.discarded = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_file_sink_patch_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.edf");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_all(b"0123456789").unwrap();
        sink.patch(2, b"ab").unwrap();
        sink.write_all(b"XY").unwrap();
        sink.flush().unwrap();
        drop(sink);

        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "01ab456789XY");
    }

    #[test]
    fn test_file_sink_create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.edf");
        fs::write(&path, b"keep me").unwrap();

        let err = FileSink::create(&path).unwrap_err();
        assert!(matches!(err, EdfError::SinkOpen { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");

        let mut sink = FileSink::create_overwrite(&path).unwrap();
        sink.write_all(b"new").unwrap();
        sink.flush().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_file_sink_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.edf");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_all(&[0u8; 1000]).unwrap();
        sink.discard().unwrap();

        assert!(!path.exists());
        assert!(sink.write_all(b"more").is_err());
        assert!(sink.discard().is_ok());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_all(b"hello world").unwrap();
        sink.patch(0, b"J").unwrap();
        assert_eq!(sink.as_bytes(), b"Jello world");
        assert!(sink.patch(10, b"xx").is_err());

        sink.discard().unwrap();
        assert!(sink.as_bytes().is_empty());
    }

    #[test]
    fn test_stream_sink_cannot_patch() {
        let mut sink = StreamSink::new(Vec::new());
        sink.write_all(b"abc").unwrap();
        let err = sink.patch(0, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        sink.discard().unwrap();
        assert!(sink.is_discarded());
        assert!(sink.write_all(b"d").is_err());
        assert_eq!(sink.into_inner(), b"abc");
    }
}
