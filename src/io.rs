use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::VideoEncodeError;

/// Where the compressed bitstream should go (owned or borrowed path, or any
/// caller-supplied writer).
pub enum SinkSpec<'a> {
    FilePath(Cow<'a, Path>),
    WriteStream { stream: Box<dyn Write + Send + 'a> },
}

impl<'a> SinkSpec<'a> {
    pub fn from_write<T: Write + Send + 'a>(s: T) -> Self {
        SinkSpec::WriteStream { stream: Box::new(s) }
    }
}

impl<'a> From<&'a str> for SinkSpec<'a> {
    fn from(s: &'a str) -> Self { SinkSpec::FilePath(Cow::Borrowed(Path::new(s))) }
}
impl From<String> for SinkSpec<'_> {
    fn from(s: String) -> Self { SinkSpec::FilePath(Cow::Owned(PathBuf::from(s))) }
}
impl<'a> From<&'a Path> for SinkSpec<'a> {
    fn from(p: &'a Path) -> Self { SinkSpec::FilePath(Cow::Borrowed(p)) }
}
impl From<PathBuf> for SinkSpec<'_> {
    fn from(p: PathBuf) -> Self { SinkSpec::FilePath(Cow::Owned(p)) }
}

/// An open, binary, append-only output sink.
pub enum OutputSink<'a> {
    File(BufWriter<File>),
    Stream(Box<dyn Write + Send + 'a>),
}

impl<'a> OutputSink<'a> {
    /// Open the sink for binary writing. Failing to open the file is fatal and
    /// non-retriable for the session that owns this sink.
    pub fn open(spec: SinkSpec<'a>) -> Result<Self, VideoEncodeError> {
        match spec {
            SinkSpec::FilePath(path) => {
                let file = File::create(path.as_ref()).map_err(|e| {
                    log::error!("Could not open {:?}: {e}", path.as_ref());
                    VideoEncodeError::SinkOpen(e)
                })?;
                Ok(OutputSink::File(BufWriter::new(file)))
            }
            SinkSpec::WriteStream { stream } => Ok(OutputSink::Stream(stream)),
        }
    }

    /// Append bytes verbatim.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), VideoEncodeError> {
        match self {
            OutputSink::File(w) => w.write_all(bytes)?,
            OutputSink::Stream(w) => w.write_all(bytes)?,
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), VideoEncodeError> {
        match self {
            OutputSink::File(w) => w.flush()?,
            OutputSink::Stream(w) => w.flush()?,
        }
        Ok(())
    }
}
