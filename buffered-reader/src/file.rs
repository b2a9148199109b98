use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::*;

/// Reads from a file.
///
/// This is a thin layer over [`Generic`] that remembers the path,
/// so that errors can be attributed to the file that caused them.
///
///   [`Generic`]: struct.Generic.html
pub struct File<C> {
    reader: Generic<fs::File, C>,
    path: PathBuf,
}

impl<C> fmt::Display for File<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "File {:?}", self.path.display())
    }
}

impl<C> fmt::Debug for File<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("reader", &self.reader)
            .finish()
    }
}

impl File<()> {
    /// Opens the given file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::with_cookie(path, ())
    }
}

impl<C> File<C> {
    /// Like `open()`, but sets a cookie.
    pub fn with_cookie<P: AsRef<Path>>(path: P, cookie: C) -> io::Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| {
            io::Error::new(e.kind(),
                           format!("{}: {}", path.display(), e))
        })?;

        Ok(File {
            reader: Generic::with_cookie(file, None, cookie),
            path: path.into(),
        })
    }

    /// Returns the path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Decorates I/O errors with the path.
    fn annotate(path: &Path, e: io::Error) -> io::Error {
        io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
    }
}

impl<C> io::Read for File<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let path = &self.path;
        self.reader.read(buf).map_err(|e| Self::annotate(path, e))
    }
}

impl<C> BufferedReader<C> for File<C> {
    fn buffer(&self) -> &[u8] {
        self.reader.buffer()
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        let path = &self.path;
        self.reader.data(amount).map_err(|e| Self::annotate(path, e))
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        let path = &self.path;
        self.reader.data_hard(amount).map_err(|e| Self::annotate(path, e))
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.reader.consume(amount)
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        let path = &self.path;
        self.reader.data_consume(amount).map_err(|e| Self::annotate(path, e))
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        let path = &self.path;
        self.reader.data_consume_hard(amount)
            .map_err(|e| Self::annotate(path, e))
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
        None
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
        None
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b {
        None
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        self.reader.cookie_set(cookie)
    }

    fn cookie_ref(&self) -> &C {
        self.reader.cookie_ref()
    }

    fn cookie_mut(&mut self) -> &mut C {
        self.reader.cookie_mut()
    }
}
