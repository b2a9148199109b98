use std::io;
use std::fmt;
use std::cmp;
use std::io::{Error, ErrorKind};

use super::*;

/// Wraps an `io::Read`er.
///
/// This is sufficient when reading from a file, a socket or a pipe.
/// It even works with a `&[u8]`, but [`Memory`] avoids the extra
/// copy.
///
///   [`Memory`]: struct.Memory.html
pub struct Generic<T: io::Read, C> {
    buffer: Option<Box<[u8]>>,
    // The next byte to read in the buffer.
    cursor: usize,
    // The preferred chunk size.  This is just a hint.
    preferred_chunk_size: usize,
    // The wrapped reader.
    reader: T,
    // Whether we saw an EOF.
    saw_eof: bool,
    // The last error that we encountered, but have not yet returned.
    error: Option<io::Error>,

    // The user settable cookie.
    cookie: C,
}

impl<T: io::Read, C> fmt::Display for Generic<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Generic")
    }
}

impl<T: io::Read, C> fmt::Debug for Generic<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Generic")
            .field("preferred_chunk_size", &self.preferred_chunk_size)
            .field("buffered", &self.buffered())
            .field("saw_eof", &self.saw_eof)
            .field("error", &self.error)
            .finish()
    }
}

impl<T: io::Read> Generic<T, ()> {
    /// Instantiates a new generic reader.
    ///
    /// `reader` is the source to wrap.  `preferred_chunk_size` is the
    /// preferred chunk size.  If `None`, then the default is used,
    /// which is usually what you want.
    pub fn new(reader: T, preferred_chunk_size: Option<usize>) -> Self {
        Self::with_cookie(reader, preferred_chunk_size, ())
    }
}

impl<T: io::Read, C> Generic<T, C> {
    /// Like `new()`, but sets a cookie.
    pub fn with_cookie(
           reader: T, preferred_chunk_size: Option<usize>, cookie: C)
           -> Self {
        Generic {
            buffer: None,
            cursor: 0,
            preferred_chunk_size:
                preferred_chunk_size.unwrap_or(DEFAULT_BUF_SIZE),
            reader,
            saw_eof: false,
            error: None,
            cookie,
        }
    }

    /// Returns a reference to the wrapped reader.
    pub fn reader_ref(&self) -> &T {
        &self.reader
    }

    /// Returns a mutable reference to the wrapped reader.
    pub fn reader_mut(&mut self) -> &mut T {
        &mut self.reader
    }

    /// Returns the wrapped reader.  Any buffered data is lost.
    pub fn into_reader(self) -> T {
        self.reader
    }

    fn buffered(&self) -> usize {
        self.buffer.as_ref().map(|b| b.len() - self.cursor).unwrap_or(0)
    }

    /// Returns the buffer.  Tries to make sure that it contains at
    /// least `amount` bytes.
    fn data_helper(&mut self, amount: usize, hard: bool, and_consume: bool)
                   -> Result<&[u8], io::Error> {
        let amount_buffered = self.buffered();

        if !self.saw_eof && amount > amount_buffered {
            // The caller wants more data than we have readily
            // available.  Read some more.
            let capacity = cmp::max(
                cmp::max(DEFAULT_BUF_SIZE, 2 * self.preferred_chunk_size),
                amount);

            let mut buffer_new = vec![0u8; capacity];
            if let Some(ref buffer) = self.buffer {
                buffer_new[..amount_buffered]
                    .copy_from_slice(&buffer[self.cursor..]);
            }

            let mut filled = amount_buffered;
            while filled < amount {
                match self.reader.read(&mut buffer_new[filled..]) {
                    Ok(0) => {
                        self.saw_eof = true;
                        break;
                    },
                    Ok(read) => filled += read,
                    Err(ref err) if err.kind() == ErrorKind::Interrupted =>
                        continue,
                    Err(err) => {
                        // Don't return yet, we may have read
                        // something.
                        self.saw_eof = true;
                        self.error = Some(err);
                        break;
                    },
                }
            }

            if filled > amount_buffered {
                buffer_new.truncate(filled);
                self.buffer = Some(buffer_new.into_boxed_slice());
                self.cursor = 0;
            }
        }

        let amount_buffered = self.buffered();

        // If an error occurred and we can't satisfy the caller from
        // the buffer, return the error now.  An error is returned
        // at most once.
        if self.error.is_some() && amount > amount_buffered {
            if let Some(err) = self.error.take() {
                return Err(err);
            }
        }

        if hard && amount_buffered < amount {
            return Err(Error::new(ErrorKind::UnexpectedEof, "EOF"));
        }

        match self.buffer {
            Some(ref buffer) => {
                if and_consume {
                    let amount_consumed = cmp::min(amount_buffered, amount);
                    self.cursor += amount_consumed;
                    Ok(&buffer[self.cursor - amount_consumed..])
                } else {
                    Ok(&buffer[self.cursor..])
                }
            },
            None => Ok(&b""[..]),
        }
    }
}

impl<T: io::Read, C> io::Read for Generic<T, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: io::Read, C> BufferedReader<C> for Generic<T, C> {
    fn buffer(&self) -> &[u8] {
        if let Some(ref buffer) = self.buffer {
            &buffer[self.cursor..]
        } else {
            &b""[..]
        }
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.data_helper(amount, false, false)
    }

    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.data_helper(amount, true, false)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        // The caller can't consume more than is buffered!
        match self.buffer {
            Some(ref buffer) => {
                assert!(amount <= buffer.len() - self.cursor,
                        "buffer contains just {} bytes, but you are trying to \
                         consume {} bytes.  Did you forget to call data()?",
                        buffer.len() - self.cursor, amount);

                self.cursor += amount;
                &buffer[self.cursor - amount..]
            },
            None => {
                assert_eq!(amount, 0);
                &b""[..]
            },
        }
    }

    fn data_consume(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.data_helper(amount, false, true)
    }

    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.data_helper(amount, true, true)
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
        std::mem::replace(&mut self.cookie, cookie)
    }

    fn cookie_ref(&self) -> &C {
        &self.cookie
    }

    fn cookie_mut(&mut self) -> &mut C {
        &mut self.cookie
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generic_test() {
        // Reading from a file.
        {
            use std::path::PathBuf;
            use std::fs::File;

            let path : PathBuf = [env!("CARGO_MANIFEST_DIR"),
                                  "src", "buffered-reader-test.txt"]
                .iter().collect();
            let mut f = File::open(&path).expect(&path.to_string_lossy());
            let mut bio = Generic::new(&mut f, None);

            buffered_reader_test_data_check(&mut bio);
        }

        // Same test, but as a slice, with a tiny chunk size.
        {
            let mut data : &[u8] = include_bytes!("buffered-reader-test.txt");
            let mut bio = Generic::new(&mut data, Some(3));

            buffered_reader_test_data_check(&mut bio);
        }
    }

    // A reader that returns one byte per read, then an error.
    struct Trickle<'a>(&'a [u8]);

    impl<'a> io::Read for Trickle<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(Error::new(ErrorKind::Other, "broken pipe"));
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn delayed_error() {
        let mut bio = Generic::new(Trickle(b"abc"), None);

        // The error is hidden while the buffer can satisfy us.
        assert_eq!(bio.data(3).unwrap(), b"abc");
        assert_eq!(bio.data_consume_hard(3).unwrap(), b"abc");

        // Now it surfaces, exactly once.
        assert!(bio.data(1).is_err());
        assert_eq!(bio.data(1).unwrap(), b"");
    }
}
