use std::io;
use std::cmp;
use std::fmt;
use std::io::{Error, ErrorKind};

use super::*;

/// Limits a reader to a length-prefixed region of its input.
///
/// A `Region` tracks how many bytes of the region have been
/// consumed.  Since the wrapped reader is read through, consuming
/// from a region also consumes from every enclosing region.
///
/// Soft reads (`data`, `data_consume`) past the end of the region are
/// short.  Hard reads (`data_hard`, `data_consume_hard`) past the end
/// fail with `ErrorKind::UnexpectedEof`.  If the wrapped reader is
/// exhausted before the region is, the region is truncated, and every
/// read that would need the missing bytes fails with
/// `ErrorKind::UnexpectedEof`.
///
/// An indeterminate region extends to the end of the wrapped reader.
pub struct Region<T: BufferedReader<C>, C> {
    reader: T,
    // The declared length, or `None` if the region is indeterminate.
    length: Option<u64>,
    bytes_read: u64,
    last_read: usize,
    truncated: bool,

    cookie: C,
}

impl<T: BufferedReader<C>, C> fmt::Display for Region<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.length {
            Some(l) => write!(f, "Region ({} of {} bytes read)",
                              self.bytes_read, l),
            None => write!(f, "Region ({} bytes read, indeterminate)",
                           self.bytes_read),
        }
    }
}

impl<T: BufferedReader<C>, C> fmt::Debug for Region<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Region")
            .field("length", &self.length)
            .field("bytes_read", &self.bytes_read)
            .field("last_read", &self.last_read)
            .field("truncated", &self.truncated)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<T: BufferedReader<()>> Region<T, ()> {
    /// Instantiates a region of `length` bytes over `reader`.
    ///
    /// Fails if `reader` knows how much data it has left, and that is
    /// less than `length`.
    pub fn new(reader: T, length: u64) -> io::Result<Self> {
        Self::with_cookie(reader, length, ())
    }
}

impl<T: BufferedReader<C>, C> Region<T, C> {
    /// Like `new()`, but sets a cookie.
    pub fn with_cookie(reader: T, length: u64, cookie: C)
                       -> io::Result<Self> {
        Self::try_with_cookie(reader, length, cookie).map_err(|(_, e)| e)
    }

    /// Like `with_cookie()`, but hands `reader` back on failure.
    ///
    /// This is useful when pushing a region onto a [`Stack`], which
    /// must not lose the old top.
    ///
    ///   [`Stack`]: struct.Stack.html
    pub fn try_with_cookie(reader: T, length: u64, cookie: C)
                           -> Result<Self, (T, io::Error)> {
        if let Some(budget) = reader.remaining() {
            if length > budget {
                let e = Error::new(
                    ErrorKind::InvalidData,
                    format!("region overrun: {} byte region, but only \
                             {} bytes remain in the enclosing region",
                            length, budget));
                return Err((reader, e));
            }
        }

        Ok(Region {
            reader,
            length: Some(length),
            bytes_read: 0,
            last_read: 0,
            truncated: false,
            cookie,
        })
    }

    /// Instantiates a region that extends to the end of `reader`.
    pub fn indeterminate(reader: T, cookie: C) -> Self {
        Region {
            reader,
            length: None,
            bytes_read: 0,
            last_read: 0,
            truncated: false,
            cookie,
        }
    }

    /// Returns the declared length, or `None` for an indeterminate
    /// region.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Returns the number of bytes consumed from this region.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns the size of the most recent consume.
    pub fn last_read(&self) -> usize {
        self.last_read
    }

    /// Returns whether the wrapped reader ran dry before the end of
    /// the region.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn left(&self) -> Option<u64> {
        self.length.map(|l| l - self.bytes_read)
    }

    // Clamps `amount` to what is left in the region.
    fn clamp(&self, amount: usize) -> usize {
        match self.left() {
            Some(left) => cmp::min(amount as u64, left) as usize,
            None => amount,
        }
    }

    fn truncation_error(&self) -> io::Error {
        Error::new(ErrorKind::UnexpectedEof,
                   format!("truncated region: read {} of {} bytes",
                           self.bytes_read + self.reader.buffer().len() as u64,
                           self.length.unwrap_or(0)))
    }

    fn data_helper(&mut self, amount: usize, hard: bool, and_consume: bool)
                   -> io::Result<&[u8]> {
        let want = self.clamp(amount);
        if hard && want < amount {
            return Err(Error::new(ErrorKind::UnexpectedEof,
                                  "read past the end of the region"));
        }

        let got = self.reader.data(want)?.len();
        if got < want {
            match self.length {
                Some(_) => {
                    self.truncated = true;
                    return Err(self.truncation_error());
                }
                // An indeterminate region just ends with its reader.
                None if hard => return Err(Error::new(
                    ErrorKind::UnexpectedEof, "read past the end of the region")),
                None => (),
            }
        }

        let got = self.clamp(got);
        if and_consume {
            let n = cmp::min(got, amount);
            self.bytes_read += n as u64;
            self.last_read = n;
            let data = self.reader.consume(n);
            // `data` also includes what the wrapped reader buffered
            // beyond the region.
            Ok(&data[..got])
        } else {
            Ok(&self.reader.buffer()[..got])
        }
    }
}

impl<T: BufferedReader<C>, C> io::Read for Region<T, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: BufferedReader<C>, C> BufferedReader<C> for Region<T, C> {
    fn buffer(&self) -> &[u8] {
        let buf = self.reader.buffer();
        &buf[..self.clamp(buf.len())]
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, false)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, false)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        if let Some(left) = self.left() {
            assert!(amount as u64 <= left,
                    "Attempt to consume {} bytes, but only {} bytes \
                     remain in the region", amount, left);
        }
        self.bytes_read += amount as u64;
        self.last_read = amount;

        let left = self.left();
        let data = self.reader.consume(amount);
        match left {
            Some(left) => {
                let n = cmp::min(data.len() as u64, left + amount as u64);
                &data[..n as usize]
            }
            None => data,
        }
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, true)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, true)
    }

    fn remaining(&self) -> Option<u64> {
        match self.length {
            Some(_) => self.left(),
            None => self.reader.remaining(),
        }
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
        Some(&mut self.reader)
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
        Some(&self.reader)
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
            where Self: 'b {
        Some(Box::new(self.reader))
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
