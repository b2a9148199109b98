use std::io;
use std::cmp;
use std::fmt;
use std::io::{Error, ErrorKind};

use super::*;

/// Hides the last `reserve` bytes of the wrapped reader.
///
/// This is useful when a stream ends in a trailer of a known size
/// whose start cannot otherwise be detected, e.g. a modification
/// detection code at the end of an encrypted container.  Once this
/// reader returns EOF, pop it, and read the trailer from the wrapped
/// reader.
pub struct Reserve<T: BufferedReader<C>, C> {
    reader: T,
    reserve: usize,

    cookie: C,
}

impl<T: BufferedReader<C>, C> fmt::Display for Reserve<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Reserve ({} bytes)", self.reserve)
    }
}

impl<T: BufferedReader<C>, C> fmt::Debug for Reserve<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reserve")
            .field("reserve", &self.reserve)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<T: BufferedReader<()>> Reserve<T, ()> {
    /// Instantiates a new reserve reader.
    pub fn new(reader: T, reserve: usize) -> Self {
        Self::with_cookie(reader, reserve, ())
    }
}

impl<T: BufferedReader<C>, C> Reserve<T, C> {
    /// Like `new()`, but sets a cookie.
    pub fn with_cookie(reader: T, reserve: usize, cookie: C) -> Self {
        Reserve {
            reader,
            reserve,
            cookie,
        }
    }

    fn data_helper(&mut self, amount: usize, hard: bool, and_consume: bool)
                   -> io::Result<&[u8]> {
        let reserve = self.reserve;
        let available = {
            let data = self.reader.data(amount.saturating_add(reserve))?;
            data.len().saturating_sub(reserve)
        };

        if hard && available < amount {
            return Err(Error::new(ErrorKind::UnexpectedEof, "EOF"));
        }

        if and_consume {
            let n = cmp::min(available, amount);
            let data = self.reader.consume(n);
            Ok(&data[..available])
        } else {
            Ok(&self.reader.buffer()[..available])
        }
    }
}

impl<T: BufferedReader<C>, C> io::Read for Reserve<T, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: BufferedReader<C>, C> BufferedReader<C> for Reserve<T, C> {
    fn buffer(&self) -> &[u8] {
        let buf = self.reader.buffer();
        &buf[..buf.len().saturating_sub(self.reserve)]
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, false)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, false)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        let reserve = self.reserve;
        assert!(amount <= self.buffer().len(),
                "Attempt to consume {} bytes, but only {} are available",
                amount, self.buffer().len());
        let data = self.reader.consume(amount);
        &data[..data.len() - reserve]
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, true)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, true)
    }

    fn remaining(&self) -> Option<u64> {
        self.reader.remaining()
            .map(|r| r.saturating_sub(self.reserve as u64))
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserve() {
        let data : &[u8] = b"0123456789TRAILER";

        let mut bio = Reserve::new(Generic::new(data, Some(2)), 7);
        assert_eq!(bio.remaining(), None);
        assert_eq!(bio.steal_eof().unwrap(), b"0123456789");
        assert!(bio.eof());

        let mut inner = Box::new(bio).into_inner().unwrap();
        assert_eq!(inner.steal_eof().unwrap(), b"TRAILER");
    }

    #[test]
    fn short_input() {
        // The input is smaller than the reserve.
        let data : &[u8] = b"0123";
        let mut bio = Reserve::new(Memory::new(data), 7);
        assert_eq!(bio.data(10).unwrap(), b"");
        assert!(bio.data_hard(1).is_err());
        assert_eq!(bio.remaining(), Some(0));
    }

    #[test]
    fn matches_test_file() {
        let data : &[u8] = include_bytes!("buffered-reader-test.txt");
        let mut bio = Reserve::new(Memory::new(data), 5);
        let got = bio.steal_eof().unwrap();
        assert_eq!(&got[..], &data[..data.len() - 5]);
    }
}
