use std::io;
use std::fmt;
use std::cmp;

use super::*;

/// Reads the wrapped reader without consuming any of its data.
///
/// Everything read through a `Dup` stays buffered in the wrapped
/// reader, so it should only be used to peek, e.g. to sniff whether a
/// message is armored before deciding which filter to push.
pub struct Dup<T: BufferedReader<C>, C> {
    reader: T,

    // The number of bytes that have been consumed.
    cursor: usize,

    // The user settable cookie.
    cookie: C,
}

impl<T: BufferedReader<C>, C> fmt::Display for Dup<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dup ({} bytes consumed)", self.cursor)
    }
}

impl<T: BufferedReader<C>, C> fmt::Debug for Dup<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dup")
            .field("cursor", &self.cursor)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<T: BufferedReader<()>> Dup<T, ()> {
    /// Instantiates a new `Dup` over `reader`.
    pub fn new(reader: T) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<T: BufferedReader<C>, C> Dup<T, C> {
    /// Like `new()`, but sets a cookie.
    pub fn with_cookie(reader: T, cookie: C) -> Self {
        Dup {
            reader,
            cursor: 0,
            cookie,
        }
    }

    /// Returns the number of bytes that have been consumed by this
    /// reader.
    pub fn total_out(&self) -> usize {
        self.cursor
    }

    /// Resets the cursor to the beginning of the stream.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl<T: BufferedReader<C>, C> io::Read for Dup<T, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: BufferedReader<C>, C> BufferedReader<C> for Dup<T, C> {
    fn buffer(&self) -> &[u8] {
        &self.reader.buffer()[self.cursor..]
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let cursor = self.cursor;
        let data = self.reader.data(cursor + amount)?;
        Ok(&data[cursor..])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        let cursor = self.cursor;
        let data = self.reader.buffer();
        assert!(data.len() >= cursor + amount);
        self.cursor += amount;
        &data[cursor..]
    }

    fn data_consume(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let cursor = self.cursor;
        let data = self.reader.data(cursor + amount)?;
        let data = &data[cursor..];
        self.cursor += cmp::min(data.len(), amount);
        Ok(data)
    }

    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let cursor = self.cursor;
        let data = self.reader.data_hard(cursor + amount)?;
        self.cursor += amount;
        Ok(&data[cursor..])
    }

    fn remaining(&self) -> Option<u64> {
        self.reader.remaining().map(|r| r - self.cursor as u64)
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
    fn dup() {
        let data : &[u8] = include_bytes!("buffered-reader-test.txt");
        let mut reader = Dup::new(Memory::new(data));

        buffered_reader_test_data_check(&mut reader);
        assert_eq!(reader.total_out(), data.len());
        assert_eq!(reader.remaining(), Some(0));

        // Nothing was consumed from the inner reader.
        let mut reader = Box::new(reader).into_inner().unwrap();
        assert_eq!(reader.remaining(), Some(data.len() as u64));
        buffered_reader_test_data_check(&mut reader);
    }

    #[test]
    fn rewind() {
        let mut reader = Dup::new(Memory::new(&b"-----BEGIN"[..]));
        assert_eq!(reader.data_consume_hard(5).unwrap(), b"-----BEGIN");
        assert_eq!(reader.buffer(), b"BEGIN");
        reader.rewind();
        assert_eq!(reader.buffer(), b"-----BEGIN");
    }
}
