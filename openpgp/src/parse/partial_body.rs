use std::cmp;
use std::io;
use std::io::{Error, ErrorKind};
use std::fmt;

use buffered_reader::{buffered_reader_generic_read_impl, BufferedReader};

use crate::macros::Tracer;
use crate::packet::BodyLength;
use crate::parse::Cookie;

/// Reassembles a body that uses partial body lengths.
///
/// The wrapped reader is positioned just after the first length
/// header.  Chunks are read until a chunk with a full length, which
/// is the last one.
pub(crate) struct PartialBodyFilter<T: BufferedReader<Cookie>> {
    reader: T,

    // The bytes left in the current chunk.
    chunk_left: u32,
    // Whether the current chunk is the last one.
    last: bool,

    buffer: Vec<u8>,
    cursor: usize,

    trace: bool,
    cookie: Cookie,
}

impl<T: BufferedReader<Cookie>> fmt::Debug for PartialBodyFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PartialBodyFilter")
            .field("chunk_left", &self.chunk_left)
            .field("last", &self.last)
            .field("buffered", &(self.buffer.len() - self.cursor))
            .field("reader", &self.reader)
            .finish()
    }
}

impl<T: BufferedReader<Cookie>> PartialBodyFilter<T> {
    /// Creates a new filter whose first chunk is `first_chunk` bytes
    /// long.
    pub fn new(reader: T, first_chunk: u32, trace: bool, cookie: Cookie)
               -> Self {
        PartialBodyFilter {
            reader,
            chunk_left: first_chunk,
            last: false,
            buffer: Vec::new(),
            cursor: 0,
            trace,
            cookie,
        }
    }

    // Makes sure that at least `amount` bytes are buffered, unless
    // the body ends first.
    fn fill_buffer(&mut self, amount: usize) -> io::Result<()> {
        let tracer = Tracer::new(self.trace, "PartialBodyFilter::fill_buffer",
                                 0);

        let buffered = self.buffer.len() - self.cursor;
        if buffered >= amount {
            return Ok(());
        }

        let mut buffer = Vec::with_capacity(amount);
        buffer.extend_from_slice(&self.buffer[self.cursor..]);

        while buffer.len() < amount {
            if self.chunk_left == 0 {
                if self.last {
                    break;
                }

                match BodyLength::parse_new_format(&mut self.reader)? {
                    BodyLength::Full(l) => {
                        t!(tracer, "last chunk: {} bytes", l);
                        self.last = true;
                        self.chunk_left = l;
                    },
                    BodyLength::Partial(l) => {
                        t!(tracer, "chunk: {} bytes", l);
                        self.chunk_left = l;
                    },
                    BodyLength::Indeterminate =>
                        return Err(Error::new(
                            ErrorKind::InvalidData,
                            "indeterminate length in a partial body")),
                }
                continue;
            }

            let want = cmp::min(self.chunk_left as usize,
                                amount - buffer.len());
            let data = self.reader.data_consume_hard(want)?;
            buffer.extend_from_slice(&data[..want]);
            self.chunk_left -= want as u32;
        }

        self.buffer = buffer;
        self.cursor = 0;
        Ok(())
    }

    fn data_helper(&mut self, amount: usize, hard: bool, and_consume: bool)
                   -> io::Result<&[u8]> {
        self.fill_buffer(amount)?;

        let buffered = self.buffer.len() - self.cursor;
        if hard && buffered < amount {
            return Err(Error::new(ErrorKind::UnexpectedEof,
                                  "unexpected end of partial body"));
        }

        let start = self.cursor;
        if and_consume {
            self.cursor += cmp::min(amount, buffered);
        }
        Ok(&self.buffer[start..])
    }
}

impl<T: BufferedReader<Cookie>> io::Read for PartialBodyFilter<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: BufferedReader<Cookie>> BufferedReader<Cookie>
        for PartialBodyFilter<T> {
    fn buffer(&self) -> &[u8] {
        &self.buffer[self.cursor..]
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, false)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, false)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        let buffered = self.buffer.len() - self.cursor;
        assert!(amount <= buffered,
                "Attempt to consume {} bytes, but only {} are buffered",
                amount, buffered);
        let start = self.cursor;
        self.cursor += amount;
        &self.buffer[start..]
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, false, true)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.data_helper(amount, true, true)
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<Cookie>> {
        Some(&mut self.reader)
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<Cookie>> {
        Some(&self.reader)
    }

    fn into_inner<'b>(self: Box<Self>)
            -> Option<Box<dyn BufferedReader<Cookie> + 'b>>
            where Self: 'b {
        Some(Box::new(self.reader))
    }

    fn cookie_set(&mut self, cookie: Cookie) -> Cookie {
        std::mem::replace(&mut self.cookie, cookie)
    }

    fn cookie_ref(&self) -> &Cookie {
        &self.cookie
    }

    fn cookie_mut(&mut self) -> &mut Cookie {
        &mut self.cookie
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reader(data: &[u8], first: u32) -> PartialBodyFilter<
            buffered_reader::Memory<Cookie>> {
        PartialBodyFilter::new(
            buffered_reader::Memory::with_cookie(data, Cookie::default()),
            first, false, Cookie::default())
    }

    #[test]
    fn chunks() {
        // Two chunks of 2 bytes, then a 3 byte last chunk, then
        // trailing data that doesn't belong to the body.
        let data = [b'a', b'b', 0xe1, b'c', b'd', 3, b'e', b'f', b'g',
                    b'X', b'Y'];
        let mut r = reader(&data, 2);
        assert_eq!(r.data_hard(3).unwrap()[..3], b"abc"[..]);
        assert_eq!(r.steal_eof().unwrap(), b"abcdefg");
        assert_eq!(r.into_inner_reader().steal_eof().unwrap(), b"XY");
    }

    #[test]
    fn empty_last_chunk() {
        let data = [b'a', 0];
        let mut r = reader(&data, 1);
        assert_eq!(r.steal_eof().unwrap(), b"a");
        assert!(r.data_hard(1).is_err());
    }

    #[test]
    fn truncated() {
        let data = [b'a', b'b', 0xe2, b'c'];
        let mut r = reader(&data, 2);
        assert!(r.steal_eof().is_err());
    }

    impl<T: BufferedReader<Cookie>> PartialBodyFilter<T> {
        fn into_inner_reader(self) -> T {
            self.reader
        }
    }
}
