//! A stackable `BufRead` interface with bounded regions.
//!
//! A [`BufferedReader`] is a super-powered `Read`er.  Like the
//! [`BufRead`] trait, it exposes its internal buffer so that a user
//! can work with the data in place rather than first copying it to a
//! local buffer.  Unlike `BufRead`, a `BufferedReader` allows the
//! caller to ensure that the internal buffer holds a certain amount
//! of data.
//!
//! `BufferedReader`s are meant to be stacked: each filter wraps the
//! reader beneath it, and its output is the next filter's input.
//! The filters provided here are:
//!
//!   - [`Memory`]: reads from a byte slice.
//!   - [`Generic`]: wraps any `io::Read`er.
//!   - [`File`]: reads from a file.
//!   - [`Region`]: limits the amount of data that can be read from
//!     its inner reader, and tracks how much of a length-prefixed
//!     region has been consumed.
//!   - [`Reserve`]: hides the last `n` bytes of its inner reader.
//!   - [`Dup`]: peeks at its inner reader without consuming data.
//!   - [`EOF`]: always returns EOF.
//!   - [`Deflate`], [`Zlib`], [`Bzip`]: decompress the inner reader.
//!
//! A [`Stack`] manages a pile of boxed filters with explicit `push`
//! and `pop` operations.
//!
//!   [`BufRead`]: https://doc.rust-lang.org/stable/std/io/trait.BufRead.html

#![warn(missing_docs)]

use std::io;
use std::io::{Error, ErrorKind};
use std::cmp;
use std::fmt;

mod generic;
mod memory;
mod file;
mod region;
mod reserve;
mod eof;
mod dup;
mod stack;
#[cfg(any(feature = "compression-deflate", feature = "compression-bzip2"))]
mod decompress;

pub use self::generic::Generic;
pub use self::memory::Memory;
pub use self::file::File;
pub use self::region::Region;
pub use self::reserve::Reserve;
pub use self::eof::EOF;
pub use self::dup::Dup;
pub use self::stack::Stack;
#[cfg(feature = "compression-deflate")]
pub use self::decompress::{Deflate, Zlib};
#[cfg(feature = "compression-bzip2")]
pub use self::decompress::Bzip;

// The default buffer size.
const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// The generic `BufferedReader` interface.
pub trait BufferedReader<C> : io::Read + fmt::Debug {
    /// Returns a reference to the internal buffer.
    ///
    /// Note: this returns the same data as `self.data(0)`, but it
    /// does so without mutably borrowing self.
    fn buffer(&self) -> &[u8];

    /// Ensures that the internal buffer has at least `amount` bytes
    /// of data, and returns it.
    ///
    /// If the internal buffer contains less than `amount` bytes of
    /// data, the internal buffer is first filled.
    ///
    /// The returned slice will have *at least* `amount` bytes unless
    /// EOF has been reached or an error occurs, in which case the
    /// returned slice will contain the rest of the file.
    ///
    /// If an error occurs, it is not discarded, but saved.  It is
    /// returned when `data` (or a related function) is called and
    /// the internal buffer is empty.
    ///
    /// This function does not advance the cursor.  To advance the
    /// cursor, use `consume()`.
    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error>;

    /// Like `data()`, but returns an error if there is not at least
    /// `amount` bytes available.
    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let result = self.data(amount);
        if let Ok(buffer) = result {
            if buffer.len() < amount {
                return Err(Error::new(ErrorKind::UnexpectedEof, "unexpected EOF"));
            }
        }
        result
    }

    /// Returns all of the data until EOF.  Like `data()`, this does
    /// not actually consume the data that is read.
    ///
    /// In general, you shouldn't use this function as it can cause an
    /// enormous amount of buffering.  But, if you know that the
    /// amount of data is limited, this is acceptable.
    fn data_eof(&mut self) -> Result<&[u8], io::Error> {
        // Don't just read std::usize::MAX bytes at once.  The
        // implementation might try to actually allocate a buffer that
        // large!  Instead, try with increasingly larger buffers until
        // the read is (strictly) shorter than the specified size.
        let mut s = DEFAULT_BUF_SIZE;
        while s < std::usize::MAX / 2 {
            match self.data(s) {
                Ok(buffer) =>
                    if buffer.len() < s {
                        // The borrow checker won't let us return
                        // `buffer` here.  Break out of the loop and
                        // call `data` again; the data is already
                        // buffered.
                        break;
                    } else {
                        s *= 2;
                    },
                Err(err) =>
                    return Err(err),
            }
        }

        let buffer = self.buffer();
        assert!(buffer.len() <= s);
        Ok(buffer)
    }

    /// Consumes some of the data.
    ///
    /// This advances the internal cursor by `amount`.  It is an
    /// error to call this function to consume data that hasn't been
    /// returned by `data()` or a related function.
    ///
    /// Note: It is safe to call this function to consume more data
    /// than requested in a previous call to `data()`, but only if
    /// `data()` also returned that data.
    ///
    /// This function returns the internal buffer *including* the
    /// consumed data.
    fn consume(&mut self, amount: usize) -> &[u8];

    /// A convenience function that combines `data()` and `consume()`.
    ///
    /// If less than `amount` bytes are available, this function
    /// consumes what is available.
    fn data_consume(&mut self, amount: usize)
                    -> Result<&[u8], std::io::Error> {
        let amount = cmp::min(amount, self.data(amount)?.len());

        let buffer = self.consume(amount);
        assert!(buffer.len() >= amount);
        Ok(buffer)
    }

    /// A convenience function that effectively combines `data_hard()`
    /// and `consume()`.
    fn data_consume_hard(&mut self, amount: usize)
        -> Result<&[u8], io::Error>
    {
        let len = self.data_hard(amount)?.len();
        assert!(len >= amount);

        let buffer = self.consume(amount);
        assert!(buffer.len() >= amount);
        Ok(buffer)
    }

    /// Checks whether the end of the stream is reached.
    fn eof(&mut self) -> bool {
        self.data_hard(1).is_err()
    }

    /// Reads until either `terminal` is encountered or EOF.
    ///
    /// Returns either a `&[u8]` terminating in `terminal` or the rest
    /// of the data, if EOF was encountered.
    ///
    /// Note: this function does *not* consume the data.
    fn read_to(&mut self, terminal: u8) -> Result<&[u8], std::io::Error> {
        let mut n = 128;
        let len;

        loop {
            let data = self.data(n)?;

            if let Some(newline)
                = data.iter().position(|c| *c == terminal)
            {
                len = newline + 1;
                break;
            } else if data.len() < n {
                // EOF.
                len = data.len();
                break;
            } else {
                // Read more data.
                n = cmp::max(2 * n, data.len() + 1024);
            }
        }

        Ok(&self.buffer()[..len])
    }

    /// Discards the input until one of the bytes in terminals is
    /// encountered.
    ///
    /// The matching byte is not discarded.
    ///
    /// Returns the number of bytes discarded.
    ///
    /// `terminals` must be sorted.
    fn drop_until(&mut self, terminals: &[u8])
        -> Result<usize, std::io::Error>
    {
        for t in terminals.windows(2) {
            assert!(t[0] <= t[1]);
        }

        let buf_size = DEFAULT_BUF_SIZE;
        let mut total = 0;
        let position = loop {
            let data = self.data(buf_size)?;

            if let Some(position) = data.iter().position(
                |c| terminals.binary_search(c).is_ok())
            {
                break position;
            } else if data.len() < buf_size {
                // EOF.
                break data.len();
            } else {
                let len = data.len();
                self.consume(len);
                total += len;
            }
        };

        self.consume(position);
        Ok(total + position)
    }

    /// A convenience function for reading a 16-bit unsigned integer
    /// in big endian format.
    fn read_be_u16(&mut self) -> Result<u16, std::io::Error> {
        let input = self.data_consume_hard(2)?;
        Ok(((input[0] as u16) << 8) + (input[1] as u16))
    }

    /// A convenience function for reading a 32-bit unsigned integer
    /// in big endian format.
    fn read_be_u32(&mut self) -> Result<u32, std::io::Error> {
        let input = self.data_consume_hard(4)?;
        Ok(((input[0] as u32) << 24) + ((input[1] as u32) << 16)
           + ((input[2] as u32) << 8) + (input[3] as u32))
    }

    /// Reads and consumes `amount` bytes, and returns them in a
    /// caller-owned buffer.
    ///
    /// Implementations may optimize this to avoid a copy.
    fn steal(&mut self, amount: usize) -> Result<Vec<u8>, std::io::Error> {
        let mut data = self.data_consume_hard(amount)?;
        assert!(data.len() >= amount);
        if data.len() > amount {
            data = &data[..amount];
        }
        Ok(data.to_vec())
    }

    /// Like `steal()`, but instead of stealing a fixed number of
    /// bytes, steals all of the data until the end of file.
    fn steal_eof(&mut self) -> Result<Vec<u8>, std::io::Error> {
        let len = self.data_eof()?.len();
        let data = self.steal(len)?;
        Ok(data)
    }

    /// Like `steal_eof()`, but instead of returning the data, the
    /// data is discarded.
    ///
    /// On success, returns whether any data (i.e., at least one byte)
    /// was discarded.
    fn drop_eof(&mut self) -> Result<bool, std::io::Error> {
        let mut at_least_one_byte = false;
        loop {
            let n = self.data(DEFAULT_BUF_SIZE)?.len();
            at_least_one_byte |= n > 0;
            self.consume(n);
            if n < DEFAULT_BUF_SIZE {
                // EOF.
                break;
            }
        }

        Ok(at_least_one_byte)
    }

    /// Returns the number of bytes that can still be read before
    /// this reader returns EOF, if that is known in advance.
    ///
    /// Only readers that bound their input (a [`Region`] with a
    /// declared length, a [`Memory`]) know this.  The default
    /// implementation returns `None`.
    fn remaining(&self) -> Option<u64> {
        None
    }

    /// Returns a mutable reference to the inner `BufferedReader`, if
    /// any.
    ///
    /// It is a very bad idea to read any data from the inner
    /// `BufferedReader`, because this `BufferedReader` may have some
    /// data buffered.  However, this function can be useful to get
    /// the cookie.
    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>>;

    /// Returns a reference to the inner `BufferedReader`, if any.
    fn get_ref(&self) -> Option<&dyn BufferedReader<C>>;

    /// Returns the underlying reader, if any.
    ///
    /// To allow this to work with `BufferedReader` traits, it is
    /// necessary for `Self` to be boxed.
    ///
    /// This can lead to the following unusual code:
    ///
    /// ```text
    /// let inner = Box::new(br).into_inner();
    /// ```
    fn into_inner<'a>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'a>>
        where Self: 'a;

    /// Sets the `BufferedReader`'s cookie and returns the old value.
    fn cookie_set(&mut self, cookie: C) -> C;

    /// Returns a reference to the `BufferedReader`'s cookie.
    fn cookie_ref(&self) -> &C;

    /// Returns a mutable reference to the `BufferedReader`'s cookie.
    fn cookie_mut(&mut self) -> &mut C;
}

/// A generic implementation of `std::io::Read::read` appropriate for
/// any `BufferedReader` implementation.
///
/// This function implements the `std::io::Read::read` method in terms
/// of the `data_consume` method.  We can't use the `io::std::Read`
/// interface, because the `BufferedReader` may have buffered some
/// data internally (in which case a read will not return the buffered
/// data, but the following data).
///
/// This implementation is generic.  When deriving a `BufferedReader`,
/// you can include the following:
///
/// ```text
/// impl<'a, T: BufferedReader<C>, C> std::io::Read for XXX<'a, T, C> {
///     fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
///         return buffered_reader_generic_read_impl(self, buf);
///     }
/// }
/// ```
///
/// It would be nice if we could do:
///
/// ```text
/// impl <T: BufferedReader<C>, C> std::io::Read for T { ... }
/// ```
///
/// but, alas, Rust doesn't like that ("error\[E0119\]: conflicting
/// implementations of trait `std::io::Read` for type `&mut _`").
pub fn buffered_reader_generic_read_impl<T: BufferedReader<C>, C>
        (bio: &mut T, buf: &mut [u8]) -> Result<usize, io::Error> {
    bio
        .data_consume(buf.len())
        .map(|inner| {
            let amount = cmp::min(buf.len(), inner.len());
            buf[0..amount].copy_from_slice(&inner[0..amount]);
            amount
        })
}

/// Make a `Box<BufferedReader>` look like a BufferedReader.
impl <'a, C> BufferedReader<C> for Box<dyn BufferedReader<C> + 'a> {
    fn buffer(&self) -> &[u8] {
        self.as_ref().buffer()
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data(amount)
    }

    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data_hard(amount)
    }

    fn data_eof(&mut self) -> Result<&[u8], io::Error> {
        self.as_mut().data_eof()
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.as_mut().consume(amount)
    }

    fn data_consume(&mut self, amount: usize)
                    -> Result<&[u8], std::io::Error> {
        self.as_mut().data_consume(amount)
    }

    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data_consume_hard(amount)
    }

    fn eof(&mut self) -> bool {
        self.as_mut().eof()
    }

    fn read_to(&mut self, terminal: u8) -> Result<&[u8], std::io::Error> {
        self.as_mut().read_to(terminal)
    }

    fn read_be_u16(&mut self) -> Result<u16, std::io::Error> {
        self.as_mut().read_be_u16()
    }

    fn read_be_u32(&mut self) -> Result<u32, std::io::Error> {
        self.as_mut().read_be_u32()
    }

    fn steal(&mut self, amount: usize) -> Result<Vec<u8>, std::io::Error> {
        self.as_mut().steal(amount)
    }

    fn steal_eof(&mut self) -> Result<Vec<u8>, std::io::Error> {
        self.as_mut().steal_eof()
    }

    fn drop_eof(&mut self) -> Result<bool, std::io::Error> {
        self.as_mut().drop_eof()
    }

    fn remaining(&self) -> Option<u64> {
        self.as_ref().remaining()
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
        // Strip the outer box.
        self.as_mut().get_mut()
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
        // Strip the outer box.
        self.as_ref().get_ref()
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
            where Self: 'b {
        // Strip the outer box.
        (*self).into_inner()
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        self.as_mut().cookie_set(cookie)
    }

    fn cookie_ref(&self) -> &C {
        self.as_ref().cookie_ref()
    }

    fn cookie_mut(&mut self) -> &mut C {
        self.as_mut().cookie_mut()
    }
}

// The file was created as follows:
//
//   for i in $(seq 0 9999); do printf "%04d\n" $i; done > buffered-reader-test.txt
#[cfg(test)]
fn buffered_reader_test_data_check<'a, T: BufferedReader<C> + 'a, C>(bio: &mut T) {
    use std::str;

    for i in 0 .. 10000 {
        let consumed = {
            // Each number is 4 bytes plus a newline character.
            let d = bio.data_hard(5);
            if d.is_err() {
                println!("Error for i == {}: {:?}", i, d);
            }
            let d = d.unwrap();
            assert!(d.len() >= 5);
            assert_eq!(format!("{:04}\n", i), str::from_utf8(&d[0..5]).unwrap());

            5
        };

        bio.consume(consumed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buffered_reader_eof_test() {
        let data : &[u8] = include_bytes!("buffered-reader-test.txt");

        // Make sure data_eof works.
        {
            let mut bio = Memory::new(data);
            let amount = {
                bio.data_eof().unwrap().len()
            };
            bio.consume(amount);
            assert_eq!(bio.data(1).unwrap().len(), 0);
        }

        // Try it again with a region.
        {
            let bio = Memory::new(data);
            let mut bio2 = Region::new(bio, (data.len() / 2) as u64).unwrap();
            let amount = {
                bio2.data_eof().unwrap().len()
            };
            assert_eq!(amount, data.len() / 2);
            bio2.consume(amount);
            assert_eq!(bio2.data(1).unwrap().len(), 0);
        }
    }

    fn buffered_reader_read_test_aux<'a, T: BufferedReader<C> + 'a, C>
        (mut bio: T, data: &[u8]) {
        let mut buffer = [0; 99];

        // Make sure the test file has more than buffer.len() bytes
        // worth of data.
        assert!(buffer.len() < data.len());

        // The number of reads we'll have to perform.
        let iters = (data.len() + buffer.len() - 1) / buffer.len();
        // Iterate more than the number of required reads to check
        // what happens when we try to read beyond the end of the
        // file.
        for i in 1..iters + 2 {
            let data_start = (i - 1) * buffer.len();

            // We don't want to just check that read works in
            // isolation.  We want to be able to mix .read and .data
            // calls.
            {
                let result = bio.data(buffer.len());
                let buffer = result.unwrap();
                if buffer.len() > 0 {
                    assert_eq!(buffer,
                               &data[data_start..data_start + buffer.len()]);
                }
            }

            // Now do the actual read.
            let result = bio.read(&mut buffer[..]);
            let got = result.unwrap();
            if got > 0 {
                assert_eq!(&buffer[0..got],
                           &data[data_start..data_start + got]);
            }

            if i > iters {
                // We should have read everything.
                assert!(got == 0);
            } else if i == iters {
                // The last read.  This may be less than buffer.len().
                // But it should include at least one byte.
                assert!(0 < got);
                assert!(got <= buffer.len());
            } else {
                assert_eq!(got, buffer.len());
            }
        }
    }

    #[test]
    fn buffered_reader_read_test() {
        let data : &[u8] = include_bytes!("buffered-reader-test.txt");

        {
            let bio = Memory::new(data);
            buffered_reader_read_test_aux (bio, data);
        }

        {
            use std::path::PathBuf;
            use std::fs::File;

            let path : PathBuf = [env!("CARGO_MANIFEST_DIR"),
                                  "src",
                                  "buffered-reader-test.txt"]
                .iter().collect();

            let mut f = File::open(&path).expect(&path.to_string_lossy());
            let bio = Generic::new(&mut f, None);
            buffered_reader_read_test_aux (bio, data);
        }
    }

    #[test]
    fn read_to() {
        let data : &[u8] = b"one\ntwo\nthree";
        let mut bio = Memory::new(data);

        assert_eq!(bio.read_to(b'\n').unwrap(), b"one\n");
        bio.consume(4);
        assert_eq!(bio.read_to(b'\n').unwrap(), b"two\n");
        bio.consume(4);
        assert_eq!(bio.read_to(b'\n').unwrap(), b"three");
        bio.consume(5);
        assert_eq!(bio.read_to(b'\n').unwrap(), b"");
    }

    #[test]
    fn drop_until() {
        let data : &[u8] = b"abcd\r\nefgh";
        let mut bio = Memory::new(data);

        assert_eq!(bio.drop_until(b"\n\r").unwrap(), 4);
        assert_eq!(bio.data(2).unwrap(), b"\r\nefgh");
        assert_eq!(bio.drop_until(b"x").unwrap(), 6);
        assert!(bio.eof());
    }
}
