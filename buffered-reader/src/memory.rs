use std::io;
use std::fmt;

use std::io::{Error, ErrorKind};

use super::*;

/// Reads from a byte slice.
///
/// `Generic` can also wrap a slice, but would copy it into its own
/// buffer first.  Since the whole input is available up front, a
/// `Memory` also knows how many bytes remain.
pub struct Memory<'a, C> {
    // What has not been consumed yet.
    rest: &'a [u8],
    consumed: usize,
    cookie: C,
}

impl<'a, C> fmt::Display for Memory<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Memory ({} of {} bytes read)",
               self.consumed, self.consumed + self.rest.len())
    }
}

impl<'a, C> fmt::Debug for Memory<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Memory")
            .field("consumed", &self.consumed)
            .field("remaining", &self.rest.len())
            .finish()
    }
}

impl<'a> Memory<'a, ()> {
    /// Reads from `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_cookie(buffer, ())
    }
}

impl<'a, C> Memory<'a, C> {
    /// Like `new()`, but sets a cookie.
    pub fn with_cookie(buffer: &'a [u8], cookie: C) -> Self {
        Memory {
            rest: buffer,
            consumed: 0,
            cookie,
        }
    }

    /// Returns the number of bytes that have been consumed.
    pub fn total_out(&self) -> usize {
        self.consumed
    }

    fn advance(&mut self, amount: usize) -> &'a [u8] {
        let rest = self.rest;
        self.rest = &rest[amount..];
        self.consumed += amount;
        rest
    }
}

impl<'a, C> io::Read for Memory<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let n = buf.len().min(self.rest.len());
        let data = self.advance(n);
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

impl<'a, C> BufferedReader<C> for Memory<'a, C> {
    fn buffer(&self) -> &[u8] {
        self.rest
    }

    fn data(&mut self, _amount: usize) -> Result<&[u8], io::Error> {
        Ok(self.rest)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!(amount <= self.rest.len(),
                "Attempt to consume {} bytes, but only {} remain",
                amount, self.rest.len());
        self.advance(amount)
    }

    fn data_consume(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let amount = amount.min(self.rest.len());
        Ok(self.advance(amount))
    }

    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        if amount > self.rest.len() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "EOF"));
        }
        Ok(self.advance(amount))
    }

    fn remaining(&self) -> Option<u64> {
        Some(self.rest.len() as u64)
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
