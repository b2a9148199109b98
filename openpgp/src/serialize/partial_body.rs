//! Encodes a byte stream using OpenPGP's partial body encoding.

use std::fmt;
use std::io;

use crate::packet::BodyLength;
use crate::Result;
use super::writer::{BoxStack, Stack, Stackable};

/// The default size of the chunks, 8 KiB.
const DEFAULT_CHUNK_SIZE_LOG2: u8 = 13;

// The first chunk of a partial body must be at least 512 bytes
// (see Section 4.2.2.4 of RFC 4880).
const MIN_CHUNK_SIZE_LOG2: u8 = 9;

// Partial body lengths express at most 1 GiB.
const MAX_CHUNK_SIZE_LOG2: u8 = 30;

/// Writes the body of a packet using partial body lengths.
///
/// The caller writes the CTB; this filter writes the length headers.
/// Data is buffered until a whole chunk is available.  When the
/// filter is finalized, the rest is written with a regular length,
/// which may be zero.
pub(crate) struct PartialBodyFilter<'a, C: 'a> {
    inner: Option<BoxStack<'a, C>>,
    cookie: C,
    buffer: Vec<u8>,
    chunk_size_log2: u8,
    position: u64,
}

impl<'a, C: 'a> PartialBodyFilter<'a, C> {
    /// Returns a new partial body encoder using 8 KiB chunks.
    pub fn new(inner: Stack<'a, C>, cookie: C) -> Stack<'a, C> {
        Self::with_chunk_size(inner, cookie, DEFAULT_CHUNK_SIZE_LOG2)
    }

    /// Returns a new partial body encoder using chunks of
    /// `1 << chunk_size_log2` bytes.
    ///
    /// The size is clamped to the range allowed for partial body
    /// lengths.
    pub fn with_chunk_size(inner: Stack<'a, C>, cookie: C,
                           chunk_size_log2: u8)
                           -> Stack<'a, C> {
        let chunk_size_log2 = chunk_size_log2
            .max(MIN_CHUNK_SIZE_LOG2)
            .min(MAX_CHUNK_SIZE_LOG2);
        Stack::from(Box::new(PartialBodyFilter {
            inner: Some(inner.into()),
            cookie,
            buffer: Vec::with_capacity(1 << chunk_size_log2),
            chunk_size_log2,
            position: 0,
        }))
    }

    fn chunk_size(&self) -> usize {
        1 << self.chunk_size_log2
    }

    // Writes out all complete chunks.  If `done` is set, the rest is
    // written using a regular length.
    fn write_out(&mut self, done: bool) -> io::Result<()> {
        let chunk_size = self.chunk_size();
        let inner = self.inner.as_mut().ok_or_else(
            || io::Error::new(io::ErrorKind::BrokenPipe,
                              "Writer is finalized."))?;

        let mut start = 0;
        while self.buffer.len() - start >= chunk_size {
            inner.write_all(&[0xe0 | self.chunk_size_log2])?;
            inner.write_all(&self.buffer[start..start + chunk_size])?;
            start += chunk_size;
        }
        self.buffer.drain(..start);

        if done {
            let mut header = Vec::with_capacity(5);
            BodyLength::Full(self.buffer.len() as u32)
                .serialize_new(&mut header)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            inner.write_all(&header)?;
            inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }
}

impl<'a, C: 'a> io::Write for PartialBodyFilter<'a, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.position += buf.len() as u64;
        if self.buffer.len() >= self.chunk_size() {
            self.write_out(false)?;
        }
        Ok(buf.len())
    }

    // Only whole chunks can be flushed.
    fn flush(&mut self) -> io::Result<()> {
        self.write_out(false)?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<'a, C: 'a> fmt::Debug for PartialBodyFilter<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PartialBodyFilter")
            .field("chunk_size", &self.chunk_size())
            .field("buffered", &self.buffer.len())
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, C: 'a> Stackable<'a, C> for PartialBodyFilter<'a, C> {
    fn into_inner(mut self: Box<Self>) -> Result<Option<BoxStack<'a, C>>> {
        self.write_out(true)?;
        Ok(self.inner.take())
    }

    fn inner_ref(&self) -> Option<&dyn Stackable<'a, C>> {
        if let Some(ref i) = self.inner {
            Some(i)
        } else {
            None
        }
    }

    fn cookie_ref(&self) -> &C {
        &self.cookie
    }

    fn position(&self) -> u64 {
        self.position
    }
}
