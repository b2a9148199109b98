//! Stackable writers.
//!
//! The writing side mirrors `buffered_reader::Stack`: a message is
//! written through a stack of filters, each of which transforms the
//! data and passes it on to the writer below it.  Finalizing a
//! filter flushes it and returns the writer below.

mod compress;
pub use self::compress::CompressionLevel;
use self::compress::Encoder;

use std::fmt;
use std::io;

use crate::armor;
use crate::crypto::symmetric;
use crate::types::{CompressionAlgorithm, SymmetricAlgorithm};
use crate::{Error, Result};

/// A stack of writers.
#[derive(Debug)]
pub struct Stack<'a, C>(BoxStack<'a, C>);

impl<'a, C> Stack<'a, C> {
    pub(crate) fn from(bs: BoxStack<'a, C>) -> Self {
        Stack(bs)
    }

    pub(crate) fn as_ref(&self) -> &BoxStack<'a, C> {
        &self.0
    }

    pub(crate) fn as_mut(&mut self) -> &mut BoxStack<'a, C> {
        &mut self.0
    }

    /// Returns the number of bytes written to the topmost writer.
    pub fn position(&self) -> u64 {
        self.0.position()
    }

    /// Returns the number of writers on the stack.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        map(self.0.as_ref(), |_| {
            depth += 1;
            true
        });
        depth
    }

    /// Logs the writers at trace level, topmost first.
    pub fn trace(&self) {
        dump(self.0.as_ref());
    }

    /// Finalizes the topmost writer, returning the rest of the stack.
    pub fn finalize_one(self) -> Result<Option<Stack<'a, C>>> {
        Ok(self.0.into_inner()?.map(Stack::from))
    }

    /// Finalizes all writers, bottom one included.
    pub fn finalize(self) -> Result<()> {
        let mut stack = self;
        while let Some(below) = stack.finalize_one()? {
            stack = below;
        }
        Ok(())
    }
}

impl<'a, C> io::Write for Stack<'a, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a, C> From<Stack<'a, C>> for BoxStack<'a, C> {
    fn from(s: Stack<'a, C>) -> Self {
        s.0
    }
}

pub(crate) type BoxStack<'a, C> = Box<dyn Stackable<'a, C> + 'a>;

/// A writer that can be part of a [`Stack`].
///
/// Every writer carries a cookie, which the serializer uses to keep
/// track of the nesting level of the packet being written.
pub(crate) trait Stackable<'a, C> : io::Write + fmt::Debug {
    /// Finalizes this writer, and returns the one below it.
    ///
    /// Returns `None` for the bottom of the stack.
    fn into_inner(self: Box<Self>) -> Result<Option<BoxStack<'a, C>>>;

    /// Detaches the writer below this one.
    ///
    /// Writers that tee their input (the signer) implement this so
    /// that another writer can be slid in underneath them.
    fn detach(&mut self) -> Result<Option<BoxStack<'a, C>>> {
        Err(Error::InvalidOperation(
            "Writer cannot be detached from the stack".into()).into())
    }

    /// Reattaches a writer removed using [`Stackable::detach`].
    fn attach(&mut self, _below: BoxStack<'a, C>) -> Result<()> {
        Err(Error::InvalidOperation(
            "Writer cannot be attached to the stack".into()).into())
    }

    /// Returns the writer below this one.
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, C>>;

    /// Returns a reference to the cookie.
    fn cookie_ref(&self) -> &C;

    /// Returns the number of bytes written to this writer.
    fn position(&self) -> u64;
}

impl <'a, C> Stackable<'a, C> for BoxStack<'a, C> {
    fn into_inner(self: Box<Self>) -> Result<Option<BoxStack<'a, C>>> {
        (*self).into_inner()
    }
    fn detach(&mut self) -> Result<Option<BoxStack<'a, C>>> {
        self.as_mut().detach()
    }
    fn attach(&mut self, below: BoxStack<'a, C>) -> Result<()> {
        self.as_mut().attach(below)
    }
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, C>> {
        self.as_ref().inner_ref()
    }
    fn cookie_ref(&self) -> &C {
        self.as_ref().cookie_ref()
    }
    fn position(&self) -> u64 {
        self.as_ref().position()
    }
}

/// Calls `fun` on each writer, topmost first, until it returns
/// false.
pub(crate) fn map<C, F>(head: &dyn Stackable<C>, mut fun: F)
    where F: FnMut(&dyn Stackable<C>) -> bool {
    let mut next = Some(head);
    while let Some(w) = next {
        if ! fun(w) {
            break;
        }
        next = w.inner_ref();
    }
}

/// Logs the writer stack, topmost writer first.
pub(crate) fn dump<C>(head: &dyn Stackable<C>) {
    let mut depth = 0;
    map(head, |w| {
        log::trace!("{}: {:?}", depth, w);
        depth += 1;
        true
    });
}

/// The bottom of every stack, wrapping an `io::Write`.
pub struct Generic<W: io::Write, C> {
    sink: W,
    cookie: C,
    position: u64,
}

impl<'a, W: 'a + io::Write, C: 'a> Generic<W, C> {
    /// Wraps an `io::Write`r.
    pub fn new(sink: W, cookie: C) -> Stack<'a, C> {
        Stack::from(Box::new(Generic { sink, cookie, position: 0 }))
    }
}

impl<W: io::Write, C> fmt::Debug for Generic<W, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("writer::Generic")
            .field("position", &self.position)
            .finish()
    }
}

impl<W: io::Write, C> io::Write for Generic<W, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<'a, W: io::Write, C> Stackable<'a, C> for Generic<W, C> {
    fn into_inner(mut self: Box<Self>) -> Result<Option<BoxStack<'a, C>>> {
        self.sink.flush()?;
        Ok(None)
    }
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, C>> {
        None
    }
    fn cookie_ref(&self) -> &C {
        &self.cookie
    }
    fn position(&self) -> u64 {
        self.position
    }
}

/// A transformation that owns the writer below it.
///
/// The armor writer, the CFB encryptor and the compressors all
/// have this shape: they wrap the rest of the stack and emit a
/// trailer before handing it back.
pub(crate) trait Filter<'a, C>: io::Write {
    /// Emits any trailer and returns the writer below.
    fn finish_filter(self) -> Result<BoxStack<'a, C>>;

    /// Returns the writer below, unless it has been handed back.
    fn below(&self) -> Option<&BoxStack<'a, C>>;
}

impl<'a, C> Filter<'a, C> for armor::Writer<BoxStack<'a, C>> {
    fn finish_filter(self) -> Result<BoxStack<'a, C>> {
        self.finalize()
    }
    fn below(&self) -> Option<&BoxStack<'a, C>> {
        self.get_ref()
    }
}

impl<'a, C> Filter<'a, C> for symmetric::Encryptor<BoxStack<'a, C>> {
    fn finish_filter(mut self) -> Result<BoxStack<'a, C>> {
        symmetric::Encryptor::finish(&mut self)
    }
    fn below(&self) -> Option<&BoxStack<'a, C>> {
        self.get_ref()
    }
}

impl<'a, C> Filter<'a, C> for Encoder<BoxStack<'a, C>> {
    fn finish_filter(self) -> Result<BoxStack<'a, C>> {
        Ok(self.finish()?)
    }
    fn below(&self) -> Option<&BoxStack<'a, C>> {
        Some(self.get_ref())
    }
}

/// Puts a [`Filter`] on the stack.
struct Filtered<F, C> {
    name: &'static str,
    filter: F,
    cookie: C,
    position: u64,
}

impl<'a, F, C> Filtered<F, C>
    where F: Filter<'a, C> + 'a, C: 'a
{
    fn push(name: &'static str, filter: F, cookie: C) -> Stack<'a, C> {
        Stack::from(Box::new(Filtered { name, filter, cookie, position: 0 }))
    }
}

impl<'a, F, C> fmt::Debug for Filtered<F, C>
    where F: Filter<'a, C>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct(self.name)
            .field("position", &self.position)
            .field("inner", &self.filter.below())
            .finish()
    }
}

impl<'a, F, C> io::Write for Filtered<F, C>
    where F: Filter<'a, C>
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.filter.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.filter.flush()
    }
}

impl<'a, F, C> Stackable<'a, C> for Filtered<F, C>
    where F: Filter<'a, C>
{
    fn into_inner(self: Box<Self>) -> Result<Option<BoxStack<'a, C>>> {
        Ok(Some(self.filter.finish_filter()?))
    }
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, C>> {
        self.filter.below().map(|w| w as &dyn Stackable<'a, C>)
    }
    fn cookie_ref(&self) -> &C {
        &self.cookie
    }
    fn position(&self) -> u64 {
        self.position
    }
}

/// Pushes an ASCII armor writer.
pub fn armorer<'a, C: 'a, I, K, V>(inner: Stack<'a, C>, cookie: C,
                                   kind: armor::Kind, headers: I)
    -> Result<Stack<'a, C>>
    where I: IntoIterator<Item = (K, V)>,
          K: AsRef<str>,
          V: AsRef<str>,
{
    let w = armor::Writer::with_headers(inner.into(), kind, headers)?;
    Ok(Filtered::push("writer::Armorer", w, cookie))
}

/// Pushes an encrypting writer.
///
/// Encrypts everything written to it using OpenPGP's CFB mode with
/// an all zero IV, as used by encrypted data packets.
pub fn encryptor<'a, C: 'a>(inner: Stack<'a, C>, cookie: C,
                            algo: SymmetricAlgorithm, key: &[u8])
    -> Result<Stack<'a, C>>
{
    let w = symmetric::Encryptor::new(algo, key, inner.into())?;
    Ok(Filtered::push("writer::Encryptor", w, cookie))
}

/// Pushes a compressing writer.
///
/// `CompressionAlgorithm::Uncompressed` is accepted, and passes the
/// data through unchanged.
pub fn compressor<'a, C: 'a>(inner: Stack<'a, C>, cookie: C,
                             algo: CompressionAlgorithm,
                             level: CompressionLevel)
    -> Result<Stack<'a, C>>
{
    let w = Encoder::new(inner.into(), algo, level)?;
    Ok(Filtered::push("writer::Compressor", w, cookie))
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use super::*;

    #[derive(Debug)]
    struct Cookie {
        state: &'static str,
    }

    impl Cookie {
        fn new(state: &'static str) -> Self {
            Cookie { state }
        }
    }

    #[test]
    fn generic_writer() {
        let mut inner = Vec::new();
        {
            let mut w = Generic::new(&mut inner, Cookie::new("happy"));
            assert_eq!(w.as_ref().cookie_ref().state, "happy");

            w.write_all(b"be happy").unwrap();
            assert_eq!(w.position(), 8);

            let mut count = 0;
            map(w.as_ref().as_ref(), |g| {
                assert_eq!(g.cookie_ref().state, "happy");
                assert_eq!(g.position(), 8);
                assert!(g.inner_ref().is_none());
                count += 1;
                true
            });
            assert_eq!(count, 1);
            assert!(w.as_mut().detach().is_err());
            w.finalize().unwrap();
        }
        assert_eq!(&inner, b"be happy");
    }

    #[test]
    fn stack() {
        let mut inner = Vec::new();
        {
            let w = Generic::new(&mut inner, Cookie::new("bottom"));
            let w = compressor(w, Cookie::new("middle"),
                               CompressionAlgorithm::Uncompressed,
                               CompressionLevel::default()).unwrap();
            let mut w = compressor(w, Cookie::new("top"),
                                   CompressionAlgorithm::Uncompressed,
                                   CompressionLevel::default()).unwrap();
            w.trace();
            assert_eq!(w.depth(), 3);

            let mut states = Vec::new();
            map(w.as_ref().as_ref(), |g| {
                states.push(g.cookie_ref().state);
                true
            });
            assert_eq!(states, ["top", "middle", "bottom"]);

            w.write_all(b"abc").unwrap();
            assert_eq!(w.position(), 3);
            let w = w.finalize_one().unwrap().unwrap();
            assert_eq!(w.depth(), 2);
            w.finalize().unwrap();
        }
        assert_eq!(&inner, b"abc");
    }

    #[test]
    fn encrypting() {
        let algo = SymmetricAlgorithm::AES128;
        let key = [7u8; 16];
        let plaintext = b"attack at dawn, bring a thermos of coffee";

        let mut ciphertext = Vec::new();
        {
            let w = Generic::new(&mut ciphertext, Cookie::new(""));
            let mut w = encryptor(w, Cookie::new(""), algo, &key).unwrap();
            // Odd sizes to exercise partial blocks.
            w.write_all(&plaintext[..5]).unwrap();
            w.write_all(&plaintext[5..]).unwrap();
            w.finalize().unwrap();
        }
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let mut dec =
            symmetric::Decryptor::new(algo, &key, false, &ciphertext[..])
            .unwrap();
        let mut decrypted = Vec::new();
        dec.read_to_end(&mut decrypted).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn zlib() {
        let data = vec![b'x'; 10000];
        let mut compressed = Vec::new();
        {
            let w = Generic::new(&mut compressed, Cookie::new(""));
            let mut w = compressor(w, Cookie::new(""),
                                   CompressionAlgorithm::Zlib,
                                   CompressionLevel::default()).unwrap();
            w.write_all(&data).unwrap();
            w.finalize().unwrap();
        }
        assert!(compressed.len() < 100);

        let mut decompressed = Vec::new();
        flate2::read::ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn bzip2() {
        let data = vec![b'y'; 10000];
        let mut compressed = Vec::new();
        {
            let w = Generic::new(&mut compressed, Cookie::new(""));
            let mut w = compressor(w, Cookie::new(""),
                                   CompressionAlgorithm::BZip2,
                                   CompressionLevel::best()).unwrap();
            w.write_all(&data).unwrap();
            w.finalize().unwrap();
        }

        let mut decompressed = Vec::new();
        bzip2::read::BzDecoder::new(&compressed[..])
            .read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn armoring() {
        let mut armored = Vec::new();
        {
            let w = Generic::new(&mut armored, Cookie::new(""));
            let mut w = armorer(w, Cookie::new(""), armor::Kind::Message,
                                vec![("Comment", "test")]).unwrap();
            w.write_all(b"hello").unwrap();
            w.finalize().unwrap();
        }
        let s = String::from_utf8(armored).unwrap();
        assert!(s.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(s.contains("Comment: test\n"));
        assert!(s.ends_with("-----END PGP MESSAGE-----\n"));
    }
}
