use std::io;

use crate::types::CompressionAlgorithm;
use crate::{Error, Result};

/// Compression level.
///
/// Ranges from `0`, which only stores the data, to `9`, which
/// produces the smallest output.  The default is `6`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u8);

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel(6)
    }
}

impl CompressionLevel {
    /// Returns the given level, which must not exceed `9`.
    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidArgument(
                format!("Compression level {} out of range", level)).into());
        }
        Ok(CompressionLevel(level))
    }

    /// The fastest level.
    pub fn fastest() -> Self {
        CompressionLevel(1)
    }

    /// The level producing the smallest output.
    pub fn best() -> Self {
        CompressionLevel(9)
    }

    /// Returns the level as a number.
    pub fn level(&self) -> u8 {
        self.0
    }
}

/// An encoder for one of the compression algorithms.
///
/// `Store` passes the data through unchanged, as used for
/// `CompressionAlgorithm::Uncompressed`.
pub(crate) enum Encoder<W: io::Write> {
    Store(W),
    #[cfg(feature = "compression-deflate")]
    Zip(flate2::write::DeflateEncoder<W>),
    #[cfg(feature = "compression-deflate")]
    Zlib(flate2::write::ZlibEncoder<W>),
    #[cfg(feature = "compression-bzip2")]
    BZip2(bzip2::write::BzEncoder<W>),
}

impl<W: io::Write> Encoder<W> {
    pub(crate) fn new(inner: W, algo: CompressionAlgorithm,
                      level: CompressionLevel)
        -> Result<Self>
    {
        #[allow(unused_variables)]
        let level = u32::from(level.0);
        Ok(match algo {
            CompressionAlgorithm::Uncompressed => Encoder::Store(inner),
            #[cfg(feature = "compression-deflate")]
            CompressionAlgorithm::Zip =>
                Encoder::Zip(flate2::write::DeflateEncoder::new(
                    inner, flate2::Compression::new(level))),
            #[cfg(feature = "compression-deflate")]
            CompressionAlgorithm::Zlib =>
                Encoder::Zlib(flate2::write::ZlibEncoder::new(
                    inner, flate2::Compression::new(level))),
            // bzip2 knows no level 0.
            #[cfg(feature = "compression-bzip2")]
            CompressionAlgorithm::BZip2 =>
                Encoder::BZip2(bzip2::write::BzEncoder::new(
                    inner, bzip2::Compression::new(level.max(1)))),
            a => return Err(Error::UnsupportedCompressionAlgorithm(a).into()),
        })
    }

    /// Returns the algorithm.
    pub(crate) fn algo(&self) -> CompressionAlgorithm {
        match self {
            Encoder::Store(_) => CompressionAlgorithm::Uncompressed,
            #[cfg(feature = "compression-deflate")]
            Encoder::Zip(_) => CompressionAlgorithm::Zip,
            #[cfg(feature = "compression-deflate")]
            Encoder::Zlib(_) => CompressionAlgorithm::Zlib,
            #[cfg(feature = "compression-bzip2")]
            Encoder::BZip2(_) => CompressionAlgorithm::BZip2,
        }
    }

    /// Writes the trailer, and returns the inner writer.
    pub(crate) fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Store(w) => Ok(w),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zip(e) => e.finish(),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zlib(e) => e.finish(),
            #[cfg(feature = "compression-bzip2")]
            Encoder::BZip2(e) => e.finish(),
        }
    }

    pub(crate) fn get_ref(&self) -> &W {
        match self {
            Encoder::Store(w) => w,
            #[cfg(feature = "compression-deflate")]
            Encoder::Zip(e) => e.get_ref(),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zlib(e) => e.get_ref(),
            #[cfg(feature = "compression-bzip2")]
            Encoder::BZip2(e) => e.get_ref(),
        }
    }
}

impl<W: io::Write> io::Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Store(w) => w.write(buf),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zip(e) => e.write(buf),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zlib(e) => e.write(buf),
            #[cfg(feature = "compression-bzip2")]
            Encoder::BZip2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Store(w) => w.flush(),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zip(e) => e.flush(),
            #[cfg(feature = "compression-deflate")]
            Encoder::Zlib(e) => e.flush(),
            #[cfg(feature = "compression-bzip2")]
            Encoder::BZip2(e) => e.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(CompressionLevel::default().level(), 6);
        assert_eq!(CompressionLevel::new(9).unwrap(), CompressionLevel::best());
        assert!(CompressionLevel::new(10).is_err());
        assert!(CompressionLevel::fastest() < CompressionLevel::best());
    }

    #[test]
    fn store() {
        let mut e = Encoder::new(Vec::new(), CompressionAlgorithm::Uncompressed,
                                 CompressionLevel::default()).unwrap();
        io::Write::write_all(&mut e, b"as is").unwrap();
        assert_eq!(e.algo(), CompressionAlgorithm::Uncompressed);
        assert_eq!(e.finish().unwrap(), b"as is");
    }

    #[test]
    fn unsupported() {
        assert!(Encoder::new(Vec::new(), CompressionAlgorithm::Unknown(99),
                             CompressionLevel::default()).is_err());
    }
}
