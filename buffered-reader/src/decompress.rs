use std::io;
use std::fmt;

#[cfg(feature = "compression-bzip2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "compression-deflate")]
use flate2::read::{DeflateDecoder, ZlibDecoder};

use super::*;

// All decoders have the same shape: a `Generic` over the decoder,
// which in turn reads from the wrapped `BufferedReader`.
macro_rules! decompressor {
    ($name:ident, $decoder:ident, $what:expr) => {
        #[doc = "Decompresses the wrapped `BufferedReader` using "]
        #[doc = $what]
        #[doc = "."]
        pub struct $name<R: BufferedReader<C>, C> {
            reader: Generic<$decoder<R>, C>,
        }

        impl<R: BufferedReader<()>> $name<R, ()> {
            /// Instantiates a new decompression reader.
            ///
            /// `reader` is the source to wrap.
            pub fn new(reader: R) -> Self {
                Self::with_cookie(reader, ())
            }
        }

        impl<R: BufferedReader<C>, C> $name<R, C> {
            /// Like `new()`, but sets a cookie.
            pub fn with_cookie(reader: R, cookie: C) -> Self {
                $name {
                    reader: Generic::with_cookie(
                        $decoder::new(reader), None, cookie),
                }
            }
        }

        impl<R: BufferedReader<C>, C> io::Read for $name<R, C> {
            fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
                self.reader.read(buf)
            }
        }

        impl<R: BufferedReader<C>, C> fmt::Display for $name<R, C> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, stringify!($name))
            }
        }

        impl<R: BufferedReader<C>, C> fmt::Debug for $name<R, C> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("reader", self.reader.reader_ref().get_ref())
                    .finish()
            }
        }

        impl<R: BufferedReader<C>, C> BufferedReader<C> for $name<R, C> {
            fn buffer(&self) -> &[u8] {
                self.reader.buffer()
            }

            fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
                self.reader.data(amount)
            }

            fn data_hard(&mut self, amount: usize)
                         -> Result<&[u8], io::Error> {
                self.reader.data_hard(amount)
            }

            fn data_eof(&mut self) -> Result<&[u8], io::Error> {
                self.reader.data_eof()
            }

            fn consume(&mut self, amount: usize) -> &[u8] {
                self.reader.consume(amount)
            }

            fn data_consume(&mut self, amount: usize)
                            -> Result<&[u8], io::Error> {
                self.reader.data_consume(amount)
            }

            fn data_consume_hard(&mut self, amount: usize)
                                 -> Result<&[u8], io::Error> {
                self.reader.data_consume_hard(amount)
            }

            fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
                Some(self.reader.reader_mut().get_mut())
            }

            fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
                Some(self.reader.reader_ref().get_ref())
            }

            fn into_inner<'b>(self: Box<Self>)
                    -> Option<Box<dyn BufferedReader<C> + 'b>>
                    where Self: 'b {
                Some(Box::new(self.reader.into_reader().into_inner()))
            }

            fn cookie_set(&mut self, cookie: C) -> C {
                self.reader.cookie_set(cookie)
            }

            fn cookie_ref(&self) -> &C {
                self.reader.cookie_ref()
            }

            fn cookie_mut(&mut self) -> &mut C {
                self.reader.cookie_mut()
            }
        }
    }
}

#[cfg(feature = "compression-deflate")]
decompressor!(Deflate, DeflateDecoder, "raw deflate (RFC 1951)");
#[cfg(feature = "compression-deflate")]
decompressor!(Zlib, ZlibDecoder, "zlib (RFC 1950)");
#[cfg(feature = "compression-bzip2")]
decompressor!(Bzip, BzDecoder, "bzip2");

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn input() -> Vec<u8> {
        (0..10 * DEFAULT_BUF_SIZE).map(|i| (i % 251) as u8).collect()
    }

    // Checks that buffer() returns the same data as data(), one byte
    // at a time.
    fn check<R: BufferedReader<()>>(mut reader: R, raw: &[u8]) {
        for i in 0..raw.len() {
            let data = reader.data(DEFAULT_BUF_SIZE + 1).unwrap().to_vec();
            assert!(data.len() > 0);
            assert_eq!(data, reader.buffer());
            assert_eq!(data, &raw[i..i + data.len()]);
            reader.consume(1);
        }
        assert!(reader.eof());
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn deflate() {
        let raw = input();
        let mut encoder = flate2::write::DeflateEncoder::new(
            Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        check(Deflate::new(Memory::new(&compressed)), &raw);
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn zlib() {
        let raw = input();
        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::new(), flate2::Compression::best());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        check(Zlib::new(Memory::new(&compressed)), &raw);
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn bzip() {
        let raw : &[u8] = include_bytes!("buffered-reader-test.txt");
        let mut encoder = bzip2::write::BzEncoder::new(
            Vec::new(), bzip2::Compression::best());
        encoder.write_all(raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut reader = Bzip::new(Memory::new(&compressed));
        buffered_reader_test_data_check(&mut reader);
        assert!(reader.eof());
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn inner_is_left_positioned() {
        // Data following the compressed stream is still there once
        // the decompressor is popped.
        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::new(), flate2::Compression::fast());
        encoder.write_all(b"compressed").unwrap();
        let mut stream = encoder.finish().unwrap();
        let n = stream.len();
        stream.extend_from_slice(b"tail");

        let inner = Region::new(Memory::new(&stream), n as u64).unwrap();
        let mut z = Zlib::new(inner);
        assert_eq!(z.steal_eof().unwrap(), b"compressed");
        let mut region = Box::new(z).into_inner().unwrap();
        region.drop_eof().unwrap();
        let mut memory = region.into_inner().unwrap();
        assert_eq!(memory.steal_eof().unwrap(), b"tail");
    }
}
