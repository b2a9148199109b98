use std::io;
use std::mem;
use std::fmt;

use buffered_reader::BufferedReader;
use buffered_reader::buffered_reader_generic_read_impl;

use crate::crypto::hash;
use crate::parse::Cookie;

/// Hashes everything that is consumed through it.
///
/// The hash contexts live in the reader's cookie, so that they can be
/// recovered from the top of a reader stack before the filter is
/// popped.
pub(crate) struct HashedReader<R: BufferedReader<Cookie>> {
    reader: R,
    cookie: Cookie,
}

impl<R: BufferedReader<Cookie>> fmt::Display for HashedReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HashedReader")
    }
}

impl<R: BufferedReader<Cookie>> fmt::Debug for HashedReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HashedReader")
            .field("cookie", &self.cookie)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<R: BufferedReader<Cookie>> HashedReader<R> {
    /// Instantiates a new hashed reader.  Every consumed byte is
    /// added to each of `hashes`.
    pub fn new(reader: R, hashes: Vec<hash::Context>) -> Self {
        HashedReader {
            reader,
            cookie: Cookie { hashes },
        }
    }
}

impl<R: BufferedReader<Cookie>> HashedReader<R> {
    // Feeds up to `amount` bytes of what the inner reader has
    // buffered into the hashes.  The fields are borrowed separately,
    // so the buffer need not be copied.
    fn hash_buffered(&mut self, amount: usize) {
        let buffered = self.reader.buffer();
        let n = buffered.len().min(amount);
        if n > 0 {
            self.cookie.hashes.iter_mut()
                .for_each(|h| h.update(&buffered[..n]));
        }
    }
}

impl<R: BufferedReader<Cookie>> io::Read for HashedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<R: BufferedReader<Cookie>> BufferedReader<Cookie> for HashedReader<R> {
    fn buffer(&self) -> &[u8] {
        self.reader.buffer()
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data(amount)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data_hard(amount)
    }

    // Consuming is limited to what is buffered, so hashing the
    // buffer prefix sees exactly the consumed bytes.
    fn consume(&mut self, amount: usize) -> &[u8] {
        self.hash_buffered(amount);
        self.reader.consume(amount)
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        let available = self.reader.data(amount)?.len();
        let amount = available.min(amount);
        self.hash_buffered(amount);
        self.reader.data_consume(amount)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data_hard(amount)?;
        self.hash_buffered(amount);
        self.reader.data_consume_hard(amount)
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
        mem::replace(&mut self.cookie, cookie)
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
    use crate::types::HashAlgorithm;

    #[test]
    fn hash_test_1() {
        struct Test<'a> {
            data: &'a [u8],
            expected: Vec<(HashAlgorithm, &'a str)>,
        }

        let tests = [
            Test {
                data: &b"foobar\n"[..],
                expected: vec![
                    (HashAlgorithm::SHA1,
                     "988881adc9fc3655077dc2d4d757d480b5ea0e11"),
                ],
            },
            Test {
                data: &b"0123456789012345678901234567890123456789012345678901234567890123456789012345678901234567890123456789\n"[..],
                expected: vec![
                    (HashAlgorithm::SHA1,
                     "1d12c55b3a85daab4776a1df41a8f30ada099e11"),
                    (HashAlgorithm::SHA224,
                     "a4c1bde77c682a0e9e30c6afdd1ece2397ffeec61dde2a0eaa23191e"),
                    (HashAlgorithm::SHA256,
                    "151a1d51a1870dc244f07f4844f46ee65fae19a8efeb60b203a074aff899e27d"),
                    (HashAlgorithm::SHA384,
                    "5bea68c8c696bbed95e152d61c446ad0e05bf68f7df39cbfeae568bee6f6691c840fb1d5dd2599737b08dbb33eed344b"),
                    (HashAlgorithm::SHA512,
                     "5fa032487774082af5cc833c2db5f943e31cc75cd2bfaa7d9bbd0ccabf5403b6dbcb484254727a524588f20e9ef336d8ce8533332c5ac1b9d50af3003a0da8d8"),
                ],
            },
        ];

        for test in tests.iter() {
            let reader = buffered_reader::Memory::with_cookie(
                test.data, Cookie::default());
            let hashes = test.expected.iter()
                .map(|(algo, _)| algo.context().unwrap())
                .collect();
            let mut reader = HashedReader::new(reader, hashes);

            // Mix the different ways of consuming data.
            assert_eq!(reader.data_consume_hard(3).unwrap()[..3],
                       test.data[..3]);
            reader.data(5).unwrap();
            reader.consume(2);
            assert_eq!(reader.steal_eof().unwrap(), &test.data[5..]);

            let hashes = mem::take(&mut reader.cookie_mut().hashes);
            for (h, (algo, expected)) in hashes.into_iter()
                .zip(test.expected.iter())
            {
                assert_eq!(crate::fmt::hex::encode(h.into_digest()),
                           expected.to_uppercase(), "Algo: {:?}", algo);
            }
        }
    }

    #[test]
    fn only_consumed_data_is_hashed() {
        let data = b"0123456789";
        let reader = buffered_reader::Memory::with_cookie(
            &data[..], Cookie::default());
        let mut reader = HashedReader::new(
            reader, vec![HashAlgorithm::SHA256.context().unwrap()]);

        // Peeking doesn't hash.
        reader.data(10).unwrap();
        reader.consume(4);

        let mut expected = HashAlgorithm::SHA256.context().unwrap();
        expected.update(b"0123");
        let h = mem::take(&mut reader.cookie_mut().hashes).pop().unwrap();
        assert_eq!(h.into_digest(), expected.into_digest());
    }
}
