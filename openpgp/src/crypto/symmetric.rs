//! Symmetric encryption.
//!
//! OpenPGP uses a variant of CFB mode, see [Section 13.9 of RFC
//! 4880].  Integrity protected data uses plain CFB with an all zero
//! IV.  Legacy encrypted data additionally resynchronizes the cipher
//! after the random prefix, using the last block of ciphertext as the
//! new IV.
//!
//!   [Section 13.9 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-13.9

use std::fmt;
use std::io;

use cipher::{BlockCipher, BlockEncryptMut, KeyInit, KeyIvInit};

use buffered_reader::BufferedReader;

use crate::crypto::SessionKey;
use crate::types::SymmetricAlgorithm;
use crate::Error;
use crate::Result;

/// A block cipher in CFB mode, either encrypting or decrypting.
pub(crate) trait Mode {
    /// Encrypts or decrypts `buf` in place.
    ///
    /// The mode keeps track of partial blocks between calls.
    fn apply(&mut self, buf: &mut [u8]);
}

struct CfbEncrypt<C: BlockEncryptMut + BlockCipher>(cfb_mode::BufEncryptor<C>);

impl<C: BlockEncryptMut + BlockCipher> Mode for CfbEncrypt<C> {
    fn apply(&mut self, buf: &mut [u8]) {
        self.0.encrypt(buf)
    }
}

struct CfbDecrypt<C: BlockEncryptMut + BlockCipher>(cfb_mode::BufDecryptor<C>);

impl<C: BlockEncryptMut + BlockCipher> Mode for CfbDecrypt<C> {
    fn apply(&mut self, buf: &mut [u8]) {
        self.0.decrypt(buf)
    }
}

fn cfb<C>(encrypt: bool, key: &[u8], iv: &[u8]) -> Result<Box<dyn Mode>>
    where C: BlockEncryptMut + BlockCipher + KeyInit + 'static
{
    let bad = |_| Error::InvalidArgument(
        format!("Bad key or IV size: {} / {} bytes", key.len(), iv.len()));

    if encrypt {
        Ok(Box::new(CfbEncrypt::<C>(
            cfb_mode::BufEncryptor::new_from_slices(key, iv).map_err(bad)?)))
    } else {
        Ok(Box::new(CfbDecrypt::<C>(
            cfb_mode::BufDecryptor::new_from_slices(key, iv).map_err(bad)?)))
    }
}

impl SymmetricAlgorithm {
    fn make_cfb(self, encrypt: bool, key: &[u8], iv: &[u8])
                -> Result<Box<dyn Mode>> {
        match self {
            SymmetricAlgorithm::CAST5 => cfb::<cast5::Cast5>(encrypt, key, iv),
            SymmetricAlgorithm::AES128 => cfb::<aes::Aes128>(encrypt, key, iv),
            SymmetricAlgorithm::AES192 => cfb::<aes::Aes192>(encrypt, key, iv),
            SymmetricAlgorithm::AES256 => cfb::<aes::Aes256>(encrypt, key, iv),
            _ => Err(Error::UnsupportedSymmetricAlgorithm(self).into()),
        }
    }

    /// Creates a context for encrypting in CFB mode.
    pub(crate) fn make_encrypt_cfb(self, key: &[u8], iv: &[u8])
                                   -> Result<Box<dyn Mode>> {
        self.make_cfb(true, key, iv)
    }

    /// Creates a context for decrypting in CFB mode.
    pub(crate) fn make_decrypt_cfb(self, key: &[u8], iv: &[u8])
                                   -> Result<Box<dyn Mode>> {
        self.make_cfb(false, key, iv)
    }
}

/// Encrypts or decrypts `buf` in place in plain CFB mode.
///
/// Used for secret key material, which is a single message.
pub(crate) fn cfb_in_place(algo: SymmetricAlgorithm, encrypt: bool,
                           key: &[u8], iv: &[u8], buf: &mut [u8])
                           -> Result<()> {
    algo.make_cfb(encrypt, key, iv)?.apply(buf);
    Ok(())
}

// State needed for the resynchronization after the random prefix.
struct Resync {
    algo: SymmetricAlgorithm,
    key: SessionKey,
    // The length of the random prefix, block size plus two.
    len: usize,
    // The ciphertext of the prefix seen so far.
    prefix: Vec<u8>,
}

/// A `Read`er for decrypting symmetrically encrypted data.
pub struct Decryptor<R: io::Read> {
    // The encrypted data.
    source: R,
    dec: Box<dyn Mode>,
    resync: Option<Resync>,
}

impl<R: io::Read> Decryptor<R> {
    /// Instantiates a new symmetric decryptor.
    ///
    /// If `resync` is set, the cipher is resynchronized after the
    /// random prefix, as legacy encrypted data requires.
    ///
    /// On failure, `source` is handed back together with the error.
    pub(crate) fn new(algo: SymmetricAlgorithm, key: &[u8], resync: bool,
                      source: R)
        -> std::result::Result<Self, (R, anyhow::Error)>
    {
        let bs = match algo.block_size() {
            Ok(bs) => bs,
            Err(e) => return Err((source, e)),
        };
        let dec = match algo.make_decrypt_cfb(key, &vec![0u8; bs]) {
            Ok(dec) => dec,
            Err(e) => return Err((source, e)),
        };
        let resync = if resync {
            Some(Resync {
                algo,
                key: key.into(),
                len: bs + 2,
                prefix: Vec::new(),
            })
        } else {
            None
        };
        Ok(Decryptor { source, dec, resync })
    }

    /// Returns the wrapped reader.
    pub fn into_source(self) -> R {
        self.source
    }
}

impl<R: io::Read> io::Read for Decryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = match self.resync {
            Some(ref r) => {
                // Stop at the end of the prefix so that the cipher can
                // be switched.
                std::cmp::min(buf.len(), r.len - r.prefix.len())
            }
            None => buf.len(),
        };

        let n = self.source.read(&mut buf[..want])?;
        if let Some(ref mut r) = self.resync {
            r.prefix.extend_from_slice(&buf[..n]);
        }
        self.dec.apply(&mut buf[..n]);

        let done = match self.resync {
            Some(ref r) => r.prefix.len() == r.len,
            None => false,
        };
        if done {
            if let Some(r) = self.resync.take() {
                self.dec = r.algo.make_decrypt_cfb(&r.key, &r.prefix[2..])
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput,
                                                e.to_string()))?;
            }
        }

        Ok(n)
    }
}

/// A `BufferedReader` that decrypts symmetrically-encrypted data as
/// it is read.
pub(crate) struct BufferedReaderDecryptor<R: BufferedReader<C>, C> {
    reader: buffered_reader::Generic<Decryptor<R>, C>,
}

impl<R: BufferedReader<C>, C> BufferedReaderDecryptor<R, C> {
    /// Creates a decrypting reader over `reader`.
    ///
    /// If `resync` is set, the legacy resynchronization is performed
    /// after the random prefix.
    ///
    /// On failure, `reader` is handed back together with the error.
    pub fn with_cookie(algo: SymmetricAlgorithm, key: &[u8], resync: bool,
                       reader: R, cookie: C)
        -> std::result::Result<Self, (R, anyhow::Error)>
    {
        let dec = Decryptor::new(algo, key, resync, reader)?;
        Ok(BufferedReaderDecryptor {
            reader: buffered_reader::Generic::with_cookie(dec, None, cookie),
        })
    }
}

impl<R: BufferedReader<C>, C> io::Read for BufferedReaderDecryptor<R, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: BufferedReader<C>, C> fmt::Display for BufferedReaderDecryptor<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BufferedReaderDecryptor")
    }
}

impl<R: BufferedReader<C>, C> fmt::Debug for BufferedReaderDecryptor<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufferedReaderDecryptor")
            .field("reader", &self.reader.reader_ref().source)
            .finish()
    }
}

impl<R: BufferedReader<C>, C> BufferedReader<C>
        for BufferedReaderDecryptor<R, C> {
    fn buffer(&self) -> &[u8] {
        self.reader.buffer()
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data(amount)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data_hard(amount)
    }

    fn data_eof(&mut self) -> io::Result<&[u8]> {
        self.reader.data_eof()
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.reader.consume(amount)
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data_consume(amount)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.reader.data_consume_hard(amount)
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
        Some(&mut self.reader.reader_mut().source)
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
        Some(&self.reader.reader_ref().source)
    }

    fn into_inner<'b>(self: Box<Self>)
            -> Option<Box<dyn BufferedReader<C> + 'b>> where Self: 'b {
        Some(Box::new(self.reader.into_reader().into_source()))
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

/// A `Write`r for symmetrically encrypting data in plain CFB mode.
pub struct Encryptor<W: io::Write> {
    inner: Option<W>,
    cipher: Box<dyn Mode>,
    // A place to write encrypted data into.
    scratch: Vec<u8>,
}

impl<W: io::Write> Encryptor<W> {
    /// Instantiates a new symmetric encryptor with an all zero IV.
    pub fn new(algo: SymmetricAlgorithm, key: &[u8], sink: W) -> Result<Self> {
        let iv = vec![0u8; algo.block_size()?];
        Ok(Encryptor {
            inner: Some(sink),
            cipher: algo.make_encrypt_cfb(key, &iv)?,
            scratch: Vec::new(),
        })
    }

    /// Finishes encryption, returning the inner writer.
    pub fn finish(&mut self) -> Result<W> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush()?;
            Ok(inner)
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe,
                               "Inner writer was taken").into())
        }
    }

    /// Acquires a reference to the underlying writer.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }
}

impl<W: io::Write> io::Write for Encryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = self.inner.as_mut().ok_or_else(
            || io::Error::new(io::ErrorKind::BrokenPipe,
                              "Inner writer was taken"))?;

        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.apply(&mut self.scratch);
        inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            Some(ref mut inner) => inner.flush(),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe,
                                       "Inner writer was taken")),
        }
    }
}
