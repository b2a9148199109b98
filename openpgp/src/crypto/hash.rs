//! Cryptographic hash functions and hashing of OpenPGP data
//! structures.
//!
//! This module provides [`Context`], a hash function context that
//! is independent of the algorithm, as well as the [`Hash`] trait
//! that handles hashing of OpenPGP data structures.
//!
//!   [`Context`]: struct.Context.html
//!   [`Hash`]: trait.Hash.html

use std::fmt;
use std::io;

use digest::DynDigest;

use crate::Error;
use crate::Result;
use crate::types::HashAlgorithm;

/// State of a hash function.
///
/// `Context`s are created using [`HashAlgorithm::context`].
///
/// A context can be put into text mode, which canonicalizes line
/// endings to `\r\n` on the fly, as required for signatures of type
/// `Text`.
///
///   [`HashAlgorithm::context`]: ../../types/enum.HashAlgorithm.html#method.context
pub struct Context {
    algo: HashAlgorithm,
    ctx: Box<dyn DynDigest>,
    text: bool,
    // In text mode, whether the last byte hashed was a '\r'.
    last_cr: bool,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Context {
            algo: self.algo,
            ctx: self.ctx.box_clone(),
            text: self.text,
            last_cr: self.last_cr,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("algo", &self.algo)
            .field("text", &self.text)
            .finish()
    }
}

impl Context {
    /// Returns the algorithm.
    pub fn algo(&self) -> HashAlgorithm {
        self.algo
    }

    /// Size of the digest in bytes.
    pub fn digest_size(&self) -> usize {
        self.ctx.output_size()
    }

    /// Returns whether the context canonicalizes line endings.
    pub fn text_mode(&self) -> bool {
        self.text
    }

    /// Switches line ending canonicalization on or off.
    pub fn set_text_mode(&mut self, text: bool) {
        self.text = text;
        self.last_cr = false;
    }

    /// Writes data into the hash function.
    pub fn update<D: AsRef<[u8]>>(&mut self, data: D) {
        let data = data.as_ref();
        if ! self.text {
            self.ctx.update(data);
            return;
        }

        // Replace every bare '\n' with "\r\n".
        let mut start = 0;
        for (i, &b) in data.iter().enumerate() {
            if b == b'\n' {
                let prev_cr = if i == 0 { self.last_cr } else { data[i - 1] == b'\r' };
                if ! prev_cr {
                    self.ctx.update(&data[start..i]);
                    self.ctx.update(b"\r");
                    start = i;
                }
            }
        }
        self.ctx.update(&data[start..]);
        if let Some(&last) = data.last() {
            self.last_cr = last == b'\r';
        }
    }

    /// Finalizes the hash function and returns the digest.
    ///
    /// Resets the context.
    pub fn digest(&mut self) -> Vec<u8> {
        self.last_cr = false;
        self.ctx.finalize_reset().into_vec()
    }

    /// Finalizes the hash function and returns the digest.
    pub fn into_digest(mut self) -> Vec<u8> {
        self.digest()
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl HashAlgorithm {
    /// Creates a new hash context for this algorithm.
    ///
    /// # Errors
    ///
    /// Fails with `Error::UnsupportedHashAlgorithm` if the algorithm
    /// is not supported.
    pub fn context(self) -> Result<Context> {
        let ctx: Box<dyn DynDigest> = match self {
            HashAlgorithm::MD5 => Box::new(md5::Md5::default()),
            HashAlgorithm::SHA1 => Box::new(sha1::Sha1::default()),
            HashAlgorithm::SHA224 => Box::new(sha2::Sha224::default()),
            HashAlgorithm::SHA256 => Box::new(sha2::Sha256::default()),
            HashAlgorithm::SHA384 => Box::new(sha2::Sha384::default()),
            HashAlgorithm::SHA512 => Box::new(sha2::Sha512::default()),
            _ => return Err(Error::UnsupportedHashAlgorithm(self).into()),
        };

        Ok(Context {
            algo: self,
            ctx,
            text: false,
            last_cr: false,
        })
    }

    /// Returns the ASN.1 DigestInfo prefix used by EMSA-PKCS1-v1_5.
    ///
    /// See [Section 5.2.2 of RFC 4880].
    ///
    ///   [Section 5.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.2
    pub fn digest_info_prefix(self) -> Result<&'static [u8]> {
        match self {
            HashAlgorithm::MD5 => Ok(&[
                0x30, 0x20, 0x30, 0x0C, 0x06, 0x08, 0x2A, 0x86,
                0x48, 0x86, 0xF7, 0x0D, 0x02, 0x05, 0x05, 0x00,
                0x04, 0x10,
            ]),
            HashAlgorithm::SHA1 => Ok(&[
                0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0E,
                0x03, 0x02, 0x1A, 0x05, 0x00, 0x04, 0x14,
            ]),
            HashAlgorithm::SHA224 => Ok(&[
                0x30, 0x2d, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86,
                0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x04, 0x05,
                0x00, 0x04, 0x1C,
            ]),
            HashAlgorithm::SHA256 => Ok(&[
                0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86,
                0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05,
                0x00, 0x04, 0x20,
            ]),
            HashAlgorithm::SHA384 => Ok(&[
                0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86,
                0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02, 0x05,
                0x00, 0x04, 0x30,
            ]),
            HashAlgorithm::SHA512 => Ok(&[
                0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86,
                0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03, 0x05,
                0x00, 0x04, 0x40,
            ]),
            _ => Err(Error::UnsupportedHashAlgorithm(self).into()),
        }
    }
}

/// Hashes OpenPGP packets and related types.
///
/// Some OpenPGP data structures need to be hashed to be covered by
/// OpenPGP signatures.  Hashing is based on the serialized form,
/// with some aspects fixed to ensure consistent results, see
/// [Section 5.2.4 of RFC 4880].
///
///   [Section 5.2.4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.4
pub trait Hash {
    /// Updates the given hash with this object.
    fn hash(&self, hash: &mut Context);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fmt::hex;

    fn digest(algo: HashAlgorithm, data: &[u8]) -> String {
        let mut ctx = algo.context().unwrap();
        ctx.update(data);
        hex::encode(ctx.digest())
    }

    #[test]
    fn known_answers() {
        assert_eq!(digest(HashAlgorithm::MD5, b""),
                   "D41D8CD98F00B204E9800998ECF8427E");
        assert_eq!(digest(HashAlgorithm::SHA1, b"abc"),
                   "A9993E364706816ABA3E25717850C26C9CD0D89D");
        assert_eq!(digest(HashAlgorithm::SHA224, b"abc"),
                   "23097D223405D8228642A477BDA255B32AADBCE4BDA0B3F7E36C9DA7");
        assert_eq!(digest(HashAlgorithm::SHA256, b"abc"),
                   "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD");
        assert!(HashAlgorithm::RipeMD.context().is_err());
    }

    #[test]
    fn text_mode() {
        let expected = digest(HashAlgorithm::SHA256, b"one\r\ntwo\r\nthree\r\n");

        // Bare line feeds, split across updates.
        let mut ctx = HashAlgorithm::SHA256.context().unwrap();
        ctx.set_text_mode(true);
        ctx.update(b"one\ntw");
        ctx.update(b"o\n");
        ctx.update(b"three\n");
        assert_eq!(hex::encode(ctx.digest()), expected);

        // Already canonical, with the "\r\n" split across updates.
        let mut ctx = HashAlgorithm::SHA256.context().unwrap();
        ctx.set_text_mode(true);
        ctx.update(b"one\r");
        ctx.update(b"\ntwo\r\nthree\r");
        ctx.update(b"\n");
        assert_eq!(hex::encode(ctx.digest()), expected);
    }

    #[test]
    fn clone_forks() {
        let mut a = HashAlgorithm::SHA1.context().unwrap();
        a.update(b"ab");
        let mut b = a.clone();
        a.update(b"c");
        b.update(b"c");
        assert_eq!(a.digest(), b.digest());
    }
}
