//! Cryptographic primitives.
//!
//! This module contains the glue between OpenPGP data structures and
//! the RustCrypto implementations of the algorithms this crate
//! supports: RSA and DSA for public key operations, CAST5 and AES in
//! OpenPGP's CFB mode for symmetric encryption, and MD5, SHA-1 and
//! the SHA-2 family for hashing.

use std::fmt;
use std::io::Read;
use std::ops::{Deref, DerefMut};

use rand::RngCore;

use crate::types::HashAlgorithm;
use crate::Result;

mod asymmetric;
pub(crate) mod dsa;
pub mod hash;
pub mod mem;
pub mod mpi;
pub(crate) mod rsa;
pub mod s2k;
pub(crate) mod symmetric;

pub use self::asymmetric::KeyPair;
pub use self::s2k::S2K;

/// Fills the given buffer with random data.
pub fn random<B: AsMut<[u8]>>(mut buf: B) {
    rand::rngs::OsRng.fill_bytes(buf.as_mut());
}

// Newtypes around `mem::Protected`, so that secrets of different
// kinds cannot be mixed up.
macro_rules! secret {
    ( $(#[$attr:meta])* $name:ident ) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(mem::Protected);

        impl From<mem::Protected> for $name {
            fn from(v: mem::Protected) -> Self {
                $name(v)
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(v: Vec<u8>) -> Self {
                $name(v.into())
            }
        }

        impl From<&[u8]> for $name {
            fn from(v: &[u8]) -> Self {
                $name(v.into())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

secret! {
    /// Holds a session key.
    ///
    /// The session key is cleared when dropped.
    SessionKey
}

impl SessionKey {
    /// Creates a new random session key of `size` bytes.
    pub fn new(size: usize) -> Self {
        let mut sk = mem::Protected::zeroed(size);
        random(&mut sk[..]);
        Self(sk)
    }
}

impl Deref for SessionKey {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for SessionKey {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionKey ({:?})", self.0)
    }
}

secret! {
    /// Holds a password.
    ///
    /// The password is cleared when dropped.
    Password
}

impl From<String> for Password {
    fn from(v: String) -> Self {
        v.into_bytes().into()
    }
}

impl From<&str> for Password {
    fn from(v: &str) -> Self {
        v.as_bytes().into()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if cfg!(debug_assertions) {
            write!(f, "Password({:?})", String::from_utf8_lossy(&self.0))
        } else {
            f.write_str("Password(<Redacted>)")
        }
    }
}

impl Password {
    /// Maps the given function over the password.
    pub fn map<F, T>(&self, mut fun: F) -> T
        where F: FnMut(&mem::Protected) -> T
    {
        fun(&self.0)
    }

    /// Prompts for a password on the controlling terminal.
    pub fn from_tty(prompt: &str) -> Result<Password> {
        Ok(rpassword::read_password_from_tty(Some(prompt))?.into())
    }
}

/// Hashes the specified file.
///
/// This is useful when verifying detached signatures.
pub fn hash_file<R: Read>(reader: R, algos: &[HashAlgorithm])
    -> Result<Vec<hash::Context>>
{
    use buffered_reader::BufferedReader;

    let mut hashes = algos.iter()
        .map(|a| a.context())
        .collect::<Result<Vec<_>>>()?;

    let mut reader = buffered_reader::Generic::new(reader, None);
    while ! reader.eof() {
        let chunk = reader.data_consume(64 * 1024)?;
        hashes.iter_mut().for_each(|h| h.update(chunk));
    }

    Ok(hashes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_file_test() {
        let data = std::fs::read(
            crate::path_to("messages/numbers.txt")).unwrap();

        let mut result = hash_file(std::io::Cursor::new(&data[..]),
                                   &[HashAlgorithm::SHA1,
                                     HashAlgorithm::SHA512])
            .unwrap();
        for (h, algo) in result.iter_mut()
            .zip([HashAlgorithm::SHA1, HashAlgorithm::SHA512].iter())
        {
            let mut expected = algo.context().unwrap();
            expected.update(&data);
            assert_eq!(h.algo(), *algo);
            assert_eq!(h.digest(), expected.digest());
        }
    }

    #[test]
    fn session_keys() {
        let a = SessionKey::new(16);
        let b = SessionKey::new(16);
        assert_eq!(a.len(), 16);
        assert!(a != b);
    }
}
