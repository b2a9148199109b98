//! String-to-Key (S2K) specifiers.
//!
//! String-to-key (S2K) specifiers are used to convert password
//! strings into symmetric-key encryption/decryption keys.  See
//! [Section 3.7 of RFC 4880].
//!
//!   [Section 3.7 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3.7

use std::fmt;
use std::io::Write;

use crate::crypto::Password;
use crate::crypto::SessionKey;
use crate::crypto::mem::Protected;
use crate::serialize::Marshal;
use crate::types::HashAlgorithm;
use crate::Error;
use crate::Result;

/// String-to-Key (S2K) specifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum S2K {
    /// Simply hashes the password.
    Simple {
        /// Hash used for key derivation.
        hash: HashAlgorithm,
    },
    /// Hashes the password with a public `salt` value.
    Salted {
        /// Hash used for key derivation.
        hash: HashAlgorithm,
        /// Public salt value mixed into the password.
        salt: [u8; 8],
    },
    /// Repeatedly hashes the password with a public `salt` value.
    Iterated {
        /// Hash used for key derivation.
        hash: HashAlgorithm,
        /// Public salt value mixed into the password.
        salt: [u8; 8],
        /// The coded number of bytes to hash.
        coded_count: u8,
    },
    /// Unknown S2K algorithm.
    Unknown(u8),
}

impl Default for S2K {
    /// Iterated and salted with SHA-1, hashing 65536 bytes, which is
    /// what GnuPG uses for protecting secret keys.
    fn default() -> Self {
        let mut salt = [0u8; 8];
        crate::crypto::random(&mut salt);
        S2K::Iterated {
            hash: HashAlgorithm::SHA1,
            salt,
            coded_count: 96,
        }
    }
}

impl S2K {
    /// Returns the S2K type octet.
    pub fn type_octet(&self) -> u8 {
        match self {
            S2K::Simple { .. } => 0,
            S2K::Salted { .. } => 1,
            S2K::Iterated { .. } => 3,
            S2K::Unknown(u) => *u,
        }
    }

    /// Decodes the OpenPGP encoding of the number of bytes to hash.
    pub fn decode_count(coded: u8) -> u32 {
        let mantissa = 16 + (coded as u32 & 15);
        let exp = (coded as u32 >> 4) + 6;
        mantissa << exp
    }

    /// Converts the password to a key of `key_size` bytes using the
    /// S2K's parameters.
    ///
    /// If the hash's digest is shorter than the key, several hash
    /// contexts are used, the n-th one preloaded with n zero bytes.
    pub fn derive_key(&self, password: &Password, key_size: usize)
                      -> Result<SessionKey> {
        let hash = match self {
            S2K::Simple { hash } | S2K::Salted { hash, .. }
            | S2K::Iterated { hash, .. } => *hash,
            S2K::Unknown(u) =>
                return Err(Error::BadS2K(
                    format!("Unknown S2K type {:#x}", u)).into()),
        };

        let mut ctx = hash.context()?;
        let mut key = Protected::zeroed(key_size);
        let mut zeros: Vec<u8> = Vec::new();

        password.map(|password| {
            for chunk in key.chunks_mut(ctx.digest_size()) {
                ctx.update(&zeros);

                match self {
                    S2K::Simple { .. } => ctx.update(&password[..]),
                    S2K::Salted { salt, .. } => {
                        ctx.update(salt);
                        ctx.update(&password[..]);
                    }
                    S2K::Iterated { salt, coded_count, .. } => {
                        let data_len = salt.len() + password.len();
                        // The whole salt and password are always
                        // hashed at least once.
                        let count = std::cmp::max(
                            Self::decode_count(*coded_count) as usize,
                            data_len);

                        let mut data = Protected::zeroed(data_len);
                        data[..salt.len()].copy_from_slice(salt);
                        data[salt.len()..].copy_from_slice(&password[..]);

                        for _ in 0..count / data_len {
                            ctx.update(&data[..]);
                        }
                        ctx.update(&data[..count % data_len]);
                    }
                    S2K::Unknown(_) => (),
                }

                let digest: Protected = ctx.digest().into();
                let n = chunk.len();
                chunk.copy_from_slice(&digest[..n]);
                zeros.push(0);
            }
        });

        Ok(key.into())
    }
}

impl fmt::Display for S2K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            S2K::Simple { hash } => write!(f, "Simple S2K with {}", hash),
            S2K::Salted { hash, salt } =>
                write!(f, "Salted S2K with {} and salt {}",
                       hash, crate::fmt::hex::encode(salt)),
            S2K::Iterated { hash, salt, coded_count } =>
                write!(f, "Iterated and Salted S2K with {}, salt {} and \
                           {} bytes hashed",
                       hash, crate::fmt::hex::encode(salt),
                       Self::decode_count(*coded_count)),
            S2K::Unknown(u) => write!(f, "Unknown S2K {}", u),
        }
    }
}

impl Marshal for S2K {
    fn serialize(&self, w: &mut dyn Write) -> Result<()> {
        w.write_all(&[self.type_octet()])?;
        match self {
            S2K::Simple { hash } => w.write_all(&[u8::from(*hash)])?,
            S2K::Salted { hash, salt } => {
                w.write_all(&[u8::from(*hash)])?;
                w.write_all(salt)?;
            }
            S2K::Iterated { hash, salt, coded_count } => {
                w.write_all(&[u8::from(*hash)])?;
                w.write_all(salt)?;
                w.write_all(&[*coded_count])?;
            }
            S2K::Unknown(_) => (),
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        match self {
            S2K::Simple { .. } => 2,
            S2K::Salted { .. } => 10,
            S2K::Iterated { .. } => 11,
            S2K::Unknown(_) => 1,
        }
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for S2K {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;
        let hash = HashAlgorithm::arbitrary(g);
        let mut salt = [0u8; 8];
        for b in salt.iter_mut() {
            *b = u8::arbitrary(g);
        }
        match u8::arbitrary(g) % 3 {
            0 => S2K::Simple { hash },
            1 => S2K::Salted { hash, salt },
            _ => S2K::Iterated { hash, salt, coded_count: u8::arbitrary(g) },
        }
    }
}
