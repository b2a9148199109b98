//! Symmetric-Key Encrypted Session Key Packets.
//!
//! SKESK packets hold symmetrically encrypted session keys.  The
//! session key is needed to decrypt the actual ciphertext.  See
//! [Section 5.3 of RFC 4880] for details.
//!
//! [Section 5.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.3

use crate::crypto::symmetric;
use crate::crypto::{Password, SessionKey, S2K};
use crate::types::SymmetricAlgorithm;
use crate::Error;
use crate::Result;

/// Holds a symmetrically encrypted session key, version 4.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SKESK {
    /// Symmetric algorithm used to encrypt the session key.
    sym_algo: SymmetricAlgorithm,
    /// Key derivation method for the symmetric key.
    s2k: S2K,
    /// The encrypted session key.
    ///
    /// If empty, the key derived from the password is the session
    /// key.
    esk: Vec<u8>,
}

impl SKESK {
    /// Creates a new SKESK packet.
    ///
    /// The given symmetric algorithm is the one used to encrypt the
    /// session key.
    pub fn new(sym_algo: SymmetricAlgorithm, s2k: S2K, esk: Vec<u8>) -> Self {
        SKESK {
            sym_algo,
            s2k,
            esk,
        }
    }

    /// Creates a new SKESK packet with the given password.
    ///
    /// `payload_algo` is the algorithm used for the data, `esk_algo`
    /// the one used to encrypt the session key.
    pub fn with_password(payload_algo: SymmetricAlgorithm,
                         esk_algo: SymmetricAlgorithm,
                         s2k: S2K, session_key: &SessionKey,
                         password: &Password)
                         -> Result<SKESK> {
        if session_key.len() != payload_algo.key_size()? {
            return Err(Error::InvalidArgument(format!(
                "Invalid size of session key, got {} want {}",
                session_key.len(), payload_algo.key_size()?)).into());
        }

        let key = s2k.derive_key(password, esk_algo.key_size()?)?;
        let mut esk = Vec::with_capacity(1 + session_key.len());
        esk.push(u8::from(payload_algo));
        esk.extend_from_slice(session_key);

        let iv = vec![0u8; esk_algo.block_size()?];
        symmetric::cfb_in_place(esk_algo, true, &key, &iv, &mut esk)?;

        Ok(SKESK::new(esk_algo, s2k, esk))
    }

    /// Gets the symmetric encryption algorithm.
    pub fn symmetric_algo(&self) -> SymmetricAlgorithm {
        self.sym_algo
    }

    /// Gets the key derivation method.
    pub fn s2k(&self) -> &S2K {
        &self.s2k
    }

    /// Gets the encrypted session key.
    pub fn esk(&self) -> &[u8] {
        &self.esk
    }

    /// Derives the key inside this SKESK from `password`.
    ///
    /// Returns the symmetric algorithm to use with the key and the
    /// key itself.  A wrong password is only detected later, when
    /// the session key fails the quick check.
    pub fn decrypt(&self, password: &Password)
                   -> Result<(SymmetricAlgorithm, SessionKey)> {
        let key = self.s2k.derive_key(password, self.sym_algo.key_size()?)?;

        if self.esk.is_empty() {
            return Ok((self.sym_algo, key));
        }

        let iv = vec![0u8; self.sym_algo.block_size()?];
        let mut plain: SessionKey = self.esk.clone().into();
        symmetric::cfb_in_place(self.sym_algo, false, &key, &iv, &mut plain)?;

        let algo = SymmetricAlgorithm::from(plain[0]);
        let session_key: SessionKey = (&plain[1..]).into();
        if ! algo.is_supported() || session_key.len() != algo.key_size()? {
            return Err(Error::InvalidSessionKey(
                format!("Decrypted session key for {} has {} bytes",
                        algo, session_key.len())).into());
        }
        Ok((algo, session_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;

    #[test]
    fn password_roundtrip() {
        let password: Password = "hunter2".into();
        let sk = SessionKey::new(32);
        let skesk = SKESK::with_password(SymmetricAlgorithm::AES256,
                                         SymmetricAlgorithm::AES128,
                                         S2K::default(), &sk, &password)
            .unwrap();

        let p = Packet::from(skesk);
        let q = Packet::from_bytes(&p.to_vec().unwrap()).unwrap();
        assert_eq!(p, q);

        if let Packet::SKESK(skesk) = q {
            let (algo, key) = skesk.decrypt(&password).unwrap();
            assert_eq!(algo, SymmetricAlgorithm::AES256);
            assert_eq!(key, sk);
        } else {
            panic!("expected a SKESK");
        }
    }

    #[test]
    fn no_esk() {
        let s2k = S2K::Simple { hash: crate::types::HashAlgorithm::SHA1 };
        let skesk = SKESK::new(SymmetricAlgorithm::CAST5, s2k, vec![]);
        let (algo, key) = skesk.decrypt(&"x".into()).unwrap();
        assert_eq!(algo, SymmetricAlgorithm::CAST5);
        assert_eq!(key.len(), 16);
    }
}
