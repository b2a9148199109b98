//! PublicKey-Encrypted Session Key packets.
//!
//! The session key is needed to decrypt the actual ciphertext.  See
//! [Section 5.1 of RFC 4880] for details.
//!
//!   [Section 5.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.1

use crate::crypto::mem::Protected;
use crate::crypto::mpi::Ciphertext;
use crate::crypto::{KeyPair, SessionKey};
use crate::packet::Key;
use crate::types::{PublicKeyAlgorithm, SymmetricAlgorithm};
use crate::Error;
use crate::KeyID;
use crate::Result;

/// Holds an asymmetrically encrypted session key, version 3.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PKESK {
    /// Key ID of the key this is encrypted to.
    recipient: KeyID,
    /// Public key algorithm used to encrypt the session key.
    pk_algo: PublicKeyAlgorithm,
    /// The encrypted session key.
    esk: Ciphertext,
}

// Sum of the octets modulo 65536.
fn checksum(key: &[u8]) -> u16 {
    key.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

impl PKESK {
    /// Creates a new PKESK packet.
    pub fn new(recipient: KeyID, pk_algo: PublicKeyAlgorithm,
               encrypted_session_key: Ciphertext) -> Self {
        PKESK {
            recipient,
            pk_algo,
            esk: encrypted_session_key,
        }
    }

    /// Creates a new PKESK packet by encrypting `session_key` to
    /// `recipient`.
    ///
    /// The session key is prefixed with the algorithm octet and
    /// followed by a two octet checksum before it is encrypted.
    pub fn for_recipient(algo: SymmetricAlgorithm, session_key: &SessionKey,
                         recipient: &Key)
                         -> Result<PKESK> {
        if ! recipient.pk_algo().for_encryption() {
            return Err(Error::InvalidOperation(
                format!("{} keys cannot encrypt", recipient.pk_algo()))
                       .into());
        }

        let mut psk: Protected = Protected::zeroed(1 + session_key.len() + 2);
        psk[0] = u8::from(algo);
        psk[1..1 + session_key.len()].copy_from_slice(session_key);
        let sum = checksum(session_key);
        psk[1 + session_key.len()..].copy_from_slice(&sum.to_be_bytes());

        let esk = recipient.mpis().encrypt(&psk)?;
        Ok(PKESK::new(recipient.keyid(), recipient.pk_algo(), esk))
    }

    /// Gets the recipient.
    pub fn recipient(&self) -> &KeyID {
        &self.recipient
    }

    /// Gets the public key algorithm.
    pub fn pk_algo(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// Gets the encrypted session key.
    pub fn esk(&self) -> &Ciphertext {
        &self.esk
    }

    /// Decrypts the session key using `keypair`.
    ///
    /// Returns the symmetric algorithm and the session key.
    pub fn decrypt(&self, keypair: &KeyPair)
                   -> Result<(SymmetricAlgorithm, SessionKey)> {
        let plain = keypair.decrypt(&self.esk)?;
        if plain.len() < 4 {
            return Err(Error::InvalidSessionKey(
                "Decrypted session key is too short".into()).into());
        }

        let algo = SymmetricAlgorithm::from(plain[0]);
        let key = &plain[1..plain.len() - 2];
        let theirs = u16::from_be_bytes([plain[plain.len() - 2],
                                         plain[plain.len() - 1]]);
        if checksum(key) != theirs {
            return Err(Error::InvalidSessionKey(
                "Session key checksum mismatch".into()).into());
        }
        if ! algo.is_supported() || key.len() != algo.key_size()? {
            return Err(Error::InvalidSessionKey(
                format!("Decrypted session key for {} has {} bytes",
                        algo, key.len())).into());
        }

        Ok((algo, key.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;

    #[test]
    fn rsa_roundtrip() {
        let key = Key::generate_rsa(1024).unwrap();
        let keypair = key.clone().into_keypair(None).unwrap();

        let sk = SessionKey::new(16);
        let pkesk = PKESK::for_recipient(SymmetricAlgorithm::AES128, &sk,
                                         &key)
            .unwrap();
        assert_eq!(pkesk.recipient(), &key.keyid());

        let p = Packet::from(pkesk);
        let q = Packet::from_bytes(&p.to_vec().unwrap()).unwrap();
        assert_eq!(p, q);

        if let Packet::PKESK(pkesk) = q {
            let (algo, key) = pkesk.decrypt(&keypair).unwrap();
            assert_eq!(algo, SymmetricAlgorithm::AES128);
            assert_eq!(key, sk);
        } else {
            panic!("expected a PKESK");
        }
    }
}
