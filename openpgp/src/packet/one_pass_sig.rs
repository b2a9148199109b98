//! One-pass signature packets.
//!
//! See [Section 5.4 of RFC 4880] for details.
//!
//!   [Section 5.4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.4

use crate::packet::Signature;
use crate::types::{HashAlgorithm, PublicKeyAlgorithm, SignatureType};
use crate::KeyID;

/// Holds a one-pass signature packet.
///
/// A one-pass signature announces a signature that follows the
/// signed data, so that a reader can start hashing right away.  Only
/// version 3 is defined.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct OnePassSig {
    /// Type of the signature.
    typ: SignatureType,
    /// Hash algorithm used to compute the signature.
    hash_algo: HashAlgorithm,
    /// Public key algorithm of this signature.
    pk_algo: PublicKeyAlgorithm,
    /// Key ID of the signing key.
    issuer: KeyID,
    /// Whether this is the last one pass signature before the data,
    /// i.e. whether the signature is not nested.
    last: bool,
}

impl OnePassSig {
    /// Returns a new `OnePassSig` packet.
    pub fn new(typ: SignatureType, hash_algo: HashAlgorithm,
               pk_algo: PublicKeyAlgorithm, issuer: KeyID) -> Self {
        OnePassSig {
            typ,
            hash_algo,
            pk_algo,
            issuer,
            last: true,
        }
    }

    /// Gets the signature type.
    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    /// Gets the public key algorithm.
    pub fn pk_algo(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// Gets the hash algorithm.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Gets the issuer.
    pub fn issuer(&self) -> &KeyID {
        &self.issuer
    }

    /// Gets the last flag.
    pub fn last(&self) -> bool {
        self.last
    }

    /// Sets the last flag.
    pub fn set_last(&mut self, last: bool) -> bool {
        std::mem::replace(&mut self.last, last)
    }

    /// Gets the raw value of the last flag.
    pub fn last_raw(&self) -> u8 {
        if self.last { 1 } else { 0 }
    }
}

impl<'a> From<&'a Signature> for OnePassSig {
    fn from(s: &'a Signature) -> Self {
        OnePassSig::new(s.typ(), s.hash_algo(), s.pk_algo(),
                        s.issuer().unwrap_or_else(KeyID::wildcard))
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for OnePassSig {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;
        let mut ops = OnePassSig::new(
            SignatureType::arbitrary(g),
            HashAlgorithm::arbitrary(g),
            PublicKeyAlgorithm::arbitrary(g),
            KeyID::arbitrary(g));
        ops.set_last(bool::arbitrary(g));
        ops
    }
}
