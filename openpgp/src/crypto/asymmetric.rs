//! Asymmetric crypto operations.

use crate::crypto::mem::Protected;
use crate::crypto::mpi::{self, MPI};
use crate::packet::Key;
use crate::types::{HashAlgorithm, PublicKeyAlgorithm};
use crate::Error;
use crate::Result;

use super::dsa;
use super::rsa;

/// A cryptographic key pair.
///
/// A `KeyPair` is a combination of public and secret key.  The
/// secret part is held in the clear, so a key pair is normally
/// created right before it is used, by decrypting a secret key
/// packet (see [`Key::into_keypair`]), and dropped soon after.
///
///   [`Key::into_keypair`]: ../packet/key/struct.Key.html#method.into_keypair
#[derive(Clone)]
pub struct KeyPair {
    public: Key,
    secret: mpi::SecretKeyMaterial,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.keyid())
            .finish()
    }
}

impl KeyPair {
    /// Creates a new key pair.
    ///
    /// Fails if the kind of secret key material does not match the
    /// public key.
    pub fn new(public: Key, secret: mpi::SecretKeyMaterial) -> Result<Self> {
        use crate::crypto::mpi::PublicKey as P;
        use crate::crypto::mpi::SecretKeyMaterial as S;

        match (public.mpis(), &secret) {
            (P::RSA { .. }, S::RSA { .. })
                | (P::DSA { .. }, S::DSA { .. })
                | (P::Elgamal { .. }, S::Elgamal { .. })
                | (P::Unknown { .. }, S::Unknown { .. }) => (),
            _ => return Err(Error::InvalidArgument(
                format!("Secret key material does not match {} key",
                        public.pk_algo())).into()),
        }

        Ok(KeyPair {
            public: public.to_public(),
            secret,
        })
    }

    /// Returns a reference to the public key.
    pub fn public(&self) -> &Key {
        &self.public
    }

    /// Returns a reference to the secret key material.
    pub fn secret(&self) -> &mpi::SecretKeyMaterial {
        &self.secret
    }

    /// Signs `digest`, which was computed using `hash_algo`.
    pub fn sign(&self, hash_algo: HashAlgorithm, digest: &[u8])
                -> Result<mpi::Signature> {
        use crate::crypto::mpi::PublicKey as P;
        use crate::crypto::mpi::SecretKeyMaterial as S;

        if ! self.public.pk_algo().for_signing() {
            return Err(Error::InvalidOperation(
                format!("{} keys cannot sign", self.public.pk_algo()))
                       .into());
        }

        match (self.public.mpis(), &self.secret) {
            (P::RSA { e, n }, S::RSA { d, p, q, .. }) =>
                rsa::sign(e, n, d, p, q, hash_algo, digest),

            (P::DSA { p, q, g, .. }, S::DSA { x }) => {
                let (r, s) = dsa::sign(&p.to_biguint(), &q.to_biguint(),
                                       &g.to_biguint(), &x.to_biguint(),
                                       digest)?;
                Ok(mpi::Signature::DSA {
                    r: MPI::from(&r),
                    s: MPI::from(&s),
                })
            }

            _ => Err(Error::UnsupportedPublicKeyAlgorithm(
                self.public.pk_algo()).into()),
        }
    }

    /// Decrypts `ciphertext`, returning the encoded session key.
    pub fn decrypt(&self, ciphertext: &mpi::Ciphertext) -> Result<Protected> {
        use crate::crypto::mpi::PublicKey as P;
        use crate::crypto::mpi::SecretKeyMaterial as S;

        match (self.public.mpis(), &self.secret, ciphertext) {
            (P::RSA { e, n }, S::RSA { d, p, q, .. },
             mpi::Ciphertext::RSA { c }) =>
                rsa::decrypt(e, n, d, p, q, c),

            (P::RSA { .. }, _, _) => Err(Error::MalformedPacket(
                "Ciphertext does not match RSA key".into()).into()),

            _ => Err(Error::UnsupportedPublicKeyAlgorithm(
                self.public.pk_algo()).into()),
        }
    }
}

impl From<KeyPair> for (Key, mpi::SecretKeyMaterial) {
    fn from(p: KeyPair) -> Self {
        (p.public, p.secret)
    }
}

impl mpi::PublicKey {
    /// Verifies `sig` over `digest`.
    ///
    /// Returns `Ok(false)` if the signature is bad, and an error if
    /// it can't be checked, e.g. because the algorithm is not
    /// supported.
    pub fn verify(&self, sig: &mpi::Signature, hash_algo: HashAlgorithm,
                  digest: &[u8])
                  -> Result<bool> {
        use crate::crypto::mpi::PublicKey as P;
        use crate::crypto::mpi::Signature as S;

        match (self, sig) {
            (P::RSA { e, n }, S::RSA { s }) =>
                rsa::verify(e, n, hash_algo, digest, s),

            (P::DSA { p, q, g, y }, S::DSA { r, s }) =>
                Ok(dsa::verify(&p.to_biguint(), &q.to_biguint(),
                               &g.to_biguint(), &y.to_biguint(),
                               digest, &r.to_biguint(), &s.to_biguint())),

            (P::RSA { .. }, _) | (P::DSA { .. }, _) =>
                Err(Error::MalformedPacket(
                    "Signature does not match key".into()).into()),

            (P::Elgamal { .. }, _) =>
                Err(Error::UnsupportedPublicKeyAlgorithm(
                    PublicKeyAlgorithm::ElGamalEncryptSign).into()),

            (P::Unknown { .. }, _) =>
                Err(Error::UnsupportedPublicKeyAlgorithm(
                    PublicKeyAlgorithm::Unknown(0)).into()),
        }
    }

    /// Encrypts `plaintext`, normally an encoded session key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<mpi::Ciphertext> {
        match self {
            mpi::PublicKey::RSA { e, n } => rsa::encrypt(e, n, plaintext),
            mpi::PublicKey::Elgamal { .. } =>
                Err(Error::UnsupportedPublicKeyAlgorithm(
                    PublicKeyAlgorithm::ElGamalEncrypt).into()),
            _ => Err(Error::InvalidOperation(
                "Key cannot be used for encryption".into()).into()),
        }
    }
}
