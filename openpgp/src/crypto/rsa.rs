//! RSA signatures and encryption using PKCS#1 v1.5 padding.

use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};

use crate::crypto::mem::Protected;
use crate::crypto::mpi::{self, MPI, ProtectedMPI};
use crate::types::HashAlgorithm;
use crate::Error;
use crate::Result;

fn public_key(e: &MPI, n: &MPI) -> Result<RsaPublicKey> {
    RsaPublicKey::new(n.to_biguint(), e.to_biguint())
        .map_err(|e| Error::InvalidArgument(
            format!("Bad RSA public key: {}", e)).into())
}

fn secret_key(e: &MPI, n: &MPI, d: &ProtectedMPI, p: &ProtectedMPI,
              q: &ProtectedMPI)
              -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_components(
        n.to_biguint(), e.to_biguint(), d.to_biguint(),
        vec![p.to_biguint(), q.to_biguint()])
        .map_err(|e| Error::InvalidArgument(
            format!("Bad RSA secret key: {}", e)).into())
}

// EMSA-PKCS1-v1_5 without the padding: DigestInfo prefix || digest.
fn digest_info(hash_algo: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
    let mut v = hash_algo.digest_info_prefix()?.to_vec();
    v.extend_from_slice(digest);
    Ok(v)
}

/// Signs `digest`.
pub(crate) fn sign(e: &MPI, n: &MPI, d: &ProtectedMPI, p: &ProtectedMPI,
                   q: &ProtectedMPI, hash_algo: HashAlgorithm, digest: &[u8])
                   -> Result<mpi::Signature> {
    let key = secret_key(e, n, d, p, q)?;
    let s = key.sign(Pkcs1v15Sign::new_unprefixed(),
                     &digest_info(hash_algo, digest)?)?;
    Ok(mpi::Signature::RSA { s: MPI::new(&s) })
}

/// Verifies the signature `s` over `digest`.
///
/// Returns `Ok(false)` if the signature does not match.
pub(crate) fn verify(e: &MPI, n: &MPI, hash_algo: HashAlgorithm,
                     digest: &[u8], s: &MPI)
                     -> Result<bool> {
    let key = public_key(e, n)?;
    // The leading zeros are stripped on the wire, but the
    // verification needs the signature at the size of the modulus.
    let s = match s.value_padded(key.size()) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(Pkcs1v15Sign::new_unprefixed(),
                  &digest_info(hash_algo, digest)?, &s).is_ok())
}

/// Encrypts `plaintext`, which is normally an encoded session key.
pub(crate) fn encrypt(e: &MPI, n: &MPI, plaintext: &[u8])
                      -> Result<mpi::Ciphertext> {
    let key = public_key(e, n)?;
    let c = key.encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, plaintext)?;
    Ok(mpi::Ciphertext::RSA { c: MPI::new(&c) })
}

/// Decrypts `c`.
pub(crate) fn decrypt(e: &MPI, n: &MPI, d: &ProtectedMPI, p: &ProtectedMPI,
                      q: &ProtectedMPI, c: &MPI)
                      -> Result<Protected> {
    let key = secret_key(e, n, d, p, q)?;
    let c = c.value_padded(key.size())?;
    let m = key.decrypt(Pkcs1v15Encrypt, &c)
        .map_err(|_| Error::InvalidSessionKey(
            "RSA decryption failed".into()))?;
    Ok(m.into())
}

/// Generates a new RSA key of `bits` bits.
///
/// Returns the public and secret key material in OpenPGP's form,
/// where `p < q` and `u` is the inverse of `p` mod `q`.
pub(crate) fn generate(bits: usize)
                       -> Result<(mpi::PublicKey, mpi::SecretKeyMaterial)> {
    let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)?;
    let primes = key.primes();
    if primes.len() != 2 {
        return Err(Error::InvalidOperation(
            "Expected a two prime RSA key".into()).into());
    }

    let (p, q) = if primes[0] < primes[1] {
        (&primes[0], &primes[1])
    } else {
        (&primes[1], &primes[0])
    };
    let u: BigUint = p.modpow(&(q - 2u32), q);

    Ok((mpi::PublicKey::RSA {
            e: MPI::from(key.e()),
            n: MPI::from(key.n()),
        },
        mpi::SecretKeyMaterial::RSA {
            d: ProtectedMPI::from(key.d()),
            p: ProtectedMPI::from(p),
            q: ProtectedMPI::from(q),
            u: ProtectedMPI::from(&u),
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (mpi::PublicKey, mpi::SecretKeyMaterial) {
        generate(1024).unwrap()
    }

    #[test]
    fn sign_verify() {
        let (public, secret) = keys();
        let (e, n) = match &public {
            mpi::PublicKey::RSA { e, n } => (e, n),
            _ => unreachable!(),
        };
        let (d, p, q) = match &secret {
            mpi::SecretKeyMaterial::RSA { d, p, q, .. } => (d, p, q),
            _ => unreachable!(),
        };

        for algo in [HashAlgorithm::SHA1, HashAlgorithm::SHA256,
                     HashAlgorithm::SHA512].iter() {
            let mut ctx = algo.context().unwrap();
            ctx.update(b"hello world");
            let mut digest = ctx.digest();

            let sig = sign(e, n, d, p, q, *algo, &digest).unwrap();
            let s = match &sig {
                mpi::Signature::RSA { s } => s,
                _ => unreachable!(),
            };
            assert!(verify(e, n, *algo, &digest, s).unwrap());

            digest[3] ^= 0x10;
            assert!(! verify(e, n, *algo, &digest, s).unwrap());
        }
    }

    #[test]
    fn encrypt_decrypt() {
        let (public, secret) = keys();
        let (e, n) = match &public {
            mpi::PublicKey::RSA { e, n } => (e, n),
            _ => unreachable!(),
        };
        let (d, p, q) = match &secret {
            mpi::SecretKeyMaterial::RSA { d, p, q, .. } => (d, p, q),
            _ => unreachable!(),
        };

        let c = match encrypt(e, n, b"session key").unwrap() {
            mpi::Ciphertext::RSA { c } => c,
            _ => unreachable!(),
        };
        let m = decrypt(e, n, d, p, q, &c).unwrap();
        assert_eq!(&m[..], b"session key");
    }

    #[test]
    fn prime_order() {
        let (_, secret) = keys();
        if let mpi::SecretKeyMaterial::RSA { p, q, u, .. } = secret {
            let (p, q, u) = (p.to_biguint(), q.to_biguint(), u.to_biguint());
            assert!(p < q);
            assert_eq!((p * u) % q, BigUint::from(1u32));
        } else {
            unreachable!();
        }
    }
}
