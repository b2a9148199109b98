//! Public key, public subkey, secret key and secret subkey packets.
//!
//! See [Section 5.5 of RFC 4880] for details.
//!
//!   [Section 5.5 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.5

use std::fmt;

use crate::crypto::hash::{self, Hash};
use crate::crypto::mem::Protected;
use crate::crypto::mpi;
use crate::crypto::{symmetric, KeyPair, Password, S2K};
use crate::serialize::Marshal;
use crate::types::{
    Duration,
    HashAlgorithm,
    PublicKeyAlgorithm,
    SymmetricAlgorithm,
    Timestamp,
};
use crate::Error;
use crate::Fingerprint;
use crate::KeyID;
use crate::Result;

/// Holds a public key, public subkey, secret key or secret subkey
/// packet.
///
/// Versions 3 and 4 are supported.  Version 3 keys are read and can
/// be used to verify signatures, but new keys are always version 4.
#[derive(PartialEq, Eq, Clone)]
pub struct Key {
    /// Version of the key packet.
    version: u8,
    /// When the key was created.
    creation_time: Timestamp,
    /// For version 3 keys, the number of days the key is valid.
    /// Zero means it doesn't expire.
    validity_days: u16,
    /// Public key algorithm of this key.
    pk_algo: PublicKeyAlgorithm,
    /// Public key MPIs.
    mpis: mpi::PublicKey,
    /// Optional secret part of the key.
    secret: Option<SecretKey>,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Key")
            .field("fingerprint", &self.fingerprint())
            .field("version", &self.version)
            .field("creation_time", &self.creation_time)
            .field("pk_algo", &self.pk_algo)
            .field("mpis", &self.mpis)
            .field("secret", &self.secret)
            .finish()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

impl Key {
    /// Creates a version 4 key.
    pub fn new_v4(pk_algo: PublicKeyAlgorithm, creation_time: Timestamp,
                  mpis: mpi::PublicKey) -> Self {
        Key {
            version: 4,
            creation_time,
            validity_days: 0,
            pk_algo,
            mpis,
            secret: None,
        }
    }

    /// Creates a version 3 key.
    ///
    /// Version 3 keys must be RSA keys.
    pub fn new_v3(pk_algo: PublicKeyAlgorithm, creation_time: Timestamp,
                  validity_days: u16, mpis: mpi::PublicKey)
                  -> Result<Self> {
        if ! pk_algo.is_rsa() {
            return Err(Error::InvalidArgument(
                format!("Version 3 keys must be RSA, got {}", pk_algo))
                       .into());
        }
        Ok(Key {
            version: 3,
            creation_time,
            validity_days,
            pk_algo,
            mpis,
            secret: None,
        })
    }

    /// Generates a new RSA key with a `bits` bit modulus.
    ///
    /// The key is a version 4 key that can sign and encrypt, and its
    /// secret key material is not encrypted.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let (public, secret) = crate::crypto::rsa::generate(bits)?;
        let mut key = Key::new_v4(PublicKeyAlgorithm::RSAEncryptSign,
                                  Timestamp::now(), public);
        key.secret = Some(SecretKey::Unencrypted { mpis: secret });
        Ok(key)
    }

    /// Gets the version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Gets the key packet's creation time.
    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    /// Sets the key packet's creation time.
    ///
    /// This changes the fingerprint of version 4 keys, invalidating
    /// all existing signatures.
    pub fn set_creation_time(&mut self, t: Timestamp) -> Timestamp {
        std::mem::replace(&mut self.creation_time, t)
    }

    /// Gets the validity period of a version 3 key.
    ///
    /// For version 4 keys, the validity period is a property of the
    /// self-signature, and this is always zero.
    pub fn validity_days(&self) -> u16 {
        self.validity_days
    }

    /// Returns the time the key expires, as far as the key packet
    /// is concerned.
    ///
    /// This only applies to version 3 keys.
    pub fn v3_expiration_time(&self) -> Option<Timestamp> {
        if self.version != 3 || self.validity_days == 0 {
            return None;
        }
        Duration::days(self.validity_days as u32).ok()
            .and_then(|d| self.creation_time.checked_add(d))
    }

    /// Gets the public key algorithm.
    pub fn pk_algo(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// Gets the key packet's MPIs.
    pub fn mpis(&self) -> &mpi::PublicKey {
        &self.mpis
    }

    /// Returns the size of the key in bits.
    pub fn bits(&self) -> usize {
        self.mpis.bits()
    }

    /// Gets the key packet's secret key material, if any.
    pub fn secret(&self) -> Option<&SecretKey> {
        self.secret.as_ref()
    }

    /// Returns whether the key packet holds secret key material.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Sets the key packet's secret key material.
    pub fn set_secret(&mut self, secret: Option<SecretKey>)
                      -> Option<SecretKey> {
        std::mem::replace(&mut self.secret, secret)
    }

    /// Returns a copy of the key without the secret key material.
    pub fn to_public(&self) -> Key {
        Key {
            secret: None,
            mpis: self.mpis.clone(),
            .. *self
        }
    }

    /// Computes and returns the key's fingerprint.
    ///
    /// For version 4 keys, this is the SHA-1 digest of the public
    /// key packet as it is hashed for signatures.  For version 3
    /// keys, this is the MD5 digest over the values of the modulus
    /// and the exponent.
    pub fn fingerprint(&self) -> Fingerprint {
        match self.version {
            3 => {
                let digest = HashAlgorithm::MD5.context().map(|mut h| {
                    match &self.mpis {
                        mpi::PublicKey::RSA { e, n } => {
                            h.update(n.value());
                            h.update(e.value());
                        }
                        _ => {
                            let _ = self.mpis.serialize(&mut h);
                        }
                    }
                    h.into_digest()
                });
                Fingerprint::from_bytes(&digest.unwrap_or_default())
            }
            _ => {
                let digest = HashAlgorithm::SHA1.context().map(|mut h| {
                    self.hash(&mut h);
                    h.into_digest()
                });
                Fingerprint::from_bytes(&digest.unwrap_or_default())
            }
        }
    }

    /// Computes and returns the key's key ID.
    ///
    /// For version 3 keys, this is the low 64 bits of the modulus,
    /// otherwise the low 64 bits of the fingerprint.
    pub fn keyid(&self) -> KeyID {
        match (self.version, &self.mpis) {
            (3, mpi::PublicKey::RSA { n, .. }) => {
                let v = n.value();
                let mut id = [0u8; 8];
                let l = std::cmp::min(8, v.len());
                id[8 - l..].copy_from_slice(&v[v.len() - l..]);
                KeyID::from(id)
            }
            _ => self.fingerprint().to_keyid(),
        }
    }

    /// Returns the length of the public part of the key packet's
    /// body.
    pub(crate) fn public_len(&self) -> usize {
        let fixed = if self.version == 3 { 1 + 4 + 2 + 1 } else { 1 + 4 + 1 };
        fixed + self.mpis.serialized_len()
    }

    /// Writes the public part of the key packet's body.
    pub(crate) fn serialize_public(&self, o: &mut dyn std::io::Write)
                                   -> Result<()> {
        o.write_all(&[self.version])?;
        o.write_all(&self.creation_time.to_be_bytes())?;
        if self.version == 3 {
            o.write_all(&self.validity_days.to_be_bytes())?;
        }
        o.write_all(&[u8::from(self.pk_algo)])?;
        self.mpis.serialize(o)
    }

    /// Returns the secret key material, decrypting it if necessary.
    ///
    /// Fails with `Error::MissingSecretKey` if there is no secret
    /// key material, and with `Error::InvalidPassword` if the
    /// password is wrong or missing.
    pub fn secret_material(&self, password: Option<&Password>)
                           -> Result<mpi::SecretKeyMaterial> {
        match &self.secret {
            None => Err(Error::MissingSecretKey(self.keyid().to_hex()).into()),
            Some(SecretKey::Unencrypted { mpis }) => Ok(mpis.clone()),
            Some(secret @ SecretKey::Encrypted { .. }) => match password {
                Some(p) => secret.decrypt(self.version, self.pk_algo, p),
                None => Err(Error::InvalidPassword.into()),
            },
        }
    }

    /// Decrypts the secret key material in place.
    pub fn decrypt_secret(&mut self, password: &Password) -> Result<()> {
        let mpis = self.secret_material(Some(password))?;
        self.secret = Some(SecretKey::Unencrypted { mpis });
        Ok(())
    }

    /// Encrypts the secret key material in place.
    ///
    /// The material is protected with S2K usage 254: an iterated and
    /// salted S2K, and a SHA-1 integrity check.
    pub fn encrypt_secret(&mut self, password: &Password,
                          algo: SymmetricAlgorithm) -> Result<()> {
        let mpis = match &self.secret {
            Some(SecretKey::Unencrypted { mpis }) => mpis,
            Some(SecretKey::Encrypted { .. }) =>
                return Err(Error::InvalidOperation(
                    "Secret key material is already encrypted".into()).into()),
            None =>
                return Err(Error::MissingSecretKey(self.keyid().to_hex())
                           .into()),
        };

        let s2k = S2K::default();
        let key = s2k.derive_key(password, algo.key_size()?)?;
        let mut iv = vec![0u8; algo.block_size()?];
        crate::crypto::random(&mut iv);

        let len = mpis.serialized_len();
        let mut plaintext: Protected = Protected::zeroed(len + 20);
        mpis.serialize(&mut &mut plaintext[..len])?;
        let mut h = HashAlgorithm::SHA1.context()?;
        h.update(&plaintext[..len]);
        plaintext[len..].copy_from_slice(&h.into_digest());

        let mut ciphertext = plaintext[..].to_vec();
        symmetric::cfb_in_place(algo, true, &key, &iv, &mut ciphertext)?;

        self.secret = Some(SecretKey::Encrypted {
            s2k_usage: 254,
            algo,
            s2k,
            iv: iv.into_boxed_slice(),
            ciphertext: ciphertext.into_boxed_slice(),
        });
        Ok(())
    }

    /// Creates a key pair from the key, decrypting the secret key
    /// material with `password` if necessary.
    pub fn into_keypair(self, password: Option<&Password>) -> Result<KeyPair> {
        let secret = self.secret_material(password)?;
        KeyPair::new(self, secret)
    }
}

impl Hash for Key {
    /// Updates the hash with the key packet the way signatures and
    /// fingerprints hash it: a 0x99 octet, the two octet length of
    /// the public part of the body, and the public part itself.
    fn hash(&self, hash: &mut hash::Context) {
        let len = self.public_len() as u16;
        let header = [0x99, (len >> 8) as u8, len as u8];
        hash.update(&header);
        // Writing to a hash context does not fail.
        let _ = self.serialize_public(hash);
    }
}

/// Holds secret key material.
///
/// The material may be encrypted.  See [Section 5.5.3 of RFC 4880].
///
///   [Section 5.5.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.5.3
#[derive(Clone, PartialEq, Eq)]
pub enum SecretKey {
    /// Unencrypted secret key.  Can be used as-is.
    Unencrypted {
        /// MPIs of the secret key.
        mpis: mpi::SecretKeyMaterial,
    },
    /// The secret key is encrypted with a password.
    Encrypted {
        /// The S2K usage octet.
        ///
        /// 254 means the plaintext ends in a SHA-1 digest, 255 that
        /// it ends in a two octet checksum.  Any other non-zero value
        /// is a legacy symmetric algorithm identifier; the key is then
        /// derived using a simple MD5 S2K and a checksum is used.
        s2k_usage: u8,
        /// Symmetric algorithm used for encryption the secret key
        /// material.
        algo: SymmetricAlgorithm,
        /// Key derivation mechanism to use.
        s2k: S2K,
        /// The initialization vector.
        iv: Box<[u8]>,
        /// Encrypted MPIs prefixed with the IV.
        ciphertext: Box<[u8]>,
    },
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SecretKey::Unencrypted { .. } => f.write_str("Unencrypted"),
            SecretKey::Encrypted { s2k_usage, algo, s2k, .. } =>
                f.debug_struct("Encrypted")
                    .field("s2k_usage", s2k_usage)
                    .field("algo", algo)
                    .field("s2k", s2k)
                    .finish(),
        }
    }
}

impl SecretKey {
    /// Returns true if this secret key is encrypted.
    pub fn is_encrypted(&self) -> bool {
        match self {
            SecretKey::Encrypted { .. } => true,
            SecretKey::Unencrypted { .. } => false,
        }
    }

    // Decrypts the secret key material.
    fn decrypt(&self, version: u8, pk_algo: PublicKeyAlgorithm,
               password: &Password)
               -> Result<mpi::SecretKeyMaterial> {
        let (s2k_usage, algo, s2k, iv, ciphertext) = match self {
            SecretKey::Unencrypted { mpis } => return Ok(mpis.clone()),
            SecretKey::Encrypted { s2k_usage, algo, s2k, iv, ciphertext } =>
                (*s2k_usage, *algo, s2k, iv, ciphertext),
        };

        if version == 3 {
            // Version 3 keys encrypt every MPI separately, and leave
            // the length headers in the clear.
            return Err(Error::InvalidOperation(
                "Decrypting version 3 secret keys is not supported".into())
                       .into());
        }

        let key = s2k.derive_key(password, algo.key_size()?)?;
        let mut plaintext: Protected = ciphertext[..].into();
        symmetric::cfb_in_place(algo, false, &key, iv, &mut plaintext)?;

        let check_len = if s2k_usage == 254 { 20 } else { 2 };
        if plaintext.len() < check_len {
            return Err(Error::InvalidPassword.into());
        }
        let (material, check) = plaintext.split_at(plaintext.len() - check_len);

        let ok = if s2k_usage == 254 {
            let mut h = HashAlgorithm::SHA1.context()?;
            h.update(material);
            h.into_digest() == check
        } else {
            let sum = material.iter()
                .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
            sum.to_be_bytes() == check
        };
        if ! ok {
            return Err(Error::InvalidPassword.into());
        }

        mpi::SecretKeyMaterial::from_bytes(pk_algo, material)
    }
}

impl From<mpi::SecretKeyMaterial> for SecretKey {
    fn from(mpis: mpi::SecretKeyMaterial) -> Self {
        SecretKey::Unencrypted { mpis }
    }
}

/// Returns a key from raw RSA parameters.
///
/// This is mostly useful for tests.
#[cfg(test)]
pub(crate) fn rsa_from_parts(e: &[u8], n: &[u8]) -> Key {
    Key::new_v4(PublicKeyAlgorithm::RSAEncryptSign, Timestamp::from(0),
                mpi::PublicKey::RSA { e: mpi::MPI::new(e), n: mpi::MPI::new(n) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;

    fn first_key(name: &str) -> Key {
        let data = std::fs::read(crate::path_to(name)).unwrap();
        match Packet::from_bytes(&data[..]).unwrap() {
            Packet::PublicKey(k) | Packet::SecretKey(k) => k,
            p => panic!("expected a key, got {:?}", p),
        }
    }

    #[test]
    fn fingerprints() {
        let alice = first_key("keys/alice.pgp");
        assert_eq!(alice.fingerprint().to_hex(),
                   "38EAF17E52D9AF2A814BBD94651CD2E92EC2262D");
        assert_eq!(alice.keyid(), KeyID::from(0x651CD2E92EC2262D));
        assert_eq!(alice.bits(), 2048);

        let bob = first_key("keys/bob.pgp");
        assert_eq!(bob.pk_algo(), PublicKeyAlgorithm::DSA);
        assert_eq!(bob.fingerprint().to_hex(),
                   "049F6EBC715E79FF317C0FD2A9E6CBA5DB1B2995");

        let carol = first_key("keys/carol.pgp");
        assert_eq!(carol.fingerprint().to_hex(),
                   "576C444E8E2C1099EDA2FE79933D81B7CC0C88ED");
    }

    #[test]
    fn v3_keyid() {
        let k = first_key("keys/v3-rsa.pgp");
        assert_eq!(k.version(), 3);
        assert_eq!(k.fingerprint().as_bytes().len(), 16);
        // The low 64 bits of the modulus.
        if let mpi::PublicKey::RSA { n, .. } = k.mpis() {
            let v = n.value();
            assert_eq!(k.keyid().as_bytes(), &v[v.len() - 8..]);
        } else {
            panic!("v3 key is not RSA");
        }
    }

    #[test]
    fn public_len() {
        let k = rsa_from_parts(&[1, 0, 1], &[0xc5; 128]);
        let mut v = Vec::new();
        k.serialize_public(&mut v).unwrap();
        assert_eq!(v.len(), k.public_len());
        assert_eq!(v.len(), 6 + 2 + 128 + 2 + 3);
    }

    #[test]
    fn encrypt_decrypt_secret() {
        let mut key = Key::generate_rsa(1024).unwrap();
        let plain = key.secret_material(None).unwrap();
        let password: Password = "streng geheim".into();

        key.encrypt_secret(&password, SymmetricAlgorithm::AES128).unwrap();
        assert!(key.secret().unwrap().is_encrypted());
        assert!(key.secret_material(None).is_err());
        let e = key.secret_material(Some(&"wrong".into())).unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(), Some(&Error::InvalidPassword));

        key.decrypt_secret(&password).unwrap();
        assert!(! key.secret().unwrap().is_encrypted());
        assert!(key.secret_material(None).unwrap() == plain);
    }

    #[test]
    fn carol_passphrase() {
        let carol = first_key("keys/carol-secret.pgp");
        assert!(carol.secret().unwrap().is_encrypted());
        assert!(carol.clone().into_keypair(Some(&"hunter2".into())).is_ok());
        assert!(carol.into_keypair(Some(&"hunter3".into())).is_err());
    }
}
