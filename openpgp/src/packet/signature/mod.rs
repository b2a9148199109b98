//! Signature packets and the signature builder.
//!
//! See [Section 5.2 of RFC 4880] for details.
//!
//!   [Section 5.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2
//!
//! Signatures are created using a [`SignatureBuilder`].  The builder
//! is a small state machine encoded in its type: data and key
//! material is hashed and hashed subpackets are added while it is in
//! the [`HashingHeader`] state; [`end_hashed_subpackets`] closes the
//! hashed area and returns a builder in the [`HashedAreaClosed`]
//! state, which only accepts unhashed subpackets and can finally
//! sign.
//!
//!   [`SignatureBuilder`]: struct.SignatureBuilder.html
//!   [`HashingHeader`]: struct.HashingHeader.html
//!   [`HashedAreaClosed`]: struct.HashedAreaClosed.html
//!   [`end_hashed_subpackets`]: struct.SignatureBuilder.html#method.end_hashed_subpackets

use std::fmt;
use std::marker::PhantomData;

use crate::crypto::hash::{self, Hash};
use crate::crypto::{mpi, KeyPair};
use crate::packet::{Key, UserAttribute, UserID};
use crate::types::{
    Duration,
    HashAlgorithm,
    KeyFlags,
    PublicKeyAlgorithm,
    ReasonForRevocation,
    SignatureType,
    Timestamp,
};
use crate::Error;
use crate::Fingerprint;
use crate::KeyID;
use crate::Result;

pub mod subpacket;
use self::subpacket::{
    Subpacket,
    SubpacketArea,
    SubpacketValue,
};

/// Holds a signature packet.
///
/// Version 3 and version 4 signatures can be parsed and verified.
/// New signatures are always version 4.
#[derive(Clone)]
pub struct Signature {
    /// Version of the signature packet.
    version: u8,
    /// Type of signature.
    typ: SignatureType,
    /// Public-key algorithm used for this signature.
    pk_algo: PublicKeyAlgorithm,
    /// Hash algorithm used to compute the signature.
    hash_algo: HashAlgorithm,
    /// Subpackets that are part of the signature.
    hashed_area: SubpacketArea,
    /// Subpackets that are _not_ part of the signature.
    unhashed_area: SubpacketArea,
    /// The creation time of a version 3 signature.
    v3_creation_time: Option<Timestamp>,
    /// The issuer of a version 3 signature.
    v3_issuer: Option<KeyID>,
    /// Lower 16 bits of the signed hash value.
    digest_prefix: [u8; 2],
    /// Signature MPIs.
    mpis: mpi::Signature,

    /// When used in conjunction with a one-pass signature, this is
    /// the digest of the signed data, computed by the parser.
    computed_digest: Option<Vec<u8>>,
}

impl PartialEq for Signature {
    /// The computed digest is not part of the packet, and is
    /// ignored.
    fn eq(&self, other: &Signature) -> bool {
        self.version == other.version
            && self.typ == other.typ
            && self.pk_algo == other.pk_algo
            && self.hash_algo == other.hash_algo
            && self.hashed_area == other.hashed_area
            && self.unhashed_area == other.unhashed_area
            && self.v3_creation_time == other.v3_creation_time
            && self.v3_issuer == other.v3_issuer
            && self.digest_prefix == other.digest_prefix
            && self.mpis == other.mpis
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Signature")
            .field("version", &self.version)
            .field("typ", &self.typ)
            .field("issuer", &self.issuer())
            .field("pk_algo", &self.pk_algo)
            .field("hash_algo", &self.hash_algo)
            .field("hashed_area", &self.hashed_area)
            .field("unhashed_area", &self.unhashed_area)
            .field("digest_prefix",
                   &crate::fmt::hex::encode(&self.digest_prefix))
            .field("computed_digest",
                   &self.computed_digest.as_ref()
                       .map(|hash| crate::fmt::hex::encode(hash)))
            .field("mpis", &self.mpis)
            .finish()
    }
}

impl Signature {
    /// Assembles a version 4 signature from its parts.
    pub fn new_v4(typ: SignatureType, pk_algo: PublicKeyAlgorithm,
                  hash_algo: HashAlgorithm, hashed_area: SubpacketArea,
                  unhashed_area: SubpacketArea, digest_prefix: [u8; 2],
                  mpis: mpi::Signature)
                  -> Self {
        Signature {
            version: 4,
            typ,
            pk_algo,
            hash_algo,
            hashed_area,
            unhashed_area,
            v3_creation_time: None,
            v3_issuer: None,
            digest_prefix,
            mpis,
            computed_digest: None,
        }
    }

    /// Assembles a version 3 signature from its parts.
    pub fn new_v3(typ: SignatureType, creation_time: Timestamp,
                  issuer: KeyID, pk_algo: PublicKeyAlgorithm,
                  hash_algo: HashAlgorithm, digest_prefix: [u8; 2],
                  mpis: mpi::Signature)
                  -> Self {
        Signature {
            version: 3,
            typ,
            pk_algo,
            hash_algo,
            hashed_area: SubpacketArea::empty(),
            unhashed_area: SubpacketArea::empty(),
            v3_creation_time: Some(creation_time),
            v3_issuer: Some(issuer),
            digest_prefix,
            mpis,
            computed_digest: None,
        }
    }

    /// Gets the version.
    pub fn version(&self) -> u8 {
        self.version
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

    /// Gets a reference to the hashed area.
    pub fn hashed_area(&self) -> &SubpacketArea {
        &self.hashed_area
    }

    /// Gets a reference to the unhashed area.
    pub fn unhashed_area(&self) -> &SubpacketArea {
        &self.unhashed_area
    }

    /// Gets a mutable reference to the unhashed area.
    ///
    /// The unhashed area is not covered by the signature.
    pub fn unhashed_area_mut(&mut self) -> &mut SubpacketArea {
        &mut self.unhashed_area
    }

    /// Gets the hash prefix.
    pub fn digest_prefix(&self) -> &[u8; 2] {
        &self.digest_prefix
    }

    /// Gets the signature packet's MPIs.
    pub fn mpis(&self) -> &mpi::Signature {
        &self.mpis
    }

    /// Gets the computed hash value.
    pub fn computed_digest(&self) -> Option<&[u8]> {
        self.computed_digest.as_ref().map(|d| &d[..])
    }

    /// Sets the computed hash value.
    pub(crate) fn set_computed_digest(&mut self, digest: Option<Vec<u8>>)
                                      -> Option<Vec<u8>> {
        std::mem::replace(&mut self.computed_digest, digest)
    }

    /// Returns the time the signature was created.
    ///
    /// For version 4 signatures, only the hashed area is considered.
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.v3_creation_time
            .or_else(|| self.hashed_area.signature_creation_time())
    }

    /// Returns how long the signature is valid after its creation.
    ///
    /// `None` and a zero duration both mean that the signature does
    /// not expire.
    pub fn expiration_time(&self) -> Option<Duration> {
        self.hashed_area.signature_expiration_time()
    }

    /// Returns how long the key is valid after its creation, if this
    /// is a self signature.
    pub fn key_expiration_time(&self) -> Option<Duration> {
        self.hashed_area.key_expiration_time()
    }

    /// Returns the key ID of the key that made the signature.
    ///
    /// For version 4 signatures, the issuer subpacket is looked up
    /// first in the hashed area, then in the unhashed area, and
    /// failing that, the issuer fingerprint subpacket is used.
    pub fn issuer(&self) -> Option<KeyID> {
        self.v3_issuer
            .or_else(|| self.hashed_area.issuer())
            .or_else(|| self.unhashed_area.issuer())
            .or_else(|| self.issuer_fingerprint().map(|fp| fp.to_keyid()))
    }

    /// Returns the fingerprint of the key that made the signature,
    /// if the signature carries it.
    pub fn issuer_fingerprint(&self) -> Option<&Fingerprint> {
        self.hashed_area.issuer_fingerprint()
            .or_else(|| self.unhashed_area.issuer_fingerprint())
    }

    /// Returns the value of the primary user id flag.
    pub fn primary_userid(&self) -> Option<bool> {
        self.hashed_area.primary_userid()
    }

    /// Returns the key flags.
    pub fn key_flags(&self) -> Option<&KeyFlags> {
        self.hashed_area.key_flags()
    }

    /// Returns the reason for revocation.
    pub fn reason_for_revocation(&self)
                                 -> Option<(ReasonForRevocation, &[u8])> {
        self.hashed_area.reason_for_revocation()
    }

    /// Returns the trust level and amount of a trust signature.
    pub fn trust_signature(&self) -> Option<(u8, u8)> {
        self.hashed_area.trust_signature()
    }

    /// Returns whether the certification may be exported.
    ///
    /// Certifications are exportable unless marked otherwise.
    pub fn exportable(&self) -> bool {
        self.hashed_area.exportable_certification().unwrap_or(true)
    }

    /// Returns whether the signature is not yet valid at `now`.
    pub fn is_not_yet_valid(&self, now: Timestamp) -> bool {
        match self.creation_time() {
            Some(t) => now < t,
            None => false,
        }
    }

    /// Returns whether the signature has expired at `now`.
    ///
    /// A signature with an expiration time of `d` seconds is valid
    /// up to, but not including, its creation time plus `d`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match (self.creation_time(), self.expiration_time()) {
            (Some(c), Some(d)) if ! d.is_zero() =>
                match c.checked_add(d) {
                    Some(e) => now >= e,
                    None => false,
                },
            _ => false,
        }
    }

    /// Hashes the signature's fields that are covered by the
    /// signature.
    ///
    /// This is what is hashed after the signed data.  For version 4
    /// signatures, this includes the trailer.
    pub fn hash_fields(&self, hash: &mut hash::Context) {
        if self.version == 3 {
            hash.update(&[u8::from(self.typ)]);
            let t = self.v3_creation_time.unwrap_or_else(|| Timestamp::from(0));
            hash.update(&t.to_be_bytes());
        } else {
            hash_v4_fields(self.typ, self.pk_algo, self.hash_algo,
                           self.hashed_area.as_bytes(), hash);
        }
    }

    // Finishes hashing.
    fn finish(&self, mut hash: hash::Context) -> Vec<u8> {
        hash.set_text_mode(false);
        self.hash_fields(&mut hash);
        hash.into_digest()
    }

    // Returns a fresh context for the signature's hash algorithm.
    fn context(&self) -> Result<hash::Context> {
        self.hash_algo.context()
    }

    /// Verifies the signature against `digest` using `key`.
    ///
    /// `digest` must have been computed over the signed material and
    /// the signature's fields.  Returns `Ok(false)` if the signature
    /// is bad, and an error if it can't be checked.
    pub fn verify_digest(&self, key: &Key, digest: &[u8]) -> Result<bool> {
        if ! self.pk_algo.is_supported() {
            return Err(Error::UnsupportedPublicKeyAlgorithm(self.pk_algo)
                       .into());
        }
        if digest.len() < 2 || digest[..2] != self.digest_prefix[..] {
            // The fast reject.
            return Ok(false);
        }
        key.mpis().verify(&self.mpis, self.hash_algo, digest)
    }

    /// Verifies the signature using the digest computed by the
    /// parser.
    ///
    /// This is used with one-pass signatures and detached
    /// signatures, where the parser hashes the data as it goes.
    pub fn verify(&self, key: &Key) -> Result<bool> {
        if ! self.typ.is_document() {
            return Err(Error::UnsupportedSignatureType(self.typ).into());
        }
        match self.computed_digest {
            Some(ref digest) => self.verify_digest(key, digest),
            None => Err(Error::InvalidOperation(
                "Data hash not computed".into()).into()),
        }
    }

    /// Finishes the document hash `data_hash` and verifies the
    /// signature with it.
    ///
    /// `data_hash` must have hashed the signed document using this
    /// signature's hash algorithm.
    pub fn verify_hash(&self, key: &Key, data_hash: hash::Context)
                       -> Result<bool> {
        if data_hash.algo() != self.hash_algo {
            return Err(Error::InvalidArgument(
                format!("Expected a {} context, got {}",
                        self.hash_algo, data_hash.algo())).into());
        }
        let digest = self.finish(data_hash);
        self.verify_digest(key, &digest)
    }

    /// Verifies a signature over `msg`.
    ///
    /// Text signatures are checked over `msg` with line endings
    /// canonicalized.
    pub fn verify_message<M: AsRef<[u8]>>(&self, key: &Key, msg: M)
                                          -> Result<bool> {
        if ! self.typ.is_document() {
            return Err(Error::UnsupportedSignatureType(self.typ).into());
        }
        let mut hash = self.context()?;
        if self.typ == SignatureType::Text {
            hash.set_text_mode(true);
        }
        hash.update(msg.as_ref());
        self.verify_hash(key, hash)
    }

    // Checks the type against the kinds of signatures a verifier
    // understands.
    fn check_type(&self, allowed: &[SignatureType]) -> Result<()> {
        if allowed.contains(&self.typ) {
            Ok(())
        } else {
            Err(Error::UnsupportedSignatureType(self.typ).into())
        }
    }

    /// Verifies a certification of `userid` and `key`, or a
    /// revocation of one, made by `signer`.
    ///
    /// For self signatures, `signer` and `key` are the same.
    pub fn verify_userid_binding(&self, signer: &Key, key: &Key,
                                 userid: &UserID)
                                 -> Result<bool> {
        if ! self.typ.is_certification() {
            return Err(Error::UnsupportedSignatureType(self.typ).into());
        }
        let mut hash = self.context()?;
        key.hash(&mut hash);
        if self.version == 3 {
            hash.update(userid.value());
        } else {
            userid.hash(&mut hash);
        }
        self.verify_digest(signer, &self.finish(hash))
    }

    /// Verifies a certification of `ua` and `key`, or a revocation of
    /// one, made by `signer`.
    pub fn verify_user_attribute_binding(&self, signer: &Key, key: &Key,
                                         ua: &UserAttribute)
                                         -> Result<bool> {
        if ! self.typ.is_certification() {
            return Err(Error::UnsupportedSignatureType(self.typ).into());
        }
        let mut hash = self.context()?;
        key.hash(&mut hash);
        ua.hash(&mut hash);
        self.verify_digest(signer, &self.finish(hash))
    }

    /// Verifies a subkey binding or a subkey revocation, made by
    /// `signer` over `primary` and `subkey`.
    pub fn verify_subkey_binding(&self, signer: &Key, primary: &Key,
                                 subkey: &Key)
                                 -> Result<bool> {
        self.check_type(&[SignatureType::SubkeyBinding,
                          SignatureType::SubkeyRevocation])?;
        let mut hash = self.context()?;
        primary.hash(&mut hash);
        subkey.hash(&mut hash);
        self.verify_digest(signer, &self.finish(hash))
    }

    /// Verifies a primary key binding signature: the back signature a
    /// signing subkey makes over its primary key.
    pub fn verify_primary_key_binding(&self, primary: &Key, subkey: &Key)
                                      -> Result<bool> {
        self.check_type(&[SignatureType::PrimaryKeyBinding])?;
        let mut hash = self.context()?;
        primary.hash(&mut hash);
        subkey.hash(&mut hash);
        self.verify_digest(subkey, &self.finish(hash))
    }

    /// Verifies a direct key signature or a key revocation over
    /// `key`, made by `signer`.
    pub fn verify_direct_key(&self, signer: &Key, key: &Key) -> Result<bool> {
        self.check_type(&[SignatureType::DirectKey,
                          SignatureType::KeyRevocation])?;
        let mut hash = self.context()?;
        key.hash(&mut hash);
        self.verify_digest(signer, &self.finish(hash))
    }

    /// Verifies a standalone signature.
    pub fn verify_standalone(&self, key: &Key) -> Result<bool> {
        self.check_type(&[SignatureType::Standalone])?;
        let digest = self.finish(self.context()?);
        self.verify_digest(key, &digest)
    }
}

/// Hashes the fields of a version 4 signature and the trailer.
fn hash_v4_fields(typ: SignatureType, pk_algo: PublicKeyAlgorithm,
                  hash_algo: HashAlgorithm, hashed_area: &[u8],
                  hash: &mut hash::Context) {
    let len = hashed_area.len();
    let header = [
        4,
        typ.into(),
        pk_algo.into(),
        hash_algo.into(),
        (len >> 8) as u8,
        len as u8,
    ];
    hash.update(&header);
    hash.update(hashed_area);

    // The trailer covers the version, the fields, and the hashed
    // area.
    let trailer_len = (header.len() + len) as u32;
    let mut trailer = [4u8, 0xff, 0, 0, 0, 0];
    trailer[2..].copy_from_slice(&trailer_len.to_be_bytes());
    hash.update(&trailer);
}

/// The builder hashes the signed material.
///
/// Hashed subpackets may be added in this state.
#[derive(Debug)]
pub struct HashingHeader(());

/// The hashed area is closed, its length is fixed.
///
/// Only unhashed subpackets may be added in this state.
#[derive(Debug)]
pub struct HashedAreaClosed(());

/// Creates a version 4 signature.
///
/// ```
/// use netpgp::packet::Key;
/// use netpgp::packet::signature::SignatureBuilder;
/// use netpgp::types::{HashAlgorithm, SignatureType};
/// # fn main() -> netpgp::Result<()> {
/// let key = Key::generate_rsa(1024)?;
/// let signer = key.clone().into_keypair(None)?;
///
/// let mut builder = SignatureBuilder::new(SignatureType::Binary,
///                                         HashAlgorithm::SHA256)?;
/// builder.update(b"hello world");
/// let sig = builder.end_hashed_subpackets()?.sign(&signer)?;
/// assert!(sig.verify_message(&key, b"hello world")?);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct SignatureBuilder<S> {
    typ: SignatureType,
    hash: hash::Context,
    hashed_area: SubpacketArea,
    unhashed_area: SubpacketArea,
    state: PhantomData<S>,
}

impl<S> SignatureBuilder<S> {
    /// Returns the signature type.
    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    /// Returns the hash algorithm.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash.algo()
    }

    /// Returns the hashed area built so far.
    pub fn hashed_area(&self) -> &SubpacketArea {
        &self.hashed_area
    }
}

impl SignatureBuilder<HashingHeader> {
    /// Starts a signature of type `typ` using `hash_algo`.
    ///
    /// For text signatures, line endings of the data are
    /// canonicalized while hashing.
    pub fn new(typ: SignatureType, hash_algo: HashAlgorithm)
               -> Result<Self> {
        if ! typ.is_supported() {
            return Err(Error::UnsupportedSignatureType(typ).into());
        }
        let mut hash = hash_algo.context()?;
        if typ == SignatureType::Text {
            hash.set_text_mode(true);
        }
        Ok(SignatureBuilder {
            typ,
            hash,
            hashed_area: SubpacketArea::empty(),
            unhashed_area: SubpacketArea::empty(),
            state: PhantomData,
        })
    }

    // Starts a signature over data that has already been hashed
    // into `hash`.
    pub(crate) fn with_context(typ: SignatureType, hash: hash::Context)
                               -> Result<Self> {
        if ! typ.is_supported() {
            return Err(Error::UnsupportedSignatureType(typ).into());
        }
        Ok(SignatureBuilder {
            typ,
            hash,
            hashed_area: SubpacketArea::empty(),
            unhashed_area: SubpacketArea::empty(),
            state: PhantomData,
        })
    }

    /// Hashes the signed data.
    pub fn update(&mut self, data: &[u8]) {
        self.hash.update(data);
    }

    /// Hashes a primary key or a subkey.
    pub fn hash_key(&mut self, key: &Key) {
        self.hash.set_text_mode(false);
        key.hash(&mut self.hash);
    }

    /// Hashes a subkey, following the primary key.
    pub fn hash_subkey(&mut self, subkey: &Key) {
        self.hash_key(subkey)
    }

    /// Hashes a user id.
    pub fn hash_userid(&mut self, userid: &UserID) {
        self.hash.set_text_mode(false);
        userid.hash(&mut self.hash);
    }

    /// Hashes a user attribute.
    pub fn hash_user_attribute(&mut self, ua: &UserAttribute) {
        self.hash.set_text_mode(false);
        ua.hash(&mut self.hash);
    }

    /// Adds a subpacket to the hashed area.
    pub fn add_hashed_subpacket(&mut self, sp: Subpacket) -> Result<()> {
        self.hashed_area.add(sp)
    }

    // Replaces the non-critical subpacket holding `value`.
    fn set(mut self, value: SubpacketValue) -> Result<Self> {
        self.hashed_area.replace(Subpacket::new(value, false)?)?;
        Ok(self)
    }

    /// Sets the signature creation time.
    ///
    /// If no creation time is set when the hashed area is closed,
    /// the current time is used.
    pub fn set_signature_creation_time(self, t: Timestamp) -> Result<Self> {
        self.set(SubpacketValue::SignatureCreationTime(t))
    }

    /// Sets how long the signature is valid.
    pub fn set_signature_expiration_time(self, d: Duration) -> Result<Self> {
        self.set(SubpacketValue::SignatureExpirationTime(d))
    }

    /// Sets how long the key is valid.
    pub fn set_key_expiration_time(self, d: Duration) -> Result<Self> {
        self.set(SubpacketValue::KeyExpirationTime(d))
    }

    /// Marks the user id being certified as the primary user id.
    pub fn set_primary_userid(self, primary: bool) -> Result<Self> {
        self.set(SubpacketValue::PrimaryUserID(primary))
    }

    /// Sets the key flags.
    pub fn set_key_flags(self, flags: KeyFlags) -> Result<Self> {
        self.set(SubpacketValue::KeyFlags(flags))
    }

    /// Sets the reason for revocation.
    pub fn set_reason_for_revocation<R>(self, code: ReasonForRevocation,
                                        reason: R)
                                        -> Result<Self>
        where R: AsRef<[u8]>
    {
        self.set(SubpacketValue::ReasonForRevocation {
            code,
            reason: reason.as_ref().to_vec(),
        })
    }

    /// Sets the trust level and amount.
    pub fn set_trust_signature(self, level: u8, trust: u8) -> Result<Self> {
        self.set(SubpacketValue::TrustSignature { level, trust })
    }

    /// Sets the issuer in the hashed area.
    pub fn set_issuer(self, id: KeyID) -> Result<Self> {
        self.set(SubpacketValue::Issuer(id))
    }

    /// Sets the issuer fingerprint in the hashed area.
    pub fn set_issuer_fingerprint(self, fp: Fingerprint) -> Result<Self> {
        self.set(SubpacketValue::IssuerFingerprint(fp))
    }

    /// Closes the hashed area.
    ///
    /// Adds a signature creation time subpacket with the current time
    /// if there is none.
    pub fn end_hashed_subpackets(mut self)
                                 -> Result<SignatureBuilder<HashedAreaClosed>> {
        if self.hashed_area.signature_creation_time().is_none() {
            self.hashed_area.add(Subpacket::new(
                SubpacketValue::SignatureCreationTime(Timestamp::now()),
                false)?)?;
        }
        self.hash.set_text_mode(false);

        Ok(SignatureBuilder {
            typ: self.typ,
            hash: self.hash,
            hashed_area: self.hashed_area,
            unhashed_area: self.unhashed_area,
            state: PhantomData,
        })
    }
}

impl SignatureBuilder<HashedAreaClosed> {
    /// Adds a subpacket to the unhashed area.
    pub fn add_unhashed_subpacket(&mut self, sp: Subpacket) -> Result<()> {
        self.unhashed_area.add(sp)
    }

    /// Appends the trailer, finalizes the hash, and signs it.
    ///
    /// If neither area names the issuer, an issuer subpacket for the
    /// signing key is added to the unhashed area.
    pub fn sign(mut self, signer: &KeyPair) -> Result<Signature> {
        let pk_algo = signer.public().pk_algo();
        let hash_algo = self.hash.algo();

        if self.hashed_area.issuer().is_none()
            && self.unhashed_area.issuer().is_none()
        {
            self.unhashed_area.add(Subpacket::new(
                SubpacketValue::Issuer(signer.public().keyid()), false)?)?;
        }

        let mut hash = self.hash;
        hash_v4_fields(self.typ, pk_algo, hash_algo,
                       self.hashed_area.as_bytes(), &mut hash);
        let digest = hash.into_digest();

        let mpis = signer.sign(hash_algo, &digest)?;
        let mut sig = Signature::new_v4(self.typ, pk_algo, hash_algo,
                                        self.hashed_area, self.unhashed_area,
                                        [digest[0], digest[1]], mpis);
        sig.computed_digest = Some(digest);
        Ok(sig)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;

    fn key(name: &str) -> Key {
        let data = std::fs::read(crate::path_to(name)).unwrap();
        match Packet::from_bytes(&data[..]).unwrap() {
            Packet::PublicKey(k) | Packet::SecretKey(k) => k,
            p => panic!("expected a key, got {:?}", p),
        }
    }

    fn sign(signer: &KeyPair, hash_algo: HashAlgorithm, msg: &[u8])
            -> Signature {
        let mut builder = SignatureBuilder::new(SignatureType::Binary,
                                                hash_algo).unwrap();
        builder.update(msg);
        builder.end_hashed_subpackets().unwrap().sign(signer).unwrap()
    }

    #[test]
    fn sign_verify() {
        let alice = key("keys/alice-secret.pgp");
        let bob = key("keys/bob-secret.pgp");
        let msg = b"Hello, world!";

        let cases = [
            (&alice, HashAlgorithm::SHA1),
            (&alice, HashAlgorithm::SHA256),
            (&alice, HashAlgorithm::SHA512),
            (&bob, HashAlgorithm::SHA1),
            (&bob, HashAlgorithm::SHA256),
        ];
        for (key, hash_algo) in cases.iter() {
            let signer = (*key).clone().into_keypair(None).unwrap();
            let sig = sign(&signer, *hash_algo, msg);
            assert_eq!(sig.issuer(), Some(key.keyid()));
            assert!(sig.verify_message(&key.to_public(), msg).unwrap(),
                    "{} {}", key.pk_algo(), hash_algo);

            // Survives serialization.
            let buf = Packet::from(sig.clone()).to_vec().unwrap();
            let sig2 = match Packet::from_bytes(&buf).unwrap() {
                Packet::Signature(s) => s,
                p => panic!("expected a signature, got {:?}", p),
            };
            assert_eq!(sig, sig2);
            assert!(sig2.verify_message(key, msg).unwrap());

            // Flip a bit in the message.
            let mut bad = msg.to_vec();
            bad[3] ^= 0x10;
            assert!(! sig.verify_message(key, &bad).unwrap());
        }
    }

    #[test]
    fn text_signature() {
        let alice = key("keys/alice-secret.pgp");
        let signer = alice.clone().into_keypair(None).unwrap();
        let mut builder = SignatureBuilder::new(SignatureType::Text,
                                                HashAlgorithm::SHA256)
            .unwrap();
        builder.update(b"one\ntwo\n");
        let sig = builder.end_hashed_subpackets().unwrap()
            .sign(&signer).unwrap();
        assert!(sig.verify_message(&alice, b"one\r\ntwo\r\n").unwrap());
        assert!(sig.verify_message(&alice, b"one\ntwo\n").unwrap());
    }

    #[test]
    fn detached_fixture() {
        let alice = key("keys/alice.pgp");
        let data = std::fs::read(crate::path_to("messages/hello.txt")).unwrap();
        let sig = std::fs::read(crate::path_to("messages/hello.txt.sig"))
            .unwrap();
        let sig = match Packet::from_bytes(&sig).unwrap() {
            Packet::Signature(s) => s,
            p => panic!("expected a signature, got {:?}", p),
        };
        assert_eq!(sig.version(), 4);
        assert_eq!(sig.hash_algo(), HashAlgorithm::SHA256);
        assert_eq!(sig.issuer(), Some(alice.keyid()));
        assert_eq!(sig.creation_time(), Some(Timestamp::from(1792362854)));
        assert!(sig.verify_message(&alice, &data).unwrap());
        assert!(! sig.verify_message(&alice, b"hello world!").unwrap());
    }

    #[test]
    fn self_signature() {
        let data = std::fs::read(crate::path_to("keys/alice.pgp")).unwrap();
        let packets: Vec<Packet> = crate::parse::packets_from_bytes(&data)
            .unwrap();
        let (key, userid, sig) = match &packets[..3] {
            [Packet::PublicKey(k), Packet::UserID(u), Packet::Signature(s)] =>
                (k, u, s),
            p => panic!("unexpected packets: {:?}", p),
        };
        assert_eq!(sig.typ(), SignatureType::PositiveCertification);
        assert_eq!(sig.hash_algo(), HashAlgorithm::SHA512);
        assert!(sig.key_flags().unwrap().for_signing());
        assert!(sig.verify_userid_binding(key, key, userid).unwrap());
        assert!(! sig.verify_userid_binding(
            key, key, &UserID::from("Mallory <alice@example.org>")).unwrap());
        assert!(sig.verify_direct_key(key, key).is_err());
    }

    #[test]
    fn certification() {
        let alice = key("keys/alice-secret.pgp");
        let bob = key("keys/bob.pgp");
        let signer = alice.clone().into_keypair(None).unwrap();
        let userid = UserID::from("Bob <bob@example.org>");

        let mut builder = SignatureBuilder::new(
            SignatureType::GenericCertification, HashAlgorithm::SHA256)
            .unwrap();
        builder.hash_key(&bob);
        builder.hash_userid(&userid);
        let sig = builder.set_trust_signature(1, 120).unwrap()
            .end_hashed_subpackets().unwrap()
            .sign(&signer).unwrap();

        assert_eq!(sig.trust_signature(), Some((1, 120)));
        assert!(sig.verify_userid_binding(&alice, &bob, &userid).unwrap());
        assert!(! sig.verify_userid_binding(&bob, &bob, &userid)
                .unwrap_or(false));
    }

    #[test]
    fn temporal() {
        let alice = key("keys/alice-secret.pgp");
        let signer = alice.clone().into_keypair(None).unwrap();
        let now = Timestamp::now();

        let future = now.checked_add(Duration::days(1).unwrap()).unwrap();
        let mut builder = SignatureBuilder::new(SignatureType::Binary,
                                                HashAlgorithm::SHA256)
            .unwrap();
        builder.update(b"x");
        let sig = builder.set_signature_creation_time(future).unwrap()
            .end_hashed_subpackets().unwrap()
            .sign(&signer).unwrap();
        assert!(sig.is_not_yet_valid(now));
        assert!(! sig.is_expired(now));

        let past = now.checked_sub(Duration::seconds(2)).unwrap();
        let mut builder = SignatureBuilder::new(SignatureType::Binary,
                                                HashAlgorithm::SHA256)
            .unwrap();
        builder.update(b"x");
        let sig = builder.set_signature_creation_time(past).unwrap()
            .set_signature_expiration_time(Duration::seconds(1)).unwrap()
            .end_hashed_subpackets().unwrap()
            .sign(&signer).unwrap();
        assert!(! sig.is_not_yet_valid(now));
        assert!(sig.is_expired(now));
        assert!(! sig.is_expired(past));
    }

    #[test]
    fn trailer() {
        // A v4 signature over the empty string with an empty hashed
        // area hashes exactly the header and the trailer.
        let sig = Signature::new_v4(
            SignatureType::Binary, PublicKeyAlgorithm::RSAEncryptSign,
            HashAlgorithm::SHA1, SubpacketArea::empty(),
            SubpacketArea::empty(), [0, 0],
            mpi::Signature::RSA { s: mpi::MPI::new(&[1]) });
        let mut a = HashAlgorithm::SHA1.context().unwrap();
        sig.hash_fields(&mut a);

        let mut b = HashAlgorithm::SHA1.context().unwrap();
        b.update(&[4, 0, 1, 2, 0, 0, 4, 0xff, 0, 0, 0, 6]);
        assert_eq!(a.digest(), b.digest());
    }
}
