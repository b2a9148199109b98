//! Signature subpackets.
//!
//! OpenPGP signature packets include a set of key-value attributes
//! called subpackets.  These subpackets are used to indicate when a
//! signature was created, who created the signature, user and
//! implementation preferences, etc.  The full details are in [Section
//! 5.2.3.1 of RFC 4880].
//!
//! [Section 5.2.3.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
//!
//! A subpacket area is stored as it appeared on the wire, since the
//! hashed area must be hashed exactly as it was signed.  The parsed
//! subpackets are kept alongside.

use std::fmt;
use std::io::Write;

use crate::packet::Signature;
use crate::serialize::Marshal;
use crate::types::{
    CompressionAlgorithm,
    Duration,
    HashAlgorithm,
    KeyFlags,
    PublicKeyAlgorithm,
    ReasonForRevocation,
    SymmetricAlgorithm,
    Timestamp,
};
use crate::Error;
use crate::Fingerprint;
use crate::KeyID;
use crate::Result;

/// The subpacket types specified by [Section 5.2.3.1 of RFC 4880].
///
/// [Section 5.2.3.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SubpacketTag {
    /// The time the signature was made.
    SignatureCreationTime,
    /// The validity period of the signature.
    SignatureExpirationTime,
    /// This subpacket denotes whether a certification signature is
    /// "exportable".
    ExportableCertification,
    /// Signer asserts that the key is not only valid but also
    /// trustworthy at the specified level.
    TrustSignature,
    /// Used in conjunction with trust signatures to limit the scope
    /// of trust.
    RegularExpression,
    /// Whether a signature can later be revoked.
    Revocable,
    /// The validity period of the key.
    KeyExpirationTime,
    /// Deprecated.
    PlaceholderForBackwardCompatibility,
    /// Symmetric algorithm numbers that indicate which algorithms the
    /// key holder prefers to use.
    PreferredSymmetricAlgorithms,
    /// Authorizes the specified key to issue revocation signatures
    /// for this key.
    RevocationKey,
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer,
    /// A "notation" on the signature that the issuer wishes to make.
    NotationData,
    /// Message digest algorithm numbers that indicate which
    /// algorithms the key holder prefers to receive.
    PreferredHashAlgorithms,
    /// Compression algorithm numbers that indicate which algorithms
    /// the key holder prefers to use.
    PreferredCompressionAlgorithms,
    /// A list of flags that indicate preferences that the key holder
    /// has about how the key is handled on a key server.
    KeyServerPreferences,
    /// The URI of a key server that the key holder prefers be used
    /// for updates.
    PreferredKeyServer,
    /// A flag in a User ID's self-signature that states whether this
    /// User ID is the main User ID for this key.
    PrimaryUserID,
    /// The URI of a document that describes the policy under which
    /// the signature was issued.
    PolicyURI,
    /// A list of flags that hold information about a key.
    KeyFlags,
    /// The User ID that is responsible for the signature.
    SignersUserID,
    /// The reason for a revocation, used in key revocations and
    /// certification revocation signatures.
    ReasonForRevocation,
    /// The OpenPGP features a user's implementation supports.
    Features,
    /// A signature to which this signature refers.
    SignatureTarget,
    /// A complete Signature packet body.
    EmbeddedSignature,
    /// The fingerprint of the key issuing the signature.
    IssuerFingerprint,
    /// Reserved subpacket tag.
    Reserved(u8),
    /// Private subpacket tag.
    Private(u8),
    /// Unknown subpacket tag.
    Unknown(u8),
}

impl From<u8> for SubpacketTag {
    fn from(u: u8) -> Self {
        match u {
            2 => SubpacketTag::SignatureCreationTime,
            3 => SubpacketTag::SignatureExpirationTime,
            4 => SubpacketTag::ExportableCertification,
            5 => SubpacketTag::TrustSignature,
            6 => SubpacketTag::RegularExpression,
            7 => SubpacketTag::Revocable,
            9 => SubpacketTag::KeyExpirationTime,
            10 => SubpacketTag::PlaceholderForBackwardCompatibility,
            11 => SubpacketTag::PreferredSymmetricAlgorithms,
            12 => SubpacketTag::RevocationKey,
            16 => SubpacketTag::Issuer,
            20 => SubpacketTag::NotationData,
            21 => SubpacketTag::PreferredHashAlgorithms,
            22 => SubpacketTag::PreferredCompressionAlgorithms,
            23 => SubpacketTag::KeyServerPreferences,
            24 => SubpacketTag::PreferredKeyServer,
            25 => SubpacketTag::PrimaryUserID,
            26 => SubpacketTag::PolicyURI,
            27 => SubpacketTag::KeyFlags,
            28 => SubpacketTag::SignersUserID,
            29 => SubpacketTag::ReasonForRevocation,
            30 => SubpacketTag::Features,
            31 => SubpacketTag::SignatureTarget,
            32 => SubpacketTag::EmbeddedSignature,
            33 => SubpacketTag::IssuerFingerprint,
            0 | 1 | 8 | 13 | 14 | 15 | 17 | 18 | 19 =>
                SubpacketTag::Reserved(u),
            100..=110 => SubpacketTag::Private(u),
            _ => SubpacketTag::Unknown(u),
        }
    }
}

impl From<SubpacketTag> for u8 {
    fn from(t: SubpacketTag) -> Self {
        match t {
            SubpacketTag::SignatureCreationTime => 2,
            SubpacketTag::SignatureExpirationTime => 3,
            SubpacketTag::ExportableCertification => 4,
            SubpacketTag::TrustSignature => 5,
            SubpacketTag::RegularExpression => 6,
            SubpacketTag::Revocable => 7,
            SubpacketTag::KeyExpirationTime => 9,
            SubpacketTag::PlaceholderForBackwardCompatibility => 10,
            SubpacketTag::PreferredSymmetricAlgorithms => 11,
            SubpacketTag::RevocationKey => 12,
            SubpacketTag::Issuer => 16,
            SubpacketTag::NotationData => 20,
            SubpacketTag::PreferredHashAlgorithms => 21,
            SubpacketTag::PreferredCompressionAlgorithms => 22,
            SubpacketTag::KeyServerPreferences => 23,
            SubpacketTag::PreferredKeyServer => 24,
            SubpacketTag::PrimaryUserID => 25,
            SubpacketTag::PolicyURI => 26,
            SubpacketTag::KeyFlags => 27,
            SubpacketTag::SignersUserID => 28,
            SubpacketTag::ReasonForRevocation => 29,
            SubpacketTag::Features => 30,
            SubpacketTag::SignatureTarget => 31,
            SubpacketTag::EmbeddedSignature => 32,
            SubpacketTag::IssuerFingerprint => 33,
            SubpacketTag::Reserved(u) => u,
            SubpacketTag::Private(u) => u,
            SubpacketTag::Unknown(u) => u,
        }
    }
}

#[cfg(test)]
impl_arbitrary_from_u8!(SubpacketTag);

/// Payload of a Notation Data subpacket.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NotationData {
    flags: u32,
    name: Vec<u8>,
    value: Vec<u8>,
}

impl fmt::Debug for NotationData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut dbg = f.debug_struct("NotationData");
        dbg.field("name", &String::from_utf8_lossy(&self.name));
        if self.human_readable() {
            dbg.field("value", &String::from_utf8_lossy(&self.value));
        } else {
            dbg.field("value", &crate::fmt::hex::encode(&self.value));
        }
        dbg.finish()
    }
}

const NOTATION_DATA_FLAG_HUMAN_READABLE: u32 = 0x8000_0000;

impl NotationData {
    /// Creates a new Notation Data subpacket payload.
    pub fn new<N, V>(name: N, value: V, human_readable: bool) -> Self
        where N: AsRef<[u8]>, V: AsRef<[u8]>
    {
        NotationData {
            flags: if human_readable {
                NOTATION_DATA_FLAG_HUMAN_READABLE
            } else {
                0
            },
            name: name.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        }
    }

    /// Returns the raw flags.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Returns whether the value is human readable text.
    pub fn human_readable(&self) -> bool {
        self.flags & NOTATION_DATA_FLAG_HUMAN_READABLE != 0
    }

    /// Returns the name.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// The value of a subpacket.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubpacketValue {
    /// The subpacket is unknown.
    Unknown(Vec<u8>),
    /// The packet is present, but the value is structured incorrectly.
    Invalid(Vec<u8>),

    /// 4-octet time field
    SignatureCreationTime(Timestamp),
    /// 4-octet time field
    SignatureExpirationTime(Duration),
    /// 1 octet of exportability, 0 for not, 1 for exportable
    ExportableCertification(bool),
    /// 1 octet "level" (depth), 1 octet of trust amount
    TrustSignature {
        /// Trust level, or depth.
        level: u8,
        /// Trust amount.
        trust: u8,
    },
    /// Null-terminated regular expression
    RegularExpression(Vec<u8>),
    /// 1 octet of revocability, 0 for not, 1 for revocable
    Revocable(bool),
    /// 4-octet time field.
    KeyExpirationTime(Duration),
    /// Array of one-octet values
    PreferredSymmetricAlgorithms(Vec<SymmetricAlgorithm>),
    /// 1 octet of class, 1 octet of public-key algorithm ID, 20 octets
    /// of fingerprint
    RevocationKey {
        /// Class octet; 0x80 must be set.
        class: u8,
        /// Public key algorithm of the revoker.
        pk_algo: PublicKeyAlgorithm,
        /// Fingerprint of the revoker.
        fp: Fingerprint,
    },
    /// 8-octet Key ID
    Issuer(KeyID),
    /// The notation has a name and a value, each of which are strings
    /// of octets..
    NotationData(NotationData),
    /// Array of one-octet values
    PreferredHashAlgorithms(Vec<HashAlgorithm>),
    /// Array of one-octet values
    PreferredCompressionAlgorithms(Vec<CompressionAlgorithm>),
    /// N octets of flags
    KeyServerPreferences(Vec<u8>),
    /// String (URL)
    PreferredKeyServer(Vec<u8>),
    /// 1 octet, Boolean
    PrimaryUserID(bool),
    /// String (URL)
    PolicyURI(Vec<u8>),
    /// N octets of flags
    KeyFlags(KeyFlags),
    /// String
    SignersUserID(Vec<u8>),
    /// 1 octet of revocation code, N octets of reason string
    ReasonForRevocation {
        /// Machine-readable reason for revocation.
        code: ReasonForRevocation,
        /// Human-readable reason for revocation.
        reason: Vec<u8>,
    },
    /// N octets of flags
    Features(Vec<u8>),
    /// 1-octet public-key algorithm, 1 octet hash algorithm, N octets
    /// hash
    SignatureTarget {
        /// Public-key algorithm of the target signature.
        pk_algo: PublicKeyAlgorithm,
        /// Hash algorithm of the target signature.
        hash_algo: HashAlgorithm,
        /// Hash digest of the target signature.
        digest: Vec<u8>,
    },
    /// An embedded signature.
    ///
    /// This is used, for instance, to store a subkey's primary key
    /// binding signature (0x19).
    EmbeddedSignature(Box<Signature>),
    /// 20-octet V4 fingerprint, prefixed with the version.
    IssuerFingerprint(Fingerprint),
}

fn be_u32(value: &[u8]) -> Option<u32> {
    if value.len() == 4 {
        Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
    } else {
        None
    }
}

impl SubpacketValue {
    /// Interprets the body of a subpacket with the given tag.
    ///
    /// Bodies that are structured incorrectly are returned as
    /// `SubpacketValue::Invalid`.
    pub fn parse(tag: SubpacketTag, body: &[u8]) -> SubpacketValue {
        use self::SubpacketTag as T;
        use self::SubpacketValue as V;

        let bool_octet = |b: &[u8]| if b.len() == 1 { Some(b[0] != 0) } else { None };

        let value = match tag {
            T::SignatureCreationTime =>
                be_u32(body).map(|v| V::SignatureCreationTime(v.into())),
            T::SignatureExpirationTime =>
                be_u32(body).map(|v| V::SignatureExpirationTime(v.into())),
            T::ExportableCertification =>
                bool_octet(body).map(V::ExportableCertification),
            T::TrustSignature if body.len() == 2 =>
                Some(V::TrustSignature { level: body[0], trust: body[1] }),
            T::RegularExpression => {
                // The expression is null-terminated.
                let trim = if body.last() == Some(&0) { 1 } else { 0 };
                Some(V::RegularExpression(body[..body.len() - trim].to_vec()))
            }
            T::Revocable => bool_octet(body).map(V::Revocable),
            T::KeyExpirationTime =>
                be_u32(body).map(|v| V::KeyExpirationTime(v.into())),
            T::PreferredSymmetricAlgorithms =>
                Some(V::PreferredSymmetricAlgorithms(
                    body.iter().map(|&o| o.into()).collect())),
            T::RevocationKey if body.len() == 22 =>
                Some(V::RevocationKey {
                    class: body[0],
                    pk_algo: body[1].into(),
                    fp: Fingerprint::from_bytes(&body[2..]),
                }),
            T::Issuer => KeyID::from_bytes(body).ok().map(V::Issuer),
            T::NotationData if body.len() >= 8 => {
                let flags = u32::from_be_bytes([body[0], body[1],
                                                body[2], body[3]]);
                let name_len = u16::from_be_bytes([body[4], body[5]]) as usize;
                let value_len = u16::from_be_bytes([body[6], body[7]]) as usize;
                if body.len() == 8 + name_len + value_len {
                    Some(V::NotationData(NotationData {
                        flags,
                        name: body[8..8 + name_len].to_vec(),
                        value: body[8 + name_len..].to_vec(),
                    }))
                } else {
                    None
                }
            }
            T::PreferredHashAlgorithms =>
                Some(V::PreferredHashAlgorithms(
                    body.iter().map(|&o| o.into()).collect())),
            T::PreferredCompressionAlgorithms =>
                Some(V::PreferredCompressionAlgorithms(
                    body.iter().map(|&o| o.into()).collect())),
            T::KeyServerPreferences =>
                Some(V::KeyServerPreferences(body.to_vec())),
            T::PreferredKeyServer =>
                Some(V::PreferredKeyServer(body.to_vec())),
            T::PrimaryUserID => bool_octet(body).map(V::PrimaryUserID),
            T::PolicyURI => Some(V::PolicyURI(body.to_vec())),
            T::KeyFlags => Some(V::KeyFlags(KeyFlags::new(body))),
            T::SignersUserID => Some(V::SignersUserID(body.to_vec())),
            T::ReasonForRevocation if ! body.is_empty() =>
                Some(V::ReasonForRevocation {
                    code: body[0].into(),
                    reason: body[1..].to_vec(),
                }),
            T::Features => Some(V::Features(body.to_vec())),
            T::SignatureTarget if body.len() >= 2 =>
                Some(V::SignatureTarget {
                    pk_algo: body[0].into(),
                    hash_algo: body[1].into(),
                    digest: body[2..].to_vec(),
                }),
            T::EmbeddedSignature =>
                crate::parse::signature_from_body(body).ok()
                    .map(|s| V::EmbeddedSignature(Box::new(s))),
            T::IssuerFingerprint if body.len() == 21 && body[0] == 4 =>
                Some(V::IssuerFingerprint(Fingerprint::from_bytes(&body[1..]))),
            T::Reserved(_) | T::Private(_) | T::Unknown(_)
                | T::PlaceholderForBackwardCompatibility =>
                Some(V::Unknown(body.to_vec())),
            _ => None,
        };

        value.unwrap_or_else(|| V::Invalid(body.to_vec()))
    }

    // Writes the body of the subpacket.
    fn serialize_body(&self, o: &mut dyn Write) -> Result<()> {
        use self::SubpacketValue::*;
        match self {
            Unknown(b) | Invalid(b) => o.write_all(b)?,
            SignatureCreationTime(t) => o.write_all(&t.to_be_bytes())?,
            SignatureExpirationTime(d) | KeyExpirationTime(d) =>
                o.write_all(&u32::from(*d).to_be_bytes())?,
            ExportableCertification(b) | Revocable(b) | PrimaryUserID(b) =>
                o.write_all(&[if *b { 1 } else { 0 }])?,
            TrustSignature { level, trust } => o.write_all(&[*level, *trust])?,
            RegularExpression(re) => {
                o.write_all(re)?;
                o.write_all(&[0])?;
            }
            PreferredSymmetricAlgorithms(p) =>
                for &a in p.iter() {
                    o.write_all(&[a.into()])?;
                },
            RevocationKey { class, pk_algo, fp } => {
                o.write_all(&[*class, (*pk_algo).into()])?;
                o.write_all(fp.as_bytes())?;
            }
            Issuer(id) => o.write_all(id.as_bytes())?,
            NotationData(n) => {
                o.write_all(&n.flags.to_be_bytes())?;
                o.write_all(&(n.name.len() as u16).to_be_bytes())?;
                o.write_all(&(n.value.len() as u16).to_be_bytes())?;
                o.write_all(&n.name)?;
                o.write_all(&n.value)?;
            }
            PreferredHashAlgorithms(p) =>
                for &a in p.iter() {
                    o.write_all(&[a.into()])?;
                },
            PreferredCompressionAlgorithms(p) =>
                for &a in p.iter() {
                    o.write_all(&[a.into()])?;
                },
            KeyServerPreferences(b) | PreferredKeyServer(b) | PolicyURI(b)
                | SignersUserID(b) | Features(b) => o.write_all(b)?,
            KeyFlags(f) => o.write_all(f.as_bytes())?,
            ReasonForRevocation { code, reason } => {
                o.write_all(&[(*code).into()])?;
                o.write_all(reason)?;
            }
            SignatureTarget { pk_algo, hash_algo, digest } => {
                o.write_all(&[(*pk_algo).into(), (*hash_algo).into()])?;
                o.write_all(digest)?;
            }
            EmbeddedSignature(sig) => sig.serialize(o)?,
            IssuerFingerprint(fp) => {
                o.write_all(&[4])?;
                o.write_all(fp.as_bytes())?;
            }
        }
        Ok(())
    }

    fn body_len(&self) -> usize {
        use self::SubpacketValue::*;
        match self {
            Unknown(b) | Invalid(b) => b.len(),
            SignatureCreationTime(_) | SignatureExpirationTime(_)
                | KeyExpirationTime(_) => 4,
            ExportableCertification(_) | Revocable(_) | PrimaryUserID(_) => 1,
            TrustSignature { .. } => 2,
            RegularExpression(re) => re.len() + 1,
            PreferredSymmetricAlgorithms(p) => p.len(),
            RevocationKey { fp, .. } => 2 + fp.as_bytes().len(),
            Issuer(_) => 8,
            NotationData(n) => 8 + n.name.len() + n.value.len(),
            PreferredHashAlgorithms(p) => p.len(),
            PreferredCompressionAlgorithms(p) => p.len(),
            KeyServerPreferences(b) | PreferredKeyServer(b) | PolicyURI(b)
                | SignersUserID(b) | Features(b) => b.len(),
            KeyFlags(f) => f.as_bytes().len(),
            ReasonForRevocation { reason, .. } => 1 + reason.len(),
            SignatureTarget { digest, .. } => 2 + digest.len(),
            EmbeddedSignature(sig) => sig.serialized_len(),
            IssuerFingerprint(fp) => 1 + fp.as_bytes().len(),
        }
    }
}

/// Signature subpacket specified by [Section 5.2.3.1 of RFC 4880].
///
/// [Section 5.2.3.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
#[derive(PartialEq, Eq, Clone)]
pub struct Subpacket {
    /// Critical flag.
    critical: bool,
    /// Packet type.
    tag: SubpacketTag,
    /// Packet value, must match packet type.
    value: SubpacketValue,
}

impl fmt::Debug for Subpacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("Subpacket");
        if self.critical {
            s.field("critical", &self.critical);
        }
        s.field("value", &self.value);
        s.finish()
    }
}

impl Subpacket {
    /// Creates a new subpacket.
    ///
    /// The tag is derived from the value.  `Unknown` and `Invalid`
    /// values have no tag; use `Subpacket::with_tag` for those.
    pub fn new(value: SubpacketValue, critical: bool) -> Result<Subpacket> {
        use self::SubpacketValue as V;
        use self::SubpacketTag as T;
        let tag = match &value {
            V::SignatureCreationTime(_) => T::SignatureCreationTime,
            V::SignatureExpirationTime(_) => T::SignatureExpirationTime,
            V::ExportableCertification(_) => T::ExportableCertification,
            V::TrustSignature { .. } => T::TrustSignature,
            V::RegularExpression(_) => T::RegularExpression,
            V::Revocable(_) => T::Revocable,
            V::KeyExpirationTime(_) => T::KeyExpirationTime,
            V::PreferredSymmetricAlgorithms(_) =>
                T::PreferredSymmetricAlgorithms,
            V::RevocationKey { .. } => T::RevocationKey,
            V::Issuer(_) => T::Issuer,
            V::NotationData(_) => T::NotationData,
            V::PreferredHashAlgorithms(_) => T::PreferredHashAlgorithms,
            V::PreferredCompressionAlgorithms(_) =>
                T::PreferredCompressionAlgorithms,
            V::KeyServerPreferences(_) => T::KeyServerPreferences,
            V::PreferredKeyServer(_) => T::PreferredKeyServer,
            V::PrimaryUserID(_) => T::PrimaryUserID,
            V::PolicyURI(_) => T::PolicyURI,
            V::KeyFlags(_) => T::KeyFlags,
            V::SignersUserID(_) => T::SignersUserID,
            V::ReasonForRevocation { .. } => T::ReasonForRevocation,
            V::Features(_) => T::Features,
            V::SignatureTarget { .. } => T::SignatureTarget,
            V::EmbeddedSignature(_) => T::EmbeddedSignature,
            V::IssuerFingerprint(_) => T::IssuerFingerprint,
            V::Unknown(_) | V::Invalid(_) =>
                return Err(Error::InvalidArgument(
                    "Unknown and invalid subpackets need an explicit tag"
                        .into()).into()),
        };
        Ok(Subpacket { critical, tag, value })
    }

    /// Creates a new subpacket with an explicit tag.
    pub fn with_tag(tag: SubpacketTag, value: SubpacketValue, critical: bool)
                    -> Subpacket {
        Subpacket { critical, tag, value }
    }

    /// Returns whether the critical bit is set.
    pub fn critical(&self) -> bool {
        self.critical
    }

    /// Returns the subpacket's tag.
    pub fn tag(&self) -> SubpacketTag {
        self.tag
    }

    /// Returns the subpacket's value.
    pub fn value(&self) -> &SubpacketValue {
        &self.value
    }

    /// Returns whether we understand this subpacket.
    ///
    /// A critical subpacket that we don't understand makes the
    /// signature unusable.
    pub fn is_known(&self) -> bool {
        match self.value {
            SubpacketValue::Unknown(_) => false,
            _ => true,
        }
    }
}

/// Encodes a subpacket length.
///
/// Subpacket lengths use the same encoding as new-format packet
/// lengths, except that there are no partial lengths and 255
/// introduces a four octet length.
fn serialize_length(len: usize, o: &mut dyn Write) -> Result<()> {
    if len < 192 {
        o.write_all(&[len as u8])?;
    } else if len < 8384 {
        let v = len - 192;
        o.write_all(&[((v >> 8) as u8) + 192, v as u8])?;
    } else {
        o.write_all(&[0xff])?;
        o.write_all(&(len as u32).to_be_bytes())?;
    }
    Ok(())
}

fn length_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

impl Marshal for Subpacket {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        let body_len = self.value.body_len();
        serialize_length(1 + body_len, o)?;
        let tag = u8::from(self.tag) | if self.critical { 0x80 } else { 0 };
        o.write_all(&[tag])?;
        self.value.serialize_body(o)
    }

    fn serialized_len(&self) -> usize {
        let len = 1 + self.value.body_len();
        length_len(len) + len
    }
}

/// Subpacket area.
///
/// Holds the raw bytes of the area as well as the parsed subpackets.
#[derive(Clone, Default)]
pub struct SubpacketArea {
    raw: Vec<u8>,
    packets: Vec<Subpacket>,
}

impl PartialEq for SubpacketArea {
    fn eq(&self, other: &SubpacketArea) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SubpacketArea {}

impl fmt::Debug for SubpacketArea {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.packets.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a SubpacketArea {
    type Item = &'a Subpacket;
    type IntoIter = std::slice::Iter<'a, Subpacket>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

impl SubpacketArea {
    /// Returns an empty subpacket area.
    pub fn empty() -> SubpacketArea {
        SubpacketArea::default()
    }

    /// Parses a subpacket area.
    ///
    /// Fails with `Error::MalformedPacket` if a subpacket's length
    /// extends beyond the end of the area.
    pub fn from_bytes(raw: Vec<u8>) -> Result<SubpacketArea> {
        let mut packets = Vec::new();
        let mut rest = &raw[..];
        while ! rest.is_empty() {
            let (len, header) = match rest[0] {
                l @ 0..=191 => (l as usize, 1),
                192..=254 if rest.len() >= 2 =>
                    ((((rest[0] as usize) - 192) << 8) + rest[1] as usize + 192,
                     2),
                255 if rest.len() >= 5 =>
                    (u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]])
                     as usize, 5),
                _ => return Err(Error::MalformedPacket(
                    "Truncated subpacket length".into()).into()),
            };
            rest = &rest[header..];

            if len == 0 {
                // No room for the type octet.
                return Err(Error::MalformedPacket(
                    "Zero-length subpacket".into()).into());
            }
            if len > rest.len() {
                return Err(Error::MalformedPacket(
                    format!("Subpacket length {} exceeds area ({} bytes left)",
                            len, rest.len())).into());
            }

            let critical = rest[0] & 0x80 != 0;
            let tag = SubpacketTag::from(rest[0] & 0x7f);
            let value = SubpacketValue::parse(tag, &rest[1..len]);
            packets.push(Subpacket { critical, tag, value });
            rest = &rest[len..];
        }

        Ok(SubpacketArea { raw, packets })
    }

    /// Returns the area's serialized form.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the serialized length.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns whether the area is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Iterates over the subpackets.
    pub fn iter(&self) -> std::slice::Iter<Subpacket> {
        self.packets.iter()
    }

    /// Returns the last subpacket with the given tag.
    ///
    /// If a subpacket appears multiple times, the last one wins.
    pub fn lookup(&self, tag: SubpacketTag) -> Option<&Subpacket> {
        self.packets.iter().rev().find(|sp| sp.tag == tag)
    }

    /// Returns all subpackets with the given tag.
    pub fn lookup_all(&self, tag: SubpacketTag)
                      -> impl Iterator<Item = &Subpacket> {
        self.packets.iter().filter(move |sp| sp.tag == tag)
    }

    /// Returns the critical subpackets that we don't understand.
    pub fn unknown_critical(&self) -> impl Iterator<Item = &Subpacket> {
        self.packets.iter().filter(|sp| sp.critical && ! sp.is_known())
    }

    /// Adds the given subpacket.
    ///
    /// The area must not grow beyond 2^16 bytes, the size of its
    /// length field.
    pub fn add(&mut self, packet: Subpacket) -> Result<()> {
        if self.raw.len() + packet.serialized_len() > std::u16::MAX as usize {
            return Err(Error::InvalidArgument(
                "Subpacket area exceeds maximum size".into()).into());
        }
        packet.serialize(&mut self.raw)?;
        self.packets.push(packet);
        Ok(())
    }

    /// Adds the given subpacket, replacing all other subpackets
    /// with the same tag.
    pub fn replace(&mut self, packet: Subpacket) -> Result<()> {
        let tag = packet.tag;
        let mut packets: Vec<Subpacket> = std::mem::take(&mut self.packets)
            .into_iter().filter(|sp| sp.tag != tag).collect();
        packets.push(packet);
        self.rebuild(packets)
    }

    /// Removes all subpackets with the given tag.
    pub fn remove_all(&mut self, tag: SubpacketTag) -> Result<()> {
        let packets: Vec<Subpacket> = std::mem::take(&mut self.packets)
            .into_iter().filter(|sp| sp.tag != tag).collect();
        self.rebuild(packets)
    }

    fn rebuild(&mut self, packets: Vec<Subpacket>) -> Result<()> {
        self.raw.clear();
        self.packets.clear();
        for p in packets {
            self.add(p)?;
        }
        Ok(())
    }

    /// Returns the value of the last subpacket with the given tag.
    fn value(&self, tag: SubpacketTag) -> Option<&SubpacketValue> {
        self.lookup(tag).map(|sp| &sp.value)
    }

    /// Returns the value of the Signature Creation Time subpacket.
    pub fn signature_creation_time(&self) -> Option<Timestamp> {
        match self.value(SubpacketTag::SignatureCreationTime) {
            Some(SubpacketValue::SignatureCreationTime(t)) => Some(*t),
            _ => None,
        }
    }

    /// Returns the value of the Signature Expiration Time subpacket.
    pub fn signature_expiration_time(&self) -> Option<Duration> {
        match self.value(SubpacketTag::SignatureExpirationTime) {
            Some(SubpacketValue::SignatureExpirationTime(d)) => Some(*d),
            _ => None,
        }
    }

    /// Returns the value of the Key Expiration Time subpacket.
    pub fn key_expiration_time(&self) -> Option<Duration> {
        match self.value(SubpacketTag::KeyExpirationTime) {
            Some(SubpacketValue::KeyExpirationTime(d)) => Some(*d),
            _ => None,
        }
    }

    /// Returns the value of the Exportable Certification subpacket.
    pub fn exportable_certification(&self) -> Option<bool> {
        match self.value(SubpacketTag::ExportableCertification) {
            Some(SubpacketValue::ExportableCertification(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value of the Trust Signature subpacket as level
    /// and trust amount.
    pub fn trust_signature(&self) -> Option<(u8, u8)> {
        match self.value(SubpacketTag::TrustSignature) {
            Some(SubpacketValue::TrustSignature { level, trust }) =>
                Some((*level, *trust)),
            _ => None,
        }
    }

    /// Returns the value of the Regular Expression subpacket.
    pub fn regular_expression(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::RegularExpression) {
            Some(SubpacketValue::RegularExpression(re)) => Some(re),
            _ => None,
        }
    }

    /// Returns the value of the Revocable subpacket.
    pub fn revocable(&self) -> Option<bool> {
        match self.value(SubpacketTag::Revocable) {
            Some(SubpacketValue::Revocable(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value of the Preferred Symmetric Algorithms
    /// subpacket.
    pub fn preferred_symmetric_algorithms(&self)
                                          -> Option<&[SymmetricAlgorithm]> {
        match self.value(SubpacketTag::PreferredSymmetricAlgorithms) {
            Some(SubpacketValue::PreferredSymmetricAlgorithms(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Preferred Hash Algorithms subpacket.
    pub fn preferred_hash_algorithms(&self) -> Option<&[HashAlgorithm]> {
        match self.value(SubpacketTag::PreferredHashAlgorithms) {
            Some(SubpacketValue::PreferredHashAlgorithms(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Preferred Compression Algorithms
    /// subpacket.
    pub fn preferred_compression_algorithms(&self)
                                            -> Option<&[CompressionAlgorithm]> {
        match self.value(SubpacketTag::PreferredCompressionAlgorithms) {
            Some(SubpacketValue::PreferredCompressionAlgorithms(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Revocation Key subpacket.
    pub fn revocation_key(&self)
                          -> Option<(u8, PublicKeyAlgorithm, &Fingerprint)> {
        match self.value(SubpacketTag::RevocationKey) {
            Some(SubpacketValue::RevocationKey { class, pk_algo, fp }) =>
                Some((*class, *pk_algo, fp)),
            _ => None,
        }
    }

    /// Returns the value of the Issuer subpacket.
    pub fn issuer(&self) -> Option<KeyID> {
        match self.value(SubpacketTag::Issuer) {
            Some(SubpacketValue::Issuer(id)) => Some(id.clone()),
            _ => None,
        }
    }

    /// Returns the value of the Issuer Fingerprint subpacket.
    pub fn issuer_fingerprint(&self) -> Option<&Fingerprint> {
        match self.value(SubpacketTag::IssuerFingerprint) {
            Some(SubpacketValue::IssuerFingerprint(fp)) => Some(fp),
            _ => None,
        }
    }

    /// Returns all Notation Data subpackets.
    pub fn notation_data(&self) -> Vec<&NotationData> {
        self.lookup_all(SubpacketTag::NotationData)
            .filter_map(|sp| match &sp.value {
                SubpacketValue::NotationData(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Returns the value of the Key Server Preferences subpacket.
    pub fn key_server_preferences(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::KeyServerPreferences) {
            Some(SubpacketValue::KeyServerPreferences(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Preferred Key Server subpacket.
    pub fn preferred_key_server(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::PreferredKeyServer) {
            Some(SubpacketValue::PreferredKeyServer(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Primary UserID subpacket.
    pub fn primary_userid(&self) -> Option<bool> {
        match self.value(SubpacketTag::PrimaryUserID) {
            Some(SubpacketValue::PrimaryUserID(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value of the Policy URI subpacket.
    pub fn policy_uri(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::PolicyURI) {
            Some(SubpacketValue::PolicyURI(p)) => Some(p),
            _ => None,
        }
    }

    /// Returns the value of the Key Flags subpacket.
    pub fn key_flags(&self) -> Option<&KeyFlags> {
        match self.value(SubpacketTag::KeyFlags) {
            Some(SubpacketValue::KeyFlags(f)) => Some(f),
            _ => None,
        }
    }

    /// Returns the value of the Signer's UserID subpacket.
    pub fn signers_user_id(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::SignersUserID) {
            Some(SubpacketValue::SignersUserID(u)) => Some(u),
            _ => None,
        }
    }

    /// Returns the value of the Reason for Revocation subpacket.
    pub fn reason_for_revocation(&self)
                                 -> Option<(ReasonForRevocation, &[u8])> {
        match self.value(SubpacketTag::ReasonForRevocation) {
            Some(SubpacketValue::ReasonForRevocation { code, reason }) =>
                Some((*code, reason)),
            _ => None,
        }
    }

    /// Returns the value of the Features subpacket.
    pub fn features(&self) -> Option<&[u8]> {
        match self.value(SubpacketTag::Features) {
            Some(SubpacketValue::Features(f)) => Some(f),
            _ => None,
        }
    }

    /// Returns the value of the Signature Target subpacket.
    pub fn signature_target(&self)
        -> Option<(PublicKeyAlgorithm, HashAlgorithm, &[u8])>
    {
        match self.value(SubpacketTag::SignatureTarget) {
            Some(SubpacketValue::SignatureTarget { pk_algo, hash_algo, digest }) =>
                Some((*pk_algo, *hash_algo, digest)),
            _ => None,
        }
    }

    /// Returns the value of the Embedded Signature subpacket.
    pub fn embedded_signature(&self) -> Option<&Signature> {
        match self.value(SubpacketTag::EmbeddedSignature) {
            Some(SubpacketValue::EmbeddedSignature(s)) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        let cases: Vec<(usize, Vec<u8>)> = vec![
            (0, vec![0]),
            (191, vec![191]),
            (192, vec![192, 0]),
            (8383, vec![223, 255]),
            (8384, vec![255, 0, 0, 0x20, 0xc0]),
        ];
        for (len, expected) in cases {
            let mut buf = Vec::new();
            serialize_length(len, &mut buf).unwrap();
            assert_eq!(buf, expected);
            assert_eq!(length_len(len), buf.len());
        }
    }

    #[test]
    fn area_roundtrip() {
        let mut area = SubpacketArea::empty();
        area.add(Subpacket::new(SubpacketValue::SignatureCreationTime(
            Timestamp::from(1_500_000_000)), false).unwrap()).unwrap();
        area.add(Subpacket::new(SubpacketValue::Issuer(
            KeyID::from(0x651CD2E92EC2262D)), false).unwrap()).unwrap();
        area.add(Subpacket::new(SubpacketValue::KeyFlags(
            KeyFlags::empty().set_signing(true)), true).unwrap()).unwrap();
        area.add(Subpacket::new(SubpacketValue::NotationData(
            NotationData::new("test@example.org", "value", true)), false)
                 .unwrap()).unwrap();
        area.add(Subpacket::new(SubpacketValue::ReasonForRevocation {
            code: ReasonForRevocation::KeyRetired,
            reason: b"gone".to_vec(),
        }, false).unwrap()).unwrap();

        let parsed = SubpacketArea::from_bytes(area.as_bytes().to_vec()).unwrap();
        assert_eq!(parsed, area);
        assert_eq!(parsed.iter().count(), 5);
        assert_eq!(parsed.signature_creation_time(),
                   Some(Timestamp::from(1_500_000_000)));
        assert_eq!(parsed.issuer(), Some(KeyID::from(0x651CD2E92EC2262D)));
        assert!(parsed.key_flags().unwrap().for_signing());
        assert!(parsed.lookup(SubpacketTag::KeyFlags).unwrap().critical());
        assert_eq!(parsed.notation_data()[0].value(), b"value");
        assert_eq!(parsed.reason_for_revocation(),
                   Some((ReasonForRevocation::KeyRetired, &b"gone"[..])));
        assert_eq!(parsed.unknown_critical().count(), 0);
    }

    #[test]
    fn unknown_and_invalid() {
        // An unknown critical subpacket, then a creation time with
        // a bad length.
        let raw = vec![3, 0x80 | 99, 1, 2,
                       3, 2, 0, 0];
        let area = SubpacketArea::from_bytes(raw).unwrap();
        let u: Vec<_> = area.unknown_critical().collect();
        assert_eq!(u.len(), 1);
        assert_eq!(u[0].tag(), SubpacketTag::Unknown(99));
        assert_eq!(area.lookup(SubpacketTag::SignatureCreationTime)
                   .unwrap().value(),
                   &SubpacketValue::Invalid(vec![0, 0]));
        assert_eq!(area.signature_creation_time(), None);
    }

    #[test]
    fn truncated() {
        assert!(SubpacketArea::from_bytes(vec![5, 2, 0, 0]).is_err());
        assert!(SubpacketArea::from_bytes(vec![0]).is_err());
        assert!(SubpacketArea::from_bytes(vec![200]).is_err());
    }

    #[test]
    fn replace() {
        let mut area = SubpacketArea::empty();
        for t in &[1u32, 2, 3] {
            area.add(Subpacket::new(SubpacketValue::SignatureCreationTime(
                Timestamp::from(*t)), false).unwrap()).unwrap();
        }
        assert_eq!(area.signature_creation_time(), Some(Timestamp::from(3)));
        area.replace(Subpacket::new(SubpacketValue::SignatureCreationTime(
            Timestamp::from(7)), false).unwrap()).unwrap();
        assert_eq!(area.iter().count(), 1);
        assert_eq!(area.len(), 6);
        area.remove_all(SubpacketTag::SignatureCreationTime).unwrap();
        assert!(area.is_empty());
    }
}
