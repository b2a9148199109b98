//! Packet-related types.
//!
//! An OpenPGP message is a sequence of packets.  [`Packet`] is the
//! sum of all packet types, each variant holding the parsed body of
//! one packet.  See [Section 4 of RFC 4880] for more details.
//!
//!   [`Packet`]: ../enum.Packet.html
//!   [Section 4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4

use std::fmt;

use crate::Tag;

pub mod header;
pub use self::header::{BodyLength, CTB, Header};

mod unknown;
pub use self::unknown::Unknown;
pub mod signature;
pub use self::signature::Signature;
mod one_pass_sig;
pub use self::one_pass_sig::OnePassSig;
pub mod key;
pub use self::key::Key;
mod marker;
pub use self::marker::Marker;
mod trust;
pub use self::trust::Trust;
mod userid;
pub use self::userid::UserID;
mod user_attribute;
pub use self::user_attribute::UserAttribute;
mod literal;
pub use self::literal::Literal;
mod compressed_data;
pub use self::compressed_data::CompressedData;
mod seip;
pub use self::seip::{SEIP, SED, MDC};
mod skesk;
pub use self::skesk::SKESK;
mod pkesk;
pub use self::pkesk::PKESK;

/// An OpenPGP packet.
///
/// Public and secret keys share the [`Key`] type; the variant
/// records the role.  Containers (compressed and encrypted data)
/// only carry their content if the parser was asked to buffer it;
/// normally the content is parsed as a sequence of packets in its
/// own right.
///
///   [`Key`]: packet/key/struct.Key.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Unknown packet.
    Unknown(Unknown),
    /// Signature packet.
    Signature(Signature),
    /// One pass signature packet.
    OnePassSig(OnePassSig),
    /// Public key packet.
    PublicKey(Key),
    /// Public subkey packet.
    PublicSubkey(Key),
    /// Public/Secret key pair.
    SecretKey(Key),
    /// Public/Secret subkey pair.
    SecretSubkey(Key),
    /// Marker packet.
    Marker(Marker),
    /// Trust packet.
    Trust(Trust),
    /// User ID packet.
    UserID(UserID),
    /// User attribute packet.
    UserAttribute(UserAttribute),
    /// Literal data packet.
    Literal(Literal),
    /// Compressed literal data packet.
    CompressedData(CompressedData),
    /// Public key encrypted session key packet.
    PKESK(PKESK),
    /// Symmetric key encrypted session key packet.
    SKESK(SKESK),
    /// Symmetric key encrypted, integrity protected data packet.
    SEIP(SEIP),
    /// Symmetrically encrypted data packet without integrity
    /// protection.
    SED(SED),
    /// Modification detection code packet.
    MDC(MDC),
}

impl Packet {
    /// Returns the `Packet's` corresponding OpenPGP tag.
    ///
    /// For an `Unknown` packet, this is the tag it was read with.
    pub fn tag(&self) -> Tag {
        match self {
            Packet::Unknown(packet) => packet.tag(),
            Packet::Signature(_) => Tag::Signature,
            Packet::OnePassSig(_) => Tag::OnePassSig,
            Packet::PublicKey(_) => Tag::PublicKey,
            Packet::PublicSubkey(_) => Tag::PublicSubkey,
            Packet::SecretKey(_) => Tag::SecretKey,
            Packet::SecretSubkey(_) => Tag::SecretSubkey,
            Packet::Marker(_) => Tag::Marker,
            Packet::Trust(_) => Tag::Trust,
            Packet::UserID(_) => Tag::UserID,
            Packet::UserAttribute(_) => Tag::UserAttribute,
            Packet::Literal(_) => Tag::Literal,
            Packet::CompressedData(_) => Tag::CompressedData,
            Packet::PKESK(_) => Tag::PKESK,
            Packet::SKESK(_) => Tag::SKESK,
            Packet::SEIP(_) => Tag::SEIP,
            Packet::SED(_) => Tag::SED,
            Packet::MDC(_) => Tag::MDC,
        }
    }

    /// Returns the parsed packet's tag, or `None` for unknown
    /// packets.
    pub fn kind(&self) -> Option<Tag> {
        match self {
            Packet::Unknown(_) => None,
            _ => Some(self.tag()),
        }
    }

    /// Returns the key if this is a key packet.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Packet::PublicKey(k) | Packet::PublicSubkey(k)
                | Packet::SecretKey(k) | Packet::SecretSubkey(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

macro_rules! impl_into_packet {
    ( $typ:ident ) => {
        impl From<$typ> for Packet {
            fn from(p: $typ) -> Self {
                Packet::$typ(p)
            }
        }
    };
}

impl_into_packet!(Unknown);
impl_into_packet!(Signature);
impl_into_packet!(OnePassSig);
impl_into_packet!(Marker);
impl_into_packet!(Trust);
impl_into_packet!(UserID);
impl_into_packet!(UserAttribute);
impl_into_packet!(Literal);
impl_into_packet!(CompressedData);
impl_into_packet!(PKESK);
impl_into_packet!(SKESK);
impl_into_packet!(SEIP);
impl_into_packet!(SED);
impl_into_packet!(MDC);
