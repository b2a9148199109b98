//! Packet headers.
//!
//! A packet header consists of the Cipher Type Byte (CTB), which
//! carries the packet's tag, and the length of the packet's body.
//! OpenPGP has two header formats, see [Section 4.2 of RFC 4880].
//!
//!   [Section 4.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2

use std::convert::TryFrom;

use crate::{
    Error,
    Result,
    Tag,
};

/// The length type of an old-format header.
///
/// See [Section 4.2.1 of RFC 4880].
///
///   [Section 4.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketLengthType {
    /// A one-octet body length.
    OneOctet,
    /// A two-octet body length.
    TwoOctets,
    /// A four-octet body length.
    FourOctets,
    /// The packet extends to the end of the enclosing container.
    Indeterminate,
}

impl From<u8> for PacketLengthType {
    fn from(u: u8) -> Self {
        match u & 3 {
            0 => PacketLengthType::OneOctet,
            1 => PacketLengthType::TwoOctets,
            2 => PacketLengthType::FourOctets,
            _ => PacketLengthType::Indeterminate,
        }
    }
}

impl From<PacketLengthType> for u8 {
    fn from(l: PacketLengthType) -> Self {
        match l {
            PacketLengthType::OneOctet => 0,
            PacketLengthType::TwoOctets => 1,
            PacketLengthType::FourOctets => 2,
            PacketLengthType::Indeterminate => 3,
        }
    }
}

/// The Cipher Type Byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CTB {
    /// A new-format CTB.
    New {
        /// The packet's tag.
        tag: Tag,
    },
    /// An old-format CTB.
    Old {
        /// The packet's tag.
        tag: Tag,
        /// How the body length is encoded.
        length_type: PacketLengthType,
    },
}

impl CTB {
    /// Returns an old-format CTB that can express `length`.
    ///
    /// Fails if the tag does not fit into four bits or the length is
    /// a partial body length.
    pub fn old(tag: Tag, length: BodyLength) -> Result<Self> {
        if ! tag.fits_old_format() {
            return Err(Error::InvalidArgument(
                format!("{} doesn't fit an old-format header", tag)).into());
        }

        let length_type = match length {
            BodyLength::Full(l) if l <= 0xff => PacketLengthType::OneOctet,
            BodyLength::Full(l) if l <= 0xffff => PacketLengthType::TwoOctets,
            BodyLength::Full(_) => PacketLengthType::FourOctets,
            BodyLength::Indeterminate => PacketLengthType::Indeterminate,
            BodyLength::Partial(_) =>
                return Err(Error::InvalidArgument(
                    "Old-format headers can't express partial body lengths"
                        .into()).into()),
        };

        Ok(CTB::Old { tag, length_type })
    }

    /// Returns the packet's tag.
    pub fn tag(&self) -> Tag {
        match self {
            CTB::New { tag } => *tag,
            CTB::Old { tag, .. } => *tag,
        }
    }
}

impl TryFrom<u8> for CTB {
    type Error = anyhow::Error;

    fn try_from(ptag: u8) -> Result<Self> {
        // The top bit of the ptag must be set.
        if ptag & 0x80 == 0 {
            return Err(Error::MalformedPacket(
                format!("Malformed CTB: MSB of ptag ({:#010b}) not set", ptag))
                       .into());
        }

        let ctb = if ptag & 0x40 != 0 {
            CTB::New { tag: Tag::from(ptag & 0x3f) }
        } else {
            CTB::Old {
                tag: Tag::from((ptag & 0x3c) >> 2),
                length_type: PacketLengthType::from(ptag),
            }
        };

        if ctb.tag() == Tag::Reserved {
            return Err(Error::MalformedPacket(
                "Packet uses the reserved tag 0".into()).into());
        }

        Ok(ctb)
    }
}

impl From<CTB> for u8 {
    fn from(ctb: CTB) -> Self {
        match ctb {
            CTB::New { tag } => 0b1100_0000 | u8::from(tag),
            CTB::Old { tag, length_type } =>
                0b1000_0000 | (u8::from(tag) << 2) | u8::from(length_type),
        }
    }
}

/// The length of a packet's body.
///
/// See [Section 4.2.2 of RFC 4880] for the new format and [Section
/// 4.2.1] for the old one.
///
///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
///   [Section 4.2.1]: https://tools.ietf.org/html/rfc4880#section-4.2.1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyLength {
    /// The packet's size is known.
    Full(u32),
    /// The first chunk of a packet with partial body lengths.
    ///
    /// The value is the size of the chunk, always a power of two.
    Partial(u32),
    /// The packet extends until an EOF is encountered.
    ///
    /// Only possible with old-format headers.
    Indeterminate,
}

/// A packet's header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    ctb: CTB,
    length: BodyLength,
}

impl Header {
    /// Creates a new header.
    pub fn new(ctb: CTB, length: BodyLength) -> Self {
        Header { ctb, length }
    }

    /// Returns the packet's CTB.
    pub fn ctb(&self) -> &CTB {
        &self.ctb
    }

    /// Returns the packet's length.
    pub fn length(&self) -> &BodyLength {
        &self.length
    }

    /// Syntax checks the header.
    ///
    /// Partial and indeterminate lengths are only allowed for data
    /// packets (literal, compressed and encrypted data), and some
    /// packets have a fixed or bounded size.  This does not look at
    /// the packet's content.
    pub fn valid(&self) -> Result<()> {
        let tag = self.ctb.tag();

        if tag == Tag::Reserved {
            return Err(Error::MalformedPacket(
                "Packet uses the reserved tag 0".into()).into());
        }

        let data_packet = match tag {
            Tag::Literal | Tag::CompressedData | Tag::SED | Tag::SEIP => true,
            _ => false,
        };

        match self.length {
            BodyLength::Partial(_) if ! data_packet =>
                return Err(Error::MalformedPacket(
                    format!("Partial body lengths are not allowed \
                             for {} packets", tag)).into()),
            BodyLength::Indeterminate if ! data_packet =>
                return Err(Error::MalformedPacket(
                    format!("Indeterminate lengths are not allowed \
                             for {} packets", tag)).into()),
            BodyLength::Full(l) => {
                let valid = match tag {
                    Tag::Literal => l >= 6,
                    Tag::CompressedData => l >= 1,
                    // Version, a random block of at least 8 bytes, the
                    // quick check and the MDC packet.
                    Tag::SEIP => l >= 1 + 8 + 2 + 22,
                    Tag::SED => l >= 8 + 2,
                    Tag::OnePassSig => l == 13,
                    Tag::Marker => l == 3,
                    Tag::MDC => l == 20,
                    Tag::Signature => l >= 10,
                    Tag::PKESK => l > 10,
                    Tag::SKESK => l >= 3,
                    Tag::PublicKey | Tag::PublicSubkey
                        | Tag::SecretKey | Tag::SecretSubkey => l > 6,
                    _ => true,
                };

                if ! valid {
                    return Err(Error::MalformedPacket(
                        format!("Invalid size ({} bytes) for a {} packet",
                                l, tag)).into());
                }
            }
            _ => (),
        }

        Ok(())
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for BodyLength {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;
        if bool::arbitrary(g) {
            BodyLength::Full(u32::arbitrary(g))
        } else {
            BodyLength::Partial(1 << (u8::arbitrary(g) % 31))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use buffered_reader::BufferedReader;
    use quickcheck_macros::quickcheck;

    #[test]
    fn ctb() {
        // Old format public key, two octet length.
        let ctb = CTB::try_from(0x99).unwrap();
        assert_eq!(ctb, CTB::Old {
            tag: Tag::PublicKey,
            length_type: PacketLengthType::TwoOctets,
        });
        assert_eq!(u8::from(ctb), 0x99);

        // New format SEIP.
        let ctb = CTB::try_from(0xd2).unwrap();
        assert_eq!(ctb, CTB::New { tag: Tag::SEIP });
        assert_eq!(u8::from(ctb), 0xd2);

        // MSB not set.
        assert!(CTB::try_from(0x19).is_err());
        // Reserved tag.
        assert!(CTB::try_from(0xc0).is_err());
        assert!(CTB::try_from(0x80).is_err());
    }

    #[test]
    fn old_format_lengths() {
        assert_eq!(CTB::old(Tag::UserID, BodyLength::Full(20)).unwrap(),
                   CTB::Old { tag: Tag::UserID,
                              length_type: PacketLengthType::OneOctet });
        assert_eq!(CTB::old(Tag::Signature, BodyLength::Full(300)).unwrap(),
                   CTB::Old { tag: Tag::Signature,
                              length_type: PacketLengthType::TwoOctets });
        assert_eq!(CTB::old(Tag::Literal, BodyLength::Full(70000)).unwrap(),
                   CTB::Old { tag: Tag::Literal,
                              length_type: PacketLengthType::FourOctets });
        assert!(CTB::old(Tag::Literal, BodyLength::Partial(512)).is_err());
        assert!(CTB::old(Tag::SEIP, BodyLength::Full(100)).is_err());
    }

    #[test]
    fn valid() {
        let h = |tag, length| Header::new(CTB::New { tag }, length);

        assert!(h(Tag::Literal, BodyLength::Partial(1)).valid().is_ok());
        assert!(h(Tag::Signature, BodyLength::Partial(512)).valid().is_err());
        assert!(h(Tag::UserID, BodyLength::Indeterminate).valid().is_err());
        assert!(h(Tag::Marker, BodyLength::Full(3)).valid().is_ok());
        assert!(h(Tag::Marker, BodyLength::Full(4)).valid().is_err());
        assert!(h(Tag::MDC, BodyLength::Full(20)).valid().is_ok());
        assert!(h(Tag::Unknown(23), BodyLength::Full(0)).valid().is_ok());
    }

    #[quickcheck]
    fn body_length_new_format(l: BodyLength) -> bool {
        let mut buf = Vec::new();
        l.serialize_new(&mut buf).unwrap();
        let mut reader = buffered_reader::Memory::new(&buf);
        BodyLength::parse_new_format(&mut reader).unwrap() == l
            && reader.data_eof().unwrap().is_empty()
    }

    #[quickcheck]
    fn body_length_old_format(l: u32) -> bool {
        let l = BodyLength::Full(l);
        let ctb = CTB::old(Tag::Literal, l).unwrap();
        let length_type = match ctb {
            CTB::Old { length_type, .. } => length_type,
            CTB::New { .. } => return false,
        };
        let mut buf = Vec::new();
        l.serialize_old(length_type, &mut buf).unwrap();
        let mut reader = buffered_reader::Memory::new(&buf);
        BodyLength::parse_old_format(&mut reader, length_type).unwrap() == l
    }
}
