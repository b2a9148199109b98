//! OpenPGP packet serializer.
//!
//! There are two interfaces to serialize OpenPGP data.  Which one is
//! applicable depends on whether or not the packet structure is
//! already assembled in memory, with all information already in place
//! (e.g. because it was parsed).
//!
//! If it is, use [`Marshal`].  Packet bodies implement it without a
//! header; wrap them in a [`Packet`] to get a framed packet.
//!
//! Otherwise, use the streaming serialization interface in
//! [`stream`], which is built on the writer stack in [`writer`].
//!
//!   [`Marshal`]: trait.Marshal.html
//!   [`Packet`]: ../enum.Packet.html
//!   [`stream`]: stream/index.html
//!   [`writer`]: writer/index.html

use std::io::{self, Write};

use crate::packet::key::SecretKey;
use crate::packet::{
    BodyLength,
    CTB,
    CompressedData,
    Header,
    Key,
    Literal,
    Marker,
    MDC,
    OnePassSig,
    PKESK,
    SED,
    SEIP,
    SKESK,
    Signature,
    Trust,
    Unknown,
    UserAttribute,
    UserID,
};
use crate::packet::header::PacketLengthType;
use crate::Error;
use crate::Packet;
use crate::Result;
use crate::Tag;

mod partial_body;
pub(crate) use self::partial_body::PartialBodyFilter;
pub mod writer;
pub mod stream;

/// Serializes OpenPGP data structures.
///
/// For packet types, this writes the packet's body.  [`Packet`]
/// prepends the header.
///
///   [`Packet`]: ../enum.Packet.html
pub trait Marshal {
    /// Writes a serialized version of the object to `o`.
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()>;

    /// Returns the length of the serialized form.
    fn serialized_len(&self) -> usize;

    /// Serializes the object to a vector.
    fn to_vec(&self) -> Result<Vec<u8>> {
        let mut o = Vec::with_capacity(self.serialized_len());
        self.serialize(&mut o)?;
        Ok(o)
    }
}

fn write_byte(o: &mut dyn io::Write, b: u8) -> io::Result<()> {
    o.write_all(&[b])
}

fn write_be_u16(o: &mut dyn io::Write, n: u16) -> io::Result<()> {
    o.write_all(&n.to_be_bytes())
}

fn write_be_u32(o: &mut dyn io::Write, n: u32) -> io::Result<()> {
    o.write_all(&n.to_be_bytes())
}

// Returns the log2 of a partial body chunk size, which must be a
// power of two no larger than 2^30.
fn partial_exponent(l: u32) -> Result<u8> {
    if l == 0 || ! l.is_power_of_two() || l > 1 << 30 {
        return Err(Error::InvalidArgument(
            format!("Invalid partial body length: {}", l)).into());
    }
    Ok(l.trailing_zeros() as u8)
}

impl BodyLength {
    /// Emits the length encoded for use with new-format CTBs.
    ///
    /// Note: the CTB itself is not emitted.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for
    /// `BodyLength::Indeterminate`, which new-format headers can't
    /// express, and for partial lengths that are not a power of two.
    pub fn serialize_new(&self, o: &mut dyn io::Write) -> Result<()> {
        match *self {
            BodyLength::Full(l) => {
                if l < 192 {
                    write_byte(o, l as u8)?;
                } else if l < 8384 {
                    let v = l - 192 + (192 << 8);
                    write_be_u16(o, v as u16)?;
                } else {
                    write_byte(o, 0xff)?;
                    write_be_u32(o, l)?;
                }
            },
            BodyLength::Partial(l) =>
                write_byte(o, 224 + partial_exponent(l)?)?,
            BodyLength::Indeterminate =>
                return Err(Error::InvalidArgument(
                    "Indeterminate lengths are not supported for \
                     new format packets".into()).into()),
        }
        Ok(())
    }

    /// Returns the size of the new-format encoding of this length.
    pub fn new_len(&self) -> usize {
        match *self {
            BodyLength::Full(l) if l < 192 => 1,
            BodyLength::Full(l) if l < 8384 => 2,
            BodyLength::Full(_) => 5,
            BodyLength::Partial(_) => 1,
            BodyLength::Indeterminate => 0,
        }
    }

    /// Emits the length encoded for use with old-format CTBs.
    ///
    /// The width is given by `length_type`.  Note: the CTB itself is
    /// not emitted.
    pub fn serialize_old(&self, length_type: PacketLengthType,
                         o: &mut dyn io::Write)
                         -> Result<()> {
        let l = match *self {
            BodyLength::Full(l) => l,
            BodyLength::Indeterminate
                if length_type == PacketLengthType::Indeterminate =>
                return Ok(()),
            _ => return Err(Error::InvalidArgument(format!(
                "{:?} can't be encoded as {:?}", self, length_type)).into()),
        };

        match length_type {
            PacketLengthType::OneOctet if l <= 0xff =>
                write_byte(o, l as u8)?,
            PacketLengthType::TwoOctets if l <= 0xffff =>
                write_be_u16(o, l as u16)?,
            PacketLengthType::FourOctets =>
                write_be_u32(o, l)?,
            _ => return Err(Error::InvalidArgument(format!(
                "{} bytes don't fit a length of type {:?}", l, length_type))
                            .into()),
        }
        Ok(())
    }
}

impl Marshal for Header {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, u8::from(*self.ctb()))?;
        match self.ctb() {
            CTB::New { .. } => self.length().serialize_new(o),
            CTB::Old { length_type, .. } =>
                self.length().serialize_old(*length_type, o),
        }
    }

    fn serialized_len(&self) -> usize {
        1 + match self.ctb() {
            CTB::New { .. } => self.length().new_len(),
            CTB::Old { length_type, .. } => match length_type {
                PacketLengthType::OneOctet => 1,
                PacketLengthType::TwoOctets => 2,
                PacketLengthType::FourOctets => 4,
                PacketLengthType::Indeterminate => 0,
            },
        }
    }
}

/// Returns the header used to frame a packet.
///
/// Packets whose tag fits into four bits get an old-format header
/// with the shortest length encoding.  Other packets, and partial
/// body lengths, use the new format.
pub(crate) fn header_for(tag: Tag, length: BodyLength) -> Result<Header> {
    let ctb = match length {
        BodyLength::Partial(_) => CTB::New { tag },
        _ if tag.fits_old_format() => CTB::old(tag, length)?,
        BodyLength::Indeterminate =>
            return Err(Error::InvalidArgument(format!(
                "{} packets can't have an indeterminate length", tag))
                       .into()),
        _ => CTB::New { tag },
    };
    Ok(Header::new(ctb, length))
}

impl Marshal for Unknown {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.body())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.body().len()
    }
}

impl Marshal for Signature {
    /// Writes the signature packet's body to `o`.
    ///
    /// Note: this does not compute the signature (which would require
    /// access to the private key); it assumes that the MPIs are up to
    /// date.
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        match self.version() {
            3 => {
                let ctime = self.creation_time().ok_or_else(|| {
                    Error::InvalidArgument(
                        "Version 3 signature without creation time".into())
                })?;
                let issuer = self.issuer().ok_or_else(|| {
                    Error::InvalidArgument(
                        "Version 3 signature without issuer".into())
                })?;
                write_byte(o, 3)?;
                // Length of the hashed material.
                write_byte(o, 5)?;
                write_byte(o, self.typ().into())?;
                write_be_u32(o, ctime.into())?;
                o.write_all(issuer.as_bytes())?;
                write_byte(o, self.pk_algo().into())?;
                write_byte(o, self.hash_algo().into())?;
            },
            4 => {
                write_byte(o, 4)?;
                write_byte(o, self.typ().into())?;
                write_byte(o, self.pk_algo().into())?;
                write_byte(o, self.hash_algo().into())?;

                for area in [self.hashed_area(), self.unhashed_area()] {
                    let raw = area.as_bytes();
                    if raw.len() > std::u16::MAX as usize {
                        return Err(Error::InvalidArgument(
                            "Subpacket area exceeds 64 KiB".into()).into());
                    }
                    write_be_u16(o, raw.len() as u16)?;
                    o.write_all(raw)?;
                }
            },
            v => return Err(Error::InvalidArgument(
                format!("Can't serialize version {} signatures", v)).into()),
        }

        o.write_all(self.digest_prefix())?;
        self.mpis().serialize(o)
    }

    fn serialized_len(&self) -> usize {
        let fields = if self.version() == 3 {
            // Version, hashed length, type, creation time, issuer,
            // algorithms.
            1 + 1 + 1 + 4 + 8 + 1 + 1
        } else {
            1 + 1 + 1 + 1
                + 2 + self.hashed_area().len()
                + 2 + self.unhashed_area().len()
        };
        fields + 2 + self.mpis().serialized_len()
    }
}

impl Marshal for OnePassSig {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, 3)?;
        write_byte(o, self.typ().into())?;
        write_byte(o, self.hash_algo().into())?;
        write_byte(o, self.pk_algo().into())?;
        o.write_all(self.issuer().as_bytes())?;
        write_byte(o, self.last_raw())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        13
    }
}

impl Key {
    fn serialize_secret(&self, o: &mut dyn io::Write) -> Result<()> {
        self.serialize_public(o)?;
        match self.secret() {
            None => Err(Error::MissingSecretKey(
                format!("{} has no secret key material", self.keyid()))
                        .into()),
            Some(SecretKey::Unencrypted { mpis }) => {
                write_byte(o, 0)?;
                mpis.serialize(o)?;
                write_be_u16(o, mpis.checksum()?)?;
                Ok(())
            },
            Some(SecretKey::Encrypted { s2k_usage, algo, s2k, iv, ciphertext }) => {
                write_byte(o, *s2k_usage)?;
                if *s2k_usage == 254 || *s2k_usage == 255 {
                    write_byte(o, (*algo).into())?;
                    s2k.serialize(o)?;
                }
                o.write_all(iv)?;
                o.write_all(ciphertext)?;
                Ok(())
            },
        }
    }

    fn secret_len(&self) -> usize {
        self.public_len() + match self.secret() {
            None => 0,
            Some(SecretKey::Unencrypted { mpis }) =>
                1 + mpis.serialized_len() + 2,
            Some(SecretKey::Encrypted { s2k_usage, s2k, iv, ciphertext, .. }) => {
                let s2k_len = if *s2k_usage == 254 || *s2k_usage == 255 {
                    1 + s2k.serialized_len()
                } else {
                    0
                };
                1 + s2k_len + iv.len() + ciphertext.len()
            },
        }
    }
}

impl Marshal for UserID {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.value())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.value().len()
    }
}

impl Marshal for UserAttribute {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.value())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.value().len()
    }
}

impl Marshal for Marker {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(Marker::BODY)?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        Marker::BODY.len()
    }
}

impl Marshal for Trust {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.value())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.value().len()
    }
}

impl Literal {
    /// Writes the headers of the `Literal` data packet to `o`.
    ///
    /// The body is not written.  This is used by the streaming
    /// literal writer.
    pub(crate) fn serialize_headers(&self, o: &mut dyn io::Write)
                                    -> Result<()> {
        write_byte(o, self.format().into())?;
        write_byte(o, self.filename().len() as u8)?;
        o.write_all(self.filename())?;
        write_be_u32(o, self.date().into())?;
        Ok(())
    }
}

impl Marshal for Literal {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        self.serialize_headers(o)?;
        o.write_all(self.body())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.header_len() + self.body().len()
    }
}

impl Marshal for CompressedData {
    /// Writes the algorithm and the buffered, still compressed body.
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, self.algo().into())?;
        o.write_all(self.body())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        1 + self.body().len()
    }
}

impl Marshal for PKESK {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, 3)?;
        o.write_all(self.recipient().as_bytes())?;
        write_byte(o, self.pk_algo().into())?;
        self.esk().serialize(o)
    }

    fn serialized_len(&self) -> usize {
        1 + 8 + 1 + self.esk().serialized_len()
    }
}

impl Marshal for SKESK {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, 4)?;
        write_byte(o, self.symmetric_algo().into())?;
        self.s2k().serialize(o)?;
        o.write_all(self.esk())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        1 + 1 + self.s2k().serialized_len() + self.esk().len()
    }
}

impl Marshal for SEIP {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        write_byte(o, self.version())?;
        o.write_all(self.body())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        1 + self.body().len()
    }
}

impl Marshal for SED {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.body())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.body().len()
    }
}

impl Marshal for MDC {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        o.write_all(self.digest())?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        20
    }
}

impl Packet {
    fn serialize_body(&self, o: &mut dyn io::Write) -> Result<()> {
        match self {
            Packet::Unknown(p) => p.serialize(o),
            Packet::Signature(p) => p.serialize(o),
            Packet::OnePassSig(p) => p.serialize(o),
            Packet::PublicKey(k) | Packet::PublicSubkey(k) =>
                k.serialize_public(o),
            Packet::SecretKey(k) | Packet::SecretSubkey(k) =>
                k.serialize_secret(o),
            Packet::Marker(p) => p.serialize(o),
            Packet::Trust(p) => p.serialize(o),
            Packet::UserID(p) => p.serialize(o),
            Packet::UserAttribute(p) => p.serialize(o),
            Packet::Literal(p) => p.serialize(o),
            Packet::CompressedData(p) => p.serialize(o),
            Packet::PKESK(p) => p.serialize(o),
            Packet::SKESK(p) => p.serialize(o),
            Packet::SEIP(p) => p.serialize(o),
            Packet::SED(p) => p.serialize(o),
            Packet::MDC(p) => p.serialize(o),
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Packet::Unknown(p) => p.serialized_len(),
            Packet::Signature(p) => p.serialized_len(),
            Packet::OnePassSig(p) => p.serialized_len(),
            Packet::PublicKey(k) | Packet::PublicSubkey(k) => k.public_len(),
            Packet::SecretKey(k) | Packet::SecretSubkey(k) => k.secret_len(),
            Packet::Marker(p) => p.serialized_len(),
            Packet::Trust(p) => p.serialized_len(),
            Packet::UserID(p) => p.serialized_len(),
            Packet::UserAttribute(p) => p.serialized_len(),
            Packet::Literal(p) => p.serialized_len(),
            Packet::CompressedData(p) => p.serialized_len(),
            Packet::PKESK(p) => p.serialized_len(),
            Packet::SKESK(p) => p.serialized_len(),
            Packet::SEIP(p) => p.serialized_len(),
            Packet::SED(p) => p.serialized_len(),
            Packet::MDC(p) => p.serialized_len(),
        }
    }

    fn header(&self) -> Result<Header> {
        let len = self.body_len();
        if len > std::u32::MAX as usize {
            return Err(Error::InvalidArgument(
                format!("Packet body too large: {} bytes", len)).into());
        }
        header_for(self.tag(), BodyLength::Full(len as u32))
    }
}

impl Marshal for Packet {
    /// Writes the packet, header and body, to `o`.
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        self.header()?.serialize(o)?;
        self.serialize_body(o)
    }

    fn serialized_len(&self) -> usize {
        self.header().map(|h| h.serialized_len()).unwrap_or(0)
            + self.body_len()
    }
}

impl Marshal for [Packet] {
    fn serialize(&self, o: &mut dyn io::Write) -> Result<()> {
        for p in self {
            p.serialize(o)?;
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        self.iter().map(|p| p.serialized_len()).sum()
    }
}

/// Writes `packets` to `o`.
///
/// Convenience function for callers holding a `Write` by value.
pub fn serialize_packets<W: Write>(packets: &[Packet], mut o: W)
                                   -> Result<()> {
    packets.serialize(&mut o)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::packets_from_bytes;
    use crate::types::DataFormat;

    fn new_len(l: BodyLength) -> Vec<u8> {
        let mut v = Vec::new();
        l.serialize_new(&mut v).unwrap();
        assert_eq!(v.len(), l.new_len());
        v
    }

    #[test]
    fn new_format_lengths() {
        assert_eq!(new_len(BodyLength::Full(0)), vec![0]);
        assert_eq!(new_len(BodyLength::Full(191)), vec![191]);
        assert_eq!(new_len(BodyLength::Full(192)), vec![192, 0]);
        assert_eq!(new_len(BodyLength::Full(8383)), vec![223, 255]);
        assert_eq!(new_len(BodyLength::Full(8384)),
                   vec![255, 0, 0, 0x20, 0xc0]);
        assert_eq!(new_len(BodyLength::Full(100000)),
                   vec![255, 0x00, 0x01, 0x86, 0xa0]);
        assert_eq!(new_len(BodyLength::Partial(1)), vec![224]);
        assert_eq!(new_len(BodyLength::Partial(8192)), vec![224 + 13]);
        assert_eq!(new_len(BodyLength::Partial(1 << 30)), vec![254]);

        let mut v = Vec::new();
        assert!(BodyLength::Partial(3).serialize_new(&mut v).is_err());
        assert!(BodyLength::Indeterminate.serialize_new(&mut v).is_err());
    }

    #[test]
    fn marker() {
        let buf = Packet::from(Marker::default()).to_vec().unwrap();
        assert_eq!(buf, vec![0xa8, 0x03, b'P', b'G', b'P']);
    }

    #[test]
    fn framing() {
        // Tags below 16 use old-format headers.
        let mut l = Literal::new(DataFormat::Binary);
        l.set_body(vec![0; 300]);
        let buf = Packet::from(l).to_vec().unwrap();
        assert_eq!(&buf[..3], &[0xad, 0x01, 0x32]);
        assert_eq!(buf.len(), 3 + 306);

        // Others use new-format headers.
        let mdc = MDC::from([0u8; 20]);
        let buf = Packet::from(mdc).to_vec().unwrap();
        assert_eq!(&buf[..2], &[0xd3, 0x14]);
        assert_eq!(buf.len(), 22);

        let p: Packet = SEIP::default().into();
        assert_eq!(p.to_vec().unwrap(), vec![0xd2, 0x01, 0x01]);
    }

    #[test]
    fn indeterminate_needs_old_format() {
        assert!(header_for(Tag::Literal, BodyLength::Indeterminate).is_ok());
        assert!(header_for(Tag::MDC, BodyLength::Indeterminate).is_err());
        let h = header_for(Tag::Literal, BodyLength::Partial(512)).unwrap();
        assert_eq!(h.ctb(), &CTB::New { tag: Tag::Literal });
    }

    #[test]
    fn reserialize_keys() {
        for name in ["keys/alice.pgp", "keys/alice-secret.pgp",
                     "keys/bob.pgp", "keys/bob-secret.pgp",
                     "keys/carol-secret.pgp", "keys/v3-rsa.pgp"] {
            let data = std::fs::read(crate::path_to(name)).unwrap();
            let packets = packets_from_bytes(&data).unwrap();
            assert!(! packets.is_empty());
            assert_eq!(packets[..].serialized_len(), data.len(), "{}", name);
            assert_eq!(Marshal::to_vec(&packets[..]).unwrap(), data, "{}", name);
        }
    }

    #[test]
    fn reserialize_signature() {
        let data = std::fs::read(
            crate::path_to("messages/hello.txt.sig")).unwrap();
        let packets = packets_from_bytes(&data).unwrap();
        assert_eq!(packets.len(), 1);
        let sig = match &packets[0] {
            Packet::Signature(s) => s,
            p => panic!("Expected a signature, got {:?}", p),
        };
        assert_eq!(sig.to_vec().unwrap(), &data[3..]);
    }
}
