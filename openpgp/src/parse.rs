//! Packet parsing infrastructure.
//!
//! OpenPGP defines a binary representation suitable for storing and
//! communicating OpenPGP data structures (see [Section 3 ff. of RFC
//! 4880]).  Parsing is the process of interpreting the binary
//! representation.
//!
//! There are two interfaces.  The [`PacketParser`] is a pull parser:
//! the caller decides, packet by packet, whether to step over
//! ([`next`]) or into ([`recurse`]) a packet, can stream a packet's
//! body using `io::Read` or [`body_chunk`], and can [`decrypt`]
//! encrypted containers.  The [`parse`] function drives a
//! `PacketParser` and hands the resulting [`Event`]s to a callback.
//!
//! Reading is organized around a [`buffered_reader::Stack`].  Every
//! layer of a message is a filter on the stack while it is being
//! read: the packet's length (a `Region`, a partial body filter, or
//! an indeterminate region), decryption, decompression, and the hash
//! tee over literal data.  When a layer is done, it is popped again.
//!
//!   [Section 3 ff. of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3
//!   [`PacketParser`]: struct.PacketParser.html
//!   [`next`]: struct.PacketParser.html#method.next
//!   [`recurse`]: struct.PacketParser.html#method.recurse
//!   [`body_chunk`]: struct.PacketParser.html#method.body_chunk
//!   [`decrypt`]: struct.PacketParser.html#method.decrypt
//!   [`parse`]: fn.parse.html
//!   [`Event`]: enum.Event.html

use std::cmp;
use std::convert::TryFrom;
use std::fmt;
use std::io::{self, Read};
use std::mem;
use std::path::Path;

use buffered_reader::{BufferedReader, Stack};

use crate::armor;
use crate::cleartext::{self, Cleartext};
use crate::crypto::{hash, mpi, S2K, SessionKey};
use crate::crypto::symmetric::{self, BufferedReaderDecryptor};
use crate::packet::{
    BodyLength,
    CompressedData,
    CTB,
    Header,
    Key,
    Literal,
    Marker,
    OnePassSig,
    PKESK,
    SED,
    SEIP,
    SKESK,
    MDC,
    Signature,
    Trust,
    Unknown,
    UserAttribute,
    UserID,
};
use crate::macros::Tracer;
use crate::packet::header::PacketLengthType;
use crate::packet::key::SecretKey;
use crate::packet::signature::subpacket::SubpacketArea;
use crate::types::{
    CompressionAlgorithm,
    DataFormat,
    HashAlgorithm,
    PublicKeyAlgorithm,
    SignatureType,
    SymmetricAlgorithm,
    Timestamp,
};
use crate::{Error, ErrorStack, KeyID, Packet, Result, Severity, Tag};

mod hashed_reader;
pub(crate) use self::hashed_reader::HashedReader;
mod partial_body;
use self::partial_body::PartialBodyFilter;
mod mpis;
mod packet_parser_builder;
pub use self::packet_parser_builder::PacketParserBuilder;

/// The default maximum recursion depth.
///
/// A compressed packet inside an encrypted packet has depth 2.
pub const MAX_RECURSION_DEPTH: u8 = 16;

/// The default maximum size of a packet that is read into memory.
///
/// Literal data and containers are streamed and not subject to this
/// limit.
pub const MAX_PACKET_SIZE: u32 = 1 << 20;

/// The default size of the chunks handed out by
/// [`PacketParser::body_chunk`].
///
///   [`PacketParser::body_chunk`]: struct.PacketParser.html#method.body_chunk
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Parsing of packets and related structures.
///
/// This is a uniform interface to parse packets, messages, keys, and
/// related data structures.
pub trait Parse<'a, T> {
    /// Reads from the given reader.
    fn from_reader<R: 'a + Read>(reader: R) -> Result<T>;

    /// Reads from the given file.
    fn from_file<P: AsRef<Path>>(path: P) -> Result<T> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Reads from the given slice.
    fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &'a D) -> Result<T>;
}

/// The state kept in the cookies of the reader stack.
#[derive(Debug, Default)]
pub(crate) struct Cookie {
    /// The hashes a `HashedReader` feeds.
    pub(crate) hashes: Vec<hash::Context>,
}

/// Parser settings.
///
/// Normally set through the [`PacketParserBuilder`].
///
///   [`PacketParserBuilder`]: struct.PacketParserBuilder.html
#[derive(Debug, Clone)]
pub struct PacketParserSettings {
    /// The maximum number of containers to descend into.
    pub max_recursion_depth: u8,
    /// The maximum size of a packet that is read into memory.
    ///
    /// Bigger packets are skipped and recorded as errors.
    pub max_packet_size: u32,
    /// The size of the chunks streamed bodies are handed out in.
    pub chunk_size: usize,
    /// Whether unknown critical subpackets are errors rather than
    /// warnings.
    pub strict: bool,
    /// Whether the unread part of a packet's body is kept in the
    /// packet when the parser moves on.
    pub buffer_unread_content: bool,
    /// Whether ASCII armor and cleartext signature framing are
    /// detected and stripped.
    pub dearmor: bool,
    /// Traces the parser.
    pub trace: bool,
    /// Traces pushes and pops on the reader stack.
    pub trace_readers: bool,
}

impl Default for PacketParserSettings {
    fn default() -> Self {
        PacketParserSettings {
            max_recursion_depth: MAX_RECURSION_DEPTH,
            max_packet_size: MAX_PACKET_SIZE,
            chunk_size: CHUNK_SIZE,
            strict: false,
            buffer_unread_content: false,
            dearmor: true,
            trace: false,
            trace_readers: false,
        }
    }
}

// Converts an error from the reader stack.
//
// Our own filters wrap an `Error` in the `io::Error`.  A premature EOF
// means that a packet is truncated.
pub(crate) fn map_io_error(e: io::Error) -> anyhow::Error {
    let ours = e.get_ref().map(|inner| inner.is::<Error>()).unwrap_or(false);
    if ours {
        return match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(err)) => (*err).into(),
            Some(Err(inner)) => anyhow::anyhow!("{}", inner),
            None => Error::MalformedPacket("I/O error".into()).into(),
        };
    }

    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::MalformedPacket(format!("Truncated packet: {}", e)).into()
    } else {
        e.into()
    }
}

/// Parses a packet body held in memory.
pub(crate) struct BodyParser<'b> {
    tag: Tag,
    data: &'b [u8],
    cursor: usize,
}

impl<'b> BodyParser<'b> {
    pub(crate) fn new(tag: Tag, data: &'b [u8]) -> Self {
        BodyParser { tag, data, cursor: 0 }
    }

    /// Returns the number of unparsed bytes.
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub(crate) fn parse_bytes(&mut self, name: &'static str, n: usize)
                              -> Result<&'b [u8]> {
        if self.remaining() < n {
            return Err(Error::MalformedPacket(
                format!("{}: truncated {} (need {} bytes, have {})",
                        self.tag, name, n, self.remaining())).into());
        }
        let data = &self.data[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(data)
    }

    /// Returns everything that is left.
    pub(crate) fn parse_bytes_eof(&mut self) -> &'b [u8] {
        let data = &self.data[self.cursor..];
        self.cursor = self.data.len();
        data
    }

    pub(crate) fn parse_u8(&mut self, name: &'static str) -> Result<u8> {
        Ok(self.parse_bytes(name, 1)?[0])
    }

    pub(crate) fn parse_be_u16(&mut self, name: &'static str) -> Result<u16> {
        let b = self.parse_bytes(name, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn parse_be_u32(&mut self, name: &'static str) -> Result<u32> {
        let b = self.parse_bytes(name, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    // A fixed size array, e.g. a salt.
    fn parse_array<A: Default + AsMut<[u8]>>(&mut self, name: &'static str)
                                            -> Result<A> {
        let mut a = A::default();
        let n = a.as_mut().len();
        a.as_mut().copy_from_slice(self.parse_bytes(name, n)?);
        Ok(a)
    }
}

impl Header {
    /// Parses a packet header.
    ///
    /// See [Section 4.2 of RFC 4880].
    ///
    ///   [Section 4.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2
    pub(crate) fn parse<R: BufferedReader<C>, C>(bio: &mut R)
                                                -> Result<Header> {
        let ptag = bio.data_consume_hard(1).map_err(map_io_error)?[0];
        let ctb = CTB::try_from(ptag)?;
        let length = match ctb {
            CTB::New { .. } => BodyLength::parse_new_format(bio),
            CTB::Old { length_type, .. } =>
                BodyLength::parse_old_format(bio, length_type),
        }.map_err(map_io_error)?;
        Ok(Header::new(ctb, length))
    }
}

impl BodyLength {
    /// Decodes a new format body length as described in [Section
    /// 4.2.2 of RFC 4880].
    ///
    ///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
    pub(crate) fn parse_new_format<T: BufferedReader<C>, C>(bio: &mut T)
        -> io::Result<BodyLength>
    {
        let octet1 = bio.data_consume_hard(1)?[0];
        match octet1 {
            0..=191 => // One octet.
                Ok(BodyLength::Full(octet1 as u32)),
            192..=223 => { // Two octets length.
                let octet2 = bio.data_consume_hard(1)?[0];
                Ok(BodyLength::Full(((octet1 as u32 - 192) << 8)
                                    + octet2 as u32 + 192))
            },
            224..=254 => // Partial body length.
                Ok(BodyLength::Partial(1 << (octet1 & 0x1F))),
            255 => // Five octets.
                Ok(BodyLength::Full(bio.read_be_u32()?)),
        }
    }

    /// Decodes an old format body length as described in [Section
    /// 4.2.1 of RFC 4880].
    ///
    ///   [Section 4.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.1
    pub(crate) fn parse_old_format<T: BufferedReader<C>, C>
        (bio: &mut T, length_type: PacketLengthType)
         -> io::Result<BodyLength>
    {
        match length_type {
            PacketLengthType::OneOctet =>
                Ok(BodyLength::Full(bio.data_consume_hard(1)?[0] as u32)),
            PacketLengthType::TwoOctets =>
                Ok(BodyLength::Full(bio.read_be_u16()? as u32)),
            PacketLengthType::FourOctets =>
                Ok(BodyLength::Full(bio.read_be_u32()?)),
            PacketLengthType::Indeterminate =>
                Ok(BodyLength::Indeterminate),
        }
    }
}

impl S2K {
    /// Parses an S2K specifier.
    ///
    /// See [Section 3.7.1 of RFC 4880].
    ///
    ///   [Section 3.7.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3.7.1
    pub(crate) fn parse(p: &mut BodyParser) -> Result<Self> {
        let typ = p.parse_u8("s2k_type")?;
        let hash: HashAlgorithm = p.parse_u8("s2k_hash_algo")?.into();
        match typ {
            0 => Ok(S2K::Simple { hash }),
            1 => Ok(S2K::Salted { hash, salt: p.parse_array("s2k_salt")? }),
            3 => Ok(S2K::Iterated {
                hash,
                salt: p.parse_array("s2k_salt")?,
                coded_count: p.parse_u8("s2k_count")?,
            }),
            t => Err(Error::BadS2K(format!("Unknown S2K type {}", t)).into()),
        }
    }
}

// Wraps a body we can't make sense of.
fn unknown(tag: Tag, body: &[u8], errors: &mut ErrorStack,
           e: anyhow::Error) -> Packet {
    errors.warn(e);
    Unknown::new(tag, body.to_vec()).into()
}

// Parses the body of a packet that is read into memory.
//
// Structural errors are returned.  Anything that merely stops us from
// understanding the packet turns it into an `Unknown` packet and is
// recorded in `errors`.
fn parse_body(tag: Tag, body: &[u8], settings: &PacketParserSettings,
              errors: &mut ErrorStack)
              -> Result<Packet> {
    let mut p = BodyParser::new(tag, body);
    let r = match tag {
        Tag::Signature => signature(&mut p, settings.strict, errors),
        Tag::OnePassSig => one_pass_sig(&mut p, errors),
        Tag::PublicKey | Tag::PublicSubkey
            | Tag::SecretKey | Tag::SecretSubkey => key(tag, &mut p, errors),
        Tag::PKESK => pkesk(&mut p, errors),
        Tag::SKESK => skesk(&mut p, errors),
        Tag::Marker => {
            if body == Marker::BODY {
                Ok(Marker::default().into())
            } else {
                Ok(unknown(tag, body, errors, Error::MalformedPacket(
                    "Marker packet with an unexpected body".into()).into()))
            }
        }
        Tag::Trust => Ok(Trust::from(body.to_vec()).into()),
        Tag::UserID => Ok(UserID::from(body).into()),
        Tag::UserAttribute => Ok(UserAttribute::from(body.to_vec()).into()),
        Tag::MDC => {
            let digest: [u8; 20] = p.parse_array("mdc")?;
            Ok(MDC::from(digest).into())
        }
        _ => Ok(unknown(tag, body, errors,
                        Error::UnknownPacketTag(tag).into())),
    };

    match r {
        Ok(packet) => {
            if p.remaining() > 0 {
                if let Packet::Unknown(_) = packet {
                    // The whole body is in there anyway.
                } else {
                    errors.warn(Error::MalformedPacket(
                        format!("{}: {} bytes of trailing junk",
                                tag, p.remaining())));
                }
            }
            Ok(packet)
        }
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::BadS2K(_))
                | Some(Error::UnsupportedHashAlgorithm(_))
                | Some(Error::UnsupportedPublicKeyAlgorithm(_))
                | Some(Error::UnsupportedSymmetricAlgorithm(_)) =>
                Ok(unknown(tag, body, errors, e)),
            _ => Err(e),
        },
    }
}

fn signature(p: &mut BodyParser, strict: bool, errors: &mut ErrorStack)
             -> Result<Packet> {
    let version = p.parse_u8("version")?;
    match version {
        3 => {
            let hashed_len = p.parse_u8("hashed_len")?;
            if hashed_len != 5 {
                return Err(Error::MalformedPacket(
                    format!("Version 3 signature with a hashed length of {}",
                            hashed_len)).into());
            }
            let typ = SignatureType::from(p.parse_u8("type")?);
            let creation_time = Timestamp::from(p.parse_be_u32("ctime")?);
            let issuer = KeyID::from_bytes(p.parse_bytes("issuer", 8)?)?;
            let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
            let hash_algo = HashAlgorithm::from(p.parse_u8("hash_algo")?);
            let prefix: [u8; 2] = p.parse_array("digest_prefix")?;
            let mpis = mpi::Signature::parse(pk_algo, p)?;
            Ok(Signature::new_v3(typ, creation_time, issuer, pk_algo,
                                 hash_algo, prefix, mpis).into())
        }
        4 => {
            let typ = SignatureType::from(p.parse_u8("type")?);
            let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
            let hash_algo = HashAlgorithm::from(p.parse_u8("hash_algo")?);
            let len = p.parse_be_u16("hashed_area_len")? as usize;
            let hashed_area = SubpacketArea::from_bytes(
                p.parse_bytes("hashed_area", len)?.to_vec())?;
            let len = p.parse_be_u16("unhashed_area_len")? as usize;
            let unhashed_area = SubpacketArea::from_bytes(
                p.parse_bytes("unhashed_area", len)?.to_vec())?;
            let prefix: [u8; 2] = p.parse_array("digest_prefix")?;
            let mpis = mpi::Signature::parse(pk_algo, p)?;

            for sp in hashed_area.unknown_critical() {
                let e = Error::UnknownCriticalSubpacket(sp.tag().into());
                if strict {
                    errors.error(e);
                } else {
                    errors.warn(e);
                }
            }
            for sp in hashed_area.iter().chain(unhashed_area.iter())
                .filter(|sp| ! sp.critical() && ! sp.is_known())
            {
                errors.warn(Error::MalformedPacket(
                    format!("Ignoring unknown signature subpacket {}",
                            u8::from(sp.tag()))));
            }

            Ok(Signature::new_v4(typ, pk_algo, hash_algo, hashed_area,
                                 unhashed_area, prefix, mpis).into())
        }
        v => Ok(unknown(Tag::Signature, p.data, errors,
                        Error::MalformedPacket(
                            format!("Unsupported signature version {}", v))
                        .into())),
    }
}

/// Parses the body of a signature packet.
///
/// This is used for embedded signatures.
pub(crate) fn signature_from_body(body: &[u8]) -> Result<Signature> {
    let mut errors = ErrorStack::new();
    let mut p = BodyParser::new(Tag::Signature, body);
    match signature(&mut p, false, &mut errors)? {
        Packet::Signature(sig) => Ok(sig),
        _ => Err(Error::MalformedPacket(
            "Unsupported embedded signature".into()).into()),
    }
}

fn one_pass_sig(p: &mut BodyParser, errors: &mut ErrorStack)
                -> Result<Packet> {
    let version = p.parse_u8("version")?;
    if version != 3 {
        return Ok(unknown(Tag::OnePassSig, p.data, errors,
                          Error::MalformedPacket(format!(
                              "Unsupported one pass signature version {}",
                              version)).into()));
    }
    let typ = SignatureType::from(p.parse_u8("type")?);
    let hash_algo = HashAlgorithm::from(p.parse_u8("hash_algo")?);
    let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
    let issuer = KeyID::from_bytes(p.parse_bytes("issuer", 8)?)?;
    let last = p.parse_u8("last")?;

    let mut ops = OnePassSig::new(typ, hash_algo, pk_algo, issuer);
    ops.set_last(last != 0);
    Ok(ops.into())
}

fn key(tag: Tag, p: &mut BodyParser, errors: &mut ErrorStack)
       -> Result<Packet> {
    let version = p.parse_u8("version")?;
    let mut key = match version {
        2 | 3 => {
            let creation_time = Timestamp::from(p.parse_be_u32("ctime")?);
            let validity_days = p.parse_be_u16("validity_days")?;
            let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
            if ! pk_algo.is_rsa() {
                return Ok(unknown(tag, p.data, errors, Error::MalformedPacket(
                    format!("Version {} key using {}", version, pk_algo))
                                  .into()));
            }
            let mpis = mpi::PublicKey::parse(pk_algo, p)?;
            Key::new_v3(pk_algo, creation_time, validity_days, mpis)?
        }
        4 => {
            let creation_time = Timestamp::from(p.parse_be_u32("ctime")?);
            let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
            let mpis = mpi::PublicKey::parse(pk_algo, p)?;
            Key::new_v4(pk_algo, creation_time, mpis)
        }
        v => return Ok(unknown(tag, p.data, errors, Error::MalformedPacket(
            format!("Unsupported key version {}", v)).into())),
    };

    let secret = match tag {
        Tag::SecretKey | Tag::SecretSubkey => true,
        _ => false,
    };
    if secret {
        let s2k_usage = p.parse_u8("s2k_usage")?;
        let sec = match s2k_usage {
            0 => {
                let rest = p.parse_bytes_eof();
                if rest.len() < 2 {
                    return Err(Error::MalformedPacket(
                        "Secret key without a checksum".into()).into());
                }
                let (material, check) = rest.split_at(rest.len() - 2);
                let mpis = mpi::SecretKeyMaterial::from_bytes(
                    key.pk_algo(), material)?;
                let sum = material.iter()
                    .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
                if sum.to_be_bytes() != check {
                    return Err(Error::MalformedPacket(
                        "Secret key checksum mismatch".into()).into());
                }
                SecretKey::Unencrypted { mpis }
            }
            254 | 255 => {
                let algo = SymmetricAlgorithm::from(p.parse_u8("sym_algo")?);
                let s2k = S2K::parse(p)?;
                let iv = p.parse_bytes("iv", algo.block_size()?)?;
                SecretKey::Encrypted {
                    s2k_usage,
                    algo,
                    s2k,
                    iv: iv.to_vec().into_boxed_slice(),
                    ciphertext: p.parse_bytes_eof().to_vec().into_boxed_slice(),
                }
            }
            legacy => {
                // The usage octet is the cipher, the key is the MD5 sum
                // of the passphrase.
                let algo = SymmetricAlgorithm::from(legacy);
                let iv = p.parse_bytes("iv", algo.block_size()?)?;
                SecretKey::Encrypted {
                    s2k_usage,
                    algo,
                    s2k: S2K::Simple { hash: HashAlgorithm::MD5 },
                    iv: iv.to_vec().into_boxed_slice(),
                    ciphertext: p.parse_bytes_eof().to_vec().into_boxed_slice(),
                }
            }
        };
        key.set_secret(Some(sec));
    }

    Ok(match tag {
        Tag::PublicKey => Packet::PublicKey(key),
        Tag::PublicSubkey => Packet::PublicSubkey(key),
        Tag::SecretKey => Packet::SecretKey(key),
        _ => Packet::SecretSubkey(key),
    })
}

fn pkesk(p: &mut BodyParser, errors: &mut ErrorStack) -> Result<Packet> {
    let version = p.parse_u8("version")?;
    if version != 3 {
        return Ok(unknown(Tag::PKESK, p.data, errors, Error::MalformedPacket(
            format!("Unsupported PKESK version {}", version)).into()));
    }
    let recipient = KeyID::from_bytes(p.parse_bytes("recipient", 8)?)?;
    let pk_algo = PublicKeyAlgorithm::from(p.parse_u8("pk_algo")?);
    let esk = mpi::Ciphertext::parse(pk_algo, p)?;
    Ok(PKESK::new(recipient, pk_algo, esk).into())
}

fn skesk(p: &mut BodyParser, errors: &mut ErrorStack) -> Result<Packet> {
    let version = p.parse_u8("version")?;
    if version != 4 {
        return Ok(unknown(Tag::SKESK, p.data, errors, Error::MalformedPacket(
            format!("Unsupported SKESK version {}", version)).into()));
    }
    let sym_algo = SymmetricAlgorithm::from(p.parse_u8("sym_algo")?);
    let s2k = S2K::parse(p)?;
    let esk = p.parse_bytes_eof().to_vec();
    Ok(SKESK::new(sym_algo, s2k, esk).into())
}

/// What is left of the current packet's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    /// The body has been parsed.
    Parsed,
    /// Raw bytes: literal data, or a packet that we don't understand.
    Opaque,
    /// Compressed packets.
    Compressed(CompressionAlgorithm),
    /// Encrypted packets.  `seip` is false for legacy encrypted data.
    Encrypted { seip: bool, decrypted: bool },
}

#[derive(Debug)]
struct Current {
    packet: Packet,
    // The reader stack's depth before the body filter was pushed.
    depth: usize,
    content: Content,
    // Whether a HashedReader over the literal body is on the stack.
    hashing: bool,
    // Whether the caller read some of the body.
    body_read: bool,
}

#[derive(Debug)]
struct Container {
    tag: Tag,
    depth: usize,
    // Integrity protected: the MDC has to be checked at the end.
    mdc: bool,
}

/// A low-level OpenPGP message parser.
///
/// A `PacketParser` is positioned on a packet, whose header and
/// (unless it is streamed) body have been parsed.  [`packet`] returns
/// it.  [`next`] moves on to the following packet, [`recurse`] into
/// the packet, if it is a container.  Both return the packet they
/// leave.
///
/// Literal data, compressed data and encrypted data are streamed:
/// their content can be read using `io::Read` or [`body_chunk`].  If
/// the content isn't read, and [`buffer_unread_content`] is set, it
/// is stored in the packet when the parser moves on.  Otherwise it is
/// dropped.
///
/// Hashes over literal data are computed for preceding one pass
/// signatures, and the matching signature packets carry the computed
/// digest (see [`Signature::computed_digest`]).
///
///   [`packet`]: #method.packet
///   [`next`]: #method.next
///   [`recurse`]: #method.recurse
///   [`body_chunk`]: #method.body_chunk
///   [`buffer_unread_content`]: struct.PacketParserBuilder.html#method.buffer_unread_content
///   [`Signature::computed_digest`]: ../packet/signature/struct.Signature.html#method.computed_digest
///
/// # Examples
///
/// ```
/// # fn main() -> netpgp::Result<()> {
/// use netpgp::Packet;
/// use netpgp::parse::{Parse, PacketParser};
///
/// let message = b"\xcb\x12b\x00\x00\x00\x00\x00Hello world.";
/// let mut pp = PacketParser::from_bytes(&message[..])?;
/// let mut body = Vec::new();
/// while let Some(Packet::Literal(_)) = pp.packet() {
///     std::io::Read::read_to_end(&mut pp, &mut body)?;
///     pp.next()?;
/// }
/// assert_eq!(&body[..], b"Hello world.");
/// # Ok(()) }
/// ```
pub struct PacketParser<'a> {
    reader: Stack<'a, Cookie>,
    settings: PacketParserSettings,
    errors: ErrorStack,

    containers: Vec<Container>,
    // Containers closed by the last call to next or recurse.
    closed: Vec<Tag>,
    current: Option<Current>,

    // One pass signatures waiting for the literal data.
    pending_sigs: Vec<(OnePassSig, hash::Context)>,
    // One pass signatures whose data has been hashed, waiting for
    // their signature packets.
    hashed_sigs: Vec<(OnePassSig, hash::Context)>,

    armor: Option<(armor::Kind, Vec<(String, String)>)>,
    cleartext: Option<Cleartext>,
}

impl<'a> fmt::Debug for PacketParser<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PacketParser")
            .field("current", &self.current)
            .field("containers", &self.containers)
            .field("settings", &self.settings)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<'a> Parse<'a, PacketParser<'a>> for PacketParser<'a> {
    /// Starts parsing an OpenPGP message stored in a `std::io::Read`
    /// object.
    fn from_reader<R: 'a + Read>(reader: R) -> Result<PacketParser<'a>> {
        PacketParserBuilder::from_reader(reader)?.build()
    }

    /// Starts parsing an OpenPGP message stored in a file named
    /// `path`.
    fn from_file<P: AsRef<Path>>(path: P) -> Result<PacketParser<'a>> {
        PacketParserBuilder::from_file(path)?.build()
    }

    /// Starts parsing an OpenPGP message stored in a buffer.
    fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &'a D)
                                           -> Result<PacketParser<'a>> {
        PacketParserBuilder::from_bytes(data)?.build()
    }
}

impl<'a> PacketParser<'a> {
    // Sets up the parser and reads the first packet.
    pub(crate) fn new(mut source: Box<dyn BufferedReader<Cookie> + 'a>,
                      settings: PacketParserSettings)
                      -> Result<Self> {
        let tracer = Tracer::new(settings.trace, "PacketParser::new", 0);

        let mut armor_info = None;
        let mut cleartext = None;
        if settings.dearmor {
            let (armored, signed_message) = Self::sniff(&mut source)?;
            if signed_message {
                t!(tracer, "cleartext signed message");
                cleartext = Some(cleartext::read(&mut source)?);
            }
            if armored {
                let mut reader = armor::Reader::new(source, None);
                reader.initialize()?;
                if let Some(kind) = reader.kind() {
                    t!(tracer, "armored {:?}", kind);
                    armor_info = Some((kind, reader.headers().to_vec()));
                }
                source = Box::new(buffered_reader::Generic::with_cookie(
                    reader, None, Cookie::default()));
            }
        }

        let mut reader = Stack::new(source);
        reader.set_trace(settings.trace_readers);

        let mut pp = PacketParser {
            reader,
            settings,
            errors: ErrorStack::new(),
            containers: Vec::new(),
            closed: Vec::new(),
            current: None,
            pending_sigs: Vec::new(),
            hashed_sigs: Vec::new(),
            armor: armor_info,
            cleartext,
        };
        pp.read_next()?;
        Ok(pp)
    }

    // Returns whether the data looks armored, and whether it is a
    // cleartext signed message.
    //
    // Binary OpenPGP data always starts with a byte that has the most
    // significant bit set.
    fn sniff(source: &mut Box<dyn BufferedReader<Cookie> + 'a>)
             -> Result<(bool, bool)> {
        let data = source.data(4096).map_err(map_io_error)?;
        let start = match data.iter().position(|b| ! b.is_ascii_whitespace()) {
            Some(start) => start,
            None => return Ok((false, false)),
        };
        if data[start] & 0x80 != 0 {
            return Ok((false, false));
        }
        Ok((true, data[start..].starts_with(cleartext::BEGIN)))
    }

    /// Returns the current packet.
    ///
    /// Returns `None` at the end of the message.
    pub fn packet(&self) -> Option<&Packet> {
        self.current.as_ref().map(|c| &c.packet)
    }

    /// Returns the current packet mutably.
    pub fn packet_mut(&mut self) -> Option<&mut Packet> {
        self.current.as_mut().map(|c| &mut c.packet)
    }

    /// Returns whether the end of the message has been reached.
    pub fn is_eof(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the number of containers the current packet is in.
    ///
    /// Top-level packets have a recursion depth of 0.
    pub fn recursion_depth(&self) -> usize {
        self.containers.len()
    }

    /// Returns the settings.
    pub fn settings(&self) -> &PacketParserSettings {
        &self.settings
    }

    /// Returns the recoverable errors encountered so far.
    pub fn errors(&self) -> &ErrorStack {
        &self.errors
    }

    /// Returns and forgets the recoverable errors encountered so far.
    pub fn take_errors(&mut self) -> ErrorStack {
        mem::take(&mut self.errors)
    }

    /// Returns the containers that the last call to [`next`] or
    /// [`recurse`] closed, innermost first.
    ///
    ///   [`next`]: #method.next
    ///   [`recurse`]: #method.recurse
    pub fn closed_containers(&self) -> &[Tag] {
        &self.closed
    }

    /// Returns the kind and the headers of the ASCII armor, if the
    /// message was armored.
    pub fn armor(&self) -> Option<(armor::Kind, &[(String, String)])> {
        self.armor.as_ref().map(|(kind, headers)| (*kind, &headers[..]))
    }

    /// Returns the signed text, if this is a cleartext signed message.
    pub fn cleartext(&self) -> Option<&Cleartext> {
        self.cleartext.as_ref()
    }

    /// Finishes the current packet and moves to the next one.
    ///
    /// If the current packet is a container, its content is skipped.
    /// Returns the finished packet, or `None` if the end of the
    /// message had been reached.
    pub fn next(&mut self) -> Result<Option<Packet>> {
        self.step(false)
    }

    /// Like [`next`], but descends into containers.
    ///
    /// Compressed data is always descended into.  Encrypted data only
    /// after it has been [`decrypt`]ed.  A container whose content
    /// has been read using `io::Read` is not descended into.
    ///
    ///   [`next`]: #method.next
    ///   [`decrypt`]: #method.decrypt
    pub fn recurse(&mut self) -> Result<Option<Packet>> {
        self.step(true)
    }

    fn tracer(&self, func: &'static str) -> Tracer {
        Tracer::new(self.settings.trace, func, self.containers.len())
    }

    fn step(&mut self, descend: bool) -> Result<Option<Packet>> {
        let tracer = self.tracer("PacketParser::step");

        self.closed.clear();
        let mut current = match self.current.take() {
            Some(current) => current,
            None => return Ok(None),
        };
        t!(tracer, "leaving {} (descend: {})", current.packet.tag(), descend);

        let descended = descend && self.descend(&current)?;
        if ! descended {
            self.finish(&mut current)?;
        }

        if let Packet::Signature(ref mut sig) = current.packet {
            self.compute_digest(sig);
        }

        self.read_next()?;
        Ok(Some(current.packet))
    }

    // Pushes the decompressor, or takes note of the decrypted
    // container.  Returns whether the parser descended.
    fn descend(&mut self, current: &Current) -> Result<bool> {
        let tracer = self.tracer("PacketParser::descend");

        let mdc = match current.content {
            Content::Compressed(_) => false,
            Content::Encrypted { seip, decrypted: true } => seip,
            _ => return Ok(false),
        };
        if current.body_read {
            t!(tracer, "body has been read, not descending");
            return Ok(false);
        }
        if self.containers.len() >= self.settings.max_recursion_depth as usize {
            return Err(Error::MalformedMessage(
                format!("Exceeded the maximum recursion depth of {}",
                        self.settings.max_recursion_depth)).into());
        }

        if let Content::Compressed(algo) = current.content {
            match algo {
                CompressionAlgorithm::Uncompressed => (),
                #[cfg(feature = "compression-deflate")]
                CompressionAlgorithm::Zip =>
                    self.reader.push(|r| Box::new(
                        buffered_reader::Deflate::with_cookie(
                            r, Cookie::default()))),
                #[cfg(feature = "compression-deflate")]
                CompressionAlgorithm::Zlib =>
                    self.reader.push(|r| Box::new(
                        buffered_reader::Zlib::with_cookie(
                            r, Cookie::default()))),
                #[cfg(feature = "compression-bzip2")]
                CompressionAlgorithm::BZip2 =>
                    self.reader.push(|r| Box::new(
                        buffered_reader::Bzip::with_cookie(
                            r, Cookie::default()))),
                _ => {
                    self.errors.error(
                        Error::UnsupportedCompressionAlgorithm(algo));
                    return Ok(false);
                }
            }
        }

        t!(tracer, "descending into {}", current.packet.tag());
        self.containers.push(Container {
            tag: current.packet.tag(),
            depth: current.depth,
            mdc,
        });
        Ok(true)
    }

    // Finishes the current packet: buffers or drops what is left of
    // the body, and pops its filters.
    fn finish(&mut self, current: &mut Current) -> Result<()> {
        let tracer = self.tracer("PacketParser::finish");

        if current.content != Content::Parsed {
            if self.settings.buffer_unread_content {
                let rest = self.reader.steal_eof().map_err(map_io_error)?;
                t!(tracer, "buffering {} bytes", rest.len());
                match current.packet {
                    Packet::Literal(ref mut p) => p.body_mut().extend(rest),
                    Packet::CompressedData(ref mut p) =>
                        p.body_mut().extend(rest),
                    Packet::SEIP(ref mut p) => p.body_mut().extend(rest),
                    Packet::SED(ref mut p) => p.body_mut().extend(rest),
                    Packet::Unknown(ref mut p) => {
                        let mut body = p.set_body(Vec::new());
                        body.extend(rest);
                        p.set_body(body);
                    }
                    _ => (),
                }
            } else {
                let dropped = self.reader.drop_eof().map_err(map_io_error)?;
                t!(tracer, "dropped the rest of the body: {}", dropped);
            }
        }

        if current.hashing {
            let hashes = mem::take(&mut self.reader.cookie_mut().hashes);
            let sigs = mem::take(&mut self.pending_sigs);
            t!(tracer, "hashed the literal data for {} signatures", sigs.len());
            for ((ops, _), ctx) in sigs.into_iter().zip(hashes.into_iter()) {
                self.hashed_sigs.push((ops, ctx));
            }
            current.hashing = false;
        }

        self.unwind(current.depth)
    }

    // Drains and pops filters until the stack has `depth` filters.
    fn unwind(&mut self, depth: usize) -> Result<()> {
        while self.reader.depth() > depth {
            self.reader.drop_eof().map_err(map_io_error)?;
            self.reader.pop().map_err(map_io_error)?;
        }
        Ok(())
    }

    // Closes a container whose content has been read.
    fn close(&mut self, container: Container) -> Result<()> {
        let tracer = self.tracer("PacketParser::close");
        t!(tracer, "closing {}", container.tag);

        if container.mdc {
            // The top is the Reserve holding back the MDC packet, below
            // it the hash over the plaintext.
            self.reader.pop().map_err(map_io_error)?;
            let header = self.reader.data_consume_hard(2)
                .map_err(|_| Error::ManipulatedMessage)?;
            if header[..2] != [0xd3, 0x14] {
                return Err(Error::ManipulatedMessage.into());
            }
            let ctx = mem::take(&mut self.reader.cookie_mut().hashes).pop()
                .ok_or(Error::ManipulatedMessage)?;
            let mdc = MDC::from(ctx);
            let digest = self.reader.steal(20)
                .map_err(|_| Error::ManipulatedMessage)?;
            if ! mdc.matches(&digest) {
                return Err(Error::ManipulatedMessage.into());
            }
            if self.reader.drop_eof().map_err(map_io_error)? {
                return Err(Error::MalformedMessage(
                    "Data after the MDC packet".into()).into());
            }
            t!(tracer, "MDC ok");
        }

        self.unwind(container.depth)?;
        self.closed.push(container.tag);
        Ok(())
    }

    // Sets the computed digest of a signature following hashed data.
    fn compute_digest(&mut self, sig: &mut Signature) {
        if let Some(ref cleartext) = self.cleartext {
            if self.containers.is_empty() {
                if let Ok(mut ctx) = cleartext.hash(sig.hash_algo()) {
                    sig.hash_fields(&mut ctx);
                    sig.set_computed_digest(Some(ctx.into_digest()));
                }
                return;
            }
        }

        let issuer = sig.issuer();
        // The last one pass signature goes with the first signature.
        let i = self.hashed_sigs.iter().rposition(|(ops, ctx)| {
            ctx.algo() == sig.hash_algo()
                && issuer.as_ref().map(|i| i == ops.issuer()).unwrap_or(true)
        }).or_else(|| self.hashed_sigs.iter().rposition(|(_, ctx)| {
            ctx.algo() == sig.hash_algo()
        }));

        if let Some(i) = i {
            let (_, mut ctx) = self.hashed_sigs.remove(i);
            ctx.set_text_mode(false);
            sig.hash_fields(&mut ctx);
            sig.set_computed_digest(Some(ctx.into_digest()));
        }
    }

    // Reads the next packet's header and, if it isn't streamed, its
    // body.
    fn read_next(&mut self) -> Result<()> {
        let tracer = self.tracer("PacketParser::read_next");

        loop {
            let eof = self.reader.data(1).map_err(map_io_error)?.is_empty();
            if ! eof {
                break;
            }
            match self.containers.pop() {
                Some(container) => self.close(container)?,
                None => {
                    t!(tracer, "EOF");
                    self.current = None;
                    return Ok(());
                }
            }
        }

        let depth = self.reader.depth();
        let header = Header::parse(&mut self.reader)?;
        let tag = header.ctb().tag();
        t!(tracer, "{} ({:?})", tag, header.length());

        self.push_body_filter(&header)?;

        let valid = header.valid();
        let mut content = Content::Parsed;
        let packet = match (valid, tag) {
            (Err(e), _) => {
                self.errors.error(e);
                content = Content::Opaque;
                Unknown::new(tag, Vec::new()).into()
            }
            (Ok(()), Tag::Literal) => {
                content = Content::Opaque;
                self.literal_header()?.into()
            }
            (Ok(()), Tag::CompressedData) => {
                let algo = CompressionAlgorithm::from(self.read_u8()?);
                content = Content::Compressed(algo);
                CompressedData::new(algo).into()
            }
            (Ok(()), Tag::SED) => {
                content = Content::Encrypted { seip: false, decrypted: false };
                SED::default().into()
            }
            (Ok(()), Tag::SEIP) => {
                let version = self.read_u8()?;
                if version == 1 {
                    content = Content::Encrypted { seip: true, decrypted: false };
                    SEIP::default().into()
                } else {
                    self.errors.warn(Error::MalformedPacket(
                        format!("Unsupported SEIP version {}", version)));
                    content = Content::Opaque;
                    Unknown::new(tag, vec![version]).into()
                }
            }
            (Ok(()), Tag::Unknown(_)) | (Ok(()), Tag::Private(_)) => {
                self.errors.warn(Error::UnknownPacketTag(tag));
                content = Content::Opaque;
                Unknown::new(tag, Vec::new()).into()
            }
            (Ok(()), _) => {
                let body = match *header.length() {
                    BodyLength::Full(len)
                        if len > self.settings.max_packet_size => None,
                    BodyLength::Full(len) =>
                        Some(self.reader.steal(len as usize)
                             .map_err(map_io_error)?),
                    _ => {
                        let body = self.reader.steal_eof()
                            .map_err(map_io_error)?;
                        if body.len() > self.settings.max_packet_size as usize {
                            None
                        } else {
                            Some(body)
                        }
                    }
                };
                match body {
                    Some(body) => parse_body(tag, &body, &self.settings,
                                             &mut self.errors)?,
                    None => {
                        self.errors.error(Error::MalformedPacket(
                            format!("{} packet exceeds the limit of {} bytes",
                                    tag, self.settings.max_packet_size)));
                        self.reader.drop_eof().map_err(map_io_error)?;
                        Unknown::new(tag, Vec::new()).into()
                    }
                }
            }
        };

        let mut current = Current {
            packet,
            depth,
            content,
            hashing: false,
            body_read: false,
        };

        match current.packet {
            Packet::OnePassSig(ref ops) => {
                match ops.hash_algo().context() {
                    Ok(mut ctx) => {
                        if ops.typ() == SignatureType::Text {
                            ctx.set_text_mode(true);
                        }
                        self.pending_sigs.push((ops.clone(), ctx));
                    }
                    Err(e) => self.errors.warn(e),
                }
            }
            Packet::Literal(_) if ! self.pending_sigs.is_empty() => {
                let hashes = self.pending_sigs.iter()
                    .map(|(_, ctx)| ctx.clone())
                    .collect();
                self.reader.push(
                    |r| Box::new(HashedReader::new(r, hashes)));
                current.hashing = true;
            }
            _ => (),
        }

        self.current = Some(current);
        Ok(())
    }

    fn push_body_filter(&mut self, header: &Header) -> Result<()> {
        let trace = self.settings.trace;
        match *header.length() {
            BodyLength::Full(len) => {
                self.reader.try_push(|r| {
                    buffered_reader::Region::try_with_cookie(
                        r, len as u64, Cookie::default())
                        .map(|region| Box::new(region)
                             as Box<dyn BufferedReader<Cookie> + 'a>)
                }).map_err(|e| Error::RegionOverrun(
                    format!("{} packet: {}", header.ctb().tag(), e)))?;
            }
            BodyLength::Partial(len) => {
                self.reader.push(|r| Box::new(
                    PartialBodyFilter::new(r, len, trace, Cookie::default())));
            }
            BodyLength::Indeterminate => {
                self.reader.push(|r| Box::new(
                    buffered_reader::Region::indeterminate(
                        r, Cookie::default())));
            }
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.reader.data_consume_hard(1).map_err(map_io_error)?[0])
    }

    fn literal_header(&mut self) -> Result<Literal> {
        let format = DataFormat::from(self.read_u8()?);
        let len = self.read_u8()? as usize;
        let filename = self.reader.steal(len).map_err(map_io_error)?;
        let date = self.reader.read_be_u32().map_err(map_io_error)?;

        let mut literal = Literal::new(format);
        literal.set_filename(&filename[..])?;
        literal.set_date(Timestamp::from(date));
        Ok(literal)
    }

    // Whether the current packet has a body that can be read.
    fn has_body(&self) -> bool {
        match self.current {
            Some(ref c) => c.content != Content::Parsed,
            None => false,
        }
    }

    /// Returns the next chunk of the current packet's body.
    ///
    /// Chunks are at most [`chunk_size`] bytes.  Returns `None` when
    /// the body has been read, or if the packet doesn't have a body
    /// that is streamed.
    ///
    ///   [`chunk_size`]: struct.PacketParserSettings.html#structfield.chunk_size
    pub fn body_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if ! self.has_body() {
            return Ok(None);
        }
        let size = self.settings.chunk_size;
        let chunk = {
            let data = self.reader.data_consume(size).map_err(map_io_error)?;
            data[..cmp::min(size, data.len())].to_vec()
        };
        if chunk.is_empty() {
            return Ok(None);
        }
        if let Some(ref mut c) = self.current {
            c.body_read = true;
        }
        Ok(Some(chunk))
    }

    /// Tries to decrypt the current packet using `key`.
    ///
    /// On success, the content can be descended into using
    /// [`recurse`].  If the key fails the quick check,
    /// `Error::InvalidSessionKey` is returned, and nothing is
    /// consumed, so that another key can be tried.
    ///
    ///   [`recurse`]: #method.recurse
    pub fn decrypt(&mut self, algo: SymmetricAlgorithm, key: &SessionKey)
                   -> Result<()> {
        let tracer = self.tracer("PacketParser::decrypt");

        let seip = match self.current {
            Some(Current {
                content: Content::Encrypted { seip, decrypted: false },
                body_read: false,
                ..
            }) => seip,
            Some(ref c) => return Err(Error::InvalidOperation(
                format!("Can't decrypt a {} packet", c.packet.tag())).into()),
            None => return Err(Error::InvalidOperation(
                "No packet to decrypt".into()).into()),
        };

        let bs = algo.block_size()?;
        {
            let data = self.reader.data_hard(bs + 2).map_err(map_io_error)?;
            let mut prefix = data[..bs + 2].to_vec();
            symmetric::cfb_in_place(algo, false, key, &vec![0u8; bs],
                                    &mut prefix)?;
            if prefix[bs - 2..bs] != prefix[bs..] {
                return Err(Error::InvalidSessionKey(
                    "Quick check failed".into()).into());
            }
        }
        t!(tracer, "quick check ok");

        self.reader.try_push(|r| {
            BufferedReaderDecryptor::with_cookie(
                algo, key, ! seip, r, Cookie::default())
                .map(|d| Box::new(d) as Box<dyn BufferedReader<Cookie> + 'a>)
        })?;

        if seip {
            let ctx = HashAlgorithm::SHA1.context()?;
            self.reader.push(|r| Box::new(HashedReader::new(r, vec![ctx])));
        }
        self.reader.data_consume_hard(bs + 2).map_err(map_io_error)?;
        if seip {
            // Hold back the MDC packet.
            self.reader.push(|r| Box::new(buffered_reader::Reserve::with_cookie(
                r, 1 + 1 + 20, Cookie::default())));
        }

        if let Some(ref mut c) = self.current {
            c.content = Content::Encrypted { seip, decrypted: true };
        }
        Ok(())
    }

    /// Parses the message, handing every event to `callback`.
    ///
    /// See [`parse`] for details.
    ///
    ///   [`parse`]: fn.parse.html
    pub fn parse<R, F>(reader: R, settings: PacketParserSettings,
                       errors: &mut ErrorStack, callback: F)
                       -> Result<()>
        where R: io::Read + 'a,
              F: FnMut(Event) -> Result<Control>
    {
        PacketParserBuilder::from_reader(reader)?
            .settings(settings)
            .build()?
            .drive(errors, callback)
    }

    /// Drives the parser, handing every event to `callback`.
    ///
    /// Recoverable errors are appended to `errors`, and also reported
    /// as `Event::Error`.
    pub fn drive<F>(mut self, errors: &mut ErrorStack, mut callback: F)
                    -> Result<()>
        where F: FnMut(Event) -> Result<Control>
    {
        macro_rules! emit {
            ( $e:expr ) => {
                if let Control::Finished = callback($e)? {
                    return Ok(());
                }
            };
        }

        macro_rules! flush_errors {
            () => {
                let mut new = self.take_errors();
                for (severity, e) in new.iter() {
                    emit!(Event::Error {
                        severity: *severity,
                        message: e.to_string(),
                    });
                }
                errors.append(&mut new);
            };
        }

        flush_errors!();

        if let Some(ref c) = self.cleartext {
            let (hash_algos, text) = (c.hash_algos().to_vec(), c.text().to_vec());
            emit!(Event::CleartextHeader { hash_algos });
            emit!(Event::CleartextBody(text));
            emit!(Event::CleartextTrailer);
        }
        if let Some((kind, ref headers)) = self.armor {
            let headers = headers.clone();
            emit!(Event::ArmorHeader { kind, headers });
        }

        let mut pkesks: Vec<PKESK> = Vec::new();
        let mut skesks: Vec<SKESK> = Vec::new();

        loop {
            let mut descend = false;
            let mut streamed = false;
            match self.packet() {
                None => break,
                Some(Packet::Literal(l)) => {
                    streamed = true;
                    emit!(Event::LiteralHeader(l.clone()));
                    while let Some(chunk) = self.body_chunk()? {
                        emit!(Event::LiteralBody(chunk));
                    }
                }
                Some(Packet::CompressedData(_)) => descend = true,
                Some(Packet::SEIP(_)) | Some(Packet::SED(_)) => {
                    let reply = callback(Event::SessionKeyNeeded {
                        pkesks: pkesks.clone(),
                        skesks: skesks.clone(),
                    })?;
                    match reply {
                        Control::Finished => return Ok(()),
                        Control::SessionKey(algo, key) =>
                            match self.decrypt(algo, &key) {
                                Ok(()) => descend = true,
                                Err(e) => self.errors.error(e),
                            },
                        Control::Continue => (),
                    }
                    if ! descend {
                        streamed = true;
                        while let Some(chunk) = self.body_chunk()? {
                            emit!(Event::EncryptedBody(chunk));
                        }
                    }
                }
                Some(_) => (),
            }

            let packet = if descend { self.recurse()? } else { self.next()? };
            let packet = match packet {
                Some(packet) => packet,
                None => break,
            };
            let tag = packet.tag();

            match packet {
                Packet::Literal(_) => (),
                Packet::PKESK(p) => {
                    pkesks.push(p.clone());
                    emit!(Event::Packet(p.into()));
                }
                Packet::SKESK(s) => {
                    skesks.push(s.clone());
                    emit!(Event::Packet(s.into()));
                }
                Packet::OnePassSig(ops) => emit!(Event::SignatureHeader(ops)),
                Packet::Signature(sig) => {
                    if sig.computed_digest().is_some() {
                        emit!(Event::SignatureFooter(sig));
                    } else {
                        emit!(Event::Packet(sig.into()));
                    }
                }
                p => {
                    if ! streamed {
                        emit!(Event::Packet(p));
                    }
                }
            }
            if streamed {
                emit!(Event::PacketEnd(tag));
            }

            let closed = self.closed.clone();
            for tag in closed {
                emit!(Event::PacketEnd(tag));
            }
            flush_errors!();
        }

        flush_errors!();
        if self.armor.is_some() {
            emit!(Event::ArmorTrailer);
        }
        Ok(())
    }
}

impl<'a> io::Read for PacketParser<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if ! self.has_body() {
            return Ok(0);
        }
        if let Some(ref mut c) = self.current {
            c.body_read = true;
        }
        self.reader.read(buf)
    }
}

/// An event delivered by [`parse`].
///
/// Events are handed to the callback by value.
///
///   [`parse`]: fn.parse.html
#[derive(Debug)]
pub enum Event {
    /// A packet that isn't covered by a more specific event.
    ///
    /// Containers (compressed data, decrypted data) are reported
    /// before their content, which is followed by a `PacketEnd`.
    Packet(Packet),
    /// The header of a literal data packet.  The body follows as
    /// `LiteralBody` chunks.
    LiteralHeader(Literal),
    /// A chunk of literal data.
    LiteralBody(Vec<u8>),
    /// A chunk of encrypted data that could not be decrypted.
    EncryptedBody(Vec<u8>),
    /// A one pass signature packet.
    SignatureHeader(OnePassSig),
    /// A signature over hashed data, with its computed digest set.
    SignatureFooter(Signature),
    /// The start of ASCII armor.
    ArmorHeader {
        /// The kind of data.
        kind: armor::Kind,
        /// The armor headers.
        headers: Vec<(String, String)>,
    },
    /// The end of ASCII armor.  The checksum has been checked.
    ArmorTrailer,
    /// The start of a cleartext signed message.
    CleartextHeader {
        /// The hash algorithms from the `Hash:` headers.
        hash_algos: Vec<HashAlgorithm>,
    },
    /// The signed text, with the dash escaping removed.
    CleartextBody(Vec<u8>),
    /// The end of the signed text.
    CleartextTrailer,
    /// Encrypted data follows.
    ///
    /// Reply with `Control::SessionKey` to decrypt it.
    SessionKeyNeeded {
        /// The PKESK packets seen so far.
        pkesks: Vec<PKESK>,
        /// The SKESK packets seen so far.
        skesks: Vec<SKESK>,
    },
    /// A recoverable error.
    Error {
        /// How bad it is.
        severity: Severity,
        /// The error message.
        message: String,
    },
    /// The end of a streamed packet or a container.
    PacketEnd(Tag),
}

/// The callback's reply to an [`Event`].
///
///   [`Event`]: enum.Event.html
pub enum Control {
    /// Go on.
    Continue,
    /// Stop parsing.  No further events are delivered.
    Finished,
    /// Decrypt the encrypted data using this session key.
    ///
    /// Only meaningful as a reply to `Event::SessionKeyNeeded`.
    SessionKey(SymmetricAlgorithm, SessionKey),
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Control::Continue => f.write_str("Continue"),
            Control::Finished => f.write_str("Finished"),
            Control::SessionKey(algo, _) =>
                write!(f, "SessionKey({}, ...)", algo),
        }
    }
}

/// Parses an OpenPGP message, handing every event to `callback`.
///
/// Armor and cleartext signature framing are stripped (unless
/// `settings.dearmor` is unset).  Compressed data is always descended
/// into.  For encrypted data, the callback is asked for the session
/// key with an `Event::SessionKeyNeeded`; if it doesn't supply one,
/// or the key is wrong, the encrypted data is handed out as
/// `EncryptedBody` chunks.
///
/// Structural errors abort the parse and are returned.  Recoverable
/// errors are appended to `errors`.  If the callback returns
/// `Control::Finished`, the parse stops, and the reader stack is
/// dropped.
///
/// # Examples
///
/// ```
/// # fn main() -> netpgp::Result<()> {
/// use netpgp::ErrorStack;
/// use netpgp::parse::{self, Control, Event, PacketParserSettings};
///
/// let message = b"\xcb\x12b\x00\x00\x00\x00\x00Hello world.";
/// let mut body = Vec::new();
/// let mut errors = ErrorStack::new();
/// parse::parse(&message[..], PacketParserSettings::default(), &mut errors,
///              |event| {
///                  if let Event::LiteralBody(chunk) = event {
///                      body.extend_from_slice(&chunk);
///                  }
///                  Ok(Control::Continue)
///              })?;
/// assert_eq!(&body[..], b"Hello world.");
/// # Ok(()) }
/// ```
pub fn parse<'a, R, F>(reader: R, settings: PacketParserSettings,
                       errors: &mut ErrorStack, callback: F)
                       -> Result<()>
    where R: io::Read + 'a,
          F: FnMut(Event) -> Result<Control>
{
    PacketParser::parse(reader, settings, errors, callback)
}

impl<'a> Parse<'a, Packet> for Packet {
    /// Parses the first packet, including its body.
    fn from_reader<R: 'a + Read>(reader: R) -> Result<Self> {
        let pp = PacketParserBuilder::from_reader(reader)?
            .buffer_unread_content()
            .build()?;
        first_packet(pp)
    }

    /// Parses the first packet, including its body.
    fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &'a D) -> Result<Self> {
        let pp = PacketParserBuilder::from_bytes(data)?
            .buffer_unread_content()
            .build()?;
        first_packet(pp)
    }
}

fn first_packet(mut pp: PacketParser) -> Result<Packet> {
    pp.next()?.ok_or_else(|| Error::MalformedMessage(
        "No packets".into()).into())
}

/// Parses all top-level packets in `data`, including their bodies.
///
/// Containers are not descended into.
pub fn packets_from_bytes(data: &[u8]) -> Result<Vec<Packet>> {
    let mut pp = PacketParserBuilder::from_bytes(data)?
        .buffer_unread_content()
        .build()?;
    let mut packets = Vec::new();
    while let Some(p) = pp.next()? {
        packets.push(p);
    }
    Ok(packets)
}
