//! Streaming packet serialization.
//!
//! This interface provides a convenient way to create signed and/or
//! encrypted OpenPGP messages.  A message is built by stacking
//! writers: each writer frames what is written to it and passes the
//! result to the writer below.  For example, to sign and encrypt a
//! message:
//!
//! ```text
//! Message -> Armorer -> Encryptor -> Compressor -> Signer -> LiteralWriter
//! ```
//!
//! The data is written to the topmost writer.  Finalizing the stack
//! tears it down from the top, emitting the trailing packets (the
//! signatures, the MDC) on the way.
//!
//! # Example
//!
//! ```
//! # fn main() -> netpgp::Result<()> {
//! use std::io::Write;
//! use netpgp::serialize::stream::{Message, LiteralWriter};
//!
//! let mut sink = Vec::new();
//! let message = Message::new(&mut sink);
//! let mut message = LiteralWriter::new(message).build()?;
//! message.write_all(b"Hello world.")?;
//! message.finalize()?;
//! assert_eq!(b"\xcb\x12b\x00\x00\x00\x00\x00Hello world.", &sink[..]);
//! # Ok(()) }
//! ```

use std::fmt;
use std::io::{self, Write};

use crate::armor;
use crate::cleartext;
use crate::crypto::{self, hash, KeyPair, SessionKey};
use crate::packet::header::CTB;
use crate::packet::signature::SignatureBuilder;
use crate::packet::{Key, Literal, OnePassSig, PKESK, Signature};
use crate::types::{
    CompressionAlgorithm,
    DataFormat,
    Duration,
    HashAlgorithm,
    SignatureType,
    SymmetricAlgorithm,
    Timestamp,
};
use crate::Error;
use crate::Packet;
use crate::Result;
use crate::Tag;
use super::writer::{self, BoxStack, Stack, Stackable};
use super::{Marshal, PartialBodyFilter};

/// Cookie must be public because the writers are.
#[doc(hidden)]
#[derive(Debug)]
pub struct Cookie {
    level: usize,
    private: Private,
}

#[derive(Debug)]
enum Private {
    Nothing,
    Signer,
}

impl Cookie {
    fn new(level: usize) -> Self {
        Cookie {
            level,
            private: Private::Nothing,
        }
    }
}

impl Default for Cookie {
    fn default() -> Self {
        Cookie::new(0)
    }
}

// Returns the nesting level of the top of the stack.
fn level(stack: &Stack<Cookie>) -> usize {
    stack.as_ref().cookie_ref().level
}

// Writes a new-format CTB.
fn write_ctb(stack: &mut Stack<Cookie>, tag: Tag) -> Result<()> {
    stack.write_all(&[u8::from(CTB::New { tag })])?;
    Ok(())
}

fn finalized() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "Writer is finalized.")
}

/// The start of a message.
///
/// Wraps an `io::Write`r, which is the bottom of every writer stack.
#[derive(Debug)]
pub struct Message(());

impl Message {
    /// Starts a message written to `w`.
    pub fn new<'a, W: 'a + io::Write>(w: W) -> Stack<'a, Cookie> {
        writer::Generic::new(w, Cookie::new(0))
    }
}

/// ASCII armors the stream.
///
/// # Example
///
/// ```
/// # fn main() -> netpgp::Result<()> {
/// use std::io::Write;
/// use netpgp::armor::Kind;
/// use netpgp::serialize::stream::{Armorer, Message, LiteralWriter};
///
/// let mut sink = Vec::new();
/// let message = Message::new(&mut sink);
/// let message = Armorer::new(message)
///     .kind(Kind::Message)
///     .add_header("Comment", "no comment")
///     .build()?;
/// let mut message = LiteralWriter::new(message).build()?;
/// message.write_all(b"Hello world.")?;
/// message.finalize()?;
/// assert!(sink.starts_with(b"-----BEGIN PGP MESSAGE-----\n"));
/// # Ok(()) }
/// ```
pub struct Armorer<'a> {
    inner: Stack<'a, Cookie>,
    kind: armor::Kind,
    headers: Vec<(String, String)>,
}

impl<'a> Armorer<'a> {
    /// Creates a new armoring writer.  The kind defaults to
    /// `Kind::Message`.
    pub fn new(inner: Stack<'a, Cookie>) -> Self {
        Armorer {
            inner,
            kind: armor::Kind::Message,
            headers: Vec::new(),
        }
    }

    /// Sets the kind of data.
    pub fn kind(mut self, kind: armor::Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds an armor header.
    pub fn add_header<K, V>(mut self, key: K, value: V) -> Self
        where K: AsRef<str>,
              V: AsRef<str>,
    {
        self.headers.push((key.as_ref().to_string(),
                           value.as_ref().to_string()));
        self
    }

    /// Pushes the armoring writer.
    pub fn build(self) -> Result<Stack<'a, Cookie>> {
        let level = level(&self.inner);
        writer::armorer(self.inner, Cookie::new(level), self.kind,
                        self.headers)
    }
}

/// Signs a packet stream.
///
/// For inline signatures, one one pass signature packet per signer
/// is written, then the data, then the signatures.  Use a
/// [`LiteralWriter`] on top of the signer; the signature covers the
/// body of the literal data packet.
///
/// For detached signatures, the data written to the signer is only
/// hashed, and the signatures are written when the signer is
/// finalized.
///
///   [`LiteralWriter`]: struct.LiteralWriter.html
pub struct Signer<'a> {
    // When a LiteralWriter is pushed on top, it pops us off the
    // stack and takes our inner writer.  Then we only hash.
    inner: Option<BoxStack<'a, Cookie>>,
    signers: Vec<KeyPair>,
    typ: SignatureType,
    hash_algo: HashAlgorithm,
    hash: Option<hash::Context>,
    detached: bool,
    creation_time: Option<Timestamp>,
    expiration: Option<Duration>,
    cookie: Cookie,
    position: u64,
}

impl<'a> Signer<'a> {
    /// Creates a signer.
    ///
    /// The hash algorithm defaults to SHA-256, the signature type to
    /// `Binary`.
    pub fn new(inner: Stack<'a, Cookie>, signer: KeyPair) -> Self {
        let level = level(&inner);
        Signer {
            inner: Some(inner.into()),
            signers: vec![signer],
            typ: SignatureType::Binary,
            hash_algo: HashAlgorithm::SHA256,
            hash: None,
            detached: false,
            creation_time: None,
            expiration: None,
            cookie: Cookie {
                level: level + 1,
                private: Private::Signer,
            },
            position: 0,
        }
    }

    /// Adds another signer.
    pub fn add_signer(mut self, signer: KeyPair) -> Self {
        self.signers.push(signer);
        self
    }

    /// Sets the hash algorithm.
    pub fn hash_algo(mut self, algo: HashAlgorithm) -> Self {
        self.hash_algo = algo;
        self
    }

    /// Creates text signatures.
    ///
    /// Line endings are canonicalized while hashing.
    pub fn text(mut self) -> Self {
        self.typ = SignatureType::Text;
        self
    }

    /// Creates detached signatures.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Sets the signature creation time.  Defaults to now.
    pub fn creation_time(mut self, t: Timestamp) -> Self {
        self.creation_time = Some(t);
        self
    }

    /// Sets how long the signatures are valid.
    pub fn expiration(mut self, d: Duration) -> Self {
        self.expiration = Some(d);
        self
    }

    /// Writes the one pass signatures, if any, and pushes the signer.
    pub fn build(mut self) -> Result<Stack<'a, Cookie>> {
        for signer in self.signers.iter() {
            if ! signer.public().pk_algo().for_signing() {
                return Err(Error::InvalidArgument(format!(
                    "{} can't sign", signer.public().keyid())).into());
            }
        }

        let mut hash = self.hash_algo.context()?;
        if self.typ == SignatureType::Text {
            hash.set_text_mode(true);
        }
        self.hash = Some(hash);

        if ! self.detached {
            let inner = self.inner.as_mut().ok_or_else(finalized)?;
            let n = self.signers.len();
            for (i, signer) in self.signers.iter().enumerate() {
                let mut ops = OnePassSig::new(
                    self.typ, self.hash_algo, signer.public().pk_algo(),
                    signer.public().keyid());
                ops.set_last(i == n - 1);
                Packet::from(ops).serialize(inner)?;
            }
        }

        Ok(Stack::from(Box::new(self)))
    }

    // Makes the signatures, the last signer's first.
    fn make_signatures(&mut self) -> Result<Vec<Signature>> {
        let hash = self.hash.take().ok_or_else(|| Error::InvalidOperation(
            "Signatures already emitted".into()))?;

        let mut sigs = Vec::with_capacity(self.signers.len());
        for signer in self.signers.iter().rev() {
            let mut builder = SignatureBuilder::with_context(
                self.typ, hash.clone())?;
            if let Some(t) = self.creation_time {
                builder = builder.set_signature_creation_time(t)?;
            }
            if let Some(d) = self.expiration {
                builder = builder.set_signature_expiration_time(d)?;
            }
            sigs.push(builder.end_hashed_subpackets()?.sign(signer)?);
        }
        Ok(sigs)
    }

    fn emit_signatures(&mut self) -> Result<()> {
        let sigs = self.make_signatures()?;
        let inner = self.inner.as_mut().ok_or_else(finalized)?;
        for sig in sigs {
            Packet::from(sig).serialize(inner)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for Signer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Signer")
            .field("signers", &self.signers.len())
            .field("detached", &self.detached)
            .field("inner", &self.inner)
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl<'a> Write for Signer<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match self.inner.as_mut() {
            Some(ref mut w) if ! self.detached => w.write(buf)?,
            _ => buf.len(),
        };

        if let Some(ref mut hash) = self.hash {
            hash.update(&buf[..written]);
        }
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(ref mut w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> Stackable<'a, Cookie> for Signer<'a> {
    fn into_inner(mut self: Box<Self>) -> Result<Option<BoxStack<'a, Cookie>>> {
        self.emit_signatures()?;
        Ok(self.inner.take())
    }
    fn detach(&mut self) -> Result<Option<BoxStack<'a, Cookie>>> {
        Ok(self.inner.take())
    }
    fn attach(&mut self, below: BoxStack<'a, Cookie>) -> Result<()> {
        self.inner = Some(below);
        Ok(())
    }

    fn inner_ref(&self) -> Option<&dyn Stackable<'a, Cookie>> {
        if let Some(ref i) = self.inner {
            Some(i)
        } else {
            None
        }
    }

    fn cookie_ref(&self) -> &Cookie {
        &self.cookie
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Creates a cleartext signed message.
///
/// The text written to this writer is dash escaped and copied to the
/// output, and the canonical form of the text is hashed.  When the
/// writer is finalized, the armored signatures are appended.
///
/// A trailing line break of the text is not signed, see
/// [`cleartext`].
///
///   [`cleartext`]: ../../cleartext/index.html
pub struct CleartextSigner<'a> {
    inner: Option<BoxStack<'a, Cookie>>,
    signer: Signer<'a>,
    // The incomplete last line.
    line: Vec<u8>,
    first_line: bool,
    cookie: Cookie,
    position: u64,
}

impl<'a> CleartextSigner<'a> {
    /// Creates a cleartext signer.
    ///
    /// `signer` configures the signatures; it is turned into a
    /// detached text signer.
    pub fn new(mut inner: Stack<'a, Cookie>, signer: KeyPair,
               hash_algo: HashAlgorithm)
               -> Result<Self> {
        let level = level(&inner);
        write!(inner, "{}\nHash: {}\n\n",
               String::from_utf8_lossy(cleartext::BEGIN), hash_algo)?;

        // The signer writes the signatures into a buffer, which is
        // armored when we are finalized.
        let signer = Signer::new(Message::new(Vec::new()), signer)
            .hash_algo(hash_algo)
            .detached();
        Ok(CleartextSigner {
            inner: Some(inner.into()),
            signer: Signer { typ: SignatureType::Text, ..signer },
            line: Vec::new(),
            first_line: true,
            cookie: Cookie::new(level + 1),
            position: 0,
        })
    }

    /// Adds another signer.
    pub fn add_signer(mut self, signer: KeyPair) -> Self {
        self.signer = self.signer.add_signer(signer);
        self
    }

    /// Sets the signature creation time.  Defaults to now.
    pub fn creation_time(mut self, t: Timestamp) -> Self {
        self.signer = self.signer.creation_time(t);
        self
    }

    /// Sets how long the signatures are valid.
    pub fn expiration(mut self, d: Duration) -> Self {
        self.signer = self.signer.expiration(d);
        self
    }

    /// Pushes the cleartext signer.
    pub fn build(mut self) -> Result<Stack<'a, Cookie>> {
        let mut hash = self.signer.hash_algo.context()?;
        hash.set_text_mode(false);
        self.signer.hash = Some(hash);
        Ok(Stack::from(Box::new(self)))
    }

    // Emits and hashes a complete line, without its line ending.
    fn emit_line(&mut self, line: &[u8]) -> io::Result<()> {
        let inner = self.inner.as_mut().ok_or_else(finalized)?;
        cleartext::dash_escape(inner, line)?;
        inner.write_all(b"\n")?;

        if let Some(ref mut hash) = self.signer.hash {
            if ! self.first_line {
                hash.update(b"\r\n");
            }
            cleartext::hash_text(hash, line);
        }
        self.first_line = false;
        Ok(())
    }
}

impl<'a> fmt::Debug for CleartextSigner<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CleartextSigner")
            .field("signer", &self.signer)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a> Write for CleartextSigner<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        while let Some(i) = self.line.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.line.drain(..i + 1).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.emit_line(&line)?;
        }
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(ref mut w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> Stackable<'a, Cookie> for CleartextSigner<'a> {
    fn into_inner(mut self: Box<Self>) -> Result<Option<BoxStack<'a, Cookie>>> {
        if ! self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.emit_line(&line)?;
        }

        let sigs = self.signer.make_signatures()?;
        let inner = self.inner.take().ok_or_else(finalized)?;
        let level = self.cookie.level;
        let mut armorer = writer::armorer(
            Stack::from(inner), Cookie::new(level), armor::Kind::Signature,
            Vec::<(String, String)>::new())?;
        for sig in sigs {
            Packet::from(sig).serialize(&mut armorer)?;
        }
        Ok(armorer.finalize_one()?.map(BoxStack::from))
    }

    fn inner_ref(&self) -> Option<&dyn Stackable<'a, Cookie>> {
        if let Some(ref i) = self.inner {
            Some(i)
        } else {
            None
        }
    }

    fn cookie_ref(&self) -> &Cookie {
        &self.cookie
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Writes a literal data packet.
///
/// The body is written using partial body lengths.  If the writer
/// below is a [`Signer`], the body is also hashed by the signer.
///
///   [`Signer`]: struct.Signer.html
pub struct LiteralWriter<'a> {
    inner: Stack<'a, Cookie>,
    template: Literal,
}

impl<'a> LiteralWriter<'a> {
    /// Creates a literal writer.  The format defaults to binary.
    pub fn new(inner: Stack<'a, Cookie>) -> Self {
        LiteralWriter {
            inner,
            template: Literal::new(DataFormat::Binary),
        }
    }

    /// Sets the data format.
    pub fn format(mut self, format: DataFormat) -> Self {
        self.template.set_format(format);
        self
    }

    /// Sets the file name.  At most 255 bytes.
    pub fn filename<F: AsRef<[u8]>>(mut self, filename: F) -> Result<Self> {
        self.template.set_filename(filename)?;
        Ok(self)
    }

    /// Sets the date.
    pub fn date(mut self, date: Timestamp) -> Self {
        self.template.set_date(date);
        self
    }

    /// Writes the packet's header and pushes the writer.
    pub fn build(self) -> Result<Stack<'a, Cookie>> {
        let level = level(&self.inner) + 1;
        let mut inner = self.inner;

        // Signatures over literal data only cover the body.  Take
        // the signer off the stack, and feed it the body directly.
        let mut signature_writer = None;
        if let Private::Signer = inner.as_ref().cookie_ref().private {
            let below = inner.as_mut().detach()?.ok_or_else(finalized)?;
            signature_writer = Some(BoxStack::from(inner));
            inner = Stack::from(below);
        }

        write_ctb(&mut inner, Tag::Literal)?;
        let mut inner = PartialBodyFilter::new(inner, Cookie::new(level));
        self.template.serialize_headers(&mut inner)?;

        Ok(Stack::from(Box::new(LiteralBody {
            inner: inner.into(),
            signature_writer,
        })))
    }
}

// The literal writer once its header has been written.
struct LiteralBody<'a> {
    inner: BoxStack<'a, Cookie>,
    signature_writer: Option<BoxStack<'a, Cookie>>,
}

impl<'a> fmt::Debug for LiteralBody<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LiteralWriter")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a> Write for LiteralBody<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(ref mut sig) = self.signature_writer {
            sig.write_all(&buf[..written])?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> Stackable<'a, Cookie> for LiteralBody<'a> {
    fn into_inner(self: Box<Self>) -> Result<Option<BoxStack<'a, Cookie>>> {
        let LiteralBody { inner, signature_writer } = *self;
        // Peel off the partial body filter.
        let stack = inner.into_inner()?.ok_or_else(finalized)?;

        if let Some(mut signer) = signature_writer {
            signer.attach(stack)?;
            Ok(Some(signer))
        } else {
            Ok(Some(stack))
        }
    }
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, Cookie>> {
        Some(&self.inner)
    }

    fn cookie_ref(&self) -> &Cookie {
        self.inner.cookie_ref()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Compresses a packet stream.
///
/// Writes a compressed data packet containing all packets written to
/// this writer.
pub struct Compressor<'a> {
    inner: Stack<'a, Cookie>,
    algo: CompressionAlgorithm,
    level: writer::CompressionLevel,
}

impl<'a> Compressor<'a> {
    /// Creates a compressor.  The algorithm defaults to ZIP.
    pub fn new(inner: Stack<'a, Cookie>) -> Self {
        Compressor {
            inner,
            algo: CompressionAlgorithm::Zip,
            level: Default::default(),
        }
    }

    /// Sets the compression algorithm.
    pub fn algo(mut self, algo: CompressionAlgorithm) -> Self {
        self.algo = algo;
        self
    }

    /// Sets the compression level.
    pub fn level(mut self, level: writer::CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Writes the packet's header and pushes the compressor.
    pub fn build(self) -> Result<Stack<'a, Cookie>> {
        let level = level(&self.inner) + 1;
        let mut inner = self.inner;

        if ! self.algo.is_supported() {
            return Err(Error::UnsupportedCompressionAlgorithm(self.algo).into());
        }

        write_ctb(&mut inner, Tag::CompressedData)?;
        let mut inner = PartialBodyFilter::new(inner, Cookie::new(level));
        inner.write_all(&[self.algo.into()])?;
        let inner = writer::compressor(inner, Cookie::new(level), self.algo,
                                       self.level)?;

        Ok(Stack::from(Box::new(CompressorBody { inner: inner.into() })))
    }
}

// The compressor once its header has been written.
struct CompressorBody<'a> {
    inner: BoxStack<'a, Cookie>,
}

impl<'a> fmt::Debug for CompressorBody<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a> io::Write for CompressorBody<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> Stackable<'a, Cookie> for CompressorBody<'a> {
    fn into_inner(self: Box<Self>) -> Result<Option<BoxStack<'a, Cookie>>> {
        // The compression filter, then the partial body filter.
        let pbf = self.inner.into_inner()?.ok_or_else(finalized)?;
        pbf.into_inner()
    }
    fn inner_ref(&self) -> Option<&dyn Stackable<'a, Cookie>> {
        Some(&self.inner)
    }

    fn cookie_ref(&self) -> &Cookie {
        self.inner.cookie_ref()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Encrypts a packet stream.
///
/// Writes one PKESK packet per recipient, then a SEIP packet whose
/// content is everything written to this writer, followed by an MDC
/// packet.
pub struct Encryptor<'a> {
    inner: Stack<'a, Cookie>,
    recipients: Vec<Key>,
    algo: SymmetricAlgorithm,
}

impl<'a> Encryptor<'a> {
    /// Creates an encryptor for `recipients`.
    ///
    /// The recipients must be encryption capable keys.  The
    /// symmetric algorithm defaults to AES-128.
    pub fn for_recipients<'r, R>(inner: Stack<'a, Cookie>, recipients: R)
                                 -> Self
        where R: IntoIterator<Item = &'r Key>
    {
        Encryptor {
            inner,
            recipients: recipients.into_iter().map(|k| k.to_public())
                .collect(),
            algo: SymmetricAlgorithm::AES128,
        }
    }

    /// Sets the symmetric algorithm.
    pub fn symmetric_algo(mut self, algo: SymmetricAlgorithm) -> Self {
        self.algo = algo;
        self
    }

    /// Writes the session key packets and the SEIP header, and
    /// pushes the encryptor.
    pub fn build(self) -> Result<Stack<'a, Cookie>> {
        if self.recipients.is_empty() {
            return Err(Error::InvalidArgument(
                "No recipients given".into()).into());
        }
        let algo = self.algo;
        let sk = SessionKey::new(algo.key_size()?);
        self.build_with_session_key(&sk)
    }

    fn build_with_session_key(self, sk: &SessionKey)
                              -> Result<Stack<'a, Cookie>> {
        let level = level(&self.inner) + 1;
        let algo = self.algo;
        let mut inner = self.inner;

        for r in self.recipients.iter() {
            let pkesk = PKESK::for_recipient(algo, sk, r)?;
            Packet::from(pkesk).serialize(&mut inner)?;
        }

        write_ctb(&mut inner, Tag::SEIP)?;
        let mut inner = PartialBodyFilter::new(inner, Cookie::new(level));
        inner.write_all(&[1])?;
        let mut inner = writer::encryptor(
            inner, Cookie::new(level), algo, sk)?;

        // The preamble: a block of random data, with its last two
        // bytes repeated.
        let bs = algo.block_size()?;
        let mut preamble = vec![0u8; bs + 2];
        crypto::random(&mut preamble[..bs]);
        preamble[bs] = preamble[bs - 2];
        preamble[bs + 1] = preamble[bs - 1];
        inner.write_all(&preamble)?;

        let mut hash = HashAlgorithm::SHA1.context()?;
        hash.update(&preamble);

        Ok(Stack::from(Box::new(EncryptorBody {
            inner: Some(inner.into()),
            hash,
            cookie: Cookie::new(level),
            position: 0,
        })))
    }
}

// The encryptor once its header has been written.
struct EncryptorBody<'a> {
    inner: Option<BoxStack<'a, Cookie>>,
    // The MDC hash.
    hash: hash::Context,
    cookie: Cookie,
    position: u64,
}

impl<'a> fmt::Debug for EncryptorBody<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Encryptor")
            .field("inner", &self.inner)
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl<'a> Write for EncryptorBody<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = self.inner.as_mut().ok_or_else(finalized)?;
        let written = inner.write(buf)?;
        self.hash.update(&buf[..written]);
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(ref mut w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> Stackable<'a, Cookie> for EncryptorBody<'a> {
    fn into_inner(mut self: Box<Self>) -> Result<Option<BoxStack<'a, Cookie>>> {
        let mut inner = self.inner.take().ok_or_else(finalized)?;

        // The MDC packet's header is covered by the MDC.
        let header = [u8::from(CTB::New { tag: Tag::MDC }), 20];
        self.hash.update(&header);
        let digest = self.hash.digest();
        inner.write_all(&header)?;
        inner.write_all(&digest)?;

        // The encryption filter, then the partial body filter.
        let pbf = inner.into_inner()?.ok_or_else(finalized)?;
        pbf.into_inner()
    }

    fn inner_ref(&self) -> Option<&dyn Stackable<'a, Cookie>> {
        if let Some(ref i) = self.inner {
            Some(i)
        } else {
            None
        }
    }

    fn cookie_ref(&self) -> &Cookie {
        &self.cookie
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod test {
    use std::io::Read;
    use super::*;
    use crate::parse::{Parse, PacketParser};

    fn secret(name: &str) -> Key {
        let data = std::fs::read(crate::path_to(name)).unwrap();
        match Packet::from_bytes(&data).unwrap() {
            Packet::SecretKey(k) => k,
            p => panic!("expected a secret key, got {:?}", p),
        }
    }

    // Returns the tags and depths of all packets, and the literal
    // bodies.
    fn dissect(data: &[u8]) -> (Vec<(Tag, usize)>, Vec<Vec<u8>>,
                                Vec<Signature>) {
        let mut pp = PacketParser::from_bytes(data).unwrap();
        let mut tags = Vec::new();
        let mut bodies = Vec::new();
        let mut sigs = Vec::new();
        while let Some(p) = pp.packet() {
            tags.push((p.tag(), pp.recursion_depth()));
            if let Packet::Literal(_) = p {
                let mut body = Vec::new();
                pp.read_to_end(&mut body).unwrap();
                bodies.push(body);
            }
            if let Some(Packet::Signature(s)) = pp.recurse().unwrap() {
                sigs.push(s);
            }
        }
        (tags, bodies, sigs)
    }

    #[test]
    fn literal() {
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let mut w = LiteralWriter::new(m)
                .format(DataFormat::Text)
                .filename("a.txt").unwrap()
                .date(Timestamp::from(1_000_000))
                .build().unwrap();
            w.write_all(b"Hello ").unwrap();
            w.write_all(b"world.").unwrap();
            w.finalize().unwrap();
        }

        match Packet::from_bytes(&o).unwrap() {
            Packet::Literal(l) => {
                assert_eq!(l.format(), DataFormat::Text);
                assert_eq!(l.filename(), b"a.txt");
                assert_eq!(l.date(), Timestamp::from(1_000_000));
                assert_eq!(l.body(), b"Hello world.");
            }
            p => panic!("unexpected packet {:?}", p),
        }
    }

    #[test]
    fn big_literal() {
        // Exercises the partial body lengths.
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let mut w = LiteralWriter::new(m).build().unwrap();
            w.write_all(&data).unwrap();
            w.finalize().unwrap();
        }
        assert_eq!(o[0], 0xcb);
        assert_eq!(o[1], 0xed);
        let (tags, bodies, _) = dissect(&o);
        assert_eq!(tags, [(Tag::Literal, 0)]);
        assert_eq!(bodies[0], data);
    }

    #[test]
    fn nested_compression() {
        // 0: CompressedData
        //  1: Literal "one"
        //  1: Literal "two"
        // 0: Literal "three"
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let c = Compressor::new(m)
                .algo(CompressionAlgorithm::Uncompressed)
                .build().unwrap();
            let mut ls = LiteralWriter::new(c).build().unwrap();
            write!(ls, "one").unwrap();
            let c = ls.finalize_one().unwrap().unwrap();
            let mut ls = LiteralWriter::new(c).build().unwrap();
            write!(ls, "two").unwrap();
            let c = ls.finalize_one().unwrap().unwrap();
            let m = c.finalize_one().unwrap().unwrap();
            let mut ls = LiteralWriter::new(m).build().unwrap();
            write!(ls, "three").unwrap();
            ls.finalize().unwrap();
        }

        let (tags, bodies, _) = dissect(&o);
        assert_eq!(tags, [(Tag::CompressedData, 0),
                          (Tag::Literal, 1),
                          (Tag::Literal, 1),
                          (Tag::Literal, 0)]);
        assert_eq!(bodies, [&b"one"[..], b"two", b"three"]);
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn compressed() {
        for algo in [CompressionAlgorithm::Zip, CompressionAlgorithm::Zlib] {
            let mut o = Vec::new();
            {
                let m = Message::new(&mut o);
                let c = Compressor::new(m).algo(algo).build().unwrap();
                let mut ls = LiteralWriter::new(c).build().unwrap();
                ls.write_all(&vec![b'z'; 64 * 1024]).unwrap();
                ls.finalize().unwrap();
            }
            assert!(o.len() < 1024);
            let (tags, bodies, _) = dissect(&o);
            assert_eq!(tags, [(Tag::CompressedData, 0), (Tag::Literal, 1)]);
            assert_eq!(bodies[0], vec![b'z'; 64 * 1024]);
        }
    }

    #[test]
    fn signed() {
        let alice = secret("keys/alice-secret.pgp");
        let bob = secret("keys/bob-secret.pgp");

        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let s = Signer::new(m, alice.clone().into_keypair(None).unwrap())
                .add_signer(bob.clone().into_keypair(None).unwrap())
                .hash_algo(HashAlgorithm::SHA1)
                .build().unwrap();
            let mut ls = LiteralWriter::new(s).build().unwrap();
            ls.write_all(b"hello world").unwrap();
            ls.finalize().unwrap();
        }

        let (tags, bodies, sigs) = dissect(&o);
        assert_eq!(tags, [(Tag::OnePassSig, 0),
                          (Tag::OnePassSig, 0),
                          (Tag::Literal, 0),
                          (Tag::Signature, 0),
                          (Tag::Signature, 0)]);
        assert_eq!(bodies[0], b"hello world");
        // The innermost signature comes first.
        assert_eq!(sigs[0].issuer(), Some(bob.keyid()));
        assert!(sigs[0].verify(&bob).unwrap());
        assert_eq!(sigs[1].issuer(), Some(alice.keyid()));
        assert!(sigs[1].verify(&alice).unwrap());
    }

    #[test]
    fn detached() {
        let alice = secret("keys/alice-secret.pgp");
        let t = Timestamp::from(1_600_000_000);

        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let mut s = Signer::new(m, alice.clone().into_keypair(None).unwrap())
                .detached()
                .creation_time(t)
                .build().unwrap();
            s.write_all(b"hello world").unwrap();
            s.finalize().unwrap();
        }

        let sig = match Packet::from_bytes(&o).unwrap() {
            Packet::Signature(s) => s,
            p => panic!("unexpected packet {:?}", p),
        };
        assert_eq!(sig.creation_time(), Some(t));
        assert_eq!(sig.hash_algo(), HashAlgorithm::SHA256);
        assert!(sig.verify_message(&alice, b"hello world").unwrap());
        assert!(! sig.verify_message(&alice, b"hello world!").unwrap());
    }

    #[test]
    fn text_signature() {
        let bob = secret("keys/bob-secret.pgp");
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let mut s = Signer::new(m, bob.clone().into_keypair(None).unwrap())
                .text()
                .detached()
                .build().unwrap();
            s.write_all(b"one\ntwo\n").unwrap();
            s.finalize().unwrap();
        }
        let sig = match Packet::from_bytes(&o).unwrap() {
            Packet::Signature(s) => s,
            p => panic!("unexpected packet {:?}", p),
        };
        assert_eq!(sig.typ(), SignatureType::Text);
        assert!(sig.verify_message(&bob, b"one\r\ntwo\r\n").unwrap());
    }

    #[test]
    fn cleartext() {
        let alice = secret("keys/alice-secret.pgp");
        let text = b"Hello,\n-- dashes here\nFrom the other side  \n";

        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let mut w = CleartextSigner::new(
                m, alice.clone().into_keypair(None).unwrap(),
                HashAlgorithm::SHA256).unwrap()
                .build().unwrap();
            w.write_all(&text[..10]).unwrap();
            w.write_all(&text[10..]).unwrap();
            w.finalize().unwrap();
        }
        let s = String::from_utf8(o.clone()).unwrap();
        assert!(s.starts_with("-----BEGIN PGP SIGNED MESSAGE-----\n\
                               Hash: SHA256\n\n\
                               Hello,\n\
                               - -- dashes here\n"));
        assert!(s.ends_with("-----END PGP SIGNATURE-----\n"));

        let mut pp = PacketParser::from_bytes(&o).unwrap();
        assert_eq!(pp.cleartext().unwrap().text(),
                   &b"Hello,\n-- dashes here\nFrom the other side  "[..]);
        let sig = match pp.next().unwrap() {
            Some(Packet::Signature(s)) => s,
            p => panic!("unexpected packet {:?}", p),
        };
        assert_eq!(sig.typ(), SignatureType::Text);
        assert!(sig.verify(&alice).unwrap());
    }

    #[test]
    fn encrypted() {
        let alice = secret("keys/alice-secret.pgp");
        let data = std::fs::read(
            crate::path_to("keys/alice-secret.pgp")).unwrap();
        let subkey = crate::parse::packets_from_bytes(&data).unwrap()
            .into_iter()
            .find_map(|p| match p {
                Packet::SecretSubkey(k) => Some(k),
                _ => None,
            })
            .unwrap();

        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let e = Encryptor::for_recipients(m, vec![&subkey])
                .symmetric_algo(SymmetricAlgorithm::CAST5)
                .build().unwrap();
            let s = Signer::new(e, alice.clone().into_keypair(None).unwrap())
                .build().unwrap();
            let mut ls = LiteralWriter::new(s).build().unwrap();
            ls.write_all(b"attack at dawn").unwrap();
            ls.finalize().unwrap();
        }

        let mut pp = PacketParser::from_bytes(&o).unwrap();
        let pkesk = match pp.next().unwrap() {
            Some(Packet::PKESK(p)) => p,
            p => panic!("unexpected packet {:?}", p),
        };
        assert_eq!(pkesk.recipient(), &subkey.keyid());
        let keypair = subkey.clone().into_keypair(None).unwrap();
        let (algo, sk) = pkesk.decrypt(&keypair).unwrap();
        assert_eq!(algo, SymmetricAlgorithm::CAST5);

        assert_eq!(pp.packet().unwrap().tag(), Tag::SEIP);
        pp.decrypt(algo, &sk).unwrap();
        let mut tags = Vec::new();
        let mut body = Vec::new();
        let mut sig = None;
        while let Some(p) = pp.packet() {
            tags.push((p.tag(), pp.recursion_depth()));
            if let Packet::Literal(_) = p {
                pp.read_to_end(&mut body).unwrap();
            }
            if let Some(Packet::Signature(s)) = pp.recurse().unwrap() {
                sig = Some(s);
            }
        }
        assert_eq!(tags, [(Tag::SEIP, 0),
                          (Tag::OnePassSig, 1),
                          (Tag::Literal, 1),
                          (Tag::Signature, 1)]);
        assert_eq!(body, b"attack at dawn");
        assert!(sig.unwrap().verify(&alice).unwrap());
        assert!(pp.errors().is_empty());
    }

    #[test]
    fn tampered_mdc() {
        let data = std::fs::read(
            crate::path_to("keys/alice-secret.pgp")).unwrap();
        let subkey = crate::parse::packets_from_bytes(&data).unwrap()
            .into_iter()
            .find_map(|p| match p {
                Packet::SecretSubkey(k) => Some(k),
                _ => None,
            })
            .unwrap();

        let sk = SessionKey::from(vec![3u8; 16]);
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let e = Encryptor::for_recipients(m, vec![&subkey])
                .build_with_session_key(&sk).unwrap();
            let mut ls = LiteralWriter::new(e).build().unwrap();
            ls.write_all(b"attack at dawn").unwrap();
            ls.finalize().unwrap();
        }
        // Flip a bit in the last byte of the MDC.
        let last = o.len() - 1;
        o[last] ^= 1;

        let mut pp = PacketParser::from_bytes(&o).unwrap();
        pp.next().unwrap();
        pp.decrypt(SymmetricAlgorithm::AES128, &sk).unwrap();
        let mut result = Ok(());
        while pp.packet().is_some() {
            if let Err(e) = pp.recurse() {
                result = Err(e);
                break;
            }
        }
        let e = result.unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(),
                         Some(Error::ManipulatedMessage)));
    }

    #[test]
    fn armored() {
        let mut o = Vec::new();
        {
            let m = Message::new(&mut o);
            let a = Armorer::new(m).build().unwrap();
            let mut ls = LiteralWriter::new(a).build().unwrap();
            ls.write_all(b"armored").unwrap();
            ls.finalize().unwrap();
        }
        assert!(o.starts_with(b"-----BEGIN PGP MESSAGE-----\n"));
        let (tags, bodies, _) = dissect(&o);
        assert_eq!(tags, [(Tag::Literal, 0)]);
        assert_eq!(bodies[0], b"armored");
    }
}
