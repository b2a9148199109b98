//! ASCII Armor.
//!
//! This module deals with ASCII Armored data (see [RFC 4880, section 6]).
//!
//! [RFC 4880, section 6]: https://tools.ietf.org/html/rfc4880#section-6
//!
//! # Scope
//!
//! This implements a subset of the ASCII Armor specification.  Not
//! supported are multipart messages.
//!
//! # Memory allocations
//!
//! Both the reader and the writer allocate memory in the order of the
//! size of chunks read or written.
//!
//! # Example
//!
//! ```rust
//! # fn main() -> netpgp::Result<()> {
//! use std::io::{Read, Write};
//! use netpgp::armor::{Reader, Writer, Kind};
//!
//! let mut w = Writer::new(Vec::new(), Kind::File)?;
//! w.write_all(b"Hello world!")?;
//! let armored = w.finalize()?;
//!
//! let mut r = Reader::from_bytes(&armored, Some(Kind::File));
//! let mut content = Vec::new();
//! r.read_to_end(&mut content)?;
//! assert_eq!(&content[..], b"Hello world!");
//! # Ok(()) }
//! ```

use std::cmp;
use std::fmt;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::str;

use buffered_reader::BufferedReader;

use crate::Error;
use crate::Result;

mod crc;
use self::crc::Crc;

/// The encoded output stream must be represented in lines of no more
/// than 76 characters each (see [RFC 4880, section 6.3]).  GnuPG uses
/// 64.
///
///   [RFC 4880, section 6.3]: https://tools.ietf.org/html/rfc4880#section-6.3
const LINE_LENGTH: usize = 64;

const LINE_ENDING: &str = "\n";

/// Specifies the type of data (see [RFC 4880, section 6.2]).
///
/// [RFC 4880, section 6.2]: https://tools.ietf.org/html/rfc4880#section-6.2
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A generic OpenPGP message.
    Message,
    /// A transferable public key.
    PublicKey,
    /// A transferable secret key.
    SecretKey,
    /// A detached signature.
    Signature,
    /// A generic file.  This is a GnuPG extension.
    File,
}

#[cfg(test)]
impl quickcheck::Arbitrary for Kind {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use self::Kind::*;
        *g.choose(&[Message, PublicKey, SecretKey, Signature, File])
            .expect("not empty")
    }
}

impl Kind {
    /// Autodetects the kind of data from an Armor Header Line.
    fn detect(line: &[u8]) -> Option<Self> {
        let blurb = line.strip_prefix(b"-----BEGIN PGP ")?;
        [Kind::Message, Kind::PublicKey, Kind::SecretKey, Kind::Signature,
         Kind::File].iter()
            .find(|k| blurb.starts_with(k.blurb().as_bytes())
                  && blurb[k.blurb().len()..].starts_with(b"-----"))
            .cloned()
    }

    fn blurb(&self) -> &'static str {
        match self {
            Kind::Message => "MESSAGE",
            Kind::PublicKey => "PUBLIC KEY BLOCK",
            Kind::SecretKey => "PRIVATE KEY BLOCK",
            Kind::Signature => "SIGNATURE",
            Kind::File => "ARMORED FILE",
        }
    }

    fn begin(&self) -> String {
        format!("-----BEGIN PGP {}-----", self.blurb())
    }

    fn end(&self) -> String {
        format!("-----END PGP {}-----", self.blurb())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.blurb())
    }
}

/// A filter that applies ASCII Armor to the data written to it.
///
/// Call [`finalize`] to write the checksum and the Armor Tail Line.
///
///   [`finalize`]: #method.finalize
pub struct Writer<W: Write> {
    sink: W,
    kind: Kind,
    stash: Vec<u8>,
    column: usize,
    crc: Crc,
    header: Vec<u8>,
    dirty: bool,
}

impl<W: Write> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("armor::Writer")
            .field("kind", &self.kind)
            .field("column", &self.column)
            .finish()
    }
}

impl<W: Write> Writer<W> {
    /// Constructs a new filter for the given type of data.
    pub fn new(inner: W, kind: Kind) -> Result<Self> {
        Self::with_headers(inner, kind, Option::<(&str, &str)>::None)
    }

    /// Constructs a new filter for the given type of data, emitting
    /// the given headers.
    ///
    /// # Example
    ///
    /// ```
    /// # fn main() -> netpgp::Result<()> {
    /// use std::io::Write;
    /// use netpgp::armor::{Writer, Kind};
    ///
    /// let mut writer = Writer::with_headers(Vec::new(), Kind::File,
    ///                                       vec![("Key", "Value")])?;
    /// writer.write_all(b"Hello world!")?;
    /// let buffer = writer.finalize()?;
    /// assert_eq!(
    ///     String::from_utf8_lossy(&buffer),
    ///     "-----BEGIN PGP ARMORED FILE-----
    /// Key: Value
    ///
    /// SGVsbG8gd29ybGQh
    /// =s4Gu
    /// -----END PGP ARMORED FILE-----
    /// ");
    /// # Ok(()) }
    /// ```
    pub fn with_headers<I, K, V>(inner: W, kind: Kind, headers: I)
                                 -> Result<Self>
        where I: IntoIterator<Item = (K, V)>,
              K: AsRef<str>,
              V: AsRef<str>,
    {
        let mut header = Vec::with_capacity(128);
        write!(&mut header, "{}{}", kind.begin(), LINE_ENDING)?;
        for (key, value) in headers {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key.contains(':') || key.contains('\n') || value.contains('\n') {
                return Err(Error::InvalidArgument(
                    format!("Invalid armor header {:?}: {:?}", key, value))
                           .into());
            }
            write!(&mut header, "{}: {}{}", key, value, LINE_ENDING)?;
        }
        // A blank line separates the headers from the body.
        write!(&mut header, "{}", LINE_ENDING)?;

        Ok(Writer {
            sink: inner,
            kind,
            stash: Vec::with_capacity(2),
            column: 0,
            crc: Crc::new(),
            header,
            dirty: false,
        })
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> Option<&W> {
        Some(&self.sink)
    }

    /// Returns a mutable reference to the inner writer.
    pub fn get_mut(&mut self) -> Option<&mut W> {
        Some(&mut self.sink)
    }

    fn write_header(&mut self) -> io::Result<()> {
        if ! self.dirty {
            self.dirty = true;
            self.sink.write_all(&self.header)?;
            self.header = Vec::new();
        }
        Ok(())
    }

    /// Writes the footer, and returns the inner writer.
    ///
    /// An armored block is written even if no data was written.
    pub fn finalize(mut self) -> Result<W> {
        self.write_header()?;

        // Write any stashed bytes and pad.
        if ! self.stash.is_empty() {
            self.sink.write_all(
                base64::encode_config(&self.stash, base64::STANDARD)
                    .as_bytes())?;
            self.column += 4;
        }
        if self.column > 0 {
            write!(self.sink, "{}", LINE_ENDING)?;
        }

        let crc = self.crc.finalize();
        let bytes = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];

        write!(self.sink, "={}{}{}{}",
               base64::encode_config(&bytes, base64::STANDARD_NO_PAD),
               LINE_ENDING, self.kind.end(), LINE_ENDING)?;
        Ok(self.sink)
    }

    // Writes encoded data, inserting line breaks.
    fn write_encoded(&mut self, mut enc: &[u8]) -> io::Result<()> {
        while ! enc.is_empty() {
            let n = cmp::min(LINE_LENGTH - self.column, enc.len());
            self.sink.write_all(&enc[..n])?;
            enc = &enc[n..];
            self.column += n;
            if self.column == LINE_LENGTH {
                write!(self.sink, "{}", LINE_ENDING)?;
                self.column = 0;
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_header()?;
        self.crc.update(buf);

        let mut input = buf;

        // Complete a stashed group first.
        if ! self.stash.is_empty() {
            let n = cmp::min(3 - self.stash.len(), input.len());
            self.stash.extend_from_slice(&input[..n]);
            input = &input[n..];
            if self.stash.len() < 3 {
                return Ok(buf.len());
            }
            let enc = base64::encode_config(&self.stash,
                                            base64::STANDARD_NO_PAD);
            self.stash.clear();
            self.write_encoded(enc.as_bytes())?;
        }

        // Encode a multiple of 3 bytes, stash the rest.
        let n = input.len() - input.len() % 3;
        let enc = base64::encode_config(&input[..n], base64::STANDARD_NO_PAD);
        self.write_encoded(enc.as_bytes())?;
        self.stash.extend_from_slice(&input[n..]);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

// Wraps an armor error for the `io::Read` interface.
fn invalid(e: Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

// Strips leading and trailing whitespace, including the line ending.
fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|c| ! c.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line.iter().rposition(|c| ! c.is_ascii_whitespace())
        .map(|i| i + 1).unwrap_or(start);
    &line[start..end]
}

fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

/// A filter that strips ASCII Armor from a stream of data.
///
/// The reader skips anything in front of the Armor Header Line,
/// collects the headers, decodes the body line by line, and checks
/// the CRC-24 when it reaches the Armor Tail Line.  Errors are
/// reported as `io::ErrorKind::InvalidData`, wrapping an
/// `Error::MalformedArmor` or an `Error::ChecksumMismatch`.
pub struct Reader<R: BufferedReader<C>, C> {
    source: R,
    kind: Option<Kind>,
    headers: Vec<(String, String)>,
    initialized: bool,

    // Decoded, but not yet read data.
    decoded: Vec<u8>,
    cursor: usize,
    // Base64 characters that don't fill a group yet.
    pending: Vec<u8>,

    crc: Crc,
    expected_crc: Option<u32>,
    finished: bool,
    _cookie: PhantomData<C>,
}

impl<R: BufferedReader<C>, C> fmt::Debug for Reader<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("armor::Reader")
            .field("kind", &self.kind)
            .field("headers", &self.headers)
            .field("finished", &self.finished)
            .field("source", &self.source)
            .finish()
    }
}

impl<'a> Reader<buffered_reader::Memory<'a, ()>, ()> {
    /// Creates a `Reader` from a buffer.
    pub fn from_bytes(bytes: &'a [u8], kind: Option<Kind>) -> Self {
        Self::new(buffered_reader::Memory::new(bytes), kind)
    }
}

impl<R: BufferedReader<C>, C> Reader<R, C> {
    /// Constructs a new filter.
    ///
    /// If `kind` is given, armored blocks of other kinds are skipped.
    /// Otherwise, the first armored block is decoded, and its kind is
    /// available using [`kind`] once the reader has been
    /// initialized.
    ///
    ///   [`kind`]: #method.kind
    pub fn new(source: R, kind: Option<Kind>) -> Self {
        Reader {
            source,
            kind,
            headers: Vec::new(),
            initialized: false,
            decoded: Vec::new(),
            cursor: 0,
            pending: Vec::new(),
            crc: Crc::new(),
            expected_crc: None,
            finished: false,
            _cookie: PhantomData,
        }
    }

    /// Returns the kind of data this reader is for.
    ///
    /// Returns `None` if the reader hasn't been initialized, and the
    /// kind wasn't given to `new`.
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Returns the armor headers.
    ///
    /// The tuples contain a key and a value.  Keys that occur more than
    /// once are not merged.  Empty until the reader is initialized.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    // Reads a line, including the line ending, and consumes it.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let line = self.source.read_to(b'\n')?.to_vec();
        if line.is_empty() {
            return Ok(None);
        }
        self.source.consume(line.len());
        Ok(Some(line))
    }

    /// Reads the Armor Header Line and the headers.
    ///
    /// This is done implicitly by the first read.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        // Look for the Armor Header Line, skipping anything else.
        loop {
            let line = self.read_line()?.ok_or_else(|| Error::MalformedArmor(
                "Reached EOF looking for the Armor Header Line".into()))?;
            let line = trim(&line);
            match Kind::detect(line) {
                Some(kind) if self.kind.is_none() || self.kind == Some(kind) => {
                    self.kind = Some(kind);
                    break;
                }
                _ => (),
            }
        }

        // Read the headers, up to the blank line.
        let mut first = true;
        loop {
            let line = match self.read_line()? {
                Some(line) => line,
                None => break,
            };
            let line = trim(&line);
            if line.is_empty() {
                break;
            }

            let header = str::from_utf8(line).ok()
                .and_then(|l| {
                    let mut kv = l.splitn(2, ": ");
                    Some((kv.next()?.to_string(), kv.next()?.to_string()))
                });
            match header {
                Some(header) => self.headers.push(header),
                None if first && line.iter().all(|&c| is_base64_char(c)) => {
                    // The blank line is missing, and this is the body
                    // already.
                    self.initialized = true;
                    self.body_line(line).map_err(crate::parse::map_io_error)?;
                    return Ok(());
                }
                None => return Err(Error::MalformedArmor(
                    format!("Invalid armor header {:?}",
                            String::from_utf8_lossy(line))).into()),
            }
            first = false;
        }

        self.initialized = true;
        Ok(())
    }

    // Decodes one line of the body.
    fn body_line(&mut self, line: &[u8]) -> io::Result<()> {
        if self.expected_crc.is_some() {
            return Err(invalid(Error::MalformedArmor(
                "Data after the armor checksum".into())));
        }
        if ! line.iter().all(|&c| is_base64_char(c)) {
            return Err(invalid(Error::MalformedArmor(
                format!("Invalid base64 line {:?}",
                        String::from_utf8_lossy(line)))));
        }

        self.pending.extend_from_slice(line);
        let n = self.pending.len() - self.pending.len() % 4;
        let decoded = base64::decode_config(&self.pending[..n], base64::STANDARD)
            .map_err(|e| invalid(Error::MalformedArmor(e.to_string())))?;
        self.pending.drain(..n);

        self.crc.update(&decoded);
        self.decoded.drain(..self.cursor);
        self.cursor = 0;
        self.decoded.extend_from_slice(&decoded);
        Ok(())
    }

    // Reads and decodes the next line.
    fn fill(&mut self) -> io::Result<()> {
        let line = self.read_line()?.ok_or_else(|| invalid(
            Error::MalformedArmor("Armor Tail Line is missing".into())))?;
        let line = trim(&line);

        if line.is_empty() {
            Ok(())
        } else if line.starts_with(b"-----") {
            self.tail(line)
        } else if line[0] == b'=' && self.pending.is_empty() {
            // The checksum.
            if line.len() != 5 {
                return Err(invalid(Error::MalformedArmor(
                    "Malformed armor checksum".into())));
            }
            let crc = base64::decode_config(&line[1..], base64::STANDARD)
                .map_err(|e| invalid(Error::MalformedArmor(e.to_string())))?;
            self.expected_crc = Some((crc[0] as u32) << 16
                                     | (crc[1] as u32) << 8
                                     | crc[2] as u32);
            Ok(())
        } else {
            self.body_line(line)
        }
    }

    // Checks the Armor Tail Line and the checksum.
    fn tail(&mut self, line: &[u8]) -> io::Result<()> {
        let kind = self.kind.unwrap_or(Kind::Message);
        if line != kind.end().as_bytes() {
            return Err(invalid(Error::MalformedArmor(
                format!("Expected {:?}, got {:?}", kind.end(),
                        String::from_utf8_lossy(line)))));
        }
        if ! self.pending.is_empty() {
            return Err(invalid(Error::MalformedArmor(
                "Truncated base64 data".into())));
        }

        let computed = self.crc.finalize();
        match self.expected_crc {
            Some(expected) if expected != computed =>
                return Err(invalid(Error::ChecksumMismatch {
                    expected,
                    computed,
                })),
            // The checksum is optional.
            _ => (),
        }
        self.finished = true;
        Ok(())
    }
}

impl<R: BufferedReader<C>, C> Read for Reader<R, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if ! self.initialized {
            self.initialize().map_err(|e| match e.downcast::<Error>() {
                Ok(e) => invalid(e),
                Err(e) => io::Error::new(io::ErrorKind::Other, e.to_string()),
            })?;
        }

        while self.cursor == self.decoded.len() && ! self.finished {
            self.fill()?;
        }

        let n = cmp::min(buf.len(), self.decoded.len() - self.cursor);
        buf[..n].copy_from_slice(&self.decoded[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn armor(kind: Kind, data: &[u8]) -> Vec<u8> {
        let mut w = Writer::new(Vec::new(), kind).unwrap();
        w.write_all(data).unwrap();
        w.finalize().unwrap()
    }

    fn dearmor(armored: &[u8], kind: Option<Kind>) -> io::Result<Vec<u8>> {
        let mut r = Reader::from_bytes(armored, kind);
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        Ok(data)
    }

    fn armor_error(e: io::Error) -> Error {
        e.into_inner().unwrap().downcast::<Error>().map(|e| *e).unwrap()
    }

    #[test]
    fn lengths() {
        for len in [0usize, 1, 2, 3, 47, 48, 49, (1 << 20) + 7].iter() {
            let data: Vec<u8> = (0..*len).map(|i| (i * 7 % 256) as u8)
                .collect();
            let armored = armor(Kind::Message, &data);
            assert!(armored.starts_with(b"-----BEGIN PGP MESSAGE-----\n\n"));
            assert!(armored.ends_with(b"\n-----END PGP MESSAGE-----\n"));
            for line in armored.split(|&c| c == b'\n') {
                assert!(line.len() <= LINE_LENGTH);
            }
            assert_eq!(dearmor(&armored, None).unwrap(), data,
                       "length {}", len);
        }
    }

    #[test]
    fn empty_checksum() {
        let armored = armor(Kind::Signature, b"");
        let s = String::from_utf8(armored).unwrap();
        // The CRC-24 of no data is the initialization value.
        assert!(s.contains("\n=twTO\n"), "{}", s);
    }

    #[test]
    fn headers() {
        let mut w = Writer::with_headers(
            Vec::new(), Kind::PublicKey,
            vec![("Version", "netpgp"), ("Comment", "a: b")]).unwrap();
        w.write_all(b"x").unwrap();
        let armored = w.finalize().unwrap();

        let mut r = Reader::from_bytes(&armored, None);
        r.initialize().unwrap();
        assert_eq!(r.kind(), Some(Kind::PublicKey));
        assert_eq!(r.headers(),
                   &[("Version".to_string(), "netpgp".to_string()),
                     ("Comment".to_string(), "a: b".to_string())][..]);

        assert!(Writer::with_headers(Vec::new(), Kind::File,
                                     vec![("a\nb", "c")]).is_err());
    }

    #[test]
    fn flipped_character() {
        let armored = armor(Kind::Message, b"Hello world!");
        let s = String::from_utf8(armored).unwrap();
        // Replace the first body character by another base64 digit.
        let body = s.find("\n\n").unwrap() + 2;
        let mut flipped = s.into_bytes();
        flipped[body] = if flipped[body] == b'A' { b'B' } else { b'A' };

        match armor_error(dearmor(&flipped, None).unwrap_err()) {
            Error::ChecksumMismatch { .. } => (),
            e => panic!("unexpected error {}", e),
        }

        // Not base64 at all.
        flipped[body] = b'*';
        assert!(matches!(armor_error(dearmor(&flipped, None).unwrap_err()),
                         Error::MalformedArmor(_)));
    }

    #[test]
    fn garbage_and_whitespace() {
        let armored = armor(Kind::File, b"Hello world!");
        let mut data = b"Some text\nin front.\n\n".to_vec();
        for line in armored.split(|&c| c == b'\n') {
            data.extend_from_slice(b"  ");
            data.extend_from_slice(line);
            data.extend_from_slice(b" \r\n");
        }
        assert_eq!(dearmor(&data, Some(Kind::File)).unwrap(), b"Hello world!");
        // Looking for a different kind.
        assert!(dearmor(&data, Some(Kind::Message)).is_err());
    }

    #[test]
    fn missing_tail() {
        let armored = armor(Kind::Message, b"Hello world!");
        let cut = armored.len() - "-----END PGP MESSAGE-----\n".len();
        assert!(matches!(armor_error(dearmor(&armored[..cut], None)
                                     .unwrap_err()),
                         Error::MalformedArmor(_)));
    }

    #[test]
    fn optional_checksum() {
        let data = "-----BEGIN PGP ARMORED FILE-----\n\
                    \n\
                    SGVsbG8gd29ybGQh\n\
                    -----END PGP ARMORED FILE-----\n";
        assert_eq!(dearmor(data.as_bytes(), None).unwrap(), b"Hello world!");
    }

    #[test]
    fn gnupg_signature() {
        let data = std::fs::read(crate::path_to("messages/hello-signed.asc"))
            .unwrap();
        let mut r = Reader::from_bytes(&data, None);
        let mut binary = Vec::new();
        r.read_to_end(&mut binary).unwrap();
        assert_eq!(r.kind(), Some(Kind::Message));
        // A binary OpenPGP packet.
        assert!(binary[0] & 0x80 != 0);
    }

    #[quickcheck]
    fn roundtrip(kind: Kind, payload: Vec<u8>) -> bool {
        let armored = armor(kind, &payload);
        dearmor(&armored, Some(kind)).unwrap() == payload
    }

    #[quickcheck]
    fn chunked_writes(payload: Vec<u8>, chunk: u8) -> bool {
        let chunk = cmp::max(1, chunk as usize);
        let mut w = Writer::new(Vec::new(), Kind::File).unwrap();
        for c in payload.chunks(chunk) {
            w.write_all(c).unwrap();
        }
        w.finalize().unwrap() == armor(Kind::File, &payload)
    }
}
