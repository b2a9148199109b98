//! Cleartext signature framework.
//!
//! A cleartext signed message carries the signed text in the clear,
//! followed by an armored signature (see [Section 7 of RFC 4880]).
//! This module reads the text part; the signature part is ordinary
//! armor and is handed to the packet parser.
//!
//! The text is signed in its canonical form: trailing whitespace is
//! removed from every line, lines are separated by `\r\n`, and the
//! line break before the signature's armor is not part of the text.
//!
//!   [Section 7 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-7

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::crypto::hash;
use crate::parse::map_io_error;
use crate::types::HashAlgorithm;
use crate::Error;
use crate::Result;

/// The line introducing a cleartext signed message.
pub(crate) const BEGIN: &[u8] = b"-----BEGIN PGP SIGNED MESSAGE-----";

/// The line introducing the signature of a cleartext signed message.
const SIGNATURE: &[u8] = b"-----BEGIN PGP SIGNATURE-----";

/// The text of a cleartext signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleartext {
    hash_algos: Vec<HashAlgorithm>,
    text: Vec<u8>,
}

impl Cleartext {
    /// Returns the hash algorithms announced in the `Hash` headers.
    ///
    /// If there was no `Hash` header, this is `[MD5]`.
    pub fn hash_algos(&self) -> &[HashAlgorithm] {
        &self.hash_algos
    }

    /// Returns the text with the dash escaping removed.
    ///
    /// Lines are separated by `\n`.  The text does not end in a
    /// line break.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Returns a hash context that has hashed the canonical form of
    /// the text.
    pub fn hash(&self, algo: HashAlgorithm) -> Result<hash::Context> {
        let mut ctx = algo.context()?;
        hash_text(&mut ctx, &self.text);
        Ok(ctx)
    }
}

/// Hashes `text` as the body of a cleartext signature.
pub(crate) fn hash_text(ctx: &mut hash::Context, text: &[u8]) {
    for (i, line) in text.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            ctx.update(b"\r\n");
        }
        ctx.update(trim_end(line));
    }
}

// Strips trailing spaces, tabs and carriage returns.
fn trim_end(line: &[u8]) -> &[u8] {
    let end = line.iter().rposition(|&b| ! matches!(b, b' ' | b'\t' | b'\r'))
        .map(|i| i + 1)
        .unwrap_or(0);
    &line[..end]
}

/// Writes `text` dash escaped.
///
/// Every line that starts with a dash is prefixed with `- `.
pub(crate) fn dash_escape<W: Write + ?Sized>(sink: &mut W, text: &[u8])
                                            -> io::Result<()> {
    for (i, line) in text.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            sink.write_all(b"\n")?;
        }
        if line.starts_with(b"-") {
            sink.write_all(b"- ")?;
        }
        sink.write_all(line)?;
    }
    Ok(())
}

// Returns the next line without its line ending, and consumes it.
// Returns `None` at EOF.
fn next_line<R: BufferedReader<C>, C>(reader: &mut R)
                                      -> Result<Option<Vec<u8>>> {
    let len = reader.read_to(b'\n').map_err(map_io_error)?.len();
    if len == 0 {
        return Ok(None);
    }
    let line = reader.data_consume_hard(len).map_err(map_io_error)?;
    let mut line = &line[..len];
    if line.ends_with(b"\n") {
        line = &line[..line.len() - 1];
    }
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }
    Ok(Some(line.to_vec()))
}

/// Reads the header and text of a cleartext signed message.
///
/// Leading whitespace before the `BEGIN` line is skipped.  On
/// success, `reader` is positioned at the start of the signature's
/// armor.
pub(crate) fn read<R: BufferedReader<C>, C>(reader: &mut R)
                                            -> Result<Cleartext> {
    loop {
        match next_line(reader)? {
            None => return Err(Error::MalformedArmor(
                "Missing cleartext header".into()).into()),
            Some(l) if trim_end(&l).is_empty() => continue,
            Some(l) if trim_end(&l) == BEGIN => break,
            Some(_) => return Err(Error::MalformedArmor(
                "Junk before the cleartext header".into()).into()),
        }
    }

    let mut hash_algos = Vec::new();
    loop {
        let line = match next_line(reader)? {
            Some(l) => l,
            None => return Err(Error::MalformedArmor(
                "Truncated cleartext header".into()).into()),
        };
        let line = String::from_utf8_lossy(trim_end(&line)).into_owned();
        if line.is_empty() {
            break;
        }
        let (key, value) = match line.find(':') {
            Some(i) => (&line[..i], line[i + 1..].trim()),
            None => return Err(Error::MalformedArmor(
                format!("Malformed cleartext header {:?}", line)).into()),
        };
        if key != "Hash" {
            log::warn!("Ignoring cleartext header {:?}", key);
            continue;
        }
        for name in value.split(',').map(str::trim).filter(|n| ! n.is_empty()) {
            match name.parse() {
                Ok(algo) => hash_algos.push(algo),
                Err(_) => log::warn!("Unknown hash algorithm {:?}", name),
            }
        }
    }
    if hash_algos.is_empty() {
        hash_algos.push(HashAlgorithm::MD5);
    }

    let mut lines: Vec<Vec<u8>> = Vec::new();
    loop {
        let at_signature = {
            let next = reader.read_to(b'\n').map_err(map_io_error)?;
            if next.is_empty() {
                return Err(Error::MalformedArmor(
                    "Cleartext signed message without a signature".into())
                           .into());
            }
            next.starts_with(SIGNATURE)
        };
        if at_signature {
            break;
        }
        if let Some(line) = next_line(reader)? {
            if line.starts_with(b"- ") {
                lines.push(line[2..].to_vec());
            } else {
                lines.push(line);
            }
        }
    }

    Ok(Cleartext {
        hash_algos,
        text: lines.join(&b"\n"[..]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffered_reader::Memory;

    #[test]
    fn fixture() {
        let data = std::fs::read(
            crate::path_to("messages/clear.txt.asc")).unwrap();
        let mut reader = Memory::new(&data);
        let c = read(&mut reader).unwrap();
        assert_eq!(c.hash_algos(), &[HashAlgorithm::SHA256]);

        let mut expected = std::fs::read(
            crate::path_to("messages/clear.txt")).unwrap();
        assert_eq!(expected.pop(), Some(b'\n'));
        assert_eq!(c.text(), &expected[..]);
        assert!(reader.buffer().starts_with(SIGNATURE));
    }

    #[test]
    fn defaults_and_escapes() {
        let data = b"\n-----BEGIN PGP SIGNED MESSAGE-----\r\n\
                     \r\n\
                     - -x\r\n\
                     y  \r\n\
                     -----BEGIN PGP SIGNATURE-----\r\n";
        let c = read(&mut Memory::new(&data[..])).unwrap();
        assert_eq!(c.hash_algos(), &[HashAlgorithm::MD5]);
        assert_eq!(c.text(), b"-x\ny  ");

        let mut plain = HashAlgorithm::SHA256.context().unwrap();
        plain.update(b"-x\r\ny");
        assert_eq!(c.hash(HashAlgorithm::SHA256).unwrap().into_digest(),
                   plain.into_digest());
    }

    #[test]
    fn several_hash_headers() {
        let data = b"-----BEGIN PGP SIGNED MESSAGE-----\n\
                     Hash: SHA1, SHA512\n\
                     Hash: FOO\n\
                     \n\
                     text\n\
                     -----BEGIN PGP SIGNATURE-----\n";
        let c = read(&mut Memory::new(&data[..])).unwrap();
        assert_eq!(c.hash_algos(),
                   &[HashAlgorithm::SHA1, HashAlgorithm::SHA512]);
    }

    #[test]
    fn missing_signature() {
        let data = b"-----BEGIN PGP SIGNED MESSAGE-----\n\nabc\n";
        let e = read(&mut Memory::new(&data[..])).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(),
                         Some(Error::MalformedArmor(_))));
    }

    #[test]
    fn escape_then_read() {
        let text = b"-----BEGIN PGP SIGNATURE-----\nfrom\n- x";
        let mut data = b"-----BEGIN PGP SIGNED MESSAGE-----\n\n".to_vec();
        dash_escape(&mut data, text).unwrap();
        data.extend_from_slice(b"\n-----BEGIN PGP SIGNATURE-----\n");
        let c = read(&mut Memory::new(&data)).unwrap();
        assert_eq!(c.text(), &text[..]);
    }
}
