use std::io;
use std::path::Path;

use buffered_reader::BufferedReader;

use crate::Result;
use crate::parse::PacketParser;
use crate::parse::PacketParserSettings;
use crate::parse::Cookie;

/// A builder for configuring a `PacketParser`.
///
/// Since the default settings are usually appropriate, this mechanism
/// will only be needed in exceptional circumstances.  Instead use,
/// for instance, `PacketParser::from_file` or
/// `PacketParser::from_reader` to start parsing an OpenPGP message.
pub struct PacketParserBuilder<'a> {
    source: Box<dyn BufferedReader<Cookie> + 'a>,
    settings: PacketParserSettings,
}

impl<'a> PacketParserBuilder<'a> {
    // Creates a `PacketParserBuilder` for an OpenPGP message stored
    // in a `BufferedReader` object.
    pub(crate) fn from_buffered_reader(
        source: Box<dyn BufferedReader<Cookie> + 'a>) -> Self
    {
        PacketParserBuilder {
            source,
            settings: PacketParserSettings::default(),
        }
    }

    /// Creates a `PacketParserBuilder` for an OpenPGP message stored
    /// in a `std::io::Read` object.
    pub fn from_reader<R: io::Read + 'a>(reader: R) -> Result<Self> {
        Ok(Self::from_buffered_reader(Box::new(
            buffered_reader::Generic::with_cookie(
                reader, None, Cookie::default()))))
    }

    /// Creates a `PacketParserBuilder` for an OpenPGP message stored
    /// in the file named `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_buffered_reader(Box::new(
            buffered_reader::File::with_cookie(path, Cookie::default())?)))
    }

    /// Creates a `PacketParserBuilder` for an OpenPGP message stored
    /// in the specified buffer.
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(bytes: &'a D) -> Result<Self> {
        Ok(Self::from_buffered_reader(Box::new(
            buffered_reader::Memory::with_cookie(
                bytes.as_ref(), Cookie::default()))))
    }

    /// Replaces all settings.
    pub fn settings(mut self, settings: PacketParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the maximum recursion depth.
    ///
    /// Setting this to 0 means that the `PacketParser` will never
    /// recurse; it will only parse the top-level packets.
    ///
    /// This is a u8, because recursing more than 255 times makes no
    /// sense.  The default is `MAX_RECURSION_DEPTH`.
    pub fn max_recursion_depth(mut self, value: u8) -> Self {
        self.settings.max_recursion_depth = value;
        self
    }

    /// Sets the maximum size of non-container packets.
    ///
    /// Packets that exceed this limit are skipped and replaced by an
    /// empty `Unknown` packet, and an error is recorded.
    ///
    /// The default is `MAX_PACKET_SIZE`.
    pub fn max_packet_size(mut self, value: u32) -> Self {
        self.settings.max_packet_size = value;
        self
    }

    /// Sets the size of the chunks streamed bodies are handed out in.
    ///
    /// The default is `CHUNK_SIZE`.
    pub fn chunk_size(mut self, value: usize) -> Self {
        self.settings.chunk_size = std::cmp::max(1, value);
        self
    }

    /// Makes unknown critical subpackets errors rather than warnings.
    pub fn strict(mut self, strict: bool) -> Self {
        self.settings.strict = strict;
        self
    }

    /// Causes `PacketParser::next()` to buffer any unread content.
    ///
    /// The content can be accessed using, e.g., `Literal::body`.
    pub fn buffer_unread_content(mut self) -> Self {
        self.settings.buffer_unread_content = true;
        self
    }

    /// Controls whether ASCII armor and cleartext signature framing
    /// are detected and removed.  On by default.
    pub fn dearmor(mut self, dearmor: bool) -> Self {
        self.settings.dearmor = dearmor;
        self
    }

    /// Traces the parser's decisions at the `trace` log level.
    pub fn trace(mut self, trace: bool) -> Self {
        self.settings.trace = trace;
        self
    }

    /// Traces pushes and pops on the reader stack.
    pub fn trace_readers(mut self, trace: bool) -> Self {
        self.settings.trace_readers = trace;
        self
    }

    /// Finishes configuring the `PacketParser` and reads the first
    /// packet.
    pub fn build(self) -> Result<PacketParser<'a>> {
        PacketParser::new(self.source, self.settings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Packet;

    #[test]
    fn settings() {
        let data = b"\xb4\x01x";
        let pp = PacketParserBuilder::from_bytes(&data[..]).unwrap()
            .max_recursion_depth(3)
            .chunk_size(0)
            .strict(true)
            .build().unwrap();
        assert_eq!(pp.settings().max_recursion_depth, 3);
        assert_eq!(pp.settings().chunk_size, 1);
        assert!(pp.settings().strict);
        assert!(matches!(pp.packet(), Some(Packet::UserID(_))));
    }

    #[test]
    fn empty() {
        let pp = PacketParserBuilder::from_bytes(&b""[..]).unwrap()
            .build().unwrap();
        assert!(pp.is_eof());
    }
}
