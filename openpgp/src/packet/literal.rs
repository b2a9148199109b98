use std::fmt;

use crate::types::{DataFormat, Timestamp};
use crate::Error;
use crate::Result;

/// Holds a literal packet.
///
/// A literal packet contains unstructured data.  Since the size can
/// be very large, the parser streams the body; it is only stored in
/// the packet if the parser was asked to buffer it, or when the
/// packet was created for serialization.
///
/// See [Section 5.9 of RFC 4880] for details.
///
///   [Section 5.9 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.9
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct Literal {
    format: DataFormat,
    // Not necessarily UTF-8.
    filename: Vec<u8>,
    // Zero if unset.
    date: Timestamp,
    body: Vec<u8>,
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Only show the start of the body.
        const SHOWN: usize = 36;
        let body = if self.body.len() > SHOWN {
            format!("{}... ({} bytes)",
                    String::from_utf8_lossy(&self.body[..SHOWN]),
                    self.body.len())
        } else {
            format!("{} ({} bytes)",
                    String::from_utf8_lossy(&self.body), self.body.len())
        };

        f.debug_struct("Literal")
            .field("format", &self.format)
            .field("filename", &String::from_utf8_lossy(&self.filename))
            .field("date", &self.date)
            .field("body", &body)
            .finish()
    }
}

impl Literal {
    /// Returns a new `Literal` packet.
    pub fn new(format: DataFormat) -> Literal {
        Literal {
            format,
            filename: Vec::new(),
            date: Timestamp::from(0),
            body: Vec::with_capacity(0),
        }
    }

    /// Gets a reference to the Literal packet's body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the Literal packet's body.
    pub fn set_body(&mut self, data: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.body, data)
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// Gets the Literal packet's content disposition.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Sets the Literal packet's content disposition.
    pub fn set_format(&mut self, format: DataFormat) -> DataFormat {
        std::mem::replace(&mut self.format, format)
    }

    /// Gets the literal packet's filename.
    ///
    /// The metadata is not covered by signatures over the data.
    pub fn filename(&self) -> &[u8] {
        &self.filename
    }

    /// Sets the literal packet's filename field.
    ///
    /// Filenames must not be longer than 255 bytes.
    pub fn set_filename<F>(&mut self, filename: F) -> Result<Vec<u8>>
        where F: AsRef<[u8]>
    {
        let filename = filename.as_ref();
        if filename.len() > 255 {
            return Err(Error::InvalidArgument(
                format!("filename too long: {} bytes", filename.len()))
                       .into());
        }
        Ok(std::mem::replace(&mut self.filename, filename.to_vec()))
    }

    /// Gets the literal packet's date field.
    pub fn date(&self) -> Timestamp {
        self.date
    }

    /// Sets the literal packet's date field.
    pub fn set_date(&mut self, date: Timestamp) -> Timestamp {
        std::mem::replace(&mut self.date, date)
    }

    /// Returns the length of the fields preceding the body.
    pub(crate) fn header_len(&self) -> usize {
        1 + 1 + self.filename.len() + 4
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Literal {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;
        let mut l = Literal::new(DataFormat::arbitrary(g));
        l.set_body(Vec::<u8>::arbitrary(g));
        let mut filename = Vec::<u8>::arbitrary(g);
        filename.truncate(255);
        l.filename = filename;
        l.set_date(Timestamp::arbitrary(g));
        l
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip(p: Literal) -> bool {
        let p = Packet::from(p);
        let q = Packet::from_bytes(&p.to_vec().unwrap()).unwrap();
        p == q
    }

    #[test]
    fn filename_limit() {
        let mut l = Literal::new(DataFormat::Binary);
        assert!(l.set_filename(vec![b'a'; 255]).is_ok());
        assert!(l.set_filename(vec![b'a'; 256]).is_err());
        assert_eq!(l.filename().len(), 255);
    }
}
