use std::fmt;

use crate::crypto::hash;

/// Holds a UserAttribute packet.
///
/// A user attribute is a sequence of subpackets, typically a photo
/// id.  It is certified like a user ID, but its content is opaque to
/// us.  See [Section 5.12 of RFC 4880] for details.
///
///   [Section 5.12 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.12
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UserAttribute {
    value: Vec<u8>,
}

impl From<Vec<u8>> for UserAttribute {
    fn from(u: Vec<u8>) -> Self {
        UserAttribute { value: u }
    }
}

impl fmt::Debug for UserAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UserAttribute")
            .field("value", &format!("{} bytes", self.value.len()))
            .finish()
    }
}

impl UserAttribute {
    /// Gets the user attribute packet's raw, unparsed value.
    pub fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    /// Returns the types of the attribute's subpackets.
    ///
    /// Type 1 is an image.  Parsing stops at the first malformed
    /// subpacket.
    pub fn subpacket_types(&self) -> Vec<u8> {
        let mut types = Vec::new();
        let mut rest = &self.value[..];
        while ! rest.is_empty() {
            let (len, header) = match rest[0] {
                l @ 0..=191 => (l as usize, 1),
                192..=254 if rest.len() >= 2 =>
                    ((((rest[0] as usize) - 192) << 8) + rest[1] as usize + 192,
                     2),
                255 if rest.len() >= 5 =>
                    (u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]])
                     as usize, 5),
                _ => break,
            };
            if len == 0 || rest.len() < header + len {
                break;
            }
            types.push(rest[header]);
            rest = &rest[header + len..];
        }
        types
    }
}

impl hash::Hash for UserAttribute {
    /// Hashes the attribute the way v4 signatures do.
    fn hash(&self, hash: &mut hash::Context) {
        let mut header = [0xd1u8; 5];
        header[1..].copy_from_slice(&(self.value.len() as u32).to_be_bytes());
        hash.update(&header);
        hash.update(&self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpacket_types() {
        // An image subpacket with a four byte body followed by an
        // unknown subpacket.
        let ua = UserAttribute::from(
            vec![5, 1, 0x10, 0x00, 0x01, 0x01, 2, 100, 0xaa]);
        assert_eq!(ua.subpacket_types(), vec![1, 100]);

        // Truncated.
        let ua = UserAttribute::from(vec![5, 1, 0x10]);
        assert!(ua.subpacket_types().is_empty());
    }
}
