use std::fmt;
use std::str::FromStr;

use crate::KeyID;
use crate::Result;

/// A long identifier for keys.
///
/// A *v4* fingerprint is a SHA-1 hash over the key's public key
/// packet, a *v3* fingerprint is an MD5 hash over the RSA modulus and
/// exponent.  See [Section 12.2 of RFC 4880].
///
///   [Section 12.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-12.2
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub enum Fingerprint {
    /// 20 byte SHA-1 hash.
    V4([u8; 20]),
    /// 16 byte MD5 hash of a v2 or v3 key.
    V3([u8; 16]),
    /// Used for holding fingerprints that have the wrong length.
    Invalid(Box<[u8]>),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_spaced_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Fingerprint")
            .field(&self.to_hex())
            .finish()
    }
}

impl FromStr for Fingerprint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Fingerprint {
    /// Reads a binary fingerprint.
    ///
    /// The length determines the version.
    pub fn from_bytes(raw: &[u8]) -> Fingerprint {
        match raw.len() {
            20 => {
                let mut fp = [0u8; 20];
                fp.copy_from_slice(raw);
                Fingerprint::V4(fp)
            }
            16 => {
                let mut fp = [0u8; 16];
                fp.copy_from_slice(raw);
                Fingerprint::V3(fp)
            }
            _ => Fingerprint::Invalid(raw.to_vec().into_boxed_slice()),
        }
    }

    /// Reads a hexadecimal fingerprint.
    ///
    /// Whitespace is ignored.
    pub fn from_hex(hex: &str) -> Result<Fingerprint> {
        Ok(Fingerprint::from_bytes(&crate::fmt::hex::decode_pretty(hex)?))
    }

    /// Returns a reference to the raw fingerprint.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Fingerprint::V4(fp) => fp,
            Fingerprint::V3(fp) => fp,
            Fingerprint::Invalid(fp) => fp,
        }
    }

    /// Converts the fingerprint to a hexadecimal number.
    pub fn to_hex(&self) -> String {
        crate::fmt::hex::encode(self.as_bytes())
    }

    /// Converts the fingerprint to the format used for display: the
    /// digits are grouped in blocks of four, and a v4 fingerprint is
    /// split in two halves by an extra space.
    pub fn to_spaced_hex(&self) -> String {
        let hex = crate::fmt::hex::encode_pretty(self.as_bytes());
        match self {
            Fingerprint::V4(_) => {
                // "XXXX XXXX XXXX XXXX XXXX" is 24 characters.
                let (a, b) = hex.split_at(24);
                format!("{} {}", a, b)
            }
            _ => hex,
        }
    }

    /// Converts the fingerprint to a key ID.
    ///
    /// For v4 fingerprints, this is the low 8 bytes.  The key ID of
    /// a v3 key cannot be derived from its fingerprint; use
    /// `Key::keyid` instead.  For those, and for invalid
    /// fingerprints, the low 8 bytes are used regardless, padded
    /// with zeros if necessary.
    pub fn to_keyid(&self) -> KeyID {
        let raw = self.as_bytes();
        let mut id = [0u8; 8];
        let n = std::cmp::min(8, raw.len());
        id[8 - n..].copy_from_slice(&raw[raw.len() - n..]);
        KeyID::from(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_formatting() {
        let fp = Fingerprint::from_hex(
            "3E8877C877274692975189F5D03F6F865226FE8B").unwrap();
        assert_eq!(fp.to_hex(), "3E8877C877274692975189F5D03F6F865226FE8B");
        assert_eq!(fp.to_string(),
                   "3E88 77C8 7727 4692 9751  89F5 D03F 6F86 5226 FE8B");
        assert_eq!(Fingerprint::from_hex(&fp.to_string()).unwrap(), fp);
        assert_eq!(fp.to_keyid(), KeyID::from(0xD03F6F865226FE8B));
    }

    #[test]
    fn versions() {
        match Fingerprint::from_bytes(&[0u8; 16]) {
            Fingerprint::V3(_) => (),
            fp => panic!("expected a v3 fingerprint, got {:?}", fp),
        }
        match Fingerprint::from_bytes(&[1u8; 3]) {
            Fingerprint::Invalid(_) => (),
            fp => panic!("expected an invalid fingerprint, got {:?}", fp),
        }
        assert_eq!(Fingerprint::from_bytes(&[1, 2, 3]).to_keyid(),
                   KeyID::from(0x010203));
    }
}
