use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::Fingerprint;
use crate::Result;

/// A short identifier for keys.
///
/// For v4 keys, this is the low 64 bits of the fingerprint.  For v2
/// and v3 RSA keys, it is the low 64 bits of the modulus.  See
/// [Section 12.2 of RFC 4880].
///
/// Since key ids are short, different keys may have the same key id.
/// Lookups by key id may thus return more than one key.
///
///   [Section 12.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-12.2
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct KeyID([u8; 8]);

impl fmt::Display for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("KeyID")
            .field(&self.to_hex())
            .finish()
    }
}

impl From<u64> for KeyID {
    fn from(id: u64) -> Self {
        KeyID(id.to_be_bytes())
    }
}

impl From<KeyID> for u64 {
    fn from(id: KeyID) -> Self {
        u64::from_be_bytes(id.0)
    }
}

impl From<[u8; 8]> for KeyID {
    fn from(id: [u8; 8]) -> Self {
        KeyID(id)
    }
}

impl From<&Fingerprint> for KeyID {
    fn from(fp: &Fingerprint) -> Self {
        fp.to_keyid()
    }
}

impl FromStr for KeyID {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl KeyID {
    /// Reads a binary key ID.
    ///
    /// Fails unless `raw` is exactly eight bytes long.
    pub fn from_bytes(raw: &[u8]) -> Result<KeyID> {
        if raw.len() == 8 {
            let mut keyid = [0u8; 8];
            keyid.copy_from_slice(raw);
            Ok(KeyID(keyid))
        } else {
            Err(Error::InvalidArgument(
                format!("A key id is 8 bytes, got {}", raw.len())).into())
        }
    }

    /// Reads a hex-encoded key ID.
    ///
    /// If a fingerprint is given, it is converted to a key ID.
    pub fn from_hex(hex: &str) -> Result<KeyID> {
        let bytes = crate::fmt::hex::decode_pretty(hex)?;

        if bytes.len() == 8 {
            KeyID::from_bytes(&bytes)
        } else {
            Ok(Fingerprint::from_bytes(&bytes).to_keyid())
        }
    }

    /// Returns the wildcard key ID.
    ///
    /// This is used by PKESK packets to hide the recipient.
    pub fn wildcard() -> Self {
        KeyID([0; 8])
    }

    /// Returns true if this is the wildcard ID.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Returns a reference to the raw key ID.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the low 32 bits, which is what many programs display.
    pub fn short(&self) -> [u8; 4] {
        let mut s = [0u8; 4];
        s.copy_from_slice(&self.0[4..]);
        s
    }

    /// Compares this key ID to `other`, which may be a full key ID
    /// (8 bytes) or a short one (the low 4 bytes).
    pub fn matches(&self, other: &[u8]) -> bool {
        match other.len() {
            8 => &self.0[..] == other,
            4 => &self.0[4..] == other,
            _ => false,
        }
    }

    /// Converts the key ID to upper case hexadecimal.
    pub fn to_hex(&self) -> String {
        crate::fmt::hex::encode(&self.0)
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for KeyID {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        KeyID::from(<u64 as quickcheck::Arbitrary>::arbitrary(g))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn u64_roundtrip(id: u64) -> bool {
        u64::from(KeyID::from(id)) == id
    }

    #[quickcheck]
    fn hex_roundtrip(id: KeyID) -> bool {
        KeyID::from_hex(&id.to_hex()).unwrap() == id
    }

    #[test]
    fn from_hex() {
        assert_eq!(KeyID::from_hex("FB3751F1587DAEF1").unwrap(),
                   KeyID::from(0xFB3751F1587DAEF1));
        assert_eq!(KeyID::from_hex("0xfb3751f1587daef1").unwrap(),
                   KeyID::from(0xFB3751F1587DAEF1));
        assert_eq!(KeyID::from_hex("FB37 51F1 587D AEF1").unwrap(),
                   KeyID::from(0xFB3751F1587DAEF1));
        assert_eq!(KeyID::from_hex("8F17777118A33DDA9BA48E62AACB3243630052D9")
                   .unwrap(),
                   KeyID::from(0xAACB3243630052D9));
        assert!(KeyID::from_hex("FB3751F1587DAEF").is_err());
    }

    #[test]
    fn matching() {
        let id = KeyID::from(0xFB3751F1587DAEF1);
        assert!(id.matches(&[0xFB, 0x37, 0x51, 0xF1, 0x58, 0x7D, 0xAE, 0xF1]));
        assert!(id.matches(&[0x58, 0x7D, 0xAE, 0xF1]));
        assert!(! id.matches(&[0xFB, 0x37, 0x51, 0xF1]));
        assert!(! id.matches(&[0xAE, 0xF1]));
        assert_eq!(id.short(), [0x58, 0x7D, 0xAE, 0xF1]);
    }

    #[test]
    fn wildcard() {
        assert!(KeyID::wildcard().is_wildcard());
        assert!(! KeyID::from(1).is_wildcard());
    }
}
