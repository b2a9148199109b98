use std::fmt;

/// Describes how a key may be used.
///
/// This is the content of the key flags subpacket, see [Section
/// 5.2.3.21 of RFC 4880].  The raw bitfield is kept, so that flags
/// that we don't know about survive a round trip.
///
///   [Section 5.2.3.21 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.21
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyFlags(Vec<u8>);

/// This key may be used to certify other keys.
const KEY_FLAG_CERTIFY: u8 = 0x01;

/// This key may be used to sign data.
const KEY_FLAG_SIGN: u8 = 0x02;

/// This key may be used to encrypt communications.
const KEY_FLAG_ENCRYPT_FOR_TRANSPORT: u8 = 0x04;

/// This key may be used to encrypt storage.
const KEY_FLAG_ENCRYPT_AT_REST: u8 = 0x08;

/// The private component of this key may have been split by a
/// secret-sharing mechanism.
const KEY_FLAG_SPLIT_KEY: u8 = 0x10;

/// This key may be used for authentication.
const KEY_FLAG_AUTHENTICATE: u8 = 0x20;

/// The private component of this key may be in the possession of
/// more than one person.
const KEY_FLAG_GROUP_KEY: u8 = 0x80;

impl fmt::Debug for KeyFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.for_certification() {
            f.write_str("C")?;
        }
        if self.for_signing() {
            f.write_str("S")?;
        }
        if self.for_transport_encryption() {
            f.write_str("Et")?;
        }
        if self.for_storage_encryption() {
            f.write_str("Er")?;
        }
        if self.for_authentication() {
            f.write_str("A")?;
        }
        if self.is_split_key() {
            f.write_str("D")?;
        }
        if self.is_group_key() {
            f.write_str("G")?;
        }
        if self.0.len() > 1 {
            write!(f, "+0x{}", crate::fmt::hex::encode(&self.0[1..]))?;
        }
        Ok(())
    }
}

impl KeyFlags {
    /// Creates a new instance from `bits`.
    pub fn new<B: AsRef<[u8]>>(bits: B) -> Self {
        KeyFlags(bits.as_ref().to_vec())
    }

    /// Returns a new `KeyFlags` with all capabilities disabled.
    pub fn empty() -> Self {
        KeyFlags::default()
    }

    /// Returns the raw bitfield.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn get(&self, flag: u8) -> bool {
        self.0.get(0).map(|b| b & flag != 0).unwrap_or(false)
    }

    fn set(mut self, flag: u8, v: bool) -> Self {
        if self.0.is_empty() {
            self.0.push(0);
        }
        if v {
            self.0[0] |= flag;
        } else {
            self.0[0] &= !flag;
        }
        self
    }

    /// This key may be used to certify other keys.
    pub fn for_certification(&self) -> bool {
        self.get(KEY_FLAG_CERTIFY)
    }

    /// Sets whether or not this key may be used to certify other keys.
    pub fn set_certification(self, v: bool) -> Self {
        self.set(KEY_FLAG_CERTIFY, v)
    }

    /// This key may be used to sign data.
    pub fn for_signing(&self) -> bool {
        self.get(KEY_FLAG_SIGN)
    }

    /// Sets whether or not this key may be used to sign data.
    pub fn set_signing(self, v: bool) -> Self {
        self.set(KEY_FLAG_SIGN, v)
    }

    /// This key may be used to encrypt communications.
    pub fn for_transport_encryption(&self) -> bool {
        self.get(KEY_FLAG_ENCRYPT_FOR_TRANSPORT)
    }

    /// Sets whether or not this key may be used to encrypt communications.
    pub fn set_transport_encryption(self, v: bool) -> Self {
        self.set(KEY_FLAG_ENCRYPT_FOR_TRANSPORT, v)
    }

    /// This key may be used to encrypt storage.
    pub fn for_storage_encryption(&self) -> bool {
        self.get(KEY_FLAG_ENCRYPT_AT_REST)
    }

    /// Sets whether or not this key may be used to encrypt storage.
    pub fn set_storage_encryption(self, v: bool) -> Self {
        self.set(KEY_FLAG_ENCRYPT_AT_REST, v)
    }

    /// This key may be used for authentication.
    pub fn for_authentication(&self) -> bool {
        self.get(KEY_FLAG_AUTHENTICATE)
    }

    /// The private component of this key may have been split using a
    /// secret-sharing mechanism.
    pub fn is_split_key(&self) -> bool {
        self.get(KEY_FLAG_SPLIT_KEY)
    }

    /// The private component of this key may be in possession of
    /// more than one person.
    pub fn is_group_key(&self) -> bool {
        self.get(KEY_FLAG_GROUP_KEY)
    }

    /// Returns whether no flag is set.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for KeyFlags {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self::new(<Vec<u8> as quickcheck::Arbitrary>::arbitrary(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip(val: KeyFlags) -> bool {
        let q = KeyFlags::new(val.as_bytes());
        assert_eq!(val, q);
        true
    }

    #[test]
    fn setters() {
        let f = KeyFlags::empty().set_signing(true).set_certification(true);
        assert_eq!(f.as_bytes(), &[0x03]);
        assert!(f.for_signing() && f.for_certification());
        assert!(! f.for_transport_encryption());

        let f = f.set_signing(false);
        assert_eq!(format!("{:?}", f), "C");
        assert!(KeyFlags::new(&[0, 0]).is_empty());

        let f = KeyFlags::new(&[0x0c, 0x04]);
        assert_eq!(format!("{:?}", f), "EtEr+0x04");
    }
}
