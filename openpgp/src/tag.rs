use std::fmt;

// One row per assigned tag: the variant, its value on the wire, and
// the name RFC 4880 gives it.
macro_rules! tags {
    ( $( $variant:ident = $value:literal : $name:literal, )* ) => {
        /// The OpenPGP packet tags as defined in [Section 4.3 of RFC 4880].
        ///
        ///   [Section 4.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.3
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Tag {
            $(
                #[doc = $name]
                $variant,
            )*
            /// Unassigned tags.
            Unknown(u8),
            /// Tags 60 to 63, for private or experimental use.
            Private(u8),
        }

        impl From<u8> for Tag {
            fn from(u: u8) -> Self {
                match u {
                    $( $value => Tag::$variant, )*
                    60..=63 => Tag::Private(u),
                    _ => Tag::Unknown(u),
                }
            }
        }

        impl From<Tag> for u8 {
            fn from(t: Tag) -> u8 {
                match t {
                    $( Tag::$variant => $value, )*
                    Tag::Private(u) | Tag::Unknown(u) => u,
                }
            }
        }

        impl Tag {
            fn name(&self) -> Option<&'static str> {
                match self {
                    $( Tag::$variant => Some($name), )*
                    Tag::Private(_) | Tag::Unknown(_) => None,
                }
            }
        }
    };
}

tags! {
    Reserved = 0: "Reserved - a packet tag MUST NOT have this value",
    PKESK = 1: "Public-Key Encrypted Session Key Packet",
    Signature = 2: "Signature Packet",
    SKESK = 3: "Symmetric-Key Encrypted Session Key Packet",
    OnePassSig = 4: "One-Pass Signature Packet",
    SecretKey = 5: "Secret-Key Packet",
    PublicKey = 6: "Public-Key Packet",
    SecretSubkey = 7: "Secret-Subkey Packet",
    CompressedData = 8: "Compressed Data Packet",
    SED = 9: "Symmetrically Encrypted Data Packet",
    Marker = 10: "Marker Packet",
    Literal = 11: "Literal Data Packet",
    Trust = 12: "Trust Packet",
    UserID = 13: "User ID Packet",
    PublicSubkey = 14: "Public-Subkey Packet",
    UserAttribute = 17: "User Attribute Packet",
    SEIP = 18: "Sym. Encrypted and Integrity Protected Data Packet",
    MDC = 19: "Modification Detection Code Packet",
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, Tag::Private(u)) =>
                write!(f, "Private/Experimental Packet {}", u),
            (None, t) => write!(f, "Unknown Packet {}", u8::from(*t)),
        }
    }
}

impl Tag {
    /// Returns whether old-format packet headers can express this
    /// tag.
    ///
    /// Old-format headers have four bits for the tag.
    pub fn fits_old_format(&self) -> bool {
        u8::from(*self) < 16
    }

    /// Returns whether packets with this tag contain other packets.
    pub fn is_container(&self) -> bool {
        matches!(self, Tag::CompressedData | Tag::SED | Tag::SEIP)
    }

    /// Returns whether this is one of the key packet tags.
    pub fn is_key(&self) -> bool {
        matches!(self, Tag::PublicKey | Tag::PublicSubkey
                 | Tag::SecretKey | Tag::SecretSubkey)
    }
}

#[cfg(test)]
impl_arbitrary_from_u8!(Tag);

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip(tag: Tag) -> bool {
        let val: u8 = tag.into();
        tag == Tag::from(val)
    }

    #[quickcheck]
    fn unknown_private(tag: Tag) -> bool {
        match tag {
            Tag::Unknown(u) => u > 19 || u == 15 || u == 16,
            Tag::Private(u) => (60..=63).contains(&u),
            _ => true
        }
    }

    #[test]
    fn display() {
        assert_eq!(Tag::Trust.to_string(), "Trust Packet");
        assert_eq!(Tag::from(61).to_string(), "Private/Experimental Packet 61");
        assert_eq!(Tag::from(42).to_string(), "Unknown Packet 42");
    }

    #[test]
    fn old_format() {
        assert!(Tag::Trust.fits_old_format());
        assert!(Tag::PublicSubkey.fits_old_format());
        assert!(! Tag::UserAttribute.fits_old_format());
        assert!(! Tag::SEIP.fits_old_format());
    }
}
