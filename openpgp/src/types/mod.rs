//! Primitive types.
//!
//! This module provides types used in OpenPGP, like enumerations
//! describing algorithms.

use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::Result;

mod key_flags;
pub use self::key_flags::KeyFlags;
mod timestamp;
pub use self::timestamp::{Timestamp, Duration};

// Defines an enumeration of algorithm identifiers.  Besides the
// listed variants, values 100 to 110 are `Private`, and all others
// `Unknown`, so that every octet converts losslessly.
macro_rules! algorithm_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident ($what:literal) {
            $( $(#[$vattr:meta])* $variant:ident = $value:literal : $display:literal, )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vattr])* $variant, )*
            /// Private or experimental identifier.
            Private(u8),
            /// Unknown identifier.
            Unknown(u8),
        }

        impl From<u8> for $name {
            fn from(u: u8) -> Self {
                match u {
                    $( $value => $name::$variant, )*
                    100..=110 => $name::Private(u),
                    u => $name::Unknown(u),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(a: $name) -> u8 {
                match a {
                    $( $name::$variant => $value, )*
                    $name::Private(u) | $name::Unknown(u) => u,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $( $name::$variant => f.write_str($display), )*
                    $name::Private(u) =>
                        write!(f, "Private/Experimental {} {}", $what, u),
                    $name::Unknown(u) => write!(f, "Unknown {} {}", $what, u),
                }
            }
        }

        #[cfg(test)]
        impl_arbitrary_from_u8!($name);
    };
}

algorithm_enum! {
    /// The public key algorithms, see [Section 9.1 of RFC 4880].
    ///
    ///   [Section 9.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.1
    pub enum PublicKeyAlgorithm ("public key algorithm") {
        /// RSA (Encrypt or Sign)
        RSAEncryptSign = 1: "RSA (Encrypt or Sign)",
        /// RSA Encrypt-Only
        RSAEncrypt = 2: "RSA Encrypt-Only",
        /// RSA Sign-Only
        RSASign = 3: "RSA Sign-Only",
        /// ElGamal (Encrypt-Only)
        ElGamalEncrypt = 16: "ElGamal (Encrypt-Only)",
        /// DSA (Digital Signature Algorithm)
        DSA = 17: "DSA (Digital Signature Algorithm)",
        /// Elliptic curve DH
        ECDH = 18: "ECDH public key algorithm",
        /// Elliptic curve DSA
        ECDSA = 19: "ECDSA public key algorithm",
        /// ElGamal (Encrypt or Sign)
        ElGamalEncryptSign = 20: "ElGamal (Encrypt or Sign)",
        /// Edwards curve DSA
        EdDSA = 22: "EdDSA Edwards-curve Digital Signature Algorithm",
    }
}

impl PublicKeyAlgorithm {
    /// Returns true if the algorithm can sign data.
    pub fn for_signing(&self) -> bool {
        use self::PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSASign | DSA | ECDSA | EdDSA)
    }

    /// Returns true if the algorithm can encrypt data.
    pub fn for_encryption(&self) -> bool {
        use self::PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSAEncrypt | ElGamalEncrypt
                 | ElGamalEncryptSign | ECDH)
    }

    /// Returns whether this algorithm is supported.
    ///
    /// Keys using unsupported algorithms are parsed and can be
    /// stored, but they cannot be used.
    pub fn is_supported(&self) -> bool {
        self.is_rsa() || *self == PublicKeyAlgorithm::DSA
    }

    /// Returns whether this is one of the RSA variants.
    pub fn is_rsa(&self) -> bool {
        use self::PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSAEncrypt | RSASign)
    }
}

algorithm_enum! {
    /// The symmetric-key algorithms, see [Section 9.2 of RFC 4880].
    ///
    /// The default is CAST5.
    ///
    ///   [Section 9.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.2
    pub enum SymmetricAlgorithm ("symmetric key algorithm") {
        /// Null encryption.
        Unencrypted = 0: "Unencrypted",
        /// IDEA block cipher.
        IDEA = 1: "IDEA",
        /// 3-DES in EDE configuration.
        TripleDES = 2: "TripleDES (EDE-DES, 168 bit key derived from 192))",
        /// CAST5/CAST128 block cipher.
        CAST5 = 3: "CAST5 (128 bit key, 16 rounds)",
        /// Blowfish block cipher.
        Blowfish = 4: "Blowfish (128 bit key, 16 rounds)",
        /// 10-round AES.
        AES128 = 7: "AES with 128-bit key",
        /// 12-round AES.
        AES192 = 8: "AES with 192-bit key",
        /// 14-round AES.
        AES256 = 9: "AES with 256-bit key",
        /// Twofish block cipher.
        Twofish = 10: "Twofish with 256-bit key",
    }
}

impl Default for SymmetricAlgorithm {
    fn default() -> Self {
        SymmetricAlgorithm::CAST5
    }
}

impl SymmetricAlgorithm {
    /// Returns whether this algorithm is supported.
    pub fn is_supported(&self) -> bool {
        use self::SymmetricAlgorithm::*;
        matches!(self, CAST5 | AES128 | AES192 | AES256)
    }

    /// Returns the key size in bytes.
    ///
    /// Fails for algorithms without a defined key size.
    pub fn key_size(self) -> Result<usize> {
        use self::SymmetricAlgorithm::*;
        match self {
            IDEA | CAST5 | Blowfish | AES128 => Ok(16),
            TripleDES | AES192 => Ok(24),
            AES256 | Twofish => Ok(32),
            _ => Err(Error::UnsupportedSymmetricAlgorithm(self).into()),
        }
    }

    /// Returns the block size in bytes.
    ///
    /// Fails for algorithms without a defined block size.
    pub fn block_size(self) -> Result<usize> {
        use self::SymmetricAlgorithm::*;
        match self {
            IDEA | TripleDES | CAST5 | Blowfish => Ok(8),
            AES128 | AES192 | AES256 | Twofish => Ok(16),
            _ => Err(Error::UnsupportedSymmetricAlgorithm(self).into()),
        }
    }
}

impl FromStr for SymmetricAlgorithm {
    type Err = anyhow::Error;

    /// Parses the names used in configuration, e.g. `cast5` or
    /// `AES256`.
    fn from_str(s: &str) -> Result<Self> {
        use self::SymmetricAlgorithm::*;
        match s.to_ascii_lowercase().as_str() {
            "cast5" | "cast" => Ok(CAST5),
            "aes" | "aes128" => Ok(AES128),
            "aes192" => Ok(AES192),
            "aes256" => Ok(AES256),
            "idea" => Ok(IDEA),
            "3des" | "tripledes" => Ok(TripleDES),
            "blowfish" => Ok(Blowfish),
            "twofish" => Ok(Twofish),
            _ => Err(Error::InvalidArgument(
                format!("Unknown cipher {:?}", s)).into()),
        }
    }
}

algorithm_enum! {
    /// The compression algorithms, see [Section 9.3 of RFC 4880].
    ///
    ///   [Section 9.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.3
    pub enum CompressionAlgorithm ("compression algorithm") {
        /// No compression.
        Uncompressed = 0: "Uncompressed",
        /// Raw DEFLATE, [RFC 1951].
        ///
        /// [RFC 1951]: https://tools.ietf.org/html/rfc1951
        Zip = 1: "ZIP",
        /// ZLIB, [RFC 1950].
        ///
        /// [RFC 1950]: https://tools.ietf.org/html/rfc1950
        Zlib = 2: "ZLIB",
        /// bzip2.
        BZip2 = 3: "BZip2",
    }
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        CompressionAlgorithm::Uncompressed
    }
}

impl CompressionAlgorithm {
    /// Returns whether this algorithm is supported.
    ///
    /// This depends on the enabled compression features.
    pub fn is_supported(&self) -> bool {
        use self::CompressionAlgorithm::*;
        match self {
            Uncompressed => true,
            #[cfg(feature = "compression-deflate")]
            Zip | Zlib => true,
            #[cfg(feature = "compression-bzip2")]
            BZip2 => true,
            _ => false,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        use self::CompressionAlgorithm::*;
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Uncompressed),
            "zip" => Ok(Zip),
            "zlib" => Ok(Zlib),
            "bzip2" | "bz2" => Ok(BZip2),
            _ => Err(Error::InvalidArgument(
                format!("Unknown compression algorithm {:?}", s)).into()),
        }
    }
}

algorithm_enum! {
    /// The hash algorithms, see [Section 9.4 of RFC 4880].
    ///
    /// The default is SHA256.
    ///
    ///   [Section 9.4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.4
    pub enum HashAlgorithm ("hash algorithm") {
        /// MD5, only for v3 keys and verification.
        MD5 = 1: "MD5",
        /// SHA-1.
        SHA1 = 2: "SHA1",
        /// RIPEMD-160, parsed but not supported.
        RipeMD = 3: "RipeMD160",
        /// SHA2-256.
        SHA256 = 8: "SHA256",
        /// SHA2-384.
        SHA384 = 9: "SHA384",
        /// SHA2-512.
        SHA512 = 10: "SHA512",
        /// SHA2-224.
        SHA224 = 11: "SHA224",
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::SHA256
    }
}

impl HashAlgorithm {
    /// Returns whether this algorithm is supported.
    pub fn is_supported(self) -> bool {
        use self::HashAlgorithm::*;
        matches!(self, MD5 | SHA1 | SHA224 | SHA256 | SHA384 | SHA512)
    }

    /// Returns the size of the digest in bytes.
    pub fn digest_size(self) -> Result<usize> {
        use self::HashAlgorithm::*;
        match self {
            MD5 => Ok(16),
            SHA1 | RipeMD => Ok(20),
            SHA224 => Ok(28),
            SHA256 => Ok(32),
            SHA384 => Ok(48),
            SHA512 => Ok(64),
            _ => Err(Error::UnsupportedHashAlgorithm(self).into()),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    /// Accepts names like `sha256` and `SHA-256`.
    fn from_str(s: &str) -> Result<Self> {
        use self::HashAlgorithm::*;
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "MD5" => Ok(MD5),
            "SHA1" => Ok(SHA1),
            "RIPEMD160" | "RIPEMD" => Ok(RipeMD),
            "SHA224" => Ok(SHA224),
            "SHA256" => Ok(SHA256),
            "SHA384" => Ok(SHA384),
            "SHA512" => Ok(SHA512),
            _ => Err(Error::InvalidArgument(
                format!("Unknown hash algorithm {:?}", s)).into()),
        }
    }
}

algorithm_enum! {
    /// Reason for a revocation, see [Section 5.2.3.23 of RFC 4880].
    ///
    ///   [Section 5.2.3.23 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.23
    pub enum ReasonForRevocation ("revocation reason") {
        /// No reason specified.
        Unspecified = 0: "No reason specified",
        /// The key is superseded.
        KeySuperseded = 1: "Key is superseded",
        /// The key material has been compromised.
        KeyCompromised = 2: "Key material has been compromised",
        /// The key is retired and no longer used.
        KeyRetired = 3: "Key is retired and no longer used",
        /// The user id is no longer valid.
        UIDRetired = 32: "User ID information is no longer valid",
    }
}

/// Signature type as defined in [Section 5.2.1 of RFC 4880].
///
///   [Section 5.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.1
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SignatureType {
    /// Signature over a binary document.
    Binary,
    /// Signature over a canonical text document.
    Text,
    /// Standalone signature.
    Standalone,

    /// Generic certification of a User ID and Public-Key packet.
    GenericCertification,
    /// Persona certification of a User ID and Public-Key packet.
    PersonaCertification,
    /// Casual certification of a User ID and Public-Key packet.
    CasualCertification,
    /// Positive certification of a User ID and Public-Key packet.
    PositiveCertification,

    /// Subkey Binding Signature
    SubkeyBinding,
    /// Primary Key Binding Signature
    PrimaryKeyBinding,
    /// Signature directly on a key
    DirectKey,

    /// Key revocation signature
    KeyRevocation,
    /// Subkey revocation signature
    SubkeyRevocation,
    /// Certification revocation signature
    CertificationRevocation,

    /// Timestamp signature.
    Timestamp,
    /// Third-Party Confirmation signature.
    Confirmation,

    /// Catchall.
    Unknown(u8),
}

impl From<u8> for SignatureType {
    fn from(u: u8) -> Self {
        match u {
            0x00 => SignatureType::Binary,
            0x01 => SignatureType::Text,
            0x02 => SignatureType::Standalone,
            0x10 => SignatureType::GenericCertification,
            0x11 => SignatureType::PersonaCertification,
            0x12 => SignatureType::CasualCertification,
            0x13 => SignatureType::PositiveCertification,
            0x18 => SignatureType::SubkeyBinding,
            0x19 => SignatureType::PrimaryKeyBinding,
            0x1f => SignatureType::DirectKey,
            0x20 => SignatureType::KeyRevocation,
            0x28 => SignatureType::SubkeyRevocation,
            0x30 => SignatureType::CertificationRevocation,
            0x40 => SignatureType::Timestamp,
            0x50 => SignatureType::Confirmation,
            _ => SignatureType::Unknown(u),
        }
    }
}

impl From<SignatureType> for u8 {
    fn from(t: SignatureType) -> Self {
        match t {
            SignatureType::Binary => 0x00,
            SignatureType::Text => 0x01,
            SignatureType::Standalone => 0x02,
            SignatureType::GenericCertification => 0x10,
            SignatureType::PersonaCertification => 0x11,
            SignatureType::CasualCertification => 0x12,
            SignatureType::PositiveCertification => 0x13,
            SignatureType::SubkeyBinding => 0x18,
            SignatureType::PrimaryKeyBinding => 0x19,
            SignatureType::DirectKey => 0x1f,
            SignatureType::KeyRevocation => 0x20,
            SignatureType::SubkeyRevocation => 0x28,
            SignatureType::CertificationRevocation => 0x30,
            SignatureType::Timestamp => 0x40,
            SignatureType::Confirmation => 0x50,
            SignatureType::Unknown(u) => u,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignatureType::Unknown(u) =>
                write!(f, "Unknown signature type 0x{:x}", u),
            t => fmt::Debug::fmt(t, f),
        }
    }
}

impl SignatureType {
    /// Returns whether this is one of the user id certification
    /// types, including certification revocations.
    pub fn is_certification(&self) -> bool {
        use self::SignatureType::*;
        matches!(self, GenericCertification | PersonaCertification
                 | CasualCertification | PositiveCertification
                 | CertificationRevocation)
    }

    /// Returns whether signatures of this type are checked over a
    /// document, as opposed to over key material.
    pub fn is_document(&self) -> bool {
        use self::SignatureType::*;
        matches!(self, Binary | Text | Standalone)
    }

    /// Returns whether signatures of this type can be verified.
    pub fn is_supported(&self) -> bool {
        use self::SignatureType::*;
        ! matches!(self, Timestamp | Confirmation | Unknown(_))
    }
}

/// The format of the contents of a literal data packet.
///
/// See [Section 5.9 of RFC 4880].
///
///   [Section 5.9 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.9
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DataFormat {
    /// Binary data.
    Binary,
    /// Text data.
    Text,
    /// Text data, UTF-8 encoded.
    Unicode,
    /// Unknown format specifier.
    Unknown(char),
}

impl Default for DataFormat {
    fn default() -> Self {
        DataFormat::Binary
    }
}

impl From<u8> for DataFormat {
    fn from(u: u8) -> Self {
        (u as char).into()
    }
}

impl From<char> for DataFormat {
    fn from(c: char) -> Self {
        use self::DataFormat::*;
        match c {
            'b' => Binary,
            't' => Text,
            'u' => Unicode,
            c => Unknown(c),
        }
    }
}

impl From<DataFormat> for u8 {
    fn from(f: DataFormat) -> u8 {
        char::from(f) as u8
    }
}

impl From<DataFormat> for char {
    fn from(f: DataFormat) -> char {
        use self::DataFormat::*;
        match f {
            Binary => 'b',
            Text => 't',
            Unicode => 'u',
            Unknown(c) => c,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::DataFormat::*;
        match *self {
            Binary => f.write_str("Binary data"),
            Text => f.write_str("Text data"),
            Unicode => f.write_str("Text data (UTF-8)"),
            Unknown(c) => write!(f, "Unknown data format identifier {:?}", c),
        }
    }
}

#[cfg(test)]
impl_arbitrary_from_u8!(SignatureType);
#[cfg(test)]
impl_arbitrary_from_u8!(DataFormat);
