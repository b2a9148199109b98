//! An OpenPGP message engine.
//!
//! This crate implements the parts of [RFC 4880] needed to read and
//! write OpenPGP messages and keys: a streaming packet parser, a key
//! material model with keyrings, a signature engine, and writer
//! stacks that produce armored, compressed, encrypted and signed
//! messages.
//!
//! The supported algorithms are RSA and DSA for public key
//! operations, CAST5 and AES for symmetric encryption, MD5 (for v3
//! keys and verification only), SHA-1 and the SHA-2 family for
//! hashing, and ZIP, ZLIB and BZip2 compression.  Elgamal keys are
//! parsed and carried along, but cannot be used.
//!
//! Reading is organized around [`buffered_reader::Stack`]: each
//! layer of a message (armor, decryption, decompression, partial
//! body lengths, hashing) is a filter pushed onto the stack while
//! the layer is being read, and popped when it is done.  The
//! [`parse::PacketParser`] drives this, and the [`parse::parse`]
//! function hands the resulting packets to a callback.  On the
//! writing side, [`serialize::writer::Stack`] plays the same role.
//!
//! Most applications want the [`Context`], which ties keyrings,
//! configuration and error reporting together.
//!
//! [RFC 4880]: https://tools.ietf.org/html/rfc4880

#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod fmt;

pub mod armor;
pub mod cleartext;
pub mod crypto;

pub mod packet;
pub use packet::Packet;

pub mod parse;
pub mod serialize;
pub mod types;

mod tag;
pub use tag::Tag;
mod keyid;
pub use keyid::KeyID;
mod fingerprint;
pub use fingerprint::Fingerprint;

pub mod keyring;
pub mod verify;

mod context;
pub use context::{
    Config,
    Context,
    LogConfig,
    SignMode,
};

use std::fmt as stdfmt;

use crate::types::{
    CompressionAlgorithm,
    HashAlgorithm,
    PublicKeyAlgorithm,
    SignatureType,
    SymmetricAlgorithm,
};

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors used in this crate.
///
/// Functions return an `anyhow::Error`; where the condition is
/// interesting to the caller, it is one of these and can be
/// recovered using `downcast_ref`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A malformed packet.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// A malformed MPI.
    #[error("Malformed MPI: {0}")]
    MalformedMPI(String),

    /// A packet's body is longer than its enclosing container.
    #[error("Region overrun: {0}")]
    RegionOverrun(String),

    /// Unknown or reserved packet tag.
    #[error("Unknown packet type: {0}")]
    UnknownPacketTag(Tag),

    /// The sequence of packets does not form a valid message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Malformed ASCII armor.
    #[error("Malformed armor: {0}")]
    MalformedArmor(String),

    /// The armor checksum does not match.
    #[error("Armor checksum mismatch: expected {expected:06X}, \
             computed {computed:06X}")]
    ChecksumMismatch {
        /// The checksum from the armor trailer.
        expected: u32,
        /// The checksum of the decoded data.
        computed: u32,
    },

    /// A critical subpacket that we don't understand.
    #[error("Unknown critical subpacket: {0}")]
    UnknownCriticalSubpacket(u8),

    /// A second primary user id marker.
    #[error("Duplicate primary user id marker")]
    DuplicatePrimaryUserID,

    /// A bad string-to-key specifier.
    #[error("Bad S2K specifier: {0}")]
    BadS2K(String),

    /// Unsupported hash algorithm.
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(HashAlgorithm),

    /// Unsupported public key algorithm.
    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedPublicKeyAlgorithm(PublicKeyAlgorithm),

    /// Unsupported symmetric algorithm.
    #[error("Unsupported symmetric algorithm: {0}")]
    UnsupportedSymmetricAlgorithm(SymmetricAlgorithm),

    /// Unsupported compression algorithm.
    #[error("Unsupported compression algorithm: {0}")]
    UnsupportedCompressionAlgorithm(CompressionAlgorithm),

    /// Unsupported signature type.
    #[error("Unsupported signature type: {0}")]
    UnsupportedSignatureType(SignatureType),

    /// The session key failed the quick check.
    #[error("Invalid session key: {0}")]
    InvalidSessionKey(String),

    /// The modification detection code does not match.
    #[error("Message has been manipulated")]
    ManipulatedMessage,

    /// Wrong passphrase.
    #[error("Invalid password")]
    InvalidPassword,

    /// No session key could be recovered.
    #[error("Missing session key: {0}")]
    MissingSessionKey(String),

    /// The secret key needed for an operation is not available.
    #[error("Missing secret key: {0}")]
    MissingSecretKey(String),

    /// A low-level signature check failed.
    #[error("Bad signature: {0}")]
    BadSignature(String),
}

/// How bad a recorded error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation went on.
    Warning,
    /// The operation went on, but the result is incomplete.
    Error,
}

impl stdfmt::Display for Severity {
    fn fmt(&self, f: &mut stdfmt::Formatter) -> stdfmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Collects recoverable errors.
///
/// Fatal conditions are returned as `Err`.  Anomalies that an
/// operation can work around, like an unknown packet with a valid
/// header, are pushed here instead, so that the caller can report
/// them once the operation is done.
#[derive(Debug, Default)]
pub struct ErrorStack {
    entries: Vec<(Severity, anyhow::Error)>,
}

impl ErrorStack {
    /// Returns an empty stack.
    pub fn new() -> Self {
        Default::default()
    }

    /// Records an error.
    pub fn push<E: Into<anyhow::Error>>(&mut self, severity: Severity, e: E) {
        let e = e.into();
        match severity {
            Severity::Warning => log::warn!("{}", e),
            Severity::Error => log::error!("{}", e),
        }
        self.entries.push((severity, e));
    }

    /// Records a warning.
    pub fn warn<E: Into<anyhow::Error>>(&mut self, e: E) {
        self.push(Severity::Warning, e)
    }

    /// Records an error.
    pub fn error<E: Into<anyhow::Error>>(&mut self, e: E) {
        self.push(Severity::Error, e)
    }

    /// Returns the number of recorded errors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether an entry of severity `Error` was recorded.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(s, _)| *s == Severity::Error)
    }

    /// Iterates over the recorded errors, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(Severity, anyhow::Error)> {
        self.entries.iter()
    }

    /// Returns whether an entry downcasts to `e`.
    pub fn contains(&self, e: &Error) -> bool {
        self.entries.iter()
            .any(|(_, x)| x.downcast_ref::<Error>() == Some(e))
    }

    /// Moves the entries of `other` to the end of this stack.
    pub fn append(&mut self, other: &mut ErrorStack) {
        self.entries.append(&mut other.entries);
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl stdfmt::Display for ErrorStack {
    fn fmt(&self, f: &mut stdfmt::Formatter) -> stdfmt::Result {
        for (severity, e) in self.entries.iter() {
            write!(f, "{}: {}", severity, e)?;
            for cause in e.chain().skip(1) {
                write!(f, ": {}", cause)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn path_to(artifact: &str) -> std::path::PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data", artifact]
        .iter().collect()
}
