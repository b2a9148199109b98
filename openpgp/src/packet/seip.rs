//! Encrypted data packets.
//!
//! An encrypted data packet is a container.  See [Section 5.7] and
//! [Section 5.13 of RFC 4880] for details.
//!
//! [Section 5.7]: https://tools.ietf.org/html/rfc4880#section-5.7
//! [Section 5.13 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.13

use std::fmt;

use crate::crypto::hash;
use crate::crypto::mem;

/// Holds a symmetrically encrypted integrity protected data packet.
///
/// The body is the ciphertext.  Like with [`CompressedData`], it is
/// only set if the parser was asked to buffer it, or the packet was
/// created for serialization.
///
///   [`CompressedData`]: struct.CompressedData.html
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SEIP {
    /// The packet version, 1 is the only one defined.
    version: u8,
    body: Vec<u8>,
}

impl fmt::Debug for SEIP {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SEIP")
            .field("version", &self.version)
            .field("body", &format!("{} bytes", self.body.len()))
            .finish()
    }
}

impl Default for SEIP {
    fn default() -> Self {
        SEIP {
            version: 1,
            body: Vec::new(),
        }
    }
}

impl SEIP {
    /// Gets the version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Gets the encrypted body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the encrypted body.
    pub fn set_body(&mut self, body: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.body, body)
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }
}

/// Holds a symmetrically encrypted data packet.
///
/// This is the legacy packet without integrity protection.  It is
/// read, but never written.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SED {
    body: Vec<u8>,
}

impl fmt::Debug for SED {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SED")
            .field("body", &format!("{} bytes", self.body.len()))
            .finish()
    }
}

impl SED {
    /// Gets the encrypted body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the encrypted body.
    pub fn set_body(&mut self, body: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.body, body)
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }
}

/// Holds a modification detection code packet.
///
/// The MDC is the SHA-1 digest over the plaintext of a SEIP packet,
/// including the random prefix and the MDC packet's own header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MDC {
    digest: [u8; 20],
}

impl From<[u8; 20]> for MDC {
    fn from(digest: [u8; 20]) -> Self {
        MDC { digest }
    }
}

impl From<hash::Context> for MDC {
    fn from(ctx: hash::Context) -> Self {
        let mut digest = [0u8; 20];
        let d = ctx.into_digest();
        let n = std::cmp::min(d.len(), 20);
        digest[..n].copy_from_slice(&d[..n]);
        MDC { digest }
    }
}

impl MDC {
    /// Gets the digest.
    pub fn digest(&self) -> &[u8] {
        &self.digest[..]
    }

    /// Returns whether `computed` matches the digest.
    ///
    /// The comparison is done in constant time.
    pub fn matches(&self, computed: &[u8]) -> bool {
        mem::secure_cmp(&self.digest[..], computed)
            == std::cmp::Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashAlgorithm;

    #[test]
    fn mdc() {
        let mut ctx = HashAlgorithm::SHA1.context().unwrap();
        ctx.update(b"plaintext");
        let mdc = MDC::from(ctx.clone());
        assert!(mdc.matches(&ctx.digest()));
        assert!(! mdc.matches(&[0u8; 20]));
        assert!(! mdc.matches(&[0u8; 19]));
    }
}
