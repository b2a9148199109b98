use std::fmt;

use crate::types::CompressionAlgorithm;

/// Holds a compressed data packet.
///
/// A compressed data packet is a container.  See [Section 5.6 of RFC
/// 4880] for details.
///
/// Normally the parser recurses into the container, and the body is
/// empty.  If the parser did not recurse, e.g. because the algorithm
/// is not supported, the body holds the compressed bytes if the
/// parser was asked to buffer them.
///
/// [Section 5.6 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.6
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CompressedData {
    /// Algorithm used to compress the payload.
    algo: CompressionAlgorithm,
    /// The compressed data.
    body: Vec<u8>,
}

impl fmt::Debug for CompressedData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompressedData")
            .field("algo", &self.algo)
            .field("body", &format!("{} bytes", self.body.len()))
            .finish()
    }
}

impl CompressedData {
    /// Returns a new `CompressedData` packet.
    pub fn new(algo: CompressionAlgorithm) -> Self {
        CompressedData {
            algo,
            body: Vec::new(),
        }
    }

    /// Gets the compression algorithm.
    pub fn algo(&self) -> CompressionAlgorithm {
        self.algo
    }

    /// Gets the compressed body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the compressed body.
    pub fn set_body(&mut self, body: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.body, body)
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }
}
