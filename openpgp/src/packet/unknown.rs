use std::fmt;

use crate::Tag;

/// Holds an unknown packet.
///
/// This is used by the parser to hold packets that it doesn't know
/// how to process rather than abort: packets with an unassigned tag,
/// and known packets with an unsupported version.
///
/// This packet effectively holds a binary blob.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Unknown {
    /// Packet tag.
    tag: Tag,
    /// The packet's body.
    body: Vec<u8>,
}

impl fmt::Debug for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Unknown")
            .field("tag", &self.tag)
            .field("body", &format!("{} bytes", self.body.len()))
            .finish()
    }
}

impl Unknown {
    /// Returns a new `Unknown` packet.
    pub fn new(tag: Tag, body: Vec<u8>) -> Self {
        Unknown { tag, body }
    }

    /// Gets the unknown packet's tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Gets the unknown packet's body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the unknown packet's body.
    pub fn set_body(&mut self, body: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.body, body)
    }
}
