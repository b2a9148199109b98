use std::fmt;

/// Holds a Trust packet.
///
/// Trust packets are only used in keyrings, never exported.  The
/// first octet is the trust level, the second, if present, the trust
/// amount.  See [Section 5.10 of RFC 4880] for details.
///
///   [Section 5.10 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.10
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Trust {
    value: Vec<u8>,
}

impl From<Vec<u8>> for Trust {
    fn from(u: Vec<u8>) -> Self {
        Trust { value: u }
    }
}

impl fmt::Debug for Trust {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trust")
            .field("value", &crate::fmt::hex::encode(&self.value))
            .finish()
    }
}

impl Trust {
    /// Creates a trust packet from level and amount.
    pub fn new(level: u8, amount: u8) -> Self {
        Trust { value: vec![level, amount] }
    }

    /// Gets the trust packet's value.
    pub fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    /// Returns the trust level, the first octet.
    pub fn level(&self) -> u8 {
        self.value.get(0).cloned().unwrap_or(0)
    }

    /// Returns the trust amount, the second octet.
    pub fn amount(&self) -> u8 {
        self.value.get(1).cloned().unwrap_or(0)
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Trust {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        <Vec<u8> as quickcheck::Arbitrary>::arbitrary(g).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip(p: Trust) -> bool {
        let p = Packet::from(p);
        let q = Packet::from_bytes(&p.to_vec().unwrap()).unwrap();
        p == q
    }

    #[test]
    fn level_amount() {
        let t = Trust::new(1, 120);
        assert_eq!(t.level(), 1);
        assert_eq!(t.amount(), 120);
        assert_eq!(Trust::from(vec![]).amount(), 0);
    }
}
