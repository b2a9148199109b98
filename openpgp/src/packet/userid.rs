use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::crypto::hash;

/// Holds a UserID packet.
///
/// According to [RFC 4880], the text is by convention UTF-8 encoded
/// and in "mail name-addr" form, i.e., "Name (Comment)
/// <email@example.com>".  The value is kept as bytes, since there is
/// no guarantee that it is valid UTF-8.
///
///   [RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.11
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserID {
    value: Vec<u8>,
}

impl From<Vec<u8>> for UserID {
    fn from(u: Vec<u8>) -> Self {
        UserID { value: u }
    }
}

impl From<&[u8]> for UserID {
    fn from(u: &[u8]) -> Self {
        u.to_vec().into()
    }
}

impl<'a> From<&'a str> for UserID {
    fn from(u: &'a str) -> Self {
        u.as_bytes().into()
    }
}

impl From<String> for UserID {
    fn from(u: String) -> Self {
        u.into_bytes().into()
    }
}

impl fmt::Display for UserID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let userid = String::from_utf8_lossy(&self.value[..]);
        write!(f, "{}", userid)
    }
}

impl fmt::Debug for UserID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let userid = String::from_utf8_lossy(&self.value[..]);

        f.debug_struct("UserID")
            .field("value", &userid)
            .finish()
    }
}

lazy_static! {
    // "Name (Comment) <address>", every part optional.
    static ref NAME_ADDR: Regex = Regex::new(
        r"^\s*([^<(]*?)?\s*(?:\(([^)]*)\))?\s*(?:<([^>]*)>)?\s*$")
        .expect("valid regex");
}

impl UserID {
    /// Gets the user ID packet's value.
    pub fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    fn component(&self, i: usize) -> Option<String> {
        let s = std::str::from_utf8(&self.value).ok()?;
        NAME_ADDR.captures(s)?
            .get(i)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| ! s.is_empty())
    }

    /// Returns the name, i.e. everything before the comment and the
    /// address.
    pub fn name(&self) -> Option<String> {
        self.component(1)
    }

    /// Returns the comment, which is the part in parentheses.
    pub fn comment(&self) -> Option<String> {
        self.component(2)
    }

    /// Returns the address, which is the part in angle brackets.
    ///
    /// If the user ID consists of nothing but something that looks
    /// like an address, that is returned.
    pub fn email(&self) -> Option<String> {
        self.component(3).or_else(|| {
            let s = std::str::from_utf8(&self.value).ok()?.trim();
            if s.contains('@') && ! s.contains(char::is_whitespace) {
                Some(s.to_string())
            } else {
                None
            }
        })
    }
}

impl hash::Hash for UserID {
    /// Hashes the user ID the way v4 signatures do.
    ///
    /// V3 signatures hash only the value.
    fn hash(&self, hash: &mut hash::Context) {
        let mut header = [0xb4u8; 5];
        header[1..].copy_from_slice(&(self.value.len() as u32).to_be_bytes());
        hash.update(&header);
        hash.update(&self.value);
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for UserID {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        <String as quickcheck::Arbitrary>::arbitrary(g).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Hash as _;
    use crate::Packet;
    use crate::parse::Parse;
    use crate::serialize::Marshal;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip(p: UserID) -> bool {
        let p = Packet::from(p);
        let q = Packet::from_bytes(&p.to_vec().unwrap()).unwrap();
        p == q
    }

    #[test]
    fn components() {
        let u = UserID::from("Alice Lovelace (work) <alice@example.org>");
        assert_eq!(u.name().as_deref(), Some("Alice Lovelace"));
        assert_eq!(u.comment().as_deref(), Some("work"));
        assert_eq!(u.email().as_deref(), Some("alice@example.org"));

        let u = UserID::from("Bob <bob@example.org>");
        assert_eq!(u.name().as_deref(), Some("Bob"));
        assert_eq!(u.comment(), None);
        assert_eq!(u.email().as_deref(), Some("bob@example.org"));

        let u = UserID::from("carol@example.org");
        assert_eq!(u.email().as_deref(), Some("carol@example.org"));

        let u = UserID::from(vec![0xff, 0xfe]);
        assert_eq!(u.name(), None);
        assert_eq!(u.email(), None);
    }

    #[test]
    fn hash_header() {
        let u = UserID::from("abc");
        let mut a = crate::types::HashAlgorithm::SHA1.context().unwrap();
        u.hash(&mut a);
        let mut b = crate::types::HashAlgorithm::SHA1.context().unwrap();
        b.update(&[0xb4, 0, 0, 0, 3, b'a', b'b', b'c']);
        assert_eq!(a.digest(), b.digest());
    }
}
