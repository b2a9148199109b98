//! Memory protection.

use std::cmp::{min, Ordering};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A buffer holding secret material.
///
/// The buffer is zeroed when dropped, and compared in constant time.
#[derive(Clone, Eq)]
pub struct Protected(Box<[u8]>);

impl PartialEq for Protected {
    fn eq(&self, other: &Self) -> bool {
        secure_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Protected {
    /// Returns a zeroed buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        vec![0u8; len].into()
    }
}

impl Deref for Protected {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Protected {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for Protected {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsMut<[u8]> for Protected {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<Vec<u8>> for Protected {
    fn from(mut v: Vec<u8>) -> Self {
        // `into_boxed_slice` may reallocate, leaving a copy behind.
        let p = Protected(v.as_slice().into());
        unsafe {
            memsec::memzero(v.as_mut_ptr(), v.len());
        }
        p
    }
}

impl From<Box<[u8]>> for Protected {
    fn from(v: Box<[u8]>) -> Self {
        Protected(v)
    }
}

impl From<&[u8]> for Protected {
    fn from(v: &[u8]) -> Self {
        Protected(v.into())
    }
}

impl Drop for Protected {
    fn drop(&mut self) {
        unsafe {
            memsec::memzero(self.0.as_mut_ptr(), self.0.len());
        }
    }
}

impl fmt::Debug for Protected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if cfg!(debug_assertions) {
            write!(f, "{:?}", self.0)
        } else {
            f.write_str("[<Redacted>]")
        }
    }
}

/// Time-constant comparison.
///
/// The running time only depends on the length of the shorter
/// argument.
pub fn secure_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let ord1 = a.len().cmp(&b.len());
    let ord2 = unsafe {
        memsec::memcmp(a.as_ptr(), b.as_ptr(), min(a.len(), b.len()))
    };
    let ord2 = ord2.cmp(&0);

    if ord1 == Ordering::Equal { ord2 } else { ord1 }
}
