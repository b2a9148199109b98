//! Multi Precision Integers.
//!
//! An MPI is serialized as a two octet, big-endian bit count followed
//! by the big-endian value, see [Section 3.2 of RFC 4880].  This
//! module also provides the algorithm-specific groupings of MPIs
//! found in key, signature and session key packets.
//!
//!   [Section 3.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3.2

use std::fmt;
use std::io::Write;

use num_bigint_dig::BigUint;

use crate::crypto::hash::{self, Hash};
use crate::crypto::mem::Protected;
use crate::serialize::Marshal;
use crate::Result;

/// Holds a single MPI.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MPI {
    /// Integer value as big-endian, without leading zeros.
    value: Box<[u8]>,
}

impl From<Vec<u8>> for MPI {
    fn from(v: Vec<u8>) -> Self {
        Self::new(&v)
    }
}

impl From<&BigUint> for MPI {
    fn from(v: &BigUint) -> Self {
        Self::new(&v.to_bytes_be())
    }
}

impl MPI {
    /// Creates a new MPI.
    ///
    /// Leading zeros are stripped.
    pub fn new(value: &[u8]) -> Self {
        let offset = value.iter().take_while(|&&b| b == 0).count();
        MPI {
            value: value[offset..].to_vec().into_boxed_slice(),
        }
    }

    /// Returns the length of the integer in bits.
    pub fn bits(&self) -> usize {
        self.value.len() * 8
            - self.value.get(0).map(|&b| b.leading_zeros() as usize)
                .unwrap_or(0)
    }

    /// Returns the value of this MPI as big-endian bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the value left padded with zeros to `to` bytes.
    ///
    /// Fails if the value is longer than `to` bytes.
    pub fn value_padded(&self, to: usize) -> Result<Vec<u8>> {
        if self.value.len() > to {
            return Err(crate::Error::InvalidArgument(
                format!("MPI of {} bytes does not fit in {} bytes",
                        self.value.len(), to)).into());
        }
        let mut v = vec![0u8; to - self.value.len()];
        v.extend_from_slice(&self.value);
        Ok(v)
    }

    /// Returns the value as a big integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.value)
    }
}

impl fmt::Debug for MPI {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bits: {}", self.bits(),
               crate::fmt::hex::encode(&self.value))
    }
}

impl Marshal for MPI {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        o.write_all(&(self.bits() as u16).to_be_bytes())?;
        o.write_all(&self.value)?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        2 + self.value.len()
    }
}

impl Hash for MPI {
    fn hash(&self, hash: &mut hash::Context) {
        hash.update(&(self.bits() as u16).to_be_bytes());
        hash.update(&self.value);
    }
}

/// Holds a single MPI containing secrets.
///
/// The value is cleared when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectedMPI {
    value: Protected,
}

impl From<Vec<u8>> for ProtectedMPI {
    fn from(v: Vec<u8>) -> Self {
        let offset = v.iter().take_while(|&&b| b == 0).count();
        ProtectedMPI { value: (&v[offset..]).into() }
    }
}

impl From<&BigUint> for ProtectedMPI {
    fn from(v: &BigUint) -> Self {
        v.to_bytes_be().into()
    }
}

impl ProtectedMPI {
    /// Returns the length of the integer in bits.
    pub fn bits(&self) -> usize {
        self.value.len() * 8
            - self.value.get(0).map(|&b| b.leading_zeros() as usize)
                .unwrap_or(0)
    }

    /// Returns the value of this MPI as big-endian bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the value as a big integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.value)
    }
}

impl fmt::Debug for ProtectedMPI {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if cfg!(debug_assertions) {
            write!(f, "{} bits: {}", self.bits(),
                   crate::fmt::hex::encode(&self.value[..]))
        } else {
            f.write_str("<Redacted>")
        }
    }
}

impl Marshal for ProtectedMPI {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        o.write_all(&(self.bits() as u16).to_be_bytes())?;
        o.write_all(&self.value)?;
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        2 + self.value.len()
    }
}

/// Holds a public key.
///
/// Provides a typed and structured way of storing multiple MPIs in
/// packets.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PublicKey {
    /// RSA public key.
    RSA {
        /// Public exponent
        e: MPI,
        /// Public modulo N = pq.
        n: MPI,
    },

    /// NIST DSA public key.
    DSA {
        /// Prime of the ring Zp.
        p: MPI,
        /// Order of `g` in Zp.
        q: MPI,
        /// Public generator of Zp.
        g: MPI,
        /// Public key g^x mod p.
        y: MPI,
    },

    /// Elgamal public key.
    Elgamal {
        /// Prime of the ring Zp.
        p: MPI,
        /// Generator of Zp.
        g: MPI,
        /// Public key g^x mod p.
        y: MPI,
    },

    /// Key material for an algorithm that we don't understand.
    Unknown {
        /// The successfully parsed MPIs.
        mpis: Box<[MPI]>,
        /// Any data that failed to parse.
        rest: Box<[u8]>,
    },
}

impl PublicKey {
    /// Returns the size of the key in bits.
    ///
    /// For RSA, this is the size of the modulus, for DSA and Elgamal
    /// the size of the prime.  Unknown keys have zero bits.
    pub fn bits(&self) -> usize {
        use self::PublicKey::*;
        match self {
            RSA { n, .. } => n.bits(),
            DSA { p, .. } => p.bits(),
            Elgamal { p, .. } => p.bits(),
            Unknown { .. } => 0,
        }
    }
}

impl Marshal for PublicKey {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        use self::PublicKey::*;
        match self {
            RSA { e, n } => {
                n.serialize(o)?;
                e.serialize(o)?;
            }
            DSA { p, q, g, y } => {
                p.serialize(o)?;
                q.serialize(o)?;
                g.serialize(o)?;
                y.serialize(o)?;
            }
            Elgamal { p, g, y } => {
                p.serialize(o)?;
                g.serialize(o)?;
                y.serialize(o)?;
            }
            Unknown { mpis, rest } => {
                for mpi in mpis.iter() {
                    mpi.serialize(o)?;
                }
                o.write_all(rest)?;
            }
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        use self::PublicKey::*;
        match self {
            RSA { e, n } => n.serialized_len() + e.serialized_len(),
            DSA { p, q, g, y } =>
                p.serialized_len() + q.serialized_len()
                + g.serialized_len() + y.serialized_len(),
            Elgamal { p, g, y } =>
                p.serialized_len() + g.serialized_len() + y.serialized_len(),
            Unknown { mpis, rest } =>
                mpis.iter().map(|m| m.serialized_len()).sum::<usize>()
                + rest.len(),
        }
    }
}

impl Hash for PublicKey {
    fn hash(&self, hash: &mut hash::Context) {
        // Serializing to a hash context does not fail.
        let _ = self.serialize(hash);
    }
}

/// Holds the secret parts of a key.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretKeyMaterial {
    /// RSA secret key.
    RSA {
        /// Secret exponent, inverse of e in Phi(N).
        d: ProtectedMPI,
        /// Smaller secret prime.
        p: ProtectedMPI,
        /// Larger secret prime.
        q: ProtectedMPI,
        /// Inverse of p mod q.
        u: ProtectedMPI,
    },

    /// NIST DSA secret key.
    DSA {
        /// Secret key log_g(y) in Zp.
        x: ProtectedMPI,
    },

    /// Elgamal secret key.
    Elgamal {
        /// Secret key log_g(y) in Zp.
        x: ProtectedMPI,
    },

    /// Secret key material for an algorithm that we don't understand.
    Unknown {
        /// The successfully parsed MPIs.
        mpis: Box<[ProtectedMPI]>,
        /// Any data that failed to parse.
        rest: Protected,
    },
}

impl fmt::Debug for SecretKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SecretKeyMaterial::RSA { .. } => f.write_str("RSA { <Redacted> }"),
            SecretKeyMaterial::DSA { .. } => f.write_str("DSA { <Redacted> }"),
            SecretKeyMaterial::Elgamal { .. } =>
                f.write_str("Elgamal { <Redacted> }"),
            SecretKeyMaterial::Unknown { .. } =>
                f.write_str("Unknown { <Redacted> }"),
        }
    }
}

impl Marshal for SecretKeyMaterial {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        use self::SecretKeyMaterial::*;
        match self {
            RSA { d, p, q, u } => {
                d.serialize(o)?;
                p.serialize(o)?;
                q.serialize(o)?;
                u.serialize(o)?;
            }
            DSA { x } | Elgamal { x } => x.serialize(o)?,
            Unknown { mpis, rest } => {
                for mpi in mpis.iter() {
                    mpi.serialize(o)?;
                }
                o.write_all(rest)?;
            }
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        use self::SecretKeyMaterial::*;
        match self {
            RSA { d, p, q, u } =>
                d.serialized_len() + p.serialized_len()
                + q.serialized_len() + u.serialized_len(),
            DSA { x } | Elgamal { x } => x.serialized_len(),
            Unknown { mpis, rest } =>
                mpis.iter().map(|m| m.serialized_len()).sum::<usize>()
                + rest.len(),
        }
    }
}

impl SecretKeyMaterial {
    /// Computes the two octet checksum used for S2K usage 0 and 255:
    /// the sum of the serialized MPIs modulo 65536.
    pub fn checksum(&self) -> Result<u16> {
        let mut buf: Protected = Protected::zeroed(self.serialized_len());
        self.serialize(&mut &mut buf[..])?;
        Ok(buf.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16)))
    }
}

/// Holds a public key encrypted session key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ciphertext {
    /// RSA ciphertext.
    RSA {
        ///  m^e mod N.
        c: MPI,
    },

    /// Elgamal ciphertext
    Elgamal {
        /// Ephemeral key.
        e: MPI,
        /// Ciphertext.
        c: MPI,
    },

    /// Ciphertext for an algorithm that we don't understand.
    Unknown {
        /// The successfully parsed MPIs.
        mpis: Box<[MPI]>,
        /// Any data that failed to parse.
        rest: Box<[u8]>,
    },
}

impl Marshal for Ciphertext {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        use self::Ciphertext::*;
        match self {
            RSA { c } => c.serialize(o)?,
            Elgamal { e, c } => {
                e.serialize(o)?;
                c.serialize(o)?;
            }
            Unknown { mpis, rest } => {
                for mpi in mpis.iter() {
                    mpi.serialize(o)?;
                }
                o.write_all(rest)?;
            }
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        use self::Ciphertext::*;
        match self {
            RSA { c } => c.serialized_len(),
            Elgamal { e, c } => e.serialized_len() + c.serialized_len(),
            Unknown { mpis, rest } =>
                mpis.iter().map(|m| m.serialized_len()).sum::<usize>()
                + rest.len(),
        }
    }
}

/// Holds a signature.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Signature {
    /// RSA signature.
    RSA {
        /// Signature m^d mod N.
        s: MPI,
    },

    /// NIST's DSA signature.
    DSA {
        /// `r` value.
        r: MPI,
        /// `s` value.
        s: MPI,
    },

    /// Elgamal signature.
    Elgamal {
        /// `r` value.
        r: MPI,
        /// `s` value.
        s: MPI,
    },

    /// Signature for an algorithm that we don't understand.
    Unknown {
        /// The successfully parsed MPIs.
        mpis: Box<[MPI]>,
        /// Any data that failed to parse.
        rest: Box<[u8]>,
    },
}

impl Marshal for Signature {
    fn serialize(&self, o: &mut dyn Write) -> Result<()> {
        use self::Signature::*;
        match self {
            RSA { s } => s.serialize(o)?,
            DSA { r, s } | Elgamal { r, s } => {
                r.serialize(o)?;
                s.serialize(o)?;
            }
            Unknown { mpis, rest } => {
                for mpi in mpis.iter() {
                    mpi.serialize(o)?;
                }
                o.write_all(rest)?;
            }
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        use self::Signature::*;
        match self {
            RSA { s } => s.serialized_len(),
            DSA { r, s } | Elgamal { r, s } =>
                r.serialized_len() + s.serialized_len(),
            Unknown { mpis, rest } =>
                mpis.iter().map(|m| m.serialized_len()).sum::<usize>()
                + rest.len(),
        }
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for MPI {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        loop {
            let buf = <Vec<u8> as quickcheck::Arbitrary>::arbitrary(g);
            if !buf.is_empty() && buf[0] != 0 {
                break MPI::new(&buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits() {
        assert_eq!(MPI::new(&[]).bits(), 0);
        assert_eq!(MPI::new(&[0, 0, 1]).bits(), 1);
        assert_eq!(MPI::new(&[0x01, 0xff]).bits(), 9);
        assert_eq!(MPI::new(&[0x80, 0x00]).bits(), 16);
        assert_eq!(MPI::new(&[0, 0x80]).value(), &[0x80]);
    }

    #[test]
    fn serialization() {
        let m = MPI::new(&[0x01, 0xff]);
        assert_eq!(m.to_vec().unwrap(), vec![0x00, 0x09, 0x01, 0xff]);
        assert_eq!(m.serialized_len(), 4);
        assert_eq!(m.value_padded(4).unwrap(), vec![0, 0, 0x01, 0xff]);
        assert!(m.value_padded(1).is_err());
    }

    #[test]
    fn checksum() {
        let sk = SecretKeyMaterial::DSA { x: vec![0x01u8, 0x02].into() };
        // 0x00 + 0x09 + 0x01 + 0x02
        assert_eq!(sk.checksum().unwrap(), 0x0c);
    }

    #[test]
    fn biguint() {
        let n = BigUint::from(0x1234u32);
        let m = MPI::from(&n);
        assert_eq!(m.value(), &[0x12, 0x34]);
        assert_eq!(m.to_biguint(), n);
    }
}
