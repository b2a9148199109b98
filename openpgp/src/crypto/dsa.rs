//! The Digital Signature Algorithm, see [FIPS 186-4].
//!
//!   [FIPS 186-4]: https://nvlpubs.nist.gov/nistpubs/FIPS/NIST.FIPS.186-4.pdf

use num_bigint_dig::{BigUint, RandBigInt};

use crate::Error;
use crate::Result;

/// Converts the digest to an integer, keeping only the leftmost
/// bits if it is longer than `q`.
fn digest_to_int(q: &BigUint, digest: &[u8]) -> BigUint {
    let qbits = q.bits();
    let h = BigUint::from_bytes_be(digest);
    if digest.len() * 8 > qbits {
        h >> (digest.len() * 8 - qbits)
    } else {
        h
    }
}

fn is_zero(a: &BigUint) -> bool {
    a.bits() == 0
}

// Inverse in the prime field Zq.
fn inverse(a: &BigUint, q: &BigUint) -> BigUint {
    a.modpow(&(q - 2u32), q)
}

/// Signs `digest` with the secret key `x`, returning `(r, s)`.
pub(crate) fn sign(p: &BigUint, q: &BigUint, g: &BigUint, x: &BigUint,
                   digest: &[u8])
                   -> Result<(BigUint, BigUint)> {
    if is_zero(q) || is_zero(p) {
        return Err(Error::InvalidArgument("Degenerate DSA key".into()).into());
    }

    let h = digest_to_int(q, digest);
    let mut rng = rand::rngs::OsRng;
    let one = BigUint::from(1u32);

    loop {
        let k = rng.gen_biguint_range(&one, q);
        let r = g.modpow(&k, p) % q;
        if is_zero(&r) {
            continue;
        }
        let s = (inverse(&k, q) * ((&h + x * &r) % q)) % q;
        if is_zero(&s) {
            continue;
        }
        return Ok((r, s));
    }
}

/// Verifies the signature `(r, s)` over `digest`.
pub(crate) fn verify(p: &BigUint, q: &BigUint, g: &BigUint, y: &BigUint,
                     digest: &[u8], r: &BigUint, s: &BigUint)
                     -> bool {
    if is_zero(q) || is_zero(p) {
        return false;
    }
    if is_zero(r) || r >= q || is_zero(s) || s >= q {
        return false;
    }

    let h = digest_to_int(q, digest);
    let w = inverse(s, q);
    let u1 = (h * &w) % q;
    let u2 = (r * &w) % q;
    let v = ((g.modpow(&u1, p) * y.modpow(&u2, p)) % p) % q;
    &v == r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(hex: &str) -> BigUint {
        BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
    }

    struct Key {
        p: BigUint,
        q: BigUint,
        g: BigUint,
        y: BigUint,
        x: BigUint,
    }

    fn key() -> Key {
        Key {
            p: int("fc68f366bd07ef1e95ceb363112ee9bbdd225856a6f128cee9f738257bb6f185\
                    499b13d22484b6efe5a2a51da779d2fb265b9341edfcaadb38f62072ab59d8e7\
                    6d922ae4d9b624e8cafd675760a98312921c47cc28cfc5eba2f868e79651b95e\
                    ff26cb375ee20b98e37d9fb27d533de09cfff667ebe92d509d5650f19a4eb1ad"),
            q: int("ef4a24fa9d685bc5d56408c3583144216f281ea3"),
            g: int("d7fe02e564bc34ed9104e18667fb6ffae8c19283ceddc10a009ea51e0702361c\
                    33c2df4631976dbae7e2ed187cd5cb745f0de8f5aafedddabd16ba05ac48114c\
                    244bb9e8a788b9aaf097148017367b73fd13313e2706d61c6584e32b42aa093b\
                    85b58324d073d6dccdb669fd6d067c847090d1cb7f3b342fa41ad57e74ca7232"),
            y: int("4c98edbc72db35ef3cba7faa23dcd77c60f47ab03bc21cf3847a55337ac5d388\
                    dec3da4205d63eabecd335e5bb079e82605ed8abbcfecf8aefc6be291e9fd401\
                    8045406ec9a1cc27acbc6252c03ddf83655d70eac390c812fcdded265c8e903b\
                    0407075e11c79dc957174c41978a1cd341938b9cbd4e8e296e15848c4777492"),
            x: int("803040721c4ed7bb5d34e27161fb68dda5c4be32"),
        }
    }

    // SHA-256("hello world").
    const DIGEST: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn verify_known_signature() {
        let k = key();
        let digest = crate::fmt::hex::decode(DIGEST).unwrap();
        let r = int("36aaac2fd9e0256d52be4aa888248051250e4c53");
        let s = int("b2b9885bc579800e8a0f53334e4d08bf46cde18");
        assert!(verify(&k.p, &k.q, &k.g, &k.y, &digest, &r, &s));
        assert!(! verify(&k.p, &k.q, &k.g, &k.y, &digest, &s, &r));
    }

    #[test]
    fn roundtrip() {
        let k = key();
        let mut digest = crate::fmt::hex::decode(DIGEST).unwrap();
        let (r, s) = sign(&k.p, &k.q, &k.g, &k.x, &digest).unwrap();
        assert!(verify(&k.p, &k.q, &k.g, &k.y, &digest, &r, &s));

        digest[0] ^= 1;
        assert!(! verify(&k.p, &k.q, &k.g, &k.y, &digest, &r, &s));
    }

    #[test]
    fn out_of_range() {
        let k = key();
        let digest = crate::fmt::hex::decode(DIGEST).unwrap();
        assert!(! verify(&k.p, &k.q, &k.g, &k.y, &digest,
                         &BigUint::from(0u32), &BigUint::from(1u32)));
        assert!(! verify(&k.p, &k.q, &k.g, &k.y, &digest,
                         &k.q, &BigUint::from(1u32)));
    }
}
