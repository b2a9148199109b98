//! Computes the CRC-24, (see [RFC 4880, section 6.1]).
//!
//! [RFC 4880, section 6.1]: https://tools.ietf.org/html/rfc4880#section-6.1

const CRC24_INIT: u32 = 0xB704CE;
const CRC24_POLY: u32 = 0x1864CFB;

#[derive(Debug, Clone)]
pub(crate) struct Crc {
    n: u32,
}

impl Crc {
    pub(crate) fn new() -> Self {
        Crc { n: CRC24_INIT }
    }

    pub(crate) fn update(&mut self, buf: &[u8]) -> &Self {
        for octet in buf {
            self.n ^= (*octet as u32) << 16;
            for _ in 0..8 {
                self.n <<= 1;
                if self.n & 0x1000000 > 0 {
                    self.n ^= CRC24_POLY;
                }
            }
        }
        self
    }

    pub(crate) fn finalize(&self) -> u32 {
        self.n & 0xFFFFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(Crc::new().finalize(), 0xB704CE);
    }

    #[test]
    fn foobarbaz() {
        let b = b"foobarbaz";
        let crcs = [
            0xb704ce,
            0x6d2804,
            0xa2d10d,
            0x4fc255,
            0x7aafca,
            0xc79c46,
            0x7334de,
            0x77dc72,
            0x000f65,
            0xf40d86,
        ];

        for len in 0..b.len() + 1 {
            assert_eq!(Crc::new().update(&b[..len]).finalize(), crcs[len]);
        }
    }

    #[quickcheck_macros::quickcheck]
    fn incremental(a: Vec<u8>, b: Vec<u8>) -> bool {
        let mut c = Crc::new();
        c.update(&a);
        c.update(&b);
        let whole: Vec<u8> = a.iter().chain(b.iter()).cloned().collect();
        c.finalize() == Crc::new().update(&whole).finalize()
    }
}
