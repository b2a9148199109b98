//! Utilities for formatting and parsing.

/// Hexadecimal encoding and decoding.
pub mod hex {
    use crate::{Error, Result};

    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    /// Encodes `buffer` as upper case hexadecimal.
    pub fn encode<B: AsRef<[u8]>>(buffer: B) -> String {
        encode_with(buffer.as_ref(), false)
    }

    /// Like `encode`, but groups the digits in blocks of four.
    ///
    /// This is the format that is commonly used for displaying
    /// fingerprints.
    pub fn encode_pretty<B: AsRef<[u8]>>(buffer: B) -> String {
        encode_with(buffer.as_ref(), true)
    }

    fn encode_with(buffer: &[u8], pretty: bool) -> String {
        let mut result = String::with_capacity(buffer.len() * 5 / 2);
        for (i, b) in buffer.iter().enumerate() {
            if pretty && i > 0 && i % 2 == 0 {
                result.push(' ');
            }
            result.push(DIGITS[(b >> 4) as usize] as char);
            result.push(DIGITS[(b & 0xf) as usize] as char);
        }
        result
    }

    /// Decodes a hexadecimal string.
    ///
    /// Upper and lower case digits are accepted.
    pub fn decode<H: AsRef<str>>(hex: H) -> Result<Vec<u8>> {
        decode_with(hex.as_ref(), false)
    }

    /// Like `decode`, but skips whitespace and a leading `0x`.
    pub fn decode_pretty<H: AsRef<str>>(hex: H) -> Result<Vec<u8>> {
        decode_with(hex.as_ref(), true)
    }

    fn decode_with(hex: &str, pretty: bool) -> Result<Vec<u8>> {
        let bad = || Error::InvalidArgument(
            format!("Invalid hexadecimal string: {:?}", hex));

        let mut s = hex.trim_start();
        if pretty && (s.starts_with("0x") || s.starts_with("0X")) {
            s = &s[2..];
        } else if ! pretty {
            s = hex;
        }

        let mut nibbles = Vec::with_capacity(s.len());
        for c in s.chars() {
            match c.to_digit(16) {
                Some(d) => nibbles.push(d as u8),
                None if pretty && c.is_ascii_whitespace() => (),
                None => return Err(bad().into()),
            }
        }

        if nibbles.len() % 2 != 0 {
            return Err(bad().into());
        }

        Ok(nibbles.chunks(2).map(|n| (n[0] << 4) | n[1]).collect())
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use quickcheck_macros::quickcheck;

        #[test]
        fn decode_plain() {
            assert_eq!(decode("").unwrap(), Vec::<u8>::new());
            assert!(decode("0").is_err());
            assert_eq!(decode("00").unwrap(), vec![0x00]);
            assert_eq!(decode("0f").unwrap(), vec![0x0f]);
            assert_eq!(decode("FF").unwrap(), vec![0xff]);
            assert!(decode("000").is_err());
            assert_eq!(decode("0099").unwrap(), vec![0x00, 0x99]);
            assert!(decode("\t\n\x0c\r ").is_err());
            assert!(decode("0x00").is_err());
            assert!(decode("zz").is_err());
        }

        #[test]
        fn decode_pretty_forms() {
            assert_eq!(decode_pretty(" ").unwrap(), Vec::<u8>::new());
            assert!(decode_pretty(" 0").is_err());
            assert_eq!(decode_pretty(" 00 ff").unwrap(), vec![0x00, 0xff]);
            assert_eq!(decode_pretty("\t\n\x0c\r ").unwrap(), Vec::<u8>::new());
            assert_eq!(decode_pretty(" 0x00").unwrap(), vec![0x00]);
            assert_eq!(decode_pretty("0X0102").unwrap(), vec![0x01, 0x02]);
            assert!(decode_pretty("0x0").is_err());
        }

        #[test]
        fn encode_forms() {
            assert_eq!(encode(&[0x01, 0xab, 0xcd]), "01ABCD");
            assert_eq!(encode_pretty(&[0x01, 0xab, 0xcd, 0xef, 0x00]),
                       "01AB CDEF 00");
        }

        #[quickcheck]
        fn hex_roundtrip(data: Vec<u8>) -> bool {
            data == decode(encode(&data)).unwrap()
        }

        #[quickcheck]
        fn pretty_hex_roundtrip(data: Vec<u8>) -> bool {
            data == decode_pretty(encode_pretty(&data)).unwrap()
        }
    }
}
