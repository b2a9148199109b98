//! Functions for parsing MPIs.

use crate::crypto::mem::Protected;
use crate::crypto::mpi::{self, MPI, ProtectedMPI};
use crate::parse::BodyParser;
use crate::types::PublicKeyAlgorithm;
use crate::Error;
use crate::Result;
use crate::Tag;

impl<'b> BodyParser<'b> {
    // Returns the value of an MPI.
    //
    // The bit count must be exact: the first octet of the value must
    // have its most significant bit at the position the count says.
    fn parse_mpi_value(&mut self, name: &'static str) -> Result<&'b [u8]> {
        let bits = self.parse_be_u16(name).map_err(|_| {
            Error::MalformedMPI(format!("{}: truncated length", name))
        })? as usize;
        let len = (bits + 7) / 8;
        let value = self.parse_bytes(name, len).map_err(|_| {
            Error::MalformedMPI(format!("{}: {} bits declared, but only \
                                         {} bytes left",
                                        name, bits, self.remaining()))
        })?;

        if bits > 0 {
            let unused = (len * 8 - bits) as u32;
            if value[0].leading_zeros() != unused {
                return Err(Error::MalformedMPI(
                    format!("{}: {} bits declared, but the value's leading \
                             octet is {:#04x}", name, bits, value[0])).into());
            }
        }

        Ok(value)
    }

    /// Parses an MPI.
    pub(crate) fn parse_mpi(&mut self, name: &'static str) -> Result<MPI> {
        self.parse_mpi_value(name).map(MPI::new)
    }

    /// Parses an MPI holding secret key material.
    pub(crate) fn parse_protected_mpi(&mut self, name: &'static str)
                                      -> Result<ProtectedMPI> {
        self.parse_mpi_value(name).map(|v| ProtectedMPI::from(v.to_vec()))
    }

    // Parses as many MPIs as possible, for algorithms we don't know.
    fn parse_mpis_greedy(&mut self) -> Vec<MPI> {
        let mut mpis = Vec::new();
        while self.remaining() > 0 {
            let start = self.cursor;
            match self.parse_mpi("unknown_parameter") {
                Ok(m) => mpis.push(m),
                Err(_) => {
                    self.cursor = start;
                    break;
                }
            }
        }
        mpis
    }
}

impl mpi::PublicKey {
    /// Parses the public MPIs of a key using `algo`.
    ///
    /// See [Section 5.5.2 of RFC 4880] for details.
    ///
    ///   [Section 5.5.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.5.2
    pub(crate) fn parse(algo: PublicKeyAlgorithm, p: &mut BodyParser)
                        -> Result<Self> {
        use crate::types::PublicKeyAlgorithm::*;

        match algo {
            RSAEncryptSign | RSAEncrypt | RSASign => {
                let n = p.parse_mpi("rsa_public_n")?;
                let e = p.parse_mpi("rsa_public_e")?;
                Ok(mpi::PublicKey::RSA { e, n })
            }

            DSA => {
                let p_ = p.parse_mpi("dsa_public_p")?;
                let q = p.parse_mpi("dsa_public_q")?;
                let g = p.parse_mpi("dsa_public_g")?;
                let y = p.parse_mpi("dsa_public_y")?;
                Ok(mpi::PublicKey::DSA { p: p_, q, g, y })
            }

            ElGamalEncrypt | ElGamalEncryptSign => {
                let p_ = p.parse_mpi("elgamal_public_p")?;
                let g = p.parse_mpi("elgamal_public_g")?;
                let y = p.parse_mpi("elgamal_public_y")?;
                Ok(mpi::PublicKey::Elgamal { p: p_, g, y })
            }

            _ => {
                let mpis = p.parse_mpis_greedy();
                let rest = p.parse_bytes_eof();
                Ok(mpi::PublicKey::Unknown {
                    mpis: mpis.into_boxed_slice(),
                    rest: rest.to_vec().into_boxed_slice(),
                })
            }
        }
    }
}

impl mpi::SecretKeyMaterial {
    /// Parses decrypted secret key material.
    ///
    /// `bytes` must hold exactly the MPIs, without the checksum.
    pub fn from_bytes(algo: PublicKeyAlgorithm, bytes: &[u8])
                      -> Result<Self> {
        let mut p = BodyParser::new(Tag::SecretKey, bytes);
        let mpis = Self::parse(algo, &mut p)?;
        if p.remaining() > 0 {
            return Err(Error::MalformedPacket(
                format!("{} bytes of junk after the secret key material",
                        p.remaining())).into());
        }
        Ok(mpis)
    }

    /// Parses the secret MPIs of a key using `algo`.
    pub(crate) fn parse(algo: PublicKeyAlgorithm, p: &mut BodyParser)
                        -> Result<Self> {
        use crate::types::PublicKeyAlgorithm::*;

        match algo {
            RSAEncryptSign | RSAEncrypt | RSASign => {
                let d = p.parse_protected_mpi("rsa_secret_d")?;
                let p_ = p.parse_protected_mpi("rsa_secret_p")?;
                let q = p.parse_protected_mpi("rsa_secret_q")?;
                let u = p.parse_protected_mpi("rsa_secret_u")?;
                Ok(mpi::SecretKeyMaterial::RSA { d, p: p_, q, u })
            }

            DSA => Ok(mpi::SecretKeyMaterial::DSA {
                x: p.parse_protected_mpi("dsa_secret")?,
            }),

            ElGamalEncrypt | ElGamalEncryptSign =>
                Ok(mpi::SecretKeyMaterial::Elgamal {
                    x: p.parse_protected_mpi("elgamal_secret")?,
                }),

            _ => {
                let mut mpis = Vec::new();
                while p.remaining() > 0 {
                    let start = p.cursor;
                    match p.parse_protected_mpi("unknown_parameter") {
                        Ok(m) => mpis.push(m),
                        Err(_) => {
                            p.cursor = start;
                            break;
                        }
                    }
                }
                let rest: Protected = p.parse_bytes_eof().into();
                Ok(mpi::SecretKeyMaterial::Unknown {
                    mpis: mpis.into_boxed_slice(),
                    rest,
                })
            }
        }
    }
}

impl mpi::Ciphertext {
    /// Parses the MPIs of a public key encrypted session key.
    pub(crate) fn parse(algo: PublicKeyAlgorithm, p: &mut BodyParser)
                        -> Result<Self> {
        use crate::types::PublicKeyAlgorithm::*;

        match algo {
            RSAEncryptSign | RSAEncrypt =>
                Ok(mpi::Ciphertext::RSA { c: p.parse_mpi("rsa_ciphertext")? }),

            ElGamalEncrypt | ElGamalEncryptSign => {
                let e = p.parse_mpi("elgamal_e")?;
                let c = p.parse_mpi("elgamal_c")?;
                Ok(mpi::Ciphertext::Elgamal { e, c })
            }

            _ => {
                let mpis = p.parse_mpis_greedy();
                let rest = p.parse_bytes_eof();
                Ok(mpi::Ciphertext::Unknown {
                    mpis: mpis.into_boxed_slice(),
                    rest: rest.to_vec().into_boxed_slice(),
                })
            }
        }
    }
}

impl mpi::Signature {
    /// Parses the MPIs of a signature.
    pub(crate) fn parse(algo: PublicKeyAlgorithm, p: &mut BodyParser)
                        -> Result<Self> {
        use crate::types::PublicKeyAlgorithm::*;

        match algo {
            RSAEncryptSign | RSASign =>
                Ok(mpi::Signature::RSA { s: p.parse_mpi("rsa_signature")? }),

            DSA => {
                let r = p.parse_mpi("dsa_sig_r")?;
                let s = p.parse_mpi("dsa_sig_s")?;
                Ok(mpi::Signature::DSA { r, s })
            }

            ElGamalEncryptSign => {
                let r = p.parse_mpi("elgamal_sig_r")?;
                let s = p.parse_mpi("elgamal_sig_s")?;
                Ok(mpi::Signature::Elgamal { r, s })
            }

            _ => {
                let mpis = p.parse_mpis_greedy();
                let rest = p.parse_bytes_eof();
                Ok(mpi::Signature::Unknown {
                    mpis: mpis.into_boxed_slice(),
                    rest: rest.to_vec().into_boxed_slice(),
                })
            }
        }
    }
}
