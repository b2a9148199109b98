//! Signature verification.
//!
//! Verifying a message sorts its signatures into the lists of a
//! [`Validation`]: a signature is *valid* if the signer's key is in
//! the keyring, the signature checks out, and the signature is
//! temporally valid at the given time.  A signature that doesn't
//! check out is *invalid*; one whose key is missing, or that can't
//! be checked, is *unknown*.
//!
//! Bad signatures are never errors.  Errors are reserved for
//! messages that can't be parsed.
//!
//!   [`Validation`]: struct.Validation.html

use std::fmt;

use crate::keyring::{Binding, KeyRecord, Keyring};
use crate::packet::{Key, Signature};
use crate::parse::{
    Control,
    Event,
    PacketParserBuilder,
    PacketParserSettings,
};
use crate::types::{Duration, SignatureType, Timestamp};
use crate::ErrorStack;
use crate::Fingerprint;
use crate::KeyID;
use crate::Packet;
use crate::Result;

/// A checked signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    sig: Signature,
    signer: Option<Fingerprint>,
    userid: Option<String>,
}

impl SignatureInfo {
    fn new(sig: Signature, signer: Option<(&KeyRecord, &Key)>) -> Self {
        SignatureInfo {
            sig,
            signer: signer.map(|(_, k)| k.fingerprint()),
            userid: signer.and_then(|(r, _)| r.primary_userid())
                .map(|u| String::from_utf8_lossy(u.value()).into_owned()),
        }
    }

    /// Returns the signature.
    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Returns the key id of the key that made the signature.
    pub fn issuer(&self) -> Option<KeyID> {
        self.sig.issuer()
    }

    /// Returns the fingerprint of the key that made the signature,
    /// if it was found.
    pub fn signer(&self) -> Option<&Fingerprint> {
        self.signer.as_ref()
    }

    /// Returns the primary user id of the signer, if the key was
    /// found.
    pub fn signer_userid(&self) -> Option<&str> {
        self.userid.as_deref()
    }

    /// Returns the signature type.
    pub fn typ(&self) -> SignatureType {
        self.sig.typ()
    }

    /// Returns when the signature was made.
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.sig.creation_time()
    }

    /// Returns how long the signature is valid.  Zero means forever.
    pub fn duration(&self) -> Duration {
        self.sig.expiration_time().unwrap_or_else(|| Duration::from(0))
    }
}

impl fmt::Display for SignatureInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "signature {}/{} {}", self.sig.pk_algo(),
               self.sig.hash_algo(),
               self.issuer().map(|i| i.to_hex())
               .unwrap_or_else(|| "unknown".into()))?;
        if let Some(t) = self.creation_time() {
            write!(f, " {}", t)?;
        }
        if let Some(u) = self.signer_userid() {
            write!(f, " {}", u)?;
        }
        Ok(())
    }
}

/// The outcome of a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Good signatures.
    pub valid: Vec<SignatureInfo>,
    /// Bad signatures.
    pub invalid: Vec<SignatureInfo>,
    /// Signatures that could not be checked, usually because the
    /// key is missing.
    pub unknown: Vec<SignatureInfo>,
    /// Good signatures that have expired.
    pub expired: Vec<SignatureInfo>,
    /// Good signatures that were made in the future.
    pub not_yet_valid: Vec<SignatureInfo>,
}

impl Validation {
    /// Returns the number of valid signatures.
    pub fn validc(&self) -> usize {
        self.valid.len()
    }

    /// Returns the number of invalid signatures.
    pub fn invalidc(&self) -> usize {
        self.invalid.len()
    }

    /// Returns the number of signatures that could not be checked.
    pub fn unknownc(&self) -> usize {
        self.unknown.len()
    }

    /// Returns whether there is at least one valid signature, and
    /// all other signatures are valid too.
    pub fn is_valid(&self) -> bool {
        ! self.valid.is_empty()
            && self.invalid.is_empty()
            && self.unknown.is_empty()
            && self.expired.is_empty()
            && self.not_yet_valid.is_empty()
    }

    /// Moves the signatures of `other` into this validation.
    pub fn append(&mut self, mut other: Validation) {
        self.valid.append(&mut other.valid);
        self.invalid.append(&mut other.invalid);
        self.unknown.append(&mut other.unknown);
        self.expired.append(&mut other.expired);
        self.not_yet_valid.append(&mut other.not_yet_valid);
    }

    // Files a signature.  `check` verifies it using the signer's key.
    fn add<F>(&mut self, sig: Signature, signer: Option<(&KeyRecord, &Key)>,
              now: Timestamp, check: F)
        where F: FnOnce(&Signature, &Key) -> Result<bool>
    {
        let key = match signer {
            Some((_, key)) => key,
            None => {
                log::debug!("No key for signature by {:?}", sig.issuer());
                self.unknown.push(SignatureInfo::new(sig, None));
                return;
            }
        };

        let result = check(&sig, key);
        let not_yet_valid = sig.is_not_yet_valid(now);
        let expired = sig.is_expired(now);
        let info = SignatureInfo::new(sig, signer);
        match result {
            Ok(true) if not_yet_valid => self.not_yet_valid.push(info),
            Ok(true) if expired => self.expired.push(info),
            Ok(true) => self.valid.push(info),
            Ok(false) => self.invalid.push(info),
            Err(e) => {
                log::warn!("Can't check {}: {}", info, e);
                self.unknown.push(info);
            }
        }
    }
}

/// The result of verifying a message.
#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// The signatures.
    pub validation: Validation,
    /// The signed data.
    ///
    /// For cleartext signed messages, this is the text with the dash
    /// escaping removed.
    pub content: Vec<u8>,
}

/// Sorts the signatures of a message while it is parsed.
///
/// Signatures following one pass signature packets, and those of
/// cleartext signed messages, come with their digest, and are checked
/// when they arrive.  Signatures that precede the data they cover are
/// held back until the data has been read.
#[derive(Debug)]
pub(crate) struct MessageVerifier<'k> {
    keyring: &'k Keyring,
    now: Timestamp,
    validation: Validation,
    content: Vec<u8>,
    // Signatures that are checked over the content.
    deferred: Vec<Signature>,
}

impl<'k> MessageVerifier<'k> {
    pub(crate) fn new(keyring: &'k Keyring, now: Timestamp) -> Self {
        MessageVerifier {
            keyring,
            now,
            validation: Validation::default(),
            content: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub(crate) fn event(&mut self, event: Event) {
        match event {
            Event::LiteralBody(chunk) => self.content.extend_from_slice(&chunk),
            Event::CleartextBody(text) => self.content = text,
            Event::SignatureFooter(sig) => {
                let signer = sig.issuer()
                    .and_then(|id| self.keyring.find_key(&id));
                self.validation.add(sig, signer, self.now,
                                    |sig, key| sig.verify(key));
            }
            Event::Packet(Packet::Signature(sig)) => self.deferred.push(sig),
            _ => (),
        }
    }

    pub(crate) fn finish(mut self) -> Verification {
        for sig in std::mem::take(&mut self.deferred) {
            let signer = sig.issuer()
                .and_then(|id| self.keyring.find_key(&id));
            let content = &self.content;
            self.validation.add(sig, signer, self.now, |sig, key| {
                if sig.typ() == SignatureType::Standalone {
                    sig.verify_standalone(key)
                } else {
                    sig.verify_message(key, content)
                }
            });
        }
        Verification {
            validation: self.validation,
            content: self.content,
        }
    }
}

/// Verifies a signed message.
///
/// The message may be armored, and may be compressed.  Both one pass
/// signed messages and messages whose signatures precede the data
/// are understood, as are cleartext signed messages.
pub fn verify_message(data: &[u8], keyring: &Keyring, now: Timestamp,
                      errors: &mut ErrorStack)
                      -> Result<Verification> {
    verify_message_with(data, keyring, now, PacketParserSettings::default(),
                        errors)
}

pub(crate) fn verify_message_with(data: &[u8], keyring: &Keyring,
                                  now: Timestamp,
                                  settings: PacketParserSettings,
                                  errors: &mut ErrorStack)
                                  -> Result<Verification> {
    let mut verifier = MessageVerifier::new(keyring, now);
    PacketParserBuilder::from_bytes(data)?
        .settings(settings)
        .build()?
        .drive(errors, |event| {
            verifier.event(event);
            Ok(Control::Continue)
        })?;
    Ok(verifier.finish())
}

/// Verifies a cleartext signed message.
///
/// This is [`verify_message`] for messages that start with
/// `-----BEGIN PGP SIGNED MESSAGE-----`.
///
///   [`verify_message`]: fn.verify_message.html
pub fn verify_cleartext(data: &[u8], keyring: &Keyring, now: Timestamp,
                        errors: &mut ErrorStack)
                        -> Result<Verification> {
    verify_message(data, keyring, now, errors)
}

/// Verifies the detached signatures in `sigs` over `data`.
///
/// `sigs` may be armored.
pub fn verify_detached(data: &[u8], sigs: &[u8], keyring: &Keyring,
                       now: Timestamp, errors: &mut ErrorStack)
                       -> Result<Validation> {
    verify_detached_with(data, sigs, keyring, now,
                         PacketParserSettings::default(), errors)
}

pub(crate) fn verify_detached_with(data: &[u8], sigs: &[u8],
                                   keyring: &Keyring, now: Timestamp,
                                   settings: PacketParserSettings,
                                   errors: &mut ErrorStack)
                                   -> Result<Validation> {
    let mut signatures = Vec::new();
    PacketParserBuilder::from_bytes(sigs)?
        .settings(settings)
        .build()?
        .drive(errors, |event| {
            match event {
                Event::Packet(Packet::Signature(sig))
                    | Event::SignatureFooter(sig) => signatures.push(sig),
                _ => (),
            }
            Ok(Control::Continue)
        })?;

    let mut validation = Validation::default();
    for sig in signatures {
        let signer = sig.issuer().and_then(|id| keyring.find_key(&id));
        validation.add(sig, signer, now,
                       |sig, key| sig.verify_message(key, data));
    }
    Ok(validation)
}

/// Checks the self signatures and certifications of a key.
///
/// Certifications by other keys are checked if the keys are in
/// `keyring`.
pub fn validate_key_sigs(record: &KeyRecord, keyring: &Keyring,
                         now: Timestamp)
                         -> Validation {
    let mut validation = Validation::default();
    for subsig in record.subsigs() {
        let sig = subsig.signature().clone();
        let signer = match sig.issuer() {
            Some(id) if id == record.keyid() => Some((record, record.key())),
            Some(id) => record.find_key(&id).map(|(k, _)| (record, k))
                .or_else(|| keyring.find_key(&id)),
            // Without an issuer, assume a self signature.
            None => Some((record, record.key())),
        };

        let primary = record.key();
        match subsig.binding() {
            Binding::Key => validation.add(sig, signer, now, |sig, key| {
                sig.verify_direct_key(key, primary)
            }),
            Binding::UserID(i) => {
                let uid = &record.userids()[i];
                validation.add(sig, signer, now, |sig, key| {
                    sig.verify_userid_binding(key, primary, uid)
                })
            }
            Binding::UserAttribute(i) => {
                let ua = &record.user_attributes()[i];
                validation.add(sig, signer, now, |sig, key| {
                    sig.verify_user_attribute_binding(key, primary, ua)
                })
            }
            Binding::Subkey(i) => {
                let subkey = &record.subkeys()[i];
                validation.add(sig, signer, now, |sig, key| {
                    if sig.typ() == SignatureType::PrimaryKeyBinding {
                        sig.verify_primary_key_binding(primary, subkey)
                    } else {
                        sig.verify_subkey_binding(key, primary, subkey)
                    }
                })
            }
        }
    }
    validation
}

/// Checks the signatures of all keys in `keyring`.
pub fn validate_all_sigs(keyring: &Keyring, now: Timestamp) -> Validation {
    let mut validation = Validation::default();
    for record in keyring {
        validation.append(validate_key_sigs(record, keyring, now));
    }
    validation
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::crypto::{KeyPair, Password};
    use crate::parse::Parse;
    use crate::serialize::stream::{LiteralWriter, Message, Signer};
    use crate::serialize::Marshal;

    fn keyring(names: &[&str]) -> Keyring {
        let mut data = Vec::new();
        for name in names {
            data.extend(std::fs::read(crate::path_to(name)).unwrap());
        }
        let mut errors = ErrorStack::new();
        Keyring::from_bytes(&data, &mut errors).unwrap()
    }

    fn read(name: &str) -> Vec<u8> {
        std::fs::read(crate::path_to(name)).unwrap()
    }

    fn keypair(name: &str, password: Option<&str>) -> KeyPair {
        match Packet::from_bytes(&read(name)).unwrap() {
            Packet::SecretKey(k) =>
                k.into_keypair(password.map(Password::from).as_ref()).unwrap(),
            p => panic!("unexpected packet {:?}", p),
        }
    }

    fn sign(signers: Vec<KeyPair>, msg: &[u8],
            creation_time: Option<Timestamp>,
            expiration: Option<Duration>)
            -> Vec<u8> {
        let mut o = Vec::new();
        {
            let mut signers = signers.into_iter();
            let m = Message::new(&mut o);
            let mut s = Signer::new(m, signers.next().unwrap());
            for signer in signers {
                s = s.add_signer(signer);
            }
            if let Some(t) = creation_time {
                s = s.creation_time(t);
            }
            if let Some(d) = expiration {
                s = s.expiration(d);
            }
            let mut w = LiteralWriter::new(s.build().unwrap()).build().unwrap();
            w.write_all(msg).unwrap();
            w.finalize().unwrap();
        }
        o
    }

    #[test]
    fn one_pass_signed() {
        let keyring = keyring(&["keys/alice.pgp"]);
        let mut errors = ErrorStack::new();
        let v = verify_message(&read("messages/hello-signed.asc"), &keyring,
                               Timestamp::now(), &mut errors).unwrap();
        assert_eq!(v.validation.validc(), 1);
        assert!(v.validation.is_valid());
        assert_eq!(v.content, read("messages/hello.txt"));
        let info = &v.validation.valid[0];
        assert_eq!(info.signer_userid(), Some("Alice <alice@example.org>"));
        assert_eq!(info.issuer().unwrap().to_hex(), "651CD2E92EC2262D");
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn compressed() {
        let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp"]);
        for name in ["messages/hello-signed-zip.pgp",
                     "messages/hello-signed-zlib.pgp"] {
            let mut errors = ErrorStack::new();
            let v = verify_message(&read(name), &keyring, Timestamp::now(),
                                   &mut errors).unwrap();
            assert_eq!(v.validation.validc(), 1, "{}", name);
            assert_eq!(v.content, b"hello world");
        }
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn dsa_bzip2() {
        let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp"]);
        let mut errors = ErrorStack::new();
        let v = verify_message(&read("messages/hello-signed-dsa-bzip2.pgp"),
                               &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validation.validc(), 1);
        assert_eq!(v.validation.valid[0].issuer().unwrap().to_hex(),
                   "A9E6CBA5DB1B2995");
    }

    #[test]
    fn missing_key() {
        let keyring = keyring(&["keys/bob.pgp"]);
        let mut errors = ErrorStack::new();
        let v = verify_message(&read("messages/hello-signed.asc"), &keyring,
                               Timestamp::now(), &mut errors).unwrap();
        assert_eq!(v.validation.validc(), 0);
        assert_eq!(v.validation.unknownc(), 1);
        assert!(! v.validation.is_valid());
        // The content is still there.
        assert_eq!(v.content, b"hello world");
    }

    #[test]
    fn detached() {
        let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp"]);
        let hello = read("messages/hello.txt");
        let mut errors = ErrorStack::new();

        let v = verify_detached(&hello, &read("messages/hello.txt.sig"),
                                &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validc(), 1);

        // Bob's armored DSA signature.
        let v = verify_detached(&hello, &read("messages/hello-dsa.txt.asc"),
                                &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validc(), 1);

        let mut tampered = hello.clone();
        tampered[0] ^= 1;
        let v = verify_detached(&tampered, &read("messages/hello.txt.sig"),
                                &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validc(), 0);
        assert_eq!(v.invalidc(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn cleartext() {
        let keyring = keyring(&["keys/alice.pgp"]);
        let mut errors = ErrorStack::new();
        let data = read("messages/clear.txt.asc");
        let v = verify_cleartext(&data, &keyring, Timestamp::now(),
                                 &mut errors).unwrap();
        assert_eq!(v.validation.validc(), 1);
        let mut text = read("messages/clear.txt");
        text.pop();
        assert_eq!(v.content, text);

        // Change a character of the text.
        let s = String::from_utf8(data).unwrap()
            .replace("other side", "other sidE");
        let v = verify_cleartext(s.as_bytes(), &keyring, Timestamp::now(),
                                 &mut errors).unwrap();
        assert_eq!(v.validation.invalidc(), 1);
    }

    #[test]
    fn aggregation() {
        // Carol's key is not in the keyring.
        let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp"]);
        let msg = sign(vec![keypair("keys/alice-secret.pgp", None),
                            keypair("keys/bob-secret.pgp", None),
                            keypair("keys/carol-secret.pgp", Some("hunter2"))],
                       b"hello world", None, None);

        let mut errors = ErrorStack::new();
        let v = verify_message(&msg, &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validation.validc(), 2);
        assert_eq!(v.validation.invalidc(), 0);
        assert_eq!(v.validation.unknownc(), 1);
        assert!(! v.validation.is_valid());
    }

    #[test]
    fn tampered_message() {
        let keyring = keyring(&["keys/alice.pgp"]);
        let mut msg = sign(vec![keypair("keys/alice-secret.pgp", None)],
                           b"hello world", None, None);
        let i = msg.windows(11).position(|w| w == b"hello world").unwrap();
        msg[i] = b'j';

        let mut errors = ErrorStack::new();
        let v = verify_message(&msg, &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validation.validc(), 0);
        assert_eq!(v.validation.invalidc(), 1);
        assert_eq!(v.content, b"jello world");
    }

    #[test]
    fn temporal_validity() {
        let keyring = keyring(&["keys/alice.pgp"]);
        let alice = || keypair("keys/alice-secret.pgp", None);
        let now = Timestamp::now();
        let day = Duration::days(1).unwrap();
        let mut errors = ErrorStack::new();

        let msg = sign(vec![alice()], b"x", now.checked_add(day), None);
        let v = verify_message(&msg, &keyring, now, &mut errors).unwrap();
        assert_eq!(v.validation.not_yet_valid.len(), 1);
        assert_eq!(v.validation.validc(), 0);
        assert!(! v.validation.is_valid());

        let two_seconds_ago = now.checked_sub(Duration::seconds(2));
        let msg = sign(vec![alice()], b"x", two_seconds_ago,
                       Some(Duration::seconds(1)));
        let v = verify_message(&msg, &keyring, now, &mut errors).unwrap();
        assert_eq!(v.validation.expired.len(), 1);
        assert_eq!(v.validation.validc(), 0);

        // Checked at the time it was still valid.
        let v = verify_message(&msg, &keyring, two_seconds_ago.unwrap(),
                               &mut errors).unwrap();
        assert_eq!(v.validation.validc(), 1);
    }

    #[test]
    fn signature_first() {
        // A signature packet followed by the literal data packet.
        let keyring = keyring(&["keys/alice.pgp"]);
        let sig = Packet::from_bytes(&read("messages/hello.txt.sig")).unwrap();
        let mut lit = crate::packet::Literal::new(
            crate::types::DataFormat::Binary);
        lit.set_body(read("messages/hello.txt"));
        let mut msg = sig.to_vec().unwrap();
        msg.extend(Packet::from(lit).to_vec().unwrap());

        let mut errors = ErrorStack::new();
        let v = verify_message(&msg, &keyring, Timestamp::now(), &mut errors)
            .unwrap();
        assert_eq!(v.validation.validc(), 1);
        assert_eq!(v.content, b"hello world");
    }

    #[test]
    fn key_signatures() {
        let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp",
                                "keys/carol.pgp"]);
        let now = Timestamp::now();
        let v = validate_key_sigs(keyring.get(0).unwrap(), &keyring, now);
        assert_eq!(v.validc(), 2);
        assert!(v.is_valid());

        let v = validate_all_sigs(&keyring, now);
        assert_eq!(v.validc(), 5);
        assert_eq!(v.invalidc(), 0);

        // Bob's user id, attached to Alice's key.
        let mut data = read("keys/alice.pgp");
        let bob = crate::parse::packets_from_bytes(&read("keys/bob.pgp"))
            .unwrap();
        bob[1..].serialize(&mut data).unwrap();
        let mut errors = ErrorStack::new();
        let mixed = Keyring::from_bytes(&data, &mut errors).unwrap();
        let v = validate_key_sigs(mixed.get(0).unwrap(), &keyring, now);
        assert_eq!(v.validc(), 2);
        assert_eq!(v.invalidc(), 1);
    }
}
