//! Keyrings.
//!
//! A [`Keyring`] is an ordered collection of [`KeyRecord`]s.  Records
//! are built from a stream of key packets by an [`Accumulator`]: a
//! key packet starts a new record, and the user ids, subkeys and
//! signatures that follow it are attached to that record.
//!
//! Keys are looked up by key id (full or short), or by user id using
//! a case-insensitive regular expression.  Lookups take a cursor, so
//! that a second call continues where the first one stopped.
//!
//!   [`Keyring`]: struct.Keyring.html
//!   [`KeyRecord`]: struct.KeyRecord.html
//!   [`Accumulator`]: struct.Accumulator.html

use std::fmt;
use std::io::Write;
use std::path::Path;

use regex::RegexBuilder;

use crate::armor;
use crate::crypto::Password;
use crate::packet::signature::SignatureBuilder;
use crate::packet::{Key, Signature, UserAttribute, UserID};
use crate::parse::{Control, Event, PacketParserBuilder, PacketParserSettings};
use crate::serialize::Marshal;
use crate::types::{
    Duration,
    HashAlgorithm,
    KeyFlags,
    ReasonForRevocation,
    SignatureType,
    SymmetricAlgorithm,
    Timestamp,
};
use crate::Error;
use crate::ErrorStack;
use crate::Fingerprint;
use crate::KeyID;
use crate::Packet;
use crate::Result;

/// What a signature in a key record is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The primary key itself, e.g. a direct key signature or a key
    /// revocation.
    Key,
    /// The user id with the given index.
    UserID(usize),
    /// The user attribute with the given index.
    UserAttribute(usize),
    /// The subkey with the given index.
    Subkey(usize),
}

/// A signature attached to a key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSig {
    binding: Binding,
    sig: Signature,
    trust: Option<(u8, u8)>,
}

impl SubSig {
    /// Returns what the signature is bound to.
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Returns the signature.
    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Returns the trust level and amount from a following trust
    /// packet, if any.
    pub fn trust(&self) -> Option<(u8, u8)> {
        self.trust
    }
}

/// A revocation of a key or a user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    /// The revoked user id, or `None` if the whole key is revoked.
    pub userid: Option<usize>,
    /// The reason code.
    pub code: ReasonForRevocation,
    /// The human readable reason.
    pub reason: String,
}

/// Which key of a record matched a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    /// The primary key.
    Primary,
    /// The subkey with the given index.
    Subkey(usize),
}

/// A key with its user ids, subkeys, and signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    key: Key,
    userids: Vec<UserID>,
    attributes: Vec<UserAttribute>,
    subkeys: Vec<Key>,
    encryption_key: Option<usize>,
    subsigs: Vec<SubSig>,
    revocations: Vec<Revocation>,
    revoked: Option<Revocation>,
    primary_userid: Option<usize>,
    duration: Option<Duration>,
    // The packets the record was built from, in order.
    packets: Vec<Packet>,
}

impl fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = if self.is_secret() { "sec" } else { "pub" };
        write!(f, "{} {}/{} {} {}", kind, self.key.bits(),
               self.key.pk_algo(), self.keyid(), self.key.creation_time())?;
        if let Some(e) = self.expiration_time() {
            write!(f, " [EXPIRES {}]", e)?;
        }
        if self.revoked.is_some() {
            write!(f, " [REVOKED]")?;
        }
        writeln!(f)?;
        writeln!(f, "Key fingerprint: {}", self.fingerprint().to_spaced_hex())?;
        for (i, uid) in self.userids.iter().enumerate() {
            let revoked = self.revocations.iter()
                .any(|r| r.userid == Some(i));
            writeln!(f, "uid              {}{}",
                     String::from_utf8_lossy(uid.value()),
                     if revoked { " [REVOKED]" } else { "" })?;
        }
        if let Some(k) = self.encryption_key() {
            writeln!(f, "encryption {}/{} {} {}", k.bits(), k.pk_algo(),
                     k.keyid(), k.creation_time())?;
        }
        Ok(())
    }
}

impl KeyRecord {
    fn new(key: Key, packet: Packet) -> Self {
        KeyRecord {
            key,
            userids: Vec::new(),
            attributes: Vec::new(),
            subkeys: Vec::new(),
            encryption_key: None,
            subsigs: Vec::new(),
            revocations: Vec::new(),
            revoked: None,
            primary_userid: None,
            duration: None,
            packets: vec![packet],
        }
    }

    /// Generates an RSA key with an RSA encryption subkey.
    ///
    /// The primary key carries a positive self certification of
    /// `userid`, marked as the primary user id, with the sign and
    /// certify key flags.  The subkey is bound by a subkey binding
    /// signature.  Both keys are `bits` bits, and their secret key
    /// material is not encrypted.
    pub fn generate_rsa<U: Into<UserID>>(bits: usize, userid: U)
                                         -> Result<KeyRecord> {
        let primary = Key::generate_rsa(bits)?;
        let creation_time = primary.creation_time();
        let signer = primary.clone().into_keypair(None)?;
        let userid = userid.into();

        let mut builder = SignatureBuilder::new(
            SignatureType::PositiveCertification, HashAlgorithm::SHA256)?;
        builder.hash_key(&primary);
        builder.hash_userid(&userid);
        let certification = builder
            .set_signature_creation_time(creation_time)?
            .set_issuer(primary.keyid())?
            .set_primary_userid(true)?
            .set_key_flags(KeyFlags::empty()
                           .set_certification(true)
                           .set_signing(true))?
            .end_hashed_subpackets()?
            .sign(&signer)?;

        let mut subkey = Key::generate_rsa(bits)?;
        subkey.set_creation_time(creation_time);
        let mut builder = SignatureBuilder::new(
            SignatureType::SubkeyBinding, HashAlgorithm::SHA256)?;
        builder.hash_key(&primary);
        builder.hash_subkey(&subkey);
        let binding = builder
            .set_signature_creation_time(creation_time)?
            .set_issuer(primary.keyid())?
            .set_key_flags(KeyFlags::empty()
                           .set_transport_encryption(true)
                           .set_storage_encryption(true))?
            .end_hashed_subpackets()?
            .sign(&signer)?;

        let mut keyring = Keyring::new();
        let mut errors = ErrorStack::new();
        {
            let mut acc = Accumulator::new(&mut keyring);
            acc.add(Packet::SecretKey(primary), &mut errors);
            acc.add(userid.into(), &mut errors);
            acc.add(certification.into(), &mut errors);
            acc.add(Packet::SecretSubkey(subkey), &mut errors);
            acc.add(binding.into(), &mut errors);
        }
        debug_assert!(errors.is_empty());
        keyring.keys.pop().ok_or_else(
            || Error::InvalidOperation("Key generation failed".into()).into())
    }

    /// Returns the primary key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Returns the primary key's key id.
    pub fn keyid(&self) -> KeyID {
        self.key.keyid()
    }

    /// Returns the primary key's fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.key.fingerprint()
    }

    /// Returns whether the record holds secret key material.
    pub fn is_secret(&self) -> bool {
        self.key.has_secret()
    }

    /// Returns the user ids, in the order they were read.
    pub fn userids(&self) -> &[UserID] {
        &self.userids
    }

    /// Returns the user attributes.
    pub fn user_attributes(&self) -> &[UserAttribute] {
        &self.attributes
    }

    /// Returns the primary user id.
    ///
    /// This is the user id marked as primary by a signature, or else
    /// the first one.
    pub fn primary_userid(&self) -> Option<&UserID> {
        self.userids.get(self.primary_userid.unwrap_or(0))
    }

    /// Returns the subkeys.
    pub fn subkeys(&self) -> &[Key] {
        &self.subkeys
    }

    /// Returns the encryption subkey, if any.
    pub fn encryption_key(&self) -> Option<&Key> {
        self.encryption_key.and_then(|i| self.subkeys.get(i))
    }

    /// Returns the key selected by a lookup.
    pub fn key_for(&self, m: KeyMatch) -> Option<&Key> {
        match m {
            KeyMatch::Primary => Some(&self.key),
            KeyMatch::Subkey(i) => self.subkeys.get(i),
        }
    }

    /// Returns the signatures, in the order they were read.
    pub fn subsigs(&self) -> &[SubSig] {
        &self.subsigs
    }

    /// Returns the user id revocations.
    pub fn revocations(&self) -> &[Revocation] {
        &self.revocations
    }

    /// Returns the key revocation, if the key is revoked.
    pub fn revocation(&self) -> Option<&Revocation> {
        self.revoked.as_ref()
    }

    /// Returns how long the key is valid after its creation.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns when the key expires, if it does.
    pub fn expiration_time(&self) -> Option<Timestamp> {
        if self.key.version() < 4 {
            return self.key.v3_expiration_time();
        }
        match self.duration {
            Some(d) if ! d.is_zero() => self.key.creation_time().checked_add(d),
            _ => None,
        }
    }

    /// Returns the packets the record was built from.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Finds the key with the given key id.
    pub fn find_key(&self, id: &KeyID) -> Option<(&Key, KeyMatch)> {
        self.match_id(id.as_bytes())
            .and_then(|m| self.key_for(m).map(|k| (k, m)))
    }

    // Matches a full or short key id against the primary key and the
    // subkeys.
    fn match_id(&self, id: &[u8]) -> Option<KeyMatch> {
        if self.key.keyid().matches(id) {
            return Some(KeyMatch::Primary);
        }
        self.subkeys.iter().position(|k| k.keyid().matches(id))
            .map(KeyMatch::Subkey)
    }

    // Matches `re` against the user ids.
    fn match_userid(&self, re: &regex::Regex) -> bool {
        self.userids.iter()
            .any(|u| re.is_match(&String::from_utf8_lossy(u.value())))
    }

    /// Serializes the public parts of the record.
    ///
    /// Secret keys are converted to public keys.  Trust packets are
    /// not exported.
    pub fn export(&self, armored: bool) -> Result<Vec<u8>> {
        write_packets(&self.public_packets(), armored, armor::Kind::PublicKey)
    }

    fn public_packets(&self) -> Vec<Packet> {
        self.packets.iter()
            .filter_map(|p| match p {
                Packet::SecretKey(k) | Packet::PublicKey(k) =>
                    Some(Packet::PublicKey(k.to_public())),
                Packet::SecretSubkey(k) | Packet::PublicSubkey(k) =>
                    Some(Packet::PublicSubkey(k.to_public())),
                Packet::Trust(_) => None,
                p => Some(p.clone()),
            })
            .collect()
    }

    /// Serializes the record including the secret key material.
    ///
    /// If `password` is given, unencrypted secret key material is
    /// encrypted using `algo` before it is written.  Material that is
    /// already encrypted is exported as is.
    pub fn export_secret(&self, armored: bool, password: Option<&Password>,
                         algo: SymmetricAlgorithm)
                         -> Result<Vec<u8>> {
        if ! self.is_secret() {
            return Err(Error::MissingSecretKey(self.keyid().to_hex()).into());
        }

        let protect = |k: &Key| -> Result<Key> {
            let mut k = k.clone();
            if let Some(password) = password {
                if k.secret().map(|s| ! s.is_encrypted()).unwrap_or(false) {
                    k.encrypt_secret(password, algo)?;
                }
            }
            Ok(k)
        };

        let mut packets = Vec::with_capacity(self.packets.len());
        for p in self.packets.iter() {
            packets.push(match p {
                Packet::SecretKey(k) => Packet::SecretKey(protect(k)?),
                Packet::SecretSubkey(k) => Packet::SecretSubkey(protect(k)?),
                Packet::Trust(_) => continue,
                p => p.clone(),
            });
        }
        write_packets(&packets, armored, armor::Kind::SecretKey)
    }
}

// Serializes `packets`, optionally armored.
fn write_packets(packets: &[Packet], armored: bool, kind: armor::Kind)
                 -> Result<Vec<u8>> {
    if armored {
        let mut w = armor::Writer::new(Vec::new(), kind)?;
        packets.serialize(&mut w)?;
        w.flush()?;
        w.finalize()
    } else {
        Marshal::to_vec(packets)
    }
}

/// Builds key records from a stream of packets.
///
/// Signatures, user ids and subkeys are attached to the most recent
/// key.  Signatures are bound to the most recent user id, user
/// attribute or subkey.
#[derive(Debug)]
pub struct Accumulator<'a> {
    keyring: &'a mut Keyring,
    current_key: Option<usize>,
    current_uid: Option<usize>,
    binding: Binding,
}

impl<'a> Accumulator<'a> {
    /// Appends the records it builds to `keyring`.
    pub fn new(keyring: &'a mut Keyring) -> Self {
        Accumulator {
            keyring,
            current_key: None,
            current_uid: None,
            binding: Binding::Key,
        }
    }

    /// Returns the index of the record being built.
    pub fn current_key(&self) -> Option<usize> {
        self.current_key
    }

    /// Returns the index of the user id signatures are bound to.
    pub fn current_uid(&self) -> Option<usize> {
        self.current_uid
    }

    fn record(&mut self) -> Option<&mut KeyRecord> {
        match self.current_key {
            Some(i) => self.keyring.keys.get_mut(i),
            None => None,
        }
    }

    /// Adds a packet.
    ///
    /// Packets that don't fit, like a user id before any key, are
    /// recorded in `errors` and dropped.
    pub fn add(&mut self, packet: Packet, errors: &mut ErrorStack) {
        let tag = packet.tag();
        match packet {
            Packet::PublicKey(ref k) | Packet::SecretKey(ref k) => {
                let key = k.clone();
                self.keyring.keys.push(KeyRecord::new(key, packet));
                self.current_key = Some(self.keyring.keys.len() - 1);
                self.current_uid = None;
                self.binding = Binding::Key;
                return;
            }
            Packet::Marker(_) => return,
            _ => (),
        }

        let current_uid = self.current_uid;
        let binding = self.binding;
        let record = match self.record() {
            Some(r) => r,
            None => {
                errors.error(Error::MalformedMessage(
                    format!("{} packet without a key", tag)));
                return;
            }
        };

        match packet {
            Packet::PublicSubkey(ref k) | Packet::SecretSubkey(ref k) => {
                record.subkeys.push(k.clone());
                let i = record.subkeys.len() - 1;
                if k.pk_algo().for_encryption() {
                    record.encryption_key = Some(i);
                }
                record.packets.push(packet);
                self.binding = Binding::Subkey(i);
            }
            Packet::UserID(ref u) => {
                record.userids.push(u.clone());
                let i = record.userids.len() - 1;
                record.packets.push(packet);
                self.current_uid = Some(i);
                self.binding = Binding::UserID(i);
            }
            Packet::UserAttribute(ref ua) => {
                record.attributes.push(ua.clone());
                let i = record.attributes.len() - 1;
                record.packets.push(packet);
                self.binding = Binding::UserAttribute(i);
            }
            Packet::Signature(ref sig) => {
                Self::add_signature(record, sig, binding, current_uid,
                                    errors);
                record.packets.push(packet);
            }
            Packet::Trust(ref t) => {
                match record.subsigs.last_mut() {
                    Some(s) => s.trust = Some((t.level(), t.amount())),
                    None => errors.warn(Error::MalformedMessage(
                        "Trust packet without a signature".into())),
                }
                record.packets.push(packet);
            }
            p => errors.warn(Error::MalformedMessage(
                format!("Unexpected {} packet in a keyring", p.tag()))),
        }
    }

    fn add_signature(record: &mut KeyRecord, sig: &Signature,
                     binding: Binding, current_uid: Option<usize>,
                     errors: &mut ErrorStack) {
        let self_sig = match sig.issuer() {
            Some(issuer) => issuer == record.key.keyid(),
            None => true,
        };

        if self_sig {
            if let Binding::Key | Binding::UserID(_) = binding {
                if let Some(d) = sig.key_expiration_time() {
                    record.duration = Some(d);
                }
            }

            if sig.primary_userid() == Some(true) {
                if let Some(uid) = current_uid {
                    match record.primary_userid {
                        Some(p) if p != uid =>
                            errors.warn(Error::DuplicatePrimaryUserID),
                        _ => record.primary_userid = Some(uid),
                    }
                }
            }
        }

        let reason = sig.reason_for_revocation()
            .map(|(code, reason)| (code,
                                   String::from_utf8_lossy(reason).into_owned()));
        let reason = match (reason, sig.typ()) {
            (Some(r), _) => Some(r),
            (None, SignatureType::KeyRevocation)
                | (None, SignatureType::CertificationRevocation) =>
                Some((ReasonForRevocation::Unspecified, String::new())),
            _ => None,
        };
        if let Some((code, reason)) = reason {
            match binding {
                Binding::Key if current_uid.is_none() =>
                    record.revoked = Some(Revocation {
                        userid: None,
                        code,
                        reason,
                    }),
                Binding::UserID(uid) =>
                    record.revocations.push(Revocation {
                        userid: Some(uid),
                        code,
                        reason,
                    }),
                _ => (),
            }
        }

        record.subsigs.push(SubSig {
            binding,
            sig: sig.clone(),
            trust: None,
        });
    }

    /// Feeds a parser event to the accumulator.
    ///
    /// Use this as, or from, the callback of [`parse::parse`].
    ///
    ///   [`parse::parse`]: ../parse/fn.parse.html
    pub fn event(&mut self, event: Event, errors: &mut ErrorStack)
                 -> Result<Control> {
        match event {
            Event::Packet(p) => self.add(p, errors),
            Event::SignatureFooter(sig) => self.add(sig.into(), errors),
            Event::LiteralHeader(_) | Event::SessionKeyNeeded { .. } =>
                errors.warn(Error::MalformedMessage(
                    "Message data in a keyring".into())),
            _ => (),
        }
        Ok(Control::Continue)
    }
}

/// An ordered collection of key records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyring {
    keys: Vec<KeyRecord>,
}

impl Keyring {
    /// Returns an empty keyring.
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads a keyring from `data`.
    ///
    /// Armor is detected automatically.  Recoverable problems are
    /// recorded in `errors`.
    pub fn from_bytes(data: &[u8], errors: &mut ErrorStack)
                      -> Result<Keyring> {
        let mut keyring = Keyring::new();
        keyring.read_bytes(data, PacketParserSettings::default(), errors)?;
        Ok(keyring)
    }

    /// Reads a keyring from the file `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, errors: &mut ErrorStack)
                                     -> Result<Keyring> {
        let data = std::fs::read(path)?;
        Keyring::from_bytes(&data, errors)
    }

    /// Reads the key records in `data` and appends them.
    ///
    /// Returns the number of records added.
    pub fn read_bytes(&mut self, data: &[u8], settings: PacketParserSettings,
                      errors: &mut ErrorStack)
                      -> Result<usize> {
        let before = self.keys.len();
        // The parser holds on to `errors` while it runs.
        let mut acc_errors = ErrorStack::new();
        let mut acc = Accumulator::new(self);
        let r = PacketParserBuilder::from_bytes(data)?
            .settings(settings)
            .build()?
            .drive(errors, |event| acc.event(event, &mut acc_errors));
        errors.append(&mut acc_errors);
        r?;
        Ok(self.keys.len() - before)
    }

    /// Appends the records of `other`.
    pub fn append_keyring(&mut self, other: Keyring) {
        self.keys.extend(other.keys);
    }

    /// Appends a record.
    pub fn push(&mut self, record: KeyRecord) {
        self.keys.push(record);
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns whether the keyring is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the record with index `i`.
    pub fn get(&self, i: usize) -> Option<&KeyRecord> {
        self.keys.get(i)
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<KeyRecord> {
        self.keys.iter()
    }

    /// Finds a record by key id.
    ///
    /// `id` is either a full key id (8 bytes), or its low 4 bytes.
    /// It is matched against the primary keys and subkeys.  The
    /// search starts at `*cursor`; on success, `*cursor` is set to
    /// the position after the match.
    pub fn find_by_id(&self, id: &[u8], cursor: &mut usize)
                      -> Option<(&KeyRecord, KeyMatch)> {
        for (i, record) in self.keys.iter().enumerate().skip(*cursor) {
            if let Some(m) = record.match_id(id) {
                *cursor = i + 1;
                return Some((record, m));
            }
        }
        None
    }

    /// Finds a record by name.
    ///
    /// If `query` looks like a hexadecimal key id or fingerprint
    /// (optionally prefixed with `0x`), the record is looked up by
    /// key id first.  Otherwise, or if that fails, `query` is
    /// matched as a case-insensitive regular expression against the
    /// user ids.  A query that is not a valid regular expression is
    /// matched literally.
    ///
    /// The cursor works as for [`find_by_id`].
    ///
    ///   [`find_by_id`]: #method.find_by_id
    pub fn find_by_name(&self, query: &str, cursor: &mut usize)
                        -> Option<&KeyRecord> {
        if let Some(id) = parse_keyid(query) {
            let mut c = *cursor;
            if let Some((record, _)) = self.find_by_id(&id, &mut c) {
                *cursor = c;
                return Some(record);
            }
        }

        let re = match RegexBuilder::new(query).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                log::debug!("{:?} is not a regex ({}), matching literally",
                            query, e);
                RegexBuilder::new(&regex::escape(query))
                    .case_insensitive(true)
                    .build()
                    .ok()?
            }
        };
        for (i, record) in self.keys.iter().enumerate().skip(*cursor) {
            if record.match_userid(&re) {
                *cursor = i + 1;
                return Some(record);
            }
        }
        None
    }

    /// Finds all records matching `query`.
    ///
    /// See [`find_by_name`].
    ///
    ///   [`find_by_name`]: #method.find_by_name
    pub fn find_all_by_name(&self, query: &str) -> Vec<&KeyRecord> {
        let mut cursor = 0;
        let mut found = Vec::new();
        while let Some(r) = self.find_by_name(query, &mut cursor) {
            found.push(r);
        }
        found
    }

    /// Finds the key with the given key id.
    pub fn find_key(&self, id: &KeyID) -> Option<(&KeyRecord, &Key)> {
        self.keys.iter()
            .find_map(|r| r.find_key(id).map(|(k, _)| (r, k)))
    }

    /// Serializes the public parts of all records.
    pub fn export(&self, armored: bool) -> Result<Vec<u8>> {
        let packets: Vec<Packet> = self.keys.iter()
            .flat_map(|r| r.public_packets())
            .collect();
        write_packets(&packets, armored, armor::Kind::PublicKey)
    }
}

impl<'a> IntoIterator for &'a Keyring {
    type Item = &'a KeyRecord;
    type IntoIter = std::slice::Iter<'a, KeyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

// Parses `query` as a key id, a short key id, or a fingerprint.
fn parse_keyid(query: &str) -> Option<Vec<u8>> {
    let hex = query.strip_prefix("0x")
        .or_else(|| query.strip_prefix("0X"))
        .unwrap_or(query);
    if ! hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = crate::fmt::hex::decode(hex).ok()?;
    match bytes.len() {
        4 | 8 => Some(bytes),
        20 => Some(Fingerprint::from_bytes(&bytes).to_keyid()
                   .as_bytes().to_vec()),
        _ => None,
    }
}
