//! Reads keys and messages produced by GnuPG.

use netpgp::keyring::{KeyMatch, Keyring};
use netpgp::packet::Key;
use netpgp::parse::Parse;
use netpgp::types::{HashAlgorithm, PublicKeyAlgorithm, SignatureType, Timestamp};
use netpgp::verify;
use netpgp::{Config, Context, Error, ErrorStack, Packet};

fn path_to(artifact: &str) -> std::path::PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data", artifact].iter().collect()
}

fn read(name: &str) -> Vec<u8> {
    std::fs::read(path_to(name)).unwrap()
}

fn keyring(names: &[&str]) -> Keyring {
    let mut errors = ErrorStack::new();
    let mut keyring = Keyring::new();
    for name in names {
        keyring.append_keyring(
            Keyring::from_file(path_to(name), &mut errors).unwrap());
    }
    assert!(errors.is_empty(), "{}", errors);
    keyring
}

#[test]
fn fingerprints() {
    let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp",
                            "keys/carol.pgp"]);
    let expected = [
        ("38EAF17E52D9AF2A814BBD94651CD2E92EC2262D",
         Some("F62007724FFD9F7C881D28653D2ED80F0731BEFD"),
         PublicKeyAlgorithm::RSAEncryptSign, 2048),
        ("049F6EBC715E79FF317C0FD2A9E6CBA5DB1B2995", None,
         PublicKeyAlgorithm::DSA, 1024),
        ("576C444E8E2C1099EDA2FE79933D81B7CC0C88ED",
         Some("6CEF866EA58D5CEFDF169BAD888414B69EEA9DFC"),
         PublicKeyAlgorithm::RSAEncryptSign, 2048),
    ];

    assert_eq!(keyring.len(), expected.len());
    for (record, (fpr, subkey, algo, bits)) in keyring.iter().zip(expected.iter()) {
        assert_eq!(&record.fingerprint().to_hex(), fpr);
        assert_eq!(record.keyid(), record.fingerprint().to_keyid());
        assert_eq!(record.key().pk_algo(), *algo);
        assert_eq!(record.key().bits(), *bits);
        assert_eq!(record.encryption_key().map(|k| k.fingerprint().to_hex()),
                   subkey.map(String::from));
    }
}

#[test]
fn v3_fingerprint() {
    let key = match Packet::from_bytes(&read("keys/v3-rsa.pgp")).unwrap() {
        Packet::PublicKey(k) => k,
        p => panic!("unexpected packet {:?}", p),
    };
    assert_eq!(key.version(), 3);
    assert_eq!(key.fingerprint().to_hex(), "E129AEE0D8B2B26ADABB1168DD519505");
    assert_eq!(key.keyid().to_hex(), "5EC16358AC993819");
}

#[test]
fn armored_keyring() {
    let armored = keyring(&["keys/alice.asc"]);
    let binary = keyring(&["keys/alice.pgp"]);
    assert_eq!(armored, binary);
}

#[test]
fn lookups() {
    let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp",
                            "keys/carol.pgp"]);

    // Half a key id matches subkeys too.
    let mut cursor = 0;
    let half = netpgp::fmt::hex::decode("0731BEFD").unwrap();
    let (record, m) = keyring.find_by_id(&half, &mut cursor).unwrap();
    assert_eq!(record.keyid().to_hex(), "651CD2E92EC2262D");
    assert_eq!(m, KeyMatch::Subkey(0));

    let mut cursor = 0;
    let mut names = Vec::new();
    while let Some(r) = keyring.find_by_name("@EXAMPLE\\.org", &mut cursor) {
        names.push(String::from_utf8_lossy(r.userids()[0].value()).into_owned());
    }
    assert_eq!(names, ["Alice <alice@example.org>", "Bob <bob@example.org>",
                       "Carol <carol@example.org>"]);
}

#[test]
fn signed_messages() {
    let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp"]);
    let now = Timestamp::now();
    let mut errors = ErrorStack::new();

    let v = verify::verify_message(&read("messages/hello-signed.asc"),
                                   &keyring, now, &mut errors).unwrap();
    assert!(v.validation.is_valid());
    assert_eq!(v.content, read("messages/hello.txt"));

    let v = verify::verify_cleartext(&read("messages/clear.txt.asc"),
                                     &keyring, now, &mut errors).unwrap();
    assert!(v.validation.is_valid());
    assert_eq!(v.validation.valid[0].typ(), SignatureType::Text);

    let hello = read("messages/hello.txt");
    let v = verify::verify_detached(&hello, &read("messages/hello.txt.sig"),
                                    &keyring, now, &mut errors).unwrap();
    assert!(v.is_valid());
    let v = verify::verify_detached(&hello,
                                    &read("messages/hello-dsa.txt.asc"),
                                    &keyring, now, &mut errors).unwrap();
    assert!(v.is_valid());
    assert_eq!(v.valid[0].signature().pk_algo(), PublicKeyAlgorithm::DSA);
    assert_eq!(v.valid[0].signature().hash_algo(), HashAlgorithm::SHA256);

    // Before the keys existed.
    let v = verify::verify_detached(&hello, &read("messages/hello.txt.sig"),
                                    &keyring, Timestamp::from(1), &mut errors)
        .unwrap();
    assert_eq!(v.not_yet_valid.len(), 1);
    assert!(errors.is_empty());
}

#[test]
fn partial_body_lengths() {
    let keyring = Keyring::new();
    let mut errors = ErrorStack::new();
    let v = verify::verify_message(&read("messages/numbers-literal-partial.pgp"),
                                   &keyring, Timestamp::now(), &mut errors)
        .unwrap();
    assert_eq!(v.content, read("messages/numbers.txt"));
    assert_eq!(v.validation, verify::Validation::default());
}

#[test]
fn key_signatures() {
    let keyring = keyring(&["keys/alice.pgp", "keys/bob.pgp",
                            "keys/carol.pgp"]);
    let v = verify::validate_all_sigs(&keyring, Timestamp::now());
    assert!(v.is_valid());
    assert_eq!(v.validc(), 5);
}

#[test]
fn protected_secret_key() {
    let key = match Packet::from_bytes(&read("keys/carol-secret.pgp")).unwrap() {
        Packet::SecretKey(k) => k,
        p => panic!("unexpected packet {:?}", p),
    };
    assert!(key.secret().unwrap().is_encrypted());

    let e = key.clone().into_keypair(Some(&"hunter3".into())).unwrap_err();
    assert_eq!(e.downcast_ref::<Error>(), Some(&Error::InvalidPassword));

    let mut key: Key = key;
    key.decrypt_secret(&"hunter2".into()).unwrap();
    assert!(! key.secret().unwrap().is_encrypted());
}

#[test]
fn encrypted_messages() {
    let mut ctx = Context::new(Config::default());
    for name in ["alice", "carol"] {
        ctx.read_pubring(path_to(&format!("keys/{}.pgp", name)), false)
            .unwrap();
        ctx.read_secring(path_to(&format!("keys/{}-secret.pgp", name)), false)
            .unwrap();
    }

    let mut names = vec!["messages/hello-encrypted-cast5.pgp"];
    if cfg!(feature = "compression-deflate") {
        names.push("messages/hello-encrypted-aes256.pgp");
        names.push("messages/hello-encrypted-carol.asc");
        names.push("messages/hello-signed-encrypted.pgp");
    }
    for name in names {
        let armored = name.ends_with(".asc");
        let mut asked = 0;
        let v = ctx.decrypt(&read(name), armored, |record, _| {
            asked += 1;
            assert_eq!(record.keyid().to_hex(), "933D81B7CC0C88ED");
            Ok("hunter2".into())
        }).unwrap();
        assert_eq!(v.content, b"hello world", "{}", name);
        assert_eq!(asked, if name.contains("carol") { 1 } else { 0 });
        if name.contains("signed") {
            assert_eq!(v.validation.validc(), 1);
        }
    }
}
