//! Creates keys and messages, and reads them back.

use netpgp::keyring::KeyRecord;
use netpgp::packet::Key;
use netpgp::types::HashAlgorithm;
use netpgp::{Config, Context, Result, SignMode};
use netpgp::crypto::Password;

fn path_to(artifact: &str) -> std::path::PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data", artifact].iter().collect()
}

fn no_passphrase(_: &KeyRecord, _: &Key) -> Result<Password> {
    panic!("unexpected passphrase request")
}

#[test]
fn rsa_2048() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut ctx = Context::new(Config::default());
    let fpr = ctx.generate_key("Test <t@example.com>", 2048).unwrap();
    let key = ctx.find_key("t@example.com", &mut 0).unwrap().clone();
    assert_eq!(key.fingerprint(), fpr);
    assert_eq!(key.key().bits(), 2048);

    let mut signed = ctx.sign(b"hello world", &key, SignMode::Attached,
                              None, None, no_passphrase).unwrap();
    let v = ctx.verify(&signed, None, false).unwrap();
    assert_eq!(v.validc(), 1);
    assert_eq!(v.invalidc(), 0);
    assert!(v.is_valid());
    let sig = v.valid[0].signature();
    assert_eq!(sig.hash_algo(), HashAlgorithm::SHA256);
    assert_eq!(sig.issuer(), Some(key.keyid()));
    assert_eq!(v.valid[0].signer_userid(), Some("Test <t@example.com>"));

    // The signature packet is last, and the last byte of the
    // message is the last byte of its MPI.
    *signed.last_mut().unwrap() ^= 0x01;
    let v = ctx.verify(&signed, None, false).unwrap();
    assert_eq!(v.validc(), 0);
    assert_eq!(v.invalidc(), 1);
    assert!(! v.is_valid());
}

fn context(config: Config) -> Context {
    let mut ctx = Context::new(config);
    for name in ["alice", "bob"] {
        ctx.read_pubring(path_to(&format!("keys/{}.pgp", name)), false)
            .unwrap();
        ctx.read_secring(path_to(&format!("keys/{}-secret.pgp", name)), false)
            .unwrap();
    }
    ctx
}

#[test]
fn sign_verify_grid() {
    let _ = env_logger::builder().is_test(true).try_init();

    let grid = [
        ("alice", HashAlgorithm::SHA1),
        ("alice", HashAlgorithm::SHA256),
        ("alice", HashAlgorithm::SHA512),
        ("bob", HashAlgorithm::SHA1),
        ("bob", HashAlgorithm::SHA256),
    ];
    let msg = b"The quick brown fox jumps over the lazy dog.";

    for (name, hash) in grid.iter() {
        let mut ctx = context(Config::default().hash_algo(*hash));
        let key = ctx.find_key(name, &mut 0).unwrap().clone();

        let signed = ctx.sign(msg, &key, SignMode::Attached, None, None,
                              no_passphrase).unwrap();
        let v = ctx.verify_message(&signed, false).unwrap();
        assert_eq!(v.validation.validc(), 1, "{} {}", name, hash);
        assert_eq!(v.validation.valid[0].signature().hash_algo(), *hash);
        assert_eq!(&v.content[..], &msg[..]);

        let mut tampered = signed.clone();
        let i = tampered.windows(msg.len()).position(|w| w == &msg[..])
            .unwrap();
        tampered[i + 4] ^= 0x20;
        let v = ctx.verify(&tampered, None, false).unwrap();
        assert_eq!(v.validc(), 0, "{} {}", name, hash);
        assert_eq!(v.invalidc(), 1, "{} {}", name, hash);

        let sig = ctx.sign(msg, &key, SignMode::Detached, None, None,
                           no_passphrase).unwrap();
        assert_eq!(ctx.verify(msg, Some(&sig), false).unwrap().validc(), 1);
        let mut flipped = msg.to_vec();
        flipped[0] ^= 0x01;
        let v = ctx.verify(&flipped, Some(&sig), false).unwrap();
        assert_eq!(v.invalidc(), 1, "{} {}", name, hash);
        assert!(ctx.errors().is_empty());
    }
}

#[test]
fn sign_then_encrypt_large() {
    let mut ctx = context(Config::default().armor(true));
    let alice = ctx.find_key("alice", &mut 0).unwrap().clone();

    // More than one chunk of partial body lengths everywhere.
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let signed = ctx.sign(&data, &alice, SignMode::Attached, None, None,
                          no_passphrase).unwrap();
    let encrypted = ctx.encrypt(&signed, &alice).unwrap();
    assert!(encrypted.starts_with(b"-----BEGIN PGP MESSAGE-----"));

    let v = ctx.decrypt(&encrypted, true, no_passphrase).unwrap();
    assert_eq!(v.content, signed);
    let v = ctx.verify_message(&v.content, true).unwrap();
    assert_eq!(v.validation.validc(), 1);
    assert_eq!(v.content, data);
}

#[test]
fn secret_key_protection() {
    let mut ctx = Context::new(Config::default());
    ctx.generate_key("Protected <p@example.com>", 1024).unwrap();
    let secret = ctx.secring().get(0).unwrap().clone();
    let exported = ctx.export_key(&secret, false, Some(&"pw".into())).unwrap();

    let mut other = Context::new(Config::default().max_passphrase_attempts(2));
    other.import_key(&exported, false).unwrap();
    let key = other.find_key("Protected", &mut 0).unwrap().clone();

    let mut asked = 0;
    let e = other.sign(b"x", &key, SignMode::Detached, None, None, |_, _| {
        asked += 1;
        Ok("not it".into())
    }).unwrap_err();
    assert_eq!(asked, 2);
    assert_eq!(e.downcast_ref::<netpgp::Error>(),
               Some(&netpgp::Error::InvalidPassword));

    let sig = other.sign(b"x", &key, SignMode::Detached, None, None,
                         |_, _| Ok("pw".into())).unwrap();
    assert_eq!(ctx.verify(b"x", Some(&sig), false).unwrap().validc(), 1);
}
