use std::fs;
use std::path::{Path, PathBuf};

use netpgp::parse::packets_from_bytes;
use netpgp::serialize::Marshal;
use netpgp::Packet;

mod for_each_artifact {
    use super::*;

    #[test]
    fn packet_roundtrip() {
        let mut checked = 0;
        for_all_files(&test_data_dir(), |src| {
            for_all_packets(src, |p| {
                let v = p.to_vec()?;
                let q = packets_from_bytes(&v)?;
                assert_eq!(q.len(), 1, "{}", src.display());
                assert_eq!(p, &q[0], "{}", src.display());
                checked += 1;
                Ok(())
            })
        }).unwrap();
        assert!(checked > 20);
    }
}

/// Computes the path to the test directory.
fn test_data_dir() -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data"].iter().collect()
}

/// Maps the given function `fun` over all files in `src`.
fn for_all_files<F>(src: &Path, mut fun: F) -> netpgp::Result<()>
    where F: FnMut(&Path) -> netpgp::Result<()>
{
    let mut dirs = vec![src.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                fun(&path)?;
            }
            if path.is_dir() {
                dirs.push(path.clone());
            }
        }
    }
    Ok(())
}

/// Maps the given function `fun` over all packets in `src`.
fn for_all_packets<F>(src: &Path, mut fun: F) -> netpgp::Result<()>
    where F: FnMut(&Packet) -> netpgp::Result<()>
{
    let packets = match packets_from_bytes(&fs::read(src)?) {
        Ok(packets) => packets,
        // Ignore junk.
        Err(_) => return Ok(()),
    };

    for packet in packets.iter() {
        if let Packet::Unknown(_) = packet {
            // Ignore packets that we cannot parse.
            continue;
        }
        if let Err(e) = fun(packet) {
            eprintln!("Failed on packet {:?} in {}", packet, src.display());
            return Err(e);
        }
    }
    Ok(())
}
