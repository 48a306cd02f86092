//! Loading files and feeding them through the codec.

use std::fs;

use bytestream::{IoError, decode, decode_owned, encode, load_file};
use bytestream_integration_test::Team;
use tempfile::tempdir;
use tracing_test::traced_test;

#[test]
fn load_then_encode_is_identity() {
    let tempdir = tempdir().unwrap();
    let path = tempdir.path().join("example.txt");
    fs::write(&path, b"Hello, file!\n\x00\xFF").unwrap();

    let contents = load_file(&path).unwrap();
    assert_eq!(contents, b"Hello, file!\n\x00\xFF");

    let blob = encode(&contents).unwrap();
    assert_eq!(blob, contents);

    let mut decoded = Vec::<u8>::new();
    decode(&blob, &mut decoded).unwrap();
    assert_eq!(decoded, contents);
}

#[test]
fn load_empty_file() {
    let tempdir = tempdir().unwrap();
    let path = tempdir.path().join("empty");
    fs::write(&path, b"").unwrap();

    assert!(load_file(&path).unwrap().is_empty());
}

#[test]
fn stored_structured_blob() {
    let tempdir = tempdir().unwrap();
    let path = tempdir.path().join("team.bin");

    let team = Team::sample();
    fs::write(&path, encode(&team).unwrap()).unwrap();

    let blob = load_file(&path).unwrap();
    assert_eq!(decode_owned::<Team>(&blob).unwrap(), team);
}

#[test]
fn missing_file_is_not_found() {
    let err = load_file("does-not-exist").unwrap_err();

    assert!(matches!(
        &err,
        IoError::NotFound { path } if path.ends_with("does-not-exist")
    ));
    assert_eq!(err.to_string(), "file does not exist: does-not-exist");
}

#[test]
fn directory_is_other_error() {
    let tempdir = tempdir().unwrap();

    let err = load_file(tempdir.path()).unwrap_err();
    match err {
        IoError::Other { path, source } => {
            assert_eq!(path, tempdir.path());
            assert_ne!(source.kind(), std::io::ErrorKind::NotFound);
        }
        IoError::NotFound { .. } => panic!("a directory exists"),
    }
}

#[test]
#[traced_test]
fn load_is_traced() {
    let tempdir = tempdir().unwrap();
    let path = tempdir.path().join("traced.txt");
    fs::write(&path, b"abc").unwrap();

    load_file(&path).unwrap();
    let blob = encode("abc").unwrap();
    assert_eq!(blob, b"abc");

    assert!(logs_contain("loaded file"));
    assert!(logs_contain("len=3"));
    assert!(logs_contain("encoded value"));
    assert!(logs_contain("text"));
}
