use std::fs;
use std::io::Write;

use sda_core::config::{ContextConfig, IoConfig};
use sda_core::context::Context;
use sda_core::core::offset::{FileOffset, Offset};
use sda_core::io::error::StoreError;
use sda_core::io::{ByteStore, FileStore};
use sda_core::SdaError;
use tempfile::{NamedTempFile, TempDir};

use crate::common::{context, text_image};

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn create_image_from_file() {
    let file = write_temp(&text_image());
    let ctx = context();
    let image = ctx.create_image("hello.exe", "PE", file.path()).unwrap();

    assert_eq!(image.analyser_name(), "PE");
    assert_eq!(
        image.to_offset(FileOffset::new(0x400)).unwrap(),
        Offset::new(0x401000)
    );
    let store = image.store_record();
    assert_eq!(store["kind"], "file");
    assert_eq!(store["size"], 0x1400);
    assert!(store.get("data").is_none());
}

#[test]
fn patch_and_flush_persists_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.exe");
    fs::write(&path, text_image()).unwrap();

    let ctx = context();
    let image = ctx.create_image("hello.exe", "PE", &path).unwrap();
    image.write_raw(FileOffset::new(0x400), &[0xcc; 4]).unwrap();
    assert_eq!(&image.read(Offset::new(0x401000), 4).unwrap()[..], &[0xcc; 4]);

    // not on disk until flushed
    assert_ne!(&fs::read(&path).unwrap()[0x400..0x404], &[0xcc; 4]);
    image.flush().unwrap();
    assert_eq!(&fs::read(&path).unwrap()[0x400..0x404], &[0xcc; 4]);
}

#[test]
fn writes_past_end_fail_for_file_store() {
    let file = write_temp(&[0u8; 16]);
    let mut store = FileStore::open(file.path(), &IoConfig::default()).unwrap();
    assert!(matches!(
        store.write(14, &[1, 2, 3]),
        Err(StoreError::OutOfBounds {
            offset: 14,
            len: 3,
            size: 16
        })
    ));
    assert!(matches!(
        store.read(16, 1),
        Err(StoreError::OutOfBounds { .. })
    ));
    assert_eq!(store.size(), 16);
}

#[test]
fn oversized_file_is_refused() {
    let file = write_temp(&[0u8; 128]);
    let ctx = Context::new(ContextConfig {
        io: IoConfig {
            max_file_size: 64,
            ..IoConfig::default()
        },
        ..ContextConfig::default()
    });
    let err = ctx.create_image("big", "Flat", file.path()).unwrap_err();
    assert!(matches!(
        err,
        SdaError::Store(StoreError::FileTooLarge {
            limit: 64,
            found: 128
        })
    ));
    assert!(ctx.registry().is_empty());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let ctx = context();
    let err = ctx
        .create_image("gone", "PE", dir.path().join("missing.exe"))
        .unwrap_err();
    assert!(matches!(err, SdaError::Store(StoreError::StdIo(_))));
}
