use std::sync::Arc;

use sda_core::analyser::{FlatImageAnalyser, ImageAnalyser, MalformedImage};
use sda_core::core::offset::{FileOffset, Offset};
use sda_core::formats::pe::PeImageAnalyser;
use sda_core::image::{Image, SectionLookup};
use sda_core::io::VectorStore;
use sda_core::symbol_table::SymbolTable;
use sda_core::SdaError;

use crate::common::{context, text_image, PeBuilder, E_LFANEW, TEXT};

fn pe_image(ctx: &Arc<sda_core::context::Context>, bytes: Vec<u8>) -> Arc<Image> {
    Image::new(
        ctx,
        Box::new(VectorStore::from_bytes(bytes, false)),
        Arc::new(PeImageAnalyser::default()),
        "input.exe",
        SymbolTable::new(ctx, "global"),
    )
}

#[test]
fn truncated_header_leaves_image_unanalysed() {
    let ctx = context();
    let image = pe_image(&ctx, vec![0x4D, 0x5A, 0x90, 0x00]);

    let err = image.analyse().unwrap_err();
    assert!(matches!(
        err.root(),
        SdaError::MalformedImage(MalformedImage::TruncatedHeader {
            expected: 64,
            actual: 4
        })
    ));
    assert!(!image.is_analysed());
    assert!(image.sections().is_empty());
    assert_eq!(image.size(), 4);
}

#[test]
fn failed_reanalysis_keeps_previous_layout() {
    let ctx = context();
    let image = pe_image(&ctx, text_image());
    image.analyse().unwrap();
    let before = image.sections();

    // corrupt the PE signature and try again
    image.write_raw(FileOffset::new(E_LFANEW as u64), b"XX").unwrap();
    let err = image.analyse().unwrap_err();
    assert!(matches!(
        err.root(),
        SdaError::MalformedImage(MalformedImage::BadSignature(_))
    ));

    assert_eq!(image.sections(), before);
    assert_eq!(image.base_address(), Offset::new(0x400000));
    assert!(image.get_image_section_at(Offset::new(0x401000)).is_found());
}

#[test]
fn adversarial_inputs_never_panic() {
    let analyser = PeImageAnalyser::default();
    let base = PeBuilder::new()
        .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
        .build();

    for len in [0usize, 1, 2, 63, 64, 0x84, 0x98, 0x100, 0x178, 0x190] {
        let _ = analyser.analyse(&base[..len.min(base.len())]);
    }

    // flip every header byte in turn
    for i in 0..0x1a0 {
        let mut data = base.clone();
        data[i] ^= 0xff;
        let _ = analyser.analyse(&data);
    }

    // e_lfanew pointing far past the end
    let mut data = base.clone();
    data[0x3c..0x40].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        analyser.analyse(&data),
        Err(MalformedImage::TruncatedHeader { .. })
    ));
}

#[test]
fn raw_data_past_eof_is_rejected() {
    let data = PeBuilder::new()
        .file_len(0x800)
        .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
        .build();
    let ctx = context();
    let err = ctx.create_image_from_bytes("short.exe", "PE", &data).unwrap_err();
    assert!(matches!(
        err.root(),
        SdaError::MalformedImage(MalformedImage::InconsistentSectionTable(_))
    ));
}

#[test]
fn flat_analyser_rejects_empty_input() {
    let ctx = context();
    let image = Image::new(
        &ctx,
        Box::new(VectorStore::new(true)),
        Arc::new(FlatImageAnalyser::new(0x1000)),
        "empty",
        SymbolTable::new(&ctx, "global"),
    );
    assert!(image.analyse().is_err());
    assert_eq!(
        image.get_image_section_at(Offset::new(0)),
        SectionLookup::OutOfBounds
    );
}
