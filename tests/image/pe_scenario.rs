use std::sync::Arc;

use sda_core::core::data_type::DataType;
use sda_core::core::object::ContextObject;
use sda_core::core::offset::{FileOffset, Offset};
use sda_core::core::section::ImageSectionType;
use sda_core::core::symbol::{Symbol, SymbolKind};
use sda_core::image::SectionLookup;
use sda_core::SdaError;

use crate::common::{context, text_image, three_section_image, PeBuilder, TEXT};

#[test]
fn text_section_translation() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("hello.exe", "PE", &text_image())
        .unwrap();

    assert_eq!(image.base_address(), Offset::new(0x400000));
    assert_eq!(image.entry_point_offset(), Offset::new(0x401000));
    assert_eq!(image.size(), 0x402000);
    assert_eq!(
        image.to_offset(FileOffset::new(0x400)).unwrap(),
        Offset::new(0x401000)
    );

    match image.get_image_section_at(Offset::new(0x401050)) {
        SectionLookup::Found(section) => {
            assert_eq!(section.name(), ".text");
            assert_eq!(section.section_type(), ImageSectionType::Code);
        }
        other => panic!("expected .text, got {:?}", other),
    }
    assert_eq!(
        image.get_image_section_at(Offset::new(0x500000)),
        SectionLookup::OutOfBounds
    );
    // header bytes lie inside the image but no section covers them
    assert_eq!(
        image.get_image_section_at(Offset::new(0x400010)),
        SectionLookup::Unmapped
    );
}

#[test]
fn canonical_read_matches_raw_bytes() {
    let ctx = context();
    let data = text_image();
    let image = ctx.create_image_from_bytes("hello.exe", "PE", &data).unwrap();

    let canonical = image.read(Offset::new(0x401010), 16).unwrap();
    assert_eq!(&canonical[..], &data[0x410..0x420]);

    let raw = image.read_raw(FileOffset::new(0x410), 16).unwrap();
    assert_eq!(canonical, raw);
}

#[test]
fn every_raw_byte_roundtrips() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("three.exe", "PE", &three_section_image())
        .unwrap();

    for section in image.sections() {
        for f in section.raw_range().step_by(0x40) {
            let f = FileOffset::new(f);
            let o = image.to_offset(f).unwrap();
            assert_eq!(image.to_image_file_offset(o).unwrap(), f);
        }
    }
}

#[test]
fn sections_are_disjoint() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("three.exe", "PE", &three_section_image())
        .unwrap();
    let sections = image.sections();
    assert_eq!(sections.len(), 3);

    for o in (0x400000..image.size()).step_by(0x80) {
        let covering = sections
            .iter()
            .filter(|s| s.contains(Offset::new(o)))
            .count();
        assert!(covering <= 1, "offset {:#x} covered {} times", o, covering);
    }
}

#[test]
fn virtual_tail_has_no_file_offset() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("three.exe", "PE", &three_section_image())
        .unwrap();

    // .data has 0x200 raw bytes in a 0x1000 byte section
    assert!(image.to_image_file_offset(Offset::new(0x4021ff)).is_ok());
    let err = image.to_image_file_offset(Offset::new(0x402200)).unwrap_err();
    assert!(matches!(err, SdaError::UnmappedOffset { .. }));
    assert!(image.get_image_section_at(Offset::new(0x402200)).is_found());

    let bss = image
        .get_image_section_at(Offset::new(0x404000))
        .section()
        .cloned()
        .unwrap();
    assert_eq!(bss.name(), ".bss");
    assert_eq!(bss.size_of_raw_data(), 0);
}

#[test]
fn pe32_plus_high_base() {
    let ctx = context();
    let data = PeBuilder::new()
        .pe32_plus(0x1_4000_0000)
        .entry_point(0x1100)
        .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
        .build();
    let image = ctx.create_image_from_bytes("x64.exe", "PE", &data).unwrap();
    assert_eq!(image.base_address(), Offset::new(0x1_4000_0000));
    assert_eq!(image.entry_point_offset(), Offset::new(0x1_4000_1100));
    assert_eq!(
        image.to_offset(FileOffset::new(0x400)).unwrap(),
        Offset::new(0x1_4000_1000)
    );
}

#[test]
fn reanalysis_is_deterministic() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("three.exe", "PE", &three_section_image())
        .unwrap();
    let before = image.sections();
    image.analyse().unwrap();
    assert_eq!(before, image.sections());
}

#[test]
fn symbol_resolution_through_image() {
    let ctx = context();
    let image = ctx
        .create_image_from_bytes("hello.exe", "PE", &text_image())
        .unwrap();
    let table = image.global_symbol_table();

    let start = Symbol::new(&ctx, SymbolKind::Function, "start", DataType::void(&ctx));
    table.add_symbol(image.entry_point_offset(), Arc::clone(&start));

    let hit = table.get_symbol_at(Offset::new(0x401004)).unwrap();
    assert!(Arc::ptr_eq(&hit.symbol, &start));
    assert_eq!(hit.reference(), "start+0x4");
    assert_eq!(hit.table.name(), "hello.exe.global");
}
