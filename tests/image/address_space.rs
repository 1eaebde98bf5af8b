use sda_core::core::object::ContextObject;
use sda_core::core::offset::Offset;
use sda_core::image::AddressSpace;

use crate::common::{context, PeBuilder, TEXT};

#[test]
fn images_share_one_canonical_domain() {
    let ctx = context();
    let exe = ctx
        .create_image_from_bytes(
            "app.exe",
            "PE",
            &PeBuilder::new()
                .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
                .build(),
        )
        .unwrap();
    let dll = ctx
        .create_image_from_bytes(
            "lib.dll",
            "PE",
            &PeBuilder::new()
                .image_base(0x1000_0000)
                .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
                .build(),
        )
        .unwrap();

    let space = AddressSpace::new(&ctx, "process");
    space.add_image(exe);
    space.add_image(dll);

    assert_eq!(space.image_at(Offset::new(0x401000)).unwrap().name(), "app.exe");
    assert_eq!(space.image_at(Offset::new(0x1000_1000)).unwrap().name(), "lib.dll");
    assert!(space.image_at(Offset::new(0x800000)).is_none());
    assert_eq!(space.images().len(), 2);
}
