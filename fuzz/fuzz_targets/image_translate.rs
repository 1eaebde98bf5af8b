#![no_main]
use libfuzzer_sys::fuzz_target;
use sda_core::config::ContextConfig;
use sda_core::context::Context;
use sda_core::core::offset::FileOffset;

fuzz_target!(|data: &[u8]| {
    let ctx = Context::new(ContextConfig::default());
    let Ok(image) = ctx.create_image_from_bytes("fuzz", "PE", data) else {
        return;
    };
    for section in image.sections() {
        for f in section.raw_range().step_by(0x100) {
            let f = FileOffset::new(f);
            if let Ok(o) = image.to_offset(f) {
                assert_eq!(image.to_image_file_offset(o).ok(), Some(f));
            }
        }
    }
});
