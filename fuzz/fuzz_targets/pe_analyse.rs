#![no_main]
use libfuzzer_sys::fuzz_target;
use sda_core::analyser::ImageAnalyser;

fuzz_target!(|data: &[u8]| {
    let analyser = sda_core::formats::pe::PeImageAnalyser::default();
    if let Ok(result) = analyser.analyse(data) {
        assert!(result.validate().is_ok());
    }
});
