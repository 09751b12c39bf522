#![no_main]
use kairos::resources::render;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must never panic, whatever the brace layout.
        let _ = render("fuzz", s, &[("inquiry", "{value}"), ("kairos_info", "")]);
    }
});
