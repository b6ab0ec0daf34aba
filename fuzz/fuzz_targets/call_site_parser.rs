#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use timeout_monitor::resolver::find_caller_in_stack;

fuzz_target!(|data: &[u8]| {
    // Arbitrary trace text; resolution may fail but must not panic
    if let Ok(stack) = std::str::from_utf8(data) {
        for method in ["setInterval", "setTimeout"] {
            if let Some(site) = find_caller_in_stack(method, stack, Path::new("/srv/app")) {
                assert!(site.line > 0 && site.column > 0);
            }
        }
    }
});
