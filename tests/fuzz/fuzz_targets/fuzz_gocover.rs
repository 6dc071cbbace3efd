#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parser must not panic on any input.
    if let Ok(ranges) = covgate::parsers::gocover::parse(data) {
        let _ = covgate::calc::aggregate(&ranges, None, 50.0);
    }
});
