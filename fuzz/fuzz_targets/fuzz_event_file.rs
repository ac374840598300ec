//! Fuzz target for plain-text event files.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nc_core::input::parse_events;

fuzz_target!(|data: &str| {
    let _ = parse_events(data);
});
