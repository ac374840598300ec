//! Fuzz target for Sequential (Feynman) binning.
//!
//! Any stream that builds must bin every event exactly once.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nc_common::{EmptyGates, Event, EventStream};
use nc_core::binning::{BinningStrategy, Sequential};

#[derive(Debug, Arbitrary)]
struct Input {
    events: Vec<(u32, u8)>,
    gatewidth: u16,
    skip_empty: bool,
}

fuzz_target!(|input: Input| {
    let events: Vec<Event> = input
        .events
        .iter()
        .map(|&(t, d)| Event::new(f64::from(t) / 16.0, u32::from(d)))
        .collect();
    let Ok(stream) = EventStream::new(events) else {
        return;
    };
    let policy = if input.skip_empty {
        EmptyGates::Skip
    } else {
        EmptyGates::Tally
    };
    let width = f64::from(input.gatewidth) / 4.0;
    if let Ok(hist) = Sequential::new(policy).bin(&stream, &width) {
        let counted: u64 = hist
            .frequency()
            .iter()
            .enumerate()
            .map(|(k, f)| k as u64 * f)
            .sum();
        assert_eq!(counted, stream.len() as u64);
    }
});
