//! Fuzz target for the Rossi binning variants.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nc_common::{Event, EventStream, PairingPolicy, RossiVariant};
use nc_core::binning::{BinningStrategy, RossiBinning, RossiWindow};

#[derive(Debug, Arbitrary)]
struct Input {
    events: Vec<(u16, u8)>,
    reset_time: u16,
    bins: u8,
    variant: u8,
    cross_channel: bool,
}

fuzz_target!(|input: Input| {
    let events: Vec<Event> = input
        .events
        .iter()
        .take(512)
        .map(|&(t, d)| Event::new(f64::from(t) / 8.0, u32::from(d % 4)))
        .collect();
    let Ok(stream) = EventStream::new(events) else {
        return;
    };
    let variant = match input.variant % 3 {
        0 => RossiVariant::TypeI,
        1 => RossiVariant::TypeII,
        _ => RossiVariant::TypeIII,
    };
    let pairing = if input.cross_channel {
        PairingPolicy::CrossChannel
    } else {
        PairingPolicy::All
    };
    let window = RossiWindow::new(f64::from(input.reset_time) / 8.0, usize::from(input.bins));
    if let Ok(hist) = RossiBinning::new(variant, pairing).bin(&stream, &window) {
        let n = stream.len() as f64;
        assert_eq!(hist.frequency().len(), usize::from(input.bins));
        assert!(hist.total() <= n * (n - 1.0) / 2.0);
    }
});
