//! Plain-text event files.
//!
//! One event per line, `time,detector` or `time detector`. Blank lines and
//! `#` comments are ignored, and a first line starting with a letter is
//! treated as a header.

use std::path::Path;

use nc_common::{Error, Event, EventStream, InputError, Result};
use tracing::debug;

fn parse_line(line: &str, number: usize) -> Result<Event> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty());
    let bad = |what: &str| -> Error {
        InputError::Other(format!("line {number}: {what} in {line:?}")).into()
    };

    let time = fields
        .next()
        .ok_or_else(|| bad("missing time"))?
        .parse::<f64>()
        .map_err(|_| bad("unparseable time"))?;
    let detector = match fields.next() {
        Some(field) => field
            .parse::<u32>()
            .map_err(|_| bad("unparseable detector"))?,
        None => 0,
    };
    if fields.next().is_some() {
        return Err(bad("extra columns"));
    }
    Ok(Event::new(time, detector))
}

/// Parse event text into a sorted stream.
pub fn parse_events(text: &str) -> Result<EventStream> {
    let mut events = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if index == 0 && line.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        events.push(parse_line(line, index + 1)?);
    }
    if events.is_empty() {
        return Err(InputError::EmptyEvents.into());
    }
    EventStream::new(events)
}

/// Read and parse an event file.
pub fn read_events(path: &Path) -> Result<EventStream> {
    let text = std::fs::read_to_string(path)?;
    let stream = parse_events(&text)?;
    debug!(path = %path.display(), events = stream.len(), "event file read");
    Ok(stream)
}
