//! Resolving reported coordinates against the static fallback.

use plcbridge_types::{Location, Position};
use tracing::debug;

/// Resolve a reported location into the position attached to records.
///
/// Latitude and longitude are judged independently: a coordinate whose
/// character at `fix_digit_offset` is `0` means the receiver has no fix and
/// the fallback coordinate is used. Coordinates too short to have that digit,
/// or that are not decimal numbers, fall back too.
pub fn resolve_position(location: &Location, fallback: Position, fix_digit_offset: usize) -> Position {
    Position {
        lat: resolve_coordinate(&location.latitude, fallback.lat, fix_digit_offset),
        long: resolve_coordinate(&location.longitude, fallback.long, fix_digit_offset),
    }
}

fn resolve_coordinate(reported: &str, fallback: f64, fix_digit_offset: usize) -> f64 {
    let reported = reported.trim();
    match reported.chars().nth(fix_digit_offset) {
        Some('0') | None => {
            debug!(%reported, fallback, "no GPS fix, using fallback coordinate");
            fallback
        }
        Some(_) => reported.parse().unwrap_or_else(|_| {
            debug!(%reported, fallback, "unparseable coordinate, using fallback");
            fallback
        }),
    }
}
