use crate::store::BookingStore;
use crate::timegrid::Slot;
use chrono::NaiveDate;
use tracing::debug;

/// Strict half-open overlap: [s1, e1) and [s2, e2) share an instant iff
/// `s1 < e2 && s2 < e1`. Touching endpoints do not overlap. This single
/// predicate backs both single and recurring availability checks.
pub fn overlaps(s1: Slot, e1: Slot, s2: Slot, e2: Slot) -> bool {
    s1 < e2 && s2 < e1
}

/// True iff no stored booking on that room/date overlaps [start, end).
pub fn is_available(
    store: &BookingStore,
    room: &str,
    date: NaiveDate,
    start: Slot,
    end: Slot,
) -> bool {
    match store.find_overlapping(room, date, start, end) {
        Some(existing) => {
            debug!(
                "{room} {date} {start}-{end} collides with existing {}-{}",
                existing.start, existing.end
            );
            false
        }
        None => true,
    }
}

/// Evaluate availability over a whole date set (the weekly occurrences of a
/// recurring booking). Returns the first date that fails, so the caller can
/// tell the user which week to adjust.
pub fn check_range(
    store: &BookingStore,
    room: &str,
    dates: &[NaiveDate],
    start: Slot,
    end: Slot,
) -> Result<(), NaiveDate> {
    for &date in dates {
        if !is_available(store, room, date, start, end) {
            return Err(date);
        }
    }
    Ok(())
}
