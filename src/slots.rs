use crate::types::{Reservation, Slot};
use chrono::{Datelike, NaiveDate};

/// Hourly appointment labels offered on every bookable day.
pub const SLOT_TIMES: [&str; 8] = [
    "8:00 AM", "9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM", "3:00 PM",
];

const BLACKOUT_YEAR: i32 = 2025;
const BLACKOUT_MONTH: u32 = 3;
const BLACKOUT_DAY: u32 = 7;

/// Closed for the whole day, nothing is offered regardless of bookings.
pub fn is_blackout(date: NaiveDate) -> bool {
    date.year() == BLACKOUT_YEAR && date.month() == BLACKOUT_MONTH && date.day() == BLACKOUT_DAY
}

/// Store representation of a booking date: `month/day/year` without padding.
pub fn format_booking_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Inverse of [`format_booking_date`]. Zero padded parts are accepted too.
pub fn parse_booking_date(date: &str) -> Option<NaiveDate> {
    let mut parts = date.split('/');
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    let year = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_reserved(reservations: &[Reservation], date: &str, time: &str) -> bool {
    reservations
        .iter()
        .any(|reservation| reservation.occupies(date, time))
}

/// Derives the slots offered for `date` from the complete reservation list.
///
/// The blackout date yields an empty list. Every other date yields all
/// [`SLOT_TIMES`], with the ones already booked marked unavailable, so a fully
/// booked day is distinguishable from a closed one.
pub fn compute_slots(date: NaiveDate, reservations: &[Reservation]) -> Vec<Slot> {
    if is_blackout(date) {
        return vec![];
    }

    let booking_date = format_booking_date(date);
    SLOT_TIMES
        .iter()
        .map(|time| Slot {
            time: time.to_string(),
            available: !is_reserved(reservations, &booking_date, time),
        })
        .collect()
}
