//! Booking calendar backend of the roofing website.
//!
//! Slots are derived from the stored reservations on every request
//! ([`slots::compute_slots`]). Bookings go through a read-check-write
//! ([`coordinator::attempt_reservation`]) and every new reservation is
//! pushed to subscribed sessions ([`session::BookingSession`]).

pub mod backend;
pub mod configuration;
pub mod configuration_handler;
pub mod coordinator;
pub mod database_interface;
pub mod http;
pub mod local_reservations;
pub mod notifier;
mod schema;
pub mod session;
pub mod slots;
#[cfg(test)]
mod testutils;
pub mod types;
