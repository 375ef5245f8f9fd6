use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    // At least six digits, optionally separated by spaces, dashes, brackets or a leading plus.
    static ref PHONE_NUMBER: Regex = Regex::new(r"^[+()\- ]*(?:[0-9][()\- ]*){6,}$").unwrap();
}

/// A booked appointment as it is kept in the `bookings` table.
///
/// `date` uses the store representation produced by
/// [`format_booking_date`](crate::slots::format_booking_date), e.g. `"3/7/2025"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub date: String,
    pub time: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn occupies(&self, date: &str, time: &str) -> bool {
        self.date == date && self.time == time
    }
}

/// The five fields a user submits to book a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReservationCandidate {
    #[validate(length(min = 1, message = "Please select a date"))]
    pub date: String,
    #[validate(length(min = 1, message = "Please select a time"))]
    pub time: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

impl ReservationCandidate {
    pub fn into_reservation(self, id: Uuid, created_at: DateTime<Utc>) -> Reservation {
        Reservation {
            id,
            date: self.date,
            time: self.time,
            name: self.name,
            phone: self.phone,
            email: self.email,
            created_at,
        }
    }
}

/// Contact details entered in the booking form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// A contact-form submission before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EnquiryForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(regex(path = *PHONE_NUMBER, message = "A valid phone number is required"))]
    pub phone: String,
    #[serde(default)]
    pub service: Option<String>,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

impl EnquiryForm {
    pub fn into_enquiry(self, id: Uuid, created_at: DateTime<Utc>) -> Enquiry {
        Enquiry {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            service: self.service,
            message: self.message,
            created_at,
        }
    }
}

/// A stored contact-form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// One offerable appointment time on a given date. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Bookings,
    Enquiries,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Bookings => write!(f, "bookings"),
            Table::Enquiries => write!(f, "enquiries"),
        }
    }
}

/// Pushed to every subscriber after a reservation was inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub table: Table,
    pub record: Reservation,
}

impl ReservationEvent {
    pub fn created(record: Reservation) -> Self {
        Self {
            table: Table::Bookings,
            record,
        }
    }
}
