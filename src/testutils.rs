use crate::{
    backend::{ReservationEvents, ReservationStore, StoreError},
    types::{Enquiry, EnquiryForm, Reservation, ReservationCandidate, ReservationEvent},
};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::watch::{self, Sender};
use uuid::Uuid;

pub fn candidate(date: &str, time: &str) -> ReservationCandidate {
    ReservationCandidate {
        date: date.into(),
        time: time.into(),
        name: "Jane Doe".into(),
        phone: "0400000000".into(),
        email: "jane@example.com".into(),
    }
}

pub fn reservation(date: &str, time: &str) -> Reservation {
    candidate(date, time).into_reservation(Uuid::new_v4(), Utc::now())
}

pub fn enquiry_form() -> EnquiryForm {
    EnquiryForm {
        name: "John Smith".into(),
        email: "john@example.com".into(),
        phone: "0411 222 333".into(),
        service: Some("Roof restoration".into()),
        message: "Several cracked tiles after the storm".into(),
    }
}

pub async fn read_from_event_stream(stream: &mut ReservationEvents) -> ReservationEvent {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("No reservation event received")
        .expect("Reservation event stream closed")
}

pub struct FakeReservationStoreInner {
    pub success: AtomicBool,
    pub reads_succeed: AtomicBool,
    pub enforce_unique: AtomicBool,
    pub calls_to_reservations: AtomicU64,
    pub calls_to_insert_reservation: AtomicU64,
    pub calls_to_insert_enquiry: AtomicU64,
    pub calls_to_enquiries: AtomicU64,
    /// Booked by "another session" right after the next read returned.
    pub book_after_read: Mutex<Option<ReservationCandidate>>,
    pub bookings: Mutex<Vec<Reservation>>,
    pub enquiries: Mutex<Vec<Enquiry>>,
    sender: Sender<Option<ReservationEvent>>,
}

#[derive(Clone)]
pub struct FakeReservationStore(pub Arc<FakeReservationStoreInner>);

impl FakeReservationStoreInner {
    fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            success: AtomicBool::new(true),
            reads_succeed: AtomicBool::new(true),
            enforce_unique: AtomicBool::new(true),
            calls_to_reservations: AtomicU64::default(),
            calls_to_insert_reservation: AtomicU64::default(),
            calls_to_insert_enquiry: AtomicU64::default(),
            calls_to_enquiries: AtomicU64::default(),
            book_after_read: Mutex::default(),
            bookings: Mutex::default(),
            enquiries: Mutex::default(),
            sender,
        }
    }
}

impl FakeReservationStore {
    pub fn new() -> Self {
        Self(Arc::new(FakeReservationStoreInner::new()))
    }

    /// Writes a booking the way a different browser session would.
    pub fn book_directly(&self, candidate: ReservationCandidate) -> Reservation {
        let reservation = candidate.into_reservation(Uuid::new_v4(), Utc::now());
        self.0.bookings.lock().unwrap().push(reservation.clone());
        self.0
            .sender
            .send_replace(Some(ReservationEvent::created(reservation.clone())));
        reservation
    }

    pub fn calls_to_reservations(&self) -> u64 {
        self.0.calls_to_reservations.load(Ordering::SeqCst)
    }

    pub fn calls_to_insert_reservation(&self) -> u64 {
        self.0.calls_to_insert_reservation.load(Ordering::SeqCst)
    }

    pub fn calls_to_insert_enquiry(&self) -> u64 {
        self.0.calls_to_insert_enquiry.load(Ordering::SeqCst)
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable("Supposed to fail".into())
    }
}

#[async_trait]
impl ReservationStore for FakeReservationStore {
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        self.0.calls_to_reservations.fetch_add(1, Ordering::SeqCst);
        if !self.0.reads_succeed.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let reservations = self.0.bookings.lock().unwrap().clone();
        let interloper = self.0.book_after_read.lock().unwrap().take();
        if let Some(candidate) = interloper {
            self.book_directly(candidate);
        }
        Ok(reservations)
    }

    async fn insert_reservation(
        &self,
        candidate: ReservationCandidate,
    ) -> Result<Reservation, StoreError> {
        self.0
            .calls_to_insert_reservation
            .fetch_add(1, Ordering::SeqCst);
        if !self.0.success.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let duplicate = self
            .0
            .bookings
            .lock()
            .unwrap()
            .iter()
            .any(|booked| booked.occupies(&candidate.date, &candidate.time));
        if duplicate && self.0.enforce_unique.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict {
                date: candidate.date,
                time: candidate.time,
            });
        }
        Ok(self.book_directly(candidate))
    }

    async fn insert_enquiry(&self, form: EnquiryForm) -> Result<Enquiry, StoreError> {
        self.0.calls_to_insert_enquiry.fetch_add(1, Ordering::SeqCst);
        if !self.0.success.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let enquiry = form.into_enquiry(Uuid::new_v4(), Utc::now());
        self.0.enquiries.lock().unwrap().push(enquiry.clone());
        Ok(enquiry)
    }

    async fn enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        self.0.calls_to_enquiries.fetch_add(1, Ordering::SeqCst);
        if !self.0.reads_succeed.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.0.enquiries.lock().unwrap().clone())
    }

    fn subscribe(&self) -> ReservationEvents {
        ReservationEvents::from_receiver(self.0.sender.subscribe())
    }
}
