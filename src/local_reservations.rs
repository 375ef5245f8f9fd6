use crate::{
    backend::{ReservationEvents, ReservationStore, StoreError},
    types::{Enquiry, EnquiryForm, Reservation, ReservationCandidate, ReservationEvent},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch::{self, Sender};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    bookings: Vec<Reservation>,
    enquiries: Vec<Enquiry>,
}

/// Non-persistent store used when no database is configured.
#[derive(Debug, Clone)]
pub struct LocalReservations {
    tables: Arc<Mutex<Tables>>,
    sender: Sender<Option<ReservationEvent>>,
}

impl Default for LocalReservations {
    fn default() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            tables: Arc::new(Mutex::default()),
            sender,
        }
    }
}

impl LocalReservations {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|err| {
            error!(%err, "Reservation tables are poisoned");
            StoreError::Unavailable("Reservation tables are poisoned".into())
        })
    }

    fn send_event(&self, reservation: Reservation) {
        // send_replace also succeeds while nobody is subscribed
        self.sender
            .send_replace(Some(ReservationEvent::created(reservation)));
    }
}

#[async_trait]
impl ReservationStore for LocalReservations {
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.tables()?.bookings.clone())
    }

    async fn insert_reservation(
        &self,
        candidate: ReservationCandidate,
    ) -> Result<Reservation, StoreError> {
        let reservation = {
            let mut tables = self.tables()?;
            if tables
                .bookings
                .iter()
                .any(|booked| booked.occupies(&candidate.date, &candidate.time))
            {
                let err = StoreError::Conflict {
                    date: candidate.date,
                    time: candidate.time,
                };
                error!(%err, "Rejected duplicate reservation");
                return Err(err);
            }
            let reservation = candidate.into_reservation(Uuid::new_v4(), Utc::now());
            tables.bookings.push(reservation.clone());
            reservation
        };

        info!(date = %reservation.date, time = %reservation.time, "Reservation stored");
        self.send_event(reservation.clone());
        Ok(reservation)
    }

    async fn insert_enquiry(&self, form: EnquiryForm) -> Result<Enquiry, StoreError> {
        let enquiry = form.into_enquiry(Uuid::new_v4(), Utc::now());
        self.tables()?.enquiries.push(enquiry.clone());
        info!(id = %enquiry.id, "Enquiry stored");
        Ok(enquiry)
    }

    async fn enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        Ok(self.tables()?.enquiries.clone())
    }

    fn subscribe(&self) -> ReservationEvents {
        ReservationEvents::from_receiver(self.sender.subscribe())
    }
}
