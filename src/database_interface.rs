use crate::{
    backend::{ReservationEvents, ReservationStore, StoreError},
    schema::{bookings, enquiries},
    types::{Enquiry, EnquiryForm, Reservation, ReservationCandidate, ReservationEvent},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    ConnectionError, PgConnection,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch::{self, Sender};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BookingRow {
    id: Uuid,
    date: String,
    time: String,
    name: String,
    phone: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<BookingRow> for Reservation {
    fn from(row: BookingRow) -> Self {
        Reservation {
            id: row.id,
            date: row.date,
            time: row.time,
            name: row.name,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

impl From<Reservation> for BookingRow {
    fn from(reservation: Reservation) -> Self {
        BookingRow {
            id: reservation.id,
            date: reservation.date,
            time: reservation.time,
            name: reservation.name,
            phone: reservation.phone,
            email: reservation.email,
            created_at: reservation.created_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = enquiries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct EnquiryRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    service: Option<String>,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<EnquiryRow> for Enquiry {
    fn from(row: EnquiryRow) -> Self {
        Enquiry {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            service: row.service,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

impl From<Enquiry> for EnquiryRow {
    fn from(enquiry: Enquiry) -> Self {
        EnquiryRow {
            id: enquiry.id,
            name: enquiry.name,
            email: enquiry.email,
            phone: enquiry.phone,
            service: enquiry.service,
            message: enquiry.message,
            created_at: enquiry.created_at,
        }
    }
}

fn unavailable(err: DieselError) -> StoreError {
    error!(%err, "Database query failed");
    StoreError::Unavailable(err.to_string())
}

/// PostgreSQL backed store. Run the migrations in `migrations/` first.
///
/// Reservation events are published for inserts made through this
/// process only.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
    sender: Sender<Option<ReservationEvent>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        let (sender, _) = watch::channel(None);
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            sender,
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    /// Runs `query` on the blocking pool; diesel connections are synchronous.
    async fn run<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = connection
                .lock()
                .map_err(|_| StoreError::Unavailable("Database connection is poisoned".into()))?;
            query(&mut connection)
        })
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))?
    }

    #[cfg(test)]
    async fn clear(&self) -> Result<(), StoreError> {
        self.run(|connection| {
            diesel::delete(bookings::table)
                .execute(connection)
                .map_err(unavailable)?;
            diesel::delete(enquiries::table)
                .execute(connection)
                .map_err(unavailable)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReservationStore for DatabaseInterface {
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        self.run(|connection| {
            bookings::table
                .select(BookingRow::as_select())
                .order(bookings::created_at.asc())
                .load(connection)
                .map(|rows| rows.into_iter().map(Reservation::from).collect())
                .map_err(unavailable)
        })
        .await
    }

    async fn insert_reservation(
        &self,
        candidate: ReservationCandidate,
    ) -> Result<Reservation, StoreError> {
        let row = BookingRow::from(candidate.into_reservation(Uuid::new_v4(), Utc::now()));

        let reservation: Reservation = self
            .run(move |connection| {
                diesel::insert_into(bookings::table)
                    .values(&row)
                    .returning(BookingRow::as_returning())
                    .get_result(connection)
                    .map(Reservation::from)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            StoreError::Conflict {
                                date: row.date.clone(),
                                time: row.time.clone(),
                            }
                        }
                        err => unavailable(err),
                    })
            })
            .await?;

        info!(date = %reservation.date, time = %reservation.time, "Reservation stored");
        self.sender
            .send_replace(Some(ReservationEvent::created(reservation.clone())));
        Ok(reservation)
    }

    async fn insert_enquiry(&self, form: EnquiryForm) -> Result<Enquiry, StoreError> {
        let row = EnquiryRow::from(form.into_enquiry(Uuid::new_v4(), Utc::now()));

        self.run(move |connection| {
            diesel::insert_into(enquiries::table)
                .values(&row)
                .returning(EnquiryRow::as_returning())
                .get_result(connection)
                .map(Enquiry::from)
                .map_err(unavailable)
        })
        .await
    }

    async fn enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        self.run(|connection| {
            enquiries::table
                .select(EnquiryRow::as_select())
                .order(enquiries::created_at.asc())
                .load(connection)
                .map(|rows| rows.into_iter().map(Enquiry::from).collect())
                .map_err(unavailable)
        })
        .await
    }

    fn subscribe(&self) -> ReservationEvents {
        ReservationEvents::from_receiver(self.sender.subscribe())
    }
}
