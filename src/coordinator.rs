use crate::{
    backend::{ReservationStore, StoreError},
    notifier::Notifications,
    slots::is_reserved,
    types::{Reservation, ReservationCandidate, Table},
};
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Please fill in all required fields: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Sorry, this slot was just booked by someone else. Please choose another time.")]
    SlotTaken,

    #[error("Booking could not be submitted, please try again")]
    SubmitFailed(#[source] StoreError),

    #[error("Available times could not be loaded")]
    LoadFailed(#[source] StoreError),

    #[error("Please select a date and time")]
    NoSlotSelected,

    #[error("The selected time is not available")]
    SlotUnavailable,
}

/// Books `candidate` with a read-check-write against `store`.
///
/// The availability check runs on a fresh read, not on any cached list.
/// Read and write are separate store calls, so a concurrent writer can
/// slip in between them. Stores that enforce one reservation per slot
/// report that as [`StoreError::Conflict`], which ends up as
/// [`BookingError::SlotTaken`] as well.
pub async fn attempt_reservation<S>(
    store: &S,
    notifications: &Notifications,
    candidate: ReservationCandidate,
) -> Result<Reservation, BookingError>
where
    S: ReservationStore + ?Sized,
{
    candidate.validate()?;

    let reservations = store.reservations().await.map_err(|err| {
        error!(?err, "Failed to re-check availability");
        BookingError::SubmitFailed(err)
    })?;

    if is_reserved(&reservations, &candidate.date, &candidate.time) {
        warn!(date = %candidate.date, time = %candidate.time, "Slot already taken");
        return Err(BookingError::SlotTaken);
    }

    let reservation = match store.insert_reservation(candidate).await {
        Ok(reservation) => reservation,
        Err(StoreError::Conflict { date, time }) => {
            warn!(%date, %time, "Slot taken between check and write");
            return Err(BookingError::SlotTaken);
        }
        Err(err) => {
            error!(?err, "Failed to store reservation");
            return Err(BookingError::SubmitFailed(err));
        }
    };

    info!(id = %reservation.id, date = %reservation.date, time = %reservation.time, "Reservation committed");
    notifications.dispatch(Table::Bookings, &reservation);
    Ok(reservation)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::MockReservationStore,
        local_reservations::LocalReservations,
        notifier::test::RecordingNotifier,
        testutils::{candidate, FakeReservationStore},
    };
    use std::sync::{atomic::Ordering, Arc};

    fn notifications() -> (Arc<RecordingNotifier>, Notifications) {
        let recorder = Arc::new(RecordingNotifier::default());
        (recorder.clone(), Notifications::new(recorder))
    }

    #[tokio::test]
    async fn test_commit_on_free_slot() {
        let store = FakeReservationStore::new();
        let (recorder, notifications) = notifications();

        let reservation =
            attempt_reservation(&store, &notifications, candidate("4/10/2025", "10:00 AM"))
                .await
                .unwrap();

        assert_eq!(reservation.time, "10:00 AM");
        assert_eq!(store.calls_to_reservations(), 1);
        assert_eq!(store.calls_to_insert_reservation(), 1);

        let payloads = recorder.wait_for_payloads(1).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].table, Table::Bookings);
    }

    #[tokio::test]
    async fn test_missing_email_never_reaches_the_store() {
        let mut store = MockReservationStore::new();
        store.expect_reservations().never();
        store.expect_insert_reservation().never();
        let (_, notifications) = notifications();

        let mut invalid = candidate("4/10/2025", "10:00 AM");
        invalid.email = String::new();

        let err = attempt_reservation(&store, &notifications, invalid)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_taken_slot_is_rejected_without_write() {
        let store = FakeReservationStore::new();
        store.book_directly(candidate("4/10/2025", "10:00 AM"));
        let (recorder, notifications) = notifications();

        let err = attempt_reservation(&store, &notifications, candidate("4/10/2025", "10:00 AM"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SlotTaken));
        assert_eq!(store.calls_to_insert_reservation(), 0);
        assert!(recorder.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_after_check_is_caught_by_store() {
        let store = FakeReservationStore::new();
        *store.0.book_after_read.lock().unwrap() = Some(candidate("4/10/2025", "10:00 AM"));
        let (_, notifications) = notifications();

        let err = attempt_reservation(&store, &notifications, candidate("4/10/2025", "10:00 AM"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SlotTaken));
        assert_eq!(store.calls_to_insert_reservation(), 1);
        assert_eq!(store.0.bookings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_after_check_without_store_constraint_double_books() {
        let store = FakeReservationStore::new();
        store.0.enforce_unique.store(false, Ordering::SeqCst);
        *store.0.book_after_read.lock().unwrap() = Some(candidate("4/10/2025", "10:00 AM"));
        let (_, notifications) = notifications();

        attempt_reservation(&store, &notifications, candidate("4/10/2025", "10:00 AM"))
            .await
            .unwrap();

        assert_eq!(store.0.bookings.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_later_read_after_landed_write_is_rejected() {
        let store = FakeReservationStore::new();
        store.0.enforce_unique.store(false, Ordering::SeqCst);
        let (_, notifications) = notifications();

        attempt_reservation(&store, &notifications, candidate("4/10/2025", "2:00 PM"))
            .await
            .unwrap();
        let err = attempt_reservation(&store, &notifications, candidate("4/10/2025", "2:00 PM"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SlotTaken));
        assert_eq!(store.0.bookings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_commit_once_with_local_store() {
        let store = Arc::new(LocalReservations::default());
        let (_, notifications) = notifications();

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            let notifications = notifications.clone();
            tokio::spawn(async move {
                attempt_reservation(&*store, &notifications, candidate("4/10/2025", "9:00 AM"))
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let committed = results
            .iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();
        let taken = results
            .iter()
            .filter(|result| matches!(result, Ok(Err(BookingError::SlotTaken))))
            .count();
        assert_eq!(committed, 1);
        assert_eq!(taken, 7);
        assert_eq!(store.reservations().await.unwrap().len(), 1);
    }

    #[test_case::test_case(true, false; "read fails")]
    #[test_case::test_case(false, true; "write fails")]
    #[tokio::test]
    async fn test_store_failure_reports_submit_failed(read_fails: bool, write_fails: bool) {
        let store = FakeReservationStore::new();
        store.0.reads_succeed.store(!read_fails, Ordering::SeqCst);
        store.0.success.store(!write_fails, Ordering::SeqCst);
        let (recorder, notifications) = notifications();

        let err = attempt_reservation(&store, &notifications, candidate("4/10/2025", "8:00 AM"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SubmitFailed(_)));
        assert!(recorder.payloads.lock().unwrap().is_empty());
    }
}
