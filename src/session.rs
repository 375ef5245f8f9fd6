use crate::{
    backend::{ReservationEvents, ReservationStore},
    coordinator::{attempt_reservation, BookingError},
    notifier::Notifications,
    slots::{compute_slots, format_booking_date, is_reserved},
    types::{ContactDetails, Reservation, ReservationCandidate, ReservationEvent, Slot},
};
use chrono::{Local, NaiveDate};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoDateSelected,
    DateSelected,
    SlotSelected,
    Submitting,
}

/// Dismissable messages shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoadFailed,
    MissingFields,
    SlotTaken,
    SubmitFailed,
    Booked { date: String, time: String },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// One browser session looking at the booking calendar.
///
/// Holds the cached reservation list, the selected date and slot and the
/// slot list derived from them. No slots are offered before the first
/// successful load. The store subscription taken in
/// [`mount`](Self::mount) lives exactly as long as the session.
pub struct BookingSession<S: ReservationStore + ?Sized> {
    store: Arc<S>,
    notifications: Notifications,
    state: SessionState,
    selected_date: Option<NaiveDate>,
    selected_slot: Option<String>,
    contact: ContactDetails,
    pending: Option<ReservationCandidate>,
    reservations: Vec<Reservation>,
    loaded: bool,
    slots: Vec<Slot>,
    notices: Vec<Notice>,
    subscription: Option<ReservationEvents>,
}

impl<S: ReservationStore + ?Sized> BookingSession<S> {
    pub fn new(store: Arc<S>, notifications: Notifications) -> Self {
        Self {
            store,
            notifications,
            state: SessionState::NoDateSelected,
            selected_date: None,
            selected_slot: None,
            contact: ContactDetails::default(),
            pending: None,
            reservations: vec![],
            loaded: false,
            slots: vec![],
            notices: vec![],
            subscription: None,
        }
    }

    /// Subscribes to reservation events, selects today and loads the
    /// reservations. A failed load is recorded as a notice.
    pub async fn mount(&mut self) {
        self.subscription = Some(self.store.subscribe());
        self.select_date(today());
        let _ = self.load_reservations().await;
    }

    pub fn unmount(&mut self) {
        self.subscription = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn selected_slot(&self) -> Option<&str> {
        self.selected_slot.as_deref()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notices(&mut self) {
        self.notices.clear();
    }

    fn recompute_slots(&mut self) {
        self.slots = match self.selected_date {
            Some(date) if self.loaded => compute_slots(date, &self.reservations),
            _ => vec![],
        };
    }

    /// Replaces the cache with the complete list from the store.
    ///
    /// On failure the previous list stays in place and a notice is added.
    /// There is no automatic retry.
    pub async fn load_reservations(&mut self) -> Result<&[Reservation], BookingError> {
        match self.store.reservations().await {
            Ok(reservations) => {
                self.reservations = reservations;
                self.loaded = true;
                self.recompute_slots();
                Ok(&self.reservations)
            }
            Err(err) => {
                warn!(?err, "Failed to load reservations");
                self.notices.push(Notice::LoadFailed);
                Err(BookingError::LoadFailed(err))
            }
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = Some(date);
        self.selected_slot = None;
        self.pending = None;
        self.state = SessionState::DateSelected;
        self.recompute_slots();
    }

    /// Picking an unavailable or unknown slot leaves the session untouched.
    pub fn select_slot(&mut self, time: &str) -> Result<(), BookingError> {
        let available = self
            .slots
            .iter()
            .any(|slot| slot.time == time && slot.available);
        if !available {
            return Err(BookingError::SlotUnavailable);
        }
        self.selected_slot = Some(time.to_string());
        self.pending = None;
        self.state = SessionState::SlotSelected;
        Ok(())
    }

    pub fn set_contact(&mut self, contact: ContactDetails) {
        self.contact = contact;
    }

    fn candidate(&self) -> Result<ReservationCandidate, BookingError> {
        match (self.selected_date, &self.selected_slot) {
            (Some(date), Some(time)) => Ok(ReservationCandidate {
                date: format_booking_date(date),
                time: time.clone(),
                name: self.contact.name.clone(),
                phone: self.contact.phone.clone(),
                email: self.contact.email.clone(),
            }),
            _ => Err(BookingError::NoSlotSelected),
        }
    }

    /// Submits the booking form for the selected slot.
    pub async fn submit(&mut self) -> Result<Reservation, BookingError> {
        if self.state != SessionState::SlotSelected {
            return Err(BookingError::NoSlotSelected);
        }
        let candidate = self.candidate()?;
        if let Err(errors) = candidate.validate() {
            self.notices.push(Notice::MissingFields);
            return Err(BookingError::Validation(errors));
        }
        self.submit_candidate(candidate).await
    }

    /// Resubmits the candidate of a failed submission unchanged.
    pub async fn retry_submit(&mut self) -> Result<Reservation, BookingError> {
        match self.pending.clone() {
            Some(candidate) if self.state == SessionState::SlotSelected => {
                self.submit_candidate(candidate).await
            }
            _ => self.submit().await,
        }
    }

    async fn submit_candidate(
        &mut self,
        candidate: ReservationCandidate,
    ) -> Result<Reservation, BookingError> {
        self.state = SessionState::Submitting;
        self.pending = Some(candidate.clone());

        match attempt_reservation(&*self.store, &self.notifications, candidate).await {
            Ok(reservation) => {
                self.notices.push(Notice::Booked {
                    date: reservation.date.clone(),
                    time: reservation.time.clone(),
                });
                self.contact = ContactDetails::default();
                self.select_date(today());
                let _ = self.load_reservations().await;
                Ok(reservation)
            }
            Err(BookingError::SlotTaken) => {
                self.notices.push(Notice::SlotTaken);
                self.selected_slot = None;
                self.pending = None;
                self.state = SessionState::DateSelected;
                let _ = self.load_reservations().await;
                Err(BookingError::SlotTaken)
            }
            Err(err) => {
                self.notices.push(Notice::SubmitFailed);
                self.state = SessionState::SlotSelected;
                Err(err)
            }
        }
    }

    /// Brings the session up to date after any session created a reservation.
    ///
    /// Always refetches and recomputes, so repeated or reordered events are
    /// harmless. A held, unsubmitted slot that is now booked gets released.
    pub async fn on_reservation_created(&mut self, event: ReservationEvent) {
        info!(date = %event.record.date, time = %event.record.time, "Reservation created elsewhere");
        if self.load_reservations().await.is_err() {
            return;
        }

        if self.state != SessionState::SlotSelected {
            return;
        }
        let (Some(date), Some(time)) = (self.selected_date, self.selected_slot.as_deref()) else {
            return;
        };
        if is_reserved(&self.reservations, &format_booking_date(date), time) {
            self.selected_slot = None;
            self.pending = None;
            self.state = SessionState::DateSelected;
            self.notices.push(Notice::SlotTaken);
        }
    }

    /// Waits for the next reservation event and applies it.
    ///
    /// Returns `false` when the session is not subscribed or the store
    /// closed the channel.
    pub async fn sync_next(&mut self) -> bool {
        let event = match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => return false,
        };
        match event {
            Some(event) => {
                self.on_reservation_created(event).await;
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }
}
