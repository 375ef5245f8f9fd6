use crate::types::{Enquiry, EnquiryForm, Reservation, ReservationCandidate, ReservationEvent};
use async_trait::async_trait;
use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::sync::watch::Receiver;
use tokio_stream::{wrappers::WatchStream, StreamExt};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Slot {date} {time} is already booked")]
    Conflict { date: String, time: String },
}

/// Live feed of created reservations.
///
/// Only the latest event is retained, so a slow subscriber sees bursts
/// coalesced. Dropping the subscription unsubscribes.
pub struct ReservationEvents {
    inner: Pin<Box<dyn Stream<Item = ReservationEvent> + Send>>,
}

impl ReservationEvents {
    pub fn from_receiver(receiver: Receiver<Option<ReservationEvent>>) -> Self {
        let stream = WatchStream::from_changes(receiver).filter_map(|event| event);
        Self {
            inner: Box::pin(stream),
        }
    }

    pub fn from_stream(stream: impl Stream<Item = ReservationEvent> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for ReservationEvents {
    type Item = ReservationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    /// Every reservation, oldest first.
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError>;

    /// Stores the candidate and notifies subscribers. A store that already
    /// holds a reservation for the same date and time answers with
    /// [`StoreError::Conflict`].
    async fn insert_reservation(
        &self,
        candidate: ReservationCandidate,
    ) -> Result<Reservation, StoreError>;

    async fn insert_enquiry(&self, form: EnquiryForm) -> Result<Enquiry, StoreError>;

    async fn enquiries(&self) -> Result<Vec<Enquiry>, StoreError>;

    fn subscribe(&self) -> ReservationEvents;
}
