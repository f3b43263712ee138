// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ticket allocation engine.
//!
//! The [`Engine`] is the boundary of the crate: each inbound operation checks
//! its preconditions, runs as one transaction on the event, and reports its
//! result in a [`Response`] envelope.
//!
//! # Operations
//!
//! - **Request booking**: Books the whole group when capacity allows, otherwise
//!   books what it can and waitlists the rest.
//! - **Cancel booking**: Frees a seat and promotes the oldest waiting user.
//! - **Join waitlist**: Queues a user for the next freed seat.
//! - **Queries**: Available tickets, event status, waiting list.
//!
//! # Thread Safety
//!
//! Every operation holds the event row lock for its whole transaction, so
//! concurrent requests on the same event are serialised and requests on
//! different events run in parallel.

use crate::admission::{self, AdmissionResult};
use crate::base::{EventId, UserId};
use crate::booking;
use crate::cancellation::{self, CancelResult};
use crate::config::EngineConfig;
use crate::model::{Booking, Event, EventStatus, WaitingEntry};
use crate::primitives;
use crate::response::Response;
use crate::store::Store;
use crate::TicketError;
use serde::{Deserialize, Serialize};

/// A request for `quantity` seats on behalf of a user and their guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub event_id: EventId,
    pub user_id: UserId,
    #[serde(default)]
    pub additional_user_ids: Vec<UserId>,
    pub quantity: u32,
}

impl BookingRequest {
    /// A request for one seat for `user_id` alone.
    pub fn single(event_id: EventId, user_id: UserId) -> Self {
        Self {
            event_id,
            user_id,
            additional_user_ids: Vec::new(),
            quantity: 1,
        }
    }

    /// A request for the user plus one seat per guest.
    ///
    /// The quantity saturates at `u32::MAX` for absurdly large guest lists.
    pub fn group(event_id: EventId, user_id: UserId, guests: Vec<UserId>) -> Self {
        Self {
            quantity: seats_for(guests.len()),
            event_id,
            user_id,
            additional_user_ids: guests,
        }
    }

    fn seats_requested(&self) -> usize {
        self.additional_user_ids.len().saturating_add(1)
    }
}

/// One seat for the requester plus one per guest.
fn seats_for(guests: usize) -> u32 {
    u32::try_from(guests).map_or(u32::MAX, |guests| guests.saturating_add(1))
}

/// What a booking request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    /// Capacity covered the group; every seat was booked.
    Booked { bookings: Vec<Booking> },
    FullyWaitlisted { waitlisted_user_ids: Vec<UserId> },
    PartialFulfillment {
        booked_user_ids: Vec<UserId>,
        waitlisted_user_ids: Vec<UserId>,
    },
}

impl From<AdmissionResult> for BookingOutcome {
    fn from(result: AdmissionResult) -> Self {
        match result {
            AdmissionResult::FullyWaitlisted { waitlisted_user_ids } => {
                Self::FullyWaitlisted { waitlisted_user_ids }
            }
            AdmissionResult::PartialFulfillment {
                booked_user_ids,
                waitlisted_user_ids,
            } => Self::PartialFulfillment {
                booked_user_ids,
                waitlisted_user_ids,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTickets {
    pub available_tickets: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStatusReport {
    pub event: Event,
    pub waiting_list_count: usize,
}

/// Ticket allocation engine over a transactional [`Store`].
///
/// # Invariants
///
/// - `available_tickets + bookings == total_tickets` for every event at every
///   committed state.
/// - At most one waiting entry per (user, event), and at most one booking per
///   (user, event) outside the direct path's extra seats.
/// - A freed seat always goes to the oldest eligible waiting entry.
pub struct Engine {
    store: Store,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            store: Store::new(config),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Creates an active event with all of its tickets available.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidEventName`] - Name is empty or blank.
    /// - [`TicketError::DuplicateEventName`] - Another event uses the name.
    pub fn initialize_event(
        &self,
        name: &str,
        total_tickets: u32,
    ) -> Result<Response<Event>, TicketError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TicketError::InvalidEventName);
        }
        let event = self.store.create_event(name, total_tickets)?;
        tracing::info!(event_id = %event.id, name, total_tickets, "event initialized");
        Ok(Response::created("Event initialized successfully", event))
    }

    /// Marks an event cancelled. Its bookings are kept, but every further
    /// operation on it reports the event as not found.
    pub fn cancel_event(&self, event_id: EventId) -> Result<Response<Event>, TicketError> {
        let event = self.store.transaction(event_id, |tx| {
            require_active(tx.event())?;
            tx.set_status(EventStatus::Cancelled);
            Ok(tx.event().clone())
        })?;
        tracing::info!(%event_id, "event cancelled");
        Ok(Response::ok("Event cancelled successfully", event))
    }

    /// Books seats for a user and their guests, waitlisting whoever does not fit.
    ///
    /// # Behavior
    ///
    /// | Available | Outcome |
    /// |-----------|---------|
    /// | `>= 1 + guests` | [`BookingOutcome::Booked`]: exactly `quantity` seats |
    /// | `0` | [`BookingOutcome::FullyWaitlisted`] |
    /// | otherwise | [`BookingOutcome::PartialFulfillment`] |
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidQuantity`] - `quantity` is zero.
    /// - [`TicketError::EventNotFound`] - Event missing or cancelled.
    /// - [`TicketError::DuplicateBooking`] - The user, or a guest picked for a
    ///   seat, already holds a booking.
    /// - [`TicketError::InsufficientTickets`] - `quantity` exceeds the counter.
    /// - [`TicketError::QuantityBelowAdditionalUsers`] - `quantity` cannot seat
    ///   every guest.
    pub fn request_booking(
        &self,
        request: BookingRequest,
    ) -> Result<Response<BookingOutcome>, TicketError> {
        if request.quantity < 1 {
            return Err(TicketError::InvalidQuantity);
        }
        let BookingRequest {
            event_id, user_id, ..
        } = request;

        let (outcome, event_name) = self.store.transaction(event_id, |tx| {
            require_active(tx.event())?;
            if tx.holds_booking(user_id) {
                return Err(TicketError::DuplicateBooking { event_id, user_id });
            }

            let name = tx.event().name.clone();
            let available = tx.event().available_tickets as usize;
            // Only the direct path sees `quantity`; admission seats the listed users
            let outcome = if available >= request.seats_requested() {
                let bookings = booking::book_exact(
                    tx,
                    user_id,
                    request.quantity,
                    &request.additional_user_ids,
                )?;
                BookingOutcome::Booked { bookings }
            } else {
                admission::admit(tx, user_id, &request.additional_user_ids)?.into()
            };
            Ok((outcome, name))
        })?;

        let message = match &outcome {
            BookingOutcome::Booked { bookings } => {
                tracing::info!(%event_id, %user_id, seats = bookings.len(), "tickets booked");
                format!(
                    "{} ticket{} for {} booked successfully",
                    request.quantity,
                    if bookings.len() > 1 { "s" } else { "" },
                    event_name
                )
            }
            BookingOutcome::FullyWaitlisted { waitlisted_user_ids } => {
                tracing::info!(%event_id, %user_id, waitlisted = waitlisted_user_ids.len(), "event sold out, users waitlisted");
                "No tickets available. All users have been added to the waiting list.".to_owned()
            }
            BookingOutcome::PartialFulfillment {
                booked_user_ids,
                waitlisted_user_ids,
            } => {
                tracing::info!(
                    %event_id,
                    %user_id,
                    booked = booked_user_ids.len(),
                    waitlisted = waitlisted_user_ids.len(),
                    "partial booking processed"
                );
                "Partial booking processed. Some users were added to the waitlist.".to_owned()
            }
        };

        Ok(Response::ok(message, outcome))
    }

    /// Cancels a user's booking and hands the seat to the oldest waiting user.
    ///
    /// # Errors
    ///
    /// - [`TicketError::EventNotFound`] - Event missing or cancelled.
    /// - [`TicketError::BookingNotFound`] - The user holds no booking.
    pub fn cancel_booking(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Response<CancelResult>, TicketError> {
        let result = self.store.transaction(event_id, |tx| {
            require_active(tx.event())?;
            if !tx.holds_booking(user_id) {
                return Err(TicketError::BookingNotFound { event_id, user_id });
            }
            cancellation::cancel(tx, user_id)
        })?;

        let message = match &result {
            CancelResult::Reassigned {
                promoted_user_id, ..
            } => {
                tracing::info!(%event_id, %user_id, %promoted_user_id, "booking cancelled, ticket reassigned");
                format!("Ticket reassigned to user {promoted_user_id}.")
            }
            CancelResult::NoWaitlist => {
                tracing::info!(%event_id, %user_id, "booking cancelled, nobody waiting");
                "Booking canceled. No users in the waiting list.".to_owned()
            }
        };
        Ok(Response::ok(message, result))
    }

    /// Adds a user to the event's waiting list.
    ///
    /// # Errors
    ///
    /// - [`TicketError::EventNotFound`] - Event missing or cancelled.
    /// - [`TicketError::DuplicateBooking`] - The user already holds a seat.
    /// - [`TicketError::AlreadyWaitlisted`] - The user is already waiting.
    pub fn join_waitlist(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Response<WaitingEntry>, TicketError> {
        let entry = self.store.transaction(event_id, |tx| {
            require_active(tx.event())?;
            if tx.holds_booking(user_id) {
                return Err(TicketError::DuplicateBooking { event_id, user_id });
            }
            primitives::create_waitlist_entry(tx, user_id)
        })?;
        tracing::info!(%event_id, %user_id, waiting_id = %entry.id, "user joined waiting list");
        Ok(Response::created("User has joined the waiting list", entry))
    }

    /// # Errors
    ///
    /// [`TicketError::EventNotFound`] if the event is missing or cancelled.
    pub fn get_available_tickets(
        &self,
        event_id: EventId,
    ) -> Result<Response<AvailableTickets>, TicketError> {
        let available_tickets = self.store.read(event_id, |ledger| {
            require_active(&ledger.event)?;
            Ok(ledger.event.available_tickets)
        })?;
        Ok(Response::ok(
            "Available tickets found successfully",
            AvailableTickets { available_tickets },
        ))
    }

    /// The event record together with the length of its waiting list.
    ///
    /// # Errors
    ///
    /// [`TicketError::EventNotFound`] if the event is missing or cancelled.
    pub fn get_event_status(
        &self,
        event_id: EventId,
    ) -> Result<Response<EventStatusReport>, TicketError> {
        let report = self.store.read(event_id, |ledger| {
            require_active(&ledger.event)?;
            Ok(EventStatusReport {
                event: ledger.event.clone(),
                waiting_list_count: ledger.waitlist.len(),
            })
        })?;
        Ok(Response::ok("Event found successfully", report))
    }

    /// Waiting list entries for an event, oldest first.
    ///
    /// Cancelled events still list their entries.
    pub fn waitlist(&self, event_id: EventId) -> Result<Response<Vec<WaitingEntry>>, TicketError> {
        let entries: Vec<WaitingEntry> = self
            .store
            .read(event_id, |ledger| Ok(ledger.waitlist.iter().cloned().collect()))?;
        let message = format!(
            "WaitList{} found successfully",
            if entries.len() > 1 { "s" } else { "" }
        );
        Ok(Response::ok(message, entries))
    }

    /// Committed booking rows for an event, in creation order.
    pub fn bookings(&self, event_id: EventId) -> Result<Vec<Booking>, TicketError> {
        self.store.read(event_id, |ledger| Ok(ledger.bookings.clone()))
    }

    /// Committed state of every event, cancelled ones included.
    pub fn events(&self) -> Vec<Event> {
        self.store.events()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancelled events are reported the same way as missing ones.
fn require_active(event: &Event) -> Result<(), TicketError> {
    if event.is_active() {
        Ok(())
    } else {
        Err(TicketError::EventNotFound(event.id))
    }
}
