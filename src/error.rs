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

//! Error types for ticket allocation.

use crate::base::{EventId, UserId};
use thiserror::Error;

/// Broad classification of a [`TicketError`], as seen at the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidArgument,
    StorageFailure,
}

impl ErrorKind {
    /// HTTP-style status code used in the response envelope.
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InvalidArgument => 400,
            Self::StorageFailure => 500,
        }
    }
}

/// Failures raised by the resource store itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The event row lock could not be acquired in time
    #[error("timed out after {waited_ms}ms waiting for the lock on event {event_id}")]
    LockTimeout { event_id: EventId, waited_ms: u64 },

    /// A counter write would fall outside `0..=total_tickets`
    #[error("available tickets for event {event_id} would become {attempted} (total {total})")]
    CounterOutOfRange {
        event_id: EventId,
        attempted: i64,
        total: u32,
    },

    /// A waiting list row referenced by id does not exist
    #[error("waiting list entry {0} does not exist")]
    MissingRow(u64),
}

/// Ticket allocation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Event does not exist or has been cancelled
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// User holds no booking for the event
    #[error("user {user_id} has no booking for event {event_id}")]
    BookingNotFound { event_id: EventId, user_id: UserId },

    /// User already holds a booking for the event
    #[error("user {user_id} has already booked event {event_id}")]
    DuplicateBooking { event_id: EventId, user_id: UserId },

    /// User is already on the waiting list for the event
    #[error("user {user_id} is already on the waiting list for event {event_id}")]
    AlreadyWaitlisted { event_id: EventId, user_id: UserId },

    /// Another event already uses this name
    #[error("event `{0}` already exists")]
    DuplicateEventName(String),

    /// Direct booking asked for more seats than the locked counter holds
    #[error("{requested} tickets requested but only {available} available")]
    InsufficientTickets { requested: u32, available: u32 },

    /// Quantity is zero
    #[error("quantity is required and must be at least 1")]
    InvalidQuantity,

    /// Quantity cannot cover every additional user
    #[error("quantity {quantity} is smaller than the {additional} additional users")]
    QuantityBelowAdditionalUsers { quantity: u32, additional: usize },

    /// Event name is empty
    #[error("event name must not be empty")]
    InvalidEventName,

    /// Underlying store failure; the transaction was rolled back
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl TicketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EventNotFound(_) | Self::BookingNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateBooking { .. }
            | Self::AlreadyWaitlisted { .. }
            | Self::DuplicateEventName(_)
            | Self::InsufficientTickets { .. } => ErrorKind::Conflict,
            Self::InvalidQuantity
            | Self::QuantityBelowAdditionalUsers { .. }
            | Self::InvalidEventName => ErrorKind::InvalidArgument,
            Self::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}
