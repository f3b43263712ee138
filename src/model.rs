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

//! Persisted records: events, bookings and waiting list entries.
//!
//! An event moves through a small state machine:
//! - [`Active`] → [`Cancelled`] (via [`Engine::cancel_event`])
//!
//! Bookings and waiting entries carry no state of their own; they exist or
//! they do not.
//!
//! [`Active`]: EventStatus::Active
//! [`Cancelled`]: EventStatus::Cancelled
//! [`Engine::cancel_event`]: crate::Engine::cancel_event

use crate::base::{BookingId, EventId, UserId, WaitingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// An event with a fixed capacity and a mutable counter of unallocated seats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub total_tickets: u32,
    pub available_tickets: u32,
    pub status: EventStatus,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.status == EventStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Booked,
}

/// One allocated seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// A user queued for the next seat freed on an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitingEntry {
    pub id: WaitingId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub created_at: DateTime<Utc>,
}

impl WaitingEntry {
    /// Total order used for promotion: oldest first, ties broken by id.
    pub fn fifo_key(&self) -> (DateTime<Utc>, WaitingId) {
        (self.created_at, self.id)
    }
}
