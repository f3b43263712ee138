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

//! # Ticket Allocation Engine
//!
//! This library allocates a fixed number of event tickets among concurrent
//! requesters. When capacity runs out, requesters fall back to a first-come,
//! first-served waiting list, and every cancelled seat is handed to the user
//! who has waited longest.
//!
//! ## Core Components
//!
//! - [`Engine`]: Inbound operations (book, cancel, join waitlist, queries)
//! - [`Store`]: Transactional in-memory store with per-event row locks
//! - [`primitives`]: Single-row operations composed by the allocation paths
//! - [`AdmissionResult`] / [`CancelResult`]: Tagged outcomes of admission and cancellation
//! - [`TicketError`]: Error types, classified by [`ErrorKind`]
//!
//! ## Example
//!
//! ```
//! use ticket_allocation_engine::{BookingOutcome, BookingRequest, Engine, UserId};
//!
//! let engine = Engine::new();
//! let event = engine.initialize_event("Launch Party", 2).unwrap().data.unwrap();
//!
//! // Three people, two seats: the last guest waits
//! let request = BookingRequest::group(event.id, UserId(1), vec![UserId(2), UserId(3)]);
//! let outcome = engine.request_booking(request).unwrap().data.unwrap();
//! assert_eq!(
//!     outcome,
//!     BookingOutcome::PartialFulfillment {
//!         booked_user_ids: vec![UserId(1), UserId(2)],
//!         waitlisted_user_ids: vec![UserId(3)],
//!     }
//! );
//!
//! // A cancellation promotes the waiting guest
//! engine.cancel_booking(event.id, UserId(2)).unwrap();
//! let available = engine.get_available_tickets(event.id).unwrap().data.unwrap();
//! assert_eq!(available.available_tickets, 0);
//! ```
//!
//! ## Thread Safety
//!
//! Each event's rows sit behind their own lock, held for the whole of a
//! transaction. Requests for the same event are serialised; requests for
//! different events are processed in parallel.

mod admission;
mod base;
mod booking;
mod cancellation;
pub mod config;
mod engine;
pub mod error;
pub mod model;
pub mod primitives;
mod response;
mod store;
mod waitlist;

pub use admission::{AdmissionResult, admit};
pub use base::{BookingId, EventId, UserId, WaitingId};
pub use booking::book_exact;
pub use cancellation::{CancelResult, cancel};
pub use config::EngineConfig;
pub use engine::{AvailableTickets, BookingOutcome, BookingRequest, Engine, EventStatusReport};
pub use error::{ErrorKind, StorageError, TicketError};
pub use model::{Booking, BookingStatus, Event, EventStatus, WaitingEntry};
pub use response::Response;
pub use store::{Store, Transaction};
pub use waitlist::Waitlist;
