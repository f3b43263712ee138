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

//! Allocation primitives.
//!
//! Each primitive runs inside a caller-supplied [`Transaction`] and performs
//! exactly one row mutation or existence check. None of them commits; the
//! enclosing transaction decides whether the writes survive.

use crate::base::{BookingId, UserId, WaitingId};
use crate::error::{StorageError, TicketError};
use crate::model::{Booking, BookingStatus, WaitingEntry};
use crate::store::Transaction;
use chrono::Utc;

/// Creates a booking row for a user who holds no seat on the event yet.
///
/// # Errors
///
/// Returns [`TicketError::DuplicateBooking`] if the (user, event) pair already
/// has a booking.
pub fn create_booking(tx: &mut Transaction<'_>, user_id: UserId) -> Result<Booking, TicketError> {
    if tx.holds_booking(user_id) {
        return Err(TicketError::DuplicateBooking {
            event_id: tx.event_id(),
            user_id,
        });
    }
    Ok(create_additional_seat(tx, user_id))
}

/// Creates a booking row without the (user, event) uniqueness check.
///
/// Only the direct booking path uses this, to hand one user several seats.
pub fn create_additional_seat(tx: &mut Transaction<'_>, user_id: UserId) -> Booking {
    let booking = Booking {
        id: tx.store().next_booking_id(),
        user_id,
        event_id: tx.event_id(),
        status: BookingStatus::Booked,
        created_at: Utc::now(),
    };
    tracing::debug!(event_id = %booking.event_id, %user_id, booking_id = %booking.id, "booking created");

    tx.push_booking(booking.clone());
    booking
}

/// Deletes the user's oldest booking row on the event, if any.
pub fn remove_booking(tx: &mut Transaction<'_>, user_id: UserId) -> Option<Booking> {
    let booking = tx.remove_oldest_booking(user_id)?;
    tracing::debug!(event_id = %booking.event_id, %user_id, booking_id = %booking.id, "booking removed");
    Some(booking)
}

/// Subtracts `n` from the available counter and returns the new value.
///
/// Callers must already have checked there are enough tickets; the store's
/// range check still rejects a negative result.
///
/// # Errors
///
/// Returns [`StorageError::CounterOutOfRange`] if the counter would go negative.
pub fn decrement_available(tx: &mut Transaction<'_>, n: u32) -> Result<u32, TicketError> {
    adjust_available(tx, -i64::from(n))
}

/// Adds `n` to the available counter and returns the new value.
///
/// # Errors
///
/// Returns [`StorageError::CounterOutOfRange`] if the counter would exceed the
/// event's total tickets.
pub fn increment_available(tx: &mut Transaction<'_>, n: u32) -> Result<u32, TicketError> {
    adjust_available(tx, i64::from(n))
}

fn adjust_available(tx: &mut Transaction<'_>, delta: i64) -> Result<u32, TicketError> {
    let event = tx.event();
    let attempted = i64::from(event.available_tickets) + delta;

    let available = u32::try_from(attempted)
        .ok()
        .filter(|available| *available <= event.total_tickets)
        .ok_or(StorageError::CounterOutOfRange {
            event_id: event.id,
            attempted,
            total: event.total_tickets,
        })?;

    tx.set_available(available);
    Ok(available)
}

/// Inserts a waiting list entry unless the user is already waiting.
///
/// The membership check and the insert are one step, so two joins for the
/// same user can never both succeed.
///
/// # Errors
///
/// Returns [`TicketError::AlreadyWaitlisted`] if the user holds an entry.
pub fn create_waitlist_entry(
    tx: &mut Transaction<'_>,
    user_id: UserId,
) -> Result<WaitingEntry, TicketError> {
    let event_id = tx.event_id();
    let id = tx.store().next_waiting_id();

    // Never stamp an entry earlier than the current tail, even if the wall clock steps back
    let now = Utc::now();
    let created_at = tx
        .waitlist()
        .back()
        .map_or(now, |tail| tail.created_at.max(now));

    let entry = WaitingEntry {
        id,
        user_id,
        event_id,
        created_at,
    };
    tx.push_waiting(entry.clone())
        .map_err(|_| TicketError::AlreadyWaitlisted { event_id, user_id })?;

    tracing::debug!(%event_id, %user_id, waiting_id = %id, "waiting list entry created");
    Ok(entry)
}

/// Deletes a waiting list entry by id.
///
/// # Errors
///
/// Returns [`StorageError::MissingRow`] if no such entry exists on the event.
pub fn remove_waitlist_entry(
    tx: &mut Transaction<'_>,
    waiting_id: WaitingId,
) -> Result<WaitingEntry, TicketError> {
    let entry = tx
        .remove_waiting(waiting_id)
        .ok_or(StorageError::MissingRow(waiting_id.0))?;
    tracing::debug!(event_id = %entry.event_id, user_id = %entry.user_id, %waiting_id, "waiting list entry removed");
    Ok(entry)
}

pub fn is_waitlisted(tx: &Transaction<'_>, user_id: UserId) -> bool {
    tx.waitlist().contains(user_id)
}

/// The waiting list entry held by `user_id`, if any.
pub fn waitlist_entry_for(tx: &Transaction<'_>, user_id: UserId) -> Option<WaitingEntry> {
    tx.waitlist().get(user_id).cloned()
}

/// The oldest waiting list entry on the event.
pub fn next_in_line(tx: &Transaction<'_>) -> Option<WaitingEntry> {
    tx.waitlist().front().cloned()
}

/// Booking ids held by a user on the event, oldest first.
pub fn bookings_for(tx: &Transaction<'_>, user_id: UserId) -> Vec<BookingId> {
    tx.bookings()
        .iter()
        .filter(|b| b.user_id == user_id)
        .map(|b| b.id)
        .collect()
}
