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


//! Transactional in-memory resource store.
//!
//! Each event owns a ledger holding its event row, its booking rows and its
//! waiting list. The ledger sits behind a [`parking_lot::Mutex`] which plays the
//! role of the event row lock: every transaction on an event holds it from the
//! first read until commit or rollback.
//!
//! # Transactions
//!
//! [`Store::transaction`] hands a closure a [`Transaction`] that writes the
//! locked rows in place and records an undo step for every write. Returning
//! `Ok` discards the undo log; returning `Err`, or unwinding out of the
//! closure, replays it backwards, so no partial write is ever left behind.
//! Queries go through a read path that borrows the locked rows without
//! recording anything.
//!
//! # Thread Safety
//!
//! Ledgers are indexed by a [`DashMap`], so transactions on different events
//! proceed in parallel while transactions on the same event are serialised.

use crate::base::{BookingId, EventId, UserId, WaitingId};
use crate::config::EngineConfig;
use crate::error::{StorageError, TicketError};
use crate::model::{Booking, Event, EventStatus, WaitingEntry};
use crate::waitlist::Waitlist;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// All rows belonging to one event.
#[derive(Debug)]
pub(crate) struct EventLedger {
    pub(crate) event: Event,
    /// Booking rows in creation order.
    pub(crate) bookings: Vec<Booking>,
    /// Seats held per user, for the (user, event) uniqueness check.
    pub(crate) holders: HashMap<UserId, u32>,
    pub(crate) waitlist: Waitlist,
}

/// Inverse of one write made inside a transaction.
#[derive(Debug)]
enum Undo {
    BookingPushed,
    BookingRemoved { position: usize, booking: Booking },
    Available(u32),
    Status(EventStatus),
    WaitingPushed(WaitingId),
    WaitingRemoved(WaitingEntry),
}

impl EventLedger {
    fn new(event: Event) -> Self {
        Self {
            event,
            bookings: Vec::new(),
            holders: HashMap::new(),
            waitlist: Waitlist::new(),
        }
    }

    fn claim_seat(&mut self, user_id: UserId) {
        *self.holders.entry(user_id).or_insert(0) += 1;
    }

    fn release_seat(&mut self, user_id: UserId) {
        if let Some(seats) = self.holders.get_mut(&user_id) {
            *seats -= 1;
            if *seats == 0 {
                self.holders.remove(&user_id);
            }
        }
    }

    fn revert(&mut self, step: Undo) {
        match step {
            Undo::BookingPushed => {
                if let Some(booking) = self.bookings.pop() {
                    self.release_seat(booking.user_id);
                }
            }
            Undo::BookingRemoved { position, booking } => {
                self.claim_seat(booking.user_id);
                self.bookings.insert(position, booking);
            }
            Undo::Available(available) => self.event.available_tickets = available,
            Undo::Status(status) => self.event.status = status,
            Undo::WaitingPushed(waiting_id) => {
                self.waitlist.remove(waiting_id);
            }
            Undo::WaitingRemoved(entry) => {
                let restored = self.waitlist.push(entry).is_ok();
                debug_assert!(restored, "undo would duplicate a waiting entry");
            }
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.event.available_tickets <= self.event.total_tickets,
            "Invariant violated: available {} exceeds total {}",
            self.event.available_tickets,
            self.event.total_tickets
        );
        debug_assert_eq!(
            self.event.available_tickets as usize + self.bookings.len(),
            self.event.total_tickets as usize,
            "Invariant violated: available + booked != total for event {}",
            self.event.id
        );
    }
}

/// In-memory store of events, bookings and waiting lists.
#[derive(Debug)]
pub struct Store {
    ledgers: DashMap<EventId, Arc<Mutex<EventLedger>>>,
    /// Event names, for the unique name constraint.
    names: DashMap<String, EventId>,
    next_event_id: AtomicU32,
    next_booking_id: AtomicU64,
    next_waiting_id: AtomicU64,
    lock_timeout: Duration,
}

impl Store {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ledgers: DashMap::new(),
            names: DashMap::new(),
            next_event_id: AtomicU32::new(1),
            next_booking_id: AtomicU64::new(1),
            next_waiting_id: AtomicU64::new(1),
            lock_timeout: config.lock_timeout,
        }
    }

    /// Inserts a new active event with every ticket available.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::DuplicateEventName`] if the name is taken.
    pub fn create_event(&self, name: &str, total_tickets: u32) -> Result<Event, TicketError> {
        // Entry API makes the name check and insert atomic
        match self.names.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(TicketError::DuplicateEventName(name.to_owned())),
            Entry::Vacant(slot) => {
                let event = Event {
                    id: EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed)),
                    name: name.to_owned(),
                    total_tickets,
                    available_tickets: total_tickets,
                    status: EventStatus::Active,
                };
                self.ledgers
                    .insert(event.id, Arc::new(Mutex::new(EventLedger::new(event.clone()))));
                slot.insert(event.id);
                Ok(event)
            }
        }
    }

    /// Runs `f` as one transaction holding the lock on the event row.
    ///
    /// # Errors
    ///
    /// - [`TicketError::EventNotFound`] if no such event was ever created.
    /// - [`StorageError::LockTimeout`] if the row lock is not acquired within
    ///   the configured timeout; nothing is executed in that case.
    /// - Any error returned by `f`, after undoing its writes.
    pub fn transaction<T, F>(&self, event_id: EventId, f: F) -> Result<T, TicketError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, TicketError>,
    {
        self.with_row(event_id, |ledger| {
            let mut tx = Transaction {
                store: self,
                ledger,
                undo: Vec::new(),
            };
            match f(&mut tx) {
                Ok(value) => {
                    tx.commit();
                    Ok(value)
                }
                // Dropping `tx` replays the undo log
                Err(err) => {
                    tracing::debug!(%event_id, error = %err, undo_steps = tx.undo.len(), "transaction rolled back");
                    Err(err)
                }
            }
        })
    }

    /// Runs a read-only query against the committed rows of an event.
    ///
    /// Takes the same row lock as [`Store::transaction`], but stages nothing.
    pub(crate) fn read<T, F>(&self, event_id: EventId, f: F) -> Result<T, TicketError>
    where
        F: FnOnce(&EventLedger) -> Result<T, TicketError>,
    {
        self.with_row(event_id, |ledger| f(ledger))
    }

    fn with_row<T, F>(&self, event_id: EventId, f: F) -> Result<T, TicketError>
    where
        F: FnOnce(&mut EventLedger) -> Result<T, TicketError>,
    {
        // Clone the Arc out so the DashMap shard is not held while waiting
        let row = self
            .ledgers
            .get(&event_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TicketError::EventNotFound(event_id))?;

        let mut guard = row.try_lock_for(self.lock_timeout).ok_or_else(|| {
            tracing::warn!(%event_id, "timed out waiting for event row lock");
            StorageError::LockTimeout {
                event_id,
                waited_ms: self.lock_timeout.as_millis() as u64,
            }
        })?;

        f(&mut guard)
    }

    /// Committed state of every event, ordered by id.
    pub fn events(&self) -> Vec<Event> {
        let rows: Vec<_> = self
            .ledgers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut events: Vec<Event> = rows.iter().map(|row| row.lock().event.clone()).collect();
        events.sort_by_key(|event| event.id);
        events
    }

    pub(crate) fn next_booking_id(&self) -> BookingId {
        BookingId(self.next_booking_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_waiting_id(&self) -> WaitingId {
        WaitingId(self.next_waiting_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// An open transaction on one event.
///
/// Reads see the transaction's own writes. Row mutations go through
/// [`primitives`](crate::primitives); each one is recorded so the transaction
/// can be undone until it commits.
#[derive(Debug)]
pub struct Transaction<'s> {
    store: &'s Store,
    ledger: &'s mut EventLedger,
    undo: Vec<Undo>,
}

impl Transaction<'_> {
    pub fn event(&self) -> &Event {
        &self.ledger.event
    }

    pub fn event_id(&self) -> EventId {
        self.ledger.event.id
    }

    /// Booking rows in creation order.
    pub fn bookings(&self) -> &[Booking] {
        &self.ledger.bookings
    }

    pub fn holds_booking(&self, user_id: UserId) -> bool {
        self.ledger.holders.contains_key(&user_id)
    }

    pub fn waitlist(&self) -> &Waitlist {
        &self.ledger.waitlist
    }

    pub(crate) fn store(&self) -> &Store {
        self.store
    }

    pub(crate) fn push_booking(&mut self, booking: Booking) {
        self.ledger.claim_seat(booking.user_id);
        self.ledger.bookings.push(booking);
        self.undo.push(Undo::BookingPushed);
    }

    /// Deletes the user's oldest booking row.
    pub(crate) fn remove_oldest_booking(&mut self, user_id: UserId) -> Option<Booking> {
        let position = self.ledger.bookings.iter().position(|b| b.user_id == user_id)?;
        let booking = self.ledger.bookings.remove(position);
        self.ledger.release_seat(user_id);
        self.undo.push(Undo::BookingRemoved {
            position,
            booking: booking.clone(),
        });
        Some(booking)
    }

    pub(crate) fn set_available(&mut self, available: u32) {
        let previous = std::mem::replace(&mut self.ledger.event.available_tickets, available);
        self.undo.push(Undo::Available(previous));
    }

    pub(crate) fn set_status(&mut self, status: EventStatus) {
        let previous = std::mem::replace(&mut self.ledger.event.status, status);
        self.undo.push(Undo::Status(previous));
    }

    /// Inserts a waiting entry unless its user already waits.
    pub(crate) fn push_waiting(&mut self, entry: WaitingEntry) -> Result<(), WaitingEntry> {
        let waiting_id = entry.id;
        self.ledger.waitlist.push(entry)?;
        self.undo.push(Undo::WaitingPushed(waiting_id));
        Ok(())
    }

    pub(crate) fn remove_waiting(&mut self, waiting_id: WaitingId) -> Option<WaitingEntry> {
        let entry = self.ledger.waitlist.remove(waiting_id)?;
        self.undo.push(Undo::WaitingRemoved(entry.clone()));
        Some(entry)
    }

    fn commit(mut self) {
        self.ledger.assert_invariants();
        self.undo.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        while let Some(step) = self.undo.pop() {
            self.ledger.revert(step);
        }
    }
}
