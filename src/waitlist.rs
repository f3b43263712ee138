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

//! Per-event waiting list with duplicate detection.
//!
//! Keeps entries in promotion order while guaranteeing at most one entry per
//! user.

use crate::base::{UserId, WaitingId};
use crate::model::WaitingEntry;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

type FifoKey = (DateTime<Utc>, WaitingId);

/// A FIFO waiting list with duplicate detection.
///
/// Combines [`HashMap`] indexes by user and by entry id with a [`BTreeMap`]
/// ordered by `(created_at, id)` for the promotion order.
/// Not synchronised on its own: it lives inside an event ledger and is only
/// touched while the event row lock is held.
#[derive(Debug, Clone, Default)]
pub struct Waitlist {
    /// Entries in promotion order.
    entries: BTreeMap<FifoKey, WaitingEntry>,

    /// Position of each waiting user in `entries`.
    members: HashMap<UserId, FifoKey>,

    /// Position of each entry id in `entries`.
    ids: HashMap<WaitingId, FifoKey>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry unless its user is already waiting.
    ///
    /// Returns the rejected entry back if the user already holds a place.
    pub fn push(&mut self, entry: WaitingEntry) -> Result<(), WaitingEntry> {
        // Entry API gives the insert-if-absent the uniqueness constraint needs
        match self.members.entry(entry.user_id) {
            Entry::Occupied(_) => Err(entry),
            Entry::Vacant(slot) => {
                let key = entry.fifo_key();
                slot.insert(key);
                self.ids.insert(entry.id, key);
                self.entries.insert(key, entry);
                Ok(())
            }
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.members.contains_key(&user_id)
    }

    /// The entry held by `user_id`, if they are waiting.
    pub fn get(&self, user_id: UserId) -> Option<&WaitingEntry> {
        self.members.get(&user_id).and_then(|key| self.entries.get(key))
    }

    /// The oldest entry, next in line for promotion.
    pub fn front(&self) -> Option<&WaitingEntry> {
        self.entries.values().next()
    }

    /// The newest entry.
    pub fn back(&self) -> Option<&WaitingEntry> {
        self.entries.values().next_back()
    }

    /// Removes an entry by id.
    pub fn remove(&mut self, waiting_id: WaitingId) -> Option<WaitingEntry> {
        let key = self.ids.remove(&waiting_id)?;
        let entry = self.entries.remove(&key)?;
        self.members.remove(&entry.user_id);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.entries.values()
    }
}
