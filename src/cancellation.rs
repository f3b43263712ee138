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

//! Cancellation and promotion.
//!
//! Releasing a seat and handing it to the head of the waiting list happen in
//! the same transaction:
//!
//! ```text
//!  delete booking ──► available += 1 ──► head of waitlist?
//!                                          │
//!                                          ├─ yes ─► book head, available -= 1, drop entry  (Reassigned)
//!                                          └─ no  ─► done                                  (NoWaitlist)
//! ```

use crate::base::UserId;
use crate::error::TicketError;
use crate::model::Booking;
use crate::primitives;
use crate::store::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelResult {
    /// The freed seat went to the oldest waiting user.
    Reassigned {
        promoted_user_id: UserId,
        new_booking: Booking,
    },
    /// Nobody was waiting; the seat returned to the available pool.
    NoWaitlist,
}

/// Cancels one of `user_id`'s seats and promotes the oldest waiting user.
///
/// A missing booking is not an error here: the caller checks it beforehand, and
/// without one the counter is left untouched. The canceller's own waiting
/// entry is withdrawn with their last seat, and entries of users who already
/// hold a seat are discarded rather than promoted.
///
/// # Errors
///
/// Store failures from any step. The caller's transaction then rolls back,
/// including the counter increment.
pub fn cancel(tx: &mut Transaction<'_>, user_id: UserId) -> Result<CancelResult, TicketError> {
    if primitives::remove_booking(tx, user_id).is_some() {
        primitives::increment_available(tx, 1)?;
    }

    // The canceller gives the seat up, so their own queued entry goes too
    if !tx.holds_booking(user_id) {
        if let Some(own) = primitives::waitlist_entry_for(tx, user_id) {
            tracing::debug!(%user_id, waiting_id = %own.id, "dropping canceller's waiting entry");
            primitives::remove_waitlist_entry(tx, own.id)?;
        }
    }

    let next = loop {
        let Some(next) = primitives::next_in_line(tx) else {
            return Ok(CancelResult::NoWaitlist);
        };
        if !tx.holds_booking(next.user_id) {
            break next;
        }
        // Stale entry: the user got a seat some other way since joining
        tracing::debug!(user_id = %next.user_id, waiting_id = %next.id, "dropping entry of seat holder");
        primitives::remove_waitlist_entry(tx, next.id)?;
    };

    let new_booking = primitives::create_booking(tx, next.user_id)?;
    primitives::decrement_available(tx, 1)?;
    primitives::remove_waitlist_entry(tx, next.id)?;

    Ok(CancelResult::Reassigned {
        promoted_user_id: next.user_id,
        new_booking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::EventId;
    use crate::store::Store;

    /// Sold-out event of `total` seats held by users 1..=total.
    fn sold_out(total: u32) -> (Store, EventId) {
        let store = Store::default();
        let event = store.create_event("Cancellation", total).unwrap();
        store
            .transaction(event.id, |tx| {
                for user in 1..=total {
                    primitives::create_booking(tx, UserId(user))?;
                }
                primitives::decrement_available(tx, total)
            })
            .unwrap();
        (store, event.id)
    }

    #[test]
    fn freed_seat_goes_to_oldest_waiting_user() {
        let (store, event_id) = sold_out(2);
        store
            .transaction(event_id, |tx| {
                primitives::create_waitlist_entry(tx, UserId(7))?;
                primitives::create_waitlist_entry(tx, UserId(8))
            })
            .unwrap();

        let result = store.transaction(event_id, |tx| cancel(tx, UserId(1))).unwrap();
        let CancelResult::Reassigned {
            promoted_user_id,
            new_booking,
        } = result
        else {
            panic!("expected reassignment");
        };
        assert_eq!(promoted_user_id, UserId(7));
        assert_eq!(new_booking.user_id, UserId(7));

        store
            .transaction(event_id, |tx| {
                assert_eq!(tx.event().available_tickets, 0);
                assert!(!tx.holds_booking(UserId(1)));
                assert!(tx.holds_booking(UserId(7)));
                assert_eq!(tx.waitlist().front().unwrap().user_id, UserId(8));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn empty_waitlist_returns_seat_to_pool() {
        let (store, event_id) = sold_out(2);
        let result = store.transaction(event_id, |tx| cancel(tx, UserId(2))).unwrap();
        assert_eq!(result, CancelResult::NoWaitlist);
        assert_eq!(store.events()[0].available_tickets, 1);
    }

    #[test]
    fn missing_booking_leaves_counter_alone() {
        let (store, event_id) = sold_out(1);
        let result = store.transaction(event_id, |tx| cancel(tx, UserId(99))).unwrap();
        assert_eq!(result, CancelResult::NoWaitlist);
        assert_eq!(store.events()[0].available_tickets, 0);
    }

    #[test]
    fn waiting_seat_holders_are_skipped() {
        let (store, event_id) = sold_out(2);
        store
            .transaction(event_id, |tx| {
                // User 2 queued, then got a seat another way
                primitives::create_waitlist_entry(tx, UserId(2))?;
                primitives::create_waitlist_entry(tx, UserId(9))
            })
            .unwrap();

        let result = store.transaction(event_id, |tx| cancel(tx, UserId(1))).unwrap();
        assert!(matches!(
            result,
            CancelResult::Reassigned { promoted_user_id: UserId(9), .. }
        ));
        store
            .transaction(event_id, |tx| {
                assert!(tx.waitlist().is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn canceller_is_never_promoted_into_own_seat() {
        let (store, event_id) = sold_out(2);
        store
            .transaction(event_id, |tx| {
                // User 1 queued before getting a seat, user 6 behind them
                primitives::create_waitlist_entry(tx, UserId(1))?;
                primitives::create_waitlist_entry(tx, UserId(6))
            })
            .unwrap();

        let result = store.transaction(event_id, |tx| cancel(tx, UserId(1))).unwrap();
        assert!(matches!(
            result,
            CancelResult::Reassigned { promoted_user_id: UserId(6), .. }
        ));
        store
            .transaction(event_id, |tx| {
                assert!(!tx.holds_booking(UserId(1)));
                assert!(!primitives::is_waitlisted(tx, UserId(1)));
                assert!(tx.waitlist().is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn reassignment_serializes_with_tag() {
        let (store, event_id) = sold_out(1);
        store
            .transaction(event_id, |tx| primitives::create_waitlist_entry(tx, UserId(5)))
            .unwrap();
        let result = store.transaction(event_id, |tx| cancel(tx, UserId(1))).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "reassigned");
        assert_eq!(json["promoted_user_id"], 5);
        assert_eq!(json["new_booking"]["user_id"], 5);
    }
}
