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

//! Admission control for requests that exceed the available tickets.
//!
//! When a group asks for more seats than remain, the controller decides who is
//! booked now and who joins the waiting list:
//!
//! | Available | Behavior |
//! |-----------|----------|
//! | `0` | Every requested user not already waiting is waitlisted |
//! | `0 < n < requested` | Primary booked first, then additional users in input order while fewer than `n` are booked; the rest are waitlisted |
//!
//! The comparison for additional users is made against the available count
//! read when the request started, not against the seats left after each
//! booking.

use crate::base::UserId;
use crate::error::TicketError;
use crate::primitives;
use crate::store::Transaction;
use serde::{Deserialize, Serialize};

/// Outcome of admitting a request that could not be fully booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdmissionResult {
    /// No ticket was available; the listed users joined the waiting list.
    FullyWaitlisted { waitlisted_user_ids: Vec<UserId> },
    /// Some users were booked and the rest joined the waiting list.
    PartialFulfillment {
        booked_user_ids: Vec<UserId>,
        waitlisted_user_ids: Vec<UserId>,
    },
}

/// Books what capacity allows and waitlists the remainder, inside `tx`.
///
/// Users already waiting, or already holding a seat on the event, are not
/// waitlisted again and do not appear in `waitlisted_user_ids`.
///
/// # Errors
///
/// - [`TicketError::DuplicateBooking`] if a user chosen for a seat already
///   holds one (e.g. listed twice in `additional`).
/// - Store failures from the counter or row writes.
///
/// Either way the caller's transaction rolls back as a whole.
pub fn admit(
    tx: &mut Transaction<'_>,
    primary: UserId,
    additional: &[UserId],
) -> Result<AdmissionResult, TicketError> {
    let available = tx.event().available_tickets as usize;

    if available == 0 {
        let mut waitlisted_user_ids = Vec::new();
        for &user_id in std::iter::once(&primary).chain(additional) {
            if waitlist_unless_present(tx, user_id)? {
                waitlisted_user_ids.push(user_id);
            }
        }
        return Ok(AdmissionResult::FullyWaitlisted { waitlisted_user_ids });
    }

    let mut booked_user_ids = Vec::with_capacity(available);
    let mut waitlisted_user_ids = Vec::new();

    primitives::create_booking(tx, primary)?;
    booked_user_ids.push(primary);

    for &user_id in additional {
        if booked_user_ids.len() < available {
            primitives::create_booking(tx, user_id)?;
            booked_user_ids.push(user_id);
        } else if waitlist_unless_present(tx, user_id)? {
            waitlisted_user_ids.push(user_id);
        }
    }

    primitives::decrement_available(tx, booked_user_ids.len() as u32)?;

    Ok(AdmissionResult::PartialFulfillment {
        booked_user_ids,
        waitlisted_user_ids,
    })
}

/// Waitlists a user unless they already wait or hold a seat.
///
/// Returns whether an entry was created.
fn waitlist_unless_present(tx: &mut Transaction<'_>, user_id: UserId) -> Result<bool, TicketError> {
    if primitives::is_waitlisted(tx, user_id) || tx.holds_booking(user_id) {
        return Ok(false);
    }
    primitives::create_waitlist_entry(tx, user_id)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn users(ids: &[u32]) -> Vec<UserId> {
        ids.iter().copied().map(UserId).collect()
    }

    /// Creates an event with `total` tickets of which `booked` are taken by users 1000+.
    fn event_with(store: &Store, total: u32, booked: u32) -> crate::EventId {
        let event = store.create_event("Admission", total).unwrap();
        store
            .transaction(event.id, |tx| {
                for i in 0..booked {
                    primitives::create_booking(tx, UserId(1000 + i))?;
                }
                primitives::decrement_available(tx, booked)
            })
            .unwrap();
        event.id
    }

    #[test]
    fn sold_out_event_waitlists_everyone_in_order() {
        let store = Store::default();
        let event_id = event_with(&store, 2, 2);

        let result = store
            .transaction(event_id, |tx| admit(tx, UserId(9), &users(&[4, 5])))
            .unwrap();
        assert_eq!(
            result,
            AdmissionResult::FullyWaitlisted {
                waitlisted_user_ids: users(&[9, 4, 5])
            }
        );

        store
            .transaction(event_id, |tx| {
                assert_eq!(tx.event().available_tickets, 0);
                let order: Vec<_> = tx.waitlist().iter().map(|e| e.user_id).collect();
                assert_eq!(order, users(&[9, 4, 5]));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn sold_out_event_skips_users_already_waiting() {
        let store = Store::default();
        let event_id = event_with(&store, 1, 1);
        store
            .transaction(event_id, |tx| primitives::create_waitlist_entry(tx, UserId(4)))
            .unwrap();

        let result = store
            .transaction(event_id, |tx| admit(tx, UserId(4), &users(&[5, 5])))
            .unwrap();
        assert_eq!(
            result,
            AdmissionResult::FullyWaitlisted {
                waitlisted_user_ids: users(&[5])
            }
        );
    }

    #[test]
    fn sold_out_event_does_not_waitlist_seat_holders() {
        let store = Store::default();
        let event_id = event_with(&store, 1, 1);

        let result = store
            .transaction(event_id, |tx| admit(tx, UserId(3), &users(&[1000])))
            .unwrap();
        assert_eq!(
            result,
            AdmissionResult::FullyWaitlisted {
                waitlisted_user_ids: users(&[3])
            }
        );
    }

    #[test]
    fn partial_request_books_up_to_original_availability() {
        let store = Store::default();
        let event_id = event_with(&store, 5, 2);

        let result = store
            .transaction(event_id, |tx| admit(tx, UserId(1), &users(&[2, 3, 4, 5])))
            .unwrap();
        assert_eq!(
            result,
            AdmissionResult::PartialFulfillment {
                booked_user_ids: users(&[1, 2, 3]),
                waitlisted_user_ids: users(&[4, 5]),
            }
        );

        store
            .transaction(event_id, |tx| {
                assert_eq!(tx.event().available_tickets, 0);
                assert_eq!(tx.bookings().len(), 5);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn single_seat_goes_to_primary() {
        let store = Store::default();
        let event_id = event_with(&store, 3, 2);

        let result = store
            .transaction(event_id, |tx| admit(tx, UserId(1), &users(&[2])))
            .unwrap();
        assert_eq!(
            result,
            AdmissionResult::PartialFulfillment {
                booked_user_ids: users(&[1]),
                waitlisted_user_ids: users(&[2]),
            }
        );
    }

    #[test]
    fn booking_conflict_rolls_back_whole_request() {
        let store = Store::default();
        let event_id = event_with(&store, 4, 1);

        // User 1000 already holds a seat and would be booked second
        let result = store.transaction(event_id, |tx| admit(tx, UserId(1), &users(&[1000, 2, 3])));
        assert!(matches!(result, Err(TicketError::DuplicateBooking { .. })));

        store
            .transaction(event_id, |tx| {
                assert_eq!(tx.event().available_tickets, 3);
                assert!(!tx.holds_booking(UserId(1)));
                assert!(tx.waitlist().is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn outcomes_serialize_with_tag() {
        let result = AdmissionResult::PartialFulfillment {
            booked_user_ids: users(&[1]),
            waitlisted_user_ids: users(&[2]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "partial_fulfillment");
        assert_eq!(json["booked_user_ids"], serde_json::json!([1]));
        assert_eq!(json["waitlisted_user_ids"], serde_json::json!([2]));
    }
}
