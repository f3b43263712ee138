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

//! Direct booking path: all-or-nothing booking of an exact quantity.

use crate::base::UserId;
use crate::error::TicketError;
use crate::model::Booking;
use crate::primitives;
use crate::store::Transaction;

/// Books `quantity` seats inside `tx`.
///
/// One seat goes to each additional user, and the remaining
/// `quantity - additional.len()` seats all go to `user_id` as separate rows.
/// `quantity` is not required to equal `1 + additional.len()`.
///
/// # Errors
///
/// - [`TicketError::InvalidQuantity`] if `quantity` is zero.
/// - [`TicketError::QuantityBelowAdditionalUsers`] if `quantity` cannot cover
///   every additional user.
/// - [`TicketError::InsufficientTickets`] if the locked counter holds fewer than
///   `quantity` tickets.
/// - [`TicketError::DuplicateBooking`] if an additional user, or `user_id` for
///   its first seat, already holds a booking.
pub fn book_exact(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    quantity: u32,
    additional: &[UserId],
) -> Result<Vec<Booking>, TicketError> {
    if quantity < 1 {
        return Err(TicketError::InvalidQuantity);
    }
    let own_seats = (quantity as usize)
        .checked_sub(additional.len())
        .ok_or(TicketError::QuantityBelowAdditionalUsers {
            quantity,
            additional: additional.len(),
        })?;

    let available = tx.event().available_tickets;
    if available < quantity {
        return Err(TicketError::InsufficientTickets {
            requested: quantity,
            available,
        });
    }

    let mut bookings = Vec::with_capacity(quantity as usize);
    for &guest in additional {
        bookings.push(primitives::create_booking(tx, guest)?);
    }
    for seat in 0..own_seats {
        let booking = if seat == 0 {
            primitives::create_booking(tx, user_id)?
        } else {
            primitives::create_additional_seat(tx, user_id)
        };
        bookings.push(booking);
    }

    primitives::decrement_available(tx, quantity)?;
    Ok(bookings)
}
