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

//! Benchmarks for the ticket allocation engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded booking
//! - Group admission on a short event
//! - Cancel and promote cycles
//! - Status queries on large events
//! - Parallel booking, across events and on one contended event

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use std::sync::Arc;
use ticket_allocation_engine::{BookingRequest, Engine, EventId, UserId};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_event(engine: &Engine, name: &str, total: u32) -> EventId {
    engine.initialize_event(name, total).unwrap().data.unwrap().id
}

/// Sold-out event of `total` seats held by users `0..total`, with `waiting`
/// more users queued behind them.
fn sold_out_event(engine: &Engine, total: u32, waiting: u32) -> EventId {
    let event_id = make_event(engine, "Sold Out", total);
    for user in 0..total + waiting {
        engine
            .request_booking(BookingRequest::single(event_id, UserId(user)))
            .unwrap();
    }
    event_id
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_booking(c: &mut Criterion) {
    c.bench_function("single_booking", |b| {
        b.iter(|| {
            let engine = Engine::new();
            let event_id = make_event(&engine, "Bench", 1);
            engine
                .request_booking(black_box(BookingRequest::single(event_id, UserId(1))))
                .unwrap();
        })
    });
}

fn bench_booking_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("booking_throughput");

    for count in [100u32, 1_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = Engine::new();
                let event_id = make_event(&engine, "Throughput", count);
                for user in 0..count {
                    engine
                        .request_booking(BookingRequest::single(event_id, UserId(user)))
                        .unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_partial_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_admission");

    for group_size in [4u32, 16, 64].iter() {
        group.throughput(Throughput::Elements(*group_size as u64));
        group.bench_with_input(
            BenchmarkId::new("group_size", group_size),
            group_size,
            |b, &group_size| {
                let guests: Vec<UserId> = (1..group_size).map(UserId).collect();
                b.iter(|| {
                    let engine = Engine::new();
                    // Half the group fits
                    let event_id = make_event(&engine, "Partial", group_size / 2);
                    let request = BookingRequest::group(event_id, UserId(0), guests.clone());
                    engine.request_booking(black_box(request)).unwrap();
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Cancellation Benchmarks
// =============================================================================

fn bench_cancel_promote(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel_promote");

    for waiting in [10u32, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*waiting as u64));
        group.bench_with_input(
            BenchmarkId::new("waiting", waiting),
            waiting,
            |b, &waiting| {
                b.iter_batched(
                    || {
                        let engine = Engine::new();
                        let event_id = sold_out_event(&engine, 10, waiting);
                        (engine, event_id)
                    },
                    |(engine, event_id)| {
                        // Each cancellation promotes the next waiting user, who
                        // is cancelled in turn
                        let mut holder = 0;
                        for promoted in 10..10 + waiting {
                            engine.cancel_booking(event_id, UserId(holder)).unwrap();
                            holder = promoted;
                        }
                        black_box(&engine);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Query Benchmarks
// =============================================================================

fn bench_status_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("status_query");

    // Queries borrow the locked rows, so cost should not grow with the event
    for waiting in [10u32, 1_000, 10_000].iter() {
        let engine = Engine::new();
        let event_id = sold_out_event(&engine, 1_000, *waiting);
        group.bench_with_input(BenchmarkId::new("waiting", waiting), &event_id, |b, &event_id| {
            b.iter(|| {
                black_box(engine.get_available_tickets(black_box(event_id)).unwrap());
                black_box(engine.get_event_status(black_box(event_id)).unwrap());
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_bookings_different_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_bookings_different_events");

    for num_events in [10u32, 100].iter() {
        let per_event = 100u32;
        group.throughput(Throughput::Elements((num_events * per_event) as u64));
        group.bench_with_input(
            BenchmarkId::new("events", num_events),
            num_events,
            |b, &num_events| {
                b.iter_batched(
                    || {
                        let engine = Engine::new();
                        let events: Vec<EventId> = (0..num_events)
                            .map(|i| make_event(&engine, &format!("Event {i}"), per_event))
                            .collect();
                        (Arc::new(engine), events)
                    },
                    |(engine, events)| {
                        events.par_iter().for_each(|&event_id| {
                            for user in 0..per_event {
                                engine
                                    .request_booking(BookingRequest::single(event_id, UserId(user)))
                                    .unwrap();
                            }
                        });
                        black_box(&engine);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 2_000u32;

    // Fewer events = more threads competing for the same row lock
    for num_events in [1u32, 10, 100].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("events", num_events),
            num_events,
            |b, &num_events| {
                b.iter_batched(
                    || {
                        let engine = Engine::new();
                        let events: Vec<EventId> = (0..num_events)
                            .map(|i| make_event(&engine, &format!("Hot {i}"), 50))
                            .collect();
                        (Arc::new(engine), events)
                    },
                    |(engine, events)| {
                        (0..total_ops).into_par_iter().for_each(|i| {
                            let event_id = events[(i % num_events) as usize];
                            // Sold-out events fall back to the waiting list
                            engine
                                .request_booking(BookingRequest::single(event_id, UserId(i)))
                                .unwrap();
                        });
                        black_box(&engine);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let num_events = 64u32;
    let per_event = 50u32;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements((num_events * per_event) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| {
                    let engine = Arc::new(Engine::new());
                    let events: Vec<EventId> = (0..num_events)
                        .map(|i| make_event(&engine, &format!("Scale {i}"), per_event))
                        .collect();

                    pool.install(|| {
                        (0..num_events * per_event).into_par_iter().for_each(|i| {
                            let event_id = events[(i % num_events) as usize];
                            engine
                                .request_booking(BookingRequest::single(event_id, UserId(i)))
                                .unwrap();
                        });
                    });

                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    single_threaded,
    bench_single_booking,
    bench_booking_throughput,
    bench_partial_admission,
);

criterion_group!(cancellation, bench_cancel_promote);

criterion_group!(queries, bench_status_query);

criterion_group!(
    multi_threaded,
    bench_parallel_bookings_different_events,
    bench_contention,
    bench_thread_scaling,
);

criterion_main!(single_threaded, cancellation, queries, multi_threaded);
