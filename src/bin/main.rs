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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use ticket_allocation_engine::{BookingRequest, Engine, EngineConfig, EventId, UserId};
use tracing_subscriber::EnvFilter;

/// Ticket Allocation Engine - Replay booking command CSV files
///
/// Reads booking commands from a CSV file and outputs the final state of every
/// event to stdout. Supports creating and closing events, booking, cancelling,
/// and joining waiting lists.
#[derive(Parser, Debug)]
#[command(name = "ticket-allocation-engine")]
#[command(about = "Replays ticket booking commands and reports event states", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: type,event,user,quantity,guests,name
    /// Example: cargo run -- commands.csv > events.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// How long a command waits for an event lock before failing
    #[arg(long, env = "TICKETING_LOCK_TIMEOUT_MS", default_value_t = 5000)]
    lock_timeout_ms: u64,

    /// Verbose logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr so stdout stays a clean CSV report
    let filter = match args.verbose {
        0 => "ticket_allocation_engine=warn",
        1 => "ticket_allocation_engine=info",
        _ => "ticket_allocation_engine=debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(path = %args.input.display(), error = %e, "cannot open input file");
            process::exit(1);
        }
    };

    let config = EngineConfig::default().with_lock_timeout(Duration::from_millis(args.lock_timeout_ms));
    let replay = match process_commands(BufReader::new(file), config) {
        Ok(replay) => replay,
        Err(e) => {
            tracing::error!(error = %e, "failed to process commands");
            process::exit(1);
        }
    };

    if let Err(e) = write_events(&replay, std::io::stdout()) {
        tracing::error!(error = %e, "failed to write report");
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, event, user, quantity, guests, name`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    command: String,
    event: u32,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    quantity: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    guests: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    name: Option<String>,
}

/// A parsed command. `label` is the CSV's own event number.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Create { label: u32, name: String, total: u32 },
    Book { label: u32, user: UserId, quantity: Option<u32>, guests: Vec<UserId> },
    Cancel { label: u32, user: UserId },
    Join { label: u32, user: UserId },
    Close { label: u32 },
}

impl CsvRecord {
    /// Converts the CSV record to a command.
    ///
    /// Returns `None` for unknown command types, missing required fields, or
    /// guest lists that are not whitespace-separated user ids.
    fn into_command(self) -> Option<Command> {
        let label = self.event;

        match self.command.to_lowercase().as_str() {
            "create" => Some(Command::Create {
                label,
                name: self.name.unwrap_or_else(|| format!("event-{label}")),
                total: self.quantity?,
            }),
            "book" => {
                let guests = match self.guests {
                    Some(list) => list
                        .split_whitespace()
                        .map(|id| id.parse().map(UserId))
                        .collect::<Result<Vec<_>, _>>()
                        .ok()?,
                    None => Vec::new(),
                };
                Some(Command::Book {
                    label,
                    user: UserId(self.user?),
                    quantity: self.quantity,
                    guests,
                })
            }
            "cancel" => Some(Command::Cancel {
                label,
                user: UserId(self.user?),
            }),
            "join" => Some(Command::Join {
                label,
                user: UserId(self.user?),
            }),
            "close" => Some(Command::Close { label }),
            _ => None,
        }
    }
}

/// An engine after replaying a command file, with the CSV labels of its events.
pub struct Replay {
    engine: Engine,
    labels: HashMap<u32, EventId>,
    /// File lines of rows that were malformed or rejected.
    skipped: Vec<u64>,
}

impl Replay {
    fn new(config: EngineConfig) -> Self {
        Self {
            engine: Engine::with_config(config),
            labels: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    fn event_id(&self, label: u32) -> EventId {
        // Unknown labels map to an id the store never issues, so the engine reports not found
        self.labels.get(&label).copied().unwrap_or(EventId(0))
    }

    fn apply(&mut self, command: Command) -> Result<(), ticket_allocation_engine::TicketError> {
        match command {
            Command::Create { label, name, total } => {
                let response = self.engine.initialize_event(&name, total)?;
                if let Some(event) = response.data {
                    self.labels.insert(label, event.id);
                }
            }
            Command::Book {
                label,
                user,
                quantity,
                guests,
            } => {
                let mut request = BookingRequest::group(self.event_id(label), user, guests);
                if let Some(quantity) = quantity {
                    request.quantity = quantity;
                }
                self.engine.request_booking(request)?;
            }
            Command::Cancel { label, user } => {
                self.engine.cancel_booking(self.event_id(label), user)?;
            }
            Command::Join { label, user } => {
                self.engine.join_waitlist(self.event_id(label), user)?;
            }
            Command::Close { label } => {
                self.engine.cancel_event(self.event_id(label))?;
            }
        }
        Ok(())
    }
}

/// Replay commands from a CSV reader.
///
/// Streams the input so arbitrarily large command files never sit in memory.
/// Malformed rows and rejected commands are logged with their line in the
/// file and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, event, user, quantity, guests, name`
/// - `type`: Command (create, book, cancel, join, close)
/// - `event`: Event label chosen by the file; `create` binds it
/// - `user`: User ID (book, cancel, join)
/// - `quantity`: Total tickets for `create`; seats for `book` (defaults to 1 + guests)
/// - `guests`: Space-separated additional user IDs for `book`
/// - `name`: Event name for `create` (defaults to `event-<label>`)
///
/// # Example
///
/// ```csv
/// type,event,user,quantity,guests,name
/// create,1,,2,,Launch Party
/// book,1,10,,11 12,
/// cancel,1,11,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(reader: R, config: EngineConfig) -> Result<Replay, csv::Error> {
    let mut replay = Replay::new(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for result in rdr.records() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                let line = e.position().map_or(0, |pos| pos.line());
                tracing::warn!(line, error = %e, "skipping unreadable row");
                replay.skipped.push(line);
                continue;
            }
        };
        let line = raw.position().map_or(0, |pos| pos.line());

        let record = match raw.deserialize::<CsvRecord>(Some(&headers)) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed row");
                replay.skipped.push(line);
                continue;
            }
        };
        let Some(command) = record.into_command() else {
            tracing::warn!(line, "skipping invalid command record");
            replay.skipped.push(line);
            continue;
        };

        if let Err(e) = replay.apply(command.clone()) {
            tracing::warn!(line, ?command, error = %e, "command rejected");
            replay.skipped.push(line);
        }
    }

    Ok(replay)
}

/// One line of the event report.
#[derive(Debug, Serialize)]
struct EventRow {
    event: u32,
    name: String,
    total: u32,
    available: u32,
    booked: usize,
    waiting: usize,
    status: String,
}

/// Write event states to a CSV writer
///
/// # CSV Format
///
/// Columns: `event, name, total, available, booked, waiting, status`
///
/// # Example
///
/// ```csv
/// event,name,total,available,booked,waiting,status
/// 1,Launch Party,2,0,2,1,active
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_events<W: Write>(replay: &Replay, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let labels: HashMap<EventId, u32> = replay.labels.iter().map(|(l, id)| (*id, *l)).collect();

    for event in replay.engine.events() {
        let booked = replay.engine.bookings(event.id).map_or(0, |b| b.len());
        let waiting = replay
            .engine
            .waitlist(event.id)
            .ok()
            .and_then(|response| response.data)
            .map_or(0, |entries| entries.len());

        wtr.serialize(EventRow {
            event: labels.get(&event.id).copied().unwrap_or(event.id.0),
            name: event.name,
            total: event.total_tickets,
            available: event.available_tickets,
            booked,
            waiting,
            status: event.status.to_string(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay(csv: &str) -> Replay {
        process_commands(Cursor::new(csv.to_owned()), EngineConfig::default()).unwrap()
    }

    fn report(replay: &Replay) -> String {
        let mut output = Vec::new();
        write_events(replay, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn parse_create_and_book() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,7,,5,,Concert\n\
             book,7,1,,,\n",
        );
        let events = replay.engine.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Concert");
        assert_eq!(events[0].available_tickets, 4);
    }

    #[test]
    fn parse_group_booking_with_guests() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,1,,2,,Gala\n\
             book,1,1,,2 3,\n",
        );
        let id = replay.event_id(1);
        assert_eq!(replay.engine.bookings(id).unwrap().len(), 2);
        let waiting = replay.engine.waitlist(id).unwrap().data.unwrap();
        assert_eq!(waiting[0].user_id, UserId(3));
    }

    #[test]
    fn parse_cancel_promotes_waiting_user() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,1,,1,,Gala\n\
             book,1,1,,,\n\
             join,1,2,,,\n\
             cancel,1,1,,,\n",
        );
        let bookings = replay.engine.bookings(replay.event_id(1)).unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].user_id, UserId(2));
    }

    #[test]
    fn parse_with_whitespace_and_short_rows() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n \
             create , 1 , , 3\n \
             book , 1 , 4\n",
        );
        assert_eq!(replay.engine.events()[0].available_tickets, 2);
        assert_eq!(replay.engine.events()[0].name, "event-1");
    }

    #[test]
    fn skip_malformed_rows_and_rejected_commands() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,1,,2,,Gala\n\
             invalid,row,data,here,,\n\
             book,1,1,,x y,\n\
             book,9,1,,,\n\
             book,1,1,,,\n\
             book,1,1,,,\n",
        );
        // Only the first valid booking for user 1 lands
        assert_eq!(replay.engine.events()[0].available_tickets, 1);
    }

    #[test]
    fn skipped_rows_report_their_file_line() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,1,,2,,Gala\n\
             invalid,row,data,here,,\n\
             book,1,1,,x y,\n\
             book,9,1,,,\n\
             book,1,1,,,\n\
             book,1,1,,,\n",
        );
        // The header is line 1
        assert_eq!(replay.skipped, vec![3, 4, 5, 7]);
    }

    #[test]
    fn write_events_to_csv() {
        let replay = replay(
            "type,event,user,quantity,guests,name\n\
             create,3,,2,,Gala\n\
             book,3,1,,2 3,\n\
             create,4,,10,,Expo\n\
             close,4,,,,\n",
        );
        let output = report(&replay);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "event,name,total,available,booked,waiting,status");
        assert_eq!(lines[1], "3,Gala,2,0,2,1,active");
        assert_eq!(lines[2], "4,Expo,10,10,0,0,cancelled");
    }
}
