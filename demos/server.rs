//! Simple REST API server example for the ticket allocation engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /events` - Initialize an event
//! - `GET /events/{id}/status` - Event record and waiting list length
//! - `GET /tickets/available/{id}` - Available tickets for an event
//! - `POST /tickets/book` - Book tickets (partially waitlisting if needed)
//! - `POST /tickets/cancel` - Cancel a booking, promoting the next waiting user
//! - `POST /waitlist/join` - Join an event's waiting list
//! - `GET /waitlist/{id}` - Waiting list of an event
//!
//! ## Example Usage
//!
//! ```bash
//! # Create an event
//! curl -X POST http://localhost:3000/events \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Launch Party", "total_tickets": 2}'
//!
//! # Book for a group
//! curl -X POST http://localhost:3000/tickets/book \
//!   -H "Content-Type: application/json" \
//!   -d '{"event_id": 1, "user_id": 1, "additional_user_ids": [2, 3], "quantity": 3}'
//!
//! # Cancel
//! curl -X POST http://localhost:3000/tickets/cancel \
//!   -H "Content-Type: application/json" \
//!   -d '{"event_id": 1, "user_id": 2}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use ticket_allocation_engine::{BookingRequest, Engine, EventId, TicketError, UserId};
use tokio::net::TcpListener;

// === Request DTOs ===

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub total_tickets: u32,
}

/// Request body naming a user on an event, for cancel and join.
#[derive(Debug, Deserialize)]
pub struct UserEventRequest {
    pub event_id: u32,
    pub user_id: u32,
}

// === Application State ===

/// Shared application state containing the allocation engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `TicketError` into the response envelope.
pub struct AppError(TicketError);

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ticket_allocation_engine::Response<()> =
            ticket_allocation_engine::Response::error(&self.0);
        (status, Json(body)).into_response()
    }
}

/// Sends an envelope with its own status code.
fn reply<T: serde::Serialize>(envelope: ticket_allocation_engine::Response<T>) -> Response {
    let status = StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::OK);
    (status, Json(envelope)).into_response()
}

// === Handlers ===

async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    Ok(reply(
        state
            .engine
            .initialize_event(&request.name, request.total_tickets)?,
    ))
}

async fn event_status(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Response, AppError> {
    Ok(reply(state.engine.get_event_status(EventId(id))?))
}

async fn available_tickets(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Response, AppError> {
    Ok(reply(state.engine.get_available_tickets(EventId(id))?))
}

async fn book(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Response, AppError> {
    Ok(reply(state.engine.request_booking(request)?))
}

async fn cancel(
    State(state): State<AppState>,
    Json(request): Json<UserEventRequest>,
) -> Result<Response, AppError> {
    Ok(reply(
        state
            .engine
            .cancel_booking(EventId(request.event_id), UserId(request.user_id))?,
    ))
}

async fn join_waitlist(
    State(state): State<AppState>,
    Json(request): Json<UserEventRequest>,
) -> Result<Response, AppError> {
    Ok(reply(
        state
            .engine
            .join_waitlist(EventId(request.event_id), UserId(request.user_id))?,
    ))
}

async fn waitlist(State(state): State<AppState>, Path(id): Path<u32>) -> Result<Response, AppError> {
    Ok(reply(state.engine.waitlist(EventId(id))?))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{id}/status", get(event_status))
        .route("/tickets/available/{id}", get(available_tickets))
        .route("/tickets/book", post(book))
        .route("/tickets/cancel", post(cancel))
        .route("/waitlist/join", post(join_waitlist))
        .route("/waitlist/{id}", get(waitlist))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ticket_allocation_engine=info")),
        )
        .init();

    let state = AppState {
        engine: Arc::new(Engine::new()),
    };

    let app = create_router(state);

    let listener = match TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind 127.0.0.1:3000");
            return;
        }
    };
    tracing::info!("ticket API server running on http://127.0.0.1:3000");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server stopped");
    }
}
