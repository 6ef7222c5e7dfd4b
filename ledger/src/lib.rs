//! Muster event escrow ledger.
//!
//! Organizers create events with a fixed per-slot deposit; participants
//! stake exactly that deposit to reserve a slot; the organizer confirms
//! attendees, which refunds their deposits immediately; once a grace period
//! after the scheduled start has elapsed, the organizer sweeps every
//! unclaimed deposit in a single settlement.
//!
//! All persistent state lives behind the [State] trait and is owned by the
//! caller. Operations execute against a [Layer], which observes the store
//! at a fixed time, stages every write in memory, and on [Layer::commit]
//! hands back the writes together with the notification stream they
//! produced. An operation either applies all of its effects or returns an
//! [EscrowError] and stages nothing.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside operations; a layer's `now` is fixed
//!   at construction.
//! - Avoid iteration order of hash-based collections influencing outputs.

use thiserror::Error;

mod layer;
mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use layer::Layer;
pub use state::{balance, load_event, load_reservation, State};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;

/// Failure surfaced synchronously by a ledger operation.
///
/// Every variant leaves the layer untouched: callers may keep using it after
/// handling the error. The one exception is [EscrowError::State], which
/// signals a backing-store failure; the layer must then be discarded without
/// committing.
#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: &'static str },

    #[error("event {event} not found")]
    EventNotFound { event: u64 },

    #[error("event {event} is at capacity ({max_capacity})")]
    EventFull { event: u64, max_capacity: u32 },

    #[error("already holding a reservation for event {event}")]
    DuplicateReservation { event: u64 },

    #[error("deposit must be exactly {expected} (got {got})")]
    IncorrectDepositAmount { expected: u64, got: u64 },

    #[error("insufficient funds (need {need}, have {have})")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("only the organizer may {action}")]
    NotAuthorized { action: &'static str },

    #[error("no reservation for that participant on event {event}")]
    ReservationNotFound { event: u64 },

    #[error("attendance already confirmed for event {event}")]
    AlreadyConfirmed { event: u64 },

    #[error("grace period still open (now {now}, sweep opens at {opens_at})")]
    TooEarly { now: u64, opens_at: u64 },

    #[error("deposits for event {event} already swept")]
    AlreadySettled { event: u64 },

    #[error(transparent)]
    State(#[from] anyhow::Error),
}
