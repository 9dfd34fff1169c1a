//! Typed runtime events ([`Event`], [`EventKind`]) and the broadcast
//! [`Bus`] they travel on.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
