//! Domain types for the agent adapter

mod event;
mod message;

pub use event::*;
pub use message::*;
