//! Route handlers.

pub mod health;
pub mod interrupts;
pub mod telephony;
