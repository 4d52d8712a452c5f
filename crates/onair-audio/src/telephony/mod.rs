//! Telephony bridge: 8 kHz mu-law phone calls in and out of the show.

mod bridge;
pub mod carrier;
mod session;

pub use bridge::{CallHandler, TelephonyBridge};
pub use carrier::{CarrierCommand, CarrierEvent};
pub use session::{CallSession, MediaOutcome};
