//! Command handlers.

pub mod check;
pub mod run;
