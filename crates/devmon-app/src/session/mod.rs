//! Per-session device state tracking

mod io;

#[cfg(test)]
mod tests;

pub use io::{DevmonIo, PollSetup, SessionParams};
