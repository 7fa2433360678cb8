//! devmon
//!
//! Command line front end for the device state tracking engine. The engine
//! itself lives in the `devmon-app` crate; this library only holds what the
//! binary needs on top of it.

pub mod replay;
