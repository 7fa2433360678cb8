//! # devmon-core - Core Domain Types
//!
//! Foundation crate for devmon. Provides the device signal types, the
//! observable [`Signal`] source, session identity, error handling and logging
//! setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing, plus tracing-subscriber and
//! tracing-appender for `logging`).
//!
//! ## Public API
//!
//! ### Signals (`signal`)
//! - [`Signal`] - Observable valid flag + typed state with subscribe/unsubscribe
//! - [`SignalKind`], [`SignalEvent`], [`Update`], [`SignalSnapshot`]
//!
//! ### Domain Types (`types`)
//! - [`DisplayState`], [`BatteryStatus`], [`ChargerState`] - watcher states
//! - [`BatteryState`] - Coarse state returned by the battery polling helper
//! - [`SessionId`] - Identity of one running session
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum; `is_fatal` marks configuration errors
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use devmon_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod signal;
pub mod types;

/// Prelude for common imports used throughout all devmon crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use signal::{HandlerId, Signal, SignalEvent, SignalKind, SignalSnapshot, Update};
pub use types::{BatteryState, BatteryStatus, ChargerState, DisplayState, SessionId};
