//! # devmon-radio - Radio Request Plumbing
//!
//! The remote side of devmon: request/response vocabulary, a transport
//! abstraction with per-request completion, and the modem slot a session
//! pushes its cell info interval to.
//!
//! Depends on [`devmon_core`] for session identity.
//!
//! ## Public API
//!
//! ### Protocol (`protocol`, `request`)
//! - [`RadioInterface`] - Negotiated HAL interface version
//! - [`RequestClass`] - Category of outbound command, one in flight at a time
//! - [`RadioRequest`] - A built request (`sendDeviceState`, `setIndicationFilter*`)
//! - [`IndicationFilter`] - Unsolicited indication bitmask
//!
//! ### Transport (`transport`)
//! - [`RadioTransport`] - Submit/cancel contract sessions depend on
//! - [`ChannelTransport`] - Channel-backed transport with serial tracking
//! - [`Completion`] - Delivery status, echoed response and error code
//!
//! ### Modem slot (`slot`)
//! - [`ModemSlot`] - Per-owner cell info interval requests
//! - [`CellInfoIntervals`] - Aggregates owners, applies the shortest interval

pub mod protocol;
pub mod request;
pub mod slot;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod transport;

pub use protocol::{
    DeviceStateType, IndicationFilter, RadioError, RadioInterface, RadioReq, RadioResp, TxStatus,
};
pub use request::{Payload, RadioRequest, RequestClass};
pub use slot::{CellInfoIntervals, ModemSlot};
pub use transport::{
    ChannelTransport, Completion, CompletionFn, OutgoingRequest, RadioTransport, RequestToken,
};
