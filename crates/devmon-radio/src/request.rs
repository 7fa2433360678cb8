//! Request classes and request building

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::{DeviceStateType, IndicationFilter, RadioInterface, RadioReq, RadioResp};

/// A category of outbound command.
///
/// At most one request per class is in flight per session, and the remote
/// side may declare a whole class unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    LowDataExpected,
    ChargingState,
    IndicationFilter,
}

impl RequestClass {
    pub const ALL: [RequestClass; 3] = [
        RequestClass::LowDataExpected,
        RequestClass::ChargingState,
        RequestClass::IndicationFilter,
    ];

    /// Response code a well-behaved remote answers this class with
    pub fn expected_response(&self) -> RadioResp {
        match self {
            RequestClass::LowDataExpected | RequestClass::ChargingState => {
                RadioResp::SendDeviceState
            }
            RequestClass::IndicationFilter => RadioResp::SetIndicationFilter,
        }
    }

    /// Build the request carrying `value` for this class
    pub fn build(&self, value: bool, interface: RadioInterface) -> RadioRequest {
        match self {
            RequestClass::LowDataExpected => {
                RadioRequest::device_state(DeviceStateType::LowDataExpected, value)
            }
            RequestClass::ChargingState => {
                RadioRequest::device_state(DeviceStateType::ChargingState, value)
            }
            RequestClass::IndicationFilter => RadioRequest::indication_filter(
                RadioReq::indication_filter_for(interface),
                IndicationFilter::for_display(value, interface),
            ),
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::LowDataExpected => write!(f, "LOW_DATA_EXPECTED"),
            RequestClass::ChargingState => write!(f, "CHARGING_STATE"),
            RequestClass::IndicationFilter => write!(f, "INDICATION_FILTER"),
        }
    }
}

/// Request arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// `sendDeviceState(serial, DeviceStateType type, bool state)`
    DeviceState { kind: DeviceStateType, state: bool },
    /// `setIndicationFilter*(serial, bitfield<IndicationFilter>)`
    IndicationFilter(IndicationFilter),
}

/// A fully built outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RadioRequest {
    pub code: RadioReq,
    pub payload: Payload,
}

impl RadioRequest {
    pub fn device_state(kind: DeviceStateType, state: bool) -> Self {
        Self {
            code: RadioReq::SendDeviceState,
            payload: Payload::DeviceState { kind, state },
        }
    }

    pub fn indication_filter(code: RadioReq, filter: IndicationFilter) -> Self {
        Self {
            code,
            payload: Payload::IndicationFilter(filter),
        }
    }
}

impl fmt::Display for RadioRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::DeviceState { kind, state } => {
                write!(f, "{}({:?}, {})", self.code, kind, state)
            }
            Payload::IndicationFilter(filter) => write!(f, "{}({})", self.code, filter),
        }
    }
}
