//! Radio protocol identifiers
//!
//! Only the operations devmon issues are modelled: `sendDeviceState` and the
//! three `setIndicationFilter` revisions. Numeric values follow the radio HAL.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Radio HAL interface version negotiated by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RadioInterface {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
    #[serde(rename = "1.4")]
    V1_4,
    #[serde(rename = "1.5")]
    V1_5,
}

impl fmt::Display for RadioInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RadioInterface::V1_0 => "1.0",
            RadioInterface::V1_1 => "1.1",
            RadioInterface::V1_2 => "1.2",
            RadioInterface::V1_3 => "1.3",
            RadioInterface::V1_4 => "1.4",
            RadioInterface::V1_5 => "1.5",
        };
        write!(f, "{}", s)
    }
}

/// Outbound request codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioReq {
    SendDeviceState,
    SetIndicationFilter,
    #[serde(rename = "set_indication_filter_1_2")]
    SetIndicationFilter1_2,
    #[serde(rename = "set_indication_filter_1_5")]
    SetIndicationFilter1_5,
}

impl RadioReq {
    /// The response code the remote side answers this request with
    pub fn response(&self) -> RadioResp {
        match self {
            RadioReq::SendDeviceState => RadioResp::SendDeviceState,
            // All filter revisions share one response
            RadioReq::SetIndicationFilter
            | RadioReq::SetIndicationFilter1_2
            | RadioReq::SetIndicationFilter1_5 => RadioResp::SetIndicationFilter,
        }
    }

    /// Filter request revision supported by `interface`
    pub fn indication_filter_for(interface: RadioInterface) -> Self {
        if interface < RadioInterface::V1_2 {
            RadioReq::SetIndicationFilter
        } else if interface < RadioInterface::V1_5 {
            RadioReq::SetIndicationFilter1_2
        } else {
            RadioReq::SetIndicationFilter1_5
        }
    }
}

impl fmt::Display for RadioReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RadioReq::SendDeviceState => "sendDeviceState",
            RadioReq::SetIndicationFilter => "setIndicationFilter",
            RadioReq::SetIndicationFilter1_2 => "setIndicationFilter_1_2",
            RadioReq::SetIndicationFilter1_5 => "setIndicationFilter_1_5",
        };
        write!(f, "{}", s)
    }
}

/// Response codes echoed back by the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioResp {
    SendDeviceState,
    SetIndicationFilter,
    /// Any other response code
    Other(u32),
}

impl fmt::Display for RadioResp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioResp::SendDeviceState => write!(f, "sendDeviceStateResponse"),
            RadioResp::SetIndicationFilter => write!(f, "setIndicationFilterResponse"),
            RadioResp::Other(code) => write!(f, "response {}", code),
        }
    }
}

/// Error codes carried by a delivered response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioError {
    #[default]
    None,
    GenericFailure,
    RequestNotSupported,
    Other(i32),
}

impl RadioError {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RadioError::None,
            2 => RadioError::GenericFailure,
            6 => RadioError::RequestNotSupported,
            other => RadioError::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            RadioError::None => 0,
            RadioError::GenericFailure => 2,
            RadioError::RequestNotSupported => 6,
            RadioError::Other(code) => *code,
        }
    }
}

/// Outcome of delivering a request to the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    #[default]
    Ok,
    Failed,
    Timeout,
}

/// `sendDeviceState` state types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStateType {
    PowerSaveMode = 0,
    ChargingState = 1,
    LowDataExpected = 2,
}

/// Unsolicited indication filter bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicationFilter(u32);

impl IndicationFilter {
    pub const NONE: Self = Self(0);
    pub const SIGNAL_STRENGTH: Self = Self(1);
    pub const FULL_NETWORK_STATE: Self = Self(1 << 1);
    pub const DATA_CALL_DORMANCY_CHANGED: Self = Self(1 << 2);
    pub const ALL: Self = Self(0x07);
    // 1.2
    pub const LINK_CAPACITY_ESTIMATE: Self = Self(1 << 3);
    pub const PHYSICAL_CHANNEL_CONFIG: Self = Self(1 << 4);
    pub const ALL_1_2: Self = Self(0x1f);
    // 1.5
    pub const REGISTRATION_FAILURE: Self = Self(1 << 5);
    pub const BARRING_INFO: Self = Self(1 << 6);
    pub const ALL_1_5: Self = Self(0x7f);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Every indication defined by `interface`
    pub fn all_for(interface: RadioInterface) -> Self {
        if interface < RadioInterface::V1_2 {
            Self::ALL
        } else if interface < RadioInterface::V1_5 {
            Self::ALL_1_2
        } else {
            Self::ALL_1_5
        }
    }

    /// Filter to apply for the given display state.
    ///
    /// With the display off a single bit is kept instead of an empty mask:
    /// the HAL documents "unset" as "all indications" and does not say
    /// whether an all-zero mask counts as unset.
    pub fn for_display(display_on: bool, interface: RadioInterface) -> Self {
        if display_on {
            Self::all_for(interface)
        } else {
            Self::DATA_CALL_DORMANCY_CHANGED
        }
    }
}

impl BitOr for IndicationFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for IndicationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}
