//! Per-variant decision tables
//!
//! A [`VariantProfile`] lists which signals a session observes, which
//! decisions it derives from them and which request class each decision
//! drives. The session engine is generic over these tables.

use devmon_core::SignalKind;
use devmon_radio::RequestClass;

use crate::config::Variant;
use crate::decision::{self, PollSample, Snapshot};

/// A decision derived from primary signals
#[derive(Debug, Clone, Copy)]
pub struct DecisionRule {
    pub class: RequestClass,
    /// Signals whose changes can affect this decision
    pub inputs: &'static [SignalKind],
    pub compute: fn(&Snapshot) -> bool,
    /// Value the modem is assumed to hold when the session starts.
    /// `None` means unknown, so the first computed value is always sent.
    pub initial: Option<bool>,
}

impl DecisionRule {
    pub fn depends_on(&self, kind: SignalKind) -> bool {
        self.inputs.contains(&kind)
    }
}

/// A decision derived by the poll bridge
#[derive(Debug, Clone, Copy)]
pub struct BridgeRule {
    pub class: RequestClass,
    pub compute: fn(&PollSample) -> bool,
    pub initial: Option<bool>,
}

/// Everything that differs between variants
#[derive(Debug, Clone, Copy)]
pub struct VariantProfile {
    pub variant: Variant,
    /// Signals the session subscribes to
    pub signals: &'static [SignalKind],
    pub rules: &'static [DecisionRule],
    pub bridge_rules: &'static [BridgeRule],
}

impl VariantProfile {
    pub fn for_variant(variant: Variant) -> &'static VariantProfile {
        match variant {
            Variant::DeviceState => &DEVICE_STATE,
            Variant::IndicationFilter => &INDICATION_FILTER,
        }
    }

    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    pub fn observes(&self, kind: SignalKind) -> bool {
        self.signals.contains(&kind)
    }

    /// Request classes this variant can submit
    pub fn classes(&self) -> impl Iterator<Item = RequestClass> + '_ {
        self.rules.iter().map(|rule| rule.class)
    }
}

static DEVICE_STATE: VariantProfile = VariantProfile {
    variant: Variant::DeviceState,
    signals: &[
        SignalKind::Display,
        SignalKind::Battery,
        SignalKind::Charger,
        SignalKind::Tethering,
    ],
    rules: &[
        DecisionRule {
            class: RequestClass::LowDataExpected,
            inputs: &[SignalKind::Display, SignalKind::Charger, SignalKind::Tethering],
            compute: decision::low_data_expected,
            initial: Some(false),
        },
        DecisionRule {
            class: RequestClass::ChargingState,
            inputs: &[SignalKind::Charger],
            compute: decision::charging,
            initial: Some(false),
        },
    ],
    bridge_rules: &[
        BridgeRule {
            class: RequestClass::LowDataExpected,
            compute: decision::poll_low_data,
            initial: Some(false),
        },
        BridgeRule {
            class: RequestClass::ChargingState,
            compute: decision::poll_charging,
            initial: Some(false),
        },
    ],
};

static INDICATION_FILTER: VariantProfile = VariantProfile {
    variant: Variant::IndicationFilter,
    signals: &[SignalKind::Display, SignalKind::Battery, SignalKind::Charger],
    rules: &[DecisionRule {
        class: RequestClass::IndicationFilter,
        inputs: &[SignalKind::Display],
        compute: decision::display_on,
        initial: None,
    }],
    bridge_rules: &[],
};
