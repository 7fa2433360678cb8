//! Per-class capability latch

use std::collections::BTreeSet;

use devmon_radio::RequestClass;

/// Records which request classes the remote side declared unsupported.
///
/// Every class starts supported. Revocation is one-way: there is no way to
/// mark a class supported again.
#[derive(Debug, Clone, Default)]
pub struct CapabilityLatch {
    revoked: BTreeSet<RequestClass>,
}

impl CapabilityLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_supported(&self, class: RequestClass) -> bool {
        !self.revoked.contains(&class)
    }

    /// Mark `class` unsupported. Returns true the first time only.
    pub fn revoke(&mut self, class: RequestClass) -> bool {
        self.revoked.insert(class)
    }
}
