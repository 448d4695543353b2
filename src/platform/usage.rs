/// Classification of a destination address by the usage monitor.
/// Ordering is by severity; merging two classifications keeps the worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShortCodeCategory {
    NotShortCode,
    FreeShortCode,
    StandardShortCode,
    PossiblePremium,
    Premium,
}

impl ShortCodeCategory {
    pub fn merge(a: ShortCodeCategory, b: ShortCodeCategory) -> ShortCodeCategory {
        a.max(b)
    }

    /// Premium and possible-premium destinations require user consent.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, ShortCodeCategory::PossiblePremium | ShortCodeCategory::Premium)
    }
}

/// Remembered per-caller decision for premium short-code sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumPermission {
    /// No decision recorded; prompt the user.
    Ask,
    AlwaysAllow,
    NeverAllow,
}

/// External per-caller usage rules: destination classification, outgoing
/// volume limiting and the remembered premium-send decision.
pub trait UsageMonitor: Send {
    fn check_destination(&self, dest_addr: &str, country_iso: &str) -> ShortCodeCategory;

    /// Account `count` messages against `package`'s quota. `false` means
    /// the quota is exhausted and the send needs confirmation.
    fn check_volume(&mut self, package: &str, count: usize) -> bool;

    fn premium_permission(&self, package: &str) -> PremiumPermission;
    fn set_premium_permission(&mut self, package: &str, permission: PremiumPermission);
}
