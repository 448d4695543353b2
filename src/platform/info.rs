use crate::common::result::ServiceState;

/// Read-only device and caller facts consumed by the dispatch core.
pub trait PlatformInfo: Send {
    fn service_state(&self) -> ServiceState;

    /// ISO country code of the SIM, when known. Two letters.
    fn sim_country_iso(&self) -> Option<String>;
    /// ISO country code of the serving network, when known. Two letters.
    fn network_country_iso(&self) -> Option<String>;

    fn is_emergency_number(&self, addr: &str) -> bool;

    /// Initial device setup has completed. Premium sends are refused
    /// outright while this is false.
    fn device_provisioned(&self) -> bool;

    /// Device is in emergency callback mode; outbound SMS is blocked.
    fn in_emergency_callback_mode(&self) -> bool;

    fn is_default_sms_app(&self, package: &str) -> bool;

    /// Caller holds the privilege to send to short codes unprompted.
    fn has_unconfirmed_send_privilege(&self, package: &str) -> bool;

    /// The calling application resolves to an installed package.
    fn app_known(&self, package: &str, user_id: i32) -> bool;
}
