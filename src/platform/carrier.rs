use crate::gateway::CarrierEvents;

/// One connection to an installed carrier messaging service.
///
/// The contract is bind-then-call: `bind` starts an asynchronous
/// connection and returns whether the attempt was even accepted;
/// readiness and send results arrive later through the supplied
/// [`CarrierEvents`] handle, possibly from another thread. The bridge
/// always calls `disconnect` once, after the first completion.
pub trait CarrierMessagingService: Send {
    /// Start connecting. `false` means the service cannot be bound at all;
    /// no events will follow.
    fn bind(&mut self, events: CarrierEvents) -> bool;

    fn send_text_sms(
        &mut self,
        text: &str,
        sub_id: i32,
        dest_addr: &str,
        status_report: bool,
        events: CarrierEvents,
    );

    #[allow(clippy::too_many_arguments)]
    fn send_data_sms(
        &mut self,
        data: &[u8],
        sub_id: i32,
        dest_addr: &str,
        dest_port: u16,
        status_report: bool,
        events: CarrierEvents,
    );

    fn send_multipart_text_sms(
        &mut self,
        parts: &[String],
        sub_id: i32,
        dest_addr: &str,
        status_report: bool,
        events: CarrierEvents,
    );

    fn disconnect(&mut self);
}

/// Lookup of the carrier-supplied sending service by service intent.
pub trait CarrierServiceLookup: Send {
    /// Resolve the installed carrier messaging service, if any. Each send
    /// batch gets its own connection.
    fn service_for_send(&mut self) -> Option<Box<dyn CarrierMessagingService>>;
}
