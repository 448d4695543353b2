//! Outcome taxonomy for outbound submissions.
//!
//! Three error spaces meet here: the caller-facing result codes
//! ([`SendResult`]), the radio channel's enumerated command errors
//! ([`RadioFailure`]) and the carrier messaging service's status codes
//! ([`CarrierSendStatus`]). Both foreign spaces map totally onto
//! [`SendResult`]; the completion handler never sees an unclassified error.

/// Caller-facing result delivered through the sent callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    Ok,
    GenericFailure,
    /// Radio is powered off.
    RadioOff,
    /// No cellular service (radio on, not registered).
    NoService,
    /// Encoder produced no PDU, or the request carried an empty one.
    NullPdu,
    /// Confirmation queue full, rate limit denied, or volume cap hit.
    LimitExceeded,
    FdnCheckFailure,
    /// User (or setup restriction) denied a short-code send.
    ShortCodeNotAllowed,
    /// User permanently denied short-code sends for this caller.
    ShortCodeNeverAllowed,
    NetworkReject,
    InvalidArguments,
    InvalidState,
    NoMemory,
    InvalidSmsFormat,
    SystemError,
    ModemError,
    NetworkError,
    EncodingError,
    InvalidSmscAddress,
    OperationNotAllowed,
    InternalError,
    NoResources,
    Cancelled,
    RequestNotSupported,
    /// A consent decision arrived in a shape the pipeline cannot attribute.
    UnexpectedEventStopSending,
    BlockedDuringEmergency,
    SmsSendRetryFailed,
    RadioNotAvailable,
    RateLimited,
    SimAbsent,
    AccessBarred,
    BlockedDueToCall,
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Ok)
    }

    /// Failure classes that are expected operational outcomes and must not
    /// be escalated to the anomaly sink.
    pub fn is_expected_failure(&self) -> bool {
        matches!(
            self,
            SendResult::NoService
                | SendResult::RadioOff
                | SendResult::LimitExceeded
                | SendResult::ShortCodeNeverAllowed
                | SendResult::ShortCodeNotAllowed
                | SendResult::BlockedDuringEmergency
        )
    }
}

/// Serving state of the cellular radio as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    InService,
    OutOfService,
    PowerOff,
}

/// Result to surface when a submission fails while the device has no
/// service, distinguished by power state.
pub fn not_in_service_error(state: ServiceState) -> SendResult {
    if state == ServiceState::PowerOff {
        SendResult::RadioOff
    } else {
        SendResult::NoService
    }
}

/// Classified command error from the radio submission channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioFailure {
    RadioNotAvailable,
    /// Network asked for a later re-submission of the same PDU.
    SmsSendFailRetry,
    NetworkReject,
    InvalidState,
    InvalidArguments,
    NoMemory,
    RequestRateLimited,
    InvalidSmsFormat,
    SystemErr,
    EncodingErr,
    ModemErr,
    NetworkErr,
    InternalErr,
    RequestNotSupported,
    InvalidModemState,
    NetworkNotReady,
    OperationNotAllowed,
    NoResources,
    RequestCancelled,
    SimAbsent,
    FdnCheckFailure,
    AccessBarred,
    BlockedDueToCall,
    GenericFailure,
}

impl RadioFailure {
    /// Conditions eligible for a bounded, delayed re-submission. Everything
    /// else is reported to the caller immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RadioFailure::SmsSendFailRetry
                | RadioFailure::InternalErr
                | RadioFailure::SystemErr
                | RadioFailure::NetworkErr
                | RadioFailure::RequestRateLimited
        )
    }

    pub fn to_send_result(self) -> SendResult {
        match self {
            RadioFailure::RadioNotAvailable => SendResult::RadioNotAvailable,
            RadioFailure::SmsSendFailRetry => SendResult::SmsSendRetryFailed,
            RadioFailure::NetworkReject => SendResult::NetworkReject,
            RadioFailure::InvalidState => SendResult::InvalidState,
            RadioFailure::InvalidArguments => SendResult::InvalidArguments,
            RadioFailure::NoMemory => SendResult::NoMemory,
            RadioFailure::RequestRateLimited => SendResult::RateLimited,
            RadioFailure::InvalidSmsFormat => SendResult::InvalidSmsFormat,
            RadioFailure::SystemErr => SendResult::SystemError,
            RadioFailure::EncodingErr => SendResult::EncodingError,
            RadioFailure::ModemErr => SendResult::ModemError,
            RadioFailure::NetworkErr => SendResult::NetworkError,
            RadioFailure::InternalErr => SendResult::InternalError,
            RadioFailure::RequestNotSupported => SendResult::RequestNotSupported,
            RadioFailure::InvalidModemState => SendResult::InvalidState,
            RadioFailure::NetworkNotReady => SendResult::NetworkError,
            RadioFailure::OperationNotAllowed => SendResult::OperationNotAllowed,
            RadioFailure::NoResources => SendResult::NoResources,
            RadioFailure::RequestCancelled => SendResult::Cancelled,
            RadioFailure::SimAbsent => SendResult::SimAbsent,
            RadioFailure::FdnCheckFailure => SendResult::FdnCheckFailure,
            RadioFailure::AccessBarred => SendResult::AccessBarred,
            RadioFailure::BlockedDueToCall => SendResult::BlockedDueToCall,
            RadioFailure::GenericFailure => SendResult::GenericFailure,
        }
    }
}

/// Error detail attached to a failed radio submission: the classified
/// failure plus an optional technology-specific sub-code passed through to
/// the caller for troubleshooting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioError {
    pub failure: RadioFailure,
    pub error_code: Option<i32>,
}

impl RadioError {
    pub fn new(failure: RadioFailure) -> Self {
        Self { failure, error_code: None }
    }

    pub fn with_code(failure: RadioFailure, error_code: i32) -> Self {
        Self { failure, error_code: Some(error_code) }
    }
}

/// Status code returned by the carrier messaging service.
///
/// The raw integer space is the service's wire contract; everything this
/// crate does not recognize funnels through [`CarrierSendStatus::Unknown`]
/// and is treated as "retry on the carrier network", i.e. fall back to the
/// radio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierSendStatus {
    /// 0
    Ok,
    /// 1 - explicit request to re-send over the carrier network (radio path).
    RetryOnCarrierNetwork,
    /// 2 - unspecified service-side failure.
    Error,
    /// 100..
    ResultGenericFailure,
    ResultNullPdu,
    ResultNoService,
    ResultLimitExceeded,
    ResultFdnCheckFailure,
    ResultShortCodeNotAllowed,
    ResultShortCodeNeverAllowed,
    ResultNetworkReject,
    ResultInvalidArguments,
    ResultInvalidState,
    ResultInvalidSmsFormat,
    ResultNetworkError,
    ResultEncodingError,
    ResultInvalidSmscAddress,
    ResultOperationNotAllowed,
    ResultCancelled,
    ResultRequestNotSupported,
    ResultBlockedDuringEmergency,
    ResultSmsSendRetryFailed,
    Unknown(i32),
}

impl CarrierSendStatus {
    pub fn from_raw(v: i32) -> Self {
        match v {
            0 => Self::Ok,
            1 => Self::RetryOnCarrierNetwork,
            2 => Self::Error,
            100 => Self::ResultGenericFailure,
            101 => Self::ResultNullPdu,
            102 => Self::ResultNoService,
            103 => Self::ResultLimitExceeded,
            104 => Self::ResultFdnCheckFailure,
            105 => Self::ResultShortCodeNotAllowed,
            106 => Self::ResultShortCodeNeverAllowed,
            107 => Self::ResultNetworkReject,
            108 => Self::ResultInvalidArguments,
            109 => Self::ResultInvalidState,
            110 => Self::ResultInvalidSmsFormat,
            111 => Self::ResultNetworkError,
            112 => Self::ResultEncodingError,
            113 => Self::ResultInvalidSmscAddress,
            114 => Self::ResultOperationNotAllowed,
            115 => Self::ResultCancelled,
            116 => Self::ResultRequestNotSupported,
            117 => Self::ResultBlockedDuringEmergency,
            118 => Self::ResultSmsSendRetryFailed,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::RetryOnCarrierNetwork => 1,
            Self::Error => 2,
            Self::ResultGenericFailure => 100,
            Self::ResultNullPdu => 101,
            Self::ResultNoService => 102,
            Self::ResultLimitExceeded => 103,
            Self::ResultFdnCheckFailure => 104,
            Self::ResultShortCodeNotAllowed => 105,
            Self::ResultShortCodeNeverAllowed => 106,
            Self::ResultNetworkReject => 107,
            Self::ResultInvalidArguments => 108,
            Self::ResultInvalidState => 109,
            Self::ResultInvalidSmsFormat => 110,
            Self::ResultNetworkError => 111,
            Self::ResultEncodingError => 112,
            Self::ResultInvalidSmscAddress => 113,
            Self::ResultOperationNotAllowed => 114,
            Self::ResultCancelled => 115,
            Self::ResultRequestNotSupported => 116,
            Self::ResultBlockedDuringEmergency => 117,
            Self::ResultSmsSendRetryFailed => 118,
            Self::Unknown(v) => v,
        }
    }

    /// True when the batch must be re-submitted through the radio path
    /// instead of being reported to the caller.
    pub fn wants_radio_fallback(&self) -> bool {
        matches!(self, Self::RetryOnCarrierNetwork | Self::Unknown(_))
    }

    pub fn to_send_result(self) -> SendResult {
        match self {
            Self::Ok => SendResult::Ok,
            Self::Error => SendResult::GenericFailure,
            Self::ResultGenericFailure => SendResult::GenericFailure,
            Self::ResultNullPdu => SendResult::NullPdu,
            Self::ResultNoService => SendResult::NoService,
            Self::ResultLimitExceeded => SendResult::LimitExceeded,
            Self::ResultFdnCheckFailure => SendResult::FdnCheckFailure,
            Self::ResultShortCodeNotAllowed => SendResult::ShortCodeNotAllowed,
            Self::ResultShortCodeNeverAllowed => SendResult::ShortCodeNeverAllowed,
            Self::ResultNetworkReject => SendResult::NetworkReject,
            Self::ResultInvalidArguments => SendResult::InvalidArguments,
            Self::ResultInvalidState => SendResult::InvalidState,
            Self::ResultInvalidSmsFormat => SendResult::InvalidSmsFormat,
            Self::ResultNetworkError => SendResult::NetworkError,
            Self::ResultEncodingError => SendResult::EncodingError,
            Self::ResultInvalidSmscAddress => SendResult::InvalidSmscAddress,
            Self::ResultOperationNotAllowed => SendResult::OperationNotAllowed,
            Self::ResultCancelled => SendResult::Cancelled,
            Self::ResultRequestNotSupported => SendResult::RequestNotSupported,
            Self::ResultBlockedDuringEmergency => SendResult::BlockedDuringEmergency,
            Self::ResultSmsSendRetryFailed => SendResult::SmsSendRetryFailed,
            Self::RetryOnCarrierNetwork | Self::Unknown(_) => SendResult::GenericFailure,
        }
    }
}
